use thiserror::Error;

/// Fatal at startup; the CLI maps these to exit code 2.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing credential: set {}", .vars.join(" or "))]
    MissingCredential { vars: Vec<String> },

    #[error("model '{name}' not found in catalog{}", suggestion_hint(.suggestion))]
    UnknownModel {
        name: String,
        suggestion: Option<String>,
    },

    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write config {path}: {message}")]
    Write { path: String, message: String },

    #[error("failed to parse YAML: {0}")]
    Parse(String),

    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("unknown fields detected in strict mode: {0:?}")]
    UnknownFields(Vec<String>),

    #[error("invalid config: {0}")]
    Invalid(String),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

/// Faults raised at the boundary of an external LLM service.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty response: {0}")]
    EmptyResponse(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("judgment violates response schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// A judgment whose fields contradict the rubric's logical rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("inconsistent judgment: correct=false but technical_grounding={grounding} > 2")]
    IncorrectButWellGrounded { grounding: u8 },

    #[error("inconsistent judgment: norm not mentioned but norm_conformance={conformance} > 3")]
    UnmentionedNormButConformant { conformance: u8 },
}
