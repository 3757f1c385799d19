use crate::errors::ConfigError;
use crate::engine::secs_to_duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "normeval.yaml";

pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_JUDGE_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_JUDGE_MODEL: &str = "llama3-70b-8192";

/// Environment variable overriding `generation.base_url`.
pub const BASE_URL_ENV: &str = "LLM_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub judge: JudgeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: Vec<String>,
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Catalog name -> vendor API name. Wins over the built-in tables.
    #[serde(default)]
    pub model_aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonSchema,
    #[default]
    JsonObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_base_url")]
    pub base_url: String,
    #[serde(default = "default_judge_key_env")]
    pub api_key_env: Vec<String>,
    #[serde(default = "default_judge_model")]
    pub model: String,
    #[serde(default)]
    pub response_format: ResponseFormat,
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}
fn default_db_path() -> PathBuf {
    PathBuf::from("normeval.db")
}
fn default_generation_key_env() -> Vec<String> {
    vec!["LLM_API_KEY".into(), "OPENAI_API_KEY".into()]
}
fn default_judge_key_env() -> Vec<String> {
    vec!["GROQ_API_KEY".into()]
}
fn default_generation_max_tokens() -> u32 {
    1000
}
fn default_judge_max_tokens() -> u32 {
    2000
}
fn default_temperature() -> f32 {
    0.1
}
fn default_delay_secs() -> f64 {
    1.0
}
fn default_rate_limit_delay_secs() -> f64 {
    3.0
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_judge_base_url() -> String {
    DEFAULT_JUDGE_BASE_URL.into()
}
fn default_judge_model() -> String {
    DEFAULT_JUDGE_MODEL.into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: default_generation_key_env(),
            max_tokens: default_generation_max_tokens(),
            temperature: default_temperature(),
            delay_secs: default_delay_secs(),
            request_timeout_secs: default_timeout_secs(),
            model_aliases: BTreeMap::new(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_judge_base_url(),
            api_key_env: default_judge_key_env(),
            model: default_judge_model(),
            response_format: ResponseFormat::default(),
            max_tokens: default_judge_max_tokens(),
            temperature: default_temperature(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            database: DatabaseConfig::default(),
            generation: GenerationConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

/// Loads `path`, or returns defaults when the file does not exist.
pub fn load_or_default(path: &Path, strict: bool) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(event = "config.defaults", path = %path.display());
        return Ok(AppConfig::default());
    }
    load_config(path, strict)
}

pub fn load_config(path: &Path, strict: bool) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_config(&raw, strict)
}

pub fn parse_config(raw: &str, strict: bool) -> Result<AppConfig, ConfigError> {
    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cfg: AppConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError::Parse(e.to_string()))?;

    let meaningful: Vec<String> = ignored_keys
        .into_iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful.is_empty() {
        if strict {
            return Err(ConfigError::UnknownFields(meaningful));
        }
        tracing::warn!(event = "config.unknown_fields", fields = ?meaningful);
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: cfg.version,
            supported: SUPPORTED_CONFIG_VERSION,
        });
    }
    validate(&cfg)?;
    Ok(cfg)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.generation.api_key_env.is_empty() || cfg.judge.api_key_env.is_empty() {
        return Err(ConfigError::Invalid(
            "api_key_env must name at least one variable".into(),
        ));
    }
    for (label, d) in [
        ("generation.delay_secs", cfg.generation.delay_secs),
        ("judge.rate_limit_delay_secs", cfg.judge.rate_limit_delay_secs),
    ] {
        secs_to_duration(label, d)?;
    }
    if cfg.generation.max_tokens == 0 || cfg.judge.max_tokens == 0 {
        return Err(ConfigError::Invalid("max_tokens must be > 0".into()));
    }
    Ok(())
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, SAMPLE_CONFIG).map_err(|e| ConfigError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

const SAMPLE_CONFIG: &str = r#"version: 1
database:
  path: normeval.db
generation:
  # base_url: https://api.deepseek.com/v1   # LLM_BASE_URL overrides this
  api_key_env: [LLM_API_KEY, OPENAI_API_KEY]
  max_tokens: 1000
  temperature: 0.1
  delay_secs: 1.0
  request_timeout_secs: 120
  model_aliases: {}
judge:
  base_url: https://api.groq.com/openai/v1
  api_key_env: [GROQ_API_KEY]
  model: llama3-70b-8192
  response_format: json_object
  max_tokens: 2000
  temperature: 0.1
  rate_limit_delay_secs: 3.0
  request_timeout_secs: 120
"#;

/// Fully resolved generation endpoint, built once at startup.
#[derive(Debug, Clone)]
pub struct GenerationEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub remap: ModelRemap,
}

#[derive(Debug, Clone)]
pub struct JudgeEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub response_format: ResponseFormat,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Base URL after applying the environment override.
    pub fn generation_base_url(&self, env: impl Fn(&str) -> Option<String>) -> String {
        env(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.generation.base_url.clone())
            .unwrap_or_else(|| DEFAULT_GENERATION_BASE_URL.to_string())
    }

    pub fn generation_endpoint(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<GenerationEndpoint, ConfigError> {
        let api_key = first_credential(&self.generation.api_key_env, &env)?;
        let base_url = self.generation_base_url(&env);
        let remap = ModelRemap::for_base_url(&base_url).with_aliases(&self.generation.model_aliases);
        Ok(GenerationEndpoint {
            base_url,
            api_key,
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            timeout_secs: self.generation.request_timeout_secs,
            remap,
        })
    }

    pub fn judge_endpoint(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<JudgeEndpoint, ConfigError> {
        let api_key = first_credential(&self.judge.api_key_env, &env)?;
        Ok(JudgeEndpoint {
            base_url: self.judge.base_url.clone(),
            api_key,
            model: self.judge.model.clone(),
            response_format: self.judge.response_format,
            max_tokens: self.judge.max_tokens,
            temperature: self.judge.temperature,
            timeout_secs: self.judge.request_timeout_secs,
        })
    }
}

fn first_credential(
    vars: &[String],
    env: &impl Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    vars.iter()
        .find_map(|v| env(v).filter(|s| !s.trim().is_empty()))
        .ok_or_else(|| ConfigError::MissingCredential {
            vars: vars.to_vec(),
        })
}

/// Vendor the generation base URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    DeepSeek,
    GitHubModels,
    OpenAi,
}

impl Vendor {
    pub fn detect(base_url: &str) -> Self {
        let url = base_url.to_lowercase();
        if url.contains("deepseek") {
            Vendor::DeepSeek
        } else if url.contains("github") {
            Vendor::GitHubModels
        } else {
            Vendor::OpenAi
        }
    }
}

/// Catalog model name -> vendor API model name.
#[derive(Debug, Clone)]
pub struct ModelRemap {
    pub vendor: Vendor,
    table: BTreeMap<String, String>,
}

impl ModelRemap {
    pub fn for_base_url(base_url: &str) -> Self {
        let vendor = Vendor::detect(base_url);
        let pairs: &[(&str, &str)] = match vendor {
            Vendor::DeepSeek => &[
                ("deepseek-r1", "deepseek-reasoner"),
                ("deepseek-v3", "deepseek-chat"),
                ("claude-opus-4", "deepseek-chat"),
                ("gemini-2.5-pro", "deepseek-chat"),
                ("gemini-2.5-flash", "deepseek-chat"),
                ("openai/gpt-4.0", "deepseek-chat"),
                ("openai/gpt-4.1", "deepseek-chat"),
                ("openai/o3", "deepseek-reasoner"),
            ],
            Vendor::GitHubModels => &[
                ("openai/gpt-4.0", "OpenAI/gpt-4o"),
                ("openai/gpt-4.1", "OpenAI/gpt-4o"),
                ("openai/o3", "OpenAI/o1-preview"),
                ("gemini-2.5-pro", "OpenAI/gpt-4o"),
                ("gemini-2.5-flash", "OpenAI/gpt-4o-mini"),
            ],
            Vendor::OpenAi => &[
                ("openai/gpt-4.0", "gpt-4o"),
                ("openai/gpt-4.1", "gpt-4o"),
                ("openai/o3", "o1-preview"),
                ("gemini-2.5-pro", "gpt-4o"),
                ("gemini-2.5-flash", "gpt-4o-mini"),
            ],
        };
        Self {
            vendor,
            table: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn with_aliases(mut self, aliases: &BTreeMap<String, String>) -> Self {
        for (k, v) in aliases {
            self.table.insert(k.clone(), v.clone());
        }
        self
    }

    /// Unmapped names pass through unchanged.
    pub fn api_name<'a>(&'a self, catalog_name: &'a str) -> &'a str {
        self.table
            .get(catalog_name)
            .map(String::as_str)
            .unwrap_or(catalog_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = parse_config("version: 1\n", false).unwrap();
        assert_eq!(cfg.generation.max_tokens, 1000);
        assert_eq!(cfg.judge.max_tokens, 2000);
        assert_eq!(cfg.judge.rate_limit_delay_secs, 3.0);
        assert_eq!(cfg.generation.delay_secs, 1.0);
        assert_eq!(cfg.judge.model, DEFAULT_JUDGE_MODEL);
        assert_eq!(cfg.judge.response_format, ResponseFormat::JsonObject);
    }

    #[test]
    fn sample_config_parses_strictly() {
        let cfg = parse_config(SAMPLE_CONFIG, true).unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("normeval.db"));
        assert_eq!(cfg.generation.request_timeout_secs, 120);
    }

    #[test]
    fn strict_mode_rejects_unknown_keys() {
        let raw = "version: 1\ngeneration:\n  max_tokenz: 10\n";
        match parse_config(raw, true) {
            Err(ConfigError::UnknownFields(f)) => {
                assert_eq!(f, vec!["generation.max_tokenz".to_string()])
            }
            other => panic!("expected UnknownFields, got {:?}", other),
        }
        assert!(parse_config(raw, false).is_ok());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        assert!(matches!(
            parse_config("version: 2\n", false),
            Err(ConfigError::UnsupportedVersion { found: 2, .. })
        ));
    }

    #[test]
    fn negative_delay_is_invalid() {
        let raw = "version: 1\ngeneration:\n  delay_secs: -1\n";
        assert!(matches!(parse_config(raw, false), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn huge_delay_is_invalid() {
        let raw = "version: 1\ngeneration:\n  delay_secs: 1.0e+30\n";
        match parse_config(raw, false) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("generation.delay_secs"), "{}", msg),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn sample_write_failure_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("normeval.yaml");
        let err = write_sample_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Write { .. }));
        assert!(err.to_string().starts_with("failed to write config"), "{}", err);
    }

    #[test]
    fn generation_key_falls_back_to_openai_variable() {
        let cfg = AppConfig::default();
        let ep = cfg
            .generation_endpoint(env_of(&[("OPENAI_API_KEY", "sk-2")]))
            .unwrap();
        assert_eq!(ep.api_key, "sk-2");
        assert_eq!(ep.base_url, DEFAULT_GENERATION_BASE_URL);

        let ep = cfg
            .generation_endpoint(env_of(&[("LLM_API_KEY", "sk-1"), ("OPENAI_API_KEY", "sk-2")]))
            .unwrap();
        assert_eq!(ep.api_key, "sk-1");
    }

    #[test]
    fn missing_credentials_name_every_variable() {
        let err = AppConfig::default()
            .judge_endpoint(env_of(&[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing credential: set GROQ_API_KEY");
    }

    #[test]
    fn base_url_env_overrides_file_and_picks_remap_table() {
        let mut cfg = AppConfig::default();
        cfg.generation.base_url = Some("https://models.github.ai/inference".into());
        let ep = cfg
            .generation_endpoint(env_of(&[
                ("LLM_API_KEY", "k"),
                ("LLM_BASE_URL", "https://api.deepseek.com/v1"),
            ]))
            .unwrap();
        assert_eq!(ep.remap.vendor, Vendor::DeepSeek);
        assert_eq!(ep.remap.api_name("deepseek-r1"), "deepseek-reasoner");
        assert_eq!(ep.remap.api_name("grok-3"), "grok-3");
    }

    #[test]
    fn remap_tables_per_vendor() {
        let gh = ModelRemap::for_base_url("https://models.github.ai/inference");
        assert_eq!(gh.api_name("openai/o3"), "OpenAI/o1-preview");
        assert_eq!(gh.api_name("gemini-2.5-flash"), "OpenAI/gpt-4o-mini");

        let oa = ModelRemap::for_base_url(DEFAULT_GENERATION_BASE_URL);
        assert_eq!(oa.vendor, Vendor::OpenAi);
        assert_eq!(oa.api_name("openai/gpt-4.1"), "gpt-4o");
    }

    #[test]
    fn aliases_take_precedence_over_builtin_table() {
        let mut aliases = BTreeMap::new();
        aliases.insert("openai/o3".to_string(), "o3-mini".to_string());
        aliases.insert("qwen-3-235B".to_string(), "qwen3-235b-a22b".to_string());
        let remap = ModelRemap::for_base_url(DEFAULT_GENERATION_BASE_URL).with_aliases(&aliases);
        assert_eq!(remap.api_name("openai/o3"), "o3-mini");
        assert_eq!(remap.api_name("qwen-3-235B"), "qwen3-235b-a22b");
    }
}
