//! Structured-judgment service: one rubric prompt in, one validated [`Judgment`] out.

use crate::errors::ProviderError;
use crate::model::Judgment;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::{json, Value};

pub mod fake;
pub mod openai;

#[async_trait]
pub trait JudgmentClient: Send + Sync {
    async fn judge(&self, prompt: &str) -> Result<Judgment, ProviderError>;
    fn provider_name(&self) -> &'static str;
    fn model(&self) -> &str;
}

pub const SCHEMA_NAME: &str = "contextual_judgment";

/// JSON schema of the judgment object sent as `response_format`.
pub fn judgment_schema() -> Value {
    let score = json!({ "type": "integer", "minimum": 1, "maximum": 5 });
    let string_list = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "correct": { "type": "boolean" },
            "norm_mentioned": { "type": "boolean" },
            "item_mentioned": { "type": "boolean" },
            "source_cited": { "type": "boolean" },
            "clarity": score,
            "technical_grounding": score,
            "concision": score,
            "norm_conformance": score,
            "technical_completeness": score,
            "rationale": { "type": "string" },
            "correct_points": string_list,
            "incorrect_points": string_list
        },
        "required": [
            "correct", "norm_mentioned", "item_mentioned", "source_cited",
            "clarity", "technical_grounding", "concision",
            "norm_conformance", "technical_completeness",
            "rationale", "correct_points"
        ]
    })
}

/// Compiled once per client; validates raw judgment JSON before decoding.
pub struct JudgmentDecoder {
    compiled: JSONSchema,
}

impl JudgmentDecoder {
    pub fn new() -> Result<Self, ProviderError> {
        let schema = judgment_schema();
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| ProviderError::Malformed(format!("judgment schema compile failed: {}", e)))?;
        Ok(Self { compiled })
    }

    /// parse -> validate -> decode; the first failing step is the error.
    pub fn decode(&self, content: &str) -> Result<Judgment, ProviderError> {
        let instance: Value = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| ProviderError::Malformed(format!("judgment is not valid JSON: {}", e)))?;

        if let Err(errors) = self.compiled.validate(&instance) {
            let violations: Vec<String> = errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect();
            return Err(ProviderError::SchemaViolation(violations));
        }

        serde_json::from_value(instance)
            .map_err(|e| ProviderError::Malformed(format!("judgment decode failed: {}", e)))
    }
}

// Some json_object-mode vendors still wrap the object in ```json fences.
fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(inner) = t.strip_prefix("```") else {
        return t;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Value {
        json!({
            "correct": true,
            "norm_mentioned": true,
            "item_mentioned": true,
            "source_cited": true,
            "clarity": 4,
            "technical_grounding": 4,
            "concision": 4,
            "norm_conformance": 4,
            "technical_completeness": 4,
            "rationale": "Cita NT-09 item 6.7.3 e chega a 7 metros.",
            "correct_points": ["valor final correto"]
        })
    }

    #[test]
    fn decodes_valid_judgment() {
        let d = JudgmentDecoder::new().unwrap();
        let j = d.decode(&valid().to_string()).unwrap();
        assert!(j.correct && j.source_cited);
        assert_eq!(j.clarity, 4);
        assert!(j.incorrect_points.is_empty());
    }

    #[test]
    fn out_of_range_score_is_schema_violation() {
        let d = JudgmentDecoder::new().unwrap();
        let mut v = valid();
        v["clarity"] = json!(6);
        match d.decode(&v.to_string()) {
            Err(ProviderError::SchemaViolation(errs)) => {
                assert!(errs.iter().any(|e| e.contains("clarity")))
            }
            other => panic!("expected schema violation, got {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_is_schema_violation() {
        let d = JudgmentDecoder::new().unwrap();
        let mut v = valid();
        v.as_object_mut().unwrap().remove("rationale");
        assert!(matches!(
            d.decode(&v.to_string()),
            Err(ProviderError::SchemaViolation(_))
        ));
    }

    #[test]
    fn non_json_is_malformed() {
        let d = JudgmentDecoder::new().unwrap();
        assert!(matches!(
            d.decode("A resposta está correta."),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let d = JudgmentDecoder::new().unwrap();
        let fenced = format!("```json\n{}\n```", valid());
        assert!(d.decode(&fenced).is_ok());
    }
}
