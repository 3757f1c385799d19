use super::{judgment_schema, JudgmentClient, JudgmentDecoder, SCHEMA_NAME};
use crate::config::{JudgeEndpoint, ResponseFormat};
use crate::errors::ProviderError;
use crate::model::Judgment;
use crate::providers::llm::openai::{ChatCompletionsHttp, WireRequest};
use crate::providers::llm::ChatMessage;
use async_trait::async_trait;
use serde_json::json;

/// Judge over an OpenAI-compatible endpoint (Groq by default).
pub struct OpenAIJudgmentClient {
    http: ChatCompletionsHttp,
    decoder: JudgmentDecoder,
    model: String,
    response_format: ResponseFormat,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIJudgmentClient {
    pub fn new(endpoint: &JudgeEndpoint) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ChatCompletionsHttp::new(&endpoint.base_url, &endpoint.api_key)?,
            decoder: JudgmentDecoder::new()?,
            model: endpoint.model.clone(),
            response_format: endpoint.response_format,
            max_tokens: endpoint.max_tokens,
            temperature: endpoint.temperature,
        })
    }
}

pub(crate) fn response_format_value(format: ResponseFormat) -> serde_json::Value {
    match format {
        ResponseFormat::JsonSchema => json!({
            "type": "json_schema",
            "json_schema": { "name": SCHEMA_NAME, "schema": judgment_schema() }
        }),
        ResponseFormat::JsonObject => json!({ "type": "json_object" }),
    }
}

#[async_trait]
impl JudgmentClient for OpenAIJudgmentClient {
    async fn judge(&self, prompt: &str) -> Result<Judgment, ProviderError> {
        let messages = [ChatMessage::user(prompt)];
        let body = WireRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
            response_format: Some(response_format_value(self.response_format)),
        };
        let (content, _) = self.http.post(&body).await?;
        self.decoder.decode(&content)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_schema_mode_embeds_schema() {
        let v = response_format_value(ResponseFormat::JsonSchema);
        assert_eq!(v["type"], "json_schema");
        assert_eq!(v["json_schema"]["name"], SCHEMA_NAME);
        assert_eq!(
            v["json_schema"]["schema"]["properties"]["clarity"]["maximum"],
            5
        );
    }

    #[test]
    fn json_object_mode_is_bare() {
        assert_eq!(
            response_format_value(ResponseFormat::JsonObject),
            json!({ "type": "json_object" })
        );
    }
}
