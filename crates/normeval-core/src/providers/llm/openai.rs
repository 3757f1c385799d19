use super::{ChatCompletion, ChatMessage, ChatRequest, LlmClient};
use crate::config::GenerationEndpoint;
use crate::errors::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub max_tokens: u32,
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

/// Thin HTTP wrapper for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub(crate) struct ChatCompletionsHttp {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatCompletionsHttp {
    pub(crate) fn new(base_url: &str, api_key: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::builder().build()?,
        })
    }

    pub(crate) fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Posts the request and returns `(choices[0].message.content, model)`.
    pub(crate) async fn post(
        &self,
        body: &WireRequest<'_>,
    ) -> Result<(String, Option<String>), ProviderError> {
        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireErrorEnvelope>(&text)
                .map(|env| env.error.message)
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: WireResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::EmptyResponse("no choices in response".into()))?
            .message
            .content
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse("empty message content".into()));
        }
        Ok((content, parsed.model))
    }
}

pub struct OpenAIClient {
    http: ChatCompletionsHttp,
}

impl OpenAIClient {
    pub fn new(endpoint: &GenerationEndpoint) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ChatCompletionsHttp::new(&endpoint.base_url, &endpoint.api_key)?,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
            response_format: None,
        };
        let (text, model) = self.http.post(&body).await?;
        Ok(ChatCompletion {
            text,
            model: model.unwrap_or_else(|| request.model.clone()),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}
