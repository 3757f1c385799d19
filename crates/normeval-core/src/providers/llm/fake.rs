use super::{ChatCompletion, ChatRequest, LlmClient};
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted chat client for tests. Replies are consumed in order; once the
/// script runs out every call echoes the last user message.
#[derive(Default)]
pub struct FakeLlmClient {
    script: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    latency: Option<Duration>,
}

impl FakeLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// `Err(msg)` entries fail that call with an API error.
    pub fn with_script(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if let Some(d) = self.latency {
            tokio::time::sleep(d).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let text = match next {
            Some(Ok(text)) => text,
            Some(Err(message)) => return Err(ProviderError::Api { status: 500, message }),
            None => request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
        };
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse("empty message content".into()));
        }
        Ok(ChatCompletion {
            text,
            model: request.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
