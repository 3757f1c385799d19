use super::JudgmentClient;
use crate::errors::ProviderError;
use crate::model::Judgment;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted judge for tests. An exhausted script answers with an API error.
#[derive(Default)]
pub struct FakeJudgmentClient {
    script: Mutex<VecDeque<Result<Judgment, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeJudgmentClient {
    pub fn new(script: Vec<Result<Judgment, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(j: Judgment, times: usize) -> Self {
        Self::new(std::iter::repeat(Ok(j)).take(times).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JudgmentClient for FakeJudgmentClient {
    async fn judge(&self, prompt: &str) -> Result<Judgment, ProviderError> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(j)) => Ok(j),
            Some(Err(message)) => Err(ProviderError::Api {
                status: 500,
                message,
            }),
            None => Err(ProviderError::Api {
                status: 500,
                message: "fake judge script exhausted".into(),
            }),
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-judge"
    }
}
