use super::prompts::{simulated_answer, PromptStrategy};
use super::{secs_to_duration, sleep_or_cancel, with_timeout, CancelToken};
use crate::config::{GenerationConfig, GenerationEndpoint, ModelRemap};
use crate::errors::{ConfigError, ProviderError};
use crate::model::{round_secs, GeneratedText, InsertOutcome, LlmModel, NewAnswer, Question};
use crate::providers::llm::{ChatRequest, LlmClient};
use crate::selector::{questions_to_generate, SelectionFilter};
use crate::storage::Store;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

pub const SIMULATED_FIRST_TOKEN_SECS: f64 = 0.85;
pub const SIMULATED_TOTAL_SECS: f64 = 1.20;

/// Where answers come from.
#[derive(Clone)]
pub enum AnswerSource {
    Live(Arc<dyn LlmClient>),
    /// Templated placeholder, nothing persisted.
    Simulated,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Pause after every item except the last.
    pub delay: Duration,
    pub timeout_secs: u64,
    pub remap: ModelRemap,
}

impl GeneratorSettings {
    pub fn from_endpoint(ep: &GenerationEndpoint, delay_secs: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            max_tokens: ep.max_tokens,
            temperature: ep.temperature,
            delay: secs_to_duration("generation delay", delay_secs)?,
            timeout_secs: ep.timeout_secs,
            remap: ep.remap.clone(),
        })
    }

    /// Settings for simulate mode, where no endpoint (and no credential) exists.
    pub fn from_config(
        cfg: &GenerationConfig,
        base_url: &str,
        delay_secs: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            delay: secs_to_duration("generation delay", delay_secs)?,
            timeout_secs: cfg.request_timeout_secs,
            remap: ModelRemap::for_base_url(base_url).with_aliases(&cfg.model_aliases),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Saved { answer_id: i64 },
    /// Simulate mode: produced but not persisted.
    WouldSave,
    /// A row for the triple appeared between selection and insert.
    SkippedExisting,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationItem {
    pub question_number: i64,
    pub outcome: ItemOutcome,
    pub first_token_secs: Option<f64>,
    pub total_secs: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationSummary {
    pub model: String,
    pub configuration: String,
    pub selected: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub interrupted: bool,
    pub items: Vec<GenerationItem>,
}

impl GenerationSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, item: GenerationItem) {
        match item.outcome {
            ItemOutcome::Saved { .. } | ItemOutcome::WouldSave => self.succeeded += 1,
            ItemOutcome::SkippedExisting => self.skipped += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
        self.items.push(item);
    }
}

pub struct AnswerGenerator {
    store: Store,
    source: AnswerSource,
    settings: GeneratorSettings,
}

impl AnswerGenerator {
    pub fn new(store: Store, source: AnswerSource, settings: GeneratorSettings) -> Self {
        Self {
            store,
            source,
            settings,
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.source, AnswerSource::Simulated)
    }

    pub fn provider_name(&self) -> &'static str {
        match &self.source {
            AnswerSource::Live(client) => client.provider_name(),
            AnswerSource::Simulated => "simulated",
        }
    }

    pub async fn run(
        &self,
        model: &LlmModel,
        configuration: &str,
        filter: &SelectionFilter,
        cancel: &CancelToken,
    ) -> anyhow::Result<GenerationSummary> {
        self.run_with_progress(model, configuration, filter, cancel, |_| {})
            .await
    }

    /// Processes every unanswered question for (model, configuration).
    /// Per-item failures are recorded and the loop moves on.
    pub async fn run_with_progress(
        &self,
        model: &LlmModel,
        configuration: &str,
        filter: &SelectionFilter,
        cancel: &CancelToken,
        mut on_item: impl FnMut(&GenerationItem),
    ) -> anyhow::Result<GenerationSummary> {
        let work = questions_to_generate(&self.store, model.id, configuration, filter)?;
        let mut summary = GenerationSummary {
            model: model.name.clone(),
            configuration: configuration.to_string(),
            selected: work.len(),
            ..Default::default()
        };

        tracing::info!(
            event = "generation.start",
            model = %model.name,
            api_model = %self.settings.remap.api_name(&model.name),
            provider = self.provider_name(),
            configuration = %configuration,
            selected = work.len(),
            simulate = self.is_simulated(),
            overwrite = filter.overwrite
        );

        for (idx, question) in work.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let produced = tokio::select! {
                r = self.produce(model, configuration, question) => Some(r),
                _ = cancel.cancelled() => None,
            };
            let Some(produced) = produced else {
                summary.interrupted = true;
                break;
            };

            let item = match produced {
                Ok(generated) => self.persist(model, configuration, question, generated, filter.overwrite),
                Err(e) => GenerationItem {
                    question_number: question.number,
                    outcome: ItemOutcome::Failed {
                        error: e.to_string(),
                    },
                    first_token_secs: None,
                    total_secs: None,
                },
            };
            log_item(&item, &model.name, configuration);
            on_item(&item);
            summary.record(item);

            let is_last = idx + 1 == work.len();
            if !is_last && sleep_or_cancel(self.settings.delay, cancel).await {
                summary.interrupted = true;
                break;
            }
        }

        tracing::info!(
            event = "generation.done",
            model = %model.name,
            configuration = %configuration,
            selected = summary.selected,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            interrupted = summary.interrupted
        );
        Ok(summary)
    }

    async fn produce(
        &self,
        model: &LlmModel,
        configuration: &str,
        question: &Question,
    ) -> Result<GeneratedText, ProviderError> {
        let client = match &self.source {
            AnswerSource::Simulated => {
                return Ok(GeneratedText {
                    text: simulated_answer(configuration, &model.name),
                    first_token_secs: SIMULATED_FIRST_TOKEN_SECS,
                    total_secs: SIMULATED_TOTAL_SECS,
                })
            }
            AnswerSource::Live(client) => client,
        };

        let request = ChatRequest {
            model: self.settings.remap.api_name(&model.name).to_string(),
            messages: PromptStrategy::from_label(configuration).messages(&question.text),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let started = Instant::now();
        let completion = with_timeout(self.settings.timeout_secs, client.complete(&request)).await?;
        let total = round_secs(started.elapsed().as_secs_f64());
        tracing::debug!(
            event = "generation.completion",
            question = question.number,
            requested = %request.model,
            served = %completion.model,
            chars = completion.text.len()
        );

        // Not streamed: first token arrives with the whole body.
        Ok(GeneratedText {
            text: completion.text,
            first_token_secs: total,
            total_secs: total,
        })
    }

    fn persist(
        &self,
        model: &LlmModel,
        configuration: &str,
        question: &Question,
        generated: GeneratedText,
        overwrite: bool,
    ) -> GenerationItem {
        let timing = (Some(generated.first_token_secs), Some(generated.total_secs));
        let outcome = if self.is_simulated() {
            ItemOutcome::WouldSave
        } else {
            let new = NewAnswer {
                question_id: question.id,
                model_id: model.id,
                configuration: configuration.to_string(),
                response_text: generated.text,
                first_token_secs: generated.first_token_secs,
                total_secs: generated.total_secs,
            };
            match self.store.insert_answer(&new, overwrite) {
                Ok(InsertOutcome::Inserted(id)) => ItemOutcome::Saved { answer_id: id },
                Ok(InsertOutcome::Duplicate) => ItemOutcome::SkippedExisting,
                Err(e) => ItemOutcome::Failed {
                    error: format!("{:#}", e),
                },
            }
        };
        GenerationItem {
            question_number: question.number,
            outcome,
            first_token_secs: timing.0,
            total_secs: timing.1,
        }
    }
}

fn log_item(item: &GenerationItem, model: &str, configuration: &str) {
    match &item.outcome {
        ItemOutcome::Saved { answer_id } => tracing::info!(
            event = "generation.item",
            question = item.question_number,
            outcome = "saved",
            answer_id = *answer_id,
            total_secs = item.total_secs,
            model = %model,
            configuration = %configuration
        ),
        ItemOutcome::WouldSave => tracing::info!(
            event = "generation.item",
            question = item.question_number,
            outcome = "would_save",
            total_secs = item.total_secs,
            model = %model,
            configuration = %configuration
        ),
        ItemOutcome::SkippedExisting => tracing::warn!(
            event = "generation.item",
            question = item.question_number,
            outcome = "skipped_existing",
            model = %model,
            configuration = %configuration,
            "answer already exists"
        ),
        ItemOutcome::Failed { error } => tracing::error!(
            event = "generation.item",
            question = item.question_number,
            outcome = "failed",
            error = %error,
            model = %model,
            configuration = %configuration
        ),
    }
}
