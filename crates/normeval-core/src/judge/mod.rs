//! Contextual judge: rubric prompt -> structured judgment -> consistency check -> persistence.

pub mod prompt;

use crate::config::{JudgeConfig, JudgeEndpoint};
use crate::engine::{secs_to_duration, sleep_or_cancel, with_timeout, CancelToken};
use crate::errors::{ConfigError, ConsistencyError};
use crate::model::{Answer, Judgment, LlmModel, Question};
use crate::providers::judgment::JudgmentClient;
use crate::report::stats::JudgeStats;
use crate::scoring::{composite_score, validate_consistency};
use crate::selector::{answers_to_judge, SelectionFilter};
use crate::storage::Store;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Clone)]
pub enum JudgeSource {
    Live(Arc<dyn JudgmentClient>),
    /// Fixed judgment, nothing persisted.
    Simulated,
}

#[derive(Debug, Clone)]
pub struct JudgeSettings {
    /// Applied before every judging call, simulated ones included.
    pub rate_limit_delay: Duration,
    /// Caller-level pause between items of a batch.
    pub item_delay: Duration,
    pub timeout_secs: u64,
}

impl JudgeSettings {
    pub fn from_endpoint(
        ep: &JudgeEndpoint,
        rate_limit_delay_secs: f64,
        item_delay_secs: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            rate_limit_delay: secs_to_duration("judge.rate_limit_delay_secs", rate_limit_delay_secs)?,
            item_delay: secs_to_duration("judge delay", item_delay_secs)?,
            timeout_secs: ep.timeout_secs,
        })
    }

    /// Settings for simulate mode, where no endpoint (and no credential) exists.
    pub fn from_config(
        cfg: &JudgeConfig,
        rate_limit_delay_secs: f64,
        item_delay_secs: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            rate_limit_delay: secs_to_duration("judge.rate_limit_delay_secs", rate_limit_delay_secs)?,
            item_delay: secs_to_duration("judge delay", item_delay_secs)?,
            timeout_secs: cfg.request_timeout_secs,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Assessment {
    pub judgment: Judgment,
    pub composite: f64,
    pub inconsistency: Option<ConsistencyError>,
}

#[derive(Debug, Clone)]
pub enum JudgeOutcome {
    Judged(Assessment),
    /// The answer had no text; no call was made.
    NoText,
    Failed(String),
    Cancelled,
}

pub struct ContextualJudge {
    source: JudgeSource,
    settings: JudgeSettings,
}

impl ContextualJudge {
    pub fn new(source: JudgeSource, settings: JudgeSettings) -> Self {
        Self { source, settings }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.source, JudgeSource::Simulated)
    }

    /// (provider, judge model) for logging.
    pub fn describe(&self) -> (&'static str, &str) {
        match &self.source {
            JudgeSource::Live(client) => (client.provider_name(), client.model()),
            JudgeSource::Simulated => ("simulated", "simulated"),
        }
    }

    /// Judges one answer. External faults become `Failed`; inconsistent judgments
    /// are logged and still returned.
    pub async fn judge(&self, question: &Question, answer: &Answer, cancel: &CancelToken) -> JudgeOutcome {
        let Some(text) = answer.response_text.as_deref().filter(|t| !t.trim().is_empty()) else {
            tracing::warn!(event = "judge.no_text", answer_id = answer.id);
            return JudgeOutcome::NoText;
        };

        if sleep_or_cancel(self.settings.rate_limit_delay, cancel).await {
            return JudgeOutcome::Cancelled;
        }

        let client = match &self.source {
            JudgeSource::Simulated => {
                return JudgeOutcome::Judged(assess(simulated_judgment(question), answer.id));
            }
            JudgeSource::Live(client) => client,
        };

        let prompt = prompt::build_prompt(question, text);
        let call = with_timeout(self.settings.timeout_secs, client.judge(&prompt));
        let result = tokio::select! {
            r = call => r,
            _ = cancel.cancelled() => return JudgeOutcome::Cancelled,
        };

        match result {
            Ok(judgment) => JudgeOutcome::Judged(assess(judgment, answer.id)),
            Err(e) => {
                tracing::error!(event = "judge.call_failed", answer_id = answer.id, error = %e);
                JudgeOutcome::Failed(e.to_string())
            }
        }
    }
}

fn assess(judgment: Judgment, answer_id: i64) -> Assessment {
    let inconsistency = validate_consistency(&judgment).err();
    if let Some(e) = &inconsistency {
        tracing::warn!(event = "judge.inconsistent", answer_id, error = %e, "accepting inconsistent judgment");
    }
    Assessment {
        composite: composite_score(&judgment),
        judgment,
        inconsistency,
    }
}

pub fn simulated_judgment(question: &Question) -> Judgment {
    Judgment {
        correct: true,
        norm_mentioned: true,
        item_mentioned: false,
        source_cited: true,
        clarity: 4,
        technical_grounding: 4,
        concision: 3,
        norm_conformance: 4,
        technical_completeness: 4,
        rationale: format!(
            "[SIMULAÇÃO] Avaliação simulada para pergunta #{} - {}",
            question.number, question.norm_reference
        ),
        correct_points: vec![
            "Resposta tecnicamente correta".into(),
            "Boa explicação".into(),
        ],
        incorrect_points: vec!["Não menciona item específico da norma".into()],
    }
}

/// One accepted judgment, as exported by `judge --out`.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeResult {
    pub answer_id: i64,
    pub judgment: Judgment,
    pub composite_score: f64,
    pub question_number: i64,
    pub model: String,
    pub configuration: String,
    pub timestamp: String,
    pub norm: String,
    pub item: String,
    pub disputed: bool,
    pub inconsistency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JudgeItemOutcome {
    Judged { composite: f64, inconsistent: bool },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgeItem {
    pub question_number: i64,
    pub answer_id: i64,
    pub outcome: JudgeItemOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JudgeSummary {
    pub model: String,
    pub configuration: String,
    pub selected: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub inconsistent: usize,
    pub interrupted: bool,
    pub items: Vec<JudgeItem>,
    pub results: Vec<JudgeResult>,
    pub stats: Option<JudgeStats>,
}

impl JudgeSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn results_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.results)?)
    }
}

pub struct JudgeBatch {
    store: Store,
    judge: ContextualJudge,
}

impl JudgeBatch {
    pub fn new(store: Store, judge: ContextualJudge) -> Self {
        Self { store, judge }
    }

    pub async fn run(
        &self,
        model: &LlmModel,
        configuration: &str,
        filter: &SelectionFilter,
        cancel: &CancelToken,
    ) -> anyhow::Result<JudgeSummary> {
        self.run_with_progress(model, configuration, filter, cancel, |_| {})
            .await
    }

    pub async fn run_with_progress(
        &self,
        model: &LlmModel,
        configuration: &str,
        filter: &SelectionFilter,
        cancel: &CancelToken,
        mut on_item: impl FnMut(&JudgeItem),
    ) -> anyhow::Result<JudgeSummary> {
        let work = answers_to_judge(&self.store, model.id, configuration, filter)?;
        let mut summary = JudgeSummary {
            model: model.name.clone(),
            configuration: configuration.to_string(),
            selected: work.len(),
            ..Default::default()
        };

        let (provider, judge_model) = self.judge.describe();
        tracing::info!(
            event = "judge.start",
            model = %model.name,
            provider,
            judge_model = %judge_model,
            configuration = %configuration,
            selected = work.len(),
            simulate = self.judge.is_simulated(),
            overwrite = filter.overwrite
        );

        for (idx, w) in work.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let outcome = match self.judge.judge(&w.question, &w.answer, cancel).await {
                JudgeOutcome::Cancelled => {
                    summary.interrupted = true;
                    break;
                }
                JudgeOutcome::NoText => JudgeItemOutcome::Failed {
                    error: "answer has no text".into(),
                },
                JudgeOutcome::Failed(error) => JudgeItemOutcome::Failed { error },
                JudgeOutcome::Judged(a) => self.accept(model, configuration, &w.question, &w.answer, a, &mut summary),
            };

            let item = JudgeItem {
                question_number: w.question.number,
                answer_id: w.answer.id,
                outcome,
            };
            match &item.outcome {
                JudgeItemOutcome::Judged { composite, inconsistent } => {
                    summary.evaluated += 1;
                    if *inconsistent {
                        summary.inconsistent += 1;
                    }
                    tracing::info!(
                        event = "judge.item",
                        question = item.question_number,
                        answer_id = item.answer_id,
                        outcome = "judged",
                        composite = *composite,
                        inconsistent = *inconsistent
                    );
                }
                JudgeItemOutcome::Failed { error } => {
                    summary.failed += 1;
                    tracing::error!(
                        event = "judge.item",
                        question = item.question_number,
                        answer_id = item.answer_id,
                        outcome = "failed",
                        error = %error
                    );
                }
            }
            on_item(&item);
            summary.items.push(item);

            let is_last = idx + 1 == work.len();
            if !is_last && sleep_or_cancel(self.judge.settings.item_delay, cancel).await {
                summary.interrupted = true;
                break;
            }
        }

        summary.stats = JudgeStats::from_results(&summary.results);
        tracing::info!(
            event = "judge.done",
            model = %model.name,
            configuration = %configuration,
            selected = summary.selected,
            evaluated = summary.evaluated,
            failed = summary.failed,
            inconsistent = summary.inconsistent,
            interrupted = summary.interrupted
        );
        Ok(summary)
    }

    fn accept(
        &self,
        model: &LlmModel,
        configuration: &str,
        question: &Question,
        answer: &Answer,
        a: Assessment,
        summary: &mut JudgeSummary,
    ) -> JudgeItemOutcome {
        if !self.judge.is_simulated() {
            if let Err(e) = self.store.apply_judgment(answer.id, &a.judgment) {
                return JudgeItemOutcome::Failed {
                    error: format!("{:#}", e),
                };
            }
        }

        let inconsistent = a.inconsistency.is_some();
        summary.results.push(JudgeResult {
            answer_id: answer.id,
            composite_score: a.composite,
            question_number: question.number,
            model: model.name.clone(),
            configuration: configuration.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            norm: question.norm.clone(),
            item: question.item.clone(),
            disputed: question.flags.disputed,
            inconsistency: a.inconsistency.map(|e| e.to_string()),
            judgment: a.judgment,
        });
        JudgeItemOutcome::Judged {
            composite: a.composite,
            inconsistent,
        }
    }
}
