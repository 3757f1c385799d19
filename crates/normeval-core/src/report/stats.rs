use crate::engine::prompts::PromptStrategy;
use crate::judge::JudgeResult;
use crate::storage::{ModelStats, NormStats, Store};
use serde::Serialize;

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn pct(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(part as f64 * 100.0 / total as f64)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        round2(sum / n as f64)
    }
}

/// Aggregates over the accepted judgments of one judge batch.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JudgeStats {
    pub evaluated: usize,
    pub mean_composite: f64,
    /// Percentage of judgments with `correct == true`.
    pub accuracy_rate: f64,
    pub mean_clarity: f64,
    pub mean_technical_grounding: f64,
    pub mean_concision: f64,
    pub mean_norm_conformance: f64,
    pub mean_technical_completeness: f64,
    pub source_cited_rate: f64,
}

impl JudgeStats {
    pub fn from_results(results: &[JudgeResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let n = results.len() as i64;
        let count = |f: fn(&JudgeResult) -> bool| results.iter().filter(|r| f(r)).count() as i64;
        Some(Self {
            evaluated: results.len(),
            mean_composite: mean(results.iter().map(|r| r.composite_score)),
            accuracy_rate: pct(count(|r| r.judgment.correct), n),
            mean_clarity: mean(results.iter().map(|r| r.judgment.clarity as f64)),
            mean_technical_grounding: mean(
                results.iter().map(|r| r.judgment.technical_grounding as f64),
            ),
            mean_concision: mean(results.iter().map(|r| r.judgment.concision as f64)),
            mean_norm_conformance: mean(results.iter().map(|r| r.judgment.norm_conformance as f64)),
            mean_technical_completeness: mean(
                results.iter().map(|r| r.judgment.technical_completeness as f64),
            ),
            source_cited_rate: pct(count(|r| r.judgment.source_cited), n),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub total: i64,
    pub correct: i64,
    pub accuracy_pct: f64,
    pub mean_total_secs: Option<f64>,
    pub mean_clarity: Option<f64>,
    pub mean_technical_grounding: Option<f64>,
    pub mean_concision: Option<f64>,
    pub mean_aggregate: Option<f64>,
    pub sources_cited: i64,
    pub source_rate_pct: f64,
}

impl From<ModelStats> for ModelReport {
    fn from(s: ModelStats) -> Self {
        Self {
            accuracy_pct: pct(s.correct, s.total),
            source_rate_pct: pct(s.sources_cited, s.total),
            mean_total_secs: s.mean_total_secs.map(round2),
            mean_clarity: s.mean_clarity.map(round2),
            mean_technical_grounding: s.mean_technical_grounding.map(round2),
            mean_concision: s.mean_concision.map(round2),
            mean_aggregate: s.mean_aggregate.map(round2),
            model: s.model,
            total: s.total,
            correct: s.correct,
            sources_cited: s.sources_cited,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NormReport {
    pub norm: String,
    pub total: i64,
    pub correct: i64,
    pub accuracy_pct: f64,
    pub mean_total_secs: Option<f64>,
    pub mean_aggregate: Option<f64>,
}

impl From<NormStats> for NormReport {
    fn from(s: NormStats) -> Self {
        Self {
            accuracy_pct: pct(s.correct, s.total),
            mean_total_secs: s.mean_total_secs.map(round2),
            mean_aggregate: s.mean_aggregate.map(round2),
            norm: s.norm,
            total: s.total,
            correct: s.correct,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub generated_at: String,
    pub configuration: Option<String>,
    pub models: Vec<ModelReport>,
    pub norms: Vec<NormReport>,
}

pub fn build_report(store: &Store, configuration: Option<&str>) -> anyhow::Result<ExperimentReport> {
    Ok(ExperimentReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        configuration: configuration.map(String::from),
        models: store
            .model_stats(configuration)?
            .into_iter()
            .map(ModelReport::from)
            .collect(),
        norms: store
            .norm_stats(configuration)?
            .into_iter()
            .map(NormReport::from)
            .collect(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
    pub model: String,
    pub configuration: String,
    pub completed: i64,
    pub total: i64,
    pub pct: f64,
    pub judged: i64,
}

/// Progress per (model x configuration). Without a configuration filter the
/// recognized configurations are listed.
pub fn experiment_status(
    store: &Store,
    model: Option<&str>,
    configuration: Option<&str>,
) -> anyhow::Result<Vec<StatusRow>> {
    let total = store.count_rows("questions")?;
    let models = match model {
        Some(name) => vec![store.resolve_model(name)?],
        None => store.list_models()?,
    };
    let configs: Vec<String> = match configuration {
        Some(c) => vec![c.to_string()],
        None => PromptStrategy::RECOGNIZED
            .iter()
            .map(|s| s.label().to_string())
            .collect(),
    };

    let mut rows = Vec::new();
    for m in &models {
        for c in &configs {
            let (completed, judged) = store.progress(m.id, c)?;
            rows.push(StatusRow {
                model: m.name.clone(),
                configuration: c.clone(),
                completed,
                total,
                pct: pct(completed, total),
                judged,
            });
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::simulated_judgment;
    use crate::model::{Question, QuestionFlags};

    fn result(correct: bool, composite: f64) -> JudgeResult {
        let q = Question {
            id: 1,
            number: 1,
            text: "q".into(),
            expected_answer: "7 metros".into(),
            norm: "NT-09".into(),
            item: "6.7.3".into(),
            norm_reference: "NT-09 - 6.7.3".into(),
            flags: QuestionFlags::default(),
        };
        let mut j = simulated_judgment(&q);
        j.correct = correct;
        JudgeResult {
            answer_id: 1,
            judgment: j,
            composite_score: composite,
            question_number: 1,
            model: "gpt-4.1".into(),
            configuration: "no-rag".into(),
            timestamp: "2025-07-02T11:30:18+00:00".into(),
            norm: "NT-09".into(),
            item: "6.7.3".into(),
            disputed: false,
            inconsistency: None,
        }
    }

    #[test]
    fn judge_stats_over_results() {
        let stats = JudgeStats::from_results(&[result(true, 5.8), result(false, 3.0), result(true, 5.2)])
            .unwrap();
        assert_eq!(stats.evaluated, 3);
        assert_eq!(stats.accuracy_rate, 66.7);
        assert_eq!(stats.mean_composite, 4.67);
        assert_eq!(stats.mean_concision, 3.0);
        assert_eq!(stats.source_cited_rate, 100.0);
    }

    #[test]
    fn empty_results_have_no_stats() {
        assert!(JudgeStats::from_results(&[]).is_none());
    }

    #[test]
    fn percentages_round_to_one_decimal() {
        assert_eq!(pct(1, 3), 33.3);
        assert_eq!(pct(2, 3), 66.7);
        assert_eq!(pct(0, 0), 0.0);
    }
}
