use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionFlags {
    #[serde(default)]
    pub disputed: bool,
    #[serde(default)]
    pub test_set: bool,
    #[serde(default)]
    pub interesting: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub number: i64,
    pub text: String,
    pub expected_answer: String,
    pub norm: String,
    pub item: String,
    pub norm_reference: String,
    #[serde(default)]
    pub flags: QuestionFlags,
}

/// Input shape for catalog imports (`questions import`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub number: i64,
    pub text: String,
    pub expected_answer: String,
    pub norm: String,
    pub item: String,
    #[serde(default)]
    pub flags: QuestionFlags,
}

impl NewQuestion {
    pub fn norm_reference(&self) -> String {
        norm_reference(&self.norm, &self.item)
    }
}

pub fn norm_reference(norm: &str, item: &str) -> String {
    format!("{} - {}", norm, item)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmModel {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub model_id: i64,
    pub configuration: String,
    pub response_text: Option<String>,
    pub first_token_secs: Option<f64>,
    pub total_secs: Option<f64>,
    pub correct: bool,
    pub clarity: Option<u8>,
    pub technical_grounding: Option<u8>,
    pub concision: Option<u8>,
    pub source_cited: bool,
    pub rationale: Option<String>,
    pub aggregate_score: Option<i64>,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub human_correct: Option<bool>,
    pub human_annotated_at: Option<String>,
}

impl Answer {
    pub fn has_text(&self) -> bool {
        self.response_text
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    pub fn is_judged(&self) -> bool {
        self.clarity.is_some() && self.technical_grounding.is_some() && self.concision.is_some()
    }
}

/// What the Generator hands to the store for one question.
#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub question_id: i64,
    pub model_id: i64,
    pub configuration: String,
    pub response_text: String,
    pub first_token_secs: f64,
    pub total_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// The (question, model, configuration) triple already had a row.
    Duplicate,
}

/// Structured judgment returned by the judging service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Judgment {
    pub correct: bool,
    pub norm_mentioned: bool,
    pub item_mentioned: bool,
    pub source_cited: bool,
    pub clarity: u8,
    pub technical_grounding: u8,
    pub concision: u8,
    pub norm_conformance: u8,
    pub technical_completeness: u8,
    pub rationale: String,
    pub correct_points: Vec<String>,
    #[serde(default)]
    pub incorrect_points: Vec<String>,
}

/// Raw LLM text plus timing, as produced by one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub first_token_secs: f64,
    pub total_secs: f64,
}

/// Rounds to the two decimals the catalog keeps for timings.
pub fn round_secs(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_answer() -> Answer {
        Answer {
            id: 1,
            question_id: 1,
            model_id: 1,
            configuration: "no-rag".into(),
            response_text: None,
            first_token_secs: None,
            total_secs: None,
            correct: false,
            clarity: None,
            technical_grounding: None,
            concision: None,
            source_cited: false,
            rationale: None,
            aggregate_score: None,
            created_at: "2025-07-02T11:30:18+00:00".into(),
            updated_at: None,
            human_correct: None,
            human_annotated_at: None,
        }
    }

    #[test]
    fn whitespace_only_text_counts_as_empty() {
        let mut a = blank_answer();
        assert!(!a.has_text());
        a.response_text = Some("  \n".into());
        assert!(!a.has_text());
        a.response_text = Some("7 metros".into());
        assert!(a.has_text());
    }

    #[test]
    fn judged_requires_all_three_subscores() {
        let mut a = blank_answer();
        a.clarity = Some(4);
        a.technical_grounding = Some(4);
        assert!(!a.is_judged());
        a.concision = Some(3);
        assert!(a.is_judged());
    }

    #[test]
    fn norm_reference_joins_norm_and_item() {
        assert_eq!(norm_reference("NT-09", "6.7.3"), "NT-09 - 6.7.3");
    }

    #[test]
    fn judgment_defaults_missing_incorrect_points() {
        let j: Judgment = serde_json::from_value(serde_json::json!({
            "correct": true,
            "norm_mentioned": true,
            "item_mentioned": false,
            "source_cited": false,
            "clarity": 4,
            "technical_grounding": 4,
            "concision": 3,
            "norm_conformance": 4,
            "technical_completeness": 4,
            "rationale": "ok",
            "correct_points": ["valor correto"]
        }))
        .unwrap();
        assert!(j.incorrect_points.is_empty());
    }

    #[test]
    fn timings_round_to_hundredths() {
        assert_eq!(round_secs(1.23456), 1.23);
        assert_eq!(round_secs(0.8549), 0.85);
        assert_eq!(round_secs(2.0), 2.0);
    }
}
