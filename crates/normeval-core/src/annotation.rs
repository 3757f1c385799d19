//! Human override of the judge's correctness verdict.

use crate::model::Answer;
use crate::selector::{push_question_filters, SelectionFilter};
use crate::storage::Store;
use rusqlite::types::Value;
use serde::Serialize;

const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Clone, Default)]
pub struct AnnotationFilter {
    pub model: Option<String>,
    pub configuration: Option<String>,
    pub norm: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingAnnotation {
    pub answer_id: i64,
    pub question_number: i64,
    pub norm_reference: String,
    pub model: String,
    pub configuration: String,
    pub expected_answer: String,
    pub excerpt: String,
    /// Correctness as currently stored (judge verdict or default).
    pub correct: bool,
    pub aggregate_score: Option<i64>,
}

/// Answers no human has annotated yet, ordered by question number then model.
pub fn pending(store: &Store, filter: &AnnotationFilter) -> anyhow::Result<Vec<PendingAnnotation>> {
    let mut args: Vec<Value> = Vec::new();
    let mut sql = String::from(
        "SELECT a.id, q.number, q.norm_reference, m.name, a.configuration, q.expected_answer,
                a.response_text, a.correct, a.aggregate_score
         FROM answers a
         JOIN questions q ON q.id = a.question_id
         JOIN models m ON m.id = a.model_id
         WHERE a.human_correct IS NULL",
    );

    if let Some(name) = &filter.model {
        let model = store.resolve_model(name)?;
        args.push(Value::Integer(model.id));
        sql.push_str(&format!(" AND a.model_id = ?{}", args.len()));
    }
    if let Some(c) = &filter.configuration {
        args.push(Value::Text(c.clone()));
        sql.push_str(&format!(" AND a.configuration = ?{}", args.len()));
    }
    let qf = SelectionFilter {
        norm: filter.norm.clone(),
        ..Default::default()
    };
    push_question_filters(&qf, &mut sql, &mut args);
    sql.push_str(" ORDER BY q.number ASC, m.name ASC, a.configuration ASC");
    if let Some(limit) = filter.limit.filter(|&l| l > 0) {
        args.push(Value::Integer(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
    }

    let conn = store.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |r| {
        let text: Option<String> = r.get(6)?;
        Ok(PendingAnnotation {
            answer_id: r.get(0)?,
            question_number: r.get(1)?,
            norm_reference: r.get(2)?,
            model: r.get(3)?,
            configuration: r.get(4)?,
            expected_answer: r.get(5)?,
            excerpt: excerpt(text.as_deref().unwrap_or("")),
            correct: r.get(7)?,
            aggregate_score: r.get(8)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Records the human verdict; the aggregate is recomputed with the new correctness.
pub fn mark(store: &Store, answer_id: i64, correct: bool) -> anyhow::Result<Answer> {
    let answer = store.annotate(answer_id, correct)?;
    tracing::info!(
        event = "annotation.marked",
        answer_id,
        correct,
        aggregate = answer.aggregate_score
    );
    Ok(answer)
}

fn excerpt(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("# Título\n\n7  metros"), "# Título 7 metros");
        let long = "á".repeat(500);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 1);
        assert!(e.ends_with('…'));
    }
}
