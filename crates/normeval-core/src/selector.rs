//! Work-remaining queries shared by the generator and the judge.
//!
//! Both queries are idempotent: after a partial run with `overwrite == false`
//! they return exactly the items that still have no answer (or no judgment).

use crate::model::{Answer, Question};
use crate::storage::store::{
    answer_from_row, question_from_row, ANSWER_COLUMNS, QUESTION_COLUMNS, QUESTION_COLUMN_COUNT,
};
use crate::storage::Store;
use rusqlite::types::Value;

#[derive(Debug, Clone, Default)]
pub struct SelectionFilter {
    pub norm: Option<String>,
    pub interesting_only: bool,
    pub disputed_only: bool,
    pub limit: Option<usize>,
    /// Minimum question number (inclusive).
    pub start_from: Option<i64>,
    pub overwrite: bool,
}

/// One answer awaiting judgment, with its question.
#[derive(Debug, Clone)]
pub struct JudgeWorkItem {
    pub question: Question,
    pub answer: Answer,
}

/// Questions still lacking an answer for (model, configuration), by number.
pub fn questions_to_generate(
    store: &Store,
    model_id: i64,
    configuration: &str,
    filter: &SelectionFilter,
) -> anyhow::Result<Vec<Question>> {
    let mut sql = format!("SELECT {} FROM questions q WHERE 1 = 1", QUESTION_COLUMNS);
    let mut args: Vec<Value> = Vec::new();

    push_question_filters(filter, &mut sql, &mut args);
    if !filter.overwrite {
        args.push(Value::Integer(model_id));
        let m = args.len();
        args.push(Value::Text(configuration.to_string()));
        let c = args.len();
        sql.push_str(&format!(
            " AND NOT EXISTS (SELECT 1 FROM answers a
                  WHERE a.question_id = q.id AND a.model_id = ?{} AND a.configuration = ?{})",
            m, c
        ));
    }
    sql.push_str(" ORDER BY q.number ASC");
    push_limit(filter, &mut sql, &mut args);

    let conn = store.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |r| {
        question_from_row(r, 0)
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Answers with text that still lack any of the three sub-scores.
pub fn answers_to_judge(
    store: &Store,
    model_id: i64,
    configuration: &str,
    filter: &SelectionFilter,
) -> anyhow::Result<Vec<JudgeWorkItem>> {
    let mut args: Vec<Value> = vec![
        Value::Integer(model_id),
        Value::Text(configuration.to_string()),
    ];
    let mut sql = format!(
        "SELECT {}, {} FROM answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.model_id = ?1 AND a.configuration = ?2
           AND a.response_text IS NOT NULL AND TRIM(a.response_text) <> ''",
        QUESTION_COLUMNS, ANSWER_COLUMNS
    );

    push_question_filters(filter, &mut sql, &mut args);
    if !filter.overwrite {
        sql.push_str(
            " AND (a.clarity IS NULL OR a.technical_grounding IS NULL OR a.concision IS NULL)",
        );
    }
    sql.push_str(" ORDER BY q.number ASC");
    push_limit(filter, &mut sql, &mut args);

    let conn = store.conn()?;
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |r| {
        Ok(JudgeWorkItem {
            question: question_from_row(r, 0)?,
            answer: answer_from_row(r, QUESTION_COLUMN_COUNT)?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Appends the question-side narrowing filters (`q` alias) as numbered parameters.
pub(crate) fn push_question_filters(
    filter: &SelectionFilter,
    sql: &mut String,
    args: &mut Vec<Value>,
) {
    if let Some(start) = filter.start_from {
        args.push(Value::Integer(start));
        sql.push_str(&format!(" AND q.number >= ?{}", args.len()));
    }
    if let Some(norm) = &filter.norm {
        args.push(Value::Text(norm.clone()));
        sql.push_str(&format!(" AND q.norm = ?{}", args.len()));
    }
    if filter.interesting_only {
        sql.push_str(" AND q.flag_interesting = 1");
    }
    if filter.disputed_only {
        sql.push_str(" AND q.flag_disputed = 1");
    }
}

// A limit of 0 means no limit.
fn push_limit(filter: &SelectionFilter, sql: &mut String, args: &mut Vec<Value>) {
    if let Some(limit) = filter.limit.filter(|&l| l > 0) {
        args.push(Value::Integer(limit as i64));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
    }
}
