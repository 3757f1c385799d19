use crate::errors::ConfigError;
use crate::model::{
    norm_reference, Answer, InsertOutcome, Judgment, LlmModel, NewAnswer, NewQuestion, Question,
    QuestionFlags,
};
use crate::scoring;
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub questions: i64,
    pub models: i64,
    pub answers: i64,
    pub judged: i64,
    pub annotated: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionUpsert {
    Inserted,
    Updated,
    Skipped,
}

/// Partial flag update; `None` leaves the flag untouched.
#[derive(Debug, Clone, Default)]
pub struct FlagUpdate {
    pub disputed: Option<bool>,
    pub test_set: Option<bool>,
    pub interesting: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub model: String,
    pub total: i64,
    pub correct: i64,
    pub mean_total_secs: Option<f64>,
    pub mean_clarity: Option<f64>,
    pub mean_technical_grounding: Option<f64>,
    pub mean_concision: Option<f64>,
    pub mean_aggregate: Option<f64>,
    pub sources_cited: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormStats {
    pub norm: String,
    pub total: i64,
    pub correct: i64,
    pub mean_total_secs: Option<f64>,
    pub mean_aggregate: Option<f64>,
}

pub(crate) const QUESTION_COLUMNS: &str = "q.id, q.number, q.text, q.expected_answer, q.norm, \
     q.item, q.norm_reference, q.flag_disputed, q.flag_test_set, q.flag_interesting";
pub(crate) const QUESTION_COLUMN_COUNT: usize = 10;

pub(crate) const ANSWER_COLUMNS: &str = "a.id, a.question_id, a.model_id, a.configuration, \
     a.response_text, a.first_token_secs, a.total_secs, a.correct, a.clarity, \
     a.technical_grounding, a.concision, a.source_cited, a.rationale, a.aggregate_score, \
     a.created_at, a.updated_at, a.human_correct, a.human_annotated_at";

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection mutex poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        migrate_flags_and_annotation(&conn)?;
        Ok(())
    }

    // --- Questions ---

    pub fn upsert_question(&self, q: &NewQuestion, update: bool) -> anyhow::Result<QuestionUpsert> {
        let conn = self.conn()?;
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM questions WHERE number = ?1",
                params![q.number],
                |r| r.get(0),
            )
            .optional()?;

        match existing {
            Some(_) if !update => Ok(QuestionUpsert::Skipped),
            Some(id) => {
                conn.execute(
                    "UPDATE questions
                     SET text = ?1, expected_answer = ?2, norm = ?3, item = ?4, norm_reference = ?5,
                         flag_disputed = ?6, flag_test_set = ?7, flag_interesting = ?8
                     WHERE id = ?9",
                    params![
                        q.text,
                        q.expected_answer,
                        q.norm,
                        q.item,
                        q.norm_reference(),
                        q.flags.disputed,
                        q.flags.test_set,
                        q.flags.interesting,
                        id
                    ],
                )?;
                Ok(QuestionUpsert::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO questions
                       (number, text, expected_answer, norm, item, norm_reference,
                        flag_disputed, flag_test_set, flag_interesting)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        q.number,
                        q.text,
                        q.expected_answer,
                        q.norm,
                        q.item,
                        q.norm_reference(),
                        q.flags.disputed,
                        q.flags.test_set,
                        q.flags.interesting
                    ],
                )?;
                Ok(QuestionUpsert::Inserted)
            }
        }
    }

    pub fn question_by_number(&self, number: i64) -> anyhow::Result<Option<Question>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM questions q WHERE q.number = ?1", QUESTION_COLUMNS);
        let q = conn
            .query_row(&sql, params![number], |r| question_from_row(r, 0))
            .optional()?;
        Ok(q)
    }

    pub fn list_questions(&self, norm: Option<&str>) -> anyhow::Result<Vec<Question>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM questions q
             WHERE (?1 IS NULL OR q.norm = ?1)
             ORDER BY q.number ASC",
            QUESTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![norm], |r| question_from_row(r, 0))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn set_question_flags(&self, number: i64, update: &FlagUpdate) -> anyhow::Result<Question> {
        {
            let conn = self.conn()?;
            let n = conn.execute(
                "UPDATE questions
                 SET flag_disputed = COALESCE(?1, flag_disputed),
                     flag_test_set = COALESCE(?2, flag_test_set),
                     flag_interesting = COALESCE(?3, flag_interesting)
                 WHERE number = ?4",
                params![update.disputed, update.test_set, update.interesting, number],
            )?;
            if n == 0 {
                anyhow::bail!("question #{} not found", number);
            }
        }
        self.question_by_number(number)?
            .ok_or_else(|| anyhow::anyhow!("question #{} vanished after update", number))
    }

    // --- Models ---

    pub fn insert_model(&self, name: &str, description: Option<&str>) -> anyhow::Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO models (name, description) VALUES (?1, ?2)",
            params![name, description],
        )
        .with_context(|| format!("failed to add model '{}'", name))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_models(&self) -> anyhow::Result<Vec<LlmModel>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name, description FROM models ORDER BY id ASC")?;
        let rows = stmt.query_map([], |r| {
            Ok(LlmModel {
                id: r.get(0)?,
                name: r.get(1)?,
                description: r.get(2)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn model_by_name(&self, name: &str) -> anyhow::Result<Option<LlmModel>> {
        let conn = self.conn()?;
        let m = conn
            .query_row(
                "SELECT id, name, description FROM models WHERE name = ?1",
                params![name],
                |r| {
                    Ok(LlmModel {
                        id: r.get(0)?,
                        name: r.get(1)?,
                        description: r.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(m)
    }

    /// Looks a model up by exact name; the error suggests the closest catalog entry.
    pub fn resolve_model(&self, name: &str) -> anyhow::Result<LlmModel> {
        if let Some(m) = self.model_by_name(name)? {
            return Ok(m);
        }
        let names: Vec<String> = self.list_models()?.into_iter().map(|m| m.name).collect();
        Err(ConfigError::UnknownModel {
            name: name.to_string(),
            suggestion: closest_name(name, &names),
        }
        .into())
    }

    // --- Answers ---

    /// Inserts one generated answer. With `overwrite`, any existing row for the same
    /// (question, model, configuration) is deleted inside the same transaction.
    pub fn insert_answer(&self, a: &NewAnswer, overwrite: bool) -> anyhow::Result<InsertOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if overwrite {
            tx.execute(
                "DELETE FROM answers WHERE question_id = ?1 AND model_id = ?2 AND configuration = ?3",
                params![a.question_id, a.model_id, a.configuration],
            )?;
        }

        let inserted = tx.execute(
            "INSERT INTO answers
               (question_id, model_id, configuration, response_text,
                first_token_secs, total_secs, correct, source_cited, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)",
            params![
                a.question_id,
                a.model_id,
                a.configuration,
                a.response_text,
                crate::model::round_secs(a.first_token_secs),
                crate::model::round_secs(a.total_secs),
                now_rfc3339()
            ],
        );

        match inserted {
            Ok(_) => {
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(InsertOutcome::Inserted(id))
            }
            Err(e) if is_unique_violation(&e) => {
                tx.rollback()?;
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e).context("failed to insert answer"),
        }
    }

    pub fn get_answer(&self, id: i64) -> anyhow::Result<Option<Answer>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM answers a WHERE a.id = ?1", ANSWER_COLUMNS);
        let a = conn
            .query_row(&sql, params![id], |r| answer_from_row(r, 0))
            .optional()?;
        Ok(a)
    }

    pub fn answers_for(&self, model_id: i64, configuration: &str) -> anyhow::Result<Vec<Answer>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM answers a
             JOIN questions q ON q.id = a.question_id
             WHERE a.model_id = ?1 AND a.configuration = ?2
             ORDER BY q.number ASC",
            ANSWER_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![model_id, configuration], |r| answer_from_row(r, 0))?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Writes an accepted judgment onto the answer and recomputes the aggregate.
    pub fn apply_judgment(&self, answer_id: i64, j: &Judgment) -> anyhow::Result<Answer> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let aggregate = scoring::aggregate_score(
                Some(j.clarity),
                Some(j.technical_grounding),
                Some(j.concision),
                j.correct,
                j.source_cited,
            );
            let n = tx.execute(
                "UPDATE answers
                 SET correct = ?1, source_cited = ?2, clarity = ?3, technical_grounding = ?4,
                     concision = ?5, rationale = ?6, aggregate_score = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    j.correct,
                    j.source_cited,
                    j.clarity,
                    j.technical_grounding,
                    j.concision,
                    j.rationale,
                    aggregate,
                    now_rfc3339(),
                    answer_id
                ],
            )?;
            if n != 1 {
                // dropping tx rolls back
                anyhow::bail!("judgment update touched {} rows for answer {}", n, answer_id);
            }
            tx.commit()?;
        }
        self.get_answer(answer_id)?
            .ok_or_else(|| anyhow::anyhow!("answer {} not found after judgment", answer_id))
    }

    /// Human override of correctness.
    pub fn annotate(&self, answer_id: i64, correct: bool) -> anyhow::Result<Answer> {
        let current = self
            .get_answer(answer_id)?
            .ok_or_else(|| anyhow::anyhow!("answer {} not found", answer_id))?;

        let aggregate = scoring::aggregate_score(
            current.clarity,
            current.technical_grounding,
            current.concision,
            correct,
            current.source_cited,
        );
        let now = now_rfc3339();
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let n = tx.execute(
                "UPDATE answers
                 SET correct = ?1, human_correct = ?1, human_annotated_at = ?2,
                     aggregate_score = ?3, updated_at = ?2
                 WHERE id = ?4",
                params![correct, now, aggregate, answer_id],
            )?;
            if n != 1 {
                anyhow::bail!("annotation touched {} rows for answer {}", n, answer_id);
            }
            tx.commit()?;
        }
        self.get_answer(answer_id)?
            .ok_or_else(|| anyhow::anyhow!("answer {} not found after annotation", answer_id))
    }

    // --- Counts & stats ---

    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        let allowed = ["questions", "models", "answers"];
        if !allowed.contains(&table) {
            anyhow::bail!("count_rows: unknown table '{}'", table);
        }
        let conn = self.conn()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn stats(&self) -> anyhow::Result<StoreStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> anyhow::Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
        Ok(StoreStats {
            questions: count("SELECT COUNT(*) FROM questions")?,
            models: count("SELECT COUNT(*) FROM models")?,
            answers: count("SELECT COUNT(*) FROM answers")?,
            judged: count(
                "SELECT COUNT(*) FROM answers
                 WHERE clarity IS NOT NULL AND technical_grounding IS NOT NULL AND concision IS NOT NULL",
            )?,
            annotated: count("SELECT COUNT(*) FROM answers WHERE human_correct IS NOT NULL")?,
        })
    }

    /// (answers recorded, answers judged) for one model and configuration.
    pub fn progress(&self, model_id: i64, configuration: &str) -> anyhow::Result<(i64, i64)> {
        let conn = self.conn()?;
        let row = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(clarity IS NOT NULL AND technical_grounding IS NOT NULL
                                 AND concision IS NOT NULL), 0)
             FROM answers WHERE model_id = ?1 AND configuration = ?2",
            params![model_id, configuration],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(row)
    }

    pub fn model_stats(&self, configuration: Option<&str>) -> anyhow::Result<Vec<ModelStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.name, COUNT(a.id), COALESCE(SUM(a.correct), 0), AVG(a.total_secs),
                    AVG(a.clarity), AVG(a.technical_grounding), AVG(a.concision),
                    AVG(a.aggregate_score), COALESCE(SUM(a.source_cited), 0)
             FROM models m
             JOIN answers a ON a.model_id = m.id
             WHERE (?1 IS NULL OR a.configuration = ?1)
             GROUP BY m.id
             ORDER BY m.name ASC",
        )?;
        let rows = stmt.query_map(params![configuration], |r| {
            Ok(ModelStats {
                model: r.get(0)?,
                total: r.get(1)?,
                correct: r.get(2)?,
                mean_total_secs: r.get(3)?,
                mean_clarity: r.get(4)?,
                mean_technical_grounding: r.get(5)?,
                mean_concision: r.get(6)?,
                mean_aggregate: r.get(7)?,
                sources_cited: r.get(8)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn norm_stats(&self, configuration: Option<&str>) -> anyhow::Result<Vec<NormStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT q.norm, COUNT(a.id), COALESCE(SUM(a.correct), 0), AVG(a.total_secs),
                    AVG(a.aggregate_score)
             FROM questions q
             JOIN answers a ON a.question_id = q.id
             WHERE (?1 IS NULL OR a.configuration = ?1)
             GROUP BY q.norm
             ORDER BY q.norm ASC",
        )?;
        let rows = stmt.query_map(params![configuration], |r| {
            Ok(NormStats {
                norm: r.get(0)?,
                total: r.get(1)?,
                correct: r.get(2)?,
                mean_total_secs: r.get(3)?,
                mean_aggregate: r.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

pub(crate) fn question_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Question> {
    let norm: String = row.get(offset + 4)?;
    let item: String = row.get(offset + 5)?;
    let stored_ref: Option<String> = row.get(offset + 6)?;
    Ok(Question {
        id: row.get(offset)?,
        number: row.get(offset + 1)?,
        text: row.get(offset + 2)?,
        expected_answer: row.get(offset + 3)?,
        norm_reference: stored_ref.unwrap_or_else(|| norm_reference(&norm, &item)),
        norm,
        item,
        flags: QuestionFlags {
            disputed: row.get(offset + 7)?,
            test_set: row.get(offset + 8)?,
            interesting: row.get(offset + 9)?,
        },
    })
}

pub(crate) fn answer_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Answer> {
    Ok(Answer {
        id: row.get(offset)?,
        question_id: row.get(offset + 1)?,
        model_id: row.get(offset + 2)?,
        configuration: row.get(offset + 3)?,
        response_text: row.get(offset + 4)?,
        first_token_secs: row.get(offset + 5)?,
        total_secs: row.get(offset + 6)?,
        correct: row.get(offset + 7)?,
        clarity: row.get(offset + 8)?,
        technical_grounding: row.get(offset + 9)?,
        concision: row.get(offset + 10)?,
        source_cited: row.get(offset + 11)?,
        rationale: row.get(offset + 12)?,
        aggregate_score: row.get(offset + 13)?,
        created_at: row.get(offset + 14)?,
        updated_at: row.get(offset + 15)?,
        human_correct: row.get(offset + 16)?,
        human_annotated_at: row.get(offset + 17)?,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub(crate) fn closest_name(name: &str, candidates: &[String]) -> Option<String> {
    let needle = name.to_lowercase();
    candidates
        .iter()
        .map(|c| (strsim::normalized_levenshtein(&needle, &c.to_lowercase()), c))
        .filter(|(score, _)| *score >= 0.5)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.clone())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn migrate_flags_and_annotation(conn: &Connection) -> anyhow::Result<()> {
    let cols = get_columns(conn, "questions")?;
    add_column_if_missing(conn, &cols, "questions", "flag_disputed", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, &cols, "questions", "flag_test_set", "INTEGER NOT NULL DEFAULT 0")?;
    add_column_if_missing(conn, &cols, "questions", "flag_interesting", "INTEGER NOT NULL DEFAULT 0")?;

    let cols = get_columns(conn, "answers")?;
    add_column_if_missing(conn, &cols, "answers", "human_correct", "INTEGER")?;
    add_column_if_missing(conn, &cols, "answers", "human_annotated_at", "TEXT")?;
    Ok(())
}

fn get_columns(
    conn: &Connection,
    table: &str,
) -> anyhow::Result<std::collections::HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut out = std::collections::HashSet::new();
    for r in rows {
        out.insert(r?);
    }
    Ok(out)
}

fn add_column_if_missing(
    conn: &Connection,
    cols: &std::collections::HashSet<String>,
    table: &str,
    col: &str,
    ty: &str,
) -> anyhow::Result<()> {
    if !cols.contains(col) {
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, ty);
        conn.execute(&sql, [])?;
    }
    Ok(())
}
