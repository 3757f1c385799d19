//! Catalog seeding: the thesis model list, the example question and YAML imports.

use crate::model::{NewQuestion, QuestionFlags};
use crate::storage::store::QuestionUpsert;
use crate::storage::Store;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const INITIAL_MODELS: [(&str, &str); 10] = [
    ("gemini-2.5-pro", "Google Gemini 2.5 Pro - Modelo avançado do Google"),
    ("gemini-2.5-flash", "Google Gemini 2.5 Flash - Versão otimizada para velocidade"),
    ("gpt-4.0", "OpenAI GPT-4.0 - Modelo de linguagem avançado da OpenAI"),
    ("gpt-4.1", "OpenAI GPT-4.1 - Versão atualizada do GPT-4"),
    ("o3", "OpenAI O3 - Modelo experimental da OpenAI"),
    ("claude-opus-4", "Anthropic Claude Opus 4 - Modelo de alta capacidade"),
    ("deepseek-r1", "DeepSeek R1 - Modelo de raciocínio avançado"),
    ("deepseek-v3", "DeepSeek V3 - Versão 3 do modelo DeepSeek"),
    ("grok-3", "xAI Grok 3 - Modelo de linguagem da xAI"),
    ("qwen-3-235B", "Alibaba Qwen 3 235B - Modelo com 235 bilhões de parâmetros"),
];

pub fn example_question() -> NewQuestion {
    NewQuestion {
        number: 1,
        text: "Considere a necessidade de compartimentação entre duas edificações com fachadas \
               paralelas coincidentes. Levando em consideração que as fachadas são iguais e têm as \
               seguintes dimensões: altura = 5m e largura = 10m. Considerando também que cada uma \
               das fachadas paralelas possuem 8 janelas de 1m x 3m. Responda qual é a distância que \
               as edificações devem ter uma da outra para que estejam devidamente compartimentadas \
               horizontalmente, conforme NT-09"
            .into(),
        expected_answer: "7 metros".into(),
        norm: "NT-09".into(),
        item: "6.7.3".into(),
        flags: QuestionFlags::default(),
    }
}

/// Inserts the initial models when the table is empty. Returns how many were added.
pub fn seed_models(store: &Store) -> anyhow::Result<usize> {
    if store.count_rows("models")? > 0 {
        tracing::debug!(event = "seed.models_present");
        return Ok(0);
    }
    for (name, description) in INITIAL_MODELS {
        store.insert_model(name, Some(description))?;
    }
    tracing::info!(event = "seed.models", added = INITIAL_MODELS.len());
    Ok(INITIAL_MODELS.len())
}

/// Inserts question #1 unless a question with that number exists.
pub fn ensure_example_question(store: &Store) -> anyhow::Result<bool> {
    let outcome = store.upsert_question(&example_question(), false)?;
    Ok(outcome == QuestionUpsert::Inserted)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionFile {
    Wrapped { questions: Vec<NewQuestion> },
    List(Vec<NewQuestion>),
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

pub fn parse_questions(raw: &str) -> anyhow::Result<Vec<NewQuestion>> {
    let file: QuestionFile = serde_yaml::from_str(raw).context("failed to parse question YAML")?;
    let questions = match file {
        QuestionFile::Wrapped { questions } => questions,
        QuestionFile::List(list) => list,
    };

    let mut seen = HashSet::new();
    for q in &questions {
        if q.number <= 0 {
            anyhow::bail!("question number must be positive (got {})", q.number);
        }
        if !seen.insert(q.number) {
            anyhow::bail!("question #{} appears twice in the file", q.number);
        }
        for (field, value) in [
            ("text", &q.text),
            ("expected_answer", &q.expected_answer),
            ("norm", &q.norm),
            ("item", &q.item),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("question #{}: '{}' must not be empty", q.number, field);
            }
        }
    }
    Ok(questions)
}

/// Imports a YAML question list. Existing numbers are skipped unless `update`.
pub fn import_questions(store: &Store, path: &Path, update: bool) -> anyhow::Result<ImportReport> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let questions = parse_questions(&raw)?;

    let mut report = ImportReport::default();
    for q in &questions {
        match store.upsert_question(q, update)? {
            QuestionUpsert::Inserted => report.inserted += 1,
            QuestionUpsert::Updated => report.updated += 1,
            QuestionUpsert::Skipped => report.skipped += 1,
        }
    }
    tracing::info!(
        event = "seed.import",
        path = %path.display(),
        inserted = report.inserted,
        updated = report.updated,
        skipped = report.skipped
    );
    Ok(report)
}
