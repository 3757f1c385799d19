pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  number          INTEGER NOT NULL UNIQUE,
  text            TEXT NOT NULL,
  expected_answer TEXT NOT NULL,
  norm            TEXT NOT NULL,
  item            TEXT NOT NULL,
  norm_reference  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_norm ON questions(norm);

CREATE TABLE IF NOT EXISTS models (
  id          INTEGER PRIMARY KEY AUTOINCREMENT,
  name        TEXT NOT NULL UNIQUE,
  description TEXT
);

CREATE TABLE IF NOT EXISTS answers (
  id                  INTEGER PRIMARY KEY AUTOINCREMENT,
  question_id         INTEGER NOT NULL REFERENCES questions(id),
  model_id            INTEGER NOT NULL REFERENCES models(id),
  configuration       TEXT NOT NULL,
  response_text       TEXT,
  first_token_secs    REAL,
  total_secs          REAL,
  correct             INTEGER NOT NULL DEFAULT 0,
  clarity             INTEGER CHECK (clarity BETWEEN 1 AND 5),
  technical_grounding INTEGER CHECK (technical_grounding BETWEEN 1 AND 5),
  concision           INTEGER CHECK (concision BETWEEN 1 AND 5),
  source_cited        INTEGER NOT NULL DEFAULT 0,
  rationale           TEXT,
  aggregate_score     INTEGER,
  created_at          TEXT NOT NULL,
  updated_at          TEXT,
  UNIQUE(question_id, model_id, configuration)
);

CREATE INDEX IF NOT EXISTS idx_answers_model_config ON answers(model_id, configuration);
"#;
