use super::{exit_codes, load_app_config, open_store};
use crate::cli::args::GlobalArgs;
use normeval_core::seed::{ensure_example_question, seed_models};
use std::path::Path;

const QUESTIONS_EXAMPLE_FILE: &str = "questions.example.yaml";

pub fn cmd_init(global: &GlobalArgs) -> anyhow::Result<i32> {
    write_sample_config_if_missing(&global.config_file)?;

    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;
    eprintln!("database ready: {}", cfg.database.path.display());

    let added = seed_models(&store)?;
    if added > 0 {
        eprintln!("✅ seeded {} models", added);
    } else {
        eprintln!("note: model catalog already populated");
    }
    if ensure_example_question(&store)? {
        eprintln!("✅ inserted example question #1");
    }

    let dir = global
        .config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    write_file_if_missing(&dir.join(QUESTIONS_EXAMPLE_FILE), crate::templates::QUESTIONS_YAML)?;
    write_file_if_missing(&dir.join(".gitignore"), crate::templates::GITIGNORE)?;

    Ok(exit_codes::OK)
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::write(path, content)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists (skipped)", path.display());
    }
    Ok(())
}

fn write_sample_config_if_missing(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        super::ensure_parent_dir(path)?;
        normeval_core::config::write_sample_config(path)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists", path.display());
    }
    Ok(())
}
