use super::{exit_codes, load_app_config, open_store};
use crate::cli::args::{GlobalArgs, ModelsSub, QuestionsSub};
use normeval_core::engine::prompts::PromptStrategy;
use normeval_core::seed::import_questions;
use normeval_core::storage::store::FlagUpdate;

pub fn cmd_questions(global: &GlobalArgs, sub: QuestionsSub) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;

    match sub {
        QuestionsSub::Import { file, update } => {
            let report = import_questions(&store, &file, update)?;
            eprintln!(
                "✅ imported {}: {} inserted, {} updated, {} skipped",
                file.display(),
                report.inserted,
                report.updated,
                report.skipped
            );
            if report.skipped > 0 && !update {
                eprintln!("note: existing numbers were kept; pass --update to overwrite them");
            }
        }
        QuestionsSub::List { norm } => {
            let questions = store.list_questions(norm.as_deref())?;
            println!("{:>6}  {:<18} {:<5} TEXT", "NUMBER", "REFERENCE", "FLAGS");
            for q in &questions {
                let flags = format!(
                    "{}{}{}",
                    if q.flags.disputed { "D" } else { "-" },
                    if q.flags.test_set { "T" } else { "-" },
                    if q.flags.interesting { "I" } else { "-" }
                );
                println!(
                    "{:>6}  {:<18} {:<5} {}",
                    q.number,
                    q.norm_reference,
                    flags,
                    shorten(&q.text, 70)
                );
            }
            eprintln!("{} question(s)", questions.len());
        }
        QuestionsSub::Flag {
            number,
            disputed,
            test_set,
            interesting,
        } => {
            if disputed.is_none() && test_set.is_none() && interesting.is_none() {
                eprintln!("nothing to change: pass --disputed, --test-set or --interesting");
                return Ok(exit_codes::CONFIG_ERROR);
            }
            let q = store.set_question_flags(
                number,
                &FlagUpdate {
                    disputed,
                    test_set,
                    interesting,
                },
            )?;
            eprintln!(
                "✅ #{} disputed={} test_set={} interesting={}",
                q.number, q.flags.disputed, q.flags.test_set, q.flags.interesting
            );
        }
    }
    Ok(exit_codes::OK)
}

pub fn cmd_models(global: &GlobalArgs, sub: ModelsSub) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;

    match sub {
        ModelsSub::List => {
            for m in store.list_models()? {
                println!(
                    "{:<20} {}",
                    m.name,
                    m.description.as_deref().unwrap_or("")
                );
            }
        }
        ModelsSub::Add { name, description } => {
            if store.model_by_name(&name)?.is_some() {
                eprintln!("⚠️  model '{}' already exists", name);
                return Ok(exit_codes::CONFIG_ERROR);
            }
            let id = store.insert_model(&name, description.as_deref())?;
            eprintln!("✅ added model '{}' (id {})", name, id);
        }
    }
    Ok(exit_codes::OK)
}

pub fn cmd_configs() -> anyhow::Result<i32> {
    for s in PromptStrategy::RECOGNIZED {
        println!("{:<18} {}", s.label(), s.description());
    }
    Ok(exit_codes::OK)
}

fn shorten(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}…", flat.chars().take(max).collect::<String>())
    }
}
