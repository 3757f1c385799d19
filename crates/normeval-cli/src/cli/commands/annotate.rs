use super::{exit_codes, load_app_config, open_store};
use crate::cli::args::{AnnotateSub, GlobalArgs};
use normeval_core::annotation::{mark, pending, AnnotationFilter};

pub fn cmd_annotate(global: &GlobalArgs, sub: AnnotateSub) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;

    match sub {
        AnnotateSub::Pending {
            model,
            configuration,
            norm,
            limit,
        } => {
            let rows = pending(
                &store,
                &AnnotationFilter {
                    model,
                    configuration,
                    norm,
                    limit,
                },
            )?;
            for p in &rows {
                println!(
                    "[{}] #{} {} | {} / {} | judge: {} | score: {}",
                    p.answer_id,
                    p.question_number,
                    p.norm_reference,
                    p.model,
                    p.configuration,
                    if p.correct { "correct" } else { "incorrect" },
                    p.aggregate_score
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".into())
                );
                println!("    expected: {}", p.expected_answer);
                println!("    answer:   {}", p.excerpt);
            }
            eprintln!("{} answer(s) awaiting annotation", rows.len());
        }
        AnnotateSub::Mark {
            answer_id,
            correct,
            incorrect,
        } => {
            let verdict = correct && !incorrect;
            let answer = mark(&store, answer_id, verdict)?;
            eprintln!(
                "✅ answer {} marked {} (aggregate {})",
                answer.id,
                if verdict { "correct" } else { "incorrect" },
                answer
                    .aggregate_score
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".into())
            );
        }
    }
    Ok(exit_codes::OK)
}
