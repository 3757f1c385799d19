use crate::engine::generator::{GenerationItem, GenerationSummary, ItemOutcome};
use crate::judge::{JudgeItem, JudgeItemOutcome, JudgeSummary};
use crate::report::stats::{ExperimentReport, StatusRow};
use std::fmt::Write as _;

fn secs(v: Option<f64>) -> String {
    v.map(|s| format!("({:.2}s)", s)).unwrap_or_default()
}

fn opt2(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}", x)).unwrap_or_else(|| "-".into())
}

pub fn print_generation_item(item: &GenerationItem) {
    match &item.outcome {
        ItemOutcome::Saved { answer_id } => eprintln!(
            "✅ #{:<5} saved as answer {} {}",
            item.question_number,
            answer_id,
            secs(item.total_secs)
        ),
        ItemOutcome::WouldSave => eprintln!(
            "✅ #{:<5} [simulated] would save {}",
            item.question_number,
            secs(item.total_secs)
        ),
        ItemOutcome::SkippedExisting => {
            eprintln!("⚠️  #{:<5} skipped (already exists)", item.question_number)
        }
        ItemOutcome::Failed { error } => {
            eprintln!("❌ #{:<5} {}", item.question_number, error)
        }
    }
}

pub fn print_generation_summary(s: &GenerationSummary) {
    eprintln!(
        "\nGeneration {} / {}: {} selected, {} succeeded, {} skipped, {} failed",
        s.model, s.configuration, s.selected, s.succeeded, s.skipped, s.failed
    );
    if s.selected == 0 {
        eprintln!("Nothing to do: every selected question already has an answer.");
    }
    if s.interrupted {
        eprintln!("⚠️  Interrupted; answers committed so far are kept.");
    }
}

pub fn print_judge_item(item: &JudgeItem) {
    match &item.outcome {
        JudgeItemOutcome::Judged {
            composite,
            inconsistent: false,
        } => eprintln!(
            "✅ #{:<5} answer {} score {:.2}",
            item.question_number, item.answer_id, composite
        ),
        JudgeItemOutcome::Judged {
            composite,
            inconsistent: true,
        } => eprintln!(
            "⚠️  #{:<5} answer {} score {:.2} (inconsistent judgment)",
            item.question_number, item.answer_id, composite
        ),
        JudgeItemOutcome::Failed { error } => eprintln!(
            "❌ #{:<5} answer {} {}",
            item.question_number, item.answer_id, error
        ),
    }
}

pub fn print_judge_summary(s: &JudgeSummary) {
    eprintln!(
        "\nJudge {} / {}: {} selected, {} evaluated, {} failed, {} inconsistent",
        s.model, s.configuration, s.selected, s.evaluated, s.failed, s.inconsistent
    );
    if let Some(st) = &s.stats {
        eprintln!(
            "Mean score {:.2}/10 | accuracy {:.1}% | sources cited {:.1}%",
            st.mean_composite, st.accuracy_rate, st.source_cited_rate
        );
        eprintln!(
            "Clarity {:.2} | grounding {:.2} | concision {:.2} | conformance {:.2} | completeness {:.2}",
            st.mean_clarity,
            st.mean_technical_grounding,
            st.mean_concision,
            st.mean_norm_conformance,
            st.mean_technical_completeness
        );
    }
    if s.interrupted {
        eprintln!("⚠️  Interrupted; judgments committed so far are kept.");
    }
}

pub fn render_status(rows: &[StatusRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<20} {:<18} {:>9} {:>7} {:>7}",
        "MODEL", "CONFIG", "DONE", "%", "JUDGED"
    );
    for r in rows {
        let _ = writeln!(
            out,
            "{:<20} {:<18} {:>4}/{:<4} {:>6.1}% {:>7}",
            r.model, r.configuration, r.completed, r.total, r.pct, r.judged
        );
    }
    out
}

pub fn render_report(r: &ExperimentReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report generated at {}", r.generated_at);
    if let Some(c) = &r.configuration {
        let _ = writeln!(out, "Configuration: {}", c);
    }

    let _ = writeln!(out, "\nBy model");
    let _ = writeln!(
        out,
        "{:<20} {:>6} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>9} {:>8}",
        "MODEL", "TOTAL", "CORRECT", "ACC%", "TIME", "CLAR", "GROUND", "CONC", "AGG", "SRC%"
    );
    for m in &r.models {
        let _ = writeln!(
            out,
            "{:<20} {:>6} {:>8} {:>8.1} {:>8} {:>8} {:>8} {:>8} {:>9} {:>8.1}",
            m.model,
            m.total,
            m.correct,
            m.accuracy_pct,
            opt2(m.mean_total_secs),
            opt2(m.mean_clarity),
            opt2(m.mean_technical_grounding),
            opt2(m.mean_concision),
            opt2(m.mean_aggregate),
            m.source_rate_pct
        );
    }

    let _ = writeln!(out, "\nBy norm");
    let _ = writeln!(
        out,
        "{:<12} {:>6} {:>8} {:>8} {:>8} {:>9}",
        "NORM", "TOTAL", "CORRECT", "ACC%", "TIME", "AGG"
    );
    for n in &r.norms {
        let _ = writeln!(
            out,
            "{:<12} {:>6} {:>8} {:>8.1} {:>8} {:>9}",
            n.norm,
            n.total,
            n.correct,
            n.accuracy_pct,
            opt2(n.mean_total_secs),
            opt2(n.mean_aggregate)
        );
    }
    if r.models.is_empty() {
        let _ = writeln!(out, "\n(no answers recorded yet)");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::stats::{ModelReport, NormReport};

    #[test]
    fn report_lists_models_and_norms() {
        let r = ExperimentReport {
            generated_at: "2025-07-02T11:30:18+00:00".into(),
            configuration: Some("no-rag".into()),
            models: vec![ModelReport {
                model: "gpt-4.1".into(),
                total: 3,
                correct: 2,
                accuracy_pct: 66.7,
                mean_total_secs: Some(1.2),
                mean_clarity: Some(4.0),
                mean_technical_grounding: None,
                mean_concision: Some(3.0),
                mean_aggregate: Some(11.33),
                sources_cited: 1,
                source_rate_pct: 33.3,
            }],
            norms: vec![NormReport {
                norm: "NT-09".into(),
                total: 3,
                correct: 2,
                accuracy_pct: 66.7,
                mean_total_secs: Some(1.2),
                mean_aggregate: None,
            }],
        };
        let text = render_report(&r);
        assert!(text.contains("Configuration: no-rag"));
        assert!(text.contains("gpt-4.1"));
        assert!(text.contains("66.7"));
        assert!(text.contains("11.33"));
        assert!(text.contains("NT-09"));
        assert!(!text.contains("no answers recorded"));
    }

    #[test]
    fn status_shows_fraction_and_percentage() {
        let text = render_status(&[StatusRow {
            model: "o3".into(),
            configuration: "few-shot".into(),
            completed: 1,
            total: 4,
            pct: 25.0,
            judged: 0,
        }]);
        assert!(text.contains("1/4"));
        assert!(text.contains("25.0%"));
    }
}
