use super::{exit_codes, load_app_config, open_store};
use crate::cli::args::{GlobalArgs, OutputFormat, ReportArgs, StatusArgs};
use normeval_core::report::console::{render_report, render_status};
use normeval_core::report::stats::{build_report, experiment_status};

pub fn cmd_status(global: &GlobalArgs, args: StatusArgs) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;

    let stats = store.stats()?;
    println!(
        "questions: {} | models: {} | answers: {} (judged {}, annotated {})\n",
        stats.questions, stats.models, stats.answers, stats.judged, stats.annotated
    );
    let rows = experiment_status(&store, args.model.as_deref(), args.configuration.as_deref())?;
    print!("{}", render_status(&rows));
    Ok(exit_codes::OK)
}

pub fn cmd_report(global: &GlobalArgs, args: ReportArgs) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;

    let report = build_report(&store, args.configuration.as_deref())?;
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_report(&report)),
    }
    Ok(exit_codes::OK)
}
