use super::generate::warn_unrecognized;
use super::{cancel_on_ctrl_c, env_var, exit_codes, load_app_config, open_store, selection_filter};
use crate::cli::args::{GlobalArgs, JudgeArgs};
use anyhow::Context;
use normeval_core::judge::{ContextualJudge, JudgeBatch, JudgeSettings, JudgeSource};
use normeval_core::providers::judgment::openai::OpenAIJudgmentClient;
use normeval_core::report::console::{print_judge_item, print_judge_summary};
use std::sync::Arc;

pub async fn cmd_judge(global: &GlobalArgs, args: JudgeArgs) -> anyhow::Result<i32> {
    let batch_args = args.batch;
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;
    let model = store.resolve_model(&batch_args.model)?;
    warn_unrecognized(&batch_args.configuration);

    let item_delay = batch_args.delay.unwrap_or(0.0);
    let rate_limit = cfg.judge.rate_limit_delay_secs;
    let judge = if batch_args.simulate {
        eprintln!("[simulated] fixed judgment, nothing will be saved");
        ContextualJudge::new(
            JudgeSource::Simulated,
            JudgeSettings::from_config(&cfg.judge, rate_limit, item_delay)?,
        )
    } else {
        let endpoint = cfg.judge_endpoint(env_var)?;
        let client = OpenAIJudgmentClient::new(&endpoint)?;
        eprintln!("Judging with {} via {}", endpoint.model, endpoint.base_url);
        ContextualJudge::new(
            JudgeSource::Live(Arc::new(client)),
            JudgeSettings::from_endpoint(&endpoint, rate_limit, item_delay)?,
        )
    };

    let batch = JudgeBatch::new(store, judge);
    let cancel = cancel_on_ctrl_c();
    let summary = batch
        .run_with_progress(
            &model,
            &batch_args.configuration,
            &selection_filter(&batch_args),
            &cancel,
            print_judge_item,
        )
        .await?;
    print_judge_summary(&summary);

    if let Some(path) = &args.out {
        super::ensure_parent_dir(path)?;
        std::fs::write(path, summary.results_json()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("wrote file: {}", path.display());
    }

    if summary.has_failures() {
        Ok(exit_codes::TEST_FAILED)
    } else {
        Ok(exit_codes::OK)
    }
}
