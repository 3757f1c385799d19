use super::{cancel_on_ctrl_c, env_var, exit_codes, load_app_config, open_store, selection_filter};
use crate::cli::args::{BatchArgs, GlobalArgs};
use normeval_core::engine::generator::{AnswerGenerator, AnswerSource, GeneratorSettings};
use normeval_core::engine::prompts::PromptStrategy;
use normeval_core::providers::llm::openai::OpenAIClient;
use normeval_core::report::console::{print_generation_item, print_generation_summary};
use std::sync::Arc;

pub async fn cmd_generate(global: &GlobalArgs, args: BatchArgs) -> anyhow::Result<i32> {
    let cfg = load_app_config(global)?;
    let store = open_store(&cfg)?;
    let model = store.resolve_model(&args.model)?;
    warn_unrecognized(&args.configuration);

    let delay = args.delay.unwrap_or(cfg.generation.delay_secs);
    let (source, settings) = if args.simulate {
        let base_url = cfg.generation_base_url(env_var);
        eprintln!("[simulated] no external calls, nothing will be saved");
        (
            AnswerSource::Simulated,
            GeneratorSettings::from_config(&cfg.generation, &base_url, delay)?,
        )
    } else {
        let endpoint = cfg.generation_endpoint(env_var)?;
        let client = OpenAIClient::new(&endpoint)?;
        eprintln!(
            "Generating with {} via {}",
            endpoint.remap.api_name(&model.name),
            endpoint.base_url
        );
        (
            AnswerSource::Live(Arc::new(client)),
            GeneratorSettings::from_endpoint(&endpoint, delay)?,
        )
    };

    let generator = AnswerGenerator::new(store, source, settings);
    let cancel = cancel_on_ctrl_c();
    let summary = generator
        .run_with_progress(
            &model,
            &args.configuration,
            &selection_filter(&args),
            &cancel,
            print_generation_item,
        )
        .await?;
    print_generation_summary(&summary);

    if summary.has_failures() {
        Ok(exit_codes::TEST_FAILED)
    } else {
        Ok(exit_codes::OK)
    }
}

/// Unknown labels still run, with the generic prompt.
pub(crate) fn warn_unrecognized(configuration: &str) {
    let strategy = PromptStrategy::from_label(configuration);
    if strategy == PromptStrategy::Generic {
        eprintln!(
            "⚠️  '{}' is not a recognized configuration; using the default prompt",
            configuration
        );
    }
}
