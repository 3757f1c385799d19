use normeval_core::config::ModelRemap;
use normeval_core::engine::generator::{AnswerGenerator, AnswerSource, GeneratorSettings, ItemOutcome};
use normeval_core::engine::CancelToken;
use normeval_core::errors::ProviderError;
use normeval_core::model::{LlmModel, NewAnswer, NewQuestion, QuestionFlags};
use normeval_core::providers::llm::fake::FakeLlmClient;
use normeval_core::providers::llm::{ChatCompletion, ChatRequest, LlmClient, Role};
use normeval_core::selector::SelectionFilter;
use normeval_core::storage::Store;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn settings(base_url: &str) -> GeneratorSettings {
    GeneratorSettings {
        max_tokens: 1000,
        temperature: 0.1,
        delay: Duration::ZERO,
        timeout_secs: 5,
        remap: ModelRemap::for_base_url(base_url),
    }
}

fn catalog(questions: i64) -> anyhow::Result<(Store, LlmModel)> {
    let store = Store::memory()?;
    store.init_schema()?;
    for n in 1..=questions {
        store.upsert_question(
            &NewQuestion {
                number: n,
                text: format!("Pergunta {}?", n),
                expected_answer: format!("resposta {}", n),
                norm: if n % 2 == 0 { "NT-11".into() } else { "NT-09".into() },
                item: format!("{}.1", n),
                flags: QuestionFlags {
                    interesting: n == 2,
                    ..Default::default()
                },
            },
            false,
        )?;
    }
    store.insert_model("deepseek-r1", None)?;
    let model = store.resolve_model("deepseek-r1")?;
    Ok((store, model))
}

#[tokio::test]
async fn second_run_selects_nothing() -> anyhow::Result<()> {
    let (store, model) = catalog(3)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["um", "dois", "três"]));
    let generator = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(fake.clone()),
        settings("https://api.openai.com/v1"),
    );
    let cancel = CancelToken::new();

    let first = generator
        .run(&model, "no-rag", &SelectionFilter::default(), &cancel)
        .await?;
    assert_eq!(first.selected, 3);
    assert_eq!(first.succeeded, 3);
    assert!(!first.has_failures());
    assert_eq!(store.count_rows("answers")?, 3);

    let second = generator
        .run(&model, "no-rag", &SelectionFilter::default(), &cancel)
        .await?;
    assert_eq!(second.selected, 0);
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.failed, 0);
    assert_eq!(store.count_rows("answers")?, 3);
    assert_eq!(fake.call_count(), 3);

    // A different configuration is independent work.
    let other = generator
        .run(&model, "few-shot", &SelectionFilter::default(), &cancel)
        .await?;
    assert_eq!(other.selected, 3);
    Ok(())
}

#[tokio::test]
async fn failed_item_does_not_stop_the_batch() -> anyhow::Result<()> {
    let (store, model) = catalog(3)?;
    let fake = Arc::new(FakeLlmClient::with_script(vec![
        Ok("primeira".into()),
        Err("rate limited".into()),
        Ok("terceira".into()),
    ]));
    let generator = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(fake),
        settings("https://api.openai.com/v1"),
    );

    let mut seen = Vec::new();
    let summary = generator
        .run_with_progress(
            &model,
            "no-rag",
            &SelectionFilter::default(),
            &CancelToken::new(),
            |item| seen.push(item.question_number),
        )
        .await?;
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.has_failures());
    match &summary.items[1].outcome {
        ItemOutcome::Failed { error } => assert!(error.contains("rate limited"), "{}", error),
        other => panic!("expected failure, got {:?}", other),
    }

    // Only the failed question is left.
    let retry = generator
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(retry.selected, 1);
    assert_eq!(retry.items[0].question_number, 2);
    Ok(())
}

#[tokio::test]
async fn request_uses_vendor_name_and_strategy_prompt() -> anyhow::Result<()> {
    let (store, model) = catalog(1)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["ok"]));
    let generator = AnswerGenerator::new(
        store,
        AnswerSource::Live(fake.clone()),
        settings("https://api.deepseek.com/v1"),
    );
    generator
        .run(&model, "chain-of-thought", &SelectionFilter::default(), &CancelToken::new())
        .await?;

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "deepseek-reasoner");
    assert_eq!(requests[0].max_tokens, 1000);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert!(requests[0].messages[1].content.contains("Pergunta 1?"));
    Ok(())
}

#[tokio::test]
async fn aliases_override_builtin_remap() -> anyhow::Result<()> {
    let (store, model) = catalog(1)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["ok"]));
    let mut aliases = BTreeMap::new();
    aliases.insert("deepseek-r1".to_string(), "deepseek-r1-local".to_string());
    let mut s = settings("https://api.deepseek.com/v1");
    s.remap = s.remap.with_aliases(&aliases);

    AnswerGenerator::new(store, AnswerSource::Live(fake.clone()), s)
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(fake.requests()[0].model, "deepseek-r1-local");
    Ok(())
}

#[tokio::test]
async fn overwrite_regenerates_existing_answers() -> anyhow::Result<()> {
    let (store, model) = catalog(2)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["a", "b", "c", "d"]));
    let generator = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(fake),
        settings("https://api.openai.com/v1"),
    );
    generator
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;

    let filter = SelectionFilter {
        overwrite: true,
        ..Default::default()
    };
    let summary = generator
        .run(&model, "no-rag", &filter, &CancelToken::new())
        .await?;
    assert_eq!(summary.selected, 2);
    assert_eq!(summary.succeeded, 2);

    let answers = store.answers_for(model.id, "no-rag")?;
    assert_eq!(answers.len(), 2);
    let texts: Vec<_> = answers
        .iter()
        .filter_map(|a| a.response_text.clone())
        .collect();
    assert!(texts.contains(&"c".to_string()));
    assert!(texts.contains(&"d".to_string()));
    Ok(())
}

#[tokio::test]
async fn filters_narrow_the_selection() -> anyhow::Result<()> {
    let (store, model) = catalog(5)?;
    let generator = AnswerGenerator::new(
        store,
        AnswerSource::Simulated,
        settings("https://api.openai.com/v1"),
    );

    let by_norm = SelectionFilter {
        norm: Some("NT-09".into()),
        ..Default::default()
    };
    let s = generator.run(&model, "no-rag", &by_norm, &CancelToken::new()).await?;
    let numbers: Vec<i64> = s.items.iter().map(|i| i.question_number).collect();
    assert_eq!(numbers, vec![1, 3, 5]);

    let window = SelectionFilter {
        start_from: Some(2),
        limit: Some(2),
        ..Default::default()
    };
    let s = generator.run(&model, "no-rag", &window, &CancelToken::new()).await?;
    let numbers: Vec<i64> = s.items.iter().map(|i| i.question_number).collect();
    assert_eq!(numbers, vec![2, 3]);

    let interesting = SelectionFilter {
        interesting_only: true,
        ..Default::default()
    };
    let s = generator.run(&model, "no-rag", &interesting, &CancelToken::new()).await?;
    assert_eq!(s.selected, 1);

    let zero = SelectionFilter {
        limit: Some(0),
        ..Default::default()
    };
    let s = generator.run(&model, "no-rag", &zero, &CancelToken::new()).await?;
    assert_eq!(s.selected, 5, "limit 0 means no limit");
    Ok(())
}

#[tokio::test]
async fn simulate_mode_persists_nothing() -> anyhow::Result<()> {
    let (store, model) = catalog(2)?;
    let generator = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Simulated,
        settings("https://api.openai.com/v1"),
    );
    let summary = generator
        .run(&model, "few-shot", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(summary.succeeded, 2);
    assert!(summary
        .items
        .iter()
        .all(|i| i.outcome == ItemOutcome::WouldSave && i.total_secs == Some(1.2)));
    assert_eq!(store.count_rows("answers")?, 0);
    Ok(())
}

#[tokio::test]
async fn slow_call_times_out_as_item_failure() -> anyhow::Result<()> {
    let (store, model) = catalog(1)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["tarde"]).with_latency(Duration::from_secs(3)));
    let mut s = settings("https://api.openai.com/v1");
    s.timeout_secs = 1;
    let summary = AnswerGenerator::new(store.clone(), AnswerSource::Live(fake), s)
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(summary.failed, 1);
    assert_eq!(store.count_rows("answers")?, 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_token_stops_before_work() -> anyhow::Result<()> {
    let (store, model) = catalog(3)?;
    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(Arc::new(FakeLlmClient::new())),
        settings("https://api.openai.com/v1"),
    )
    .run(&model, "no-rag", &SelectionFilter::default(), &cancel)
    .await?;
    assert!(summary.interrupted);
    assert!(summary.items.is_empty());
    assert_eq!(store.count_rows("answers")?, 0);
    Ok(())
}

/// Writes the same (question, model, configuration) row while the call is in flight.
struct RacingClient {
    store: Store,
    question_id: i64,
    model_id: i64,
}

#[async_trait::async_trait]
impl LlmClient for RacingClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, ProviderError> {
        self.store
            .insert_answer(
                &NewAnswer {
                    question_id: self.question_id,
                    model_id: self.model_id,
                    configuration: "no-rag".into(),
                    response_text: "resposta concorrente".into(),
                    first_token_secs: 0.1,
                    total_secs: 0.2,
                },
                false,
            )
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(ChatCompletion {
            text: "resposta tardia".into(),
            model: request.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "racing"
    }
}

#[tokio::test]
async fn concurrent_insert_is_a_soft_skip() -> anyhow::Result<()> {
    let (store, model) = catalog(1)?;
    let question = store.question_by_number(1)?.expect("question #1");
    let client = RacingClient {
        store: store.clone(),
        question_id: question.id,
        model_id: model.id,
    };
    let summary = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(Arc::new(client)),
        settings("https://api.openai.com/v1"),
    )
    .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
    .await?;

    assert_eq!(summary.selected, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert!(!summary.has_failures());
    assert_eq!(summary.items[0].outcome, ItemOutcome::SkippedExisting);

    let answers = store.answers_for(model.id, "no-rag")?;
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].response_text.as_deref(), Some("resposta concorrente"));
    Ok(())
}

#[tokio::test]
async fn no_delay_after_the_last_item() -> anyhow::Result<()> {
    let (store, model) = catalog(1)?;
    let mut s = settings("https://api.openai.com/v1");
    s.delay = Duration::from_secs(5);
    let started = Instant::now();
    let summary = AnswerGenerator::new(store, AnswerSource::Simulated, s)
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(summary.succeeded, 1);
    assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    Ok(())
}

#[tokio::test]
async fn delay_separates_items() -> anyhow::Result<()> {
    let (store, model) = catalog(2)?;
    let mut s = settings("https://api.openai.com/v1");
    s.delay = Duration::from_millis(300);
    let started = Instant::now();
    let summary = AnswerGenerator::new(store, AnswerSource::Simulated, s)
        .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
        .await?;
    assert_eq!(summary.succeeded, 2);
    assert!(started.elapsed() >= Duration::from_millis(300));
    Ok(())
}

#[tokio::test]
async fn cancel_mid_run_keeps_committed_answers() -> anyhow::Result<()> {
    let (store, model) = catalog(3)?;
    let fake = Arc::new(FakeLlmClient::with_replies(["um", "dois", "três"]));
    let mut slow = settings("https://api.openai.com/v1");
    slow.delay = Duration::from_secs(30);
    let generator = AnswerGenerator::new(store.clone(), AnswerSource::Live(fake.clone()), slow);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let started = Instant::now();
    let summary = generator
        .run_with_progress(&model, "no-rag", &SelectionFilter::default(), &cancel, |_| {
            trigger.cancel()
        })
        .await?;

    assert!(summary.interrupted);
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(fake.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(store.count_rows("answers")?, 1);

    let resumed = AnswerGenerator::new(
        store.clone(),
        AnswerSource::Live(fake),
        settings("https://api.openai.com/v1"),
    )
    .run(&model, "no-rag", &SelectionFilter::default(), &CancelToken::new())
    .await?;
    let numbers: Vec<i64> = resumed.items.iter().map(|i| i.question_number).collect();
    assert_eq!(numbers, vec![2, 3]);
    assert_eq!(store.count_rows("answers")?, 3);
    Ok(())
}
