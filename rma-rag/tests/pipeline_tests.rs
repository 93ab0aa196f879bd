//! End-to-end tests of the query pipeline with fake collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use rma_rag::{
    ConversationTurn, FailureStage, GenerationProvider, MethodologyLabel, Query, RagConfig,
    RagError, RagPipeline, Source, StaticScopeResolver, VectorStore,
};
use rma_telemetry::SpanRecorder;
use tracing_subscriber::layer::SubscriberExt;

fn textbook_store() -> ScriptedStore {
    ScriptedStore::new().with_hits(
        "book_chunks",
        vec![
            scored(
                textbook_chunk("b1", "Grounded theory builds categories from data.")
                    .with_enriched_text("[Chapter 9] Grounded theory builds categories from data."),
                0.82,
            ),
            scored(textbook_chunk("b2", "Saturation signals when to stop sampling."), 0.64),
            scored(textbook_chunk("b3", "Randomisation controls confounding."), 0.31),
        ],
    )
}

fn pipeline_with(
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    config: RagConfig,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(RecordingEmbedder::new()))
        .vector_store(store)
        .generation_provider(generator)
        .source(Source::shared("textbook", "book_chunks"))
        .source(Source::project_scoped("uploads", "sources"))
        .build()
        .unwrap()
}

#[tokio::test]
async fn answer_is_grounded_in_ranked_context() {
    let generator = Arc::new(ScriptedGenerator::replying("  Use theoretical sampling.  "));
    let pipeline = pipeline_with(Arc::new(textbook_store()), generator.clone(), config());
    let history = [
        ConversationTurn::user("I am interviewing nurses."),
        ConversationTurn::assistant("Noted."),
    ];

    let answer = pipeline.answer_query(&Query::new("When do I stop interviewing?"), &history).await.unwrap();

    assert_eq!(answer.text, "Use theoretical sampling.");
    assert_eq!(generator.calls(), 1);
    let prompt = generator.last_prompt().unwrap();
    let context = prompt.split_once("### Context:\n").unwrap().1;
    let first = context.find("[Chapter 9] Grounded theory").unwrap();
    let second = context.find("Saturation signals").unwrap();
    assert!(first < second);
    assert!(!prompt.contains("Randomisation"));
    assert!(prompt.contains("User: I am interviewing nurses.\nAssistant: Noted."));
    assert!(prompt.trim_end().ends_with("When do I stop interviewing?"));
}

#[tokio::test]
async fn answer_with_sources_returns_retrieved_passages() {
    let generator = Arc::new(ScriptedGenerator::replying("answer"));
    let pipeline = pipeline_with(Arc::new(textbook_store()), generator, config());

    let grounded = pipeline.answer_with_sources(&Query::new("q"), &[]).await.unwrap();

    assert!(grounded.is_grounded());
    assert!(grounded.context_chars > 0);
    assert_eq!(grounded.retrieval.similarities(), vec![0.82, 0.64]);
    assert_eq!(grounded.answer.as_str(), "answer");
}

#[tokio::test]
async fn empty_retrieval_still_generates_a_degraded_answer() {
    let generator = Arc::new(ScriptedGenerator::replying("General guidance."));
    let pipeline = pipeline_with(Arc::new(ScriptedStore::new()), generator.clone(), config());

    let grounded = pipeline.answer_with_sources(&Query::new("What is a pilot study?"), &[]).await.unwrap();

    assert!(!grounded.is_grounded());
    assert_eq!(grounded.answer.text, "General guidance.");
    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("No supporting passages were found"));
    assert!(!prompt.contains("### Context:"));
}

#[tokio::test]
async fn oversized_top_chunk_degrades_instead_of_truncating() {
    let store = ScriptedStore::new()
        .with_hits("book_chunks", vec![scored(textbook_chunk("big", &"x".repeat(200)), 0.9)]);
    let generator = Arc::new(ScriptedGenerator::replying("ok"));
    let config = RagConfig::builder().embedding_dimensions(DIM).max_context_chars(50).build().unwrap();
    let pipeline = pipeline_with(Arc::new(store), generator.clone(), config);

    let grounded = pipeline.answer_with_sources(&Query::new("q"), &[]).await.unwrap();

    assert_eq!(grounded.retrieval.len(), 1);
    assert!(!grounded.is_grounded());
    assert_eq!(grounded.context_chars, 0);
    let prompt = generator.last_prompt().unwrap();
    assert!(!prompt.contains("xxxxx"));
    assert!(prompt.contains("No supporting passages were found"));
}

#[tokio::test]
async fn retrieval_failure_never_reaches_the_generator() {
    let generator = Arc::new(ScriptedGenerator::replying("should not be used"));
    let pipeline = pipeline_with(Arc::new(FailingStore), generator.clone(), config());

    let err = pipeline.answer_query(&Query::new("q"), &[]).await.unwrap_err();

    assert!(matches!(err, RagError::StoreUnavailable { .. }));
    assert_eq!(err.failure_stage(), FailureStage::Retrieval);
    assert!(err.user_message().contains("could not retrieve"));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn generation_failure_is_distinct_from_retrieval_failure() {
    let pipeline = pipeline_with(Arc::new(textbook_store()), Arc::new(FailingGenerator), config());

    let err = pipeline.answer_query(&Query::new("q"), &[]).await.unwrap_err();

    assert!(matches!(err, RagError::GenerationError { .. }));
    assert_eq!(err.failure_stage(), FailureStage::Generation);
    assert!(!err.is_retryable());
    assert!(err.user_message().contains("could not generate"));
}

#[tokio::test(start_paused = true)]
async fn slow_generation_times_out() {
    let config = RagConfig::builder()
        .embedding_dimensions(DIM)
        .generation_timeout(Duration::from_secs(30))
        .build()
        .unwrap();
    let pipeline = pipeline_with(Arc::new(textbook_store()), Arc::new(SlowGenerator), config);

    let err = pipeline.answer_query(&Query::new("q"), &[]).await.unwrap_err();

    assert!(matches!(err, RagError::GenerationError { message, .. } if message.contains("timed out")));
}

#[tokio::test]
async fn answer_and_classify_labels_the_recommendation() {
    let generator = Arc::new(ScriptedGenerator::replying(
        "# Recommendation: Qualitative\n\nInterviews suit exploratory questions about experience.",
    ));
    let pipeline = pipeline_with(Arc::new(textbook_store()), generator, config());
    let query = Query::new("Which methodology fits my project?")
        .with_project_info("Exploring burnout among ICU nurses");

    let (answer, label) = pipeline.answer_and_classify(&query, &[]).await.unwrap();

    assert!(answer.text.starts_with("# Recommendation"));
    assert_eq!(label, MethodologyLabel::Qualitative);
}

#[tokio::test]
async fn project_info_reaches_the_prompt() {
    let generator = Arc::new(ScriptedGenerator::replying("ok"));
    let pipeline = pipeline_with(Arc::new(textbook_store()), generator.clone(), config());
    let query = Query::new("q").with_project_info("Quantitative survey of 400 teachers");

    pipeline.answer_query(&query, &[]).await.unwrap();

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("### Project Information:\nQuantitative survey of 400 teachers"));
}

#[tokio::test]
async fn project_scope_applies_to_uploads_only() {
    let store = textbook_store().with_hits(
        "sources",
        vec![
            scored(upload_chunk("mine", 12, "doc-1"), 0.9),
            scored(upload_chunk("hidden", 12, "doc-2"), 0.95),
            scored(upload_chunk("theirs", 99, "doc-3"), 0.99),
        ],
    );
    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(RecordingEmbedder::new()))
        .vector_store(Arc::new(store))
        .generation_provider(Arc::new(ScriptedGenerator::replying("ok")))
        .scope_resolver(Arc::new(StaticScopeResolver::new().with_project(12, ["doc-1"])))
        .source(Source::shared("textbook", "book_chunks"))
        .source(Source::project_scoped("uploads", "sources"))
        .build()
        .unwrap();

    let result = pipeline.retrieve(&Query::new("q").with_project(12)).await.unwrap();

    let ids: Vec<&str> = result.iter().map(|e| e.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["mine", "b1", "b2"]);
}

#[tokio::test]
async fn stages_emit_spans_in_order() {
    let recorder = SpanRecorder::new();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.layer()));
    let generator = Arc::new(ScriptedGenerator::replying("We recommend a mixed methods design."));
    let pipeline = pipeline_with(Arc::new(textbook_store()), generator, config());

    let (_, label) = pipeline.answer_and_classify(&Query::new("q").with_project(3), &[]).await.unwrap();

    assert_eq!(label, MethodologyLabel::MixedMethods);
    let stages: Vec<String> =
        recorder.span_names().into_iter().filter(|name| name.starts_with("rag.")).collect();
    assert_eq!(stages, vec!["rag.retrieve", "rag.assemble", "rag.generate", "rag.classify"]);

    let retrieve = recorder.find("rag.retrieve").unwrap();
    assert_eq!(retrieve.fields["top_k"], serde_json::json!(5));
    let assemble = recorder.find("rag.assemble").unwrap();
    assert_eq!(assemble.fields["chunks"], serde_json::json!(2));
    let generate = recorder.find("rag.generate").unwrap();
    assert_eq!(generate.fields["grounded"], serde_json::json!(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_share_one_pipeline() {
    let config = RagConfig::builder().embedding_dimensions(DIM).max_concurrent_requests(2).build().unwrap();
    let generator = Arc::new(ScriptedGenerator::replying("ok"));
    let pipeline = Arc::new(pipeline_with(Arc::new(textbook_store()), generator.clone(), config));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.answer_query(&Query::new(format!("question {i}")), &[]).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().text, "ok");
    }
    assert_eq!(generator.calls(), 8);
}

#[test]
fn builder_rejects_missing_parts_and_dimension_mismatch() {
    let err = RagPipeline::builder().build().err().unwrap();
    assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("config")));

    let err = RagPipeline::builder()
        .config(RagConfig::default())
        .embedding_provider(Arc::new(RecordingEmbedder::new()))
        .vector_store(Arc::new(ScriptedStore::new()))
        .generation_provider(Arc::new(ScriptedGenerator::replying("ok")))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("dimensions")));

    let err = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(RecordingEmbedder::new()))
        .vector_store(Arc::new(ScriptedStore::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::ConfigError(msg) if msg.contains("generation_provider")));
}

#[test]
fn builder_defaults_to_the_sources_collection() {
    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(RecordingEmbedder::new()))
        .vector_store(Arc::new(ScriptedStore::new()))
        .generation_provider(Arc::new(ScriptedGenerator::replying("ok")))
        .build()
        .unwrap();
    let sources = pipeline.retriever().sources();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].collection, "sources");
}
