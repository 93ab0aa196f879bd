//! # Live Query Example
//!
//! Runs one question against real providers: Ollama embeddings
//! (`nomic-embed-text`) and Gemini generation (`gemini-2.0-flash`), over an
//! in-memory textbook collection.
//!
//! Requires a running Ollama server (`OLLAMA_HOST`, default
//! `http://localhost:11434`) and `GEMINI_API_KEY`.
//!
//! Run: `cargo run --example live_query --features live -- "What is purposive sampling?"`

use std::sync::Arc;

use rma_rag::gemini::{GeminiConfig, GeminiGenerationProvider};
use rma_rag::ollama::{OllamaConfig, OllamaEmbeddingProvider};
use rma_rag::{
    Chunk, EmbeddingProvider, InMemoryVectorStore, Query, RagConfig, RagPipeline, Source,
    VectorStore,
};

const PASSAGES: [&str; 3] = [
    "Purposive sampling selects participants who can speak to the phenomenon under study.",
    "Random sampling gives every member of the population an equal chance of selection.",
    "Theoretical saturation is reached when new data no longer yields new categories.",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rma_telemetry::init_telemetry("live-query-demo")?;

    let question = std::env::args().nth(1).unwrap_or_else(|| "What is purposive sampling?".into());

    let ollama = OllamaConfig::from_env();
    let embedder = Arc::new(OllamaEmbeddingProvider::new(ollama.clone()));
    let generator = Arc::new(GeminiGenerationProvider::new(GeminiConfig::from_env()?)?);

    let store = Arc::new(InMemoryVectorStore::new());
    store.create_collection("book_chunks", ollama.dimensions).await?;
    let texts: Vec<&str> = PASSAGES.to_vec();
    let embeddings = embedder.embed_batch(&texts).await?;
    let chunks: Vec<Chunk> = PASSAGES
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (text, embedding))| Chunk::new(format!("book-{i}"), *text).with_embedding(embedding))
        .collect();
    store.upsert("book_chunks", &chunks).await?;

    let config = RagConfig::builder().embedding_dimensions(ollama.dimensions).reformulation(3).build()?;
    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedder)
        .vector_store(store)
        .generation_provider(generator)
        .source(Source::shared("textbook", "book_chunks"))
        .build()?;

    match pipeline.answer_and_classify(&Query::from_config(question, &config), &[]).await {
        Ok((answer, label)) => println!("{answer}\n\nMethodology: {label}"),
        Err(e) => {
            tracing::error!(error = %e, "query failed");
            println!("{}", e.user_message());
        }
    }
    Ok(())
}
