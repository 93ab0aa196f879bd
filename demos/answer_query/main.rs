//! # Answer Query Example
//!
//! Answers a methodology question against a tiny textbook and one project's
//! uploaded notes, then classifies the recommendation.
//!
//! Uses `InMemoryVectorStore`, a bag-of-words embedder and a canned
//! generator so it runs with **zero API keys**.
//!
//! Run: `cargo run --example answer_query`

use std::sync::Arc;

use async_trait::async_trait;
use rma_rag::{
    Chunk, ConversationTurn, EmbeddingProvider, GenerationProvider, InMemoryVectorStore, Query,
    RagConfig, RagPipeline, Source, StaticScopeResolver, VectorStore,
};

const DIMENSIONS: usize = 64;

// ---------------------------------------------------------------------------
// BagOfWordsEmbedder: deterministic word-bucket embeddings
// ---------------------------------------------------------------------------

struct BagOfWordsEmbedder;

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> rma_rag::Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 3) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(hash % DIMENSIONS as u64) as usize] += 1.0;
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "bag-of-words"
    }
}

// ---------------------------------------------------------------------------
// CannedGenerator: echoes how much context it was given
// ---------------------------------------------------------------------------

struct CannedGenerator;

#[async_trait]
impl GenerationProvider for CannedGenerator {
    async fn complete(&self, prompt: &str) -> rma_rag::Result<String> {
        let passages = prompt
            .split_once("### Context:")
            .map(|(_, rest)| rest.split("\n\n").filter(|p| !p.trim().is_empty()).count())
            .unwrap_or(0);
        Ok(format!(
            "# Recommendation: Qualitative\n\nBased on {passages} passage(s), semi-structured \
             interviews analysed thematically suit an exploratory question about lived experience."
        ))
    }

    fn name(&self) -> &str {
        "canned"
    }
}

async fn seed(store: &InMemoryVectorStore, embedder: &BagOfWordsEmbedder) -> anyhow::Result<()> {
    let textbook = [
        ("book-1", "Qualitative research explores lived experience through interviews and thematic analysis."),
        ("book-2", "Quantitative research tests hypotheses with statistical analysis of numeric survey data."),
        ("book-3", "Mixed methods designs integrate qualitative interviews with quantitative surveys."),
    ];
    let uploads = [
        ("up-1", "doc-7", 12, "Our pilot interviews with nurses describe burnout as lived experience."),
        ("up-2", "doc-9", 99, "Another project's survey instrument for hospital managers."),
    ];

    store.create_collection("book_chunks", DIMENSIONS).await?;
    store.create_collection("sources", DIMENSIONS).await?;

    let mut chunks = Vec::new();
    for (id, text) in textbook {
        chunks.push(Chunk::new(id, text).with_embedding(embedder.embed(text).await?));
    }
    store.upsert("book_chunks", &chunks).await?;

    let mut chunks = Vec::new();
    for (id, document_id, project_id, text) in uploads {
        chunks.push(
            Chunk::new(id, text)
                .with_document_id(document_id)
                .with_project_id(project_id)
                .with_embedding(embedder.embed(text).await?),
        );
    }
    store.upsert("sources", &chunks).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rma_telemetry::init_telemetry("answer-query-demo")?;

    // -- 1. Seed the stores ------------------------------------------------
    let embedder = BagOfWordsEmbedder;
    let store = Arc::new(InMemoryVectorStore::new());
    seed(&store, &embedder).await?;

    // -- 2. Build the pipeline ---------------------------------------------
    let config = RagConfig::builder()
        .top_k(3)
        .similarity_threshold(0.2)
        .embedding_dimensions(DIMENSIONS)
        .build()?;
    let resolver = StaticScopeResolver::new().with_project(12, ["doc-7"]);

    let pipeline = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(Arc::new(embedder))
        .vector_store(store)
        .generation_provider(Arc::new(CannedGenerator))
        .scope_resolver(Arc::new(resolver))
        .source(Source::shared("textbook", "book_chunks"))
        .source(Source::project_scoped("uploads", "sources"))
        .build()?;

    // -- 3. Ask -------------------------------------------------------------
    let history = [
        ConversationTurn::user("My project studies nurse burnout."),
        ConversationTurn::assistant("Understood. What would you like to know?"),
    ];
    let query = Query::from_config("Which approach fits lived experience of burnout?", &config)
        .with_project(12)
        .with_project_info("Exploratory study of burnout among ICU nurses");

    let grounded = pipeline.answer_with_sources(&query, &history).await?;
    println!("Retrieved {} passage(s):", grounded.retrieval.len());
    for entry in &grounded.retrieval {
        println!("  [{:.3}] {} {}", entry.similarity, entry.chunk.id, entry.chunk.raw_text);
    }

    let (answer, label) = pipeline.answer_and_classify(&query, &history).await?;
    println!("\n{answer}\n\nMethodology: {label}");
    Ok(())
}
