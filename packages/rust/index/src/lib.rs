//! Vector index over a directory of contract documents.
//!
//! This crate provides:
//! - [`reader`]: loads a contracts directory into documents
//! - [`splitter`]: cuts documents into nodes
//! - [`store`]: persists and reloads an index (marker: `docstore.json`)
//! - [`query`]: retrieval + generation over a built index
//! - [`load_or_build`]: the load-if-present, build-and-persist-if-absent entry point

pub mod query;
pub mod reader;
pub mod splitter;
pub mod store;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use testsmith_llm::Embedder;
use testsmith_shared::{Document, Result, TestsmithError, TextNode};

pub use query::{QueryEngine, QueryResponse, render_text_qa};
pub use reader::CorpusReader;
pub use splitter::SentenceSplitter;
pub use store::{DOCSTORE_FILE, is_persisted};

// ---------------------------------------------------------------------------
// VectorIndex
// ---------------------------------------------------------------------------

/// Nodes and their embeddings, in insertion order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    index_id: String,
    embed_model: String,
    nodes: Vec<TextNode>,
    embeddings: Vec<Vec<f32>>,
    created_at: DateTime<Utc>,
}

/// A retrieved node and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node: TextNode,
    pub score: f32,
}

impl VectorIndex {
    /// Assemble an index, checking that every node has one embedding of a
    /// common dimension.
    pub fn from_parts(
        index_id: String,
        embed_model: String,
        nodes: Vec<TextNode>,
        embeddings: Vec<Vec<f32>>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if nodes.len() != embeddings.len() {
            return Err(TestsmithError::Index(format!(
                "{} nodes but {} embeddings",
                nodes.len(),
                embeddings.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            let dim = first.len();
            if embeddings.iter().any(|e| e.len() != dim) {
                return Err(TestsmithError::Index(
                    "embeddings have inconsistent dimensions".into(),
                ));
            }
        }

        Ok(Self {
            index_id,
            embed_model,
            nodes,
            embeddings,
            created_at,
        })
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn nodes(&self) -> &[TextNode] {
        &self.nodes
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `top_k` nodes most similar to `query`, best first. Ties keep
    /// insertion order.
    pub fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredNode>> {
        if let Some(first) = self.embeddings.first() {
            if first.len() != query.len() {
                return Err(TestsmithError::Index(format!(
                    "query embedding has {} dimensions, index has {}",
                    query.len(),
                    first.len()
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, e)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| ScoredNode {
                node: self.nodes[i].clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity; zero when either vector has zero length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// ---------------------------------------------------------------------------
// CorpusIndex
// ---------------------------------------------------------------------------

/// Builds indexes from documents and moves them to and from disk.
#[async_trait]
pub trait CorpusIndex: Send + Sync {
    /// Build a fresh index over `docs`.
    async fn build(&self, docs: &[Document]) -> Result<VectorIndex>;

    /// Load a persisted index from `storage_dir`.
    fn load(&self, storage_dir: &Path) -> Result<VectorIndex> {
        store::load(storage_dir)
    }

    /// Persist `index` to `storage_dir`.
    fn persist(&self, index: &VectorIndex, storage_dir: &Path) -> Result<()> {
        store::persist(index, storage_dir)
    }
}

/// [`CorpusIndex`] that splits documents and embeds the nodes.
pub struct EmbeddingIndexer<'a> {
    embedder: &'a dyn Embedder,
    splitter: SentenceSplitter,
    batch_size: usize,
}

impl<'a> EmbeddingIndexer<'a> {
    pub fn new(embedder: &'a dyn Embedder, splitter: SentenceSplitter, batch_size: usize) -> Self {
        Self {
            embedder,
            splitter,
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl CorpusIndex for EmbeddingIndexer<'_> {
    #[instrument(skip_all, fields(documents = docs.len(), model = %self.embedder.model_id()))]
    async fn build(&self, docs: &[Document]) -> Result<VectorIndex> {
        let nodes = self.splitter.nodes_from_documents(docs);
        if nodes.is_empty() {
            let root = docs
                .first()
                .and_then(|d| d.path.parent())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            return Err(TestsmithError::corpus(root, "documents contain no text"));
        }

        let mut embeddings = Vec::with_capacity(nodes.len());
        for batch in nodes.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|n| n.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(TestsmithError::Index(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
        }

        info!(nodes = nodes.len(), "index built");

        VectorIndex::from_parts(
            Uuid::now_v7().to_string(),
            self.embedder.model_id().to_string(),
            nodes,
            embeddings,
            Utc::now(),
        )
    }
}

// ---------------------------------------------------------------------------
// Load or build
// ---------------------------------------------------------------------------

/// Load the index persisted in `storage_dir`, or build and persist one.
///
/// Presence is decided only by the marker file. A present index is loaded
/// without reading the corpus, so later changes to the contracts directory
/// are not picked up until `storage_dir` is removed.
#[instrument(skip_all, fields(storage = %storage_dir.display(), corpus = %corpus.root().display()))]
pub async fn load_or_build(
    corpus: &CorpusReader<'_>,
    storage_dir: &Path,
    indexer: &dyn CorpusIndex,
) -> Result<VectorIndex> {
    if is_persisted(storage_dir) {
        info!("loading existing index");
        return indexer.load(storage_dir);
    }

    info!("index not found, creating a new one");
    let docs = corpus.load()?;
    let index = indexer.build(&docs).await?;
    indexer.persist(&index, storage_dir)?;
    Ok(index)
}

/// Warn when a loaded index was embedded with a different model.
pub fn check_embed_model(index: &VectorIndex, embedder: &dyn Embedder) {
    if index.embed_model() != embedder.model_id() {
        warn!(
            stored = index.embed_model(),
            configured = embedder.model_id(),
            "index was built with a different embedding model; delete the storage directory to rebuild"
        );
    }
}
