//! Retrieval-augmented query over a [`VectorIndex`].

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, instrument};

use testsmith_llm::{ChatModel, Embedder};
use testsmith_shared::{Result, TestsmithError};

use crate::{ScoredNode, VectorIndex};

const TEXT_QA_HEAD: &str = "Context information is below.\n\
---------------------\n";

const TEXT_QA_MIDDLE: &str = "\n\
---------------------\n\
Given the context information and not prior knowledge, answer the query.\n\
Query: ";

const TEXT_QA_TAIL: &str = "\nAnswer: ";

/// Render the text-QA prompt for the given nodes and query.
///
/// Node texts and the query are inserted verbatim; braces in either are
/// never treated as placeholders.
pub fn render_text_qa(nodes: &[ScoredNode], query: &str) -> String {
    let context = nodes
        .iter()
        .map(|n| n.node.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{TEXT_QA_HEAD}{context}{TEXT_QA_MIDDLE}{query}{TEXT_QA_TAIL}")
}

/// The model's answer plus the nodes it was grounded on.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub response: String,
    pub source_nodes: Vec<ScoredNode>,
}

impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.response)
    }
}

pub struct QueryEngine<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    llm: &'a dyn ChatModel,
    similarity_top_k: usize,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder, llm: &'a dyn ChatModel) -> Self {
        Self {
            index,
            embedder,
            llm,
            similarity_top_k: 2,
        }
    }

    pub fn similarity_top_k(mut self, top_k: usize) -> Self {
        self.similarity_top_k = top_k.max(1);
        self
    }

    /// Embed `query`, retrieve the closest nodes and ask the model.
    #[instrument(skip_all, fields(model = %self.llm.model_id(), top_k = self.similarity_top_k))]
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        let start = Instant::now();

        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors
            .pop()
            .ok_or_else(|| TestsmithError::Index("embedder returned no query vector".into()))?;

        let source_nodes = self.index.retrieve(&query_vector, self.similarity_top_k)?;
        for hit in &source_nodes {
            debug!(
                node = %hit.node.id,
                file = %hit.node.file_name,
                score = hit.score,
                "retrieved node"
            );
        }

        let prompt = render_text_qa(&source_nodes, query);
        let response = self.llm.complete(&prompt).await?;

        info!(
            sources = source_nodes.len(),
            chars = response.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "query answered"
        );

        Ok(QueryResponse {
            response,
            source_nodes,
        })
    }
}
