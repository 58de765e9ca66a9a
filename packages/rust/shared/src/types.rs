//! Core domain types shared by the indexing and generation crates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Current format version for the persisted index files.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Hex-encoded SHA-256 of a string.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A contract file read from the corpus directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable id: hash of the path relative to the corpus root.
    pub id: String,
    /// Path on disk.
    pub path: PathBuf,
    /// File name, kept on every node for traceability.
    pub file_name: String,
    /// Full text of the document.
    pub text: String,
    /// Hash of `text`.
    pub hash: String,
}

impl Document {
    /// Build a document, deriving id and hash.
    pub fn new(relative_path: &str, path: PathBuf, text: String) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_path.to_string());
        Self {
            id: content_hash(relative_path),
            hash: content_hash(&text),
            path,
            file_name,
            text,
        }
    }
}

// ---------------------------------------------------------------------------
// TextNode
// ---------------------------------------------------------------------------

/// A chunk of a document; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNode {
    /// Unique node identifier (UUID v7).
    pub id: String,
    /// Owning document.
    pub doc_id: String,
    /// Source file name.
    pub file_name: String,
    /// Chunk text.
    pub text: String,
    /// Hash of `text`.
    pub hash: String,
}

impl TextNode {
    /// Create a node cut from `doc`.
    pub fn from_document(doc: &Document, text: String) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            doc_id: doc.id.clone(),
            file_name: doc.file_name.clone(),
            hash: content_hash(&text),
            text,
        }
    }
}
