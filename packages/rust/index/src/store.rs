//! On-disk layout of a persisted index.
//!
//! ```text
//! <storage_dir>/
//! ├── docstore.json               nodes (the presence marker)
//! ├── default__vector_store.json  node id → embedding
//! └── index_store.json            index id, node order, embed model
//! ```
//!
//! `docstore.json` is written last, so an interrupted persist never looks
//! like a finished index. Nothing is checksummed: whatever is on disk is
//! trusted.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use testsmith_shared::{Result, STORE_FORMAT_VERSION, TestsmithError, TextNode};

use crate::VectorIndex;

/// Marker file: its presence means "index already built here".
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "default__vector_store.json";
pub const INDEX_STORE_FILE: &str = "index_store.json";

#[derive(Debug, Serialize, Deserialize)]
struct DocStoreFile {
    format_version: u32,
    nodes: BTreeMap<String, TextNode>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorStoreFile {
    embedding_dict: BTreeMap<String, Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexStoreFile {
    format_version: u32,
    index_id: String,
    embed_model: String,
    node_ids: Vec<String>,
    created_at: DateTime<Utc>,
}

/// True when `storage_dir` holds the marker file.
pub fn is_persisted(storage_dir: &Path) -> bool {
    storage_dir.join(DOCSTORE_FILE).is_file()
}

/// Write `index` under `storage_dir`, creating the directory.
#[instrument(skip_all, fields(dir = %storage_dir.display(), nodes = index.len()))]
pub fn persist(index: &VectorIndex, storage_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(storage_dir).map_err(|e| TestsmithError::io(storage_dir, e))?;

    let vectors = VectorStoreFile {
        embedding_dict: index
            .nodes()
            .iter()
            .zip(index.embeddings())
            .map(|(node, vector)| (node.id.clone(), vector.clone()))
            .collect(),
    };
    let index_store = IndexStoreFile {
        format_version: STORE_FORMAT_VERSION,
        index_id: index.index_id().to_string(),
        embed_model: index.embed_model().to_string(),
        node_ids: index.nodes().iter().map(|n| n.id.clone()).collect(),
        created_at: index.created_at(),
    };
    let docstore = DocStoreFile {
        format_version: STORE_FORMAT_VERSION,
        nodes: index
            .nodes()
            .iter()
            .map(|n| (n.id.clone(), n.clone()))
            .collect(),
    };

    write_json(&storage_dir.join(VECTOR_STORE_FILE), &vectors)?;
    write_json(&storage_dir.join(INDEX_STORE_FILE), &index_store)?;
    write_json(&storage_dir.join(DOCSTORE_FILE), &docstore)?;

    info!("index persisted");
    Ok(())
}

/// Read an index previously written by [`persist`].
#[instrument(skip_all, fields(dir = %storage_dir.display()))]
pub fn load(storage_dir: &Path) -> Result<VectorIndex> {
    let index_store: IndexStoreFile = read_json(&storage_dir.join(INDEX_STORE_FILE))?;
    let mut docstore: DocStoreFile = read_json(&storage_dir.join(DOCSTORE_FILE))?;
    let mut vectors: VectorStoreFile = read_json(&storage_dir.join(VECTOR_STORE_FILE))?;

    if index_store.format_version != STORE_FORMAT_VERSION {
        return Err(TestsmithError::Index(format!(
            "unsupported index format_version: {} (expected {STORE_FORMAT_VERSION})",
            index_store.format_version
        )));
    }

    let mut nodes = Vec::with_capacity(index_store.node_ids.len());
    let mut embeddings = Vec::with_capacity(index_store.node_ids.len());

    for id in &index_store.node_ids {
        let node = docstore
            .nodes
            .remove(id)
            .ok_or_else(|| TestsmithError::Index(format!("node {id} missing from docstore")))?;
        let vector = vectors
            .embedding_dict
            .remove(id)
            .ok_or_else(|| TestsmithError::Index(format!("node {id} has no embedding")))?;
        nodes.push(node);
        embeddings.push(vector);
    }

    debug!(nodes = nodes.len(), "index loaded");

    VectorIndex::from_parts(
        index_store.index_id,
        index_store.embed_model,
        nodes,
        embeddings,
        index_store.created_at,
    )
}

/// Write a JSON file (pretty-printed) via a temp file and rename.
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| TestsmithError::parse(format!("JSON serialization failed: {e}")))?;

    let temp = path.with_extension("json.tmp");
    if let Err(e) = std::fs::write(&temp, json) {
        std::fs::remove_file(&temp).ok();
        return Err(TestsmithError::io(&temp, e));
    }
    if let Err(e) = std::fs::rename(&temp, path) {
        std::fs::remove_file(&temp).ok();
        return Err(TestsmithError::io(path, e));
    }

    debug!(path = %path.display(), "wrote JSON file");
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| TestsmithError::io(path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| TestsmithError::parse(format!("invalid {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use testsmith_shared::Document;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("ts_store_{}", uuid::Uuid::now_v7()))
    }

    fn sample_index() -> VectorIndex {
        let doc = Document::new("a.sol", PathBuf::from("a.sol"), "x".into());
        let nodes = vec![
            TextNode::from_document(&doc, "function a() {}".into()),
            TextNode::from_document(&doc, "function b() {}".into()),
        ];
        VectorIndex::from_parts(
            "idx-1".into(),
            "test-embed".into(),
            nodes,
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn absent_directory_is_not_persisted() {
        assert!(!is_persisted(&temp_dir()));
    }

    #[test]
    fn directory_without_marker_is_not_persisted() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(INDEX_STORE_FILE), "{}").unwrap();
        assert!(!is_persisted(&dir));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn persist_then_load_preserves_order() {
        let dir = temp_dir();
        let index = sample_index();

        persist(&index, &dir).unwrap();
        assert!(is_persisted(&dir));
        assert!(dir.join(VECTOR_STORE_FILE).is_file());
        assert!(dir.join(INDEX_STORE_FILE).is_file());

        let loaded = load(&dir).unwrap();
        assert_eq!(loaded.index_id(), "idx-1");
        assert_eq!(loaded.embed_model(), "test-embed");
        assert_eq!(loaded.nodes(), index.nodes());
        assert_eq!(loaded.embeddings(), index.embeddings());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_vector_is_index_error() {
        let dir = temp_dir();
        persist(&sample_index(), &dir).unwrap();
        std::fs::write(
            dir.join(VECTOR_STORE_FILE),
            r#"{"embedding_dict":{}}"#,
        )
        .unwrap();

        let err = load(&dir).unwrap_err();
        assert!(matches!(err, TestsmithError::Index(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_persist_leaves_no_marker_or_temp() {
        let dir = temp_dir();
        // Occupy the index store path with a non-empty directory.
        std::fs::create_dir_all(dir.join(INDEX_STORE_FILE).join("inner")).unwrap();

        let err = persist(&sample_index(), &dir).unwrap_err();
        assert!(matches!(err, TestsmithError::Io { .. }));
        assert!(!dir.join("index_store.json.tmp").exists());
        assert!(!is_persisted(&dir));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_docstore_is_parse_error() {
        let dir = temp_dir();
        persist(&sample_index(), &dir).unwrap();
        std::fs::write(dir.join(DOCSTORE_FILE), "not json").unwrap();

        let err = load(&dir).unwrap_err();
        assert!(matches!(err, TestsmithError::Parse { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }
}
