//! Shared types, error model, and configuration for testsmith.
//!
//! This crate is the foundation depended on by all other testsmith crates.
//! It provides:
//! - [`TestsmithError`]: the unified error type
//! - Domain types ([`Document`], [`TextNode`])
//! - Configuration ([`AppConfig`], config loading) and the [`ApiKey`] credential

pub mod config;
pub mod credential;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OpenAiConfig, PdfConfig, QueryConfig, RetrievalConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use credential::{ApiKey, missing_api_key};
pub use error::{Result, TestsmithError};
pub use types::{Document, STORE_FORMAT_VERSION, TextNode, content_hash};
