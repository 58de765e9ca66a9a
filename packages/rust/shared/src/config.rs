//! Application configuration for testsmith.
//!
//! User config lives at `~/.testsmith/testsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TestsmithError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "testsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".testsmith";

// ---------------------------------------------------------------------------
// Config structs (matching testsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Indexed-query pipeline inputs.
    #[serde(default)]
    pub query: QueryConfig,

    /// Chunking and retrieval tuning.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// PDF pipeline inputs and output.
    #[serde(default)]
    pub pdf: PdfConfig,
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model for the direct PDF pipeline.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model answering indexed queries.
    #[serde(default = "default_query_model")]
    pub query_model: String,

    /// Model used to embed corpus nodes and queries.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            query_model: default_query_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4o".into()
}
fn default_query_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}

/// `[query]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Instruction template read verbatim.
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,

    /// Directory of contract documents to index.
    #[serde(default = "default_contracts_dir")]
    pub contracts_dir: PathBuf,

    /// Where the index is persisted.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Descend into subdirectories of `contracts_dir`.
    #[serde(default)]
    pub recursive: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            prompt_file: default_prompt_file(),
            contracts_dir: default_contracts_dir(),
            storage_dir: default_storage_dir(),
            recursive: false,
        }
    }
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompt.txt")
}
fn default_contracts_dir() -> PathBuf {
    PathBuf::from("./contracts")
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from("./storage")
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum node length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over between consecutive nodes.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Nodes handed to the model as context.
    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,

    /// Texts per embeddings request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_top_k: default_similarity_top_k(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    1024
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_similarity_top_k() -> usize {
    2
}
fn default_embed_batch_size() -> usize {
    10
}

/// `[pdf]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfConfig {
    /// PDF holding the contract source.
    #[serde(default = "default_pdf_path")]
    pub pdf_path: PathBuf,

    /// File overwritten with the raw model response.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            pdf_path: default_pdf_path(),
            output_file: default_output_file(),
        }
    }
}

fn default_pdf_path() -> PathBuf {
    PathBuf::from("contracts/usdt.pdf")
}
fn default_output_file() -> PathBuf {
    PathBuf::from("unitTests.txt")
}

impl AppConfig {
    /// Reject settings the pipelines cannot run with.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.openai.base_url).map_err(|e| {
            TestsmithError::config(format!("invalid base_url '{}': {e}", self.openai.base_url))
        })?;

        let r = &self.retrieval;
        if r.chunk_size == 0 {
            return Err(TestsmithError::config("chunk_size must be at least 1"));
        }
        if r.chunk_overlap >= r.chunk_size {
            return Err(TestsmithError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                r.chunk_overlap, r.chunk_size
            )));
        }
        if r.similarity_top_k == 0 {
            return Err(TestsmithError::config("similarity_top_k must be at least 1"));
        }
        if r.embed_batch_size == 0 {
            return Err(TestsmithError::config("embed_batch_size must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.testsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TestsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.testsmith/testsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TestsmithError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TestsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TestsmithError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TestsmithError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TestsmithError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
