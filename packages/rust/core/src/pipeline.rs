//! End-to-end pipelines.
//!
//! - [`run_query`]: contracts dir → index (load or build) → query → classify
//! - [`run_pdf`]: PDF → prompt → chat completion → output file

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use testsmith_extract::PdfExtractor;
use testsmith_index::{
    CorpusReader, EmbeddingIndexer, QueryEngine, SentenceSplitter, check_embed_model,
    is_persisted, load_or_build,
};
use testsmith_llm::{ChatModel, Embedder};
use testsmith_shared::{AppConfig, Result};

use crate::classify::{Classification, classify};
use crate::output::write_output;
use crate::prompt::{build_unit_test_prompt, load_prompt, query_text};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the pipeline has a result.
    fn finish(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn finish(&self, _summary: &str) {}
}

// ---------------------------------------------------------------------------
// Indexed query
// ---------------------------------------------------------------------------

/// Inputs of [`run_query`].
#[derive(Debug, Clone)]
pub struct QueryPipelineConfig {
    pub prompt_file: PathBuf,
    pub contracts_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub recursive: bool,
    pub splitter: SentenceSplitter,
    pub embed_batch_size: usize,
    pub similarity_top_k: usize,
}

impl QueryPipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            prompt_file: config.query.prompt_file.clone(),
            contracts_dir: config.query.contracts_dir.clone(),
            storage_dir: config.query.storage_dir.clone(),
            recursive: config.query.recursive,
            splitter: SentenceSplitter::new(
                config.retrieval.chunk_size,
                config.retrieval.chunk_overlap,
            ),
            embed_batch_size: config.retrieval.embed_batch_size,
            similarity_top_k: config.retrieval.similarity_top_k,
        }
    }
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub classification: Classification,
    /// The reply before classification.
    pub raw_response: String,
    /// True when this run created the index.
    pub index_built: bool,
    pub elapsed: Duration,
}

/// Answer the prompt file's instructions against the contracts index.
///
/// The prompt is read before the index is touched, so a missing prompt
/// never costs an embedding run.
#[instrument(skip_all, fields(
    contracts = %config.contracts_dir.display(),
    storage = %config.storage_dir.display(),
))]
pub async fn run_query(
    config: &QueryPipelineConfig,
    embedder: &dyn Embedder,
    llm: &dyn ChatModel,
    pdf: &dyn PdfExtractor,
    progress: &dyn ProgressReporter,
) -> Result<QueryOutcome> {
    let start = Instant::now();

    progress.phase("Loading prompt");
    let template = load_prompt(&config.prompt_file)?;
    let query = query_text(&template);

    let index_built = !is_persisted(&config.storage_dir);
    progress.phase(if index_built {
        "Building index"
    } else {
        "Loading index"
    });
    let reader = CorpusReader::new(&config.contracts_dir, pdf).recursive(config.recursive);
    let indexer = EmbeddingIndexer::new(embedder, config.splitter, config.embed_batch_size);
    let index = load_or_build(&reader, &config.storage_dir, &indexer).await?;
    if !index_built {
        check_embed_model(&index, embedder);
    }

    progress.phase("Querying model");
    let answer = QueryEngine::new(&index, embedder, llm)
        .similarity_top_k(config.similarity_top_k)
        .query(&query)
        .await?;

    let raw_response = answer.to_string();
    let classification = classify(raw_response.clone());
    debug!(test_code = classification.is_test_code(), "response classified");

    let outcome = QueryOutcome {
        classification,
        raw_response,
        index_built,
        elapsed: start.elapsed(),
    };
    progress.finish(if outcome.classification.is_test_code() {
        "Unit tests generated"
    } else {
        "No unit test code in response"
    });
    info!(elapsed_ms = outcome.elapsed.as_millis() as u64, "query pipeline complete");
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// PDF extraction
// ---------------------------------------------------------------------------

/// Inputs of [`run_pdf`].
#[derive(Debug, Clone)]
pub struct PdfPipelineConfig {
    pub pdf_path: PathBuf,
    pub output_file: PathBuf,
}

impl PdfPipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            pdf_path: config.pdf.pdf_path.clone(),
            output_file: config.pdf.output_file.clone(),
        }
    }
}

#[derive(Debug)]
pub struct PdfOutcome {
    pub output_file: PathBuf,
    pub response: String,
    pub elapsed: Duration,
}

/// Generate unit tests for the contract in a PDF and write them out.
#[instrument(skip_all, fields(pdf = %config.pdf_path.display(), model = %llm.model_id()))]
pub async fn run_pdf(
    config: &PdfPipelineConfig,
    extractor: &dyn PdfExtractor,
    llm: &dyn ChatModel,
    progress: &dyn ProgressReporter,
) -> Result<PdfOutcome> {
    let start = Instant::now();

    progress.phase("Extracting PDF text");
    let contract_text = extractor.extract(&config.pdf_path)?;
    debug!(chars = contract_text.len(), "contract text extracted");

    progress.phase("Generating unit tests");
    let prompt = build_unit_test_prompt(&contract_text);
    let response = llm.complete(&prompt).await?;

    progress.phase("Writing output");
    write_output(&config.output_file, &response)?;

    let outcome = PdfOutcome {
        output_file: config.output_file.clone(),
        response,
        elapsed: start.elapsed(),
    };
    progress.finish("Unit tests written");
    info!(
        output = %outcome.output_file.display(),
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "pdf pipeline complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use testsmith_extract::PdfTextExtractor;
    use testsmith_llm::OpenAiClient;
    use testsmith_shared::{ApiKey, TestsmithError};
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ts_pipeline_{tag}_{}", uuid::Uuid::now_v7()))
    }

    struct StubPdf(&'static str);

    impl PdfExtractor for StubPdf {
        fn extract(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Records every prompt and answers with a fixed reply.
    struct RecordingModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.into(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        fn model_id(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn query_config(root: &Path) -> QueryPipelineConfig {
        QueryPipelineConfig {
            prompt_file: root.join("prompt.txt"),
            contracts_dir: root.join("contracts"),
            storage_dir: root.join("storage"),
            recursive: false,
            splitter: SentenceSplitter::default(),
            embed_batch_size: 10,
            similarity_top_k: 2,
        }
    }

    fn embedding_body(vectors: usize) -> serde_json::Value {
        let data: Vec<_> = (0..vectors)
            .map(|i| serde_json::json!({ "index": i, "embedding": [1.0, 0.5, 0.25] }))
            .collect();
        serde_json::json!({ "object": "list", "data": data })
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        })
    }

    #[tokio::test]
    async fn query_pipeline_builds_index_and_passes_test_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("Generate tests.\\n\\nPlease follow the prompt"))
            .and(body_string_contains("function transfer() public {}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(
                "describe('Token', () => { it('transfers', async function () {}); });",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let root = temp_dir("query");
        std::fs::create_dir_all(root.join("contracts")).unwrap();
        std::fs::write(
            root.join("contracts").join("Token.sol"),
            "function transfer() public {}",
        )
        .unwrap();
        std::fs::write(root.join("prompt.txt"), "Generate tests.").unwrap();

        let client = OpenAiClient::new(ApiKey::new("sk-test").unwrap(), &server.uri()).unwrap();
        let embedder = client.embedder("text-embedding-ada-002");
        let llm = client.chat_model("gpt-3.5-turbo");
        let config = query_config(&root);

        let outcome = run_query(&config, &embedder, &llm, &PdfTextExtractor, &SilentProgress)
            .await
            .unwrap();

        assert!(outcome.index_built);
        assert!(root.join("storage").join("docstore.json").is_file());
        assert!(outcome.classification.is_test_code());
        assert!(outcome.classification.to_string().contains("function"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn query_pipeline_reuses_index_and_falls_back_on_prose() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(1)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_body("This contract implements a token.")),
            )
            .mount(&server)
            .await;

        let root = temp_dir("reuse");
        std::fs::create_dir_all(root.join("contracts")).unwrap();
        std::fs::write(root.join("contracts").join("T.sol"), "contract T {}").unwrap();
        std::fs::write(root.join("prompt.txt"), "Generate tests.").unwrap();

        let client = OpenAiClient::new(ApiKey::new("sk-test").unwrap(), &server.uri()).unwrap();
        let embedder = client.embedder("text-embedding-ada-002");
        let llm = client.chat_model("gpt-3.5-turbo");
        let config = query_config(&root);

        let first = run_query(&config, &embedder, &llm, &PdfTextExtractor, &SilentProgress)
            .await
            .unwrap();
        assert!(first.index_built);

        std::fs::remove_dir_all(root.join("contracts")).unwrap();
        let second = run_query(&config, &embedder, &llm, &PdfTextExtractor, &SilentProgress)
            .await
            .unwrap();
        assert!(!second.index_built);
        assert_eq!(second.classification, Classification::NoTestCode);
        assert_eq!(second.raw_response, "This contract implements a token.");

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn missing_prompt_stops_before_indexing() {
        let root = temp_dir("noprompt");
        let config = query_config(&root);
        let llm = RecordingModel::new("unused");
        let embedder = FailingEmbedder;

        let err = run_query(&config, &embedder, &llm, &StubPdf(""), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TestsmithError::PromptFileMissing { .. }));
        assert!(!root.join("storage").exists());
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(TestsmithError::Network("embedder should not be called".into()))
        }
    }

    #[tokio::test]
    async fn pdf_pipeline_writes_exact_response() {
        let root = temp_dir("pdf");
        let config = PdfPipelineConfig {
            pdf_path: root.join("usdt.pdf"),
            output_file: root.join("unitTests.txt"),
        };
        let reply = "const { expect } = require(\"chai\");\ndescribe(\"Foo\", function () {});\n";
        let llm = RecordingModel::new(reply);

        let outcome = run_pdf(&config, &StubPdf("contract Foo {}"), &llm, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&config.output_file).unwrap(), reply);
        assert_eq!(outcome.response, reply);
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("contract Foo {}"));

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn pdf_pipeline_overwrites_previous_output() {
        let root = temp_dir("pdf_overwrite");
        std::fs::create_dir_all(&root).unwrap();
        let config = PdfPipelineConfig {
            pdf_path: root.join("usdt.pdf"),
            output_file: root.join("unitTests.txt"),
        };
        std::fs::write(&config.output_file, "stale content ".repeat(50)).unwrap();

        run_pdf(&config, &StubPdf(""), &RecordingModel::new("fresh"), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&config.output_file).unwrap(), "fresh");

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn pdf_pipeline_sends_gpt4o_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("\"model\":\"gpt-4o\""))
            .and(body_string_contains("contract Foo {}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("it('works')")))
            .expect(1)
            .mount(&server)
            .await;

        let root = temp_dir("pdf_http");
        let config = PdfPipelineConfig {
            pdf_path: root.join("usdt.pdf"),
            output_file: root.join("unitTests.txt"),
        };
        let client = OpenAiClient::new(ApiKey::new("sk-test").unwrap(), &server.uri()).unwrap();
        let llm = client.chat_model("gpt-4o");

        run_pdf(&config, &StubPdf("contract Foo {}"), &llm, &SilentProgress)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&config.output_file).unwrap(),
            "it('works')"
        );

        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn pdf_extraction_failure_leaves_output_untouched() {
        let root = temp_dir("pdf_fail");
        let config = PdfPipelineConfig {
            pdf_path: root.join("missing.pdf"),
            output_file: root.join("unitTests.txt"),
        };
        let llm = RecordingModel::new("unused");

        let err = run_pdf(&config, &PdfTextExtractor, &llm, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TestsmithError::Io { .. }));
        assert!(!config.output_file.exists());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }
}
