//! CLI command definitions, routing, and tracing setup.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use testsmith_core::pipeline::{PdfPipelineConfig, ProgressReporter, QueryPipelineConfig};
use testsmith_core::{Classification, run_pdf, run_query};
use testsmith_extract::PdfTextExtractor;
use testsmith_llm::OpenAiClient;
use testsmith_shared::{
    ApiKey, AppConfig, init_config, load_config, load_config_from, missing_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// testsmith: generate smart-contract unit tests with an LLM.
#[derive(Parser)]
#[command(
    name = "testsmith",
    version,
    about = "Generate Hardhat unit tests for Solidity contracts from an indexed corpus or a PDF.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.testsmith/testsmith.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Index the contracts directory and query it with the prompt file.
    Query {
        /// Instruction template file.
        #[arg(long)]
        prompt: Option<PathBuf>,

        /// Directory of contract sources to index.
        #[arg(long)]
        contracts: Option<PathBuf>,

        /// Where the index is persisted.
        #[arg(long)]
        storage: Option<PathBuf>,

        /// Chat model used to answer the query.
        #[arg(long)]
        model: Option<String>,
    },

    /// Generate tests for the contract in a PDF and write them to a file.
    Pdf {
        /// PDF containing the contract source.
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Output file, overwritten on each run.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Chat model used to generate the tests.
        #[arg(long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "testsmith=info",
        1 => "testsmith=debug",
        _ => "testsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Query {
            prompt,
            contracts,
            storage,
            model,
        } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(p) = prompt {
                config.query.prompt_file = p;
            }
            if let Some(c) = contracts {
                config.query.contracts_dir = c;
            }
            if let Some(s) = storage {
                config.query.storage_dir = s;
            }
            if let Some(m) = model {
                config.openai.query_model = m;
            }
            cmd_query(&config).await
        }
        Command::Pdf { pdf, out, model } => {
            let mut config = resolve_config(cli.config.as_deref())?;
            if let Some(p) = pdf {
                config.pdf.pdf_path = p;
            }
            if let Some(o) = out {
                config.pdf.output_file = o;
            }
            if let Some(m) = model {
                config.openai.chat_model = m;
            }
            cmd_pdf(&config).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Env var first, then an interactive prompt when stdin is a terminal.
fn resolve_api_key(config: &AppConfig) -> Result<ApiKey> {
    if let Some(key) = ApiKey::from_env(config)? {
        return Ok(key);
    }
    if !std::io::stdin().is_terminal() {
        return Err(missing_api_key(config).into());
    }

    let raw: String = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Enter OpenAI API Key")
        .interact()
        .wrap_err("failed to read API key")?;
    Ok(ApiKey::new(raw)?)
}

fn client_for(config: &AppConfig) -> Result<OpenAiClient> {
    let key = resolve_api_key(config)?;
    Ok(OpenAiClient::new(key, &config.openai.base_url)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_query(config: &AppConfig) -> Result<()> {
    let client = client_for(config)?;
    let embedder = client.embedder(config.openai.embedding_model.clone());
    let llm = client.chat_model(config.openai.query_model.clone());
    let pipeline = QueryPipelineConfig::from_app_config(config);

    info!(
        contracts = %pipeline.contracts_dir.display(),
        storage = %pipeline.storage_dir.display(),
        model = %config.openai.query_model,
        "querying contracts index"
    );

    let reporter = CliProgress::new();
    let outcome = run_query(&pipeline, &embedder, &llm, &PdfTextExtractor, &reporter).await;
    reporter.clear();
    let outcome = outcome?;

    match &outcome.classification {
        Classification::TestCode(text) => {
            warn_unverified();
            println!("Generated Unit Tests:\n");
            println!("{text}");
        }
        Classification::NoTestCode => println!("{}", outcome.classification),
    }

    Ok(())
}

async fn cmd_pdf(config: &AppConfig) -> Result<()> {
    let client = client_for(config)?;
    let llm = client.chat_model(config.openai.chat_model.clone());
    let pipeline = PdfPipelineConfig::from_app_config(config);

    info!(
        pdf = %pipeline.pdf_path.display(),
        out = %pipeline.output_file.display(),
        model = %config.openai.chat_model,
        "generating unit tests from PDF"
    );

    let reporter = CliProgress::new();
    let outcome = run_pdf(&pipeline, &PdfTextExtractor, &llm, &reporter).await;
    reporter.clear();
    let outcome = outcome?;

    warn_unverified();
    println!(
        "Test cases generated and written to {}",
        outcome.output_file.display()
    );

    Ok(())
}

fn warn_unverified() {
    warn!("generated tests are unverified model output; review before running them");
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn finish(&self, summary: &str) {
        self.spinner.finish_with_message(summary.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_flags_parse() {
        let cli = Cli::try_parse_from([
            "testsmith",
            "-v",
            "query",
            "--prompt",
            "p.txt",
            "--storage",
            "idx",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Query {
                prompt,
                contracts,
                storage,
                model,
            } => {
                assert_eq!(prompt, Some(PathBuf::from("p.txt")));
                assert_eq!(contracts, None);
                assert_eq!(storage, Some(PathBuf::from("idx")));
                assert_eq!(model, None);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn pdf_defaults_come_from_config() {
        let cli = Cli::try_parse_from(["testsmith", "pdf"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pdf {
                pdf: None,
                out: None,
                model: None
            }
        ));
        let config = AppConfig::default();
        assert_eq!(config.pdf.pdf_path, PathBuf::from("contracts/usdt.pdf"));
        assert_eq!(config.pdf.output_file, PathBuf::from("unitTests.txt"));
        assert_eq!(config.openai.chat_model, "gpt-4o");
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["testsmith", "config", "show", "--log-format", "json"]).unwrap();
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["testsmith", "add"]).is_err());
    }
}
