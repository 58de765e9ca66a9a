//! Core pipeline orchestration for testsmith.
//!
//! This crate ties together the corpus index, the prompt templates, the
//! model client and the output file into the two end-to-end workflows:
//! [`pipeline::run_query`] and [`pipeline::run_pdf`].

pub mod classify;
pub mod output;
pub mod pipeline;
pub mod prompt;

pub use classify::{Classification, FALLBACK_MESSAGE, classify, looks_like_test_code};
pub use output::write_output;
pub use pipeline::{
    PdfOutcome, PdfPipelineConfig, ProgressReporter, QueryOutcome, QueryPipelineConfig,
    SilentProgress, run_pdf, run_query,
};
pub use prompt::{build_unit_test_prompt, load_prompt, query_text};
