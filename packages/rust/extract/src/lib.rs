//! Text extraction from PDF files.
//!
//! [`PdfExtractor`] is the seam the pipelines use; [`PdfTextExtractor`] backs
//! it with the `pdf-extract` crate. Page texts are concatenated in page order
//! with no separator added.

use std::panic::UnwindSafe;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, instrument};

use testsmith_shared::{Result, TestsmithError};

/// Pulls plain text out of a PDF.
pub trait PdfExtractor: Send + Sync {
    /// Extract the text of every page of the PDF at `path`.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// [`PdfExtractor`] using `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn extract(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| TestsmithError::io(path, e))?;
        let text = extract_from_bytes(&bytes).map_err(|msg| TestsmithError::extraction(path, msg))?;
        debug!(bytes = bytes.len(), chars = text.len(), "extracted PDF text");
        Ok(text)
    }
}

/// Extract text from an in-memory PDF.
pub fn extract_from_bytes(bytes: &[u8]) -> std::result::Result<String, String> {
    // pdf-extract panics on some malformed files instead of returning Err.
    match quietly(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("PDF parser panicked on malformed input".to_string()),
    }
}

/// Serializes swaps of the process-wide panic hook.
static PANIC_HOOK_LOCK: Mutex<()> = Mutex::new(());

/// Run `f`, catching a panic without the default hook printing it.
///
/// The hook is process-wide: while `f` runs, panics on other threads are
/// not reported on stderr either.
fn quietly<T>(f: impl FnOnce() -> T + UnwindSafe) -> std::thread::Result<T> {
    let _guard = PANIC_HOOK_LOCK
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(f);
    std::panic::set_hook(previous);
    result
}

/// True when `path` has a `.pdf` extension (case-insensitive).
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
