//! Corpus reader: turns a contracts directory into [`Document`]s.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use testsmith_extract::{PdfExtractor, is_pdf};
use testsmith_shared::{Document, Result, TestsmithError};

/// Reads every document under a root directory.
pub struct CorpusReader<'a> {
    root: PathBuf,
    recursive: bool,
    pdf: &'a dyn PdfExtractor,
}

impl<'a> CorpusReader<'a> {
    pub fn new(root: impl Into<PathBuf>, pdf: &'a dyn PdfExtractor) -> Self {
        Self {
            root: root.into(),
            recursive: false,
            pdf,
        }
    }

    /// Also descend into subdirectories.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load all readable documents in sorted path order.
    ///
    /// Hidden files are skipped. PDFs go through the extractor; everything
    /// else must be UTF-8 text. Files that cannot be read are skipped with a
    /// warning. Fails when the directory is missing or nothing was readable.
    #[instrument(skip_all, fields(root = %self.root.display(), recursive = self.recursive))]
    pub fn load(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(TestsmithError::corpus(
                &self.root,
                "directory does not exist or is not a directory",
            ));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        let mut docs = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            match self.read_text(path) {
                Ok(text) => {
                    let relative = path
                        .strip_prefix(&self.root)
                        .unwrap_or(path)
                        .to_string_lossy()
                        .to_string();
                    debug!(file = %relative, chars = text.len(), "loaded document");
                    docs.push(Document::new(&relative, path.to_path_buf(), text));
                }
                Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable file"),
            }
        }

        if docs.is_empty() {
            return Err(TestsmithError::corpus(&self.root, "no readable documents"));
        }

        info!(documents = docs.len(), "corpus loaded");
        Ok(docs)
    }

    fn read_text(&self, path: &Path) -> Result<String> {
        if is_pdf(path) {
            return self.pdf.extract(path);
        }
        let bytes = std::fs::read(path).map_err(|e| TestsmithError::io(path, e))?;
        String::from_utf8(bytes)
            .map_err(|_| TestsmithError::parse(format!("{} is not UTF-8 text", path.display())))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}
