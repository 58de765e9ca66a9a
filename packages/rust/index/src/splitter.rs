//! Sentence-aware splitter that cuts documents into [`TextNode`]s.
//!
//! Text is first broken into pieces at sentence ends (`.`, `!`, `?`, `;`
//! followed by whitespace) and line breaks. Pieces are packed greedily into
//! chunks of at most `chunk_size` characters; when a chunk fills up, its
//! trailing pieces (up to `chunk_overlap` characters) start the next one.
//! Pieces longer than `chunk_size` are hard-split.

use std::sync::LazyLock;

use regex::Regex;

use testsmith_shared::{Document, TextNode};

/// Matches the end of a sentence or a run of line breaks.
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?;]\s+|\n\s*").expect("valid regex"));

/// Chunking parameters, measured in characters.
#[derive(Debug, Clone, Copy)]
pub struct SentenceSplitter {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SentenceSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

impl SentenceSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Split every document into nodes, preserving document order.
    pub fn nodes_from_documents(&self, docs: &[Document]) -> Vec<TextNode> {
        docs.iter()
            .flat_map(|doc| {
                self.split(&doc.text)
                    .into_iter()
                    .map(move |chunk| TextNode::from_document(doc, chunk))
            })
            .collect()
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0;

        for piece in self.pieces(text) {
            let len = char_len(&piece);

            if current_len + len > self.chunk_size && !current.is_empty() {
                chunks.push(current.concat());

                let (carried, carried_len) = self.overlap_tail(&current);
                current = carried;
                current_len = carried_len;

                while current_len + len > self.chunk_size && !current.is_empty() {
                    let dropped = current.remove(0);
                    current_len -= char_len(&dropped);
                }
            }

            current_len += len;
            current.push(piece);
        }

        if !current.is_empty() {
            chunks.push(current.concat());
        }

        chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Break text at sentence ends, hard-splitting anything too long.
    fn pieces(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut last = 0;

        for m in BREAK_RE.find_iter(text) {
            self.push_piece(&mut pieces, &text[last..m.end()]);
            last = m.end();
        }
        self.push_piece(&mut pieces, &text[last..]);

        pieces
    }

    fn push_piece(&self, pieces: &mut Vec<String>, piece: &str) {
        if piece.is_empty() {
            return;
        }
        if char_len(piece) <= self.chunk_size {
            pieces.push(piece.to_string());
            return;
        }
        let chars: Vec<char> = piece.chars().collect();
        for window in chars.chunks(self.chunk_size) {
            pieces.push(window.iter().collect());
        }
    }

    /// Trailing pieces of a finished chunk that fit in the overlap budget.
    fn overlap_tail(&self, chunk: &[String]) -> (Vec<String>, usize) {
        let mut carried = Vec::new();
        let mut carried_len = 0;

        for piece in chunk.iter().rev() {
            let len = char_len(piece);
            if carried_len + len > self.chunk_overlap {
                break;
            }
            carried_len += len;
            carried.push(piece.clone());
        }

        carried.reverse();
        (carried, carried_len)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
