//! Tokenizer boundary: turns a source document into `(term, byte offset)` pairs and
//! cuts snippet windows back out of it.

use crate::error::{EngineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
}

/// One occurrence of a term inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    /// Byte offset of the first byte of the occurrence.
    pub offset: u64,
}

impl Token {
    pub fn new(term: impl Into<String>, offset: u64) -> Self {
        Self { term: term.into(), offset }
    }
}

/// Source of a single document.
///
/// `tokens` is restartable: every call produces the full sequence again. `snippet`
/// reads the window back from the same source, so implementations holding files
/// report I/O failures instead of panicking.
pub trait Loader: Send + Sync {
    fn tokens(&self, cancel: &CancellationToken) -> Result<Vec<Token>>;
    fn snippet(&self, offset: u64, term_len: usize, fallback_width: usize) -> Result<String>;
}

/// Split text into word tokens. A token whose lower-case form differs is emitted
/// twice at the same offset, once verbatim and once lower-cased.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for mat in WORD.find_iter(text) {
        let word = mat.as_str();
        let offset = mat.start() as u64;
        let lower = word.to_lowercase();
        if lower != word {
            tokens.push(Token::new(word, offset));
        }
        tokens.push(Token::new(lower, offset));
    }
    tokens
}

/// Width in characters of the snippet window for a term of `term_len` characters.
pub fn snippet_width(term_len: usize, fallback_width: usize) -> usize {
    (((term_len as f64 + 1.0).log10() + 1.0) * fallback_width as f64) as usize
}

/// Cut the window centered on `offset`, never starting before the beginning of `text`.
pub fn snippet_window(text: &str, offset: u64, term_len: usize, fallback_width: usize) -> String {
    let width = snippet_width(term_len, fallback_width);
    let mut start = (offset as usize).saturating_sub(width / 2).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    text[start..].chars().take(width).collect()
}

/// A `text/plain` file on disk. The file is re-read on every call.
#[derive(Debug, Clone)]
pub struct PlainLoader {
    path: PathBuf,
}

impl PlainLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| EngineError::io(&self.path, e))
    }
}

impl Loader for PlainLoader {
    fn tokens(&self, cancel: &CancellationToken) -> Result<Vec<Token>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let text = self.read()?;
        let tokens = tokenize(&text);
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(tokens)
    }

    fn snippet(&self, offset: u64, term_len: usize, fallback_width: usize) -> Result<String> {
        let text = self.read()?;
        Ok(snippet_window(&text, offset, term_len, fallback_width))
    }
}

/// An in-memory document.
#[derive(Debug, Clone)]
pub struct TextLoader {
    text: String,
}

impl TextLoader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Loader for TextLoader {
    fn tokens(&self, cancel: &CancellationToken) -> Result<Vec<Token>> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(tokenize(&self.text))
    }

    fn snippet(&self, offset: u64, term_len: usize, fallback_width: usize) -> Result<String> {
        Ok(snippet_window(&self.text, offset, term_len, fallback_width))
    }
}
