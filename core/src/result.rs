use crate::{DocId, Term};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchItem {
    pub doc_id: DocId,
    pub title: String,
    /// Plain text window around the most discriminative matched term.
    pub snippet: String,
    /// Score relative to the best document of the batch, in `(threshold, 1]`.
    pub score: f64,
    /// Corpus terms the document matched on, after alias and fuzzy resolution.
    pub matched: Vec<Term>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResult {
    pub items: Vec<SearchItem>,
    pub suggestion: Option<String>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
