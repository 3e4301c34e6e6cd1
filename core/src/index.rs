//! In-memory inverted index: term postings plus per-document term vectors.

use crate::config::ALIAS_MIN_PREFIX;
use crate::error::{EngineError, Result};
use crate::tokenizer::{Loader, Token};
use crate::{DocId, Term};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Byte offsets of one term inside one document, in occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Posting {
    pub offsets: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub term: Term,
    /// Total occurrences across every document.
    pub occurrences: u64,
    pub locations: HashMap<DocId, Posting>,
}

impl IndexEntry {
    fn new(term: Term) -> Self {
        Self { term, occurrences: 0, locations: HashMap::new() }
    }

    pub fn documents_containing(&self) -> usize {
        self.locations.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentVector {
    /// Raw term counts within the document.
    pub terms: HashMap<Term, u64>,
    /// L2 norm of the document's tf-idf vector, valid once the corpus is finalized.
    pub norm: f64,
}

/// Where a document came from, kept for titles and snippets.
#[derive(Clone)]
pub struct DocumentSource {
    pub title: String,
    pub loader: Arc<dyn Loader>,
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSource").field("title", &self.title).finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Corpus {
    terms: HashMap<Term, IndexEntry>,
    /// Prefix and case-folded forms resolving to a real term.
    aliases: HashMap<Term, Term>,
    documents: BTreeMap<DocId, DocumentVector>,
    sources: HashMap<DocId, DocumentSource>,
    /// Terms pruned by `postprocess` because every document contains them.
    common: HashSet<Term>,
    finalized: bool,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one occurrence of `term` at `offset` in `doc`.
    pub fn add(&mut self, term: &str, offset: u64, doc: DocId) {
        self.finalized = false;
        *self
            .documents
            .entry(doc)
            .or_default()
            .terms
            .entry(term.to_string())
            .or_insert(0) += 1;

        if !self.terms.contains_key(term) {
            self.aliases.remove(term);
            self.terms.insert(term.to_string(), IndexEntry::new(term.to_string()));
            self.register_aliases(term);
        }
        if let Some(entry) = self.terms.get_mut(term) {
            entry.occurrences += 1;
            entry.locations.entry(doc).or_default().offsets.push(offset);
        }
    }

    /// Register a whole document in one step: its source and every token.
    pub fn add_document(&mut self, doc: DocId, title: impl Into<String>, loader: Arc<dyn Loader>, tokens: &[Token]) {
        self.finalized = false;
        self.documents.entry(doc).or_default();
        self.sources.insert(doc, DocumentSource { title: title.into(), loader });
        for token in tokens {
            self.add(&token.term, token.offset, doc);
        }
    }

    fn register_aliases(&mut self, term: &str) {
        let lower = term.to_lowercase();
        let prefixes = term
            .char_indices()
            .skip(ALIAS_MIN_PREFIX + 1)
            .map(|(at, _)| &term[..at]);
        for alias in prefixes.chain(std::iter::once(lower.as_str())) {
            if alias != term && !self.terms.contains_key(alias) && !self.aliases.contains_key(alias) {
                self.aliases.insert(alias.to_string(), term.to_string());
            }
        }
    }

    /// Drop terms that occur in every document, then cache every document's norm.
    pub fn postprocess(&mut self) {
        let total = self.documents.len();
        let common: Vec<Term> = self
            .terms
            .values()
            .filter(|entry| entry.documents_containing() == total)
            .map(|entry| entry.term.clone())
            .collect();
        for term in &common {
            self.terms.remove(term);
            for vector in self.documents.values_mut() {
                vector.terms.remove(term);
            }
        }
        let pruned: HashSet<&str> = common.iter().map(String::as_str).collect();
        self.aliases.retain(|_, target| !pruned.contains(target.as_str()));
        tracing::debug!(pruned = common.len(), "removed terms common to every document");
        self.common.extend(common);

        let norms: Vec<(DocId, f64)> = self
            .documents
            .iter()
            .map(|(&doc, vector)| {
                let sum: f64 = vector
                    .terms
                    .iter()
                    .map(|(term, &count)| {
                        let w = tf_count(count) * self.idf(term);
                        w * w
                    })
                    .sum();
                (doc, sum.sqrt())
            })
            .collect();
        for (doc, norm) in norms {
            if let Some(vector) = self.documents.get_mut(&doc) {
                vector.norm = norm;
            }
        }
        self.finalized = true;
    }

    pub fn ensure_finalized(&self) -> Result<()> {
        if self.finalized {
            Ok(())
        } else {
            Err(EngineError::NotFinalized)
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn num_aliases(&self) -> usize {
        self.aliases.len()
    }

    pub fn documents(&self) -> impl Iterator<Item = (DocId, &DocumentVector)> + '_ {
        self.documents.iter().map(|(&doc, vector)| (doc, vector))
    }

    pub fn document(&self, doc: DocId) -> Option<&DocumentVector> {
        self.documents.get(&doc)
    }

    pub fn source(&self, doc: DocId) -> Option<&DocumentSource> {
        self.sources.get(&doc)
    }

    pub fn title(&self, doc: DocId) -> String {
        self.sources.get(&doc).map(|s| s.title.clone()).unwrap_or_else(|| format!("document {doc}"))
    }

    /// The entry for `term` itself, without alias resolution.
    pub fn entry(&self, term: &str) -> Option<&IndexEntry> {
        self.terms.get(term)
    }

    /// The entry for `term`, falling back to the term it is an alias of.
    pub fn lookup(&self, term: &str) -> Option<&IndexEntry> {
        self.terms
            .get(term)
            .or_else(|| self.aliases.get(term).and_then(|target| self.terms.get(target)))
    }

    pub fn posting(&self, term: &str, doc: DocId) -> Option<&Posting> {
        self.lookup(term).and_then(|entry| entry.locations.get(&doc))
    }

    /// Whether `postprocess` pruned `term` for occurring in every document.
    pub fn is_common(&self, term: &str) -> bool {
        self.common.contains(term)
    }

    /// Whether `doc` contains `term`. Terms pruned as common are in every document.
    pub fn contains(&self, term: &str, doc: DocId) -> bool {
        self.common.contains(term)
            || self.documents.get(&doc).is_some_and(|vector| vector.terms.contains_key(term))
    }

    /// Raw-count term frequency: `ln(count) + 1`, or 0 when absent.
    pub fn tf(&self, term: &str, doc: DocId) -> f64 {
        self.documents
            .get(&doc)
            .and_then(|vector| vector.terms.get(term))
            .map_or(0.0, |&count| tf_count(count))
    }

    /// Posting-based term frequency: `ln(len(offsets))`, or 0 when absent.
    pub fn tf_posting(entry: &IndexEntry, doc: DocId) -> f64 {
        entry
            .locations
            .get(&doc)
            .filter(|posting| !posting.offsets.is_empty())
            .map_or(0.0, |posting| (posting.offsets.len() as f64).ln())
    }

    /// `ln(N / documents containing term)`, 0 for unknown terms.
    pub fn idf(&self, term: &str) -> f64 {
        match self.lookup(term) {
            Some(entry) if entry.documents_containing() > 0 => {
                (self.documents.len() as f64 / entry.documents_containing() as f64).ln()
            }
            _ => 0.0,
        }
    }
}

fn tf_count(count: u64) -> f64 {
    if count > 0 {
        (count as f64).ln() + 1.0
    } else {
        0.0
    }
}
