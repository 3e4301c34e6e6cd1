//! Cosine-similarity ranking with out-of-vocabulary fallback, thresholding and
//! result assembly.

use crate::config::SearchConfig;
use crate::error::{EngineError, Result};
use crate::index::{Corpus, DocumentVector};
use crate::morph::{EditDistance, Morph};
use crate::query::{self, ParsedQuery, QueryTerm};
use crate::result::{SearchItem, SearchResult};
use crate::{DocId, Term};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

/// Similarity of one query against one document, before normalization.
#[derive(Debug, Clone)]
pub struct Similarity {
    pub doc: DocId,
    pub score: f64,
    pub morph: Morph,
    /// Corpus terms the query terms resolved to in this document.
    pub matched: Vec<Term>,
}

/// How a query term was matched in a document.
#[derive(Debug, Clone, PartialEq)]
struct Resolved {
    term: Term,
    tf: f64,
}

/// Parse `text` and rank every document of `corpus` against it.
pub fn search(corpus: &Corpus, text: &str, config: &SearchConfig, cancel: &CancellationToken) -> Result<SearchResult> {
    corpus.ensure_finalized()?;
    let parsed = query::parse(text);
    rank(corpus, &parsed, config, cancel)
}

pub fn rank(corpus: &Corpus, query: &ParsedQuery, config: &SearchConfig, cancel: &CancellationToken) -> Result<SearchResult> {
    corpus.ensure_finalized()?;
    if query.is_empty() {
        return Ok(SearchResult::empty());
    }

    let docs: Vec<DocId> = corpus.documents().map(|(doc, _)| doc).collect();
    let scored: Vec<Result<Similarity>> = docs
        .par_iter()
        .map_init(EditDistance::new, |scratch, &doc| {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            Ok(score_document(query, corpus, doc, config, scratch))
        })
        .collect();
    let scored = scored.into_iter().collect::<Result<Vec<_>>>()?;

    let max = scored.iter().map(|s| s.score).fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        tracing::debug!(query = query.original_text(), "no document scored above zero");
        return Ok(SearchResult::empty());
    }

    let mut best: Option<&Similarity> = None;
    for candidate in scored.iter().filter(|s| s.score > 0.0 && s.morph.suggestion().is_some()) {
        if best.map_or(true, |b| candidate.score > b.score) {
            best = Some(candidate);
        }
    }
    let suggestion = best.and_then(|s| s.morph.suggestion()).map(str::to_string);

    let ceiling = config.threshold_ratio * max;
    let mut items: Vec<SearchItem> = scored
        .iter()
        .filter(|s| s.score > ceiling)
        .map(|s| assemble(corpus, s, s.score / max, config))
        .collect();
    items.sort_by(|a, b| b.score.total_cmp(&a.score));

    tracing::debug!(
        query = query.original_text(),
        documents = docs.len(),
        hits = items.len(),
        max_score = max,
        suggestion = suggestion.as_deref(),
        "ranked query"
    );
    Ok(SearchResult { items, suggestion })
}

/// Cosine similarity followed by every term's score filter, in query order.
pub fn score_document(
    query: &ParsedQuery,
    corpus: &Corpus,
    doc: DocId,
    config: &SearchConfig,
    scratch: &mut EditDistance,
) -> Similarity {
    let mut similarity = cosine(query, corpus, doc, config, scratch);
    for term in query.terms() {
        if let Some(filter) = &term.filter {
            similarity.score = filter(query, corpus, doc, similarity.score);
        }
    }
    similarity
}

/// Cosine similarity between the query's tf-idf vector and the document's.
pub fn cosine(
    query: &ParsedQuery,
    corpus: &Corpus,
    doc: DocId,
    config: &SearchConfig,
    scratch: &mut EditDistance,
) -> Similarity {
    let mut morph = Morph::new(query.original_text());
    let mut matched: Vec<Term> = Vec::new();
    let Some(vector) = corpus.document(doc) else {
        return Similarity { doc, score: 0.0, morph, matched };
    };

    let mut norm1 = 0.0;
    let mut cross = 0.0;
    for term in query.terms().iter().filter(|t| t.weighted) {
        let resolved = resolve(term, corpus, doc, vector, config, scratch, &mut morph);
        let (idf, tf_doc) = match &resolved {
            Some(r) => (corpus.idf(&r.term), r.tf),
            None => (corpus.idf(&term.term), 0.0),
        };
        let w_query = term.tf() * idf;
        let w_doc = tf_doc * idf;
        norm1 += w_query * w_query;
        cross += w_query * w_doc;
        if let Some(r) = resolved {
            if !matched.contains(&r.term) {
                matched.push(r.term);
            }
        }
    }

    let norm1 = norm1.sqrt();
    let norm2 = vector.norm;
    let score = if norm1 == 0.0 || norm2 == 0.0 { 0.0 } else { cross / (norm1 * norm2) };
    Similarity { doc, score, morph, matched }
}

/// Raw count first, then the global index (prefix and case aliases), then the
/// closest term of the document by edit distance.
fn resolve(
    term: &QueryTerm,
    corpus: &Corpus,
    doc: DocId,
    vector: &DocumentVector,
    config: &SearchConfig,
    scratch: &mut EditDistance,
    morph: &mut Morph,
) -> Option<Resolved> {
    let tf = corpus.tf(&term.term, doc);
    if tf > 0.0 {
        return Some(Resolved { term: term.term.clone(), tf });
    }

    if let Some(entry) = corpus.lookup(&term.term) {
        let tf = Corpus::tf_posting(entry, doc);
        if tf > 0.0 {
            return Some(Resolved { term: entry.term.clone(), tf });
        }
    }

    // known everywhere, so not a misspelling
    if corpus.is_common(&term.term) {
        return None;
    }

    let substitute = closest_term(&term.term, corpus, vector, config, scratch)?;
    morph.alternative(&term.term, &term.offsets, &substitute);
    let tf = corpus.tf(&substitute, doc);
    Some(Resolved { term: substitute, tf })
}

/// The document term nearest to `term` within the edit budget. Ties go to the higher
/// idf, then to the lexicographically smaller term.
fn closest_term(
    term: &str,
    corpus: &Corpus,
    vector: &DocumentVector,
    config: &SearchConfig,
    scratch: &mut EditDistance,
) -> Option<Term> {
    let len = term.chars().count();
    let budget = config.edit_budget(len);
    if budget == 0 {
        return None;
    }

    let mut best: Option<(usize, f64, &str)> = None;
    for candidate in vector.terms.keys() {
        if candidate.chars().count().abs_diff(len) >= config.max_length_delta {
            continue;
        }
        let distance = scratch.distance(term, candidate);
        if distance > budget {
            continue;
        }
        let idf = corpus.idf(candidate);
        let better = match best {
            None => true,
            Some((d, i, t)) => {
                distance < d || (distance == d && (idf > i || (idf == i && candidate.as_str() < t)))
            }
        };
        if better {
            best = Some((distance, idf, candidate));
        }
    }
    best.map(|(_, _, t)| t.to_string())
}

fn assemble(corpus: &Corpus, similarity: &Similarity, score: f64, config: &SearchConfig) -> SearchItem {
    let doc = similarity.doc;
    let anchor = similarity
        .matched
        .iter()
        .filter_map(|term| corpus.posting(term, doc).map(|p| (term, p)))
        .filter(|(_, posting)| !posting.offsets.is_empty())
        .max_by(|(a, _), (b, _)| corpus.idf(a).total_cmp(&corpus.idf(b)));
    let (offset, term_len) = anchor.map_or((0, 0), |(term, posting)| (posting.offsets[0], term.chars().count()));

    let snippet = match corpus.source(doc) {
        Some(source) => source.loader.snippet(offset, term_len, config.snippet_width).unwrap_or_else(|e| {
            tracing::warn!(doc, error = %e, "failed to load snippet");
            String::new()
        }),
        None => String::new(),
    };

    SearchItem { doc_id: doc, title: corpus.title(doc), snippet, score, matched: similarity.matched.clone() }
}
