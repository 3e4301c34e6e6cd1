//! Query operators. Each one recognizes a decorated token, strips the decoration and
//! may attach a score filter to the captured term.

use super::{ParsedQuery, QueryToken};
use crate::index::Corpus;
use crate::{DocId, Term};
use std::borrow::Cow;
use std::sync::Arc;

/// Adjusts a document's similarity score after the cosine pass.
pub type ScoreFilter = Arc<dyn Fn(&ParsedQuery, &Corpus, DocId, f64) -> f64 + Send + Sync>;

/// State carried from `begin_capture` to `end_capture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Plain(Term),
    Boosted { term: Term, importance: u32 },
    /// A term that may only act through its filter.
    Excluded(Term),
    /// Two neighboring terms; the capture itself carries no vector weight.
    Pair { left: Term, right: Term },
}

impl Capture {
    pub fn is_weighted(&self) -> bool {
        !matches!(self, Capture::Pair { .. } | Capture::Excluded(_))
    }
}

pub trait Operator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Glyphs that decorate the start of a word, like `^` in `^word`.
    fn prefix_glyphs(&self) -> &'static [char] {
        &[]
    }

    /// Glyphs that form a token on their own, like `~` in `a ~ b`.
    fn standalone_glyphs(&self) -> &'static [char] {
        &[]
    }

    /// Claim `tokens[at]`, returning the term to record and the capture state, or
    /// `None` to let the next operator try.
    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)>;

    fn end_capture(&self, capture: Capture) -> Option<ScoreFilter>;
}

fn strip_glyphs(text: &str) -> &str {
    text.trim_start_matches(|c: char| !c.is_alphanumeric() && c != '_')
}

fn strip_leading(token: &str, glyph: char) -> Option<Term> {
    if !token.starts_with(glyph) {
        return None;
    }
    let term = strip_glyphs(token);
    (!term.is_empty()).then(|| term.to_string())
}

/// `^word`: documents lacking `word` score 0.
#[derive(Debug, Default)]
pub struct MustExist;

impl Operator for MustExist {
    fn name(&self) -> &'static str {
        "must-exist"
    }

    fn prefix_glyphs(&self) -> &'static [char] {
        &['^']
    }

    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)> {
        let term = strip_leading(tokens[at].text, '^')?;
        Some((term.clone(), Capture::Plain(term)))
    }

    fn end_capture(&self, capture: Capture) -> Option<ScoreFilter> {
        let Capture::Plain(word) = capture else { return None };
        let filter: ScoreFilter = Arc::new(move |_: &ParsedQuery, corpus: &Corpus, doc: DocId, score: f64| {
            if corpus.contains(&word, doc) {
                score
            } else {
                0.0
            }
        });
        Some(filter)
    }
}

/// `!word`: documents containing `word` score 0. The term adds no weight of its own.
#[derive(Debug, Default)]
pub struct MustNotExist;

impl Operator for MustNotExist {
    fn name(&self) -> &'static str {
        "must-not-exist"
    }

    fn prefix_glyphs(&self) -> &'static [char] {
        &['!']
    }

    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)> {
        let term = strip_leading(tokens[at].text, '!')?;
        Some((term.clone(), Capture::Excluded(term)))
    }

    fn end_capture(&self, capture: Capture) -> Option<ScoreFilter> {
        let Capture::Excluded(word) = capture else { return None };
        let filter: ScoreFilter = Arc::new(move |_: &ParsedQuery, corpus: &Corpus, doc: DocId, score: f64| {
            if corpus.contains(&word, doc) {
                0.0
            } else {
                score
            }
        });
        Some(filter)
    }
}

/// `*word`, `**word`, ...: multiplies the score of documents containing `word` by its
/// idf once per star.
#[derive(Debug, Default)]
pub struct Importance;

impl Operator for Importance {
    fn name(&self) -> &'static str {
        "importance"
    }

    fn prefix_glyphs(&self) -> &'static [char] {
        &['*']
    }

    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)> {
        let text = tokens[at].text;
        let importance = text.chars().take_while(|&c| c == '*').count() as u32;
        let term = strip_leading(text, '*')?;
        Some((term.clone(), Capture::Boosted { term, importance }))
    }

    fn end_capture(&self, capture: Capture) -> Option<ScoreFilter> {
        let Capture::Boosted { term, importance } = capture else { return None };
        let filter: ScoreFilter = Arc::new(move |_: &ParsedQuery, corpus: &Corpus, doc: DocId, score: f64| {
            if !corpus.contains(&term, doc) {
                return score;
            }
            let idf = corpus.idf(&term);
            (0..importance).fold(score, |acc, _| acc * idf)
        });
        Some(filter)
    }
}

/// `left ~ right`: the closer the nearest occurrences of the two words, the higher
/// the score.
#[derive(Debug, Default)]
pub struct Proximity;

impl Operator for Proximity {
    fn name(&self) -> &'static str {
        "proximity"
    }

    fn standalone_glyphs(&self) -> &'static [char] {
        &['~']
    }

    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)> {
        if tokens[at].text != "~" {
            return None;
        }
        let left = strip_glyphs(tokens.get(at.checked_sub(1)?)?.text);
        let right = strip_glyphs(tokens.get(at + 1)?.text);
        if left.is_empty() || right.is_empty() {
            return None;
        }
        let key = format!("{left}~{right}");
        Some((key, Capture::Pair { left: left.to_string(), right: right.to_string() }))
    }

    fn end_capture(&self, capture: Capture) -> Option<ScoreFilter> {
        let Capture::Pair { left, right } = capture else { return None };
        let filter: ScoreFilter = Arc::new(move |_: &ParsedQuery, corpus: &Corpus, doc: DocId, score: f64| {
            let (Some(a), Some(b)) = (corpus.posting(&left, doc), corpus.posting(&right, doc)) else {
                return score;
            };
            let Some(distance) = nearest_distance(&a.offsets, &b.offsets) else {
                return score;
            };
            let distinct = corpus.document(doc).map_or(0, |v| v.terms.len());
            if distinct == 0 {
                return score;
            }
            let factor = distance.max(1) as f64 / distinct as f64;
            score / factor
        });
        Some(filter)
    }
}

/// Accepts any token verbatim. Always last in the chain.
#[derive(Debug, Default)]
pub struct Fallback;

impl Operator for Fallback {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn begin_capture(&self, tokens: &[QueryToken<'_>], at: usize) -> Option<(Term, Capture)> {
        let term = tokens[at].text.to_string();
        Some((term.clone(), Capture::Plain(term)))
    }

    fn end_capture(&self, _capture: Capture) -> Option<ScoreFilter> {
        None
    }
}

/// Smallest absolute difference between an offset of `left` and one of `right`,
/// binary searching `left` for every offset of `right`.
pub fn nearest_distance(left: &[u64], right: &[u64]) -> Option<u64> {
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let sorted: Cow<'_, [u64]> = if left.windows(2).all(|w| w[0] <= w[1]) {
        Cow::Borrowed(left)
    } else {
        let mut owned = left.to_vec();
        owned.sort_unstable();
        Cow::Owned(owned)
    };

    right
        .iter()
        .map(|&point| {
            let idx = sorted.partition_point(|&x| x < point);
            let after = sorted.get(idx).map(|&x| x - point);
            let before = idx.checked_sub(1).map(|i| point - sorted[i]);
            after.into_iter().chain(before).min().unwrap_or(u64::MAX)
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&'static str]) -> Vec<QueryToken<'static>> {
        words.iter().map(|&w| QueryToken { text: w, start: 0 }).collect()
    }

    #[test]
    fn prefix_operators_strip_their_glyph() {
        let t = tokens(&["^cat", "!dog", "***bird"]);
        assert_eq!(MustExist.begin_capture(&t, 0).unwrap().0, "cat");
        assert!(MustExist.begin_capture(&t, 1).is_none());
        assert_eq!(MustNotExist.begin_capture(&t, 1).unwrap().0, "dog");
        assert_eq!(
            Importance.begin_capture(&t, 2).unwrap().1,
            Capture::Boosted { term: "bird".into(), importance: 3 }
        );
    }

    #[test]
    fn proximity_needs_both_neighbors() {
        let t = tokens(&["~", "cat", "~", "dog", "~"]);
        assert!(Proximity.begin_capture(&t, 0).is_none());
        assert!(Proximity.begin_capture(&t, 4).is_none());
        let (key, capture) = Proximity.begin_capture(&t, 2).unwrap();
        assert_eq!(key, "cat~dog");
        assert!(!capture.is_weighted());
    }

    #[test]
    fn excluded_capture_is_unweighted() {
        let t = tokens(&["!dog"]);
        let (_, capture) = MustNotExist.begin_capture(&t, 0).unwrap();
        assert_eq!(capture, Capture::Excluded("dog".into()));
        assert!(!capture.is_weighted());
    }

    #[test]
    fn proximity_leaves_score_when_a_neighbor_is_absent() {
        let mut corpus = Corpus::new();
        for (pos, word) in ["alpha", "filler", "beta"].iter().enumerate() {
            corpus.add(word, pos as u64 * 7, 0);
        }
        corpus.add("alpha", 0, 1);
        corpus.add("other", 6, 1);
        corpus.add("gamma", 0, 2);
        corpus.postprocess();

        let filter = Proximity
            .end_capture(Capture::Pair { left: "alpha".into(), right: "beta".into() })
            .unwrap();
        let query = ParsedQuery::default();
        assert_eq!(filter(&query, &corpus, 1, 0.7), 0.7);
        assert_eq!(filter(&query, &corpus, 2, 0.7), 0.7);
        assert_ne!(filter(&query, &corpus, 0, 0.7), 0.7);
    }

    #[test]
    fn fallback_accepts_anything() {
        let t = tokens(&["~"]);
        assert_eq!(Fallback.begin_capture(&t, 0).unwrap().0, "~");
        assert!(Fallback.end_capture(Capture::Plain("~".into())).is_none());
    }

    #[test]
    fn nearest_distance_finds_closest_pair() {
        assert_eq!(nearest_distance(&[1, 10, 40], &[25, 38]), Some(2));
        assert_eq!(nearest_distance(&[5], &[5]), Some(0));
        assert_eq!(nearest_distance(&[30, 2], &[0]), Some(2));
        assert_eq!(nearest_distance(&[], &[1]), None);
    }
}
