//! Query parsing: scanning a raw query into tokens and routing every token through
//! the operator chain.

pub mod operators;

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

use crate::Term;
pub use operators::{Capture, Operator, ScoreFilter};
use operators::{Fallback, Importance, MustExist, MustNotExist, Proximity};

lazy_static! {
    static ref STANDARD: OperatorRegistry = {
        let operators: Vec<Box<dyn Operator>> =
            vec![Box::new(MustExist), Box::new(MustNotExist), Box::new(Importance), Box::new(Proximity)];
        OperatorRegistry::new(operators).expect("built-in operators have distinct glyphs")
    };
}

/// One scanned piece of the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryToken<'a> {
    pub text: &'a str,
    /// Byte offset of the token in the query text.
    pub start: usize,
}

#[derive(Clone)]
pub struct QueryTerm {
    pub term: Term,
    pub occurrences: u64,
    /// Byte offsets of every occurrence of the term in the query text.
    pub offsets: Vec<usize>,
    pub filter: Option<ScoreFilter>,
    /// Whether the term takes part in the cosine similarity. Pseudo-terms that only
    /// carry a filter do not.
    pub weighted: bool,
}

impl fmt::Debug for QueryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTerm")
            .field("term", &self.term)
            .field("occurrences", &self.occurrences)
            .field("offsets", &self.offsets)
            .field("filter", &self.filter.is_some())
            .field("weighted", &self.weighted)
            .finish()
    }
}

impl QueryTerm {
    /// Query-side term frequency, `ln(occurrences) + 1`.
    pub fn tf(&self) -> f64 {
        (self.occurrences as f64).ln() + 1.0
    }
}

/// A query after operator processing. Terms keep their first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    original_text: String,
    terms: Vec<QueryTerm>,
    positions: HashMap<Term, usize>,
}

impl ParsedQuery {
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn get(&self, term: &str) -> Option<&QueryTerm> {
        self.positions.get(term).map(|&i| &self.terms[i])
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn record(&mut self, term: Term, offset: usize, filter: Option<ScoreFilter>, weighted: bool) {
        if let Some(&i) = self.positions.get(&term) {
            let existing = &mut self.terms[i];
            existing.occurrences += 1;
            existing.offsets.push(offset);
            existing.weighted |= weighted;
            if existing.filter.is_none() {
                existing.filter = filter;
            }
            return;
        }
        self.positions.insert(term.clone(), self.terms.len());
        self.terms.push(QueryTerm { term, occurrences: 1, offsets: vec![offset], filter, weighted });
    }
}

/// Ordered operator chain with the token pattern derived from the operators' glyphs.
pub struct OperatorRegistry {
    operators: Vec<Box<dyn Operator>>,
    pattern: Regex,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.operators.iter().map(|op| op.name()).collect();
        f.debug_struct("OperatorRegistry")
            .field("operators", &names)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Operator glyphs must be unique across the chain and must not be word characters.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("glyph '{glyph}' is claimed by both {first} and {second}")]
    DuplicateGlyph { glyph: char, first: &'static str, second: &'static str },
    #[error("glyph '{glyph}' of {operator} is a word character")]
    WordGlyph { glyph: char, operator: &'static str },
    #[error("token pattern rejected: {0}")]
    Pattern(#[from] regex::Error),
}

impl OperatorRegistry {
    /// Build a chain from `operators` in priority order. The fallback operator is
    /// appended last.
    pub fn new(mut operators: Vec<Box<dyn Operator>>) -> Result<Self, RegistryError> {
        let mut owners: HashMap<char, &'static str> = HashMap::new();
        let mut prefix = String::new();
        let mut standalone = String::new();
        for op in &operators {
            let prefixed = op.prefix_glyphs().iter().map(|&g| (g, false));
            let alone = op.standalone_glyphs().iter().map(|&g| (g, true));
            for (glyph, is_standalone) in prefixed.chain(alone) {
                if glyph.is_alphanumeric() || glyph == '_' {
                    return Err(RegistryError::WordGlyph { glyph, operator: op.name() });
                }
                if let Some(first) = owners.insert(glyph, op.name()) {
                    return Err(RegistryError::DuplicateGlyph { glyph, first, second: op.name() });
                }
                let class = if is_standalone { &mut standalone } else { &mut prefix };
                class.push_str(&regex::escape(&glyph.to_string()));
            }
        }
        operators.push(Box::new(Fallback));

        let mut source = if prefix.is_empty() { r"\w+".to_string() } else { format!(r"[{prefix}]*\w+") };
        if !standalone.is_empty() {
            source.push_str(&format!("|[{standalone}]"));
        }
        let pattern = Regex::new(&source)?;
        tracing::debug!(pattern = %source, operators = operators.len(), "built operator registry");
        Ok(Self { operators, pattern })
    }

    /// The built-in chain: must-exist, must-not-exist, importance, proximity, fallback.
    pub fn standard() -> &'static OperatorRegistry {
        &STANDARD
    }

    pub fn tokens<'a>(&self, text: &'a str) -> Vec<QueryToken<'a>> {
        self.pattern
            .find_iter(text)
            .map(|m| QueryToken { text: m.as_str(), start: m.start() })
            .collect()
    }

    pub fn parse(&self, text: &str) -> ParsedQuery {
        let tokens = self.tokens(text);
        let mut query = ParsedQuery { original_text: text.to_string(), ..ParsedQuery::default() };
        for at in 0..tokens.len() {
            for op in &self.operators {
                let Some((term, capture)) = op.begin_capture(&tokens, at) else {
                    continue;
                };
                let token = tokens[at];
                let offset = if token.text.ends_with(term.as_str()) {
                    token.start + token.text.len() - term.len()
                } else {
                    token.start
                };
                let weighted = capture.is_weighted();
                let filter = op.end_capture(capture);
                query.record(term, offset, filter, weighted);
                break;
            }
        }
        query
    }
}

/// Parse `text` with the built-in operator chain.
pub fn parse(text: &str) -> ParsedQuery {
    OperatorRegistry::standard().parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_glyph_words_and_lone_tilde() {
        let tokens = OperatorRegistry::standard().tokens("^cat !dog **bird a ~ b ~c");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["^cat", "!dog", "**bird", "a", "~", "b", "~", "c"]);
    }

    #[test]
    fn repeated_terms_accumulate() {
        let q = parse("cat dog cat");
        let cat = q.get("cat").unwrap();
        assert_eq!(cat.occurrences, 2);
        assert_eq!(cat.offsets, vec![0, 8]);
        assert_eq!(q.terms().len(), 2);
        assert_eq!(q.terms()[0].term, "cat");
    }

    #[test]
    fn first_filter_is_kept() {
        let q = parse("^cat cat");
        let cat = q.get("cat").unwrap();
        assert!(cat.filter.is_some());
        assert_eq!(cat.offsets, vec![1, 5]);
    }

    #[test]
    fn excluded_term_is_unweighted_until_seen_plain() {
        let q = parse("!spam eggs");
        assert!(!q.get("spam").unwrap().weighted);
        let q = parse("!spam spam");
        let spam = q.get("spam").unwrap();
        assert!(spam.weighted);
        assert!(spam.filter.is_some());
    }

    #[test]
    fn proximity_adds_unweighted_pair() {
        let q = parse("cat ~ dog");
        assert!(q.get("cat").unwrap().weighted);
        let pair = q.get("cat~dog").unwrap();
        assert!(!pair.weighted);
        assert!(pair.filter.is_some());
    }

    #[test]
    fn dangling_tilde_falls_through() {
        let q = parse("~ cat");
        let tilde = q.get("~").unwrap();
        assert!(tilde.filter.is_none());
        assert!(tilde.weighted);
    }

    #[test]
    fn duplicate_glyphs_are_rejected() {
        let operators: Vec<Box<dyn Operator>> = vec![Box::new(MustExist), Box::new(MustExist)];
        let err = OperatorRegistry::new(operators).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateGlyph { glyph: '^', .. }));
    }

    #[test]
    fn custom_chain_without_standalone_glyphs() {
        let operators: Vec<Box<dyn Operator>> = vec![Box::new(MustNotExist)];
        let registry = OperatorRegistry::new(operators).unwrap();
        let q = registry.parse("!spam eggs ~ ham");
        assert!(q.get("spam").unwrap().filter.is_some());
        assert!(q.get("~").is_none());
        assert_eq!(q.terms().len(), 3);
    }
}
