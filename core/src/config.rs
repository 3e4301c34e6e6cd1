use serde::{Deserialize, Serialize};

/// Results scoring at or below `threshold_ratio * max_score` are dropped.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.3;
/// Base snippet width in characters, scaled by the matched term's length.
pub const DEFAULT_SNIPPET_WIDTH: usize = 33;
/// Fuzzy candidates must differ in length from the query term by less than this.
pub const DEFAULT_MAX_LENGTH_DELTA: usize = 3;
/// A fuzzy substitute may be at most `len(term) / divisor` edits away.
pub const DEFAULT_EDIT_DIVISOR: usize = 3;
/// Prefix aliases are only registered for prefixes longer than this many characters.
pub const ALIAS_MIN_PREFIX: usize = 3;

/// Ranking knobs. Every field has a default, so partial JSON or query strings deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub threshold_ratio: f64,
    pub snippet_width: usize,
    pub max_length_delta: usize,
    pub edit_divisor: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
            snippet_width: DEFAULT_SNIPPET_WIDTH,
            max_length_delta: DEFAULT_MAX_LENGTH_DELTA,
            edit_divisor: DEFAULT_EDIT_DIVISOR,
        }
    }
}

impl SearchConfig {
    /// Largest edit distance accepted for a fuzzy substitute of a term with `len` characters.
    pub fn edit_budget(&self, len: usize) -> usize {
        len / self.edit_divisor.max(1)
    }
}
