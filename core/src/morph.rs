//! "Did you mean" tracking and the edit distance used to find substitutes.

/// Rewrites of the query text made while scoring one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Morph {
    original: String,
    current: String,
    /// Applied substitutions as (byte offset in `original`, replaced length, replacement).
    edits: Vec<(usize, usize, String)>,
}

impl Morph {
    pub fn new(original: impl Into<String>) -> Self {
        let original = original.into();
        Self { current: original.clone(), original, edits: Vec::new() }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// The rewritten text, if any substitution changed it.
    pub fn suggestion(&self) -> Option<&str> {
        (self.current != self.original).then_some(self.current.as_str())
    }

    /// Replace every occurrence of `term` recorded at `offsets` (byte offsets into the
    /// original text) with `substitute`. Offsets that do not hold `term` are ignored.
    pub fn alternative(&mut self, term: &str, offsets: &[usize], substitute: &str) {
        if term == substitute {
            return;
        }
        for &at in offsets {
            if self.original.get(at..at + term.len()) != Some(term) {
                continue;
            }
            if self.edits.iter().any(|(start, _, _)| *start == at) {
                continue;
            }
            self.edits.push((at, term.len(), substitute.to_string()));
        }
        self.edits.sort_by_key(|(start, _, _)| *start);
        self.current = self.render();
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.original.len());
        let mut cursor = 0;
        for (start, len, replacement) in &self.edits {
            out.push_str(&self.original[cursor..*start]);
            out.push_str(replacement);
            cursor = start + len;
        }
        out.push_str(&self.original[cursor..]);
        out
    }
}

/// Levenshtein distance with a scratch matrix that grows to the largest pair seen and
/// is reused between calls.
#[derive(Debug, Default)]
pub struct EditDistance {
    matrix: Vec<usize>,
    a: Vec<char>,
    b: Vec<char>,
}

impl EditDistance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distance(&mut self, left: &str, right: &str) -> usize {
        self.a.clear();
        self.a.extend(left.chars());
        self.b.clear();
        self.b.extend(right.chars());
        let (n, m) = (self.a.len(), self.b.len());
        if n == 0 || m == 0 {
            return n.max(m);
        }

        let width = m + 1;
        let cells = (n + 1) * width;
        if self.matrix.len() < cells {
            self.matrix.resize(cells, 0);
        }
        let d = &mut self.matrix;
        for i in 0..=n {
            d[i * width] = i;
        }
        for j in 0..=m {
            d[j] = j;
        }
        for i in 1..=n {
            for j in 1..=m {
                let cost = usize::from(self.a[i - 1] != self.b[j - 1]);
                let deletion = d[(i - 1) * width + j] + 1;
                let insertion = d[i * width + j - 1] + 1;
                let substitution = d[(i - 1) * width + j - 1] + cost;
                d[i * width + j] = deletion.min(insertion).min(substitution);
            }
        }
        d[n * width + m]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_morph_has_no_suggestion() {
        let m = Morph::new("cat sat");
        assert_eq!(m.suggestion(), None);
    }

    #[test]
    fn alternative_replaces_every_recorded_offset() {
        let mut m = Morph::new("cat and cat");
        m.alternative("cat", &[0, 8], "cqt");
        assert_eq!(m.suggestion(), Some("cqt and cqt"));
        assert_eq!(m.original(), "cat and cat");
    }

    #[test]
    fn substitutions_of_different_lengths_compose() {
        let mut m = Morph::new("^helo wrld");
        m.alternative("wrld", &[6], "world");
        m.alternative("helo", &[1], "hello");
        assert_eq!(m.current(), "^hello world");
    }

    #[test]
    fn mismatched_offset_is_ignored() {
        let mut m = Morph::new("dog");
        m.alternative("cat", &[0], "cot");
        assert_eq!(m.suggestion(), None);
    }

    #[test]
    fn distance_properties() {
        let mut ed = EditDistance::new();
        assert_eq!(ed.distance("kitten", "kitten"), 0);
        assert_eq!(ed.distance("kitten", "sitting"), 3);
        assert_eq!(ed.distance("sitting", "kitten"), 3);
        assert_eq!(ed.distance("", "abc"), 3);
        assert_eq!(ed.distance("abc", ""), 3);
        assert_eq!(ed.distance("cat", "cqt"), 1);
        // smaller pair after a larger one reuses the scratch
        assert_eq!(ed.distance("ab", "ba"), 2);
        assert_eq!(ed.distance("über", "uber"), 1);
    }
}
