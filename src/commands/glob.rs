//! Glob matching for `KEYS`.
//!
//! Supported syntax:
//! - `*` matches any run of bytes, including none
//! - `?` matches exactly one byte
//! - `[abc]`, `[a-z]`, `[^a-z]` match one byte from (or not from) a class
//! - `\x` matches `x` literally

/// A glob pattern over raw key bytes.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    /// Returns true if the whole of `text` matches.
    pub fn matches(&self, text: &[u8]) -> bool {
        match_from(&self.pattern, text)
    }
}

/// Matches with the usual single-star backtracking: on a mismatch, return
/// to the most recent `*` and let it swallow one more byte. Earlier stars
/// never need revisiting, so this runs in O(pattern * text).
fn match_from(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Pattern index after the last `*`, and the text index it resumes from
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if pattern.get(p) == Some(&b'*') {
            p += 1;
            star = Some((p, t));
            continue;
        }
        if let Some(next) = match_one(pattern, p, text[t]) {
            p = next;
            t += 1;
            continue;
        }
        match star {
            Some((resume_p, resume_t)) => {
                p = resume_p;
                t = resume_t + 1;
                star = Some((resume_p, t));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Matches the single-byte token at `pattern[p]` against `byte` and returns
/// the index of the next token.
fn match_one(pattern: &[u8], p: usize, byte: u8) -> Option<usize> {
    match *pattern.get(p)? {
        b'?' => Some(p + 1),
        b'[' => {
            let (class, after) = split_class(&pattern[p + 1..])?;
            class.contains(byte).then_some(pattern.len() - after.len())
        }
        b'\\' if p + 1 < pattern.len() => (pattern[p + 1] == byte).then_some(p + 2),
        literal => (literal == byte).then_some(p + 1),
    }
}

/// A parsed `[...]` class.
struct Class<'a> {
    body: &'a [u8],
    negate: bool,
}

impl Class<'_> {
    fn contains(&self, byte: u8) -> bool {
        let mut found = false;
        let mut i = 0;
        while i < self.body.len() {
            if i + 2 < self.body.len() && self.body[i + 1] == b'-' {
                found |= (self.body[i]..=self.body[i + 2]).contains(&byte);
                i += 3;
            } else {
                found |= self.body[i] == byte;
                i += 1;
            }
        }
        found != self.negate
    }
}

/// Splits a class body off `pattern` (which starts just after `[`).
/// Returns `None` for an unterminated class.
fn split_class(pattern: &[u8]) -> Option<(Class<'_>, &[u8])> {
    let (negate, body_start) = match pattern.first() {
        Some(b'^') => (true, 1),
        _ => (false, 0),
    };
    let close = pattern[body_start..].iter().position(|&b| b == b']')? + body_start;
    Some((
        Class {
            body: &pattern[body_start..close],
            negate,
        },
        &pattern[close + 1..],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, text: &str) -> bool {
        GlobPattern::new(pattern).matches(text.as_bytes())
    }

    #[test]
    fn test_glob_pattern() {
        assert!(m("h*llo", "hello"));
        assert!(m("h*llo", "hllo"));
        assert!(m("h*llo", "heeeello"));
        assert!(!m("h*llo", "world"));

        assert!(m("h?llo", "hallo"));
        assert!(!m("h?llo", "hllo"));

        assert!(m("*", ""));
        assert!(m("*", "anything"));

        assert!(m("h[ae]llo", "hello"));
        assert!(!m("h[ae]llo", "hillo"));
        assert!(m("key[0-9]", "key7"));
        assert!(!m("key[^0-9]", "key7"));
        assert!(m("key[^0-9]", "keyx"));
        assert!(!m("h[ae", "ha"));

        assert!(m("a\\*b", "a*b"));
        assert!(!m("a\\*b", "axb"));

        assert!(m("*:*", "user:1"));
        assert!(m("a*b*c", "aXbYbZc"));
        assert!(!m("a*b*c", "aXbYbZ"));
        assert!(m("**", ""));
        assert!(!m("?", ""));
    }

    #[test]
    fn test_many_stars_do_not_blow_up() {
        let text = "a".repeat(5_000);
        assert!(!m("*a*a*a*a*a*a*a*a*b", &text));
        assert!(m("*a*a*a*a*a*a*a*a*", &text));
    }
}
