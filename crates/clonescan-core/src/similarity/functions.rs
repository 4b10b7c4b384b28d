//! Function-interface extraction and comparison.
//!
//! The interface of a contract is approximated by the set of names declared
//! as `function <name>(`.  Extraction sits behind [`FunctionExtractor`] so a
//! parser-backed implementation can replace the lexical one.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SOLIDITY_FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").expect("valid function pattern")
});

/// Distinct function names declared by a contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionSignatureSet(BTreeSet<String>);

impl FunctionSignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    /// `|A ∩ B| / |A ∪ B|`, or 0.0 when both sets are empty.
    pub fn jaccard(&self, other: &Self) -> f64 {
        let intersection = self.0.intersection(&other.0).count();
        let union = self.0.len() + other.0.len() - intersection;
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FunctionSignatureSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Produces the declared function names of a source text.
pub trait FunctionExtractor: Send + Sync {
    fn extract(&self, source: &str) -> FunctionSignatureSet;
}

/// Lexical extractor matching `<keyword> <identifier>(`.
#[derive(Clone, Debug)]
pub struct RegexFunctionExtractor {
    pattern: Regex,
    strip_comments: bool,
}

impl Default for RegexFunctionExtractor {
    fn default() -> Self {
        Self {
            pattern: SOLIDITY_FUNCTION_RE.clone(),
            strip_comments: false,
        }
    }
}

impl RegexFunctionExtractor {
    /// Extractor for a different declaration keyword (`fn`, `def`, ...).
    pub fn with_keyword(keyword: &str) -> Self {
        let keyword = keyword.trim();
        if keyword.is_empty() || keyword == "function" {
            return Self::default();
        }
        let pattern = format!(
            r"\b{}\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(",
            regex::escape(keyword)
        );
        match Regex::new(&pattern) {
            Ok(pattern) => Self {
                pattern,
                strip_comments: false,
            },
            Err(_) => Self::default(),
        }
    }

    /// Ignore declarations inside comments and string literals.
    pub fn strip_comments(mut self, enabled: bool) -> Self {
        self.strip_comments = enabled;
        self
    }
}

impl FunctionExtractor for RegexFunctionExtractor {
    fn extract(&self, source: &str) -> FunctionSignatureSet {
        let cleaned;
        let text = if self.strip_comments {
            cleaned = strip_comments_and_strings(source);
            cleaned.as_str()
        } else {
            source
        };
        self.pattern
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }
}

/// Replace `//` and `/* */` comments and quoted strings with spaces, keeping
/// line structure.
pub fn strip_comments_and_strings(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                '"' | '\'' => {
                    out.push(' ');
                    state = State::Str(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Str(quote) => {
                if c == '\\' {
                    out.push(' ');
                    if let Some(escaped) = chars.next() {
                        out.push(if escaped == '\n' { '\n' } else { ' ' });
                    }
                } else if c == quote {
                    out.push(' ');
                    state = State::Code;
                } else {
                    out.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
        }
    }
    out
}

/// Function names declared in `source` using the default Solidity pattern.
pub fn extract_function_names(source: &str) -> FunctionSignatureSet {
    RegexFunctionExtractor::default().extract(source)
}
