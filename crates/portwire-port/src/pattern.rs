use crate::error::{PortError, Result};

/// A compiled wildcard pattern for handler names.
///
/// `*` matches any run of characters (including none), `?` matches exactly
/// one. Everything else is literal. Patterns are compared to names as whole
/// strings; there is no implicit anchoring to add.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    chars: Vec<char>,
}

impl NamePattern {
    /// Compile a pattern. The empty pattern is rejected; it could never
    /// name a frame, since call frames always carry a non-empty name.
    pub fn compile(source: &str) -> Result<Self> {
        if source.is_empty() {
            return Err(PortError::InvalidPattern(source.to_owned()));
        }
        Ok(Self {
            source: source.to_owned(),
            chars: source.chars().collect(),
        })
    }

    /// The pattern text as given to [`Self::compile`]. Registry identity is
    /// keyed on this.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `name` matches this pattern.
    pub fn matches(&self, name: &str) -> bool {
        let text: Vec<char> = name.chars().collect();
        glob_match(&self.chars, &text)
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Iterative glob match with single-star backtracking.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    let mut p = 0;
    let mut t = 0;
    // Position to resume from when a literal mismatch follows a star.
    let mut star_p = usize::MAX;
    let mut star_t = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star_p = p;
            star_t = t;
            p += 1;
        } else if star_p != usize::MAX {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }
    p == pattern.len()
}
