//! External identifier parsing (`isbn:...`, `asin:...`).
//!
//! Identifier lists arrive as a single comma-separated string. They are
//! parsed once into an [`IdentifierSet`] so every strategy compares the
//! same normalized tokens.

use serde::Serialize;

/// Normalized identifier tokens of one record, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentifierSet {
    tokens: Vec<String>,
}

impl IdentifierSet {
    /// Parse a raw identifier string. Malformed or empty entries are skipped.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut tokens: Vec<String> = Vec::new();

        for token in raw.unwrap_or("").split(',') {
            let token = token.trim().to_lowercase();
            if token.is_empty() || token == "null" {
                continue;
            }
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// True when the two sets share at least one token exactly.
    pub fn intersects(&self, other: &IdentifierSet) -> bool {
        self.tokens.iter().any(|t| other.contains(t))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

/// Convenience wrapper over [`IdentifierSet::parse`].
pub fn parse_identifiers(raw: Option<&str>) -> IdentifierSet {
    IdentifierSet::parse(raw)
}
