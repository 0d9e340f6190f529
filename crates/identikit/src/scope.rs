//! OAuth 2.0 scope values.
//!
//! A scope is a set of string tokens. The wire form is the canonical
//! space-delimited string (RFC 6749 §3.3); equality ignores token order.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A set of OAuth 2.0 scope tokens
///
/// Insertion order is preserved for serialization; comparing two scopes
/// treats them as sets, so `"read write"` equals `"write read"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Scope(Vec<String>);

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a scope from individual tokens, skipping duplicates.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut scope = Self::new();
        for token in tokens {
            scope.push(token);
        }
        scope
    }

    /// Add a token unless it is already present or empty.
    pub fn push(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !token.is_empty() && !self.contains(&token) {
            self.0.push(token);
        }
    }

    /// Whether the scope contains the given token.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|existing| existing == token)
    }

    /// Whether the scope holds no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of tokens in the scope.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the tokens in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl From<&str> for Scope {
    fn from(raw: &str) -> Self {
        Self::from_tokens(raw.split_whitespace())
    }
}

impl From<String> for Scope {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        let lhs: HashSet<&str> = self.0.iter().map(String::as_str).collect();
        let rhs: HashSet<&str> = other.0.iter().map(String::as_str).collect();
        lhs == rhs
    }
}

impl Eq for Scope {}
