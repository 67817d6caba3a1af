//! Authenticated identity and scope model.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named permission bucket limiting which operations a principal may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Read,
    Write,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Scope::Read),
            "write" => Some(Scope::Write),
            _ => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of scopes granted to a principal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both `read` and `write`.
    pub fn full() -> Self {
        Self([Scope::Read, Scope::Write].into_iter().collect())
    }

    pub fn single(scope: Scope) -> Self {
        Self([scope].into_iter().collect())
    }

    /// Parses a space-separated scope string, ignoring unknown entries.
    pub fn parse(s: &str) -> Self {
        Self(s.split_whitespace().filter_map(Scope::parse).collect())
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Which credential family authenticated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    StaticKey,
    Session,
    OAuth,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::StaticKey => "static_key",
            CredentialKind::Session => "session",
            CredentialKind::OAuth => "oauth",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity for one request. Built at validation time,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identifier safe to log (never a raw secret).
    pub id: String,
    pub kind: CredentialKind,
    pub scopes: ScopeSet,
}

impl Principal {
    pub fn new(id: impl Into<String>, kind: CredentialKind, scopes: ScopeSet) -> Self {
        Self {
            id: id.into(),
            kind,
            scopes,
        }
    }

    pub fn can(&self, scope: Scope) -> bool {
        self.scopes.contains(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("read"), Some(Scope::Read));
        assert_eq!(Scope::parse("write"), Some(Scope::Write));
        assert_eq!(Scope::parse("admin"), None);
    }

    #[test]
    fn test_scope_set_roundtrip() {
        let scopes = ScopeSet::parse("write read");
        assert_eq!(scopes, ScopeSet::full());
        assert_eq!(scopes.to_string(), "read write");
    }

    #[test]
    fn test_scope_set_ignores_unknown() {
        let scopes = ScopeSet::parse("read frobnicate");
        assert!(scopes.contains(Scope::Read));
        assert!(!scopes.contains(Scope::Write));
    }

    #[test]
    fn test_subset() {
        assert!(ScopeSet::single(Scope::Read).is_subset(&ScopeSet::full()));
        assert!(!ScopeSet::full().is_subset(&ScopeSet::single(Scope::Read)));
    }

    #[test]
    fn test_principal_can() {
        let principal = Principal::new("key-1", CredentialKind::StaticKey, ScopeSet::full());
        assert!(principal.can(Scope::Read));
        assert!(principal.can(Scope::Write));

        let reader = Principal::new(
            "client-a",
            CredentialKind::OAuth,
            ScopeSet::single(Scope::Read),
        );
        assert!(!reader.can(Scope::Write));
    }
}
