//! Entity identity: path keys, source keys, and the composite entity key.
//!
//! Every scene entity the bridge manages is addressed by a composite
//! identity: *where* it sits in a logical hierarchy (the [`PathKey`], e.g.
//! `body/arm/hand`) and *which grouping* it came from (the [`SourceKey`],
//! typically the originating file). Two identical paths under different
//! sources are different entities; the same `(source, path)` pair always
//! names the same entity for the lifetime of a session.
//!
//! On the wire both keys are forward-slash-joined strings. They are parsed
//! into the typed forms at the message boundary, so a malformed key is a
//! decode failure (the frame is dropped) rather than a latent bad state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing identity keys from their wire form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The path contained no segments (empty string or only slashes).
    #[error("path key has no segments: {0:?}")]
    EmptyPath(String),

    /// The source key was empty.
    #[error("source key is empty")]
    EmptySource,
}

/// An ordered sequence of segments naming a position in a logical hierarchy.
///
/// The wire encoding is the forward-slash join of the segments (`"a/b/c"`).
/// Empty segments (leading, trailing, or doubled slashes) are discarded on
/// parse; a path must keep at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathKey {
    segments: Vec<String>,
}

impl PathKey {
    /// Builds a path key from owned segments.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmptyPath`] if no non-empty segment remains.
    pub fn new<I, S>(segments: I) -> Result<Self, IdentityError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return Err(IdentityError::EmptyPath(String::new()));
        }
        Ok(Self { segments })
    }

    /// Parses the slash-joined wire form.
    pub fn from_wire(wire: &str) -> Result<Self, IdentityError> {
        let segments: Vec<String> = wire
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            return Err(IdentityError::EmptyPath(wire.to_string()));
        }
        Ok(Self { segments })
    }

    /// The slash-joined wire form.
    pub fn wire(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last (most specific) segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().expect("path key is never empty")
    }

    /// The path with its last segment removed; `None` for a root path.
    pub fn parent(&self) -> Option<PathKey> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(PathKey {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The first `depth` segments as a path key.
    ///
    /// `depth` must be in `1..=self.depth()`.
    pub fn prefix(&self, depth: usize) -> PathKey {
        assert!(depth >= 1 && depth <= self.segments.len());
        PathKey {
            segments: self.segments[..depth].to_vec(),
        }
    }

    /// The deterministic entity name for this path: segments joined with
    /// `.`, most specific first (`"c.b.a"` for `a/b/c`).
    ///
    /// The reversed order disambiguates same-named siblings at different
    /// depths: `a/b` names `"b.a"` while `b/a` names `"a.b"`.
    pub fn entity_name(&self) -> String {
        let mut parts: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        parts.reverse();
        parts.join(".")
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

impl TryFrom<String> for PathKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PathKey::from_wire(&value)
    }
}

impl From<PathKey> for String {
    fn from(key: PathKey) -> String {
        key.wire()
    }
}

/// Identifies the originating grouping (typically a file) a path belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceKey(String);

impl SourceKey {
    pub fn new(key: impl Into<String>) -> Result<Self, IdentityError> {
        let key = key.into();
        if key.is_empty() {
            return Err(IdentityError::EmptySource);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SourceKey {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SourceKey::new(value)
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> String {
        key.0
    }
}

/// Composite identity of one scene entity: a path scoped to its source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub source: SourceKey,
    pub path: PathKey,
}

impl EntityKey {
    pub fn new(source: SourceKey, path: PathKey) -> Self {
        Self { source, path }
    }

    /// The key of this entity's parent; `None` for a root entity.
    pub fn parent(&self) -> Option<EntityKey> {
        self.path.parent().map(|path| EntityKey {
            source: self.source.clone(),
            path,
        })
    }

    /// The key truncated to the first `depth` path segments.
    pub fn prefix(&self, depth: usize) -> EntityKey {
        EntityKey {
            source: self.source.clone(),
            path: self.path.prefix(depth),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.path)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
