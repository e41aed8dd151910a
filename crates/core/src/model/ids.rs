use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Separator between the parts of topic and question identifiers.
pub const ID_SEPARATOR: &str = "::";

/// Separator used by the legacy question identifier format.
pub const LEGACY_SEPARATOR: &str = "_";

/// Identifier of a topic: `module::topicName`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Builds the id for `topic` inside `module`.
    #[must_use]
    pub fn new(module: &str, topic: &str) -> Self {
        Self(format!("{module}{ID_SEPARATOR}{topic}"))
    }

    /// Wraps an already formatted id, as found in progress files.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module part. Topic names may contain the separator, so only the first one splits.
    #[must_use]
    pub fn module(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map_or(self.0.as_str(), |(module, _)| module)
    }

    /// Topic name part, or the empty string for a malformed id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0
            .split_once(ID_SEPARATOR)
            .map_or("", |(_, name)| name)
    }
}

/// Full identifier of a question: `module::topicName::rawText`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    #[must_use]
    pub fn new(module: &str, topic: &str, raw: &str) -> Self {
        Self(format!("{module}{ID_SEPARATOR}{topic}{ID_SEPARATOR}{raw}"))
    }

    /// Identifier written by older versions of the progress file.
    #[must_use]
    pub fn legacy(module: &str, topic: &str, raw: &str) -> Self {
        Self(format!(
            "{module}{LEGACY_SEPARATOR}{topic}{LEGACY_SEPARATOR}{raw}"
        ))
    }

    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier of an item within a single practice session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionItemId(Uuid);

impl SessionItemId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Id built from caller-supplied random bytes, so seeded generators stay deterministic.
    #[must_use]
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopicId({})", self.0)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for SessionItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionItemId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps terminal listings readable.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
