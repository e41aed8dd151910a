use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::catalog::Question;
use crate::model::ids::{QuestionId, TopicId};

/// Schema version written by this crate.
pub const PROGRESS_VERSION: u32 = 2;

/// Allowed difficulty range.
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress file is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("progress file has an unexpected shape: {0}")]
    Shape(#[source] serde_json::Error),
    #[error("progress file must be an object or a legacy array")]
    UnsupportedRoot,
    #[error("unknown topic state code: {0}")]
    UnknownState(u8),
    #[error("could not encode progress: {0}")]
    Encode(#[source] serde_json::Error),
}

//
// ─── TOPIC STATE ───────────────────────────────────────────────────────────────
//

/// Lifecycle stage stored per topic. Persisted as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TopicState {
    New,
    Learning,
    Review,
    Relearning,
}

impl TopicState {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            TopicState::New => 0,
            TopicState::Learning => 1,
            TopicState::Review => 2,
            TopicState::Relearning => 3,
        }
    }
}

impl TryFrom<u8> for TopicState {
    type Error = ProgressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::New),
            1 => Ok(Self::Learning),
            2 => Ok(Self::Review),
            3 => Ok(Self::Relearning),
            other => Err(ProgressError::UnknownState(other)),
        }
    }
}

impl From<TopicState> for u8 {
    fn from(state: TopicState) -> Self {
        state.code()
    }
}

//
// ─── TOPIC MEMORY STATE ────────────────────────────────────────────────────────
//

/// Memory estimate for one topic that has been reviewed at least once.
///
/// Invariants after every write through [`TopicMemoryState::scheduled`]:
/// `stability > 0`, `difficulty ∈ [1, 10]`, `due >= last_review`.
/// Fields this crate does not know are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMemoryState {
    pub state: TopicState,
    pub stability: f64,
    pub difficulty: f64,
    pub due: DateTime<Utc>,
    pub last_review: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TopicMemoryState {
    /// Build the state written after a review at `reviewed_at`.
    #[must_use]
    pub fn scheduled(
        state: TopicState,
        stability: f64,
        difficulty: f64,
        reviewed_at: DateTime<Utc>,
        interval_days: u32,
    ) -> Self {
        Self {
            state,
            stability,
            difficulty: clamp_difficulty(difficulty),
            due: reviewed_at + Duration::days(i64::from(interval_days)),
            last_review: reviewed_at,
            extra: Map::new(),
        }
    }

    /// Carry unknown fields over from the state this one replaces.
    #[must_use]
    pub fn keeping_extra_of(mut self, previous: &Self) -> Self {
        self.extra.clone_from(&previous.extra);
        self
    }

    /// Whether the topic may be selected again at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }

    /// Whether the stored stability can be used as a divisor.
    #[must_use]
    pub fn has_usable_stability(&self) -> bool {
        self.stability.is_finite() && self.stability > 0.0
    }
}

/// Clamp a difficulty into the allowed range. NaN maps to the lower bound.
#[must_use]
pub fn clamp_difficulty(value: f64) -> f64 {
    if value.is_nan() {
        return MIN_DIFFICULTY;
    }
    value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

//
// ─── PROGRESS STORE ────────────────────────────────────────────────────────────
//

/// Known top-level fields of the progress document.
const KNOWN_FIELDS: [&str; 3] = ["history", "topics", "custom_associations"];

/// The persisted progress document.
///
/// `history` is append-only and may hold duplicates; use [`ProgressStore::history_index`]
/// for membership. Top-level fields this crate does not know are kept in `extra`
/// and written back unchanged.
///
/// A document of another version keeps its original text in `passthrough`;
/// see [`ProgressStore::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub history: Vec<QuestionId>,
    #[serde(default)]
    pub topics: BTreeMap<TopicId, TopicMemoryState>,
    #[serde(default)]
    pub custom_associations: BTreeMap<QuestionId, Vec<TopicId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    passthrough: Option<Passthrough>,
}

/// Verbatim copy of a document in a version this crate does not write.
#[derive(Debug, Clone, PartialEq)]
struct Passthrough {
    document: Map<String, Value>,
    /// Known fields present in the document that did not decode.
    opaque: Vec<&'static str>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    /// Fresh store with empty collections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: Some(PROGRESS_VERSION),
            history: Vec::new(),
            topics: BTreeMap::new(),
            custom_associations: BTreeMap::new(),
            extra: Map::new(),
            passthrough: None,
        }
    }

    /// Wrap a legacy bare history array, keeping every entry as-is.
    #[must_use]
    pub fn migrate(legacy_history: Vec<QuestionId>) -> Self {
        Self {
            history: legacy_history,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn history_index(&self) -> HistoryIndex<'_> {
        HistoryIndex {
            seen: self.history.iter().map(QuestionId::as_str).collect(),
        }
    }

    pub fn record_history(&mut self, id: QuestionId) {
        self.history.push(id);
    }

    #[must_use]
    pub fn topic_state(&self, id: &TopicId) -> Option<&TopicMemoryState> {
        self.topics.get(id)
    }

    pub fn set_topic_state(&mut self, id: TopicId, state: TopicMemoryState) {
        self.topics.insert(id, state);
    }

    /// A topic is due when it has never been reviewed or its due date has passed.
    #[must_use]
    pub fn is_topic_due(&self, id: &TopicId, now: DateTime<Utc>) -> bool {
        self.topics.get(id).is_none_or(|state| state.is_due(now))
    }

    pub fn record_association(&mut self, question: QuestionId, topics: Vec<TopicId>) {
        self.custom_associations.insert(question, topics);
    }

    /// Parse a progress file, migrating the legacy array format.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the text is not JSON or does not match either format.
    pub fn from_json_str(raw: &str) -> Result<LoadedProgress, ProgressError> {
        let value: Value = serde_json::from_str(raw).map_err(ProgressError::Parse)?;
        Self::from_value(value)
    }

    /// Decode a parsed progress document.
    ///
    /// - A bare array is migrated into a current store.
    /// - A version 2 object must match the current shape.
    /// - Any other object is kept verbatim. Known fields that decode are
    ///   readable and writable through the typed fields; the rest stay opaque
    ///   and are written back unchanged, with new entries appended on top.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` for a scalar root, a legacy array holding
    /// non-strings, or a version 2 object of the wrong shape.
    pub fn from_value(value: Value) -> Result<LoadedProgress, ProgressError> {
        match value {
            Value::Array(_) => {
                let legacy: Vec<QuestionId> =
                    serde_json::from_value(value).map_err(ProgressError::Shape)?;
                let entries = legacy.len();
                Ok(LoadedProgress {
                    store: Self::migrate(legacy),
                    format: ProgressFormat::Legacy { entries },
                })
            }
            Value::Object(document) => {
                let version = document
                    .get("version")
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok());
                if version == Some(PROGRESS_VERSION) {
                    let store: Self = serde_json::from_value(Value::Object(document))
                        .map_err(ProgressError::Shape)?;
                    return Ok(LoadedProgress {
                        store,
                        format: ProgressFormat::Current,
                    });
                }
                Ok(LoadedProgress {
                    store: Self::passthrough(version, document),
                    format: ProgressFormat::UnknownVersion { version },
                })
            }
            _ => Err(ProgressError::UnsupportedRoot),
        }
    }

    fn passthrough(version: Option<u32>, document: Map<String, Value>) -> Self {
        let mut store = Self {
            version,
            ..Self::new()
        };
        let mut opaque = Vec::new();

        for field in KNOWN_FIELDS {
            let Some(raw) = document.get(field).cloned() else {
                continue;
            };
            let decoded = match field {
                "history" => serde_json::from_value(raw).map(|history: Vec<QuestionId>| {
                    store.history = history;
                }),
                "topics" => serde_json::from_value(raw).map(
                    |topics: BTreeMap<TopicId, TopicMemoryState>| store.topics = topics,
                ),
                _ => serde_json::from_value(raw).map(
                    |associations: BTreeMap<QuestionId, Vec<TopicId>>| {
                        store.custom_associations = associations;
                    },
                ),
            };
            if decoded.is_err() {
                opaque.push(field);
            }
        }

        store.passthrough = Some(Passthrough { document, opaque });
        store
    }

    /// True when this store was loaded from a document of another version.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.passthrough.is_some()
    }

    /// The document as written to remote storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Encode` if serialization fails.
    pub fn to_value(&self) -> Result<Value, ProgressError> {
        let typed = serde_json::to_value(self).map_err(ProgressError::Encode)?;
        let Some(passthrough) = &self.passthrough else {
            return Ok(typed);
        };
        let typed = match typed {
            Value::Object(fields) => fields,
            other => return Ok(other),
        };

        let mut document = passthrough.document.clone();
        for (key, value) in typed {
            if key == "version" {
                continue;
            }
            if passthrough.opaque.iter().any(|field| *field == key) {
                if let Some(existing) = document.get_mut(&key) {
                    merge_into(existing, value);
                }
            } else if document.contains_key(&key) || !is_empty_container(&value) {
                document.insert(key, value);
            }
        }
        Ok(Value::Object(document))
    }

    /// Pretty-printed JSON as written to remote storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Encode` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ProgressError> {
        serde_json::to_string_pretty(&self.to_value()?).map_err(ProgressError::Encode)
    }
}

/// Add entries written since load on top of a field that did not decode.
fn merge_into(existing: &mut Value, added: Value) {
    match (existing, added) {
        (Value::Array(existing), Value::Array(added)) => existing.extend(added),
        (Value::Object(existing), Value::Object(added)) => existing.extend(added),
        _ => {}
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}

/// Set view over history for membership checks.
#[derive(Debug)]
pub struct HistoryIndex<'a> {
    seen: HashSet<&'a str>,
}

impl HistoryIndex<'_> {
    #[must_use]
    pub fn contains(&self, id: &QuestionId) -> bool {
        self.seen.contains(id.as_str())
    }

    /// True when any acceptable identifier of the question was recorded.
    #[must_use]
    pub fn has_seen(&self, question: &Question) -> bool {
        question.identifiers().into_iter().any(|id| self.contains(id))
    }
}

/// Which on-disk format a loaded progress file was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressFormat {
    Current,
    Legacy { entries: usize },
    UnknownVersion { version: Option<u32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProgress {
    pub store: ProgressStore,
    pub format: ProgressFormat,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
