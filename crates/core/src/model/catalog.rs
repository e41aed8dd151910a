use serde_json::Value;
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question bank is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question bank must be a JSON object of modules")]
    NotAnObject,
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// Raw questions listed under one topic of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankTopic {
    pub name: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankModule {
    pub name: String,
    pub topics: Vec<BankTopic>,
}

/// Read-only question bank: `module → topicName → [raw question]`.
///
/// Modules and topics keep their document order. Entries that do not match
/// the expected shape (a module that is not an object, a topic that is not an
/// array, a question that is not a string) are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    modules: Vec<BankModule>,
}

impl QuestionBank {
    /// Parse a bank from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the text is not JSON or the root is not an object.
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Build a bank from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotAnObject` if the root is not an object.
    pub fn from_value(value: &Value) -> Result<Self, CatalogError> {
        let root = value.as_object().ok_or(CatalogError::NotAnObject)?;

        let modules = root
            .iter()
            .filter_map(|(module_name, module)| {
                let topics = module.as_object()?;
                let topics = topics
                    .iter()
                    .filter_map(|(topic_name, questions)| {
                        let questions = questions
                            .as_array()?
                            .iter()
                            .filter_map(|q| q.as_str().map(str::to_owned))
                            .collect();
                        Some(BankTopic {
                            name: topic_name.clone(),
                            questions,
                        })
                    })
                    .collect();
                Some(BankModule {
                    name: module_name.clone(),
                    topics,
                })
            })
            .collect();

        Ok(Self { modules })
    }

    #[must_use]
    pub fn modules(&self) -> &[BankModule] {
        &self.modules
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// A single practice question derived from the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    legacy_id: QuestionId,
    module: String,
    topic: String,
    raw: String,
}

impl Question {
    #[must_use]
    pub fn new(module: &str, topic: &str, raw: &str) -> Self {
        Self {
            id: QuestionId::new(module, topic, raw),
            legacy_id: QuestionId::legacy(module, topic, raw),
            module: module.to_owned(),
            topic: topic.to_owned(),
            raw: raw.to_owned(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn legacy_id(&self) -> &QuestionId {
        &self.legacy_id
    }

    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Every identifier under which this question may appear in history.
    #[must_use]
    pub fn identifiers(&self) -> [&QuestionId; 2] {
        [&self.id, &self.legacy_id]
    }
}

//
// ─── TOPICS ────────────────────────────────────────────────────────────────────
//

/// A schedulable topic with the raw questions listed under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub id: TopicId,
    pub module: String,
    pub name: String,
    pub questions: Vec<String>,
}

impl Topic {
    /// All questions of this topic, in bank order.
    pub fn questions(&self) -> impl Iterator<Item = Question> + '_ {
        self.questions
            .iter()
            .map(|raw| Question::new(&self.module, &self.name, raw))
    }
}

/// Flat list of every topic found in a question bank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicCatalog {
    topics: Vec<Topic>,
}

impl TopicCatalog {
    /// Flatten the bank into one topic per topic array, in bank order.
    #[must_use]
    pub fn from_bank(bank: &QuestionBank) -> Self {
        let topics = bank
            .modules()
            .iter()
            .flat_map(|module| {
                module.topics.iter().map(|topic| Topic {
                    id: TopicId::new(&module.name, &topic.name),
                    module: module.name.clone(),
                    name: topic.name.clone(),
                    questions: topic.questions.clone(),
                })
            })
            .collect();
        Self { topics }
    }

    #[must_use]
    pub fn list_topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn get(&self, id: &TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| &t.id == id)
    }

    /// Topics of one module sorted by name, for picking related topics.
    #[must_use]
    pub fn topics_in_module(&self, module: &str) -> Vec<&Topic> {
        let mut topics: Vec<&Topic> = self.topics.iter().filter(|t| t.module == module).collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }
}
