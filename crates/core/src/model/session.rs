use crate::model::catalog::Question;
use crate::model::ids::{SessionItemId, TopicId};

/// One question offered in a practice session.
///
/// Lives only for the duration of the session. `selected_topics` starts as the
/// main topic and can be edited before the item is rated; it stays ordered and
/// free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionItem {
    session_id: SessionItemId,
    question: Question,
    main_topic_id: TopicId,
    selected_topics: Vec<TopicId>,
    is_done: bool,
}

impl SessionItem {
    #[must_use]
    pub fn new(session_id: SessionItemId, question: Question, main_topic_id: TopicId) -> Self {
        Self {
            session_id,
            question,
            selected_topics: vec![main_topic_id.clone()],
            main_topic_id,
            is_done: false,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionItemId {
        self.session_id
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn main_topic_id(&self) -> &TopicId {
        &self.main_topic_id
    }

    #[must_use]
    pub fn selected_topics(&self) -> &[TopicId] {
        &self.selected_topics
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_done
    }

    pub fn mark_done(&mut self) {
        self.is_done = true;
    }

    /// Add a related topic. Returns false if it was already selected.
    pub fn add_topic(&mut self, topic: TopicId) -> bool {
        if self.selected_topics.contains(&topic) {
            return false;
        }
        self.selected_topics.push(topic);
        true
    }

    /// Remove a topic, the main one included. Returns false if it was not selected.
    pub fn remove_topic(&mut self, topic: &TopicId) -> bool {
        let before = self.selected_topics.len();
        self.selected_topics.retain(|t| t != topic);
        before != self.selected_topics.len()
    }

    /// True when the selection is anything other than exactly the main topic.
    #[must_use]
    pub fn has_custom_topics(&self) -> bool {
        !matches!(self.selected_topics.as_slice(), [only] if *only == self.main_topic_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> SessionItem {
        SessionItem::new(
            SessionItemId::from_random_bytes([1; 16]),
            Question::new("M", "T", "2020 Q1"),
            TopicId::new("M", "T"),
        )
    }

    #[test]
    fn new_item_selects_only_main_topic() {
        let item = item();
        assert_eq!(item.selected_topics(), &[TopicId::new("M", "T")]);
        assert!(!item.is_done());
        assert!(!item.has_custom_topics());
    }

    #[test]
    fn adding_topics_is_ordered_and_deduplicated() {
        let mut item = item();
        assert!(item.add_topic(TopicId::new("M", "U")));
        assert!(!item.add_topic(TopicId::new("M", "U")));
        assert_eq!(
            item.selected_topics(),
            &[TopicId::new("M", "T"), TopicId::new("M", "U")]
        );
        assert!(item.has_custom_topics());
    }

    #[test]
    fn replacing_main_topic_counts_as_custom() {
        let mut item = item();
        item.add_topic(TopicId::new("M", "U"));
        assert!(item.remove_topic(&TopicId::new("M", "T")));
        assert!(!item.remove_topic(&TopicId::new("M", "T")));
        assert_eq!(item.selected_topics(), &[TopicId::new("M", "U")]);
        assert!(item.has_custom_topics());
    }

    #[test]
    fn empty_selection_counts_as_custom() {
        let mut item = item();
        item.remove_topic(&TopicId::new("M", "T"));
        assert!(item.selected_topics().is_empty());
        assert!(item.has_custom_topics());
    }
}
