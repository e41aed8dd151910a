use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;

use practice_core::model::{ProgressStore, SessionItem, SessionItemId, Topic, TopicCatalog};

/// Result of selecting a practice session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSelection {
    /// Items in presentation order. May be shorter than requested.
    Ready(Vec<SessionItem>),
    /// No question bank, or a bank without topics.
    NoData,
    /// Topics were picked but every one of their questions is already in history.
    NothingLeft,
}

impl SessionSelection {
    #[must_use]
    pub fn items(&self) -> &[SessionItem] {
        match self {
            SessionSelection::Ready(items) => items,
            SessionSelection::NoData | SessionSelection::NothingLeft => &[],
        }
    }
}

/// Picks due topics and one unseen question for each.
pub struct SessionSelector<'a> {
    catalog: &'a TopicCatalog,
    progress: &'a ProgressStore,
}

impl<'a> SessionSelector<'a> {
    #[must_use]
    pub fn new(catalog: &'a TopicCatalog, progress: &'a ProgressStore) -> Self {
        Self { catalog, progress }
    }

    /// Select up to `requested` items.
    ///
    /// - Due topics (never reviewed, or `due <= now`) are shuffled and taken first.
    /// - Remaining slots are filled from shuffled not-due topics.
    /// - Each picked topic contributes one random question whose full and legacy
    ///   ids are both absent from history; topics with none left are skipped.
    pub fn select<R: Rng + ?Sized>(
        &self,
        requested: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> SessionSelection {
        if self.catalog.is_empty() {
            return SessionSelection::NoData;
        }
        if requested == 0 {
            return SessionSelection::Ready(Vec::new());
        }

        let topics = self.pick_topics(requested, now, rng);
        let history = self.progress.history_index();

        let mut items = Vec::with_capacity(topics.len());
        for topic in &topics {
            let mut candidates: Vec<_> = topic
                .questions()
                .filter(|q| !history.has_seen(q))
                .collect();
            if candidates.is_empty() {
                tracing::debug!(topic = %topic.id, "no unseen questions left for topic");
                continue;
            }

            let question = candidates.swap_remove(rng.random_range(0..candidates.len()));
            let session_id = SessionItemId::from_random_bytes(rng.random());
            items.push(SessionItem::new(session_id, question, topic.id.clone()));
        }

        tracing::debug!(
            requested,
            topics = topics.len(),
            items = items.len(),
            "selected practice session"
        );

        if items.is_empty() {
            SessionSelection::NothingLeft
        } else {
            SessionSelection::Ready(items)
        }
    }

    fn pick_topics<R: Rng + ?Sized>(
        &self,
        requested: usize,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Vec<&'a Topic> {
        let (mut due, mut not_due): (Vec<&Topic>, Vec<&Topic>) = self
            .catalog
            .list_topics()
            .iter()
            .partition(|t| self.progress.is_topic_due(&t.id, now));

        due.shuffle(rng);
        if due.len() >= requested {
            due.truncate(requested);
            return due;
        }

        let missing = requested - due.len();
        not_due.shuffle(rng);
        due.extend(not_due.into_iter().take(missing));
        due
    }
}
