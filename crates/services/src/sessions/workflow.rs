use rand::SeedableRng;
use rand::rngs::StdRng;

use practice_core::Clock;
use practice_core::model::{
    ProgressStore, QuestionBank, Rating, SessionItem, SessionItemId, TopicCatalog, TopicId,
};

use super::plan::{SessionSelection, SessionSelector};
use crate::error::PracticeError;
use crate::review_service::{RatingReport, ReviewRecorder};
use crate::sync_service::{LoadOutcome, ProgressSync, SaveReport};

/// Explicit consent for destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Counts reported when a session is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub total: usize,
    pub rated: usize,
}

/// Owns the practice state and exposes one handler per user command.
///
/// Every handler takes `&mut self`, so commands are applied one at a time and
/// only through this type.
pub struct PracticeController {
    clock: Clock,
    rng: StdRng,
    catalog: Option<TopicCatalog>,
    progress: ProgressStore,
    session: Vec<SessionItem>,
    recorder: ReviewRecorder,
    sync: Option<ProgressSync>,
}

impl PracticeController {
    /// Controller with an OS-seeded random source and no remote storage.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::from_rng(clock, StdRng::from_os_rng())
    }

    /// Controller with a deterministic random source.
    #[must_use]
    pub fn with_seed(clock: Clock, seed: u64) -> Self {
        Self::from_rng(clock, StdRng::seed_from_u64(seed))
    }

    fn from_rng(clock: Clock, rng: StdRng) -> Self {
        Self {
            clock,
            rng,
            catalog: None,
            progress: ProgressStore::new(),
            session: Vec::new(),
            recorder: ReviewRecorder::new(),
            sync: None,
        }
    }

    #[must_use]
    pub fn with_sync(mut self, sync: ProgressSync) -> Self {
        self.sync = Some(sync);
        self
    }

    #[must_use]
    pub fn with_recorder(mut self, recorder: ReviewRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&TopicCatalog> {
        self.catalog.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    /// Items of the active session in presentation order.
    #[must_use]
    pub fn session(&self) -> &[SessionItem] {
        &self.session
    }

    #[must_use]
    pub fn has_sync(&self) -> bool {
        self.sync.is_some()
    }

    /// Replace the topic catalog. Returns the number of topics.
    pub fn load_bank(&mut self, bank: &QuestionBank) -> usize {
        let catalog = TopicCatalog::from_bank(bank);
        let topics = catalog.len();
        tracing::info!(topics, modules = bank.modules().len(), "loaded question bank");
        self.catalog = Some(catalog);
        topics
    }

    /// Parse a question bank document and load it.
    ///
    /// # Errors
    ///
    /// Returns `PracticeError::Catalog` if the document is not a JSON object.
    pub fn load_bank_json(&mut self, raw: &str) -> Result<usize, PracticeError> {
        let bank = QuestionBank::from_json_str(raw)?;
        Ok(self.load_bank(&bank))
    }

    /// Select a new session of up to `count` items, replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns `NoData` without a usable bank and `NothingLeft` when every
    /// picked topic is exhausted. The previous session is cleared either way.
    pub fn start_session(&mut self, count: usize) -> Result<&[SessionItem], PracticeError> {
        self.session.clear();
        let catalog = self.catalog.as_ref().ok_or(PracticeError::NoData)?;
        let now = self.clock.now();

        match SessionSelector::new(catalog, &self.progress).select(count, now, &mut self.rng) {
            SessionSelection::Ready(items) => {
                self.session = items;
                Ok(&self.session)
            }
            SessionSelection::NoData => Err(PracticeError::NoData),
            SessionSelection::NothingLeft => Err(PracticeError::NothingLeft),
        }
    }

    /// Include a related topic of the same module in the review of one item.
    ///
    /// Returns `false` if the topic was already selected.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSessionItem` or `AlreadyRated`, `UnknownTopic` when the
    /// topic is not in the loaded catalog, and `TopicOutsideModule` when it
    /// belongs to another module than the item's question.
    pub fn add_topic(
        &mut self,
        session_id: SessionItemId,
        topic_id: TopicId,
    ) -> Result<bool, PracticeError> {
        let known = self
            .catalog
            .as_ref()
            .is_some_and(|catalog| catalog.get(&topic_id).is_some());
        if !known {
            return Err(PracticeError::UnknownTopic(topic_id));
        }
        let item = self.pending_item(session_id)?;
        let module = item.question().module();
        if topic_id.module() != module {
            return Err(PracticeError::TopicOutsideModule {
                module: module.to_owned(),
                topic: topic_id,
            });
        }
        Ok(item.add_topic(topic_id))
    }

    /// Drop a topic from the review of one item. The main topic may be removed.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSessionItem` or `AlreadyRated`.
    pub fn remove_topic(
        &mut self,
        session_id: SessionItemId,
        topic_id: &TopicId,
    ) -> Result<bool, PracticeError> {
        let item = self.pending_item(session_id)?;
        Ok(item.remove_topic(topic_id))
    }

    /// Rate one item and update the memory state of its selected topics.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSessionItem` or `AlreadyRated`.
    pub fn rate(
        &mut self,
        session_id: SessionItemId,
        rating: Rating,
    ) -> Result<RatingReport, PracticeError> {
        let now = self.clock.now();
        let position = self.pending_position(session_id)?;
        let item = &mut self.session[position];
        Ok(self
            .recorder
            .apply_rating(&mut self.progress, item, rating, now))
    }

    /// True once every item of a non-empty session has been rated.
    #[must_use]
    pub fn all_done(&self) -> bool {
        !self.session.is_empty() && self.session.iter().all(SessionItem::is_done)
    }

    /// Close the active session.
    pub fn finish_session(&mut self) -> SessionSummary {
        let summary = SessionSummary {
            total: self.session.len(),
            rated: self.session.iter().filter(|item| item.is_done()).count(),
        };
        self.session.clear();
        tracing::info!(total = summary.total, rated = summary.rated, "session finished");
        summary
    }

    /// Replace the progress store with the remote copy.
    ///
    /// # Errors
    ///
    /// Returns `SyncNotConfigured` without remote storage, or the sync error.
    pub async fn load_progress(&mut self) -> Result<LoadOutcome, PracticeError> {
        let sync = self.sync.as_mut().ok_or(PracticeError::SyncNotConfigured)?;
        let report = sync.load().await?;
        self.progress = report.store;
        Ok(report.outcome)
    }

    /// Write the whole progress store to remote storage.
    ///
    /// # Errors
    ///
    /// Returns `SyncNotConfigured` without remote storage, or the sync error.
    /// The local store is left untouched on failure.
    pub async fn save_progress(&mut self) -> Result<SaveReport, PracticeError> {
        let sync = self.sync.as_mut().ok_or(PracticeError::SyncNotConfigured)?;
        Ok(sync.save(&self.progress).await?)
    }

    /// Discard all progress and the active session.
    ///
    /// The remote copy is unaffected until the next save.
    ///
    /// # Errors
    ///
    /// Returns `ResetNotConfirmed` unless `confirmation` is `Confirmed`.
    pub fn reset_progress(&mut self, confirmation: Confirmation) -> Result<(), PracticeError> {
        if confirmation != Confirmation::Confirmed {
            return Err(PracticeError::ResetNotConfirmed);
        }
        tracing::warn!(
            history = self.progress.history.len(),
            topics = self.progress.topics.len(),
            "progress reset"
        );
        self.progress = ProgressStore::new();
        self.session.clear();
        Ok(())
    }

    fn pending_position(&self, session_id: SessionItemId) -> Result<usize, PracticeError> {
        let position = self
            .session
            .iter()
            .position(|item| item.session_id() == session_id)
            .ok_or(PracticeError::UnknownSessionItem(session_id))?;
        if self.session[position].is_done() {
            return Err(PracticeError::AlreadyRated(session_id));
        }
        Ok(position)
    }

    fn pending_item(&mut self, session_id: SessionItemId) -> Result<&mut SessionItem, PracticeError> {
        let position = self.pending_position(session_id)?;
        Ok(&mut self.session[position])
    }
}
