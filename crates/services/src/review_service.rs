use chrono::{DateTime, Utc};

use practice_core::{
    model::{ProgressStore, QuestionId, Rating, SessionItem, TopicId, TopicMemoryState},
    scheduler::{MemoryEstimate, MemoryModel},
    time::elapsed_days,
};

//
// ─── REPORTS ───────────────────────────────────────────────────────────────────
//

/// Memory change applied to one topic by a rating.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicUpdate {
    pub topic_id: TopicId,
    pub previous: Option<TopicMemoryState>,
    pub current: TopicMemoryState,
    pub interval_days: u32,
}

/// Everything a single rating changed in the progress store.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingReport {
    pub question_id: QuestionId,
    pub rating: Rating,
    pub custom_association: bool,
    pub updates: Vec<TopicUpdate>,
}

//
// ─── RECORDER ──────────────────────────────────────────────────────────────────
//

/// Applies a user's rating of a session item to the progress store.
#[derive(Debug, Clone, Default)]
pub struct ReviewRecorder {
    model: MemoryModel,
}

impl ReviewRecorder {
    /// Recorder using the default memory model parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_model(model: MemoryModel) -> Self {
        Self { model }
    }

    #[must_use]
    pub fn model(&self) -> &MemoryModel {
        &self.model
    }

    /// Rate `item` at `now`.
    ///
    /// - Marks the item done and appends its full question id to history.
    /// - Records the selected topics as a custom association when they differ
    ///   from the main topic alone.
    /// - Updates the memory state of every selected topic.
    pub fn apply_rating(
        &self,
        progress: &mut ProgressStore,
        item: &mut SessionItem,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> RatingReport {
        item.mark_done();
        let question_id = item.question().id().clone();
        progress.record_history(question_id.clone());

        let custom_association = item.has_custom_topics();
        if custom_association {
            progress.record_association(question_id.clone(), item.selected_topics().to_vec());
        }

        let updates = item
            .selected_topics()
            .iter()
            .map(|topic_id| {
                let previous = progress.topic_state(topic_id).cloned();
                let (current, interval_days) = self.next_state(topic_id, previous.as_ref(), rating, now);
                progress.set_topic_state(topic_id.clone(), current.clone());
                TopicUpdate {
                    topic_id: topic_id.clone(),
                    previous,
                    current,
                    interval_days,
                }
            })
            .collect();

        tracing::info!(
            question = %question_id,
            rating = rating.label(),
            custom_association,
            "recorded rating"
        );

        RatingReport {
            question_id,
            rating,
            custom_association,
            updates,
        }
    }

    fn next_state(
        &self,
        topic_id: &TopicId,
        previous: Option<&TopicMemoryState>,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> (TopicMemoryState, u32) {
        let estimate = match previous {
            Some(prev) if prev.has_usable_stability() => {
                let elapsed = clamp_elapsed(topic_id, elapsed_days(prev.last_review, now));
                self.model
                    .review_estimate(prev.stability, prev.difficulty, rating, elapsed)
            }
            Some(prev) => {
                tracing::warn!(
                    topic = %topic_id,
                    stability = prev.stability,
                    "stored stability is unusable; treating as a first review"
                );
                self.model.initial_estimate(rating)
            }
            None => self.model.initial_estimate(rating),
        };

        let MemoryEstimate {
            stability,
            difficulty,
            state,
        } = estimate;
        let interval_days = self.model.next_interval(stability);
        let current = TopicMemoryState::scheduled(state, stability, difficulty, now, interval_days);
        let current = match previous {
            Some(prev) => current.keeping_extra_of(prev),
            None => current,
        };
        (current, interval_days)
    }
}

/// Reviews dated before the last one (clock skew) count as zero elapsed days.
fn clamp_elapsed(topic_id: &TopicId, days: f64) -> f64 {
    if days.is_finite() && days >= 0.0 {
        return days;
    }
    tracing::warn!(topic = %topic_id, elapsed_days = days, "review predates last review");
    0.0
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
