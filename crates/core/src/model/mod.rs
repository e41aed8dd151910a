pub mod catalog;
mod ids;
pub mod progress;
mod review;
mod session;

pub use catalog::{BankModule, BankTopic, CatalogError, Question, QuestionBank, Topic, TopicCatalog};
pub use ids::{ID_SEPARATOR, LEGACY_SEPARATOR, QuestionId, SessionItemId, TopicId};

pub use progress::{
    HistoryIndex, LoadedProgress, MAX_DIFFICULTY, MIN_DIFFICULTY, PROGRESS_VERSION, ProgressError,
    ProgressFormat, ProgressStore, TopicMemoryState, TopicState, clamp_difficulty,
};
pub use review::{Rating, RatingError};
pub use session::SessionItem;
