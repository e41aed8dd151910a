mod plan;
mod workflow;

// Public API of the session subsystem.
pub use plan::{SessionSelection, SessionSelector};
pub use workflow::{Confirmation, PracticeController, SessionSummary};
