#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Resetting a student's state under a block.
pub mod reset;
/// Per-problem and per-student attempt statistics for randomized
/// assessments.
pub mod stats;
/// Stored student module state.
pub mod state;
/// Per-student standing on released proctored assessments.
pub mod status;

pub use reset::{ModuleTreeReset, ResetEntry};
pub use state::{StudentModule, StudentStateStore};
pub use stats::{AssignmentSetStats, AttemptStats, Outcome, ProblemStats, attempt_stats};
pub use status::{AssignmentStatus, StudentStatus, student_status};
