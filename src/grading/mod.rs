#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Walks a course and turns recorded scores into a grade.
pub mod aggregator;
/// Grading policies: categories, weights, drops, and cutoffs.
pub mod policy;
/// Grade summaries and their table rendering.
pub mod results;

pub use aggregator::{ScoreSource, StudentInfo, compute_grade};
pub use policy::{AssignmentType, GradingPolicy};
pub use results::{CategoryGrade, GradeSummary, GradedItem, Score};
