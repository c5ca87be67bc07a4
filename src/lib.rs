//! # ccx
//!
//! Field overrides for custom courses and the grading that has to see them.
//!
//! A course is a tree of blocks. Coaches of a custom course (CCX) may change
//! a handful of fields on any block, such as release dates, deadlines, and
//! visibility, without touching the shared course. Every read goes through a
//! [`overrides::ResolutionPass`], which consults an ordered
//! [`overrides::ProviderChain`], applies inheritance along the ancestors and
//! caches what it found for the life of the pass. Grades are computed through
//! the same pass so overridden values count.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Process configuration read from the environment
pub mod config;
/// The error type shared by the override and grading layers
pub mod error;
/// Known block fields, their kinds, and value encoding
pub mod fields;
/// Grading policies and grade computation
pub mod grading;
/// Override storage, providers, and the resolution pass
pub mod overrides;
/// Student module state, tree resets, and attempt statistics
pub mod student;
/// The course tree
pub mod tree;
/// Identifier newtypes used throughout
pub mod types;

pub use config::{InheritanceMode, ProviderKind, Settings};
pub use error::{OverrideError, Result};
pub use fields::{Field, FieldKind, FieldValue};
pub use grading::{GradeSummary, GradingPolicy, compute_grade};
pub use overrides::{
    ActiveContext, ProviderChain, ResolutionPass, clear_override, resolve_field, set_override,
};
pub use tree::{CourseTree, TreeStore};
pub use types::{CcxId, Location, NodeId, StudentId};
