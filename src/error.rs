#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use crate::fields::Field;

/// Errors raised while resolving, storing, or grading against field
/// overrides.
#[derive(thiserror::Error, Debug)]
pub enum OverrideError {
    /// The field name is not one the course tree knows about.
    #[error("Unknown field name: `{0}`")]
    FieldNotFound(String),
    /// The field exists but cannot carry a per-context override.
    #[error("Field `{0}` cannot be overridden")]
    UnsupportedField(Field),
    /// The value could not be encoded to, or decoded from, the field's
    /// declared kind.
    #[error("Could not serialize value for field `{field}`: {reason}")]
    Serialization {
        /// The field being encoded or decoded.
        field:  Field,
        /// What went wrong.
        reason: String,
    },
    /// The tree store could not resolve a node.
    #[error("Course tree has no node `{0}`")]
    MissingNode(String),
    /// A write was attempted but no provider owns writes for the active
    /// context.
    #[error("No active override context is able to accept this write")]
    NoActiveContext,
    /// The persistence backend failed.
    #[error("Override storage failed: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for OverrideError {
    fn from(e: rusqlite::Error) -> Self {
        OverrideError::Storage(e.to_string())
    }
}

/// Result alias used throughout the override and grading layers.
pub type Result<T> = std::result::Result<T, OverrideError>;
