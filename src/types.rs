use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Index of a node inside a course tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Stable identity of a course tree node, e.g.
/// `block-v1:MITx+3.091+2015+type@chapter+block@week1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(pub String);

impl Location {
    /// Returns the location as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the location, e.g. `Assessment_1` for
    /// `i4x://MITx/3.091r-exam/proctor/Assessment_1`.
    pub fn name(&self) -> &str {
        self.0.rsplit(['/', '@']).next().unwrap_or(&self.0)
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        Location(s.to_string())
    }
}

impl From<String> for Location {
    fn from(s: String) -> Self {
        Location(s)
    }
}

/// Identity of one custom course.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CcxId(pub String);

impl Display for CcxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CcxId {
    fn from(s: &str) -> Self {
        CcxId(s.to_string())
    }
}

/// Identity of a student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(s: &str) -> Self {
        StudentId(s.to_string())
    }
}

impl From<String> for StudentId {
    fn from(s: String) -> Self {
        StudentId(s)
    }
}

impl From<String> for CcxId {
    fn from(s: String) -> Self {
        CcxId(s)
    }
}
