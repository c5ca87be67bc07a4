#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::{CourseTree, Outline};
use crate::grading::GradingPolicy;

/// A course as stored on disk: its grading policy and the block outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFile {
    /// Grading policy, in the `GRADER`/`GRADE_CUTOFFS` shape.
    #[serde(default)]
    pub grading_policy: GradingPolicy,
    /// Root of the block outline.
    pub outline:        Outline,
}

impl CourseFile {
    /// Reads and parses a course file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read course file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Could not parse course file {}", path.display()))
    }

    /// Builds the course tree and validates the grading policy.
    pub fn into_parts(self) -> Result<(CourseTree, GradingPolicy)> {
        self.grading_policy.validate()?;
        let tree = CourseTree::from_outline(self.outline)?;
        Ok((tree, self.grading_policy))
    }
}
