#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::{BTreeMap, HashSet};

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// One assessment category of a grading policy, e.g. `Homework`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[builder(doc)]
pub struct AssignmentType {
    /// Category name, matched against the `format` of graded sections.
    #[serde(rename = "type")]
    pub category:    String,
    /// Abbreviation used in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub short_label: Option<String>,
    /// Share of the final grade, between 0 and 1.
    pub weight:      f64,
    /// Items assumed to exist; missing ones count as zero.
    #[serde(default)]
    #[builder(default)]
    pub min_count:   usize,
    /// Lowest scoring items discarded before averaging.
    #[serde(default)]
    #[builder(default)]
    pub drop_count:  usize,
}

impl AssignmentType {
    /// Short label, falling back to the category name.
    pub fn label(&self) -> &str {
        self.short_label.as_deref().unwrap_or(&self.category)
    }
}

/// A course grading policy in the `GRADER`/`GRADE_CUTOFFS` shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingPolicy {
    /// Assessment categories in report order.
    #[serde(rename = "GRADER", default)]
    pub grader:        Vec<AssignmentType>,
    /// Letter grades and the minimum fraction that earns them.
    #[serde(rename = "GRADE_CUTOFFS", default)]
    pub grade_cutoffs: BTreeMap<String, f64>,
}

impl GradingPolicy {
    /// Creates a policy from categories, without cutoffs.
    pub fn new(grader: Vec<AssignmentType>) -> Self {
        Self {
            grader,
            grade_cutoffs: BTreeMap::new(),
        }
    }

    /// Adds a letter grade cutoff.
    pub fn with_cutoff(mut self, letter: impl Into<String>, threshold: f64) -> Self {
        self.grade_cutoffs.insert(letter.into(), threshold);
        self
    }

    /// Checks weights, cutoffs, and category names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.grader {
            ensure!(
                entry.weight.is_finite() && entry.weight >= 0.0,
                "Weight of `{}` must be a non-negative number, got {}",
                entry.category,
                entry.weight
            );
            ensure!(
                seen.insert(entry.category.as_str()),
                "Assignment type `{}` appears more than once in the grading policy",
                entry.category
            );
        }
        for (letter, threshold) in &self.grade_cutoffs {
            ensure!(
                (0.0..=1.0).contains(threshold),
                "Cutoff for `{letter}` must be between 0 and 1, got {threshold}"
            );
        }
        Ok(())
    }

    /// Looks up a category by name.
    pub fn category(&self, name: &str) -> Option<&AssignmentType> {
        self.grader.iter().find(|a| a.category == name)
    }

    /// The letter with the highest threshold not above `percent`.
    pub fn letter_grade(&self, percent: f64) -> Option<String> {
        self.grade_cutoffs
            .iter()
            .filter(|(_, threshold)| percent >= **threshold)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(letter, _)| letter.clone())
    }

    /// The lowest cutoff, used as the passing mark.
    pub fn passing_threshold(&self) -> Option<f64> {
        self.grade_cutoffs
            .values()
            .copied()
            .min_by(|a, b| a.total_cmp(b))
    }
}
