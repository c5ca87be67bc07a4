#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::types::{Location, StudentId};

/// Points earned out of points possible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Score {
    /// Points earned.
    pub earned:   f64,
    /// Points possible.
    pub possible: f64,
}

impl Score {
    /// Creates a score.
    pub fn new(earned: f64, possible: f64) -> Self {
        Self { earned, possible }
    }

    /// Fraction earned, zero when nothing is possible.
    pub fn percent(&self) -> f64 {
        if self.possible > 0.0 {
            self.earned / self.possible
        } else {
            0.0
        }
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2}", self.earned, self.possible)
    }
}

/// One scored item as it counted toward a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedItem {
    /// Location of the scored node.
    pub location:     Location,
    /// Resolved display name.
    pub display_name: String,
    /// Score after weighting.
    pub score:        Score,
    /// Resolved due date.
    pub due:          Option<DateTime<Utc>>,
    /// Whether the student has any recorded score.
    pub attempted:    bool,
}

/// Result for one assessment category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGrade {
    /// Category name.
    pub category: String,
    /// Report label.
    pub label:    String,
    /// Share of the final grade.
    pub weight:   f64,
    /// Points over the items that were kept.
    pub earned:   f64,
    /// Points possible over the items that were kept.
    pub possible: f64,
    /// Category percentage after padding and drops.
    pub percent:  f64,
    /// Every item found, in course order.
    pub items:    Vec<GradedItem>,
    /// Items discarded by the drop rule.
    pub dropped:  Vec<Location>,
    /// Zero-score placeholders added to reach the minimum count.
    pub padded:   usize,
}

impl CategoryGrade {
    /// Weighted contribution to the total.
    pub fn contribution(&self) -> f64 {
        self.weight * self.percent
    }
}

/// A student's grade for one course or custom course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSummary {
    /// Graded student.
    pub student:       StudentId,
    /// Per-category results in policy order.
    pub per_category:  Vec<CategoryGrade>,
    /// Weighted total between 0 and 1.
    pub total_percent: f64,
    /// Letter grade from the cutoffs, if any is met.
    pub letter_grade:  Option<String>,
}

impl GradeSummary {
    /// Looks up a category result.
    pub fn category(&self, name: &str) -> Option<&CategoryGrade> {
        self.per_category.iter().find(|c| c.category == name)
    }

    /// Renders the summary as a table.
    pub fn to_table(&self) -> String {
        let rows: Vec<CategoryRow> = self.per_category.iter().map(CategoryRow::from).collect();
        let letter = self.letter_grade.as_deref().unwrap_or("-");

        Table::new(&rows)
            .with(Panel::header(format!("Grade Summary for {}", self.student)))
            .with(Panel::footer(format!(
                "Total: {:.2}% ({letter})",
                self.total_percent * 100.0
            )))
            .with(Modify::new(Rows::new(1..)).with(Width::wrap(24).keep_words(true)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(
                Modify::new(Rows::last())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}

/// Table row for one category.
#[derive(Tabled)]
struct CategoryRow {
    /// Category label.
    #[tabled(rename = "Category")]
    label:   String,
    /// Kept points.
    #[tabled(rename = "Score")]
    score:   String,
    /// Category percentage.
    #[tabled(rename = "Percent")]
    percent: String,
    /// Policy weight.
    #[tabled(rename = "Weight")]
    weight:  String,
    /// Number of dropped items.
    #[tabled(rename = "Dropped")]
    dropped: usize,
}

impl From<&CategoryGrade> for CategoryRow {
    fn from(c: &CategoryGrade) -> Self {
        Self {
            label: c.label.clone(),
            score: Score::new(c.earned, c.possible).to_string(),
            percent: format!("{:.2}%", c.percent * 100.0),
            weight: format!("{:.2}", c.weight),
            dropped: c.dropped.len(),
        }
    }
}
