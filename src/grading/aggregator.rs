#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::{
    policy::{AssignmentType, GradingPolicy},
    results::{CategoryGrade, GradeSummary, GradedItem, Score},
};
use crate::{
    error::Result,
    overrides::ResolutionPass,
    types::{Location, StudentId},
};

/// Where recorded scores come from.
pub trait ScoreSource {
    /// The recorded score of `student` on the item at `location`.
    fn score(&self, student: &StudentId, location: &Location) -> Option<Score>;
}

impl ScoreSource for HashMap<(StudentId, Location), Score> {
    fn score(&self, student: &StudentId, location: &Location) -> Option<Score> {
        self.get(&(student.clone(), location.clone())).copied()
    }
}

/// The student being graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentInfo {
    /// Student identity.
    pub id:       StudentId,
    /// Course staff see staff-only content and have it graded.
    pub is_staff: bool,
}

impl StudentInfo {
    /// A learner without staff access.
    pub fn learner(id: impl Into<StudentId>) -> Self {
        Self {
            id:       id.into(),
            is_staff: false,
        }
    }

    /// A member of course staff.
    pub fn staff(id: impl Into<StudentId>) -> Self {
        Self {
            id:       id.into(),
            is_staff: true,
        }
    }
}

/// Computes a student's grade, reading every field through `pass` so that
/// overridden release dates, visibility, and weights apply.
///
/// A scoreable item is a leaf with a positive `max_score` inside a section
/// whose `format` names a policy category. Items hidden from the student or
/// not yet released at `now` are left out. A node the tree cannot resolve
/// aborts the whole computation.
pub fn compute_grade(
    pass: &ResolutionPass<'_>,
    student: &StudentInfo,
    policy: &GradingPolicy,
    scores: &dyn ScoreSource,
    now: DateTime<Utc>,
) -> Result<GradeSummary> {
    let tree = pass.tree();
    let mut found: HashMap<&str, Vec<GradedItem>> = HashMap::new();

    let mut stack = vec![(tree.root(), None::<String>)];
    while let Some((id, section_format)) = stack.pop() {
        let format = pass.format(id)?.or(section_format);
        let children = tree.children(id)?;

        if !children.is_empty() {
            for child in children.iter().rev() {
                stack.push((*child, format.clone()));
            }
            continue;
        }

        let Some(max_score) = pass.max_score(id)?.filter(|m| *m > 0.0) else {
            continue;
        };
        let Some(assignment) = format.as_deref().and_then(|f| policy.category(f)) else {
            continue;
        };

        let location = tree.get_node(id)?.location().clone();
        if !student.is_staff && pass.visible_to_staff_only(id)? {
            tracing::debug!("Skipping {location}: visible to staff only");
            continue;
        }
        if let Some(start) = pass.start(id)?
            && start > now
        {
            tracing::debug!("Skipping {location}: not released until {start}");
            continue;
        }

        let recorded = scores.score(&student.id, &location);
        let mut score = match recorded {
            Some(s) if s.possible > 0.0 => s,
            Some(s) => Score::new(s.earned, max_score),
            None => Score::new(0.0, max_score),
        };
        if let Some(weight) = pass.weight(id)? {
            score = Score::new(score.percent() * weight, weight);
        }

        found
            .entry(assignment.category.as_str())
            .or_default()
            .push(GradedItem {
                display_name: pass.display_name(id)?,
                due: pass.due(id)?,
                attempted: recorded.is_some(),
                location,
                score,
            });
    }

    let per_category: Vec<CategoryGrade> = policy
        .grader
        .iter()
        .map(|a| grade_category(a, found.remove(a.category.as_str()).unwrap_or_default()))
        .collect();
    let total_percent = per_category.iter().map(CategoryGrade::contribution).sum();

    Ok(GradeSummary {
        student: student.id.clone(),
        letter_grade: policy.letter_grade(total_percent),
        per_category,
        total_percent,
    })
}

/// Applies padding and drops to one category.
///
/// Missing items up to `min_count` count as zero; the `drop_count` lowest
/// percentages are discarded, placeholders first on ties. An empty category
/// still contributes its weight at zero percent.
fn grade_category(assignment: &AssignmentType, items: Vec<GradedItem>) -> CategoryGrade {
    let padded = assignment.min_count.saturating_sub(items.len());

    // (item index or None for a placeholder, percent)
    let mut entries: Vec<(Option<usize>, f64)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (Some(i), item.score.percent()))
        .chain(std::iter::repeat_n((None, 0.0), padded))
        .collect();
    entries.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.is_some().cmp(&b.0.is_some())));

    let drop = assignment.drop_count.min(entries.len());
    let (dropped, kept) = entries.split_at(drop);

    let percent = if kept.is_empty() {
        0.0
    } else {
        kept.iter().map(|(_, p)| p).sum::<f64>() / kept.len() as f64
    };

    let dropped_idx: HashSet<usize> = dropped.iter().filter_map(|(i, _)| *i).collect();
    let (earned, possible) = items
        .iter()
        .enumerate()
        .filter(|(i, _)| !dropped_idx.contains(i))
        .fold((0.0, 0.0), |(earned, possible), (_, item)| {
            (earned + item.score.earned, possible + item.score.possible)
        });

    CategoryGrade {
        category: assignment.category.clone(),
        label: assignment.label().to_string(),
        weight: assignment.weight,
        earned,
        possible,
        percent,
        dropped: dropped
            .iter()
            .filter_map(|(i, _)| i.map(|i| items[i].location.clone()))
            .collect(),
        items,
        padded,
    }
}
