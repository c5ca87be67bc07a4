#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use serde_json::Value;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};

use super::state::{StudentModule, StudentStateStore};
use crate::{
    error::Result,
    overrides::ResolutionPass,
    tree::Category,
    types::{Location, NodeId, StudentId},
};

/// How one student fared on one assigned problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Some recorded state has every answer marked correct.
    Passed,
    /// Submitted at least once, never fully correct.
    Incorrect,
    /// Seen but never submitted.
    NoAttempt,
}

/// Whether every entry of the state's `correct_map` is correct. An empty or
/// missing map does not pass.
pub fn passed(state: &Value) -> bool {
    match state.get("correct_map").and_then(Value::as_object) {
        Some(map) if !map.is_empty() => map
            .values()
            .all(|entry| entry.get("correctness").and_then(Value::as_str) == Some("correct")),
        _ => false,
    }
}

/// Classifies a student's recorded states for one problem; `None` when the
/// problem was never shown to them.
pub fn classify(module: &StudentModule) -> Option<Outcome> {
    let seen = module
        .states()
        .any(|s| s.get("input_state").is_some_and(|v| !v.is_null()));
    if !seen {
        return None;
    }

    if module.states().any(passed) {
        Some(Outcome::Passed)
    } else if module
        .states()
        .any(|s| s.get("attempts").and_then(Value::as_u64).unwrap_or(0) > 0)
    {
        Some(Outcome::Incorrect)
    } else {
        Some(Outcome::NoAttempt)
    }
}

/// Counts for one problem drawn by a randomizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemStats {
    /// Problem location.
    pub problem:        Location,
    /// Display name of the problem set holding the randomizer.
    pub assignment_set: String,
    /// Problem display name.
    pub problem_name:   String,
    /// Resolved due date.
    pub due:            Option<DateTime<Utc>>,
    /// Students who were shown the problem.
    pub assigned:       usize,
    /// Students who saw it but never submitted.
    pub no_attempt:     usize,
    /// Students who submitted without passing.
    pub incorrect:      usize,
    /// Students who passed.
    pub passed:         usize,
}

/// One student's results across an assignment set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentSetStats {
    /// Display name of the problem set.
    pub assignment_set:  String,
    /// The student.
    pub student:         StudentId,
    /// Problems the student was shown.
    pub assigned:        BTreeSet<Location>,
    /// Problems submitted without passing.
    pub incorrect_list:  BTreeSet<Location>,
    /// Problems seen but never submitted.
    pub no_attempt_list: BTreeSet<Location>,
    /// Problems passed.
    pub passed_list:     BTreeSet<Location>,
}

/// Attempt statistics over every released randomizer under a block.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttemptStats {
    /// One row per candidate problem, in course order.
    pub problems:        Vec<ProblemStats>,
    /// One row per (assignment set, student).
    pub assignment_sets: Vec<AssignmentSetStats>,
}

/// Walks the subtree under `root` and, for every `randomize` block released
/// at `now`, classifies each non-staff student on each candidate problem.
pub fn attempt_stats(
    pass: &ResolutionPass<'_>,
    root: &Location,
    states: &StudentStateStore,
    now: DateTime<Utc>,
) -> Result<AttemptStats> {
    let tree = pass.tree();
    let mut stats = AttemptStats::default();
    let mut sets: BTreeMap<(String, StudentId), AssignmentSetStats> = BTreeMap::new();

    for (id, _) in tree.descendants(tree.lookup(root)?)? {
        if tree.get_node(id)?.category() != Category::Randomize {
            continue;
        }
        if pass.start(id)?.is_some_and(|start| start > now) {
            tracing::debug!("Skipping unreleased randomizer #{}", id.0);
            continue;
        }
        let set_name = assignment_set_name(pass, id)?;

        for &problem in tree.children(id)? {
            let location = tree.get_node(problem)?.location().clone();
            let mut row = ProblemStats {
                problem: location.clone(),
                assignment_set: set_name.clone(),
                problem_name: pass.display_name(problem)?,
                due: pass.due(problem)?,
                assigned: 0,
                no_attempt: 0,
                incorrect: 0,
                passed: 0,
            };

            for module in states
                .at_location(&location)
                .filter(|m| !states.is_staff(&m.student))
            {
                let Some(outcome) = classify(module) else {
                    continue;
                };
                let set = sets
                    .entry((set_name.clone(), module.student.clone()))
                    .or_insert_with(|| AssignmentSetStats {
                        assignment_set: set_name.clone(),
                        student: module.student.clone(),
                        ..AssignmentSetStats::default()
                    });

                row.assigned += 1;
                set.assigned.insert(location.clone());
                match outcome {
                    Outcome::Passed => {
                        row.passed += 1;
                        set.passed_list.insert(location.clone());
                    }
                    Outcome::Incorrect => {
                        row.incorrect += 1;
                        set.incorrect_list.insert(location.clone());
                    }
                    Outcome::NoAttempt => {
                        row.no_attempt += 1;
                        set.no_attempt_list.insert(location.clone());
                    }
                }
            }

            tracing::debug!(
                "{location}: assigned={}, not attempted={}, incorrect={}, passed={}",
                row.assigned,
                row.no_attempt,
                row.incorrect,
                row.passed
            );
            stats.problems.push(row);
        }
    }

    stats.assignment_sets = sets.into_values().collect();
    Ok(stats)
}

/// The problem set a randomizer sits in names the assignment set.
fn assignment_set_name(pass: &ResolutionPass<'_>, randomizer: NodeId) -> Result<String> {
    match pass.tree().parent(randomizer)? {
        Some(parent) => pass.display_name(parent),
        None => pass.display_name(randomizer),
    }
}

/// Table row for [`ProblemStats`].
#[derive(Tabled)]
struct ProblemRow {
    /// Assignment set.
    #[tabled(rename = "Set")]
    set:        String,
    /// Problem name.
    #[tabled(rename = "Problem")]
    problem:    String,
    /// Due date.
    #[tabled(rename = "Due")]
    due:        String,
    /// Assigned count.
    #[tabled(rename = "Assigned")]
    assigned:   usize,
    /// No attempt count.
    #[tabled(rename = "No attempt")]
    no_attempt: usize,
    /// Incorrect count.
    #[tabled(rename = "Incorrect")]
    incorrect:  usize,
    /// Passed count.
    #[tabled(rename = "Passed")]
    passed:     usize,
}

/// Table row for [`AssignmentSetStats`].
#[derive(Tabled)]
struct StudentRow {
    /// Assignment set.
    #[tabled(rename = "Set")]
    set:        String,
    /// Student.
    #[tabled(rename = "Student")]
    student:    String,
    /// Assigned count.
    #[tabled(rename = "Assigned")]
    assigned:   usize,
    /// Incorrect count.
    #[tabled(rename = "Incorrect")]
    incorrect:  usize,
    /// No attempt count.
    #[tabled(rename = "No attempt")]
    no_attempt: usize,
    /// Passed problems.
    #[tabled(rename = "Passed")]
    passed:     String,
}

impl AttemptStats {
    /// Renders the per-problem table.
    pub fn problems_table(&self) -> String {
        let rows = self
            .problems
            .iter()
            .map(|p| ProblemRow {
                set: p.assignment_set.clone(),
                problem: p.problem_name.clone(),
                due: p.due.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into()),
                assigned: p.assigned,
                no_attempt: p.no_attempt,
                incorrect: p.incorrect,
                passed: p.passed,
            })
            .collect_vec();

        Table::new(rows)
            .with(Panel::header("Problem Attempt Statistics"))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }

    /// Renders the per-student table.
    pub fn students_table(&self) -> String {
        let rows = self
            .assignment_sets
            .iter()
            .map(|s| StudentRow {
                set: s.assignment_set.clone(),
                student: s.student.to_string(),
                assigned: s.assigned.len(),
                incorrect: s.incorrect_list.len(),
                no_attempt: s.no_attempt_list.len(),
                passed: s.passed_list.iter().join(", "),
            })
            .collect_vec();

        Table::new(rows)
            .with(Panel::header("Assignment Set Statistics"))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}
