#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use serde_json::{Value, json};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, object::Rows},
};

use super::{reset::ModuleTreeReset, state::StudentStateStore};
use crate::{
    error::Result,
    grading::{GradingPolicy, Score, StudentInfo, compute_grade},
    overrides::ResolutionPass,
    tree::{Category, TreeStore},
    types::{Location, NodeId, StudentId},
};

/// A released proctored assessment and where one student stands on it.
///
/// Assessments are laid out as `proctor > problemset > randomize > problems`;
/// the randomizer's stored `choice` says which problem the student drew.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentStatus {
    /// Short name of the proctor block, e.g. `Assessment_1`.
    pub name:             String,
    /// Proctor block location; resetting it gives the student a new draw.
    pub proctor:          Location,
    /// Display name of the problem set.
    pub assignment:       String,
    /// The student's stored problem set state.
    pub problemset_state: Value,
    /// Index of the drawn problem among the randomizer's children.
    pub choice:           Option<usize>,
    /// Display name of the drawn problem.
    pub problem:          Option<String>,
    /// Opened the problem set or earned points on it.
    pub attempted:        bool,
    /// Points on the assessment, restricted to the drawn problem once a
    /// draw is recorded.
    pub score:            Option<Score>,
}

impl AssignmentStatus {
    /// Attempted without earning every point.
    pub fn failed(&self) -> bool {
        self.attempted
            && self
                .score
                .is_some_and(|s| (s.earned - s.possible).abs() > f64::EPSILON)
    }
}

impl Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let choice = self.choice.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        let score = self.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
        write!(
            f,
            "[{}] {} -> {} ({choice}) {} [{score}]",
            self.name,
            self.assignment,
            self.problemset_state,
            self.problem.as_deref().unwrap_or("-")
        )
    }
}

/// One student's standing on every released proctored assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStatus {
    /// The student.
    pub student:     StudentId,
    /// Assessments in course order.
    pub assignments: Vec<AssignmentStatus>,
}

/// Collects `student`'s status on every proctored assessment released at
/// `now`, scoring it with the grade computed through `pass`.
pub fn student_status(
    pass: &ResolutionPass<'_>,
    policy: &GradingPolicy,
    states: &StudentStateStore,
    student: &StudentId,
    now: DateTime<Utc>,
) -> Result<StudentStatus> {
    let tree = pass.tree();
    let info = StudentInfo {
        id:       student.clone(),
        is_staff: states.is_staff(student),
    };
    let grade = compute_grade(pass, &info, policy, states, now)?;
    let graded = grade
        .per_category
        .iter()
        .flat_map(|c| c.items.iter())
        .collect_vec();

    let mut assignments = Vec::new();
    for (id, _) in tree.descendants(tree.root())? {
        if tree.get_node(id)?.category() != Category::Proctor {
            continue;
        }
        if pass.start(id)?.is_some_and(|start| start >= now) {
            continue;
        }
        let Some((problemset, randomizer)) = assessment_parts(tree, id)? else {
            tracing::warn!(
                "Proctor block {} has no problem set with a randomizer",
                tree.get_node(id)?.location()
            );
            continue;
        };

        let proctor = tree.get_node(id)?.location().clone();
        let problemset_state = states
            .get(student, tree.get_node(problemset)?.location())
            .map(|m| m.state.clone())
            .unwrap_or_else(|| json!({}));
        let choice = states
            .get(student, tree.get_node(randomizer)?.location())
            .and_then(|m| m.state.get("choice"))
            .and_then(Value::as_u64)
            .and_then(|c| usize::try_from(c).ok());
        let drawn = match choice {
            Some(c) => tree.children(randomizer)?.get(c).copied(),
            None => None,
        };
        if let (Some(c), None) = (choice, drawn) {
            tracing::warn!("{student} drew problem {c} of {proctor}, which does not exist");
        }

        let scope = match drawn {
            Some(problem) => vec![tree.get_node(problem)?.location().clone()],
            None => tree
                .descendants(id)?
                .into_iter()
                .map(|(n, _)| tree.get_node(n).map(|n| n.location().clone()))
                .collect::<Result<Vec<_>>>()?,
        };
        let score = graded
            .iter()
            .filter(|item| scope.contains(&item.location))
            .map(|item| item.score)
            .reduce(|a, b| Score::new(a.earned + b.earned, a.possible + b.possible));

        let attempted = problemset_state.get("position").is_some()
            || score.is_some_and(|s| s.earned > 0.0);

        assignments.push(AssignmentStatus {
            name: proctor.name().to_string(),
            proctor,
            assignment: pass.display_name(problemset)?,
            problemset_state,
            choice,
            problem: drawn.map(|p| pass.display_name(p)).transpose()?,
            attempted,
            score,
        });
    }

    Ok(StudentStatus {
        student: student.clone(),
        assignments,
    })
}

/// The problem set and randomizer under a proctor block: its first child and
/// that child's first child.
fn assessment_parts(tree: &dyn TreeStore, proctor: NodeId) -> Result<Option<(NodeId, NodeId)>> {
    let Some(&problemset) = tree.children(proctor)?.first() else {
        return Ok(None);
    };
    Ok(tree
        .children(problemset)?
        .first()
        .map(|&randomizer| (problemset, randomizer)))
}

/// Table row for [`AssignmentStatus`].
#[derive(Tabled)]
struct StatusRow {
    /// Proctor block name.
    #[tabled(rename = "Name")]
    name:       String,
    /// Problem set.
    #[tabled(rename = "Assignment")]
    assignment: String,
    /// Drawn problem.
    #[tabled(rename = "Problem")]
    problem:    String,
    /// Attempted.
    #[tabled(rename = "Attempted")]
    attempted:  bool,
    /// Score.
    #[tabled(rename = "Score")]
    score:      String,
}

impl StudentStatus {
    /// Assessments attempted without full marks.
    pub fn failed(&self) -> Vec<&AssignmentStatus> {
        self.assignments.iter().filter(|a| a.failed()).collect()
    }

    /// Gradebook columns: `problem_<name>` and `grade_<name>` per assessment,
    /// both empty when it was not attempted.
    pub fn grade_columns(&self) -> Vec<(String, String)> {
        self.assignments
            .iter()
            .flat_map(|a| {
                let (problem, grade) = if a.attempted {
                    (
                        a.problem.clone().unwrap_or_default(),
                        a.score.map(|s| s.earned.to_string()).unwrap_or_default(),
                    )
                } else {
                    (String::new(), String::new())
                };
                [
                    (format!("problem_{}", a.name), problem),
                    (format!("grade_{}", a.name), grade),
                ]
            })
            .collect()
    }

    /// Resets every failed assessment so the student draws a new problem,
    /// returning one report per reset.
    pub fn reset_failed(
        &self,
        tree: &dyn TreeStore,
        states: &mut StudentStateStore,
    ) -> Result<Vec<String>> {
        let mut reports = Vec::new();
        for assignment in self.failed() {
            tracing::info!(
                "{} attempted {} but failed, resetting",
                self.student,
                assignment.name
            );
            let reset = ModuleTreeReset::collect(tree, states, &self.student, &assignment.proctor)?;
            reports.push(reset.reset(states));
        }
        Ok(reports)
    }

    /// Renders the status as a table.
    pub fn to_table(&self) -> String {
        let rows = self
            .assignments
            .iter()
            .map(|a| StatusRow {
                name: a.name.clone(),
                assignment: a.assignment.clone(),
                problem: a.problem.clone().unwrap_or_else(|| "-".into()),
                attempted: a.attempted,
                score: a.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            })
            .collect_vec();

        Table::new(rows)
            .with(Panel::header(format!("Assessment Status for {}", self.student)))
            .with(
                Modify::new(Rows::first())
                    .with(Alignment::center())
                    .with(Alignment::center_vertical()),
            )
            .with(Style::modern())
            .to_string()
    }
}
