#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    grading::{Score, ScoreSource},
    types::{Location, StudentId},
};

/// Stored interaction state of one student with one course block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentModule {
    /// Owner of the state.
    pub student:   StudentId,
    /// Block the state belongs to.
    pub location:  Location,
    /// Block specific state, e.g. `attempts`, `correct_map`, `input_state`.
    #[serde(default = "empty_state")]
    pub state:     Value,
    /// Points earned, `None` when never graded.
    #[serde(default)]
    pub grade:     Option<f64>,
    /// Points possible.
    #[serde(default)]
    pub max_grade: Option<f64>,
    /// Earlier snapshots of `state`, oldest first.
    #[serde(default)]
    pub history:   Vec<Value>,
}

/// An empty state object.
fn empty_state() -> Value {
    json!({})
}

impl StudentModule {
    /// Creates an ungraded module with empty state.
    pub fn new(student: impl Into<StudentId>, location: impl Into<Location>) -> Self {
        Self {
            student: student.into(),
            location: location.into(),
            state: empty_state(),
            grade: None,
            max_grade: None,
            history: Vec::new(),
        }
    }

    /// Sets the current state.
    pub fn with_state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }

    /// Sets the earlier snapshots, oldest first.
    pub fn with_history(mut self, history: Vec<Value>) -> Self {
        self.history = history;
        self
    }

    /// Records a grade.
    pub fn with_grade(mut self, grade: f64, max_grade: f64) -> Self {
        self.grade = Some(grade);
        self.max_grade = Some(max_grade);
        self
    }

    /// Every recorded state, history first and the current state last.
    pub fn states(&self) -> impl Iterator<Item = &Value> {
        self.history.iter().chain(std::iter::once(&self.state))
    }
}

/// On disk layout of a student state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    /// Students with course staff access.
    #[serde(default)]
    staff:   BTreeSet<StudentId>,
    /// Module states.
    #[serde(default)]
    modules: Vec<StudentModule>,
}

/// Student module states of one course, keyed by student and location.
#[derive(Debug, Clone, Default)]
pub struct StudentStateStore {
    /// Module states.
    modules: BTreeMap<(StudentId, Location), StudentModule>,
    /// Students with course staff access.
    staff:   BTreeSet<StudentId>,
}

impl StudentStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a student state file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read student state file {}", path.display()))?;
        let file: StateFile = serde_json::from_str(&text)
            .with_context(|| format!("Could not parse student state file {}", path.display()))?;

        let mut store = Self {
            staff: file.staff,
            ..Self::default()
        };
        for module in file.modules {
            store.insert(module);
        }
        tracing::debug!(
            "Loaded {} module states from {}",
            store.modules.len(),
            path.display()
        );
        Ok(store)
    }

    /// Writes the store back to a state file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = StateFile {
            staff:   self.staff.clone(),
            modules: self.modules.values().cloned().collect(),
        };
        let text = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, text)
            .with_context(|| format!("Could not write student state file {}", path.display()))
    }

    /// Adds or replaces a module state.
    pub fn insert(&mut self, module: StudentModule) {
        self.modules
            .insert((module.student.clone(), module.location.clone()), module);
    }

    /// Marks a student as course staff.
    pub fn add_staff(&mut self, student: impl Into<StudentId>) {
        self.staff.insert(student.into());
    }

    /// Whether the student has course staff access.
    pub fn is_staff(&self, student: &StudentId) -> bool {
        self.staff.contains(student)
    }

    /// State of one student at one location.
    pub fn get(&self, student: &StudentId, location: &Location) -> Option<&StudentModule> {
        self.modules.get(&(student.clone(), location.clone()))
    }

    /// Mutable state of one student at one location.
    pub fn get_mut(
        &mut self,
        student: &StudentId,
        location: &Location,
    ) -> Option<&mut StudentModule> {
        self.modules.get_mut(&(student.clone(), location.clone()))
    }

    /// Every student's state at `location`.
    pub fn at_location<'s>(
        &'s self,
        location: &'s Location,
    ) -> impl Iterator<Item = &'s StudentModule> {
        self.modules
            .values()
            .filter(move |m| &m.location == location)
    }

    /// Every student with at least one module state, staff included.
    pub fn students(&self) -> BTreeSet<&StudentId> {
        self.modules.keys().map(|(s, _)| s).collect()
    }

    /// Number of stored module states.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no module state is stored.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ScoreSource for StudentStateStore {
    fn score(&self, student: &StudentId, location: &Location) -> Option<Score> {
        let module = self.get(student, location)?;
        let earned = module.grade?;
        Some(Score::new(earned, module.max_grade.unwrap_or(0.0)))
    }
}
