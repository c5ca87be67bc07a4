#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use serde_json::{Value, json};

use super::state::StudentStateStore;
use crate::{
    error::Result,
    tree::{Category, TreeStore},
    types::{Location, StudentId},
};

/// One block under the reset root.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetEntry {
    /// Block location.
    pub location:     Location,
    /// Native display name.
    pub display_name: String,
    /// Block kind.
    pub category:     Category,
    /// Depth below the reset root, which sits at level 1.
    pub level:        usize,
    /// The student's stored state, if any and if the block keeps state.
    pub state:        Option<Value>,
}

impl Display for ResetEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}> {}  ({})",
            "-".repeat(self.level),
            self.location,
            self.display_name
        )?;
        if let Some(state) = &self.state {
            write!(f, " [{state}]")?;
        }
        Ok(())
    }
}

/// Clears one student's randomization and problem state under a block, so a
/// proctored assessment can be retaken with a fresh draw.
#[derive(Debug, Clone)]
pub struct ModuleTreeReset {
    /// Student whose state is reset.
    student: StudentId,
    /// Root of the reset.
    root:    Location,
    /// Every block under the root in pre-order.
    entries: Vec<ResetEntry>,
}

/// Blocks whose state is stored per student.
fn keeps_state(category: Category) -> bool {
    matches!(
        category,
        Category::Randomize | Category::Problem | Category::Problemset
    )
}

impl ModuleTreeReset {
    /// Walks the subtree under `root` and records the student's state for
    /// every block that keeps one.
    pub fn collect(
        tree: &dyn TreeStore,
        states: &StudentStateStore,
        student: &StudentId,
        root: &Location,
    ) -> Result<Self> {
        let root_id = tree.lookup(root)?;
        let mut entries = Vec::new();
        for (id, depth) in tree.descendants(root_id)? {
            let node = tree.get_node(id)?;
            let state = if keeps_state(node.category()) {
                states
                    .get(student, node.location())
                    .map(|m| m.state.clone())
            } else {
                None
            };
            entries.push(ResetEntry {
                location: node.location().clone(),
                display_name: node.display_name(),
                category: node.category(),
                level: depth + 1,
                state,
            });
        }

        Ok(Self {
            student: student.clone(),
            root: root.clone(),
            entries,
        })
    }

    /// Every block under the root, in course order.
    pub fn entries(&self) -> &[ResetEntry] {
        &self.entries
    }

    /// Blocks that will be reset: randomizers first, then problems and
    /// problem sets.
    pub fn targets(&self) -> Vec<&ResetEntry> {
        let randomizers = self
            .entries
            .iter()
            .filter(|e| e.category == Category::Randomize);
        let problems = self
            .entries
            .iter()
            .filter(|e| matches!(e.category, Category::Problem | Category::Problemset));
        randomizers.chain(problems).collect()
    }

    /// Empties the state and grade of every target and returns a report of
    /// what was there before.
    pub fn reset(&self, states: &mut StudentStateStore) -> String {
        let mut report = format!(
            "Resetting all problem and randomize blocks under {} for {}\n",
            self.root, self.student
        );
        let mut cleared = 0;

        for entry in self.targets() {
            let old = entry.state.clone().unwrap_or_else(|| json!({}));
            report.push_str(&format!("    Resetting {entry}, old state={old}\n"));

            if let Some(module) = states.get_mut(&self.student, &entry.location) {
                module.state = json!({});
                module.grade = None;
                cleared += 1;
            }
        }

        tracing::info!(
            "Reset {cleared} module states under {} for {}",
            self.root,
            self.student
        );
        report
    }
}
