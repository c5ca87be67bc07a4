#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Course files: an outline plus its grading policy.
pub mod course;
/// Course tree nodes and outlines.
pub mod node;

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, ensure};
pub use course::CourseFile;
pub use node::{Category, CourseNode, Outline};

use crate::{
    error::{OverrideError, Result},
    fields::{Field, FieldValue},
    types::{Location, NodeId},
};

/// Read access to a course tree owned elsewhere.
pub trait TreeStore {
    /// Returns the course root.
    fn root(&self) -> NodeId;

    /// Returns the node stored under `id`.
    fn get_node(&self, id: NodeId) -> Result<&CourseNode>;

    /// Resolves a location to its node id.
    fn lookup(&self, location: &Location) -> Result<NodeId>;

    /// Returns the ordered children of `id`.
    fn children(&self, id: NodeId) -> Result<&[NodeId]> {
        Ok(self.get_node(id)?.children())
    }

    /// Returns the parent of `id`, or `None` at the root.
    fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.get_node(id)?.parent())
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut current = self.parent(id)?;
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p)?;
        }
        Ok(out)
    }

    /// Pre-order walk of the subtree rooted at `id`, with depth relative to
    /// `id` (which has depth 0).
    fn descendants(&self, id: NodeId) -> Result<Vec<(NodeId, usize)>> {
        let mut out = Vec::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            out.push((node, depth));
            for child in self.children(node)?.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        Ok(out)
    }
}

/// Arena backed course tree with an index from location to node.
#[derive(Debug, Clone)]
pub struct CourseTree {
    /// Nodes, indexed by `NodeId`.
    nodes: Vec<CourseNode>,
    /// Location index.
    index: HashMap<Location, NodeId>,
}

impl CourseTree {
    /// Builds the arena from a nested outline.
    ///
    /// Unknown field names and values of the wrong kind are rejected, as are
    /// duplicate locations.
    pub fn from_outline(outline: Outline) -> anyhow::Result<Self> {
        let mut nodes: Vec<CourseNode> = Vec::new();
        let mut index = HashMap::new();
        let mut stack: Vec<(Outline, Option<NodeId>)> = vec![(outline, None)];

        while let Some((outline, parent)) = stack.pop() {
            let id = NodeId(nodes.len());
            let location = Location(outline.location);
            ensure!(
                !index.contains_key(&location),
                "Location `{location}` appears more than once in the course outline"
            );

            let mut fields = BTreeMap::new();
            for (name, raw) in &outline.fields {
                let field: Field = name.parse()?;
                let value = FieldValue::from_json(field, raw)
                    .with_context(|| format!("Invalid `{name}` on `{location}`"))?;
                fields.insert(field, value);
            }

            if let Some(p) = parent {
                nodes[p.0].children.push(id);
            }
            index.insert(location.clone(), id);
            nodes.push(CourseNode::new(
                location,
                outline.category,
                fields,
                Vec::new(),
                parent,
            ));

            for child in outline.children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }

        Ok(Self { nodes, index })
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty. Trees built from an outline never are.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl TreeStore for CourseTree {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn get_node(&self, id: NodeId) -> Result<&CourseNode> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| OverrideError::MissingNode(format!("#{}", id.0)))
    }

    fn lookup(&self, location: &Location) -> Result<NodeId> {
        self.index
            .get(location)
            .copied()
            .ok_or_else(|| OverrideError::MissingNode(location.to_string()))
    }
}
