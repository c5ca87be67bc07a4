#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    fields::{Field, FieldValue},
    types::{Location, NodeId},
};

/// Kind of block a course tree node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// The course root.
    Course,
    /// A top level section.
    Chapter,
    /// A subsection; graded subsections carry a `format`.
    Sequential,
    /// A unit inside a subsection.
    Vertical,
    /// A scored problem.
    Problem,
    /// A set of problems shown together.
    Problemset,
    /// Picks one child problem per student.
    Randomize,
    /// A proctored exam wrapper.
    Proctor,
    /// Static content.
    Html,
    /// Anything else.
    #[serde(other)]
    Other,
}

/// A node of the shared course tree.
#[derive(Debug, Clone)]
pub struct CourseNode {
    /// Stable identity.
    pub(crate) location: Location,
    /// Block kind.
    pub(crate) category: Category,
    /// Values stored on the node itself.
    pub(crate) fields:   BTreeMap<Field, FieldValue>,
    /// Ordered child references.
    pub(crate) children: Vec<NodeId>,
    /// Containing node, `None` for the root.
    pub(crate) parent:   Option<NodeId>,
}

impl CourseNode {
    /// Creates a node. Tree stores that keep their blocks elsewhere build
    /// their nodes with this; `children` and `parent` must agree with the
    /// store's own ids.
    pub fn new(
        location: impl Into<Location>,
        category: Category,
        fields: BTreeMap<Field, FieldValue>,
        children: Vec<NodeId>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            location: location.into(),
            category,
            fields,
            children,
            parent,
        }
    }

    /// Returns the node's location.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Returns the node's category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Returns the value stored on the node itself, ignoring overrides and
    /// inheritance.
    pub fn native(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Returns the ordered child references.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the containing node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Native display name, falling back to the location.
    pub fn display_name(&self) -> String {
        self.native(Field::DisplayName)
            .and_then(FieldValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.location.to_string())
    }
}

/// Nested, serializable description of a course tree as found in course
/// files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outline {
    /// Stable identity of the node.
    pub location: String,
    /// Block kind.
    pub category: Category,
    /// Native field values by field name.
    #[serde(default)]
    pub fields:   BTreeMap<String, Value>,
    /// Child outlines in order.
    #[serde(default)]
    pub children: Vec<Outline>,
}

impl Outline {
    /// Creates a leaf outline.
    pub fn new(location: impl Into<String>, category: Category) -> Self {
        Self {
            location: location.into(),
            category,
            fields: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Sets a native field value.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Appends a child outline.
    pub fn with_child(mut self, child: Outline) -> Self {
        self.children.push(child);
        self
    }
}
