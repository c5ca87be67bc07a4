#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use chrono::{DateTime, Utc};

use super::provider::{ActiveContext, ProviderChain, WriteOutcome};
use crate::{
    config::InheritanceMode,
    error::Result,
    fields::{Field, FieldValue},
    tree::TreeStore,
    types::{CcxId, Location, NodeId},
};

/// Cache key for one field of one node.
type FieldKey = (NodeId, Field);

/// One resolution pass: the single place field reads go through.
///
/// Every raw provider lookup and every resolved value is cached for the life
/// of the pass, so a (node, field) pair costs at most one provider chain
/// query no matter how often it is read. Passes are cheap; build one per
/// request and drop it afterwards.
pub struct ResolutionPass<'a> {
    /// Course tree being read.
    tree:      &'a dyn TreeStore,
    /// Provider configuration.
    chain:     &'a ProviderChain,
    /// Who the pass resolves for.
    active:    ActiveContext,
    /// Raw chain results: `None` means every provider deferred.
    overrides: RefCell<HashMap<FieldKey, Option<FieldValue>>>,
    /// Fully resolved values, inheritance applied.
    resolved:  RefCell<HashMap<FieldKey, Option<FieldValue>>>,
    /// Provider chain queries issued by this pass.
    queries:   Cell<usize>,
}

impl<'a> ResolutionPass<'a> {
    /// Starts a pass over `tree` for `active`.
    pub fn new(tree: &'a dyn TreeStore, chain: &'a ProviderChain, active: ActiveContext) -> Self {
        Self {
            tree,
            chain,
            active,
            overrides: RefCell::new(HashMap::new()),
            resolved: RefCell::new(HashMap::new()),
            queries: Cell::new(0),
        }
    }

    /// The tree this pass reads.
    pub fn tree(&self) -> &'a dyn TreeStore {
        self.tree
    }

    /// The context this pass resolves for.
    pub fn active(&self) -> &ActiveContext {
        &self.active
    }

    /// Number of provider chain queries issued so far.
    pub fn provider_queries(&self) -> usize {
        self.queries.get()
    }

    /// Override for `field` on exactly `id`, if any provider has one.
    fn override_at(&self, id: NodeId, field: Field) -> Result<Option<FieldValue>> {
        if let Some(hit) = self.overrides.borrow().get(&(id, field)) {
            return Ok(hit.clone());
        }

        let node = self.tree.get_node(id)?;
        let found = self
            .chain
            .lookup(&self.active, node, field, node.native(field))?;
        self.queries.set(self.queries.get() + 1);
        self.overrides.borrow_mut().insert((id, field), found.clone());
        Ok(found)
    }

    /// Value stored on `id` itself.
    fn native_at(&self, id: NodeId, field: Field) -> Result<Option<FieldValue>> {
        Ok(self.tree.get_node(id)?.native(field).cloned())
    }

    /// Resolves `field` on `id`.
    ///
    /// Non-inheritable fields resolve to the override, else the native
    /// value, else the declared default. Inheritable fields additionally fall
    /// back along the ancestor chain; see [`InheritanceMode`] for how
    /// overrides and native values interleave there.
    pub fn read(&self, id: NodeId, field: Field) -> Result<Option<FieldValue>> {
        if let Some(hit) = self.resolved.borrow().get(&(id, field)) {
            return Ok(hit.clone());
        }

        let value = if field.is_inheritable() {
            let mut lineage = vec![id];
            lineage.extend(self.tree.ancestors(id)?);
            self.inherit(&lineage, field)?
        } else {
            match self.override_at(id, field)? {
                Some(v) => Some(v),
                None => self.native_at(id, field)?,
            }
        };
        let value = value.or_else(|| field.default_value());

        self.resolved.borrow_mut().insert((id, field), value.clone());
        Ok(value)
    }

    /// Walks `lineage` (node first, root last) for an inheritable field.
    fn inherit(&self, lineage: &[NodeId], field: Field) -> Result<Option<FieldValue>> {
        match self.chain.inheritance() {
            InheritanceMode::OverrideFirst => {
                for (depth, id) in lineage.iter().enumerate() {
                    if let Some(v) = self.override_at(*id, field)? {
                        if depth > 0 {
                            tracing::trace!(
                                "{field} on #{} inherited override from #{}",
                                lineage[0].0,
                                id.0
                            );
                        }
                        return Ok(Some(v));
                    }
                }
                for id in lineage {
                    if let Some(v) = self.native_at(*id, field)? {
                        return Ok(Some(v));
                    }
                }
                Ok(None)
            }
            InheritanceMode::NativeFirst => {
                for id in lineage {
                    if let Some(v) = self.override_at(*id, field)? {
                        return Ok(Some(v));
                    }
                    if let Some(v) = self.native_at(*id, field)? {
                        return Ok(Some(v));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Resolves a field given by location and name.
    pub fn read_location(
        &self,
        location: &Location,
        field_name: &str,
    ) -> Result<Option<FieldValue>> {
        let field: Field = field_name.parse()?;
        let id = self.tree.lookup(location)?;
        self.read(id, field)
    }

    /// Resolved release date.
    pub fn start(&self, id: NodeId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read(id, Field::Start)?.and_then(|v| v.as_date()))
    }

    /// Resolved due date.
    pub fn due(&self, id: NodeId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read(id, Field::Due)?.and_then(|v| v.as_date()))
    }

    /// Resolved staff-only flag.
    pub fn visible_to_staff_only(&self, id: NodeId) -> Result<bool> {
        Ok(self
            .read(id, Field::VisibleToStaffOnly)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    /// Resolved item weight.
    pub fn weight(&self, id: NodeId) -> Result<Option<f64>> {
        Ok(self.read(id, Field::Weight)?.and_then(|v| v.as_f64()))
    }

    /// Raw maximum score.
    pub fn max_score(&self, id: NodeId) -> Result<Option<f64>> {
        Ok(self.read(id, Field::MaxScore)?.and_then(|v| v.as_f64()))
    }

    /// Assessment category of a graded section.
    pub fn format(&self, id: NodeId) -> Result<Option<String>> {
        Ok(self
            .read(id, Field::Format)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Resolved display name, falling back to the location.
    pub fn display_name(&self, id: NodeId) -> Result<String> {
        match self.read(id, Field::DisplayName)? {
            Some(FieldValue::Text(name)) => Ok(name),
            _ => Ok(self.tree.get_node(id)?.location().to_string()),
        }
    }

    /// Stores an override for `field` on `id` through the provider that owns
    /// writes for the active context. The shared tree is never modified.
    pub fn write(&self, id: NodeId, field: Field, value: &FieldValue) -> Result<WriteOutcome> {
        let node = self.tree.get_node(id)?;
        let outcome = self.chain.write(&self.active, node, field, Some(value))?;
        if outcome.changed() {
            self.invalidate(field);
        }
        Ok(outcome)
    }

    /// Removes the override for `field` on `id`.
    pub fn clear(&self, id: NodeId, field: Field) -> Result<WriteOutcome> {
        let node = self.tree.get_node(id)?;
        let outcome = self.chain.write(&self.active, node, field, None)?;
        if outcome.changed() {
            self.invalidate(field);
        }
        Ok(outcome)
    }

    /// Drops every cached entry of `field`; descendants may have inherited
    /// the old value.
    fn invalidate(&self, field: Field) {
        self.overrides.borrow_mut().retain(|(_, f), _| *f != field);
        self.resolved.borrow_mut().retain(|(_, f), _| *f != field);
        tracing::trace!("Invalidated cached `{field}` values");
    }
}

/// Resolves one field in a fresh pass.
pub fn resolve_field(
    tree: &dyn TreeStore,
    chain: &ProviderChain,
    active: &ActiveContext,
    location: &Location,
    field_name: &str,
) -> Result<Option<FieldValue>> {
    ResolutionPass::new(tree, chain, active.clone()).read_location(location, field_name)
}

/// Overrides one field for a custom course.
pub fn set_override(
    tree: &dyn TreeStore,
    chain: &ProviderChain,
    ccx: &CcxId,
    location: &Location,
    field_name: &str,
    value: &FieldValue,
) -> Result<WriteOutcome> {
    let field: Field = field_name.parse()?;
    let id = tree.lookup(location)?;
    ResolutionPass::new(tree, chain, ActiveContext::for_ccx(ccx.clone())).write(id, field, value)
}

/// Removes one override of a custom course.
pub fn clear_override(
    tree: &dyn TreeStore,
    chain: &ProviderChain,
    ccx: &CcxId,
    location: &Location,
    field_name: &str,
) -> Result<WriteOutcome> {
    let field: Field = field_name.parse()?;
    let id = tree.lookup(location)?;
    ResolutionPass::new(tree, chain, ActiveContext::for_ccx(ccx.clone())).clear(id, field)
}
