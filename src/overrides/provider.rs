#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itertools::Itertools;

use super::store::{OverrideContext, OverrideStore};
use crate::{
    config::{InheritanceMode, ProviderKind, Settings},
    error::{OverrideError, Result},
    fields::{Field, FieldValue},
    tree::CourseNode,
    types::{CcxId, Location, StudentId},
};

/// Who is looking at the course during one resolution pass.
///
/// Threaded explicitly through every read and write; there is no ambient
/// "current course".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveContext {
    /// Custom course being viewed, if any.
    pub ccx:     Option<CcxId>,
    /// Student the pass is computed for, if any.
    pub student: Option<StudentId>,
}

impl ActiveContext {
    /// A pass over the base course with no custom course active.
    pub fn base() -> Self {
        Self::default()
    }

    /// A pass inside the given custom course.
    pub fn for_ccx(ccx: impl Into<CcxId>) -> Self {
        Self {
            ccx: Some(ccx.into()),
            student: None,
        }
    }

    /// Adds the student the pass is computed for.
    pub fn with_student(mut self, student: impl Into<StudentId>) -> Self {
        self.student = Some(student.into());
        self
    }
}

/// What a provider did with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The provider does not own writes for this context.
    Declined,
    /// A new value was stored.
    Stored,
    /// The identical value was already stored; nothing was written.
    Unchanged,
    /// An existing override was removed.
    Cleared,
    /// There was nothing to remove.
    Absent,
}

impl WriteOutcome {
    /// Whether persisted state changed.
    pub fn changed(self) -> bool {
        matches!(self, WriteOutcome::Stored | WriteOutcome::Cleared)
    }
}

/// One link of the provider chain.
pub trait OverrideProvider: Send + Sync {
    /// Name used in configuration and logs.
    fn name(&self) -> &'static str;

    /// Returns a substitute for `field` on `node`, or `None` to defer.
    fn get(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        native: Option<&FieldValue>,
    ) -> Result<Option<FieldValue>>;

    /// Stores (`Some`) or removes (`None`) an override. Providers that do not
    /// own writes keep the default.
    fn write(
        &self,
        _active: &ActiveContext,
        _node: &CourseNode,
        _field: Field,
        _value: Option<&FieldValue>,
    ) -> Result<WriteOutcome> {
        Ok(WriteOutcome::Declined)
    }
}

/// Overrides set by the coach of a custom course.
pub struct CcxOverrideProvider {
    /// Backing store.
    store: Arc<dyn OverrideStore>,
}

impl CcxOverrideProvider {
    /// Creates a provider over `store`.
    pub fn new(store: Arc<dyn OverrideStore>) -> Self {
        Self { store }
    }
}

impl OverrideProvider for CcxOverrideProvider {
    fn name(&self) -> &'static str {
        "ccx"
    }

    fn get(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        _native: Option<&FieldValue>,
    ) -> Result<Option<FieldValue>> {
        match &active.ccx {
            Some(ccx) => self
                .store
                .get(&OverrideContext::Ccx(ccx.clone()), node.location(), field),
            None => Ok(None),
        }
    }

    fn write(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        value: Option<&FieldValue>,
    ) -> Result<WriteOutcome> {
        let Some(ccx) = &active.ccx else {
            return Ok(WriteOutcome::Declined);
        };
        let context = OverrideContext::Ccx(ccx.clone());

        Ok(match value {
            Some(value) => {
                if self.store.set(&context, node.location(), field, value)? {
                    WriteOutcome::Stored
                } else {
                    WriteOutcome::Unchanged
                }
            }
            None => {
                if self.store.clear(&context, node.location(), field)? {
                    WriteOutcome::Cleared
                } else {
                    WriteOutcome::Absent
                }
            }
        })
    }
}

/// Per-student deadline extensions granted by course staff.
///
/// Only `due` is served; the provider never accepts writes through the
/// chain, extensions go through [`IndividualDueDateProvider::set_due_extension`].
pub struct IndividualDueDateProvider {
    /// Backing store.
    store: Arc<dyn OverrideStore>,
}

impl IndividualDueDateProvider {
    /// Creates a provider over `store`.
    pub fn new(store: Arc<dyn OverrideStore>) -> Self {
        Self { store }
    }

    /// Extends the deadline of `location` for one student.
    pub fn set_due_extension(
        &self,
        student: &StudentId,
        location: &Location,
        due: DateTime<Utc>,
    ) -> Result<bool> {
        self.store.set(
            &OverrideContext::Student(student.clone()),
            location,
            Field::Due,
            &FieldValue::Date(due),
        )
    }

    /// Withdraws an extension; returns whether one existed.
    pub fn clear_due_extension(&self, student: &StudentId, location: &Location) -> Result<bool> {
        self.store
            .clear(&OverrideContext::Student(student.clone()), location, Field::Due)
    }
}

impl OverrideProvider for IndividualDueDateProvider {
    fn name(&self) -> &'static str {
        "individual_due_dates"
    }

    fn get(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        _native: Option<&FieldValue>,
    ) -> Result<Option<FieldValue>> {
        match (&active.student, field) {
            (Some(student), Field::Due) => self.store.get(
                &OverrideContext::Student(student.clone()),
                node.location(),
                field,
            ),
            _ => Ok(None),
        }
    }
}

/// Ordered, immutable list of providers plus the inheritance rule used by
/// resolution passes built on it.
#[derive(Clone)]
pub struct ProviderChain {
    /// Providers in priority order.
    providers:   Vec<Arc<dyn OverrideProvider>>,
    /// How overrides and native values interleave along the ancestor chain.
    inheritance: InheritanceMode,
}

impl ProviderChain {
    /// Creates a chain from providers in priority order.
    pub fn new(providers: Vec<Arc<dyn OverrideProvider>>, inheritance: InheritanceMode) -> Self {
        Self {
            providers,
            inheritance,
        }
    }

    /// A chain with no providers: every read sees native values.
    pub fn empty() -> Self {
        Self::new(Vec::new(), InheritanceMode::default())
    }

    /// Builds the configured providers over one shared store.
    pub fn from_settings(settings: &Settings, store: Arc<dyn OverrideStore>) -> Self {
        let providers = settings
            .providers()
            .iter()
            .map(|kind| -> Arc<dyn OverrideProvider> {
                match kind {
                    ProviderKind::Ccx => Arc::new(CcxOverrideProvider::new(Arc::clone(&store))),
                    ProviderKind::IndividualDueDates => {
                        Arc::new(IndividualDueDateProvider::new(Arc::clone(&store)))
                    }
                }
            })
            .collect();
        let chain = Self::new(providers, settings.inheritance());
        tracing::debug!("Field override providers: [{}]", chain.names().join(", "));
        chain
    }

    /// Names of the providers in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect_vec()
    }

    /// The inheritance rule.
    pub fn inheritance(&self) -> InheritanceMode {
        self.inheritance
    }

    /// First value any provider supplies, or `None` when all defer.
    pub fn lookup(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        native: Option<&FieldValue>,
    ) -> Result<Option<FieldValue>> {
        for provider in &self.providers {
            if let Some(value) = provider.get(active, node, field, native)? {
                tracing::trace!(
                    "{} overrides {} on {}: {}",
                    provider.name(),
                    field,
                    node.location(),
                    value
                );
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// The first override found, falling back to `native`.
    pub fn resolve(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        native: Option<&FieldValue>,
    ) -> Result<Option<FieldValue>> {
        Ok(self
            .lookup(active, node, field, native)?
            .or_else(|| native.cloned()))
    }

    /// Routes a write to the first provider that owns writes for `active`.
    pub fn write(
        &self,
        active: &ActiveContext,
        node: &CourseNode,
        field: Field,
        value: Option<&FieldValue>,
    ) -> Result<WriteOutcome> {
        field.ensure_overridable()?;
        for provider in &self.providers {
            let outcome = provider.write(active, node, field, value)?;
            if outcome != WriteOutcome::Declined {
                return Ok(outcome);
            }
        }
        Err(OverrideError::NoActiveContext)
    }
}
