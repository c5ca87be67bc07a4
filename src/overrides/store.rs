#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        RwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde::Serialize;

use crate::{
    error::{OverrideError, Result},
    fields::{self, Field, FieldValue},
    types::{CcxId, Location, StudentId},
};

/// Scope an override belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OverrideContext {
    /// Overrides made by the coach of one custom course.
    Ccx(CcxId),
    /// Overrides granted to one student, such as a deadline extension.
    Student(StudentId),
}

impl OverrideContext {
    /// Stable text key used by persistent backends.
    pub fn key(&self) -> String {
        match self {
            OverrideContext::Ccx(id) => format!("ccx:{id}"),
            OverrideContext::Student(id) => format!("student:{id}"),
        }
    }
}

impl Display for OverrideContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// One stored override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideRecord {
    /// Owning scope.
    pub context:  OverrideContext,
    /// Overridden node.
    pub location: Location,
    /// Overridden field.
    pub field:    Field,
    /// Decoded value.
    pub value:    FieldValue,
}

/// Persistence for overrides keyed by (context, location, field).
///
/// Backends implement the raw, already-encoded operations; the provided
/// methods handle encoding against the field's declared kind. Writers to
/// distinct keys may run concurrently; writers to the same key race and the
/// last write wins.
pub trait OverrideStore: Send + Sync {
    /// Reads the encoded value, if any.
    fn read_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<Option<String>>;

    /// Inserts or replaces the encoded value.
    fn write_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
        raw: &str,
    ) -> Result<()>;

    /// Deletes the record; returns whether one existed.
    fn delete_raw(&self, context: &OverrideContext, location: &Location, field: Field)
    -> Result<bool>;

    /// All encoded records of a context, ordered by location then field.
    fn list_raw(&self, context: &OverrideContext) -> Result<Vec<(Location, Field, String)>>;

    /// Reads and decodes an override.
    fn get(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<Option<FieldValue>> {
        self.read_raw(context, location, field)?
            .map(|raw| fields::decode(field, &raw))
            .transpose()
    }

    /// Encodes and upserts an override. Returns `false` without writing when
    /// the stored value is already identical.
    fn set(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
        value: &FieldValue,
    ) -> Result<bool> {
        field.ensure_overridable()?;
        let raw = fields::encode(field, value)?;
        if self.read_raw(context, location, field)?.as_deref() == Some(raw.as_str()) {
            return Ok(false);
        }
        self.write_raw(context, location, field, &raw)?;
        tracing::debug!("Stored override {context} {location} {field}={value}");
        Ok(true)
    }

    /// Removes an override; returns whether one existed.
    fn clear(&self, context: &OverrideContext, location: &Location, field: Field) -> Result<bool> {
        let existed = self.delete_raw(context, location, field)?;
        if existed {
            tracing::debug!("Cleared override {context} {location} {field}");
        }
        Ok(existed)
    }

    /// Decoded records of a context.
    fn list(&self, context: &OverrideContext) -> Result<Vec<OverrideRecord>> {
        self.list_raw(context)?
            .into_iter()
            .map(|(location, field, raw)| {
                Ok(OverrideRecord {
                    context: context.clone(),
                    location,
                    field,
                    value: fields::decode(field, &raw)?,
                })
            })
            .collect()
    }
}

/// Key used by the in-memory store.
type MemoryKey = (String, Location, Field);

/// Process local override store, mostly for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    /// Encoded values.
    records: RwLock<HashMap<MemoryKey, String>>,
    /// Number of reads served, for query-count assertions.
    reads:   AtomicUsize,
    /// Number of writes and deletes applied.
    writes:  AtomicUsize,
}

impl MemoryOverrideStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of writes and deletes applied so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Builds the map key for a record.
    fn key(context: &OverrideContext, location: &Location, field: Field) -> MemoryKey {
        (context.key(), location.clone(), field)
    }
}

/// Maps a poisoned lock into a storage failure.
fn poisoned<E: Display>(e: E) -> OverrideError {
    OverrideError::Storage(format!("override store lock poisoned: {e}"))
}

impl OverrideStore for MemoryOverrideStore {
    fn read_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&Self::key(context, location, field)).cloned())
    }

    fn write_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
        raw: &str,
    ) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(Self::key(context, location, field), raw.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn delete_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        let existed = records
            .remove(&Self::key(context, location, field))
            .is_some();
        if existed {
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(existed)
    }

    fn list_raw(&self, context: &OverrideContext) -> Result<Vec<(Location, Field, String)>> {
        let wanted = context.key();
        let records = self.records.read().map_err(poisoned)?;
        let mut out: Vec<_> = records
            .iter()
            .filter(|((ctx, _, _), _)| *ctx == wanted)
            .map(|((_, location, field), raw)| (location.clone(), *field, raw.clone()))
            .collect();
        out.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        Ok(out)
    }
}
