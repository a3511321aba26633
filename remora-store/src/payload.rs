//! Inbound payload shapes and save options.
//!
//! The transport collaborator hands the store already-decoded JSON — a single
//! object or a homogeneous array. Save results mirror the shape of their
//! input, so a single-object save yields a single record (or nothing) and a
//! batch save yields a batch.

use remora_model::{Record, RecordId};
use serde_json::Value;

/// Options controlling how [`Repository::save`](crate::Repository::save)
/// persists a payload.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Swap stored records for freshly materialized ones on identity match.
    pub replace: bool,
    /// Deep-merge raw items into stored records on identity match.
    pub update: bool,
    /// Persist the transformed batch (true by default); false materializes
    /// without touching any dataset.
    pub save: bool,
    /// Target dataset; `None` or the empty string mean `"all"`.
    pub dataset: Option<String>,
    /// Insert new records at the front of the dataset instead of the back.
    pub prepend: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            replace: false,
            update: false,
            save: true,
            dataset: None,
            prepend: false,
        }
    }
}

impl SaveOptions {
    /// Options with replace semantics.
    #[must_use]
    pub fn replace() -> Self {
        Self {
            replace: true,
            ..Self::default()
        }
    }

    /// Options with deep-merge update semantics.
    #[must_use]
    pub fn update() -> Self {
        Self {
            update: true,
            ..Self::default()
        }
    }

    /// Targets a named dataset.
    #[must_use]
    pub fn in_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Inserts new records at the front of the dataset.
    #[must_use]
    pub fn prepended(mut self) -> Self {
        self.prepend = true;
        self
    }

    /// Materialize only; skip persistence.
    #[must_use]
    pub fn unsaved(mut self) -> Self {
        self.save = false;
        self
    }
}

/// One inbound item: raw wire data, or a record this store already
/// materialized being resubmitted.
#[derive(Debug, Clone)]
pub enum SaveItem {
    Raw(Value),
    Stored(Record),
}

/// An inbound payload, preserving the single-vs-batch shape of its source.
#[derive(Debug, Clone)]
pub enum SavePayload {
    One(SaveItem),
    Many(Vec<SaveItem>),
}

impl From<Value> for SavePayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Many(items.into_iter().map(SaveItem::Raw).collect()),
            other => Self::One(SaveItem::Raw(other)),
        }
    }
}

impl From<Vec<Value>> for SavePayload {
    fn from(items: Vec<Value>) -> Self {
        Self::Many(items.into_iter().map(SaveItem::Raw).collect())
    }
}

impl From<Record> for SavePayload {
    fn from(record: Record) -> Self {
        Self::One(SaveItem::Stored(record))
    }
}

impl From<Vec<Record>> for SavePayload {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records.into_iter().map(SaveItem::Stored).collect())
    }
}

/// Result of a save/transform, mirroring the shape of the inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Saved {
    /// Single-item payload that produced no stored record.
    None,
    One(Record),
    Many(Vec<Record>),
}

impl Saved {
    /// The first produced record, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        match self {
            Saved::None => None,
            Saved::One(record) => Some(record),
            Saved::Many(records) => records.first(),
        }
    }

    /// Number of produced records.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Saved::None => 0,
            Saved::One(_) => 1,
            Saved::Many(records) => records.len(),
        }
    }

    /// True when nothing was produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flattens the result into a vector, discarding the shape.
    #[must_use]
    pub fn into_vec(self) -> Vec<Record> {
        match self {
            Saved::None => Vec::new(),
            Saved::One(record) => vec![record],
            Saved::Many(records) => records,
        }
    }
}

/// Which records a delete call targets.
#[derive(Debug, Clone)]
pub enum DeleteSelector {
    /// One identity.
    Id(RecordId),
    /// A set of identities.
    Ids(Vec<RecordId>),
    /// Every record whose field equals the value.
    Field(String, Value),
}

impl DeleteSelector {
    /// True when the record is targeted by this selector.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            DeleteSelector::Id(id) => record.id() == Some(*id),
            DeleteSelector::Ids(ids) => record.id().is_some_and(|id| ids.contains(&id)),
            DeleteSelector::Field(field, value) => record.get(field) == Some(value),
        }
    }
}

impl From<RecordId> for DeleteSelector {
    fn from(id: RecordId) -> Self {
        Self::Id(id)
    }
}

impl From<i64> for DeleteSelector {
    fn from(id: i64) -> Self {
        Self::Id(RecordId::new(id))
    }
}

impl From<Vec<RecordId>> for DeleteSelector {
    fn from(ids: Vec<RecordId>) -> Self {
        Self::Ids(ids)
    }
}

impl From<Vec<i64>> for DeleteSelector {
    fn from(ids: Vec<i64>) -> Self {
        Self::Ids(ids.into_iter().map(RecordId::new).collect())
    }
}

impl From<(&str, Value)> for DeleteSelector {
    fn from((field, value): (&str, Value)) -> Self {
        Self::Field(field.to_string(), value)
    }
}
