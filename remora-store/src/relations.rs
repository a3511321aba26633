//! Relation resolution between repositories.
//!
//! Relations always cross repository boundaries: a record resolves its
//! related rows against the *other* entity type's repository, passed in
//! explicitly.

use crate::error::StoreResult;
use crate::payload::{SaveOptions, Saved};
use crate::repository::Repository;
use remora_model::{Record, RecordId};
use serde_json::Value;

/// Resolves a single "belongs-to" relation by foreign id. An absent foreign
/// id resolves to nothing.
#[must_use]
pub fn belongs_to<'a>(related: &'a Repository, foreign_id: Option<RecordId>) -> Option<&'a Record> {
    related.find(foreign_id?)
}

/// Resolves a "has-many" relation: every related record whose foreign-key
/// field equals this record's identity.
#[must_use]
pub fn has_many(record: &Record, related: &mut Repository, foreign_key: &str) -> Vec<Record> {
    let Some(id) = record.id() else {
        return Vec::new();
    };
    related
        .query()
        .where_eq(foreign_key, id.get())
        .get()
        .into_iter()
        .cloned()
        .collect()
}

/// Hydrates related rows from an embedded payload: bulk-saves into the
/// related repository with replace semantics and no prepend. Rows already
/// stored whose foreign key no longer appears in the payload are left
/// untouched — stale related rows are never auto-pruned here.
pub fn setup_relation(related: &mut Repository, data: Option<Value>) -> StoreResult<Saved> {
    match data {
        Some(value) => related.save(value, SaveOptions::replace()),
        None => Ok(Saved::None),
    }
}
