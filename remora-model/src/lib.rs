//! Core record model for Remora.
//!
//! Defines the types every other Remora crate depends on:
//! - [`Record`] — the generic record container (entity type, JSON field map,
//!   origin tag)
//! - [`RecordId`] / [`Identity`] — numeric identities, including the
//!   provisional negative placeholders used before a remote id is known
//! - [`RecordSchema`] — declares an entity type's relation fields and how
//!   each field's storage may be mutated
//! - [`RecordHooks`] — optional lifecycle callbacks a repository invokes
//!   around create/update/delete
//!
//! Field payloads are plain `serde_json` objects: the store never interprets
//! their structure beyond the identity field and the declared relation map.

mod error;
mod hooks;
mod record;
mod schema;

pub use error::{ModelError, ModelResult};
pub use hooks::{NoopHooks, RecordHooks};
pub use record::{ID_FIELD, Identity, Record, RecordId};
pub use schema::{FieldDescriptor, FieldKind, FieldStorage, RecordSchema, SchemaRegistry};
