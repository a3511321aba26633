//! In-memory mirror store for remotely fetched records.
//!
//! Remora keeps a local mirror of remote resources and lets the application
//! query and mutate that mirror cheaply without re-fetching:
//!
//! - [`Repository`] — per-entity-type store of named datasets; the sole
//!   authority for identity resolution, insert/replace/update persistence
//!   policy, and the relation-aware deep merge
//! - [`Query`] — chainable predicate/order/limit view over one dataset, with
//!   bulk update/delete of its result set
//! - [`relations`] — belongs-to / has-many resolution and relation hydration
//!   against another entity type's repository
//!
//! The store is single-threaded and synchronous: by the time a payload
//! reaches [`Repository::save`], the transport collaborator's work is done
//! and the whole operation runs to completion. When two in-flight fetches
//! land on the same identity, the later one wins; serializing fetches is the
//! caller's concern.

mod error;
mod merge;
mod payload;
mod query;
pub mod relations;
mod repository;

pub use error::{StoreError, StoreResult};
pub use payload::{DeleteSelector, SaveItem, SaveOptions, SavePayload, Saved};
pub use query::{Direction, Query, QueryOperator};
pub use repository::{DEFAULT_DATASET, Repository};
