use crate::Record;

/// Lifecycle callbacks a repository invokes around record mutations.
///
/// All methods are no-ops by default — implement only what the entity type
/// needs and pass the hook set to the repository at construction. Hooks run
/// synchronously inside the store operation that triggers them.
pub trait RecordHooks: Send + Sync {
    /// Called when a genuinely new record is materialized, before it is
    /// persisted.
    fn before_create(&self, record: &mut Record) {
        let _ = record;
    }

    /// Called after a new record has been inserted into a dataset.
    fn after_create(&self, record: &Record) {
        let _ = record;
    }

    /// Called before a record is updated or replaced.
    fn before_update(&self, record: &mut Record) {
        let _ = record;
    }

    /// Called after an update. When the record was swapped out for a fresh
    /// instance, `record` is the pre-replacement record and `replacement`
    /// carries the new one.
    fn after_update(&self, record: &Record, replacement: Option<&Record>) {
        let _ = (record, replacement);
    }

    /// Called before a record is removed from a dataset.
    fn before_delete(&self, record: &Record) {
        let _ = record;
    }

    /// Called after a record has been removed from a dataset.
    fn after_delete(&self, record: &Record) {
        let _ = record;
    }
}

/// Hook set that does nothing; the default for repositories without custom
/// lifecycle logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RecordHooks for NoopHooks {}
