//! Per-entity-type record store.
//!
//! A [`Repository`] owns one or more named datasets for a single entity type
//! and is the sole authority for identity resolution, insert/replace/update
//! persistence policy, and the deep merge used by partial updates and
//! relation hydration. Everything runs synchronously; by the time a payload
//! reaches [`Repository::save`] the transport's work is done.

use crate::error::{StoreError, StoreResult};
use crate::merge;
use crate::payload::{DeleteSelector, SaveItem, SaveOptions, SavePayload, Saved};
use crate::query::Query;
use remora_model::{
    ID_FIELD, Identity, NoopHooks, Record, RecordHooks, RecordId, RecordSchema, SchemaRegistry,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The default dataset every repository starts with.
pub const DEFAULT_DATASET: &str = "all";

/// In-memory store for all datasets of one entity type.
pub struct Repository {
    schema: RecordSchema,
    registry: Arc<SchemaRegistry>,
    hooks: Arc<dyn RecordHooks>,
    datasets: HashMap<String, Vec<Record>>,
    next_provisional: i64,
}

impl Repository {
    /// Creates a repository for a registered entity type with no lifecycle
    /// hooks.
    pub fn new(entity_type: &str, registry: Arc<SchemaRegistry>) -> StoreResult<Self> {
        Self::with_hooks(entity_type, registry, Arc::new(NoopHooks))
    }

    /// Creates a repository with a custom hook set.
    pub fn with_hooks(
        entity_type: &str,
        registry: Arc<SchemaRegistry>,
        hooks: Arc<dyn RecordHooks>,
    ) -> StoreResult<Self> {
        let schema = registry
            .get(entity_type)
            .cloned()
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;
        let mut datasets = HashMap::new();
        datasets.insert(DEFAULT_DATASET.to_string(), Vec::new());
        Ok(Self {
            schema,
            registry,
            hooks,
            datasets,
            next_provisional: -1,
        })
    }

    /// The entity type this repository stores.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.schema.entity_type
    }

    /// The schema governing this repository's records.
    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn dataset_name(name: &str) -> &str {
        if name.is_empty() { DEFAULT_DATASET } else { name }
    }

    fn target_dataset(&self, options: &SaveOptions) -> String {
        Self::dataset_name(options.dataset.as_deref().unwrap_or(DEFAULT_DATASET)).to_string()
    }

    fn hooks(&self) -> Arc<dyn RecordHooks> {
        Arc::clone(&self.hooks)
    }

    fn record_mut(&mut self, dataset: &str, id: RecordId) -> Option<&mut Record> {
        self.datasets
            .get_mut(Self::dataset_name(dataset))?
            .iter_mut()
            .find(|r| r.id() == Some(id))
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Looks up a record by identity in the default dataset.
    #[must_use]
    pub fn find(&self, id: impl Into<RecordId>) -> Option<&Record> {
        self.find_in(DEFAULT_DATASET, id)
    }

    /// Looks up a record by identity; `None` when the dataset does not exist
    /// or the identity is absent.
    #[must_use]
    pub fn find_in(&self, dataset: &str, id: impl Into<RecordId>) -> Option<&Record> {
        let id = id.into();
        self.datasets
            .get(Self::dataset_name(dataset))?
            .iter()
            .find(|r| r.id() == Some(id))
    }

    /// All records of the default dataset, in insertion order.
    #[must_use]
    pub fn all(&self) -> &[Record] {
        self.all_in(DEFAULT_DATASET)
    }

    /// All records of a dataset; empty when the dataset does not exist.
    #[must_use]
    pub fn all_in(&self, dataset: &str) -> &[Record] {
        self.datasets
            .get(Self::dataset_name(dataset))
            .map_or(&[], Vec::as_slice)
    }

    /// The first record of the default dataset.
    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.first_in(DEFAULT_DATASET)
    }

    /// The first record of a dataset.
    #[must_use]
    pub fn first_in(&self, dataset: &str) -> Option<&Record> {
        self.all_in(dataset).first()
    }

    /// The last record of the default dataset.
    #[must_use]
    pub fn last(&self) -> Option<&Record> {
        self.last_in(DEFAULT_DATASET)
    }

    /// The last record of a dataset.
    #[must_use]
    pub fn last_in(&self, dataset: &str) -> Option<&Record> {
        self.all_in(dataset).last()
    }

    /// The first `n` records of the default dataset.
    #[must_use]
    pub fn take(&self, n: usize) -> &[Record] {
        self.take_in(DEFAULT_DATASET, n)
    }

    /// The first `n` records of a dataset.
    #[must_use]
    pub fn take_in(&self, dataset: &str, n: usize) -> &[Record] {
        let rows = self.all_in(dataset);
        &rows[..n.min(rows.len())]
    }

    /// Number of records in the default dataset.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count_in(DEFAULT_DATASET)
    }

    /// Number of records in a dataset; zero when it does not exist.
    #[must_use]
    pub fn count_in(&self, dataset: &str) -> usize {
        self.all_in(dataset).len()
    }

    /// True when the identity is present in the default dataset.
    #[must_use]
    pub fn exists(&self, id: impl Into<RecordId>) -> bool {
        self.exists_in(DEFAULT_DATASET, id)
    }

    /// True when the identity is present in a dataset.
    #[must_use]
    pub fn exists_in(&self, dataset: &str, id: impl Into<RecordId>) -> bool {
        self.find_in(dataset, id).is_some()
    }

    /// True when the named dataset has been created.
    #[must_use]
    pub fn dataset_exists(&self, name: &str) -> bool {
        self.datasets.contains_key(Self::dataset_name(name))
    }

    /// Builds a query over the default dataset.
    pub fn query(&mut self) -> Query<'_> {
        self.query_in(DEFAULT_DATASET)
    }

    /// Builds a query over a named dataset.
    pub fn query_in(&mut self, dataset: &str) -> Query<'_> {
        let dataset = Self::dataset_name(dataset).to_string();
        Query::new(self, dataset)
    }

    // ── Local drafts ─────────────────────────────────────────────

    /// Materializes an unpersisted record, assigning the next provisional
    /// negative id when the payload carries no usable identity yet.
    pub fn draft(&mut self, data: Value) -> StoreResult<Record> {
        let mut record = Record::from_value(self.entity_type(), data)?;
        if record.id().is_none() {
            record.set_id(RecordId::new(self.next_provisional));
            self.next_provisional -= 1;
        }
        Ok(record)
    }

    // ── Ingest pipeline ──────────────────────────────────────────

    /// Saves a payload into a dataset, creating the dataset if needed.
    ///
    /// `replace` and `update` are mutually exclusive; requesting both is a
    /// configuration conflict and mutates nothing.
    pub fn save(&mut self, payload: impl Into<SavePayload>, options: SaveOptions) -> StoreResult<Saved> {
        if options.replace && options.update {
            warn!(
                entity_type = %self.entity_type(),
                "save called with both replace and update; refusing"
            );
            return Err(StoreError::ReplaceUpdateConflict);
        }
        let dataset = self.target_dataset(&options);
        self.datasets.entry(dataset).or_default();
        self.transform(payload, options)
    }

    /// Materializes a payload into records, resolving each item against the
    /// target dataset, and persists the batch unless `options.save` is off.
    /// The result mirrors the single-vs-batch shape of the payload.
    pub fn transform(
        &mut self,
        payload: impl Into<SavePayload>,
        options: SaveOptions,
    ) -> StoreResult<Saved> {
        let dataset = self.target_dataset(&options);
        let (items, single) = match payload.into() {
            SavePayload::One(item) => (vec![item], true),
            SavePayload::Many(items) => (items, false),
        };

        let mut batch: Vec<Record> = Vec::new();
        for item in items {
            match item {
                SaveItem::Stored(record)
                    if record.persisted && record.entity_type == self.entity_type() =>
                {
                    // already materialized by this store: only the update
                    // hook runs, the record itself is kept unchanged
                    let mut record = record;
                    self.hooks.before_update(&mut record);
                    batch.push(record);
                }
                SaveItem::Stored(record) => {
                    self.transform_raw(record.to_value(), &dataset, &options, &mut batch)?;
                }
                SaveItem::Raw(value) => {
                    self.transform_raw(value, &dataset, &options, &mut batch)?;
                }
            }
        }

        if batch.is_empty() {
            return Ok(if single { Saved::None } else { Saved::Many(Vec::new()) });
        }

        let records = if options.save {
            self.persist(batch, &options)
        } else {
            batch
        };
        Ok(if single {
            match records.into_iter().next() {
                Some(record) => Saved::One(record),
                None => Saved::None,
            }
        } else {
            Saved::Many(records)
        })
    }

    fn transform_raw(
        &mut self,
        value: Value,
        dataset: &str,
        options: &SaveOptions,
        batch: &mut Vec<Record>,
    ) -> StoreResult<()> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                debug!(entity_type = %self.entity_type(), value = %other, "skipping non-object item");
                return Ok(());
            }
        };

        match Identity::of(&map) {
            Identity::Missing => {
                debug!(entity_type = %self.entity_type(), "skipping item without an identity field");
            }
            Identity::Unassigned => {
                batch.push(self.materialize_new(map));
            }
            Identity::Assigned(id) => {
                if self.find_in(dataset, id).is_none() {
                    batch.push(self.materialize_new(map));
                } else if options.update {
                    // route through the full update pipeline; nothing joins
                    // the batch
                    self.update_in(dataset, id, Value::Object(map))?;
                } else if options.replace {
                    let hooks = self.hooks();
                    if let Some(existing) = self.record_mut(dataset, id) {
                        hooks.before_update(existing);
                    }
                    batch.push(Record::new(self.entity_type(), map));
                } else {
                    debug!(
                        entity_type = %self.entity_type(),
                        id = %id,
                        "identity already stored; skipping item"
                    );
                }
            }
        }
        Ok(())
    }

    fn materialize_new(&self, map: Map<String, Value>) -> Record {
        let mut record = Record::new(self.entity_type(), map);
        self.hooks.before_create(&mut record);
        record
    }

    /// Inserts or replaces a batch of records in the target dataset.
    ///
    /// Records whose identity is already stored contribute nothing unless
    /// `options.replace` is set; callers see only the records that landed.
    pub fn persist(&mut self, batch: Vec<Record>, options: &SaveOptions) -> Vec<Record> {
        let dataset = self.target_dataset(options);
        let entity_type = self.schema.entity_type.clone();
        let hooks = self.hooks();
        let rows = self.datasets.entry(dataset.clone()).or_default();
        let mut stored = Vec::new();

        for mut record in batch {
            let twin = record
                .id()
                .and_then(|id| rows.iter().position(|r| r.id() == Some(id)));
            match twin {
                None => {
                    record.persisted = true;
                    let index = if options.prepend {
                        rows.insert(0, record);
                        0
                    } else {
                        rows.push(record);
                        rows.len() - 1
                    };
                    let fresh = rows[index].clone();
                    hooks.after_create(&fresh);
                    debug!(entity_type = %entity_type, dataset = %dataset, index, "inserted record");
                    stored.push(fresh);
                }
                Some(index) if options.replace => {
                    record.persisted = true;
                    // the hook observes the record reference captured before
                    // the swap; the replacement arrives as the argument
                    let previous = std::mem::replace(&mut rows[index], record);
                    let fresh = rows[index].clone();
                    hooks.after_update(&previous, Some(&fresh));
                    debug!(entity_type = %entity_type, dataset = %dataset, index, "replaced record");
                    stored.push(fresh);
                }
                Some(_) => {
                    debug!(entity_type = %entity_type, dataset = %dataset, "identity already stored; item contributes nothing");
                }
            }
        }
        stored
    }

    // ── Updates ──────────────────────────────────────────────────

    /// Deep-merges a partial payload into the record with the given identity
    /// in the default dataset.
    pub fn update(&mut self, id: impl Into<RecordId>, partial: Value) -> StoreResult<Option<Record>> {
        self.update_in(DEFAULT_DATASET, id, partial)
    }

    /// Deep-merges a partial payload into a stored record. Returns a fresh
    /// lookup by the (possibly migrated) identity, or `Ok(None)` when the
    /// identity is absent.
    pub fn update_in(
        &mut self,
        dataset: &str,
        id: impl Into<RecordId>,
        partial: Value,
    ) -> StoreResult<Option<Record>> {
        let id = id.into();
        let dataset = Self::dataset_name(dataset).to_string();
        if self.find_in(&dataset, id).is_none() {
            return Ok(None);
        }
        let hooks = self.hooks();
        if let Some(record) = self.record_mut(&dataset, id) {
            hooks.before_update(record);
        }
        let new_id = self.deep_update_in(&dataset, id, partial)?;
        let fresh = self.find_in(&dataset, new_id).cloned();
        if let Some(record) = &fresh {
            hooks.after_update(record, None);
        }
        Ok(fresh)
    }

    /// [`deep_update_in`](Self::deep_update_in) against the default dataset.
    pub fn deep_update(&mut self, id: impl Into<RecordId>, partial: Value) -> StoreResult<RecordId> {
        self.deep_update_in(DEFAULT_DATASET, id.into(), partial)
    }

    /// Recursively merges a partial payload into a stored record, then
    /// resaves the merged record through the replace pipeline. When the
    /// partial carries a different identity, the old identity's entry is
    /// deleted after the resave (identity migration). Returns the identity
    /// the record ended up under.
    pub fn deep_update_in(
        &mut self,
        dataset: &str,
        id: RecordId,
        partial: Value,
    ) -> StoreResult<RecordId> {
        let Value::Object(partial) = partial else {
            return Err(StoreError::InvalidPartial);
        };
        let dataset = Self::dataset_name(dataset).to_string();
        let registry = Arc::clone(&self.registry);
        let schema = self.schema.clone();
        let entity_type = schema.entity_type.clone();

        let Some(record) = self.record_mut(&dataset, id) else {
            return Ok(id);
        };

        // nested merge of object/array fields into the stored record; a
        // failed branch is abandoned, the rest still commits
        for (field, incoming) in &partial {
            if incoming.is_object() || incoming.is_array() {
                if let Err(error) =
                    merge::merge_field(&mut record.values, field, incoming, Some(&schema), &registry)
                {
                    warn!(
                        entity_type = %entity_type,
                        id = %id,
                        field = %field,
                        value = %incoming,
                        %error,
                        "abandoning merge branch"
                    );
                }
            }
        }

        // merged copy: the record's post-merge values with the partial's
        // scalar fields spread over them
        let mut merged = record.values.clone();
        for (field, incoming) in partial {
            if !incoming.is_object() && !incoming.is_array() {
                merged.insert(field, incoming);
            }
        }
        let new_id = match Identity::of(&merged).record_id() {
            Some(new_id) => new_id,
            None => {
                // identity cannot migrate to null
                merged.insert(ID_FIELD.to_string(), Value::from(id.get()));
                id
            }
        };

        self.save(
            Value::Object(merged),
            SaveOptions::replace().in_dataset(dataset.clone()),
        )?;

        if new_id != id {
            self.delete_in(&dataset, id.get());
        }
        Ok(new_id)
    }

    // ── Removal ──────────────────────────────────────────────────

    /// Deletes matching records from the default dataset.
    pub fn delete(&mut self, selector: impl Into<DeleteSelector>) {
        self.delete_in(DEFAULT_DATASET, selector);
    }

    /// Deletes matching records from a dataset. The full match set is
    /// resolved first; `before_delete` runs for every doomed record, then all
    /// are removed, then `after_delete` runs for every one — hooks are
    /// batched, never interleaved.
    pub fn delete_in(&mut self, dataset: &str, selector: impl Into<DeleteSelector>) {
        let dataset = Self::dataset_name(dataset);
        let selector = selector.into();
        let Some(rows) = self.datasets.get(dataset) else {
            return;
        };
        let doomed: Vec<Record> = rows.iter().filter(|r| selector.matches(r)).cloned().collect();
        if doomed.is_empty() {
            return;
        }
        let hooks = self.hooks();
        for record in &doomed {
            hooks.before_delete(record);
        }
        if let Some(rows) = self.datasets.get_mut(dataset) {
            rows.retain(|r| !selector.matches(r));
        }
        for record in &doomed {
            hooks.after_delete(record);
        }
        debug!(
            entity_type = %self.entity_type(),
            dataset = %dataset,
            removed = doomed.len(),
            "deleted records"
        );
    }

    /// Empties the default dataset.
    pub fn clear(&mut self) {
        self.clear_in(DEFAULT_DATASET);
    }

    /// Empties one dataset; a missing dataset is a no-op.
    pub fn clear_in(&mut self, dataset: &str) {
        if let Some(rows) = self.datasets.get_mut(Self::dataset_name(dataset)) {
            rows.clear();
        }
    }

    /// Drops every dataset, leaving a single empty default dataset.
    pub fn reset(&mut self) {
        self.datasets.clear();
        self.datasets.insert(DEFAULT_DATASET.to_string(), Vec::new());
    }
}
