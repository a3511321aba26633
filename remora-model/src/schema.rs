use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Describes an entity type's relation fields and storage capabilities.
///
/// Fields without a descriptor behave as plain values per their JSON shape;
/// only relation declarations and computed-storage fields need an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub entity_type: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Creates a schema for one entity type.
    #[must_use]
    pub fn new(entity_type: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            entity_type: entity_type.into(),
            fields,
        }
    }

    /// Looks up the descriptor for a field, if declared.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The related entity type a field points at, for either relation kind.
    #[must_use]
    pub fn relation_target(&self, name: &str) -> Option<&str> {
        match self.field(name).map(|f| &f.kind) {
            Some(FieldKind::RelationSingle(target)) | Some(FieldKind::RelationCollection(target)) => {
                Some(target)
            }
            _ => None,
        }
    }

    /// How a field's backing storage may be mutated. Undeclared fields are
    /// plain storage.
    #[must_use]
    pub fn storage(&self, name: &str) -> FieldStorage {
        self.field(name).map_or(FieldStorage::Plain, |f| f.storage)
    }
}

/// One declared field of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub storage: FieldStorage,
}

impl FieldDescriptor {
    fn simple(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            storage: FieldStorage::Plain,
        }
    }

    /// Shorthand for a plain scalar field.
    #[must_use]
    pub fn scalar(name: &str) -> Self {
        Self::simple(name, FieldKind::Scalar)
    }

    /// Shorthand for a nested object field with no relation semantics.
    #[must_use]
    pub fn nested(name: &str) -> Self {
        Self::simple(name, FieldKind::Nested)
    }

    /// Shorthand for a single related record, matched by foreign id.
    #[must_use]
    pub fn relation(name: &str, target: &str) -> Self {
        Self::simple(name, FieldKind::RelationSingle(target.into()))
    }

    /// Shorthand for a collection of related records.
    #[must_use]
    pub fn relation_list(name: &str, target: &str) -> Self {
        Self::simple(name, FieldKind::RelationCollection(target.into()))
    }

    /// Marks the field as backed by a computed accessor: mutations replace
    /// the whole value instead of editing it in place.
    #[must_use]
    pub fn computed(mut self) -> Self {
        self.storage = FieldStorage::Computed;
        self
    }
}

/// The closed enumeration of field shapes the deep merge dispatches on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "target")]
pub enum FieldKind {
    Scalar,
    Nested,
    RelationSingle(String),
    RelationCollection(String),
}

/// How a field's backing storage may be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStorage {
    /// Plain stored value: arrays are truncated and extended in place.
    Plain,
    /// Computed accessor: the whole value is rebuilt and reassigned so a
    /// downstream accessor layer is never bypassed.
    Computed,
}

/// Registry of every entity type's schema, shared across repositories so the
/// deep merge can resolve relation targets.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, RecordSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous one for the same type.
    pub fn register(&mut self, schema: RecordSchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    /// Chainable form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, schema: RecordSchema) -> Self {
        self.register(schema);
        self
    }

    /// Looks up a schema by entity type.
    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&RecordSchema> {
        self.schemas.get(entity_type)
    }

    /// True when a schema is registered for the type.
    #[must_use]
    pub fn contains(&self, entity_type: &str) -> bool {
        self.schemas.contains_key(entity_type)
    }
}
