//! Relation-aware recursive merge of partial payloads into stored records.
//!
//! The merge folds an incoming object/array field into the record's current
//! value. Fields declared as relations in the schema materialize instances of
//! the related entity type; undeclared fields are built up as plain JSON.
//! A failure in one branch abandons only that branch — the rest of the merge
//! still commits.

use remora_model::{FieldStorage, RecordSchema, SchemaRegistry};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Merge one incoming field into `values`, honoring the schema's relation
/// declarations and storage capabilities.
pub(crate) fn merge_field(
    values: &mut Map<String, Value>,
    field: &str,
    incoming: &Value,
    schema: Option<&RecordSchema>,
    registry: &SchemaRegistry,
) -> StoreResult<()> {
    match incoming {
        Value::Array(items) => merge_array_field(values, field, items, schema, registry),
        Value::Object(obj) => merge_object_field(values, field, obj, schema, registry),
        scalar => {
            values.insert(field.to_string(), scalar.clone());
            Ok(())
        }
    }
}

/// Merge an incoming array into the field, truncating to the incoming length
/// and merging element by element.
fn merge_array_field(
    values: &mut Map<String, Value>,
    field: &str,
    items: &[Value],
    schema: Option<&RecordSchema>,
    registry: &SchemaRegistry,
) -> StoreResult<()> {
    let storage = schema.map_or(FieldStorage::Plain, |s| s.storage(field));
    let relation_target = schema.and_then(|s| s.relation_target(field)).map(str::to_string);

    // the field must be backed by an array before elements merge into it
    if !matches!(values.get(field), Some(Value::Array(_))) {
        values.insert(field.to_string(), Value::Array(Vec::new()));
    }

    if items.len() < array_len(values, field) {
        truncate_array(values, field, items.len(), storage);
    }

    for (index, item) in items.iter().enumerate() {
        if let Err(error) =
            merge_array_element(values, field, index, item, relation_target.as_deref(), storage, registry)
        {
            warn!(field = %field, index, value = %item, %error, "abandoning array element merge branch");
        }
    }
    Ok(())
}

/// Removes trailing elements using the technique the field's storage
/// capability allows: plain fields are edited in place, computed fields are
/// rebuilt and reassigned whole.
fn truncate_array(values: &mut Map<String, Value>, field: &str, len: usize, storage: FieldStorage) {
    match storage {
        FieldStorage::Plain => {
            if let Some(Value::Array(arr)) = values.get_mut(field) {
                arr.truncate(len);
            }
        }
        FieldStorage::Computed => {
            if let Some(Value::Array(arr)) = values.get(field) {
                let shortened = arr[..len].to_vec();
                values.insert(field.to_string(), Value::Array(shortened));
            }
        }
    }
}

fn merge_array_element(
    values: &mut Map<String, Value>,
    field: &str,
    index: usize,
    item: &Value,
    relation_target: Option<&str>,
    storage: FieldStorage,
    registry: &SchemaRegistry,
) -> StoreResult<()> {
    let slot_present = index < array_len(values, field);
    match item {
        Value::Object(incoming) => {
            if slot_present {
                let child = resolve_target(relation_target, registry)?;
                match slot_mut(values, field, index) {
                    Some(Value::Object(existing)) => merge_into_object(existing, incoming, child, registry),
                    Some(other) => Err(StoreError::MergeConflict {
                        field: field.to_string(),
                        reason: format!("cannot merge an object into a {} element", json_kind(other)),
                    }),
                    None => Ok(()),
                }
            } else if let Some(target) = relation_target {
                // relation element: materialize an instance of the related type
                let child = registry
                    .get(target)
                    .ok_or_else(|| StoreError::UnknownEntityType(target.to_string()))?;
                let mut instance = Map::new();
                merge_into_object(&mut instance, incoming, Some(child), registry)?;
                insert_element(values, field, Value::Object(instance), storage);
                Ok(())
            } else {
                // plain element: start from an empty skeleton and build it up
                insert_element(values, field, Value::Object(Map::new()), storage);
                if let Some(Value::Object(existing)) = slot_mut(values, field, index) {
                    merge_into_object(existing, incoming, None, registry)
                } else {
                    Ok(())
                }
            }
        }
        Value::Array(incoming) => {
            if slot_present {
                match slot_mut(values, field, index) {
                    Some(Value::Array(existing)) => {
                        merge_into_array(existing, incoming, registry);
                        Ok(())
                    }
                    Some(other) => Err(StoreError::MergeConflict {
                        field: field.to_string(),
                        reason: format!("cannot merge an array into a {} element", json_kind(other)),
                    }),
                    None => Ok(()),
                }
            } else {
                insert_element(values, field, Value::Array(Vec::new()), storage);
                if let Some(Value::Array(existing)) = slot_mut(values, field, index) {
                    merge_into_array(existing, incoming, registry);
                }
                Ok(())
            }
        }
        scalar => {
            if slot_present {
                if let Some(slot) = slot_mut(values, field, index) {
                    *slot = scalar.clone();
                }
            } else {
                insert_element(values, field, scalar.clone(), storage);
            }
            Ok(())
        }
    }
}

/// Merge an incoming object into the field.
fn merge_object_field(
    values: &mut Map<String, Value>,
    field: &str,
    incoming: &Map<String, Value>,
    schema: Option<&RecordSchema>,
    registry: &SchemaRegistry,
) -> StoreResult<()> {
    let relation_target = schema.and_then(|s| s.relation_target(field)).map(str::to_string);

    if values.get(field).is_some_and(|v| !is_falsy(v)) {
        // already populated: merge into the existing value regardless of
        // relation declaration
        let child = resolve_target(relation_target.as_deref(), registry)?;
        match values.get_mut(field) {
            Some(Value::Object(existing)) => merge_into_object(existing, incoming, child, registry),
            Some(other) => Err(StoreError::MergeConflict {
                field: field.to_string(),
                reason: format!("cannot merge an object into a {}", json_kind(other)),
            }),
            None => Ok(()),
        }
    } else if let Some(target) = relation_target {
        let child = registry
            .get(&target)
            .ok_or_else(|| StoreError::UnknownEntityType(target.clone()))?;
        let mut instance = Map::new();
        merge_into_object(&mut instance, incoming, Some(child), registry)?;
        values.insert(field.to_string(), Value::Object(instance));
        Ok(())
    } else {
        values.insert(field.to_string(), Value::Object(Map::new()));
        if let Some(Value::Object(existing)) = values.get_mut(field) {
            merge_into_object(existing, incoming, None, registry)
        } else {
            Ok(())
        }
    }
}

/// Merge every incoming key into an object. Inside a relation instance the
/// target type's schema drives nested relation resolution; plain nested
/// objects carry no relation map.
fn merge_into_object(
    existing: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    schema: Option<&RecordSchema>,
    registry: &SchemaRegistry,
) -> StoreResult<()> {
    for (key, value) in incoming {
        merge_field(existing, key, value, schema, registry)?;
    }
    Ok(())
}

/// Merge nested arrays (arrays inside arrays); no relation context applies
/// at this depth, and shape clashes abandon only the offending element.
fn merge_into_array(existing: &mut Vec<Value>, incoming: &[Value], registry: &SchemaRegistry) {
    if incoming.len() < existing.len() {
        existing.truncate(incoming.len());
    }
    for (index, item) in incoming.iter().enumerate() {
        if index < existing.len() {
            match (&mut existing[index], item) {
                (Value::Object(slot), Value::Object(obj)) => {
                    if let Err(error) = merge_into_object(slot, obj, None, registry) {
                        warn!(index, %error, "abandoning nested array element merge branch");
                    }
                }
                (Value::Array(slot), Value::Array(arr)) => merge_into_array(slot, arr, registry),
                (slot, Value::Object(_) | Value::Array(_)) => {
                    warn!(index, existing = %json_kind(slot), "abandoning nested array element merge branch");
                }
                (slot, scalar) => *slot = scalar.clone(),
            }
        } else {
            match item {
                Value::Object(obj) => {
                    let mut skeleton = Map::new();
                    if let Err(error) = merge_into_object(&mut skeleton, obj, None, registry) {
                        warn!(index, %error, "abandoning nested array element merge branch");
                    }
                    existing.push(Value::Object(skeleton));
                }
                Value::Array(arr) => {
                    let mut skeleton = Vec::new();
                    merge_into_array(&mut skeleton, arr, registry);
                    existing.push(Value::Array(skeleton));
                }
                scalar => existing.push(scalar.clone()),
            }
        }
    }
}

/// Appends an element using the technique the field's storage capability
/// allows.
fn insert_element(values: &mut Map<String, Value>, field: &str, element: Value, storage: FieldStorage) {
    match storage {
        FieldStorage::Plain => {
            if let Some(Value::Array(arr)) = values.get_mut(field) {
                arr.push(element);
            }
        }
        FieldStorage::Computed => {
            let mut rebuilt = match values.get(field) {
                Some(Value::Array(arr)) => arr.clone(),
                _ => Vec::new(),
            };
            rebuilt.push(element);
            values.insert(field.to_string(), Value::Array(rebuilt));
        }
    }
}

fn resolve_target<'a>(
    target: Option<&str>,
    registry: &'a SchemaRegistry,
) -> StoreResult<Option<&'a RecordSchema>> {
    match target {
        None => Ok(None),
        Some(name) => registry
            .get(name)
            .map(Some)
            .ok_or_else(|| StoreError::UnknownEntityType(name.to_string())),
    }
}

fn array_len(values: &Map<String, Value>, field: &str) -> usize {
    match values.get(field) {
        Some(Value::Array(arr)) => arr.len(),
        _ => 0,
    }
}

fn slot_mut<'a>(values: &'a mut Map<String, Value>, field: &str, index: usize) -> Option<&'a mut Value> {
    match values.get_mut(field) {
        Some(Value::Array(arr)) => arr.get_mut(index),
        _ => None,
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
