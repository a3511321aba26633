//! Filtered, ordered, limited views over one dataset.
//!
//! A [`Query`] is a transient read/write lens: it snapshots the identities of
//! a dataset at construction, narrows them through filter steps, and routes
//! bulk mutation back through the repository so live stored records are the
//! ones updated. Exclusive access to the repository for the query's lifetime
//! means no store write can interleave with a half-built filter chain.

use crate::error::StoreResult;
use crate::payload::DeleteSelector;
use crate::repository::Repository;
use remora_model::{Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Comparison operators for field filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    DoesNotContain,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl QueryOperator {
    /// Evaluates the operator against a record's field value.
    #[must_use]
    pub fn matches(self, field: Option<&Value>, operand: &Value) -> bool {
        match self {
            QueryOperator::Equal => field.is_some_and(|v| values_equal(v, operand)),
            QueryOperator::NotEqual => !field.is_some_and(|v| values_equal(v, operand)),
            QueryOperator::GreaterThan => ordering_is(field, operand, Ordering::is_gt),
            QueryOperator::GreaterThanOrEqual => ordering_is(field, operand, Ordering::is_ge),
            QueryOperator::LessThan => ordering_is(field, operand, Ordering::is_lt),
            QueryOperator::LessThanOrEqual => ordering_is(field, operand, Ordering::is_le),
            QueryOperator::Contains => field.is_some_and(|v| value_contains(v, operand)),
            QueryOperator::DoesNotContain => !field.is_some_and(|v| value_contains(v, operand)),
            QueryOperator::In => operand
                .as_array()
                .is_some_and(|set| field.is_some_and(|v| set.iter().any(|m| values_equal(v, m)))),
            QueryOperator::NotIn => !operand
                .as_array()
                .is_some_and(|set| field.is_some_and(|v| set.iter().any(|m| values_equal(v, m)))),
            QueryOperator::IsNull => field.is_none_or(Value::is_null),
            QueryOperator::IsNotNull => field.is_some_and(|v| !v.is_null()),
        }
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A filtered view over one dataset of one repository.
pub struct Query<'a> {
    repo: &'a mut Repository,
    dataset: String,
    result: Vec<RecordId>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(repo: &'a mut Repository, dataset: String) -> Self {
        let result = repo.all_in(&dataset).iter().filter_map(Record::id).collect();
        Self {
            repo,
            dataset,
            result,
        }
    }

    // ── Filters ──────────────────────────────────────────────────

    /// Keeps records whose field equals the value.
    #[must_use]
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.where_op(field, QueryOperator::Equal, value)
    }

    /// Keeps records whose field satisfies the operator.
    #[must_use]
    pub fn where_op(mut self, field: &str, op: QueryOperator, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.retain(|record| op.matches(record.get(field), &value));
        self
    }

    /// Keeps records whose field is absent or null.
    #[must_use]
    pub fn where_null(self, field: &str) -> Self {
        self.where_op(field, QueryOperator::IsNull, Value::Null)
    }

    /// Keeps records whose field is present and non-null.
    #[must_use]
    pub fn where_not_null(self, field: &str) -> Self {
        self.where_op(field, QueryOperator::IsNotNull, Value::Null)
    }

    /// Keeps records the predicate votes `Some(true)` for. A predicate that
    /// abstains (`None`) for the entire current result leaves it unchanged —
    /// the step becomes a chain continuation instead of collapsing to empty.
    #[must_use]
    pub fn where_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> Option<bool>,
    {
        let repo: &Repository = self.repo;
        let dataset = self.dataset.as_str();
        let votes: Vec<Option<bool>> = self
            .result
            .iter()
            .map(|id| repo.find_in(dataset, *id).and_then(&predicate))
            .collect();
        if votes.iter().all(Option::is_none) {
            return self;
        }
        self.result = self
            .result
            .iter()
            .zip(votes)
            .filter(|(_, vote)| matches!(vote, Some(true)))
            .map(|(id, _)| *id)
            .collect();
        self.dedup();
        self
    }

    /// Unions the current result with a fresh filter over the full dataset.
    #[must_use]
    pub fn or_where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.or_where_op(field, QueryOperator::Equal, value)
    }

    /// Unions the current result with a fresh operator filter over the full
    /// dataset.
    #[must_use]
    pub fn or_where_op(mut self, field: &str, op: QueryOperator, value: impl Into<Value>) -> Self {
        let snapshot = std::mem::take(&mut self.result);
        self.result = self.full_dataset_ids();
        let mut narrowed = self.where_op(field, op, value);
        narrowed.result = union(snapshot, std::mem::take(&mut narrowed.result));
        narrowed
    }

    /// Unions the current result with a fresh predicate filter over the full
    /// dataset.
    #[must_use]
    pub fn or_where_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> Option<bool>,
    {
        let snapshot = std::mem::take(&mut self.result);
        self.result = self.full_dataset_ids();
        let mut narrowed = self.where_fn(predicate);
        narrowed.result = union(snapshot, std::mem::take(&mut narrowed.result));
        narrowed
    }

    // ── Ordering & slicing ───────────────────────────────────────

    /// Sorts the result by a field. Pairwise relational sort; equal keys keep
    /// no guaranteed order.
    #[must_use]
    pub fn order_by(self, field: &str, direction: Direction) -> Self {
        let field = field.to_string();
        self.order_by_key(
            move |record| record.get(&field).cloned().unwrap_or(Value::Null),
            direction,
        )
    }

    /// Sorts the result by a derived key.
    #[must_use]
    pub fn order_by_key<K>(mut self, key: K, direction: Direction) -> Self
    where
        K: Fn(&Record) -> Value,
    {
        let repo: &Repository = self.repo;
        let dataset = self.dataset.as_str();
        let mut keyed: Vec<(RecordId, Value)> = self
            .result
            .iter()
            .map(|id| {
                let k = repo
                    .find_in(dataset, *id)
                    .map_or(Value::Null, |record| key(record));
                (*id, k)
            })
            .collect();
        keyed.sort_unstable_by(|(_, a), (_, b)| {
            let ord = compare_values(a, b).unwrap_or(Ordering::Equal);
            match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        self.result = keyed.into_iter().map(|(id, _)| id).collect();
        self
    }

    /// Truncates the result to the first `n` records.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.result.truncate(n);
        self
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The current result set.
    #[must_use]
    pub fn get(&self) -> Vec<&Record> {
        self.result
            .iter()
            .filter_map(|id| self.repo.find_in(&self.dataset, *id))
            .collect()
    }

    /// The identities of the current result set.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        self.result.clone()
    }

    /// The first record of the result.
    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.result
            .first()
            .and_then(|id| self.repo.find_in(&self.dataset, *id))
    }

    /// The first `n` records of the result.
    #[must_use]
    pub fn first_n(&self, n: usize) -> Vec<&Record> {
        self.result
            .iter()
            .take(n)
            .filter_map(|id| self.repo.find_in(&self.dataset, *id))
            .collect()
    }

    /// The last record of the result.
    #[must_use]
    pub fn last(&self) -> Option<&Record> {
        self.result
            .last()
            .and_then(|id| self.repo.find_in(&self.dataset, *id))
    }

    /// The last `n` records of the result, in result order.
    #[must_use]
    pub fn last_n(&self, n: usize) -> Vec<&Record> {
        let start = self.result.len().saturating_sub(n);
        self.result[start..]
            .iter()
            .filter_map(|id| self.repo.find_in(&self.dataset, *id))
            .collect()
    }

    /// Number of records in the result.
    #[must_use]
    pub fn count(&self) -> usize {
        self.result.len()
    }

    /// True when the result is non-empty.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.result.is_empty()
    }

    // ── Bulk mutation ────────────────────────────────────────────

    /// Deep-merges a partial payload into every record in the result,
    /// running the full update pipeline (hooks included) per record.
    pub fn update(self, partial: Value) -> StoreResult<Vec<Record>> {
        let Query {
            repo,
            dataset,
            result,
        } = self;
        let mut updated = Vec::new();
        for id in result {
            if let Some(record) = repo.update_in(&dataset, id, partial.clone())? {
                updated.push(record);
            }
        }
        Ok(updated)
    }

    /// Deletes every record in the result from the dataset.
    pub fn delete(self) {
        let Query {
            repo,
            dataset,
            result,
        } = self;
        repo.delete_in(&dataset, DeleteSelector::Ids(result));
    }

    // ── Internals ────────────────────────────────────────────────

    fn retain(&mut self, pred: impl Fn(&Record) -> bool) {
        let repo: &Repository = self.repo;
        let dataset = self.dataset.as_str();
        self.result
            .retain(|id| repo.find_in(dataset, *id).is_some_and(&pred));
        self.dedup();
    }

    /// Result sets stay deduplicated by identity after every filter step.
    fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.result.retain(|id| seen.insert(*id));
    }

    fn full_dataset_ids(&self) -> Vec<RecordId> {
        self.repo
            .all_in(&self.dataset)
            .iter()
            .filter_map(Record::id)
            .collect()
    }
}

fn union(first: Vec<RecordId>, second: Vec<RecordId>) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for id in first.into_iter().chain(second) {
        if seen.insert(id) {
            merged.push(id);
        }
    }
    merged
}

fn ordering_is(field: Option<&Value>, operand: &Value, check: fn(Ordering) -> bool) -> bool {
    field
        .and_then(|v| compare_values(v, operand))
        .is_some_and(check)
}

/// Numeric-aware equality: numbers compare by value, everything else by
/// structural equality.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x == y;
    }
    a == b
}

/// Relational comparison over JSON values; incomparable kinds yield `None`.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Substring match for strings, element match for arrays.
fn value_contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        _ => false,
    }
}
