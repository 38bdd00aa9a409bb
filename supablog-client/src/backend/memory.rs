//! In-memory implementation of the backend boundary.
//!
//! Interprets query descriptors over a plain map. Useful as a substitute in
//! tests and local tooling; data is lost on process exit. The slug unique
//! constraint is enforced here the way the hosted schema enforces it.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Error;
use crate::query::{Predicate, QueryDescriptor};

use super::Backend;

#[derive(Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<Uuid, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(row: &Value, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Eq { column, value } => row
                .get(column)
                .and_then(Value::as_str)
                .map(|v| v == value)
                .unwrap_or(false),
            Predicate::EqBool { column, value } => {
                row.get(column).and_then(Value::as_bool).unwrap_or(false) == *value
            }
            Predicate::Search { columns, needle } => {
                let needle = needle.to_lowercase();
                columns.iter().any(|column| {
                    row.get(*column)
                        .and_then(Value::as_str)
                        .map(|v| v.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
            Predicate::HasTag { column, tag } => row
                .get(column)
                .and_then(Value::as_array)
                .map(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
                .unwrap_or(false),
        }
    }

    /// Column comparison: integers numerically, timestamps chronologically,
    /// everything else as text.
    fn compare(a: &Value, b: &Value) -> Ordering {
        if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
            return x.cmp(&y);
        }
        if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
            if let (Ok(x), Ok(y)) = (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                return x.cmp(&y);
            }
            return x.cmp(y);
        }
        Ordering::Equal
    }

    fn row_id(row: &Value) -> Option<Uuid> {
        row.get("id")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, query: &QueryDescriptor) -> Result<Vec<Value>, Error> {
        let rows = self.rows.read().await;
        let mut matched: Vec<Value> = rows
            .values()
            .filter(|row| query.predicates.iter().all(|p| Self::matches(row, p)))
            .cloned()
            .collect();

        matched.sort_by(|a, b| {
            let ordering = Self::compare(
                a.get(query.order_column).unwrap_or(&Value::Null),
                b.get(query.order_column).unwrap_or(&Value::Null),
            );
            if query.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }

    async fn insert(&self, _table: &str, row: Value) -> Result<Value, Error> {
        let id = Self::row_id(&row)
            .ok_or_else(|| Error::MalformedRecord("insert row is missing id".to_string()))?;
        let mut rows = self.rows.write().await;
        if let Some(slug) = row.get("slug").and_then(Value::as_str) {
            let taken = rows
                .values()
                .any(|r| r.get("slug").and_then(Value::as_str) == Some(slug));
            if taken {
                return Err(Error::Conflict(format!("slug '{slug}' already exists")));
            }
        }
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, _table: &str, id: Uuid, patch: Value) -> Result<Option<Value>, Error> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, _table: &str, id: Uuid) -> Result<bool, Error> {
        let mut rows = self.rows.write().await;
        Ok(rows.remove(&id).is_some())
    }
}
