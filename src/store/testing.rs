//! In-process record service stub shared by store and engine tests.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::errors::Error;
use crate::store::api::{Order, RecordApi, SelectQuery};

/// Rows live in a vec; store ids are `row-<n>`.
pub(crate) struct StubApi {
    pub(crate) rows: Arc<Mutex<Vec<Value>>>,
    pub(crate) schema_calls: Arc<Mutex<Vec<String>>>,
    fail_schema_with: Option<String>,
}

impl StubApi {
    pub(crate) fn new() -> Self {
        StubApi {
            rows: Arc::new(Mutex::new(Vec::new())),
            schema_calls: Arc::new(Mutex::new(Vec::new())),
            fail_schema_with: None,
        }
    }

    pub(crate) fn failing_schema(message: &str) -> Self {
        StubApi {
            fail_schema_with: Some(message.to_string()),
            ..Self::new()
        }
    }
}

impl RecordApi for StubApi {
    fn insert(&self, record: &Value) -> Result<Value, Error> {
        let mut rows = self.rows.lock().unwrap();
        let mut row = record.clone();
        row["id"] = json!(format!("row-{}", rows.len() + 1));
        rows.push(row.clone());
        Ok(row)
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, Error> {
        let rows = self.rows.lock().unwrap();
        let mut result: Vec<Value> = rows
            .iter()
            .filter(|r| match &query.memory_type {
                Some(t) => r["memory_type"] == t.as_str(),
                None => true,
            })
            .filter(|r| match &query.content_query {
                Some(q) => r["content"]
                    .as_str()
                    .is_some_and(|c| c.to_lowercase().contains(&q.to_lowercase())),
                None => true,
            })
            .cloned()
            .collect();
        if query.order == Order::ImportanceDesc {
            result.sort_by_key(|r| std::cmp::Reverse(r["importance_score"].as_u64()));
        } else {
            result.reverse();
        }
        if query.limit > 0 {
            result.truncate(query.limit);
        }
        Ok(result)
    }

    fn update(&self, _id: &str, _patch: &Value) -> Result<(), Error> {
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool, Error> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r["id"] != id);
        Ok(rows.len() < before)
    }

    fn execute_schema(&self, statement: &str) -> Result<(), Error> {
        self.schema_calls
            .lock()
            .unwrap()
            .push(statement.to_string());
        match &self.fail_schema_with {
            Some(message) => Err(Error::Store(message.clone())),
            None => Ok(()),
        }
    }
}
