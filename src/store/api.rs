//! Generic request/response boundary to the remote record service.
//!
//! The store never speaks HTTP directly; it drives a [`RecordApi`] trait
//! object. [`HttpApi`] implements the boundary against a PostgREST-style
//! endpoint (one logical collection, query-string filters, an RPC channel
//! for additive schema statements). Tests substitute an in-process stub.

use serde_json::{json, Value};

use crate::errors::Error;

/// Result ordering for a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Newest first (`created_at` descending).
    #[default]
    CreatedAtDesc,
    /// Most important first (`importance_score` descending).
    ImportanceDesc,
}

/// A filtered read against the record collection.
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    /// Restrict to one memory type.
    pub memory_type: Option<String>,
    /// Only records created at or after this RFC 3339 instant.
    pub since: Option<String>,
    /// Substring match against record content.
    pub content_query: Option<String>,
    pub order: Order,
    pub limit: usize,
}

/// Insert/select/update/delete against one logical record collection, plus
/// an additive schema-evolution statement channel.
pub trait RecordApi: Send {
    /// Insert a record, returning the stored row (including the
    /// store-issued identifier).
    fn insert(&self, record: &Value) -> Result<Value, Error>;

    /// Filtered read returning raw rows.
    fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, Error>;

    /// Patch one record by store id.
    fn update(&self, id: &str, patch: &Value) -> Result<(), Error>;

    /// Delete one record by store id; false if it did not exist.
    fn delete(&self, id: &str) -> Result<bool, Error>;

    /// Run one schema-evolution statement.
    fn execute_schema(&self, statement: &str) -> Result<(), Error>;
}

/// PostgREST-style HTTP implementation of the record boundary.
pub struct HttpApi {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    collection: String,
}

impl HttpApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        HttpApi {
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
            base_url: {
                let url: String = base_url.into();
                url.trim_end_matches('/').to_string()
            },
            api_key: api_key.into(),
            collection: collection.into(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.collection)
    }

    fn with_auth(&self, request: ureq::Request) -> ureq::Request {
        request
            .set("apikey", &self.api_key)
            .set("Authorization", &format!("Bearer {}", self.api_key))
    }

    fn body_of(response: ureq::Response) -> String {
        response.into_string().unwrap_or_default()
    }
}

impl RecordApi for HttpApi {
    fn insert(&self, record: &Value) -> Result<Value, Error> {
        let request = self
            .with_auth(self.agent.post(&self.collection_url()))
            .set("Prefer", "return=representation");

        let rows: Vec<Value> = match request.send_json(record.clone()) {
            Ok(response) => response.into_json()?,
            Err(ureq::Error::Status(code, response)) => {
                return Err(Error::Store(format!(
                    "insert failed: HTTP {code}: {}",
                    Self::body_of(response)
                )))
            }
            Err(e) => return Err(e.into()),
        };

        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Store("insert returned no representation".into()))
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Value>, Error> {
        let mut request = self
            .with_auth(self.agent.get(&self.collection_url()))
            .query("select", "*");

        if let Some(memory_type) = &query.memory_type {
            request = request.query("memory_type", &format!("eq.{memory_type}"));
        }
        if let Some(since) = &query.since {
            request = request.query("created_at", &format!("gte.{since}"));
        }
        if let Some(content_query) = &query.content_query {
            request = request.query("content", &format!("ilike.*{content_query}*"));
        }
        request = match query.order {
            Order::CreatedAtDesc => request.query("order", "created_at.desc"),
            Order::ImportanceDesc => request.query("order", "importance_score.desc"),
        };
        if query.limit > 0 {
            request = request.query("limit", &query.limit.to_string());
        }

        match request.call() {
            Ok(response) => Ok(response.into_json()?),
            Err(ureq::Error::Status(code, response)) => Err(Error::Store(format!(
                "select failed: HTTP {code}: {}",
                Self::body_of(response)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, id: &str, patch: &Value) -> Result<(), Error> {
        let request = self
            .with_auth(self.agent.request("PATCH", &self.collection_url()))
            .query("id", &format!("eq.{id}"));

        match request.send_json(patch.clone()) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(Error::Store(format!(
                "update failed: HTTP {code}: {}",
                Self::body_of(response)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &str) -> Result<bool, Error> {
        let request = self
            .with_auth(self.agent.delete(&self.collection_url()))
            .query("id", &format!("eq.{id}"))
            .set("Prefer", "return=representation");

        match request.call() {
            Ok(response) => {
                let rows: Vec<Value> = response.into_json()?;
                Ok(!rows.is_empty())
            }
            Err(ureq::Error::Status(code, response)) => Err(Error::Store(format!(
                "delete failed: HTTP {code}: {}",
                Self::body_of(response)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn execute_schema(&self, statement: &str) -> Result<(), Error> {
        let url = format!("{}/rest/v1/rpc/execute_sql", self.base_url);
        let request = self.with_auth(self.agent.post(&url));

        match request.send_json(json!({ "sql": statement })) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, response)) => Err(Error::Store(format!(
                "schema statement failed: HTTP {code}: {}",
                Self::body_of(response)
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
