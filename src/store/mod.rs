//! Persistence and retrieval over the remote record service.
//!
//! The store is best-effort by design: every public operation converts
//! failures into a neutral result (false / empty list) after logging, so the
//! capture pipeline never halts on a storage problem. Callers that need to
//! distinguish "no data" from "failed" use the typed `try_*` siblings.

pub mod api;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::errors::Error;
use crate::memory::Memory;
use api::{Order, RecordApi, SelectQuery};

/// Upper bound on memories fetched for a backup.
const BACKUP_LIMIT: usize = 10_000;

/// Additive schema migrations, applied in order on every startup.
///
/// Each statement is idempotent (`ADD COLUMN IF NOT EXISTS`); re-running the
/// full list against an up-to-date collection is a no-op.
const MIGRATIONS: &[&str] = &[
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS memory_type VARCHAR(50) DEFAULT 'general'",
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS importance_score INTEGER DEFAULT 0",
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS tags TEXT[]",
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS related_memories JSONB",
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS file_references TEXT[]",
    "ALTER TABLE {collection} ADD COLUMN IF NOT EXISTS memory_metadata JSONB",
];

/// Durable memory persistence against a remote record collection.
pub struct MemoryStore {
    api: Box<dyn RecordApi>,
    collection: String,
    cache: HashMap<String, Memory>,
}

impl MemoryStore {
    /// Construct the store and ensure the extended schema.
    ///
    /// Schema upkeep is deliberately tolerant: "already exists" class errors
    /// are expected and skipped; any other per-statement failure is logged
    /// as a warning and does not abort initialization.
    pub fn new(api: Box<dyn RecordApi>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let store = MemoryStore {
            api,
            collection,
            cache: HashMap::new(),
        };
        store.ensure_schema();
        store
    }

    fn ensure_schema(&self) {
        for template in MIGRATIONS {
            let statement = template.replace("{collection}", &self.collection);
            match self.api.execute_schema(&statement) {
                Ok(()) => debug!(statement, "schema statement applied"),
                Err(e) if is_already_exists(&e) => {
                    debug!(statement, "schema element already present")
                }
                Err(e) => warn!(statement, error = %e, "schema statement failed"),
            }
        }
    }

    /// Persist a memory, assigning the store-issued id back onto it.
    ///
    /// Returns false after logging on any failure; never panics.
    pub fn save_memory(&mut self, memory: &mut Memory) -> bool {
        match self.try_save(memory) {
            Ok(id) => {
                info!(id, "memory saved");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to save memory");
                false
            }
        }
    }

    /// Typed variant of [`save_memory`](Self::save_memory).
    pub fn try_save(&mut self, memory: &mut Memory) -> Result<String, Error> {
        let row = self.api.insert(&to_record(memory))?;
        let id = row
            .get("id")
            .map(value_to_id)
            .ok_or_else(|| Error::Store("insert reply missing id".into()))?;

        memory.id = id.clone();
        self.cache.insert(id.clone(), memory.clone());
        Ok(id)
    }

    /// Filtered, newest-first read. Empty on failure, after logging.
    pub fn load_memories(
        &mut self,
        limit: usize,
        memory_type: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Vec<Memory> {
        match self.try_load(limit, memory_type, since) {
            Ok(memories) => {
                info!(count = memories.len(), "memories loaded");
                memories
            }
            Err(e) => {
                error!(error = %e, "failed to load memories");
                Vec::new()
            }
        }
    }

    /// Typed variant of [`load_memories`](Self::load_memories).
    pub fn try_load(
        &mut self,
        limit: usize,
        memory_type: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Memory>, Error> {
        let query = SelectQuery {
            memory_type: memory_type.map(str::to_string),
            since: since.map(|t| t.to_rfc3339()),
            content_query: None,
            order: Order::CreatedAtDesc,
            limit,
        };

        let rows = self.api.select(&query)?;
        let memories = self.rows_to_memories(rows);
        Ok(memories)
    }

    /// Content match ordered by importance. Empty on failure, after logging.
    pub fn search_memories(&mut self, query: &str, limit: usize) -> Vec<Memory> {
        match self.try_search(query, limit) {
            Ok(memories) => {
                info!(count = memories.len(), query, "search complete");
                memories
            }
            Err(e) => {
                error!(error = %e, query, "search failed");
                Vec::new()
            }
        }
    }

    /// Typed variant of [`search_memories`](Self::search_memories).
    pub fn try_search(&mut self, query: &str, limit: usize) -> Result<Vec<Memory>, Error> {
        let select = SelectQuery {
            memory_type: None,
            since: None,
            content_query: Some(query.to_string()),
            order: Order::ImportanceDesc,
            limit,
        };

        let rows = self.api.select(&select)?;
        Ok(self.rows_to_memories(rows))
    }

    /// Write a `{timestamp, count, memories}` JSON document to `path`.
    ///
    /// Returns false after logging on any failure.
    pub fn backup_memories(&mut self, path: &Path) -> bool {
        match self.try_backup(path) {
            Ok(count) => {
                info!(path = %path.display(), count, "backup complete");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "backup failed");
                false
            }
        }
    }

    /// Typed variant of [`backup_memories`](Self::backup_memories).
    pub fn try_backup(&mut self, path: &Path) -> Result<usize, Error> {
        let memories = self.try_load(BACKUP_LIMIT, None, None)?;

        let document = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "count": memories.len(),
            "memories": memories,
        });

        std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
        Ok(memories.len())
    }

    /// Purge one record via the generic delete. The engine itself never
    /// relies on deletion; this exists for callers that do.
    pub fn delete_memory(&mut self, id: &str) -> bool {
        match self.api.delete(id) {
            Ok(deleted) => {
                self.cache.remove(id);
                deleted
            }
            Err(e) => {
                error!(id, error = %e, "failed to delete memory");
                false
            }
        }
    }

    /// Look up a memory in the local cache.
    pub fn cached(&self, id: &str) -> Option<&Memory> {
        self.cache.get(id)
    }

    fn rows_to_memories(&mut self, rows: Vec<Value>) -> Vec<Memory> {
        let mut memories = Vec::with_capacity(rows.len());
        for row in rows {
            match from_record(&row) {
                Some(memory) => {
                    self.cache.insert(memory.id.clone(), memory.clone());
                    memories.push(memory);
                }
                None => warn!("skipping malformed store row"),
            }
        }
        memories
    }
}

fn is_already_exists(error: &Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("already exists") || message.contains("duplicate column")
}

/// Serialize a memory into the remote record shape.
fn to_record(memory: &Memory) -> Value {
    let file_references: Vec<&str> = memory.file_path.as_deref().into_iter().collect();
    json!({
        "content": memory.content,
        "memory_type": memory.memory_type,
        "importance_score": memory.importance_score,
        "tags": memory.tags,
        "related_memories": { "ids": memory.related_memories },
        "file_references": file_references,
        "memory_metadata": memory.metadata,
        "created_at": memory.timestamp.to_rfc3339(),
    })
}

/// Reconstruct a memory from a remote row, tolerating absent columns.
fn from_record(row: &Value) -> Option<Memory> {
    let id = row.get("id").map(value_to_id)?;
    let content = row.get("content")?.as_str()?.to_string();

    let timestamp = row
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let mut memory = Memory::with_timestamp(content, "general", timestamp);
    memory.id = id;

    if let Some(memory_type) = row.get("memory_type").and_then(Value::as_str) {
        memory.memory_type = memory_type.to_string();
    }
    if let Some(score) = row.get("importance_score").and_then(Value::as_u64) {
        memory.importance_score = score.min(100) as u8;
    }
    if let Some(tags) = row.get("tags").and_then(Value::as_array) {
        memory.tags = tags
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    if let Some(ids) = row
        .get("related_memories")
        .and_then(|r| r.get("ids"))
        .and_then(Value::as_array)
    {
        memory.related_memories = ids
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    if let Some(references) = row.get("file_references").and_then(Value::as_array) {
        memory.file_path = references
            .first()
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    if let Some(metadata) = row.get("memory_metadata").and_then(Value::as_object) {
        memory.metadata = metadata.clone();
    }

    Some(memory)
}

/// Store ids may arrive as strings or numbers; normalize to a string.
fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::testing::StubApi;
    use api::HttpApi;
    use std::sync::Arc;

    fn sample_memory(content: &str) -> Memory {
        let mut m = Memory::new(content, "file");
        m.importance_score = 60;
        m.tags.insert("rust".to_string());
        m.file_path = Some("src/lib.rs".to_string());
        m
    }

    #[test]
    fn test_schema_runs_all_migrations_on_construction() {
        let api = StubApi::new();
        let calls = Arc::clone(&api.schema_calls);
        let _store = MemoryStore::new(Box::new(api), "captures");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), MIGRATIONS.len());
        // Collection name substituted into every statement
        assert!(calls.iter().all(|s| s.contains("ALTER TABLE captures")));
        assert!(calls.iter().all(|s| s.contains("IF NOT EXISTS")));
    }

    #[test]
    fn test_schema_failures_do_not_abort() {
        let api = StubApi::failing_schema("relation error: column already exists");
        let mut store = MemoryStore::new(Box::new(api), "memories");

        // Store still operates after every migration statement "failed"
        let mut memory = sample_memory("post-migration save");
        assert!(store.save_memory(&mut memory));
    }

    #[test]
    fn test_schema_unexpected_failures_tolerated_too() {
        let api = StubApi::failing_schema("permission denied for rpc");
        let mut store = MemoryStore::new(Box::new(api), "memories");
        assert!(store.load_memories(10, None, None).is_empty());
    }

    #[test]
    fn test_save_assigns_store_id_and_caches() {
        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut memory = sample_memory("first");
        let original_id = memory.id.clone();

        assert!(store.save_memory(&mut memory));
        assert_ne!(memory.id, original_id);
        assert_eq!(memory.id, "row-1");
        assert!(store.cached("row-1").is_some());
    }

    #[test]
    fn test_load_round_trips_fields() {
        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut memory = sample_memory("round trip content");
        memory.related_memories = vec!["mem_a".to_string(), "mem_b".to_string()];
        memory
            .metadata
            .insert("commit_hash".into(), json!("abc123"));
        store.save_memory(&mut memory);

        let loaded = store.load_memories(10, None, None);
        assert_eq!(loaded.len(), 1);
        let m = &loaded[0];
        assert_eq!(m.content, "round trip content");
        assert_eq!(m.memory_type, "file");
        assert_eq!(m.importance_score, 60);
        assert!(m.tags.contains("rust"));
        assert_eq!(m.related_memories, vec!["mem_a", "mem_b"]);
        assert_eq!(m.file_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(m.metadata["commit_hash"], "abc123");
    }

    #[test]
    fn test_load_filters_by_type() {
        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut file_memory = sample_memory("a file");
        let mut git_memory = Memory::new("a commit", "git");
        store.save_memory(&mut file_memory);
        store.save_memory(&mut git_memory);

        let git_only = store.load_memories(10, Some("git"), None);
        assert_eq!(git_only.len(), 1);
        assert_eq!(git_only[0].memory_type, "git");
    }

    #[test]
    fn test_search_orders_by_importance() {
        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut low = Memory::new("needle in text", "general");
        low.importance_score = 30;
        let mut high = Memory::new("another needle here", "general");
        high.importance_score = 90;
        store.save_memory(&mut low);
        store.save_memory(&mut high);

        let found = store.search_memories("needle", 10);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].importance_score, 90);
    }

    #[test]
    fn test_backup_writes_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("backup.json");

        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut m1 = sample_memory("one");
        let mut m2 = sample_memory("two");
        store.save_memory(&mut m1);
        store.save_memory(&mut m2);

        assert!(store.backup_memories(&path));

        let document: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(document["count"], 2);
        assert_eq!(document["memories"].as_array().unwrap().len(), 2);
        for record in document["memories"].as_array().unwrap() {
            assert!(record["id"].is_string());
            assert!(record["content"].is_string());
            let ts = record["timestamp"].as_str().unwrap();
            assert!(DateTime::parse_from_rfc3339(ts).is_ok());
        }
    }

    #[test]
    fn test_delete_memory() {
        let mut store = MemoryStore::new(Box::new(StubApi::new()), "memories");
        let mut memory = sample_memory("to purge");
        store.save_memory(&mut memory);

        assert!(store.delete_memory(&memory.id));
        assert!(store.cached(&memory.id).is_none());
        assert!(!store.delete_memory("row-999"));
    }

    #[test]
    fn test_unreachable_store_is_isolated() {
        let api = HttpApi::new("http://127.0.0.1:1", "key", "memories");
        let mut store = MemoryStore::new(Box::new(api), "memories");

        let mut memory = sample_memory("never stored");
        assert!(!store.save_memory(&mut memory));
        assert!(store.load_memories(10, None, None).is_empty());
        assert!(store.search_memories("anything", 10).is_empty());
    }

    #[test]
    fn test_from_record_tolerates_missing_columns() {
        let row = json!({ "id": 42, "content": "bare row", "created_at": "2024-01-01T00:00:00+00:00" });
        let memory = from_record(&row).unwrap();
        assert_eq!(memory.id, "42");
        assert_eq!(memory.memory_type, "general");
        assert_eq!(memory.importance_score, 0);
        assert!(memory.tags.is_empty());
    }

    #[test]
    fn test_from_record_rejects_contentless_rows() {
        assert!(from_record(&json!({ "id": 1 })).is_none());
        assert!(from_record(&json!({ "content": "no id" })).is_none());
    }
}
