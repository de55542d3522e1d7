//! The `Memory` entity: one captured observation from the workspace.
//!
//! A memory is created unenriched by the collector, mutated in place by the
//! processor (tags, importance, relations) and finally handed to the store,
//! which assigns the store-issued identifier on successful insert.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum importance score after clamping.
pub const MAX_IMPORTANCE: u8 = 100;

/// Maximum number of related memory ids per record.
pub const MAX_RELATED: usize = 5;

/// A single captured observation with enrichment metadata.
///
/// `memory_type` is an open string tag ("general", "code", "chat", "git",
/// "file", "documentation", ...), not a closed set; callers may extend it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub content: String,
    pub memory_type: String,

    /// Heuristic relevance in [0, 100]; bonus rules only ever raise it.
    pub importance_score: u8,
    pub tags: BTreeSet<String>,

    /// Source-event time, or capture time when unknown.
    pub timestamp: DateTime<Utc>,
    pub file_path: Option<String>,

    /// At most [`MAX_RELATED`] ids, candidate-iteration order, never self.
    pub related_memories: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Memory {
    /// Create an unenriched memory with a generated id and capture-time timestamp.
    pub fn new(content: impl Into<String>, memory_type: impl Into<String>) -> Self {
        Self::with_timestamp(content, memory_type, Utc::now())
    }

    /// Create an unenriched memory carrying an explicit source-event time.
    pub fn with_timestamp(
        content: impl Into<String>,
        memory_type: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        let id = generate_id(&content, timestamp);
        Memory {
            id,
            content,
            memory_type: memory_type.into(),
            importance_score: 0,
            tags: BTreeSet::new(),
            timestamp,
            file_path: None,
            related_memories: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Raise the importance score, clamping at [`MAX_IMPORTANCE`].
    ///
    /// Bonuses are cumulative with a single final clamp, so the marginal
    /// value of further bonuses is zero once saturated.
    pub fn raise_importance(&mut self, bonus: u32) {
        self.importance_score = clamp_importance(u32::from(self.importance_score) + bonus);
    }
}

/// Clamp an accumulated score into the `[0, 100]` importance range.
pub fn clamp_importance(score: u32) -> u8 {
    score.min(u32::from(MAX_IMPORTANCE)) as u8
}

/// Generate a memory id: `mem_<timestamp>_<8 hex chars of sha256(content)>`.
///
/// The id mixes capture time with a content digest, so identical content
/// captured twice gets distinct ids. It is a stable handle, not a dedup key.
pub fn generate_id(content: &str, timestamp: DateTime<Utc>) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("mem_{}_{}", timestamp.format("%Y%m%d_%H%M%S"), hex)
}
