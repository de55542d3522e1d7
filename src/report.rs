//! Aggregate statistics over captured memories.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::memory::Memory;

/// How many tags the report keeps, most frequent first.
const TOP_TAG_COUNT: usize = 10;

/// Three-bucket importance histogram.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ImportanceDistribution {
    /// Score >= 80.
    pub high: usize,
    /// Score in [50, 80).
    pub medium: usize,
    /// Score < 50.
    pub low: usize,
}

/// Capture counts over trailing windows.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RecentActivity {
    pub last_24h: usize,
    pub last_week: usize,
    pub last_month: usize,
}

/// Statistics snapshot over a set of loaded memories.
#[derive(Debug, Default, Serialize)]
pub struct MemoryReport {
    pub total_memories: usize,
    pub memory_types: HashMap<String, usize>,
    pub importance_distribution: ImportanceDistribution,
    pub recent_activity: RecentActivity,
    /// Top tags as (tag, count), most frequent first, at most 10.
    pub top_tags: Vec<(String, usize)>,
    pub file_types: HashMap<String, usize>,
}

impl MemoryReport {
    /// Build a report over `memories`, with recency measured from `now`.
    pub fn build(memories: &[Memory], now: DateTime<Utc>) -> Self {
        let mut report = MemoryReport {
            total_memories: memories.len(),
            ..MemoryReport::default()
        };
        let mut tag_counts: HashMap<String, usize> = HashMap::new();

        for memory in memories {
            *report
                .memory_types
                .entry(memory.memory_type.clone())
                .or_default() += 1;

            if memory.importance_score >= 80 {
                report.importance_distribution.high += 1;
            } else if memory.importance_score >= 50 {
                report.importance_distribution.medium += 1;
            } else {
                report.importance_distribution.low += 1;
            }

            let age = now.signed_duration_since(memory.timestamp);
            if age <= Duration::hours(24) {
                report.recent_activity.last_24h += 1;
            }
            if age <= Duration::days(7) {
                report.recent_activity.last_week += 1;
            }
            if age <= Duration::days(30) {
                report.recent_activity.last_month += 1;
            }

            for tag in &memory.tags {
                *tag_counts.entry(tag.clone()).or_default() += 1;
            }

            if let Some(extension) = memory
                .file_path
                .as_deref()
                .map(Path::new)
                .and_then(|p| p.extension())
                .and_then(|e| e.to_str())
            {
                *report.file_types.entry(extension.to_string()).or_default() += 1;
            }
        }

        let mut tags: Vec<(String, usize)> = tag_counts.into_iter().collect();
        // Count descending, tag name as tiebreak for stable output
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags.truncate(TOP_TAG_COUNT);
        report.top_tags = tags;

        report
    }
}
