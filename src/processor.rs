//! Memory enrichment: tag extraction, importance scoring and relation search.

use std::collections::HashSet;

use regex::Regex;
use tracing::debug;

use crate::enrich::{Enricher, NoopEnricher, ENRICHMENT_EXCERPT};
use crate::memory::{clamp_importance, Memory, MAX_RELATED};

/// Language and technology keywords scanned for in memory content.
const CONTENT_VOCABULARY: &[&str] = &[
    "rust",
    "python",
    "javascript",
    "typescript",
    "sql",
    "html",
    "css",
    "api",
    "database",
    "cli",
    "async",
    "ai",
    "chat",
    "automation",
];

/// Severity keywords worth +5 importance each.
const SEVERITY_KEYWORDS: &[&str] = &["error", "bug", "fix", "implement", "api", "database"];

/// Maximum identifier tags extracted per pattern kind.
const MAX_IDENTIFIERS: usize = 3;

/// Jaccard similarity threshold for content-based relations.
const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Minimum shared tags for a tag-based relation.
const SHARED_TAG_THRESHOLD: usize = 2;

/// Enriches memories and discovers relations against a candidate pool.
pub struct Processor {
    function_pattern: Regex,
    type_pattern: Regex,
    enricher: Box<dyn Enricher>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Processor with enrichment unconfigured (fully offline).
    pub fn new() -> Self {
        Self::with_enricher(Box::new(NoopEnricher))
    }

    /// Processor with an injected enrichment capability.
    pub fn with_enricher(enricher: Box<dyn Enricher>) -> Self {
        // Both patterns are literals; compilation cannot fail.
        Processor {
            function_pattern: Regex::new(r"(?:fn|def|function)\s+(\w+)")
                .expect("valid function pattern"),
            type_pattern: Regex::new(r"(?:class|struct|enum|trait)\s+(\w+)")
                .expect("valid type pattern"),
            enricher,
        }
    }

    /// Enrich a memory in place: tags, importance, optional LLM suggestions.
    ///
    /// Tagging is idempotent (the tag set deduplicates); importance is
    /// monotone and may rise again on reprocessing, clamped at 100.
    /// Enrichment failures are swallowed; the memory keeps its
    /// pre-enrichment values for that step.
    pub fn process(&self, memory: &mut Memory) {
        for tag in self.extract_content_tags(&memory.content) {
            memory.tags.insert(tag);
        }

        memory.importance_score = self.recalculate_importance(memory);

        if self.enricher.enabled() {
            let excerpt: String = memory.content.chars().take(ENRICHMENT_EXCERPT).collect();
            match self.enricher.enrich(&excerpt) {
                Ok(enrichment) => {
                    for keyword in enrichment.keywords {
                        let keyword = keyword.trim().to_lowercase();
                        if keyword.len() > 2 {
                            memory.tags.insert(keyword);
                        }
                    }
                    if let Some(memory_type) = enrichment.memory_type {
                        memory.memory_type = memory_type;
                    }
                    if let Some(suggested) = enrichment.importance {
                        // Only ever raises the score
                        memory.importance_score =
                            memory.importance_score.max(suggested.min(100));
                    }
                }
                Err(e) => debug!(error = %e, "enrichment failed, continuing unenriched"),
            }
        }
    }

    /// Find up to [`MAX_RELATED`] related memory ids among `candidates`.
    ///
    /// A candidate is accepted on two or more shared tags, or a content
    /// word-set Jaccard similarity above 0.5. This is a threshold filter in
    /// candidate-iteration order, not a nearest-neighbor ranking, and the
    /// relation it yields is not symmetric.
    pub fn find_related(&self, memory: &Memory, candidates: &[Memory]) -> Vec<String> {
        let words = tokenize(&memory.content);
        let mut related = Vec::new();

        for candidate in candidates {
            if candidate.id == memory.id {
                continue;
            }

            let shared_tags = memory.tags.intersection(&candidate.tags).count();
            if shared_tags >= SHARED_TAG_THRESHOLD
                || jaccard_similarity(&words, &tokenize(&candidate.content))
                    > SIMILARITY_THRESHOLD
            {
                related.push(candidate.id.clone());
                if related.len() >= MAX_RELATED {
                    break;
                }
            }
        }

        related
    }

    /// Vocabulary hits plus up to 3 function-like and 3 type-like
    /// identifiers; tokens of length <= 2 are dropped.
    fn extract_content_tags(&self, content: &str) -> Vec<String> {
        let lower = content.to_lowercase();
        let mut tags: Vec<String> = CONTENT_VOCABULARY
            .iter()
            .filter(|word| lower.contains(*word))
            .map(|word| word.to_string())
            .collect();

        for pattern in [&self.function_pattern, &self.type_pattern] {
            tags.extend(
                pattern
                    .captures_iter(content)
                    .take(MAX_IDENTIFIERS)
                    .map(|c| c[1].to_lowercase()),
            );
        }

        tags.retain(|tag| tag.len() > 2);
        tags
    }

    /// Current score, +10 for long content, +5 per severity keyword,
    /// +2 per tag, clamped to 100.
    fn recalculate_importance(&self, memory: &Memory) -> u8 {
        let mut score = u32::from(memory.importance_score);
        let lower = memory.content.to_lowercase();

        if memory.content.chars().count() > 1000 {
            score += 10;
        }

        for keyword in SEVERITY_KEYWORDS {
            if lower.contains(keyword) {
                score += 5;
            }
        }

        score += 2 * memory.tags.len() as u32;

        clamp_importance(score)
    }
}

/// Lower-cased whitespace-tokenized word set.
fn tokenize(content: &str) -> HashSet<String> {
    content
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// `|A ∩ B| / |A ∪ B|`, with either side empty treated as 0.0.
fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}
