//! The capture engine: scan loop, bulk importer and report generation.
//!
//! Collection, processing and storage run strictly sequentially, one memory
//! at a time, inside a single cooperative loop. The only shared mutable
//! resource is the remote store, treated as append-mostly. Cancellation is
//! a flag checked once per iteration: in-flight work always completes, and
//! the loop exits after its current sleep.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::collector::Collector;
use crate::memory::Memory;
use crate::processor::Processor;
use crate::report::MemoryReport;
use crate::store::MemoryStore;

/// How many existing memories seed the relation-search candidate pool.
const CANDIDATE_POOL: usize = 1000;

/// Fixed sleep after a failed scan iteration.
const ERROR_BACKOFF: StdDuration = StdDuration::from_secs(60);

/// Files swept by the bulk importer when present in the workspace.
const IMPORT_FILES: &[&str] = &[
    "README.md",
    "Cargo.toml",
    "pyproject.toml",
    "package.json",
    "requirements.txt",
    "src/main.rs",
    "src/lib.rs",
    "app.py",
];

/// Commit history window for the bulk importer (one week).
const IMPORT_GIT_HOURS: i64 = 24 * 7;

/// Counters reported by the bulk importer.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub files: usize,
    pub commits: usize,
    pub saved: usize,
}

/// Clears the running flag of a monitoring loop from another thread.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request a cooperative stop; the loop exits after its current sleep.
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Ties collector, processor and store into the three operating modes:
/// continuous scan, one-shot import seeding, and reporting.
pub struct CaptureEngine {
    collector: Collector,
    processor: Processor,
    store: MemoryStore,
    watermark: DateTime<Utc>,
    scan_interval: StdDuration,
    git_since_hours: i64,
    running: Arc<AtomicBool>,
}

impl CaptureEngine {
    /// Assemble an engine. The file-change watermark starts at engine
    /// creation time; use [`import_existing_memories`](Self::import_existing_memories)
    /// to seed a cold store.
    pub fn new(collector: Collector, processor: Processor, store: MemoryStore) -> Self {
        CaptureEngine {
            collector,
            processor,
            store,
            watermark: Utc::now(),
            scan_interval: StdDuration::from_secs(300),
            git_since_hours: 24,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_scan_interval(mut self, interval: StdDuration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn set_scan_interval(&mut self, interval: StdDuration) {
        self.scan_interval = interval;
    }

    pub fn with_git_window(mut self, hours: i64) -> Self {
        self.git_since_hours = hours;
        self
    }

    /// Direct store access for callers layered on top (search, backup).
    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    /// One scan iteration: collect, process, relate, save.
    ///
    /// Returns the number of memories saved. The watermark advances to the
    /// scan start only when file collection succeeded, so a failed scan is
    /// retried over the same window.
    pub fn run_scan(&mut self) -> Result<usize, crate::errors::Error> {
        let scan_start = Utc::now();
        info!("starting memory scan");

        let pool = self.store.load_memories(CANDIDATE_POOL, None, None);

        let mut new_memories = self.collector.collect_file_changes(self.watermark)?;
        match self.collector.collect_git_history(self.git_since_hours) {
            Ok(mut commits) => new_memories.append(&mut commits),
            Err(e) => warn!(error = %e, "git history unavailable, continuing without commits"),
        }
        info!(count = new_memories.len(), "collected new memories");

        let mut saved = 0;
        for mut memory in new_memories {
            self.processor.process(&mut memory);
            memory.related_memories = self.processor.find_related(&memory, &pool);
            if self.store.save_memory(&mut memory) {
                saved += 1;
            }
        }

        self.watermark = scan_start;
        Ok(saved)
    }

    /// Run the continuous scan loop until stopped.
    ///
    /// Blocks the calling thread. Iteration errors are logged and retried
    /// after a fixed backoff rather than terminating the loop.
    pub fn start_monitoring(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        info!(interval = ?self.scan_interval, "capture engine started");

        while self.running.load(Ordering::SeqCst) {
            match self.run_scan() {
                Ok(saved) => {
                    info!(saved, "scan iteration complete");
                    std::thread::sleep(self.scan_interval);
                }
                Err(e) => {
                    error!(error = %e, "scan iteration failed");
                    std::thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        info!("capture engine stopped");
    }

    /// Clear the running flag; the loop observes it on its next iteration.
    pub fn stop_monitoring(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Handle for stopping a loop running on another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    /// One-shot cold-start seeding: sweep the important-file allow-list and
    /// a week of commit history through the same process-then-save path.
    pub fn import_existing_memories(&mut self) -> ImportStats {
        info!("starting bulk memory import");
        let mut stats = ImportStats::default();

        let mut paths: Vec<std::path::PathBuf> = IMPORT_FILES
            .iter()
            .map(|rel| self.collector.workspace().join(rel))
            .collect();
        paths.extend(docs_markdown(self.collector.workspace()));

        for path in paths {
            if !path.is_file() {
                continue;
            }
            let Some(memory) = import_file_memory(&path) else {
                continue;
            };
            stats.files += 1;
            if self.process_and_save(memory) {
                stats.saved += 1;
            }
        }

        match self.collector.collect_git_history(IMPORT_GIT_HOURS) {
            Ok(commits) => {
                stats.commits = commits.len();
                for memory in commits {
                    if self.process_and_save(memory) {
                        stats.saved += 1;
                    }
                }
            }
            Err(e) => warn!(error = %e, "git history unavailable for import"),
        }

        info!(
            files = stats.files,
            commits = stats.commits,
            saved = stats.saved,
            "bulk import complete"
        );
        stats
    }

    fn process_and_save(&mut self, mut memory: Memory) -> bool {
        self.processor.process(&mut memory);
        self.store.save_memory(&mut memory)
    }

    /// Statistics over up to 1000 stored memories.
    pub fn generate_memory_report(&mut self) -> MemoryReport {
        let memories = self.store.load_memories(CANDIDATE_POOL, None, None);
        MemoryReport::build(&memories, Utc::now())
    }
}

/// Markdown files directly under `docs/`, when the directory exists.
fn docs_markdown(workspace: &Path) -> Vec<std::path::PathBuf> {
    let docs = workspace.join("docs");
    let Ok(entries) = std::fs::read_dir(docs) else {
        return Vec::new();
    };
    let mut paths: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    paths.sort();
    paths
}

/// Build an import memory for one allow-listed file.
fn import_file_memory(path: &Path) -> Option<Memory> {
    let size = std::fs::metadata(path).ok()?.len();
    let content = crate::collector::read_file_capped(path, size)?;
    let name = path.file_name()?.to_string_lossy();

    let mut memory = Memory::new(format!("Imported file: {name}\n\n{content}"), "file");
    memory.importance_score = 80;
    memory.tags.insert("import".to_string());
    memory.tags.insert("existing".to_string());
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        memory.tags.insert(ext.to_lowercase());
    }
    memory.file_path = Some(path.to_string_lossy().into_owned());
    memory
        .metadata
        .insert("import_source".into(), "existing_files".into());
    Some(memory)
}
