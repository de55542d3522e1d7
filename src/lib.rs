//! engram - a knowledge-capture engine for developer workspaces.
//!
//! engram observes a workspace (file edits and git history), turns raw events
//! into normalized memory records, enriches them with tags and importance
//! scores, links related records by content similarity, and persists them to
//! a remote record store. All operations are synchronous (no async/await
//! required), and capture is best-effort: storage or provider failures are
//! logged and converted into neutral results rather than halting the stream.
//!
//! # Example
//!
//! ```no_run
//! use engram::{CaptureEngine, Collector, Config, MemoryStore, Processor};
//! use engram::store::api::HttpApi;
//!
//! let config = Config::default();
//! let api = HttpApi::new(&config.store_url, &config.store_api_key, &config.store_collection);
//! let store = MemoryStore::new(Box::new(api), &config.store_collection);
//! let collector = Collector::new(&config.workspace_path).expect("workspace exists");
//!
//! let mut engine = CaptureEngine::new(collector, Processor::new(), store);
//!
//! // One scan iteration: collect, enrich, relate, save
//! let saved = engine.run_scan().expect("workspace walkable");
//! println!("saved {saved} memories");
//!
//! // Query back
//! for memory in engine.store_mut().search_memories("database", 10) {
//!     println!("{} [{}]: {}", memory.id, memory.importance_score, memory.content);
//! }
//! ```

pub mod collector;
pub mod commands;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod errors;
pub mod memory;
pub mod output;
pub mod processor;
pub mod report;
pub mod store;

// Re-export public API
pub use collector::Collector;
pub use config::Config;
pub use engine::{CaptureEngine, ImportStats, StopHandle};
pub use enrich::{Enricher, Enrichment, HttpEnricher, NoopEnricher};
pub use errors::Error;
pub use memory::{Memory, MAX_IMPORTANCE, MAX_RELATED};
pub use processor::Processor;
pub use report::MemoryReport;
pub use store::MemoryStore;
