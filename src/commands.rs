//! Command handlers for the engram CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use crate::engine::CaptureEngine;
use crate::errors::Error;
use crate::output::*;

/// Commands supported by the engram CLI.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the continuous scan loop until interrupted
    Monitor {
        /// Scan interval in seconds (overrides config)
        #[arg(short = 'i', long)]
        interval: Option<u64>,
    },
    /// Run a single scan iteration and exit
    Scan,
    /// Bulk-import important workspace files and a week of commits
    Import,
    /// Print capture statistics
    Report,
    /// Search stored memories by content
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results (default: 20)
        #[arg(short = 'l', long, default_value = "20")]
        limit: usize,
    },
    /// Write all memories to a JSON backup file
    Backup {
        /// Backup file path
        path: PathBuf,
    },
    Version,
}

/// Execute a CLI command.
pub fn execute(
    command: &Commands,
    engine: &mut CaptureEngine,
    json: bool,
) -> Result<ExitCode, Error> {
    match command {
        Commands::Monitor { interval } => handle_monitor(engine, *interval),
        Commands::Scan => handle_scan(engine, json),
        Commands::Import => handle_import(engine, json),
        Commands::Report => handle_report(engine, json),
        Commands::Search { query, limit } => handle_search(engine, query, *limit, json),
        Commands::Backup { path } => handle_backup(engine, path, json),
        Commands::Version => handle_version(json),
    }
}

fn handle_monitor(engine: &mut CaptureEngine, interval: Option<u64>) -> Result<ExitCode, Error> {
    if let Some(secs) = interval {
        if secs == 0 {
            return Err(Error::InvalidInput("interval must be at least 1".into()));
        }
        engine.set_scan_interval(std::time::Duration::from_secs(secs));
    }
    engine.start_monitoring();
    Ok(ExitCode::SUCCESS)
}

fn handle_scan(engine: &mut CaptureEngine, json: bool) -> Result<ExitCode, Error> {
    let saved = engine.run_scan()?;
    if json {
        print_json(&ScanResponse {
            status: "scanned".to_string(),
            saved,
        });
    } else {
        println!("Scan complete: {} new memories saved", saved);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_import(engine: &mut CaptureEngine, json: bool) -> Result<ExitCode, Error> {
    let stats = engine.import_existing_memories();
    if json {
        print_json(&ImportResponse {
            status: "imported".to_string(),
            files: stats.files,
            commits: stats.commits,
            saved: stats.saved,
        });
    } else {
        println!(
            "Import complete: {} files and {} commits swept, {} memories saved",
            stats.files, stats.commits, stats.saved
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_report(engine: &mut CaptureEngine, json: bool) -> Result<ExitCode, Error> {
    let report = engine.generate_memory_report();
    if json {
        print_json(&report);
    } else {
        println!("Total memories: {}", report.total_memories);
        println!("By type:");
        for (memory_type, count) in &report.memory_types {
            println!("  {}: {}", memory_type, count);
        }
        println!(
            "Importance: {} high / {} medium / {} low",
            report.importance_distribution.high,
            report.importance_distribution.medium,
            report.importance_distribution.low
        );
        println!(
            "Recent: {} in 24h / {} in 7d / {} in 30d",
            report.recent_activity.last_24h,
            report.recent_activity.last_week,
            report.recent_activity.last_month
        );
        println!("Top tags:");
        for (tag, count) in &report.top_tags {
            println!("  {}: {}", tag, count);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_search(
    engine: &mut CaptureEngine,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<ExitCode, Error> {
    let memories = engine.store_mut().search_memories(query, limit);
    if json {
        let results: Vec<SearchResultItem> = memories
            .into_iter()
            .map(|m| SearchResultItem {
                id: m.id,
                memory_type: m.memory_type,
                importance_score: m.importance_score,
                content: m.content,
                timestamp: m.timestamp.to_rfc3339(),
            })
            .collect();
        print_json(&SearchResponse { results });
    } else {
        for memory in memories {
            let excerpt: String = memory.content.chars().take(100).collect();
            println!(
                "[{}] {} (importance {}): {}",
                memory.timestamp.format("%Y-%m-%d %H:%M"),
                memory.memory_type,
                memory.importance_score,
                excerpt
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_backup(
    engine: &mut CaptureEngine,
    path: &std::path::Path,
    json: bool,
) -> Result<ExitCode, Error> {
    if engine.store_mut().backup_memories(path) {
        if json {
            print_json(&BackupResponse {
                status: "backed_up".to_string(),
                path: path.display().to_string(),
            });
        } else {
            println!("Backup written to {}", path.display());
        }
        Ok(ExitCode::SUCCESS)
    } else {
        Err(Error::Store(format!(
            "backup to {} failed",
            path.display()
        )))
    }
}

fn handle_version(json: bool) -> Result<ExitCode, Error> {
    if json {
        print_json(&serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "name": env!("CARGO_PKG_NAME")
        }));
    } else {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    }
    Ok(ExitCode::SUCCESS)
}
