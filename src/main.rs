use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use engram::store::api::HttpApi;
use engram::{
    commands, output, CaptureEngine, Collector, Config, Error, HttpEnricher, MemoryStore,
    Processor,
};

/// engram - a knowledge-capture engine for developer workspaces
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Workspace root to observe (overrides config)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("engram=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                output::print_json(&output::ErrorResponse {
                    error: e.to_string(),
                });
            } else {
                eprintln!("Error: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Error> {
    let mut config = Config::load()?;
    if let Some(workspace) = &cli.workspace {
        config.workspace_path = workspace.clone();
    }
    if config.store_url.is_empty() {
        return Err(Error::Config(
            "no store configured: set store_url in config.toml or ENGRAM_STORE_URL".into(),
        ));
    }

    let api = HttpApi::new(
        &config.store_url,
        &config.store_api_key,
        &config.store_collection,
    );
    let store = MemoryStore::new(Box::new(api), &config.store_collection);

    let processor = match &config.enrichment_url {
        Some(url) => Processor::with_enricher(Box::new(HttpEnricher::new(
            url,
            config.enrichment_api_key.clone(),
            &config.enrichment_model,
        ))),
        None => Processor::new(),
    };

    let collector = Collector::new(&config.workspace_path)?;
    let mut engine = CaptureEngine::new(collector, processor, store)
        .with_scan_interval(std::time::Duration::from_secs(config.scan_interval_secs))
        .with_git_window(config.git_since_hours);

    commands::execute(&cli.command, &mut engine, cli.json)
}
