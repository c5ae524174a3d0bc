use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ar_placement_lib::command::execute_json_batch;
use ar_placement_lib::harness::{demo_models, TestHarness};
use ar_placement_lib::loader::fetch::HttpFetcher;
use ar_placement_lib::loader::LoadStage;
use ar_placement_lib::platform::{AssetFetcher, FetchEvent, FetchRequest, LoadId};
use ar_placement_lib::state::settings::{load_config, load_remote_config};

#[derive(Parser)]
#[command(name = "ar-placement")]
#[command(about = "AR placement state machine: scenario replay and asset tools", long_about = None)]
struct Cli {
    /// Config file (falls back to the user config dir, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON array of harness commands and print the responses
    Run {
        scenario: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Download a model over HTTP, reporting progress
    Fetch { url: String },
    /// Print the effective configuration
    Config {
        /// Fetch the config from a model server instead
        #[arg(long)]
        url: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ar_placement=info,ar_placement_lib=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { scenario, pretty } => run_scenario(cli.config, &scenario, pretty),
        Commands::Fetch { url } => fetch(cli.config, url),
        Commands::Config { url } => print_config(cli.config, url),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_scenario(config: Option<PathBuf>, scenario: &Path, pretty: bool) -> Result<(), String> {
    let mut config = load_config(config.as_deref());
    if config.models.is_empty() {
        config.models = demo_models();
    }
    let json = std::fs::read_to_string(scenario)
        .map_err(|e| format!("Failed to read scenario {}: {e}", scenario.display()))?;

    let mut harness = TestHarness::with_config(config);
    let responses = execute_json_batch(&mut harness, &json)?;
    let failures = responses.iter().filter(|r| !r.success).count();

    let out = if pretty {
        serde_json::to_string_pretty(&responses)
    } else {
        serde_json::to_string(&responses)
    }
    .map_err(|e| e.to_string())?;
    println!("{out}");

    tracing::info!(
        "Replayed {} commands ({failures} failed)",
        responses.len()
    );
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {e}"))
}

fn fetch(config: Option<PathBuf>, url: String) -> Result<(), String> {
    let config = load_config(config.as_deref());
    runtime()?.block_on(async move {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut fetcher = HttpFetcher::new(tx, &config.network);
        fetcher.fetch(FetchRequest {
            load_id: LoadId(1),
            model_id: "cli".into(),
            url: url.clone(),
            cancel: CancellationToken::new(),
        });

        while let Some(event) = rx.recv().await {
            match event {
                FetchEvent::Progress { progress, .. } => match progress.percent() {
                    Some(pct) => eprintln!("{pct}% ({} bytes)", progress.received),
                    None => eprintln!(
                        "{} ({} bytes)",
                        LoadStage::from_received(progress.received).label(),
                        progress.received
                    ),
                },
                FetchEvent::Completed { asset, .. } => {
                    println!("Downloaded {} bytes from {url}", asset.data.len());
                    return Ok(());
                }
                FetchEvent::Failed { failure, .. } => {
                    return Err(format!("Download of {url} failed: {failure}"));
                }
            }
        }
        Err("Fetch ended without a result".to_string())
    })
}

fn print_config(config: Option<PathBuf>, url: Option<String>) -> Result<(), String> {
    let config = match url {
        Some(url) => {
            let timeout = Duration::from_millis(load_config(config.as_deref()).network.config_timeout_ms);
            runtime()?.block_on(load_remote_config(&url, timeout))
        }
        None => load_config(config.as_deref()),
    };
    let out = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
    println!("{out}");
    Ok(())
}
