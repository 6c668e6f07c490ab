use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use axetune::client::{DeviceClient, HttpDeviceClient};
use axetune::config::Config;
use axetune::manager::FleetSupervisor;
use axetune::provider::{ConfigProvider, FileConfigProvider, StaticConfigProvider};
use axetune::sink::{ChannelSink, LogSink, spawn_writer};
use axetune::TunerError;
use cli::Cli;
use cli::commands::Commands;

fn setup_logging(level: Option<&str>) -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("axetune")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("axetune.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let env = env_logger::Env::default().default_filter_or(level.unwrap_or("info"));
    env_logger::Builder::from_env(env)
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

async fn run_application(cli: &Cli, config: Config, source: Option<PathBuf>) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        match &source {
            Some(path) => println!("Using config: {}", path.display()),
            None => println!("No config file found, using defaults"),
        }
    }

    match cli.resolved_command() {
        Commands::Run => handle_run_command(config, source).await,
        Commands::Check => handle_check_command(&config),
        Commands::List { enabled } => handle_list_command(&config, enabled),
        Commands::Status { address } => handle_status_command(&config, &address).await,
        Commands::Restart { address } => handle_restart_command(&config, &address).await,
    }
}

async fn handle_run_command(config: Config, source: Option<PathBuf>) -> Result<()> {
    let client: Arc<dyn DeviceClient> =
        Arc::new(HttpDeviceClient::new(config.client.clone()).context("Failed to create device client")?);

    // Edits to the config file are picked up while running
    let provider: Arc<dyn ConfigProvider> = match source {
        Some(path) => Arc::new(FileConfigProvider::new(path)),
        None => Arc::new(StaticConfigProvider::new(config.clone())),
    };

    let (channel, rx) = ChannelSink::new();
    let writer = spawn_writer(rx, true);
    let sink: Arc<dyn LogSink> = Arc::new(channel);

    let result = tune_until_interrupted(client, provider, sink, &config).await;

    // All senders are gone by now; let the writer drain
    if let Err(e) = writer.await {
        log::error!("Log writer ended abnormally: {}", e);
    }
    result
}

async fn tune_until_interrupted(
    client: Arc<dyn DeviceClient>,
    provider: Arc<dyn ConfigProvider>,
    sink: Arc<dyn LogSink>,
    config: &Config,
) -> Result<()> {
    let supervisor = FleetSupervisor::new(client, provider, sink).with_watcher_config(config.watcher.clone());
    let fleet = supervisor.start_from_provider().context("Autotuning could not start")?;

    println!("{}", "Autotuning running, press Ctrl-C to stop".cyan());
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C, stopping: {}", e);
    }

    let finished = fleet.shutdown().await;
    info!("Stopped {} control loop(s)", finished.len());
    Ok(())
}

fn handle_check_command(config: &Config) -> Result<()> {
    info!("Checking {} configured miner(s)", config.miners.len());
    match FleetSupervisor::validate(&config.miners) {
        Ok(enabled) => {
            for record in enabled {
                println!("{} {}", "ok".green(), record.identity.label());
            }
            Ok(())
        }
        Err(TunerError::IncompleteProfiles(issues)) => {
            for issue in &issues {
                println!("{} {}", "error".red(), issue);
            }
            Err(eyre::eyre!("{} profile issue(s) found", issues.len()))
        }
        Err(e) => {
            println!("{} {}", "error".red(), e);
            Err(e.into())
        }
    }
}

fn handle_list_command(config: &Config, enabled_only: bool) -> Result<()> {
    info!("Listing miners (enabled only: {})", enabled_only);
    if config.miners.is_empty() {
        println!("{}", "No miners configured".yellow());
        return Ok(());
    }
    for record in &config.miners {
        if enabled_only && !record.enabled {
            continue;
        }
        let state = if record.enabled {
            "enabled".green()
        } else {
            "disabled".normal()
        };
        let device_type = if record.identity.device_type.is_empty() {
            "-"
        } else {
            record.identity.device_type.as_str()
        };
        println!("{:<24} {:<10} {}", record.identity.label(), device_type, state);
    }
    Ok(())
}

async fn handle_status_command(config: &Config, address: &str) -> Result<()> {
    info!("Fetching telemetry from {}", address);
    let client = HttpDeviceClient::new(config.client.clone()).context("Failed to create device client")?;
    let sample = client
        .fetch_telemetry(address)
        .await
        .context(format!("Failed to read telemetry from {}", address))?;
    println!("{} {}", address.cyan(), sample.summary());
    Ok(())
}

async fn handle_restart_command(config: &Config, address: &str) -> Result<()> {
    info!("Restarting {}", address);
    let client = HttpDeviceClient::new(config.client.clone()).context("Failed to create device client")?;
    let confirmation = client
        .restart(address)
        .await
        .context(format!("Failed to restart {}", address))?;
    println!("{}", confirmation.yellow());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let (config, source) = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", source);

    // Run the main application logic
    run_application(&cli, config, source).await.context("Application failed")?;

    Ok(())
}
