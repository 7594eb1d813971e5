//! # Batch Engine Configuration Validator
//!
//! Command-line tool for validating batch-engine configuration files across
//! environments, to catch configuration issues before a long batch run
//! starts.

use anyhow::Context;
use batch_engine::config::{BatchEngineConfig, ConfigManager};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate batch-engine configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate all configuration sections
    All,

    /// Print the effective merged configuration as YAML
    Show,

    /// List environments with an override file in the config directory
    Environments,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Show) => show_config(&cli),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::All) | None => validate_all(&cli),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<BatchEngineConfig> {
    let manager =
        ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
            .context("failed to load configuration")?;
    Ok(manager.config().clone())
}

fn validate_all(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating batch-engine configuration");
    println!("Environment: {}", cli.environment);
    if let Some(config_dir) = &cli.config_dir {
        println!("Config directory: {}", config_dir.display());
    }
    println!();

    let config = load(cli)?;

    validate_execution(&config);
    validate_backoff(&config);
    validate_telemetry(&config);

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_execution(config: &BatchEngineConfig) {
    println!("⚙️  Execution configuration");
    println!(
        "   ✅ worker_threads: {}, batch_size: {}",
        config.execution.worker_threads, config.execution.batch_size
    );
    println!(
        "   ✅ progress_interval: {}, event_channel_capacity: {}",
        config.execution.progress_interval, config.execution.event_channel_capacity
    );
    if config.execution.worker_threads == 1 {
        println!("   ℹ️  single worker thread: batches will run sequentially");
    }
}

fn validate_backoff(config: &BatchEngineConfig) {
    println!("⏱️  Backoff configuration");
    println!(
        "   ✅ max_attempts: {}, delays: {:?} ms, multiplier: {}",
        config.backoff.max_attempts,
        config.backoff.default_backoff_ms,
        config.backoff.backoff_multiplier
    );
    if config.backoff.jitter_enabled {
        println!(
            "   ✅ jitter enabled (max {:.0}%)",
            config.backoff.jitter_max_percentage * 100.0
        );
    } else {
        println!("   ℹ️  jitter disabled");
    }
}

fn validate_telemetry(config: &BatchEngineConfig) {
    println!("📊 Telemetry configuration");
    if config.telemetry.structured_file_logging {
        println!(
            "   ✅ JSON file logging into {}",
            config.telemetry.log_directory
        );
    } else {
        println!("   ℹ️  file logging disabled (console only)");
    }
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let config = load(cli)?;
    let yaml = serde_yaml::to_string(&config).context("failed to serialize configuration")?;
    println!("{yaml}");
    Ok(())
}

fn list_environments(cli: &Cli) -> anyhow::Result<()> {
    let directory = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config"));
    println!("📋 Environments with overrides in {}:", directory.display());

    if !directory.exists() {
        println!("❌ configuration directory not found");
        return Ok(());
    }

    let mut environments = Vec::new();
    for entry in std::fs::read_dir(&directory)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(env) = name
            .strip_prefix("batch-engine.")
            .and_then(|rest| rest.strip_suffix(".yaml"))
        {
            environments.push(env.to_string());
        }
    }
    environments.sort();

    if environments.is_empty() {
        println!("  (none)");
    }
    for env in environments {
        println!("  • {env}");
    }
    Ok(())
}
