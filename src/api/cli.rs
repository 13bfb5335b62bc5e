use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::database::{CursorKey, CursorStore};
use crate::error::{ConfigError, GatewayError, MovekitError, SystemError, TrackError};
use crate::gateway::{NetworkRegistry, DEFAULT_NETWORK};
use crate::logging::{ErrorLogger, LogContext};
use crate::models::{format_event, SimulationResult};
use crate::tracker::{FilterCriteria, Poller, PollerConfig, StdoutSink};

/// Developer tooling for Move smart-contract projects
#[derive(Parser, Debug)]
#[command(name = "movekit", version)]
#[command(about = "Simulate transactions and track contract events on a Move network", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CONFIG_FILE or ./movekit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream supply-chain events emitted by an account's transactions
    Track(TrackArgs),
    /// Dry-run a transaction and show gas, status, changes and events
    Simulate(SimulateArgs),
    /// List known networks and their endpoints
    Networks,
    /// Show persisted tracker watermarks
    Cursors(CursorsArgs),
    /// Print a sample configuration file
    Config,
}

#[derive(Args, Debug, Default)]
pub struct TrackArgs {
    /// Account whose transactions are watched
    #[arg(long)]
    pub address: Option<String>,
    /// Only emit events from this module
    #[arg(long)]
    pub module: Option<String>,
    /// Only emit events whose batch_id equals this value
    #[arg(long = "batch")]
    pub batch: Option<String>,
    /// Network profile name
    #[arg(long)]
    pub network: Option<String>,
    /// Delay between polls in milliseconds
    #[arg(long)]
    pub interval: Option<u64>,
    /// Persist the watermark in this SQLite file
    #[arg(long)]
    pub cursor_db: Option<PathBuf>,
    /// Forget the saved watermark before starting
    #[arg(long)]
    pub reset_cursor: bool,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// JSON file holding the transaction to simulate
    #[arg(long)]
    pub file: PathBuf,
    /// Network profile name
    #[arg(long)]
    pub network: Option<String>,
}

#[derive(Args, Debug)]
pub struct CursorsArgs {
    /// Cursor database (defaults to tracker.cursor_db)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Everything `track` needs, resolved from flags and configuration
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub address: String,
    pub filter: FilterCriteria,
    pub registry: NetworkRegistry,
    pub poll_interval_ms: u64,
    pub page_limit: u32,
    pub cursor_db: Option<PathBuf>,
    pub reset_cursor: bool,
    /// Set when the requested network was unknown and testnet was used instead
    pub network_fallback: Option<GatewayError>,
}

pub struct CliHandler {
    config: AppConfig,
}

impl CliHandler {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn execute_command(&self, command: &Commands) -> Result<(), MovekitError> {
        match command {
            Commands::Track(args) => self.track(args).await,
            Commands::Simulate(args) => self.simulate(args).await,
            Commands::Networks => {
                for line in self.network_lines() {
                    println!("{}", line);
                }
                Ok(())
            }
            Commands::Cursors(args) => self.cursors(args),
            Commands::Config => {
                print!("{}", AppConfig::generate_sample_config()?);
                Ok(())
            }
        }
    }

    /// Validate `track` flags and fill in defaults. An unknown network is not an error.
    pub fn resolve_track(&self, args: &TrackArgs) -> Result<TrackPlan, MovekitError> {
        let address = args
            .address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or(TrackError::MissingAddress)?
            .to_string();

        let poll_interval_ms = args.interval.unwrap_or(self.config.tracker.poll_interval_ms);
        if poll_interval_ms == 0 {
            return Err(TrackError::InvalidInterval(poll_interval_ms).into());
        }

        let module = args
            .module
            .clone()
            .unwrap_or_else(|| self.config.tracker.default_module.clone());
        let filter = FilterCriteria::new(Some(module), args.batch.clone());

        let mut registry = self.config.network_registry();
        let requested = args.network.as_deref().unwrap_or(&self.config.network.default);
        let network_fallback = match registry.set_network(requested) {
            Ok(()) => None,
            Err(e) => {
                registry.set_network(DEFAULT_NETWORK)?;
                Some(e)
            }
        };

        let cursor_db = args
            .cursor_db
            .clone()
            .or_else(|| self.config.tracker.cursor_db.as_ref().map(PathBuf::from));

        Ok(TrackPlan {
            address,
            filter,
            registry,
            poll_interval_ms,
            page_limit: self.config.tracker.page_limit,
            cursor_db,
            reset_cursor: args.reset_cursor,
            network_fallback,
        })
    }

    async fn track(&self, args: &TrackArgs) -> Result<(), MovekitError> {
        let plan = self.resolve_track(args)?;

        if let Some(warning) = &plan.network_fallback {
            eprintln!("Warning: {}. Falling back to {}.", warning, DEFAULT_NETWORK);
        }
        if plan.reset_cursor && plan.cursor_db.is_none() {
            eprintln!("Warning: --reset-cursor ignored, no cursor database configured");
        }

        let client = plan.registry.client(self.config.rpc.timeout_seconds);
        let poller_config = PollerConfig {
            poll_interval_ms: plan.poll_interval_ms,
            page_limit: plan.page_limit,
        };
        let mut poller = Poller::new(client, &plan.address, plan.filter.clone(), Some(poller_config))?;

        if let Some(path) = &plan.cursor_db {
            let store = CursorStore::open(path)?;
            let key = CursorKey::new(
                plan.registry.current(),
                &plan.address,
                plan.filter.module.as_deref(),
                plan.filter.batch_id.as_deref(),
            );
            if plan.reset_cursor && store.clear(&key)? {
                info!("Cleared saved watermark for {}", plan.address);
            }
            poller = poller.with_cursor(store, key);
        }

        for line in startup_lines(&plan) {
            println!("{}", line);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    let _ = shutdown_tx.send(true);
                }
                Err(err) => {
                    let error = MovekitError::System(SystemError::Signal(err.to_string()));
                    ErrorLogger::log_error(&error, Some(LogContext::new("cli", "ctrl_c")));
                }
            }
        });

        let stats = poller.run(&mut StdoutSink, shutdown_rx).await;
        println!(
            "Tracker stopped: {} events emitted over {} polls, last version {}",
            stats.events_emitted, stats.cycles, stats.watermark
        );

        Ok(())
    }

    async fn simulate(&self, args: &SimulateArgs) -> Result<(), MovekitError> {
        let path = args.file.display().to_string();
        let content = fs::read_to_string(&args.file).map_err(SystemError::FileSystem)?;
        let txn: Value = serde_json::from_str(&content).map_err(|e| SystemError::InvalidInput {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let mut registry = self.config.network_registry();
        registry.set_network(args.network.as_deref().unwrap_or(&self.config.network.default))?;

        let client = registry.client(self.config.rpc.timeout_seconds);
        let result = client.simulate_transaction(&txn).await?;

        for line in simulation_lines(&result) {
            println!("{}", line);
        }

        Ok(())
    }

    fn network_lines(&self) -> Vec<String> {
        let registry = self.config.network_registry();
        registry
            .profiles()
            .map(|(name, url)| {
                let marker = if name == self.config.network.default { "*" } else { " " };
                format!("{} {:<10} {}", marker, name, url)
            })
            .collect()
    }

    fn cursors(&self, args: &CursorsArgs) -> Result<(), MovekitError> {
        let path = args
            .db
            .clone()
            .or_else(|| self.config.tracker.cursor_db.as_ref().map(PathBuf::from))
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "tracker.cursor_db".to_string(),
                value: "<unset>".to_string(),
            })?;

        let store = CursorStore::open(&path)?;
        let rows = store.list()?;
        if rows.is_empty() {
            println!("No saved cursors in {}", path.display());
            return Ok(());
        }

        for row in rows {
            println!(
                "{} {} module={} batch={} -> {} (updated {})",
                row.network,
                row.address,
                display_filter(&row.module_filter),
                display_filter(&row.batch_filter),
                row.watermark,
                chrono::DateTime::from_timestamp(row.updated_at, 0)
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| row.updated_at.to_string()),
            );
        }

        Ok(())
    }
}

/// Informational lines printed before the first poll
pub fn startup_lines(plan: &TrackPlan) -> Vec<String> {
    vec![
        format!(
            "Tracking events for {} on {} ({})",
            plan.address,
            plan.registry.current(),
            plan.registry.current_url()
        ),
        format!("Module filter: {}", plan.filter.module.as_deref().unwrap_or("(none)")),
        format!("Batch filter: {}", plan.filter.batch_id.as_deref().unwrap_or("(none)")),
        format!(
            "Tracker running, polling every {} ms. Press Ctrl+C to stop.",
            plan.poll_interval_ms
        ),
    ]
}

/// Human-readable summary of a simulation
pub fn simulation_lines(result: &SimulationResult) -> Vec<String> {
    let mut lines = vec![
        format!("Success: {}", result.success),
        format!("VM status: {}", result.vm_status),
        format!("Gas used: {} (unit price {})", result.gas_used, result.gas_unit_price),
        format!("Storage changes: {}", result.changes.len()),
        format!("Events: {}", result.events.len()),
    ];

    lines.extend(result.events.iter().map(|event| format!("  {}", format_event(event))));
    lines
}

fn display_filter(value: &str) -> &str {
    if value.is_empty() {
        "*"
    } else {
        value
    }
}
