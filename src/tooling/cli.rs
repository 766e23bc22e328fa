//! CLI Tooling
//!
//! Command-line interface for indexing, planning, syncing, and serving a tree.
//! Every command returns its output as a string; the binary prints it.

use crate::config::{ConfigLoader, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::logging::LoggingConfig;
use crate::reconcile::{Plan, ReconcileOptions, Reconciler};
use crate::server::{self, AppState};
use crate::sync::{connect, FsApplier, SyncCycle, SyncReport};
use crate::tree::{Snapshot, SnapshotBuilder};
use crate::watch::WatchDaemon;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::info;

/// treesync - directory snapshots and peer synchronization
#[derive(Parser)]
#[command(name = "treesync")]
#[command(about = "Snapshot, watch, and synchronize directory trees between peers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory (overrides the configured root)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold the logging flags over the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a snapshot of the root and print it
    Index {
        /// Output format (json or text)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Show the actions that would bring the root in line with a peer
    Plan {
        /// Peer address (http(s) URL, file:// URL, or directory)
        #[arg(long)]
        peer: Option<String>,
        /// Also compare contents of files present on both sides
        #[arg(long)]
        compare_content: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Run one sync cycle against a peer
    Sync {
        /// Peer address (http(s) URL, file:// URL, or directory)
        #[arg(long)]
        peer: Option<String>,
        /// Log the actions without touching the filesystem
        #[arg(long)]
        dry_run: bool,
        /// Also update files whose contents differ
        #[arg(long)]
        compare_content: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Watch the root and serve /index and /files to peers
    Serve {
        /// Listen address (overrides the configured address)
        #[arg(long)]
        listen: Option<String>,
        /// Build the index per request instead of maintaining live state
        #[arg(long)]
        no_watch: bool,
    },
    /// Print the effective configuration
    Config,
}

/// CLI context holding the effective configuration
pub struct CliContext {
    config: SyncConfig,
}

impl CliContext {
    /// Load configuration, then apply a root override.
    pub fn new(root: Option<PathBuf>, config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = ConfigLoader::load(config_path.as_deref())?;
        if let Some(root) = root {
            config.root = root;
        }
        Ok(Self { config })
    }

    pub fn from_config(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> SyncResult<String> {
        match command {
            Commands::Index { format } => self.handle_index(format),
            Commands::Plan {
                peer,
                compare_content,
                format,
            } => self.handle_plan(peer.as_deref(), *compare_content, format),
            Commands::Sync {
                peer,
                dry_run,
                compare_content,
                format,
            } => self.handle_sync(peer.as_deref(), *dry_run, *compare_content, format),
            Commands::Serve { listen, no_watch } => self.handle_serve(listen.as_deref(), *no_watch),
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| SyncError::Config(format!("failed to render config: {}", e))),
        }
    }

    fn handle_index(&self, format: &str) -> SyncResult<String> {
        let snapshot = self.local_snapshot()?;
        match format {
            "json" => serde_json::to_string_pretty(&snapshot.to_wire()?)
                .map_err(|e| SyncError::Wire(e.to_string())),
            "text" => Ok(format!(
                "Root: {}\nDirectories: {}\nFiles: {}",
                snapshot.root()?.display(),
                snapshot.dir_count(),
                snapshot.file_count()
            )),
            other => Err(invalid_format(other)),
        }
    }

    fn handle_plan(
        &self,
        peer: Option<&str>,
        compare_content: bool,
        format: &str,
    ) -> SyncResult<String> {
        check_format(format)?;
        let cycle = self.cycle(peer, compare_content, FsApplier::dry_run())?;
        let local = self.local_snapshot()?;
        let plan = runtime()?.block_on(cycle.plan(&local))?;
        if format == "json" {
            return to_json(&plan);
        }
        Ok(format_plan_text(&plan))
    }

    fn handle_sync(
        &self,
        peer: Option<&str>,
        dry_run: bool,
        compare_content: bool,
        format: &str,
    ) -> SyncResult<String> {
        check_format(format)?;
        let applier = if dry_run {
            FsApplier::dry_run()
        } else {
            FsApplier::new()
        };
        let cycle = self.cycle(peer, compare_content, applier)?;
        if !dry_run {
            std::fs::create_dir_all(&self.config.root)
                .map_err(|e| SyncError::io(&self.config.root, e))?;
        }
        let local = self.local_snapshot()?;
        let report = runtime()?.block_on(cycle.run(&local))?;
        if format == "json" {
            return to_json(&report);
        }
        Ok(format_report_text(&report))
    }

    fn handle_serve(&self, listen: Option<&str>, no_watch: bool) -> SyncResult<String> {
        let listen = listen.unwrap_or(&self.config.listen);
        let mut state = AppState::new(&self.config.root)?;
        let daemon = if no_watch {
            None
        } else {
            let handle = WatchDaemon::spawn(self.config.watch_config())?;
            state = state.with_live_state(handle.state());
            Some(handle)
        };

        info!(listen = %listen, root = %state.root().display(), "Starting server");
        let served = runtime()?.block_on(server::serve(listen, state));
        if let Some(handle) = daemon {
            handle.join();
        }
        served?;
        Ok("Server stopped".to_string())
    }

    fn cycle(
        &self,
        peer: Option<&str>,
        compare_content: bool,
        applier: FsApplier,
    ) -> SyncResult<SyncCycle> {
        let peer = peer
            .or(self.config.peer.as_deref())
            .ok_or_else(|| SyncError::Config("no peer given (use --peer or set peer)".into()))?;
        let transport = connect(peer, self.config.transport.timeout())?;
        let options = ReconcileOptions {
            compare_content: compare_content || self.config.reconcile.compare_content,
        };
        Ok(SyncCycle::new(
            transport,
            Box::new(applier),
            Reconciler::new(options),
        ))
    }

    fn local_snapshot(&self) -> SyncResult<Snapshot> {
        SnapshotBuilder::new(&self.config.root).build()
    }
}

fn runtime() -> SyncResult<Runtime> {
    Runtime::new().map_err(|e| SyncError::Config(format!("failed to create runtime: {}", e)))
}

fn invalid_format(format: &str) -> SyncError {
    SyncError::Config(format!(
        "invalid output format: {} (must be 'text' or 'json')",
        format
    ))
}

fn check_format(format: &str) -> SyncResult<()> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(invalid_format(other)),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> SyncResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SyncError::Wire(e.to_string()))
}

fn plan_table(plan: &Plan) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Command", "Source"]);
    for (i, action) in plan.iter().enumerate() {
        let source = action
            .fetch_source()
            .map(|s| s.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![(i + 1).to_string(), action.to_string(), source]);
    }
    table
}

fn summary_line(plan: &Plan) -> String {
    let s = plan.summary();
    format!(
        "{} actions: {} mkdir, {} rm -r, {} touch, {} rm, {} update",
        plan.len(),
        s.create_dirs,
        s.remove_dirs,
        s.create_files,
        s.remove_files,
        s.update_files
    )
}

fn format_plan_text(plan: &Plan) -> String {
    if plan.is_empty() {
        return "Already in sync.".to_string();
    }
    format!("{}\n{}", plan_table(plan), summary_line(plan))
}

fn format_report_text(report: &SyncReport) -> String {
    if report.is_noop() {
        return format!("Already in sync with {}.", report.peer);
    }
    let verb = if report.dry_run { "Would apply" } else { "Applied" };
    format!(
        "{}\n{} {} (peer {}); fetched {} files",
        plan_table(&report.plan),
        verb,
        summary_line(&report.plan),
        report.peer,
        report.fetched
    )
}
