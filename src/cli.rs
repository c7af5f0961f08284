//! Command-line interface for par-doc.
//!
//! `demo` drives a complete two-window handoff against the in-memory
//! collaborators and prints the resulting `TransferResult` as JSON.
//! `show-config` prints the effective configuration.

use crate::app_context::{AppContext, ServicesFactory};
use crate::memory::MemoryWorkspace;
use crate::transfer::WindowHandle;
use anyhow::Result;
use clap::{Parser, Subcommand};
use par_doc_config::{Config, LogLevel};
use par_doc_protocol::{TransferResult, TransferTarget};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// par-doc - move document tabs between windows
#[derive(Parser)]
#[command(name = "par-doc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set debug log level (overrides config and RUST_LOG)
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Read configuration from this file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

/// Log level argument for CLI
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Off => LogLevel::Off,
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a document in one window and move its tab to another
    Demo {
        /// Open a DjVu document instead of a PDF
        #[arg(long)]
        djvu: bool,

        /// Move the tab to a window that never answers
        #[arg(long)]
        hang_target: bool,

        /// Ack deadline for this transfer (defaults to the configured value)
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

/// Options of the `demo` subcommand
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoOptions {
    pub djvu: bool,
    pub hang_target: bool,
    pub timeout_ms: Option<u64>,
}

/// Load the configuration named on the command line, or the default one.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Run a parsed subcommand.
pub async fn run(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Demo {
            djvu,
            hang_target,
            timeout_ms,
        } => {
            let options = DemoOptions {
                djvu,
                hang_target,
                timeout_ms,
            };
            let result = run_demo(config, options).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::ShowConfig => {
            print!("{}", serde_yaml_ng::to_string(&config)?);
        }
    }
    Ok(())
}

/// Open one document in a fresh window and move its tab.
pub async fn run_demo(config: Config, options: DemoOptions) -> Result<TransferResult> {
    let workspace = MemoryWorkspace::new();
    let services: ServicesFactory = {
        let workspace = Arc::clone(&workspace);
        Arc::new(move |id| workspace.services_for(id))
    };
    let app = AppContext::new(config, services);

    let source = app.open_window().await?;
    let path = if options.djvu {
        "/docs/sample.djvu"
    } else {
        "/docs/sample.pdf"
    };
    let tab_id = source.open_document(path).await?;
    log::info!("Demo: opened {} as tab {} in {}", path, tab_id, source.id());

    // The receiver is held but never read, so no ack is ever sent.
    let mut _hung_events = None;
    let target = if options.hang_target {
        let id = app.router().allocate_window_id();
        let (tx, rx) = mpsc::unbounded_channel();
        app.router().register_window(WindowHandle::new(id, tx));
        _hung_events = Some(rx);
        TransferTarget::Window { id }
    } else {
        TransferTarget::NewWindow
    };

    let result = source.move_tab(tab_id, target, options.timeout_ms).await?;
    app.shutdown();
    Ok(result)
}
