use anyhow::Result;
use clap::Parser;
use par_doc::cli::{self, Cli};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let args = Cli::parse();

    // CLI --log-level takes precedence, then RUST_LOG, then config (applied below).
    par_doc::debug::init_log_bridge(args.log_level.map(Into::into));
    log::info!("Starting par-doc {}", par_doc::VERSION);

    let config = cli::load_config(&args)?;
    par_doc::debug::set_log_level(config.log_level);

    let runtime = Runtime::new()?;
    let result = runtime.block_on(cli::run(args.command, config));

    // Window tasks may still be winding down; don't wait on them forever.
    log::info!("Shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    if let Err(ref e) = result {
        eprintln!("par-doc: error: {e:#}");
    }
    result
}
