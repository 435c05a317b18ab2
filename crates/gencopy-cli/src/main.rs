mod backup;
mod cli;

use clap::Parser;
use eyre::Result;
use gencopy_core::config::{self, Settings};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(dir) = &cli.config_dir {
        config::set_config_dir(dir);
    }
    let settings = Settings::load_default()?;
    let plan = backup::plan_from(&cli, settings)?;

    if !backup::run(plan).await? {
        std::process::exit(1);
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise `-v` selects debug and the default is info.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
