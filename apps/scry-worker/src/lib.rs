pub mod worker;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;

use scry_service::{ScryService, store::Stores};

#[derive(Debug, Parser)]
#[command(
	version = scry_cli::VERSION,
	rename_all = "kebab",
	styles = scry_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = scry_config::load(&args.config)?;

	scry_cli::init_tracing(&config.service.log_level);

	if config.storage.backend == "memory" {
		tracing::warn!("Worker is running against the in-process memory store.");
	}

	let stores = Stores::open(&config).await?;
	let state = worker::WorkerState::new(ScryService::new(config, stores)?)?;

	worker::run_worker(state).await?;

	Ok(())
}
