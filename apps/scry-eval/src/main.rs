use clap::Parser;

use scry_eval::Args;

fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	scry_eval::run(args)
}
