use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = scry_worker::Args::parse();

	scry_worker::run(args).await
}
