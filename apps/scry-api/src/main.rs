use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = scry_api::Args::parse();

	scry_api::run(args).await
}
