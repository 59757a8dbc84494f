use clap::Parser;

use bk_qc::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	bk_qc::run(args).await
}
