use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use relaymatch_driver::Config;

#[derive(Debug, Parser)]
#[command(about = "Sweep relay-assignment strategies over a delay/price dataset")]
struct Args {
    /// Path to the experiment configuration (JSON).
    #[arg(short, long)]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    relaymatch_driver::run(&config)?;
    Ok(())
}
