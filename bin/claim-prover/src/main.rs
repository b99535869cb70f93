//! Claim prover binary.

use clap::Parser;
use claim_prover::{ClaimProverConfig, Cli};
use eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = ClaimProverConfig::from_cli(cli)?;

    claim_prover::run(config).await
}
