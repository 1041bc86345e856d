//! Claim every resolved Polymarket position the configured wallet can redeem.
//!
//! Lists resolved markets, confirms each winning outcome against the CTF
//! contract, and redeems all positions with a positive balance in one
//! `claimPositions` transaction.
//!
//! Usage:
//!   cargo run --release --bin claim
//!   cargo run --release --bin claim -- --dry-run
//!
//! Reads from .env:
//!   PRIVATE_KEY, PROXY_WALLET                — required, must match
//!   RPC_URL, MARKETS_API_URL                 — optional endpoints
//!   USDC_CONTRACT_ADDRESS, POLYMARKET_CTF_ADDRESS
//!   MAX_FEE, MAX_PRIORITY_FEE (gwei), GAS_LIMIT

use anyhow::Result;
use clap::Parser;

use polymarket_claim::chain::rpc::RpcChain;
use polymarket_claim::config::Config;
use polymarket_claim::engine::resolver::PositionResolver;
use polymarket_claim::gateway::claim::claim_positions;
use polymarket_claim::market::fetcher::MarketClient;
use polymarket_claim::types::ClaimBatch;

#[derive(Parser)]
#[command(name = "claim", about = "Redeem resolved Polymarket positions in one transaction")]
struct Args {
    /// List claimable positions without sending a transaction
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    println!("Checking claimable positions for {}...", config.wallet);

    let chain = RpcChain::connect(&config).await?;
    let markets = MarketClient::new(reqwest::Client::new(), &config.markets_api_url);
    let resolver = PositionResolver::new(&chain, config.collateral_token, config.wallet);

    let positions = resolver.get_claimable_positions(&markets).await?;
    if positions.is_empty() {
        println!("No claimable positions found");
        return Ok(());
    }

    println!("Found {} claimable positions:", positions.len());
    for (i, pos) in positions.iter().enumerate() {
        println!("{}. {} - Balance: {}", i + 1, pos.market_title, pos.balance);
    }

    if args.dry_run {
        if let Some(batch) = ClaimBatch::from_positions(&positions) {
            println!("Dry run, not sending. claimPositions would receive:");
            for (id, set) in batch.condition_ids().iter().zip(batch.index_sets()) {
                println!("  {} indexSet={}", id, set);
            }
        }
        return Ok(());
    }

    if let Some(tx_hash) = claim_positions(&chain, &positions).await? {
        println!("Claim transaction sent! TX Hash: {}", tx_hash);
        println!("Track on Polygonscan: https://polygonscan.com/tx/{}", tx_hash);
    }

    Ok(())
}
