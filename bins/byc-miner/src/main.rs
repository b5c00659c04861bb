//! Standalone mining driver: opens (or creates) a local data directory,
//! starts a mining session against the embedded node, and reports
//! progress until interrupted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use byc_core::coin::CoinType;
use byc_node::{Node, NodeConfig};

#[derive(Parser, Debug)]
#[command(name = "byc-miner", about = "Mine BYC blocks against a local chain")]
struct Args {
    /// Data directory for blocks and the UTXO snapshot.
    #[arg(long, default_value = ".byc")]
    data_dir: PathBuf,

    /// Payout address: 40 hex characters (20 bytes).
    #[arg(long)]
    address: String,

    /// Coin type to mine (LEAH, SHIBLUM, or SHIBLON).
    #[arg(long, default_value = "LEAH")]
    coin: String,

    /// Seconds between progress reports.
    #[arg(long, default_value_t = 10)]
    report_interval: u64,

    /// Stop after this many blocks (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    max_blocks: u64,
}

fn parse_address(hex_addr: &str) -> Result<[u8; 20]> {
    let bytes = hex::decode(hex_addr).context("address must be hex")?;
    let payload: [u8; 20] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("address must be exactly 20 bytes"))?;
    Ok(payload)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let address = parse_address(&args.address)?;
    let coin = CoinType::from_tag(&args.coin.to_uppercase())
        .with_context(|| format!("unknown coin type {:?}", args.coin))?;
    if !coin.is_mineable() {
        bail!("{coin} is not mineable; pick LEAH, SHIBLUM, or SHIBLON");
    }

    let node = Node::open(NodeConfig::new(&args.data_dir))?;
    let (tip_hash, tip_height) = node.best_block();
    info!(%tip_hash, tip_height, "chain loaded");

    let start_height = tip_height;
    let session = node.start_mining(address, coin)?;
    info!(session, coin = %coin, address = %args.address, "mining started");

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    stdin_stop_handler(move || flag.store(true, Ordering::Relaxed));
    info!("press enter (or close stdin) to stop");

    loop {
        std::thread::sleep(Duration::from_secs(args.report_interval));
        let (hash, height) = node.best_block();
        let mined = height.saturating_sub(start_height);
        if let Some((hashes, found)) = node.mining_stats(session) {
            info!(height, tip = %hash, hashes, found, "progress");
        }
        if interrupted.load(Ordering::Relaxed) {
            info!("interrupt received; stopping");
            break;
        }
        if args.max_blocks > 0 && mined >= args.max_blocks {
            info!(mined, "block quota reached; stopping");
            break;
        }
    }

    node.stop_mining(session);
    node.shutdown();
    let (_, height) = node.best_block();
    info!(height, mined = height - start_height, "miner exited");
    Ok(())
}

/// Stop signal without a signal-handling dependency: a line on stdin (or
/// stdin closing) requests shutdown.
fn stdin_stop_handler(on_interrupt: impl FnOnce() + Send + 'static) {
    std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = std::io::stdin().read_line(&mut buf);
        on_interrupt();
    });
}
