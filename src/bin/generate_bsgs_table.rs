//! Binary to generate a baby-step giant-step table and print its content
//! address.
//!
//! Usage: cargo run --release --bin generate_bsgs_table -- <bits> [output]
//!
//! Example: cargo run --release --bin generate_bsgs_table -- 32 tables/bsgs_32.bin

use anyhow::{Context, Result};
use confidential_balance::bsgs::{BabyStepGiantStep, MAX_NUM_BITS};
use confidential_balance::tables::content_address;
use confidential_balance::DiscreteLogSolver;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <bits> [output]", args[0]);
        eprintln!("Example: {} 32 tables/bsgs_32.bin", args[0]);
        std::process::exit(1);
    }

    let bits: u8 = args[1].parse().context("failed to parse bits argument")?;

    if !(1..=MAX_NUM_BITS).contains(&bits) {
        anyhow::bail!("bits must be between 1 and {}", MAX_NUM_BITS);
    }

    let output_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("tables/bsgs_{}.bin", bits)));

    let start = std::time::Instant::now();
    let bsgs = BabyStepGiantStep::new_and_compute_table(bits)?;

    tracing::info!(
        bits,
        m = bsgs.table.m,
        elapsed_secs = start.elapsed().as_secs_f64(),
        "table generated"
    );

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    let serialized = bsgs.table.to_bytes()?;
    std::fs::write(&output_path, &serialized).context("failed to write to output file")?;

    println!(
        "Table saved to {} ({} bytes)",
        output_path.display(),
        serialized.len()
    );
    println!("sha3_256: {}", content_address(&serialized));

    Ok(())
}
