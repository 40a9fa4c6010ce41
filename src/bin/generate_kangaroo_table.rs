//! Binary to generate a kangaroo table and print its content address.
//!
//! Usage: cargo run --release --bin generate_kangaroo_table -- <bits> [output]
//!
//! Example: cargo run --release --bin generate_kangaroo_table -- 32 tables/kangaroo_32.bin

use anyhow::{Context, Result};
use confidential_balance::kangaroo::Kangaroo;
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
        eprintln!("Example: {} 32 tables/kangaroo_32.bin", args[0]);
        std::process::exit(1);
    }

    let bits: u8 = args[1].parse().context("failed to parse bits argument")?;

    if !(1..=64).contains(&bits) {
        anyhow::bail!("bits must be between 1 and 64");
    }

    let output_path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("tables/kangaroo_{}.bin", bits)));

    tracing::info!(bits, "generating kangaroo table");

    let start = std::time::Instant::now();
    let kangaroo = Kangaroo::new_and_compute_table(bits)?;
    let elapsed = start.elapsed();

    let p = &kangaroo.parameters;
    tracing::info!(
        elapsed_secs = elapsed.as_secs_f64(),
        i = p.i,
        W = p.W,
        N = p.N,
        R = p.R,
        distinguished = kangaroo.table.table.len(),
        "table generated"
    );

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    let serialized = kangaroo.to_bytes()?;
    std::fs::write(&output_path, &serialized).context("failed to write to output file")?;

    println!(
        "Table saved to {} ({} bytes)",
        output_path.display(),
        serialized.len()
    );
    println!("sha3_256: {}", content_address(&serialized));

    Ok(())
}
