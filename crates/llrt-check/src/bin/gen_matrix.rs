//! Generate llrt-compatibility.json from the LLRT README.
//!
//! Usage:
//!   cargo run -p llrt-check --bin llrt-gen-matrix
//!   cargo run -p llrt-check --bin llrt-gen-matrix -- --input README.md --output matrix.json

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

use llrt_check::matrix::{CompatibilityMatrix, LLRT_README_URL};

#[derive(Parser, Debug)]
#[command(name = "llrt-gen-matrix")]
#[command(about = "Build the LLRT compatibility matrix from the upstream README")]
struct Args {
    /// Read the README from a local file instead of fetching it
    #[arg(long)]
    input: Option<PathBuf>,

    /// README URL to fetch
    #[arg(long, default_value = LLRT_README_URL)]
    url: String,

    /// Output JSON file
    #[arg(long, default_value = "llrt-compatibility.json")]
    output: PathBuf,

    /// Print the generated matrix
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();

    let readme = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => fetch_readme(&args.url).await?,
    };

    tracing::info!("extracting compatibility matrix");
    let matrix = CompatibilityMatrix::from_readme(&readme)?;
    matrix.save(&args.output)?;

    let unsupported = matrix.features.values().filter(|f| !f.supported).count();
    println!(
        "{} {} features ({} unsupported) -> {}",
        "Compatibility matrix saved:".green().bold(),
        matrix.len(),
        unsupported,
        args.output.display()
    );

    if args.preview {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
    }

    Ok(())
}

async fn fetch_readme(url: &str) -> Result<String> {
    tracing::info!("fetching {}", url);
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to fetch {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("failed to fetch README: HTTP {}", response.status());
    }

    Ok(response.text().await?)
}
