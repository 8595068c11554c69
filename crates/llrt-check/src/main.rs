use anyhow::Result;
use clap::{ArgAction, Parser};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

use llrt_check::config::CheckerConfig;
use llrt_check::{ComparisonEngine, PersistedReport, report};

const DEFAULT_REPORT_PATH: &str = "llrt-check-reports/latest.json";

const EXAMPLES: &str = "Examples:
  llrt-check ./src/hello.js
  llrt-check --llrt ./bootstrap ./my-lambda-function.js";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "llrt-check", version)]
#[command(about = "Check whether a Lambda handler is compatible with the LLRT runtime")]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Handler file to check
    file: PathBuf,

    /// Verbosity level: -v prints runtime output and info logs, -vv debug logs
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Path to config file (default: llrt_check.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compatibility matrix JSON
    #[arg(long)]
    matrix: Option<PathBuf>,

    /// LLRT binary
    #[arg(long)]
    llrt: Option<PathBuf>,

    /// Node.js binary
    #[arg(long)]
    node: Option<PathBuf>,

    /// Timeout in seconds per runtime
    #[arg(long)]
    timeout: Option<u64>,

    /// Port for the Lambda Runtime API emulator
    #[arg(long)]
    port: Option<u16>,

    /// Handler export to invoke
    #[arg(long)]
    export: Option<String>,

    /// Output the verdict as JSON
    #[arg(long)]
    json: bool,

    /// Save the verdict to a JSON file
    #[arg(long)]
    save: Option<Option<PathBuf>>,
}

impl Cli {
    fn apply_overrides(&self, config: &mut CheckerConfig) {
        if let Some(ref matrix) = self.matrix {
            config.matrix_path = matrix.clone();
        }
        if let Some(ref llrt) = self.llrt {
            config.llrt_binary = Some(llrt.clone());
        }
        if let Some(ref node) = self.node {
            config.node_binary = node.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref export) = self.export {
            config.handler_export = export.clone();
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help / --version go to stdout and succeed.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();
    Ok(())
}

/// Returns whether the handler is compatible.
async fn run(cli: Cli) -> Result<bool> {
    let mut config = CheckerConfig::load_or_default(cli.config.as_deref());
    cli.apply_overrides(&mut config);

    let file = std::path::absolute(&cli.file)?;
    let mut engine = ComparisonEngine::new(config);
    let verdict = engine.run(&file).await?;

    if cli.json {
        println!("{}", report::to_json(&verdict)?);
    } else {
        report::print_verdict(&file, &verdict, cli.verbose > 0);
    }

    let save_path = cli
        .save
        .map(|path| path.unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH)));
    let compatible = verdict.compatible;

    if let Some(save_path) = save_path {
        let persisted = PersistedReport::new(&file, verdict);
        match persisted.save(&save_path) {
            Ok(()) => {
                if !cli.json {
                    eprintln!("Results saved to {}", save_path.display());
                }
            }
            Err(e) => eprintln!("Failed to save results: {}", e),
        }
    }

    Ok(compatible)
}
