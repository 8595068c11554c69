//! Verdict reporting.

use colored::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::checker::{PerformanceVerdict, Verdict};
use crate::executor::ExecutionResult;

/// Print a colored report of `verdict` to stdout.
///
/// `verbose` also prints both runtimes' stdout and stderr.
pub fn print_verdict(file: &Path, verdict: &Verdict, verbose: bool) {
    println!("{} {}", "Compatibility check for:".bold().cyan(), file.display());

    for notice in &verdict.notices {
        println!("{} {}", "!".yellow(), notice);
    }

    println!();
    println!("{}", "=== Static Analysis ===".bold().cyan());
    let analysis = &verdict.analysis;
    if !analysis.issues.is_empty() {
        println!("Issues found:");
        for issue in &analysis.issues {
            println!("  {} {}", "x".red().bold(), issue);
        }
    }
    if !analysis.warnings.is_empty() {
        println!("Warnings:");
        for warning in &analysis.warnings {
            println!("  {} {}", "!".yellow(), warning);
        }
    }
    if analysis.is_clean() {
        println!("  {}", "No obvious compatibility issues detected".green());
    }

    println!();
    println!("{}", "=== Runtime Results ===".bold().cyan());
    print_run(&verdict.baseline);
    print_run(&verdict.target);

    if let Some(perf) = &verdict.performance {
        let summary = perf.summary();
        let line = match perf.verdict() {
            PerformanceVerdict::TargetFaster => summary.green(),
            PerformanceVerdict::BaselineFaster => summary.yellow(),
            PerformanceVerdict::Similar => summary.normal(),
        };
        println!("{}", line);
    }

    if verbose {
        for run in [&verdict.baseline, &verdict.target] {
            println!();
            println!("{} stdout:\n{}", run.runtime, or_empty(&run.stdout));
            println!("{} stderr:\n{}", run.runtime, or_empty(&run.stderr));
        }
    } else {
        if !verdict.output_matches {
            println!();
            println!("{}", "=== Output Differences ===".bold().yellow());
            println!("{} output: {}", verdict.baseline.runtime, or_empty(&verdict.baseline.stdout));
            println!("{} output: {}", verdict.target.runtime, or_empty(&verdict.target.stdout));
        }
        if !verdict.target.stderr.is_empty() {
            println!();
            let label = format!("{} stderr:", verdict.target.runtime);
            println!("{} {}", label.yellow(), verdict.target.stderr);
        }
    }

    println!();
    println!("{}", "=== Final Result ===".bold().cyan());
    if verdict.compatible {
        println!("{}", "Your code appears to be compatible with LLRT".green().bold());
    } else {
        println!("{}", "Your code may have compatibility issues with LLRT".red().bold());
    }
}

fn print_run(run: &ExecutionResult) {
    let status = if run.success { "PASS".green() } else { "FAIL".red() };
    let label = format!("{}:", run.runtime);
    match (&run.failure, run.exit_code) {
        (Some(failure), _) => {
            println!("{:<9}[{}] ({}ms) - {}", label, status, run.elapsed_ms, failure)
        }
        (None, Some(code)) => {
            println!("{:<9}[{}] ({}ms, exit {})", label, status, run.elapsed_ms, code)
        }
        (None, None) => {
            println!("{:<9}[{}] ({}ms, killed by signal)", label, status, run.elapsed_ms)
        }
    }
}

fn or_empty(s: &str) -> &str {
    if s.is_empty() { "(empty)" } else { s }
}

/// Export a verdict to JSON.
pub fn to_json(verdict: &Verdict) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(verdict)
}

/// Persisted report for saving to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedReport {
    pub timestamp: String,
    pub checker_version: String,
    pub file: PathBuf,
    pub verdict: Verdict,
}

impl PersistedReport {
    pub fn new(file: &Path, verdict: Verdict) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            checker_version: env!("CARGO_PKG_VERSION").to_string(),
            file: file.to_path_buf(),
            verdict,
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
