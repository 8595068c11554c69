//! # llrt-check
//!
//! Checks whether a Lambda handler behaves the same under Node.js and LLRT.
//!
//! A check combines:
//! - static analysis of `require`/`import` specifiers against the LLRT
//!   compatibility matrix ([`analyzer`], [`matrix`]);
//! - a Node.js pass that receives the event on stdin and an LLRT pass that
//!   fetches it from an emulated Lambda Runtime API ([`executor`], [`emulator`]);
//! - a [`Verdict`] with an advisory performance comparison ([`checker`]).

#![warn(clippy::all)]

pub mod analyzer;
pub mod binary;
pub mod checker;
pub mod config;
pub mod emulator;
pub mod error;
pub mod executor;
pub mod harness;
pub mod invocation;
pub mod matrix;
pub mod report;

pub use analyzer::{AnalysisResult, StaticAnalyzer};
pub use checker::{ComparisonEngine, PerformanceComparison, PerformanceVerdict, Verdict};
pub use config::CheckerConfig;
pub use emulator::InvocationEmulator;
pub use error::{CheckError, CheckResult, EmulatorError};
pub use executor::{ExecutionFailure, ExecutionResult, RuntimeExecutor, RuntimeKind};
pub use matrix::{CompatibilityMatrix, FeatureSupport};
pub use report::PersistedReport;
