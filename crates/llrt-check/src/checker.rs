//! Node.js vs LLRT comparison engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analyzer::{AnalysisResult, StaticAnalyzer};
use crate::binary;
use crate::config::CheckerConfig;
use crate::emulator::InvocationEmulator;
use crate::error::{CheckError, CheckResult};
use crate::executor::{ExecutionResult, RuntimeExecutor, RuntimeKind};
use crate::harness::WrapperScript;
use crate::invocation::synthetic_event;
use crate::matrix::CompatibilityMatrix;

/// Relative speed above which one runtime counts as faster.
const FASTER_THRESHOLD: f64 = 1.1;
const SLOWER_THRESHOLD: f64 = 0.9;

/// Final result of one compatibility check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// `target.success && analysis.issues.is_empty()`.
    pub compatible: bool,
    pub baseline: ExecutionResult,
    pub target: ExecutionResult,
    pub analysis: AnalysisResult,
    /// Only present when both runs succeeded.
    pub performance: Option<PerformanceComparison>,
    /// Both runtimes printed the same stdout.
    pub output_matches: bool,
    /// Non-fatal configuration problems (e.g. missing matrix).
    #[serde(default)]
    pub notices: Vec<String>,
}

impl Verdict {
    pub fn new(
        analysis: AnalysisResult,
        baseline: ExecutionResult,
        target: ExecutionResult,
        notices: Vec<String>,
    ) -> Self {
        Self {
            compatible: target.success && analysis.issues.is_empty(),
            performance: PerformanceComparison::between(&baseline, &target),
            output_matches: baseline.stdout == target.stdout,
            baseline,
            target,
            analysis,
            notices,
        }
    }
}

/// Which runtime came out ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceVerdict {
    TargetFaster,
    BaselineFaster,
    Similar,
}

/// Advisory timing comparison; never affects compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub baseline_ms: u64,
    pub target_ms: u64,
    /// `baseline_ms / target_ms`; above 1 means LLRT was faster.
    pub speedup: f64,
}

impl PerformanceComparison {
    pub fn between(baseline: &ExecutionResult, target: &ExecutionResult) -> Option<Self> {
        if !(baseline.success && target.success) {
            return None;
        }
        Some(Self::from_millis(baseline.elapsed_ms, target.elapsed_ms))
    }

    pub fn from_millis(baseline_ms: u64, target_ms: u64) -> Self {
        Self {
            baseline_ms,
            target_ms,
            speedup: baseline_ms.max(1) as f64 / target_ms.max(1) as f64,
        }
    }

    pub fn verdict(&self) -> PerformanceVerdict {
        if self.speedup > FASTER_THRESHOLD {
            PerformanceVerdict::TargetFaster
        } else if self.speedup < SLOWER_THRESHOLD {
            PerformanceVerdict::BaselineFaster
        } else {
            PerformanceVerdict::Similar
        }
    }

    pub fn summary(&self) -> String {
        match self.verdict() {
            PerformanceVerdict::TargetFaster => format!(
                "{} is {:.2}x faster",
                RuntimeKind::Target,
                self.speedup
            ),
            PerformanceVerdict::BaselineFaster => format!(
                "{} is {:.2}x faster",
                RuntimeKind::Baseline,
                1.0 / self.speedup
            ),
            PerformanceVerdict::Similar => "Similar performance".to_string(),
        }
    }
}

/// Runs static analysis plus a Node.js and an LLRT pass over a handler.
pub struct ComparisonEngine {
    config: CheckerConfig,
    /// Base for resolving the LLRT binary.
    cwd: PathBuf,
    matrix: Option<Arc<CompatibilityMatrix>>,
    matrix_loaded: bool,
    matrix_notice: Option<String>,
    wrapper: Option<WrapperScript>,
}

impl ComparisonEngine {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            config,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            matrix: None,
            matrix_loaded: false,
            matrix_notice: None,
            wrapper: None,
        }
    }

    /// Use an already-loaded matrix instead of reading `matrix_path`.
    pub fn with_matrix(mut self, matrix: Arc<CompatibilityMatrix>) -> Self {
        self.matrix = Some(matrix);
        self.matrix_loaded = true;
        self.matrix_notice = None;
        self
    }

    pub fn with_working_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn matrix(&self) -> Option<&Arc<CompatibilityMatrix>> {
        self.matrix.as_ref()
    }

    /// Load the matrix once. Failure degrades analysis to heuristics only.
    fn ensure_matrix(&mut self) {
        if self.matrix_loaded {
            return;
        }
        self.matrix_loaded = true;

        match CompatibilityMatrix::load(&self.config.matrix_path) {
            Ok(matrix) => {
                tracing::debug!(
                    "loaded {} matrix entries from {}",
                    matrix.len(),
                    self.config.matrix_path.display()
                );
                self.matrix = Some(Arc::new(matrix));
            }
            Err(e) => {
                tracing::warn!("Could not load compatibility data: {}", e);
                self.matrix_notice = Some(format!(
                    "Could not load compatibility data ({}); static analysis is limited to heuristics",
                    e
                ));
            }
        }
    }

    /// Wrapper script, materialized on first use and kept for the engine's lifetime.
    fn wrapper_path(&mut self) -> CheckResult<PathBuf> {
        let wrapper = match self.wrapper.take() {
            Some(wrapper) => wrapper,
            None => WrapperScript::resolve(self.config.wrapper_path.as_deref())?,
        };
        let path = wrapper.path().to_path_buf();
        self.wrapper = Some(wrapper);
        Ok(path)
    }

    /// Static analysis only.
    pub fn analyze(&mut self, handler: &Path) -> AnalysisResult {
        self.ensure_matrix();
        StaticAnalyzer::new(self.matrix.clone()).analyze_file(handler)
    }

    /// Full compatibility check of `handler`.
    ///
    /// Errors only for configuration problems (missing handler file, no LLRT
    /// binary, wrapper not writable). Runtime failures end up in the verdict.
    pub async fn run(&mut self, handler: &Path) -> CheckResult<Verdict> {
        let handler = std::path::absolute(handler)?;
        if !handler.is_file() {
            return Err(CheckError::HandlerNotFound(handler));
        }

        self.ensure_matrix();
        let target_binary = binary::find_llrt(self.config.llrt_binary.as_deref(), &self.cwd)?;
        let wrapper = self.wrapper_path()?;

        tracing::info!("checking {}", handler.display());
        let analysis = StaticAnalyzer::new(self.matrix.clone()).analyze_file(&handler);

        let executor = RuntimeExecutor::from_config(&self.config, target_binary, wrapper);
        let payload = synthetic_event();
        let mut emulator = InvocationEmulator::new(self.config.emulator_bind_addr());

        let baseline = executor
            .execute(&handler, RuntimeKind::Baseline, &payload, &mut emulator)
            .await;
        let target = executor
            .execute(&handler, RuntimeKind::Target, &payload, &mut emulator)
            .await;

        emulator.stop().await;

        let notices = self.matrix_notice.iter().cloned().collect();
        Ok(Verdict::new(analysis, baseline, target, notices))
    }
}
