//! Static compatibility analysis.
//!
//! Pattern-based, not a parser: `require('x')` and `... from 'x'` specifiers
//! are extracted with regexes and checked against the
//! [`CompatibilityMatrix`]. Dynamic `import()` calls are not detected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, LazyLock};

use crate::matrix::CompatibilityMatrix;

static REQUIRE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\(['"`]([^'"`]+)['"`]\)"#).expect("valid regex"));

static IMPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"from\s+['"`]([^'"`]+)['"`]"#).expect("valid regex"));

/// Findings for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Blocking problems; any issue makes the verdict incompatible.
    pub issues: Vec<String>,
    /// Advisory findings.
    pub warnings: Vec<String>,
}

impl AnalysisResult {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.warnings.is_empty()
    }
}

/// Static analyzer. Without a matrix only the textual heuristics run.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    matrix: Option<Arc<CompatibilityMatrix>>,
}

impl StaticAnalyzer {
    pub fn new(matrix: Option<Arc<CompatibilityMatrix>>) -> Self {
        Self { matrix }
    }

    /// Analyzer that only runs the textual heuristics.
    pub fn heuristics_only() -> Self {
        Self { matrix: None }
    }

    /// Analyze a file on disk. Read failures become a single issue.
    pub fn analyze_file(&self, path: &Path) -> AnalysisResult {
        match std::fs::read_to_string(path) {
            Ok(source) => self.analyze(&source),
            Err(e) => AnalysisResult {
                issues: vec![format!("Failed to analyze code: {}", e)],
                warnings: Vec::new(),
            },
        }
    }

    /// Analyze source text.
    pub fn analyze(&self, source: &str) -> AnalysisResult {
        let mut result = AnalysisResult::default();

        if let Some(matrix) = &self.matrix {
            for module in extract_modules(source) {
                let Some(support) = matrix.lookup(module) else {
                    continue;
                };

                if !support.supported {
                    result
                        .issues
                        .push(format!("Module '{}' is not supported in LLRT", module));
                } else if support.partially_supported && !support.supported {
                    // Unreachable for generated matrices: the generator marks
                    // every supported row as partially supported too.
                    result.warnings.push(format!(
                        "Module '{}' is only partially supported in LLRT",
                        module
                    ));
                }

                if support.use_fetch_instead {
                    result.warnings.push(format!(
                        "Consider using fetch instead of '{}' for better LLRT compatibility",
                        module
                    ));
                }
            }
        }

        if source.contains("__dirname") || source.contains("__filename") {
            result
                .warnings
                .push("__dirname and __filename may behave differently in LLRT".to_string());
        }

        if source.contains("process.exit") {
            result
                .warnings
                .push("process.exit() should be avoided in Lambda environments".to_string());
        }

        result
    }
}

/// Module specifiers referenced by `require` calls, then by `from` clauses,
/// each in source order. Repeated specifiers are kept once.
pub fn extract_modules(source: &str) -> Vec<&str> {
    let mut modules: Vec<&str> = Vec::new();
    let found = REQUIRE_CALL
        .captures_iter(source)
        .chain(IMPORT_FROM.captures_iter(source))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    for module in found {
        if !modules.contains(&module) {
            modules.push(module);
        }
    }
    modules
}
