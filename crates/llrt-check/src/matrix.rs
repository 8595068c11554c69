//! LLRT compatibility matrix.
//!
//! A read-only table of per-module support flags, loaded once from
//! `llrt-compatibility.json` and shared by reference. The table is generated
//! from the "Compatibility matrix" section of the LLRT README, see
//! [`CompatibilityMatrix::from_readme`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use crate::error::{CheckError, CheckResult};

/// Upstream README the matrix is scraped from.
pub const LLRT_README_URL: &str = "https://raw.githubusercontent.com/awslabs/llrt/main/README.md";

const MATRIX_HEADING: &str = "## Compatibility matrix";
const LEGEND_HEADING: &str = "## Legend";

static LEGEND_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_?\s*(\S+)\s*=\s*(.+?)\s*_?\s*$").expect("valid regex"));

/// Support flags for a single module or API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureSupport {
    pub supported: bool,
    pub partially_supported: bool,
    pub planned_support: bool,
    pub not_native: bool,
    pub use_fetch_instead: bool,
}

impl FeatureSupport {
    /// Derive flags from an LLRT status cell such as `✔︎⚠️` or `✘⏱`.
    pub fn from_status(status: &str) -> Self {
        let supported = !status.contains('✘');
        Self {
            supported,
            // Every supported row also counts as partially supported.
            partially_supported: supported || status.contains('⚠'),
            planned_support: status.contains('⏱'),
            not_native: status.contains('*'),
            use_fetch_instead: status.contains("**"),
        }
    }
}

/// Feature table plus the README legend it was built from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatibilityMatrix {
    pub features: BTreeMap<String, FeatureSupport>,
    #[serde(default)]
    pub legend: BTreeMap<String, String>,
}

impl CompatibilityMatrix {
    /// Load a matrix from its JSON file.
    pub fn load(path: &Path) -> CheckResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CheckError::Matrix(format!("failed to read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CheckError::Matrix(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Write the matrix as pretty JSON.
    pub fn save(&self, path: &Path) -> CheckResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Look up a module by specifier. `node:`-prefixed specifiers fall back
    /// to the bare name.
    pub fn lookup(&self, module: &str) -> Option<&FeatureSupport> {
        self.features.get(module).or_else(|| {
            module
                .strip_prefix("node:")
                .and_then(|bare| self.features.get(bare))
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Build a matrix from the LLRT README markdown.
    pub fn from_readme(markdown: &str) -> CheckResult<Self> {
        let legend = parse_legend(markdown);
        let features = parse_matrix_table(markdown)?;
        Ok(Self { features, legend })
    }
}

fn default_legend() -> BTreeMap<String, String> {
    [
        ("⚠️", "partially supported in LLRT"),
        ("⏱", "planned partial support"),
        ("*", "Not native"),
        ("**", "Use fetch instead"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn parse_legend(markdown: &str) -> BTreeMap<String, String> {
    let Some(start) = markdown.find(LEGEND_HEADING) else {
        return default_legend();
    };
    let body = &markdown[start + LEGEND_HEADING.len()..];
    let section = match body.find("##") {
        Some(end) => &body[..end],
        None => body,
    };

    let legend: BTreeMap<String, String> = section
        .lines()
        .filter_map(|line| LEGEND_LINE.captures(line.trim()))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    if legend.is_empty() {
        default_legend()
    } else {
        legend
    }
}

fn parse_matrix_table(markdown: &str) -> CheckResult<BTreeMap<String, FeatureSupport>> {
    let start = markdown
        .find(MATRIX_HEADING)
        .ok_or_else(|| CheckError::Matrix("could not find compatibility matrix section".into()))?;
    let after = &markdown[start..];
    let table_start = after
        .find('|')
        .ok_or_else(|| CheckError::Matrix("compatibility matrix section has no table".into()))?;
    let table = &after[table_start..];
    let table = match table.find("\n\n") {
        Some(end) => &table[..end],
        None => table,
    };

    let mut features = BTreeMap::new();
    // Row 0 is the header, row 1 the `|---|` separator.
    for line in table.lines().filter(|l| !l.trim().is_empty()).skip(2) {
        let cells = split_row(line);
        if cells.len() < 3 || cells[0].is_empty() {
            continue;
        }
        features.insert(cells[0].to_string(), FeatureSupport::from_status(cells[2]));
    }

    if features.is_empty() {
        return Err(CheckError::Matrix("compatibility matrix table has no rows".into()));
    }
    Ok(features)
}

fn split_row(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim).collect()
}
