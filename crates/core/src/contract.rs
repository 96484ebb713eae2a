//! Contract and Analysis Types
//!
//! [`ContractDescriptor`] is an immutable snapshot of the contract under
//! review. Editing a contract produces a new descriptor; nothing mutates one
//! in place.
//!
//! [`AnalysisResult`] is the typed form of the model's structured report. It
//! is only ever constructed whole, from a fully validated response.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Language assumed when a file extension is not recognised.
pub const DEFAULT_LANGUAGE: &str = "solidity";

/// Smart-contract source selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    name: String,
    #[serde(rename = "code")]
    source: String,
    language: String,
}

impl ContractDescriptor {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            language: language.into(),
        }
    }

    /// Read a contract from disk.
    ///
    /// The name is the file stem; the language is `language` when given,
    /// otherwise inferred from the extension.
    pub fn from_path(path: &Path, language: Option<&str>) -> CoreResult<Self> {
        let source = std::fs::read_to_string(path)?;
        if source.trim().is_empty() {
            return Err(CoreError::validation(format!(
                "contract file is empty: {}",
                path.display()
            )));
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CoreError::validation(format!("invalid file name: {}", path.display())))?
            .to_string();

        let language = match language {
            Some(lang) => lang.to_string(),
            None => language_for_path(path).to_string(),
        };

        Ok(Self::new(name, source, language))
    }

    /// Return a new descriptor with replaced source code.
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            source: source.into(),
            language: self.language.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

/// Infer a contract language tag from a file extension.
pub fn language_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("sol") => "solidity",
        Some("vy") => "vyper",
        Some("rs") => "rust",
        Some("move") => "move",
        Some("cairo") => "cairo",
        Some("fc") | Some("func") => "func",
        _ => DEFAULT_LANGUAGE,
    }
}

/// Severity of a finding. Anything outside these four levels is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(CoreError::validation(format!("unknown severity: {}", other))),
        }
    }
}

/// A vulnerability reported by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type", alias = "category")]
    pub category: String,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub recommendation: String,
}

/// An improvement suggestion reported by the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type", alias = "category")]
    pub category: String,
    pub description: String,
    pub location: String,
    /// Example code illustrating the suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Structured analysis of one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub vulnerabilities: Vec<Finding>,
    pub suggestions: Vec<Suggestion>,
    pub summary: String,
}

impl AnalysisResult {
    /// Highest severity among the findings, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.vulnerabilities.iter().map(|f| f.severity).max()
    }

    /// Number of findings at the given severity.
    pub fn count_at(&self, severity: Severity) -> usize {
        self.vulnerabilities
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}
