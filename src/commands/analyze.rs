//! Analyze Command
//!
//! One-shot contract analysis and the plain-text report shared with the
//! chat `/analyze` command.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use sentinel_core::{AnalysisResult, ContractDescriptor, Severity};

use crate::commands::spawn_load_progress;
use crate::models::response::CommandResponse;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Render an analysis as a plain-text report.
pub fn render_report(contract: &ContractDescriptor, result: &AnalysisResult) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "Analysis of {} ({})", contract.name(), contract.language());
    let _ = writeln!(report);
    let _ = writeln!(report, "{}", result.summary.trim());

    let _ = writeln!(report);
    let _ = writeln!(report, "Vulnerabilities ({}):", result.vulnerabilities.len());
    if let Some(highest) = result.max_severity() {
        let counts: Vec<String> = [Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
            .into_iter()
            .map(|s| format!("{} {}", s, result.count_at(s)))
            .collect();
        let _ = writeln!(report, "  highest: {} ({})", highest, counts.join(", "));
    }
    if result.vulnerabilities.is_empty() {
        let _ = writeln!(report, "  none");
    }
    for (i, finding) in result.vulnerabilities.iter().enumerate() {
        let _ = writeln!(
            report,
            "  {}. [{}] {} at {}",
            i + 1,
            finding.severity.as_str().to_uppercase(),
            finding.category,
            finding.location
        );
        let _ = writeln!(report, "     {}", finding.description);
        let _ = writeln!(report, "     Fix: {}", finding.recommendation);
    }

    let _ = writeln!(report);
    let _ = writeln!(report, "Suggestions ({}):", result.suggestions.len());
    if result.suggestions.is_empty() {
        let _ = writeln!(report, "  none");
    }
    for (i, suggestion) in result.suggestions.iter().enumerate() {
        let _ = writeln!(
            report,
            "  {}. {} at {}",
            i + 1,
            suggestion.category,
            suggestion.location
        );
        let _ = writeln!(report, "     {}", suggestion.description);
        if let Some(code) = suggestion.code.as_deref().filter(|c| !c.trim().is_empty()) {
            for line in code.lines() {
                let _ = writeln!(report, "       {}", line);
            }
        }
    }

    report
}

/// Analyze the contract at `path` and print the report (or JSON envelope).
pub async fn run(
    state: &AppState,
    path: &Path,
    language: Option<&str>,
    json: bool,
    out: &mut dyn Write,
) -> AppResult<()> {
    let contract = ContractDescriptor::from_path(path, language)?;
    let conversation = state.conversation();
    conversation.select_contract(contract.clone());

    let progress = spawn_load_progress(conversation.session());
    let result = conversation.analyze_contract().await;
    progress.abort();

    match result {
        Ok(analysis) => {
            if json {
                let response = CommandResponse::ok(&analysis);
                writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
            } else {
                write!(out, "{}", render_report(&contract, &analysis))?;
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let response: CommandResponse<AnalysisResult> = CommandResponse::err(e.to_string());
                writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
            }
            Err(AppError::from(e))
        }
    }
}
