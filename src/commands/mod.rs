//! CLI Commands
//!
//! Handlers behind the `contract-sentinel` subcommands.

pub mod analyze;
pub mod chat;
pub mod config;

use std::io::Write;

use sentinel_llm::ModelSession;
use tokio::task::JoinHandle;

/// Print model load progress to stderr until the returned task is aborted.
pub fn spawn_load_progress(session: &ModelSession) -> JoinHandle<()> {
    let mut progress = session.subscribe_progress();
    tokio::spawn(async move {
        let mut last = String::new();
        while progress.changed().await.is_ok() {
            let Some(report) = progress.borrow_and_update().clone() else {
                continue;
            };
            let line = report.to_string();
            if line != last {
                let mut stderr = std::io::stderr();
                let _ = writeln!(stderr, "[model] {}", line);
                last = line;
            }
        }
    })
}
