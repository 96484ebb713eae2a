//! Chat Command
//!
//! Interactive chat loop. Replies are printed live from the collector's
//! progress snapshots; slash commands select and analyze contracts.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use sentinel_core::{ChatRole, ContractDescriptor};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use crate::commands::analyze::render_report;
use crate::commands::spawn_load_progress;
use crate::services::conversation::{
    ConversationService, ANALYSIS_FALLBACK_MESSAGE, CHAT_FALLBACK_MESSAGE,
};
use crate::state::AppState;
use crate::utils::error::AppResult;

pub const HELP_TEXT: &str = "\
Commands:
  /contract <path> [language]  Select a contract file for analysis
  /analyze                     Analyze the selected contract
  /history                     Show the conversation
  /status                      Show model and session status
  /help                        Show this help
  /quit                        Leave the chat
Anything else is sent to the assistant.";

/// One line of chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Message(String),
    Contract {
        path: PathBuf,
        language: Option<String>,
    },
    Analyze,
    History,
    Status,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ReplCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplCommand::Message(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match parts.next().unwrap_or_default() {
            "contract" | "load" => match parts.next() {
                Some(path) => ReplCommand::Contract {
                    path: PathBuf::from(path),
                    language: parts.next().map(str::to_string),
                },
                None => ReplCommand::Invalid("usage: /contract <path> [language]".to_string()),
            },
            "analyze" => ReplCommand::Analyze,
            "history" => ReplCommand::History,
            "status" => ReplCommand::Status,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => ReplCommand::Invalid(format!("unknown command: /{} (try /help)", other)),
        }
    }
}

/// Print the part of `snapshot` beyond the first `printed` bytes.
fn print_suffix(out: &mut dyn Write, snapshot: &str, printed: usize) -> AppResult<usize> {
    match snapshot.get(printed..) {
        Some(suffix) if !suffix.is_empty() => {
            write!(out, "{}", suffix)?;
            out.flush()?;
            Ok(snapshot.len())
        }
        _ => Ok(printed),
    }
}

/// Run one chat turn, streaming the reply to `out` as it arrives.
async fn chat_turn(
    conversation: &ConversationService,
    text: &str,
    out: &mut dyn Write,
) -> AppResult<()> {
    let (tx, mut rx) = watch::channel(String::new());
    let turn = conversation.send_message(text, &tx);
    tokio::pin!(turn);

    let mut printed = 0;
    let result = loop {
        tokio::select! {
            result = &mut turn => break result,
            Ok(()) = rx.changed() => {
                let snapshot = rx.borrow_and_update().clone();
                printed = print_suffix(out, &snapshot, printed)?;
            }
        }
    };

    match result {
        Ok(reply) => {
            print_suffix(out, &reply, printed)?;
            writeln!(out)?;
        }
        Err(e) => {
            if printed > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", CHAT_FALLBACK_MESSAGE)?;
            tracing::debug!("Chat turn failed: {}", e);
        }
    }
    Ok(())
}

async fn analyze(conversation: &ConversationService, out: &mut dyn Write) -> AppResult<()> {
    let Some(contract) = conversation.contract() else {
        writeln!(out, "No contract selected. Use /contract <path> first.")?;
        return Ok(());
    };

    writeln!(out, "Analyzing {}...", contract.name())?;
    match conversation.analyze_contract().await {
        Ok(analysis) => {
            if let Some(summary) = conversation
                .visible_messages()
                .iter()
                .rev()
                .find(|m| m.role() == ChatRole::Assistant)
            {
                writeln!(out, "{}", summary.content())?;
            }
            writeln!(out)?;
            write!(out, "{}", render_report(&contract, &analysis))?;
        }
        Err(e) => {
            tracing::debug!("Analysis failed: {}", e);
            writeln!(out, "{}", ANALYSIS_FALLBACK_MESSAGE)?;
        }
    }
    Ok(())
}

fn print_history(conversation: &ConversationService, out: &mut dyn Write) -> AppResult<()> {
    for message in conversation.visible_messages() {
        match message.role() {
            ChatRole::Analysis => writeln!(out, "[analysis available]")?,
            role => writeln!(out, "{}: {}", role, message.content())?,
        }
    }
    Ok(())
}

async fn print_status(state: &AppState, out: &mut dyn Write) -> AppResult<()> {
    let status = state.status().await;
    writeln!(out, "backend:  {} ({})", status.backend, status.base_url)?;
    writeln!(out, "model:    {} [{}]", status.model, status.variant)?;
    writeln!(out, "session:  {}", status.session)?;
    if let Some(error) = state.conversation().session().last_error().await {
        writeln!(out, "error:    {}", error)?;
    }
    if let Some(progress) = state.conversation().session().subscribe_progress().borrow().clone() {
        writeln!(out, "progress: {}", progress)?;
    }
    writeln!(
        out,
        "contract: {}",
        status.contract.as_deref().unwrap_or("none")
    )?;
    writeln!(out, "analysis: {}", if status.has_analysis { "yes" } else { "no" })?;
    Ok(())
}

/// Start loading the model in the background with progress on stderr.
pub fn spawn_warm_up(conversation: Arc<ConversationService>) {
    let progress = spawn_load_progress(conversation.session());
    tokio::spawn(async move {
        if let Err(e) = conversation.warm_up().await {
            tracing::warn!("Model warm-up failed: {}", e);
            let _ = writeln!(std::io::stderr(), "[model] {}", e);
        }
        progress.abort();
    });
}

/// Run the interactive chat loop until `/quit` or end of input.
pub async fn run<R>(state: &AppState, input: R, out: &mut dyn Write, warm_up: bool) -> AppResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let conversation = state.conversation();
    if warm_up {
        spawn_warm_up(Arc::clone(conversation));
    }

    for message in conversation.visible_messages() {
        writeln!(out, "{}", message.content())?;
    }

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Message(text) => chat_turn(conversation, &text, out).await?,
            ReplCommand::Contract { path, language } => {
                match ContractDescriptor::from_path(&path, language.as_deref()) {
                    Ok(contract) => {
                        writeln!(
                            out,
                            "Selected {} ({}, {} bytes)",
                            contract.name(),
                            contract.language(),
                            contract.source().len()
                        )?;
                        conversation.select_contract(contract);
                    }
                    Err(e) => writeln!(out, "Could not load {}: {}", path.display(), e)?,
                }
            }
            ReplCommand::Analyze => analyze(conversation, out).await?,
            ReplCommand::History => print_history(conversation, out)?,
            ReplCommand::Status => print_status(state, out).await?,
            ReplCommand::Help => writeln!(out, "{}", HELP_TEXT)?,
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => writeln!(out, "{}", message)?,
        }
    }

    Ok(())
}
