use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;

use crate::backend::CompletionBackend;
use crate::config::RuntimeConfig;
use crate::conversation::{build_conversation, conversation_chars, estimate_tokens};
use crate::error::GuideError;
use crate::handoff::write_handoff;
use crate::segment::segment_response;
use crate::selector::{SelectionOutcome, select_candidate};
use crate::session::{Session, Turn};
use crate::telemetry::TelemetrySink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverSettings {
    pub history_depth: Option<usize>,
    pub max_rounds: Option<u32>,
    pub backend_timeout: Option<Duration>,
}

impl DriverSettings {
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            history_depth: cfg.history_depth,
            max_rounds: cfg.max_rounds,
            backend_timeout: cfg.backend_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Selected(String),
    Aborted,
}

/// Backends sometimes return `\n` as two literal characters.
pub fn normalize_escaped_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

pub struct SessionDriver<'a> {
    backend: &'a dyn CompletionBackend,
    settings: DriverSettings,
    telemetry: &'a TelemetrySink,
}

impl<'a> SessionDriver<'a> {
    pub fn new(
        backend: &'a dyn CompletionBackend,
        settings: DriverSettings,
        telemetry: &'a TelemetrySink,
    ) -> Self {
        Self {
            backend,
            settings,
            telemetry,
        }
    }

    /// Runs rounds until the operator picks a command or exits.
    ///
    /// `initial_prompt` only feeds the first round. A backend failure ends the
    /// session with an error; the turns recorded so far stay in `session`.
    pub async fn run<R: BufRead, W: Write>(
        &self,
        session: &mut Session,
        initial_prompt: Option<String>,
        input: &mut R,
        out: &mut W,
    ) -> Result<SessionOutcome> {
        let mut pending_prompt = initial_prompt;
        let mut round: u32 = 0;

        loop {
            if let Some(max_rounds) = self.settings.max_rounds.filter(|max| round >= *max) {
                tracing::warn!(max_rounds, "round limit reached without a selection");
                return Err(GuideError::RoundLimitReached { max_rounds }.into());
            }

            let prompt = match pending_prompt.take() {
                Some(prompt) => prompt,
                None => match read_prompt(input, out)? {
                    Some(prompt) => prompt,
                    None => return self.abort(round, out),
                },
            };
            round += 1;

            let raw_response = match self.request_candidates(session, &prompt, round).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::error!(round, error = %err, "round abandoned");
                    self.telemetry.emit(
                        "round.failed",
                        json!({ "round": round, "error": err.to_string() }),
                    );
                    return Err(err.into());
                }
            };

            let candidates = segment_response(&raw_response);
            session.record_turn(Turn::new(prompt, raw_response));

            tracing::info!(
                round,
                turns = session.len(),
                candidates = candidates.len(),
                "round completed"
            );
            self.telemetry.emit(
                "round.completed",
                json!({ "round": round, "candidates": candidates.len() }),
            );

            match select_candidate(&candidates, input, out)? {
                SelectionOutcome::NeedsMoreContext => {
                    self.emit_selection(round, "more_context");
                    writeln!(out, "Please provide more context.")?;
                }
                SelectionOutcome::Aborted => {
                    self.emit_selection(round, "aborted");
                    return self.abort(round, out);
                }
                SelectionOutcome::Chosen(command) => {
                    self.emit_selection(round, "chosen");
                    return Ok(SessionOutcome::Selected(command));
                }
            }
        }
    }

    async fn request_candidates(
        &self,
        session: &Session,
        prompt: &str,
        round: u32,
    ) -> std::result::Result<String, GuideError> {
        let conversation = build_conversation(session, prompt, self.settings.history_depth);
        let backend = self.backend.name();
        tracing::info!(
            round,
            backend,
            messages = conversation.len(),
            est_tokens = estimate_tokens(conversation_chars(&conversation)),
            "requesting candidates"
        );

        let started = Instant::now();
        let call = self.backend.generate(&conversation);
        let raw = match self.settings.backend_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                GuideError::BackendTimeout {
                    backend: backend.to_string(),
                    secs: limit.as_secs(),
                }
            })??,
            None => call.await?,
        };
        tracing::debug!(
            backend,
            elapsed_ms = started.elapsed().as_millis() as u64,
            response_chars = raw.len(),
            "backend call finished"
        );

        let normalized = normalize_escaped_newlines(&raw);
        if normalized.trim().is_empty() {
            return Err(GuideError::EmptyResponse {
                backend: backend.to_string(),
            });
        }
        Ok(normalized)
    }

    fn emit_selection(&self, round: u32, outcome: &str) {
        self.telemetry.emit(
            "selection.resolved",
            json!({ "round": round, "outcome": outcome }),
        );
    }

    fn abort<W: Write>(&self, round: u32, out: &mut W) -> Result<SessionOutcome> {
        writeln!(out, "Exiting.")?;
        self.telemetry
            .emit("session.aborted", json!({ "rounds": round }));
        Ok(SessionOutcome::Aborted)
    }
}

/// Reads the next non-blank prompt. `None` when input is closed.
pub fn read_prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Option<String>> {
    loop {
        write!(out, "Prompt: ")?;
        out.flush().context("failed to flush prompt output")?;

        let mut line = String::new();
        let read = input
            .read_line(&mut line)
            .context("failed to read prompt input")?;
        if read == 0 {
            writeln!(out)?;
            return Ok(None);
        }

        let prompt = line.trim();
        if !prompt.is_empty() {
            return Ok(Some(prompt.to_string()));
        }
    }
}

pub fn require_handoff_path(cfg: &RuntimeConfig) -> Result<&Path> {
    cfg.handoff_path.as_deref().map(Path::new).ok_or_else(|| {
        anyhow::anyhow!("missing required --tempfile <PATH>; the selected command is written there")
    })
}

/// One synthesis run: drive the loop, then hand the chosen command off.
pub async fn run_guide_session<R: BufRead, W: Write>(
    cfg: &RuntimeConfig,
    backend: &dyn CompletionBackend,
    telemetry: &TelemetrySink,
    input: &mut R,
    out: &mut W,
) -> Result<SessionOutcome> {
    let handoff_path = require_handoff_path(cfg)?;

    let mut session = Session::new(cfg.environment_context.clone());
    let driver = SessionDriver::new(backend, DriverSettings::from_config(cfg), telemetry);
    telemetry.emit(
        "session.started",
        json!({
            "backend": backend.name(),
            "initial_prompt": cfg.initial_prompt.is_some(),
            "history_depth": cfg.history_depth,
            "max_rounds": cfg.max_rounds,
        }),
    );

    let outcome = driver
        .run(&mut session, cfg.initial_prompt.clone(), input, out)
        .await?;

    if let SessionOutcome::Selected(command) = &outcome {
        write_handoff(handoff_path, command)?;
        telemetry.emit(
            "handoff.written",
            json!({ "rounds": session.len(), "command_chars": command.len() }),
        );
    }
    Ok(outcome)
}
