//! Privileged command gate for shutdown and restart.
//!
//! Each session carries one flag per command kind:
//!
//! ```text
//!   Idle  --trigger-->       Armed   (command runs once)
//!   Armed --trigger-->       Armed   (no-op)
//!   Armed --other request--> Idle
//! ```
//!
//! The session hook calls [`GateFlags::on_request`] before every request. It
//! leaves alone only the flag belonging to the request's own command, so a
//! re-submitted shutdown form stays suppressed while any other request
//! re-enables it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Shutdown,
    Restart,
}

impl CommandKind {
    pub const ALL: [CommandKind; 2] = [CommandKind::Shutdown, CommandKind::Restart];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Shutdown => "shutdown",
            CommandKind::Restart => "restart",
        }
    }

    /// The command a request triggers, if any.
    pub fn for_request(method: &Method, path: &str) -> Option<Self> {
        if *method != Method::POST {
            return None;
        }
        match path.trim_end_matches('/') {
            "/shutdown" => Some(CommandKind::Shutdown),
            "/restart" => Some(CommandKind::Restart),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session armed flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateFlags {
    shutdown: bool,
    restart: bool,
}

impl GateFlags {
    pub fn is_armed(&self, kind: CommandKind) -> bool {
        match kind {
            CommandKind::Shutdown => self.shutdown,
            CommandKind::Restart => self.restart,
        }
    }

    pub(crate) fn set(&mut self, kind: CommandKind, armed: bool) {
        match kind {
            CommandKind::Shutdown => self.shutdown = armed,
            CommandKind::Restart => self.restart = armed,
        }
    }

    /// Pre-request hook: disarm every flag except the incoming request's own.
    pub fn on_request(&mut self, incoming: Option<CommandKind>) {
        for kind in CommandKind::ALL {
            if incoming != Some(kind) {
                self.set(kind, false);
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command configured for {0}")]
    NotConfigured(CommandKind),

    #[error("failed to start {kind} command: {source}")]
    Spawn {
        kind: CommandKind,
        source: std::io::Error,
    },

    #[error("{kind} command exited with {status}")]
    Exit { kind: CommandKind, status: String },
}

/// Runs the actual system command.
#[async_trait]
pub trait SystemCommander: Send + Sync + 'static {
    async fn execute(&self, kind: CommandKind) -> Result<(), CommandError>;
}

/// Runs configured argv lists as child processes.
#[derive(Debug, Clone)]
pub struct ProcessCommander {
    shutdown: Vec<String>,
    restart: Vec<String>,
}

impl ProcessCommander {
    pub fn new(shutdown: Vec<String>, restart: Vec<String>) -> Self {
        Self { shutdown, restart }
    }

    fn argv(&self, kind: CommandKind) -> &[String] {
        match kind {
            CommandKind::Shutdown => &self.shutdown,
            CommandKind::Restart => &self.restart,
        }
    }
}

#[async_trait]
impl SystemCommander for ProcessCommander {
    async fn execute(&self, kind: CommandKind) -> Result<(), CommandError> {
        let (program, args) = self
            .argv(kind)
            .split_first()
            .ok_or(CommandError::NotConfigured(kind))?;

        info!(command = %kind, program = %program, "Running system command");

        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|source| CommandError::Spawn { kind, source })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exit {
                kind,
                status: status.to_string(),
            })
        }
    }
}

#[derive(Debug)]
pub enum GateOutcome {
    /// The flag was idle; the command was launched.
    Executed(JoinHandle<Result<(), CommandError>>),
    /// The flag was already armed; nothing ran.
    Suppressed,
}

impl GateOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, GateOutcome::Executed(_))
    }
}

pub struct CommandGate {
    commander: Arc<dyn SystemCommander>,
}

impl CommandGate {
    pub fn new(commander: Arc<dyn SystemCommander>) -> Self {
        Self { commander }
    }

    /// Fire `kind` unless it is already armed in `flags`.
    ///
    /// Only spawns; safe to call while holding the session entry.
    pub fn trigger(&self, flags: &mut GateFlags, kind: CommandKind) -> GateOutcome {
        if flags.is_armed(kind) {
            warn!(command = %kind, "Suppressing repeated command in the same session");
            return GateOutcome::Suppressed;
        }

        flags.set(kind, true);

        let commander = Arc::clone(&self.commander);
        let handle = tokio::spawn(async move {
            let result = commander.execute(kind).await;
            if let Err(ref e) = result {
                error!(command = %kind, error = %e, "System command failed");
            }
            result
        });

        GateOutcome::Executed(handle)
    }
}
