//! Audible confirmation of pin toggles.
//!
//! The panel plays `{pin}-{on|off}.mp3` through an external player. Playback is
//! fire-and-forget: the dispatcher spawns the call and only logs failures.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tracing::debug;

use crate::dispatch::Intent;
use crate::registry::PinId;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("no audio clip at {0}")]
    MissingClip(PathBuf),

    #[error("failed to start {player}: {source}")]
    Spawn {
        player: String,
        source: std::io::Error,
    },

    #[error("{player} exited with {status}")]
    Exit { player: String, status: String },
}

#[async_trait]
pub trait AudioNotifier: Send + Sync + 'static {
    async fn notify(&self, pin: PinId, intent: Intent) -> Result<(), NotifierError>;
}

/// Clip file name for a pin action.
pub fn clip_name(pin: PinId, intent: Intent) -> String {
    format!("{}-{}.mp3", pin, intent.token())
}

/// Plays clips from a directory with an external command-line player.
#[derive(Debug, Clone)]
pub struct PlayerNotifier {
    player: String,
    audio_dir: PathBuf,
}

impl PlayerNotifier {
    pub fn new(player: impl Into<String>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            audio_dir: audio_dir.into(),
        }
    }

    pub fn clip_path(&self, pin: PinId, intent: Intent) -> PathBuf {
        absolute(&self.audio_dir.join(clip_name(pin, intent)))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl AudioNotifier for PlayerNotifier {
    async fn notify(&self, pin: PinId, intent: Intent) -> Result<(), NotifierError> {
        let clip = self.clip_path(pin, intent);
        if !tokio::fs::try_exists(&clip).await.unwrap_or(false) {
            return Err(NotifierError::MissingClip(clip));
        }

        debug!(player = %self.player, clip = %clip.display(), "Playing confirmation");

        let status = tokio::process::Command::new(&self.player)
            .arg(&clip)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|source| NotifierError::Spawn {
                player: self.player.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(NotifierError::Exit {
                player: self.player.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// Used when audio is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

#[async_trait]
impl AudioNotifier for SilentNotifier {
    async fn notify(&self, _pin: PinId, _intent: Intent) -> Result<(), NotifierError> {
        Ok(())
    }
}
