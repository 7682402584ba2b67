//! Local audio playback through an external player process.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::ToolError;
use crate::tool::{ParamExt, Tool, ToolContext};

/// Configuration for the player process.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Player executable.
    pub program: String,
    /// Arguments placed before the file path.
    pub args: Vec<String>,
    /// Upper bound on playback duration.
    pub timeout: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Plays an audio artifact and waits for it to finish.
#[derive(Debug, Clone, Default)]
pub struct AudioPlaybackTool {
    config: PlaybackConfig,
}

impl AudioPlaybackTool {
    pub fn new(config: PlaybackConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for AudioPlaybackTool {
    fn name(&self) -> &str {
        "audio_playback"
    }

    fn description(&self) -> &str {
        "Play a synthesized audio artifact on the local audio device and wait until playback completes."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the audio file"
                },
                "artifact_id": {
                    "type": "string",
                    "description": "Artifact being played, for logging"
                }
            },
            "required": ["path"]
        })
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let path = input.required_str("path")?;
        let artifact_id = input.optional_str("artifact_id").unwrap_or(path);

        if !Path::new(path).is_file() {
            return Err(ToolError::invalid_input(format!(
                "audio file '{}' does not exist",
                path
            )));
        }

        tracing::info!(
            run_id = %ctx.run_id,
            step = %ctx.step_id,
            artifact = artifact_id,
            player = %self.config.program,
            "Playing audio"
        );

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ToolError::Unavailable(format!(
                    "cannot start player '{}': {}",
                    self.config.program, e
                ))
            })?;

        let status = match timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ToolError::Unavailable(format!("player failed: {}", e)));
            }
            Err(_) => {
                // kill_on_drop reaps the child
                return Err(ToolError::Timeout(self.config.timeout));
            }
        };

        if !status.success() {
            return Err(ToolError::RemoteRejection {
                status: status.code().and_then(|c| u16::try_from(c).ok()),
                message: format!("player exited with {}", status),
            });
        }

        Ok(json!({ "played": artifact_id }))
    }
}
