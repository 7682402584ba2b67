//! Speech synthesis through the ElevenLabs text-to-speech API.
//!
//! Audio is written to the artifact directory; the payload returned is a
//! reference to the file, never the audio bytes.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ToolError;
use crate::tool::{ParamExt, Tool, ToolContext, http_client};

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";
const DEFAULT_VOICE: &str = "Rachel";
const MEDIA_TYPE: &str = "audio/mpeg";

/// Premade voices addressable by name.
const PREMADE_VOICES: &[(&str, &str)] = &[
    ("Rachel", "21m00Tcm4TlvDq8ikWAM"),
    ("Adam", "pNInz6obpgDQGcFmaJgB"),
    ("Bella", "EXAVITQu4vr4xnSDxMaL"),
    ("Antoni", "ErXwobaYiN019PkySvjV"),
];

/// Configuration for speech synthesis.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// ElevenLabs API key.
    pub api_key: String,
    /// API base URL.
    pub base_url: String,
    /// Synthesis model.
    pub model_id: String,
    /// Voice used when the caller names none.
    pub voice: String,
    /// Directory audio artifacts are written to.
    pub output_dir: PathBuf,
    /// Request timeout.
    pub timeout: Duration,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            output_dir: output_dir.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Resolve a voice name to its id; anything unknown is taken as an id.
pub fn voice_id(voice: &str) -> &str {
    PREMADE_VOICES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(voice))
        .map_or(voice, |(_, id)| *id)
}

/// Text to audio artifact.
#[derive(Debug, Clone)]
pub struct SpeechSynthesisTool {
    client: Client,
    config: SpeechConfig,
}

impl SpeechSynthesisTool {
    pub fn new(config: SpeechConfig) -> Result<Self, ToolError> {
        let client = http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    pub fn default_voice(&self) -> &str {
        &self.config.voice
    }
}

#[async_trait]
impl Tool for SpeechSynthesisTool {
    fn name(&self) -> &str {
        "speech_synthesis"
    }

    fn description(&self) -> &str {
        "Synthesize speech from text and return a reference to the generated audio file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to speak"
                },
                "voice": {
                    "type": "string",
                    "description": "Voice name or id"
                }
            },
            "required": ["text"]
        })
    }

    async fn invoke(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let text = input.required_str("text")?;
        let voice = input.optional_str("voice").unwrap_or(&self.config.voice);
        let endpoint = format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            voice_id(voice)
        );

        tracing::debug!(
            run_id = %ctx.run_id,
            step = %ctx.step_id,
            voice,
            chars = text.len(),
            "Synthesizing speech"
        );

        let response = self
            .client
            .post(&endpoint)
            .header("xi-api-key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, MEDIA_TYPE)
            .json(&json!({
                "text": text,
                "model_id": self.config.model_id,
            }))
            .send()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::rejected(
                status.as_u16(),
                format!("speech synthesis returned {}: {}", status, body),
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| ToolError::from_reqwest(e, self.config.timeout))?;
        if audio.is_empty() {
            return Err(ToolError::malformed("speech synthesis returned no audio"));
        }

        let artifact_id = format!("audio-{}", Uuid::new_v4().simple());
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| ToolError::Unavailable(format!("cannot create artifact dir: {}", e)))?;
        let path = self.config.output_dir.join(format!("{}.mp3", artifact_id));
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| ToolError::Unavailable(format!("cannot write audio artifact: {}", e)))?;

        Ok(json!({
            "artifact_id": artifact_id,
            "path": path.to_string_lossy(),
            "media_type": MEDIA_TYPE,
            "bytes": audio.len(),
        }))
    }
}
