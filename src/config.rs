//! Configuration for the tutor gateway
//!
//! Defaults, overlaid by an optional TOML file
//! (`~/.config/tutor-gateway/config.toml` or an explicit path), overlaid
//! by environment variables for API keys. The router snapshots the voice
//! flags once per request at normalization time; nothing mutates a
//! `Config` after load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Voice-quality setting passed to the synthesis boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// Fastest, cheapest
    Low,
    /// Default tier
    #[default]
    Medium,
    /// High-definition synthesis
    High,
}

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum single-message text size the transport accepts
    pub max_message_len: usize,

    /// Largest file upload accepted for analysis, in bytes
    pub max_file_bytes: usize,

    /// Whether voice questions get a spoken reply
    pub enable_voice_responses: bool,

    /// Synthesis quality for spoken replies
    pub audio_quality: AudioQuality,

    /// STT model identifier (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// LLM model identifier for the educational responder
    pub responder_model: String,

    /// Responder sampling temperature
    pub responder_temperature: f32,

    /// Responder output token cap
    pub responder_max_tokens: u32,

    /// Bounded deadline for the responder call
    pub responder_timeout: Duration,

    /// Bounded deadline for a transcription call
    pub stt_timeout: Duration,

    /// Bounded deadline for a synthesis call
    pub tts_timeout: Duration,

    /// Directory for scoped audio artifacts
    pub temp_dir: PathBuf,

    /// API keys for external services
    pub api_keys: ApiKeys,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// Gemini API key (educational responder)
    pub gemini: Option<String>,

    /// `OpenAI` API key (Whisper STT and speech TTS)
    pub openai: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Leaves margin under Telegram-style 4096 caps
            max_message_len: 4000,
            max_file_bytes: 1024 * 1024,
            enable_voice_responses: true,
            audio_quality: AudioQuality::Medium,
            stt_model: "whisper-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            responder_model: "gemini-2.5-flash".to_string(),
            responder_temperature: 0.7,
            responder_max_tokens: 2048,
            responder_timeout: Duration::from_secs(60),
            stt_timeout: Duration::from_secs(30),
            tts_timeout: Duration::from_secs(30),
            temp_dir: std::env::temp_dir(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then file overlay, then env keys.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file is missing or does
    /// not parse. The default config file location is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match explicit_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Some(toml::from_str::<ConfigFile>(&raw)?)
            }
            None => default_config_path()
                .filter(|p| p.exists())
                .and_then(|p| std::fs::read_to_string(p).ok())
                .map(|raw| toml::from_str::<ConfigFile>(&raw))
                .transpose()?,
        };

        if let Some(file) = file {
            file.apply(&mut config);
        }

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            config.api_keys.gemini = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api_keys.openai = Some(key);
        }

        Ok(config)
    }
}

/// Default persistent config file location
fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "mraprguild", "tutor-gateway")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Partial TOML file schema; every field optional, overlaid on defaults
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    transport: TransportFileConfig,

    #[serde(default)]
    voice: VoiceFileConfig,

    #[serde(default)]
    responder: ResponderFileConfig,

    #[serde(default)]
    api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct TransportFileConfig {
    max_message_len: Option<usize>,
    max_file_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceFileConfig {
    enable_voice_responses: Option<bool>,
    audio_quality: Option<AudioQuality>,
    stt_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f32>,
    stt_timeout_secs: Option<u64>,
    tts_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponderFileConfig {
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeysFileConfig {
    gemini: Option<String>,
    openai: Option<String>,
}

impl ConfigFile {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.transport.max_message_len {
            config.max_message_len = v;
        }
        if let Some(v) = self.transport.max_file_bytes {
            config.max_file_bytes = v;
        }
        if let Some(v) = self.voice.enable_voice_responses {
            config.enable_voice_responses = v;
        }
        if let Some(v) = self.voice.audio_quality {
            config.audio_quality = v;
        }
        if let Some(v) = self.voice.stt_model {
            config.stt_model = v;
        }
        if let Some(v) = self.voice.tts_voice {
            config.tts_voice = v;
        }
        if let Some(v) = self.voice.tts_speed {
            config.tts_speed = v;
        }
        if let Some(v) = self.voice.stt_timeout_secs {
            config.stt_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.voice.tts_timeout_secs {
            config.tts_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.responder.model {
            config.responder_model = v;
        }
        if let Some(v) = self.responder.temperature {
            config.responder_temperature = v;
        }
        if let Some(v) = self.responder.max_tokens {
            config.responder_max_tokens = v;
        }
        if let Some(v) = self.responder.timeout_secs {
            config.responder_timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.api_keys.gemini {
            config.api_keys.gemini = Some(v);
        }
        if let Some(v) = self.api_keys.openai {
            config.api_keys.openai = Some(v);
        }
    }
}
