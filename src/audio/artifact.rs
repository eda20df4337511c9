//! Scoped temporary audio files
//!
//! An [`AudioArtifact`] is a filesystem-backed handle that is deleted when
//! its owner drops it, on every exit path. Names are randomized per
//! artifact so concurrent requests never collide in the shared temp area.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::TempPath;

use crate::Result;

/// Audio container format of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Ogg/Opus (what messaging voice notes typically arrive as)
    Ogg,
    /// PCM WAV
    Wav,
    /// MP3 (what the synthesis boundary typically returns)
    Mp3,
}

impl AudioFormat {
    /// File extension without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// MIME type for upload boundaries
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Ogg => "audio/ogg",
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Guess a format from a file extension
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ogg" | "oga" | "opus" => Some(Self::Ogg),
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            _ => None,
        }
    }
}

/// A transient audio file with a guaranteed-delete obligation
pub struct AudioArtifact {
    temp: TempPath,
    format: AudioFormat,
    duration_hint: Option<Duration>,
}

impl AudioArtifact {
    /// Write `bytes` into a fresh uniquely-named file under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be created or written.
    pub fn create(dir: &Path, format: AudioFormat, bytes: &[u8]) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("tutor-audio-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            temp: file.into_temp_path(),
            format,
            duration_hint: None,
        })
    }

    /// Attach an estimated playback duration
    #[must_use]
    pub const fn with_duration_hint(mut self, hint: Duration) -> Self {
        self.duration_hint = Some(hint);
        self
    }

    /// Path of the backing file (valid until the artifact is dropped)
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Container format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Estimated playback duration, if known
    #[must_use]
    pub const fn duration_hint(&self) -> Option<Duration> {
        self.duration_hint
    }

    /// Read the artifact back (transports upload from here)
    ///
    /// # Errors
    ///
    /// Returns an IO error if the backing file cannot be read.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.temp)?)
    }
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("path", &self.path())
            .field("format", &self.format)
            .field("duration_hint", &self.duration_hint)
            .finish()
    }
}
