use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tutor_gateway::audio::{AudioArtifact, AudioFormat, AudioPipeline};
use tutor_gateway::{
    Config, Daemon, Error, GeminiResponder, InboundEvent, MessageRouter, OpenAiSynthesizer,
    Responder, Synthesizer, Transcriber, Transport, WhisperTranscriber,
};

/// Tutor - multi-modal gateway for an educational coding assistant
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Path to a config file (default: platform config dir)
    #[arg(short, long, env = "TUTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one text question and print the answer
    Ask {
        /// The question
        question: String,
    },
    /// Transcribe an audio file and print the text
    Transcribe {
        /// Path to the audio file (.ogg, .wav or .mp3)
        file: PathBuf,
    },
    /// Synthesize speech for a text and write it to a file
    Speak {
        /// Text to speak
        #[arg(default_value = "Hello! I am your coding tutor.")]
        text: String,

        /// Output path
        #[arg(short, long, default_value = "spoken.mp3")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,tutor_gateway=info",
        1 => "info,tutor_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let audio = build_audio_pipeline(&config);
    let responder = build_responder(&config)?;
    let router = MessageRouter::new(&config, audio.clone(), responder);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Ask { question } => ask(&router, &question).await,
            Command::Transcribe { file } => transcribe(&audio, &file).await,
            Command::Speak { text, output } => speak(&audio, &text, &output).await,
        };
    }

    run_console(router).await
}

/// Read questions from stdin, one per line, and print the answers
async fn run_console(router: MessageRouter) -> anyhow::Result<()> {
    tracing::info!("tutor gateway ready - type a question, Ctrl-D to quit");

    let (tx, rx) = mpsc::channel(32);
    // The console has no message-deletion gesture, so cancels stay idle
    let (_cancel_tx, cancel_rx) = mpsc::channel(1);
    let daemon = Daemon::new(router, Arc::new(ConsoleTransport));

    let reader = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if tx.send(InboundEvent::text("console", line)).await.is_err() {
                break;
            }
        }
    });

    daemon.run(rx, cancel_rx).await;
    reader.await?;
    Ok(())
}

async fn ask(router: &MessageRouter, question: &str) -> anyhow::Result<()> {
    let routed = router.route(&InboundEvent::text("cli", question)).await;
    for chunk in routed.deliverable.chunks() {
        if let Some(text) = chunk.as_text() {
            println!("{text}\n");
        }
    }
    Ok(())
}

async fn transcribe(audio: &AudioPipeline, file: &std::path::Path) -> anyhow::Result<()> {
    let format = file
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormat::from_extension)
        .ok_or_else(|| anyhow::anyhow!("unrecognized audio extension: {}", file.display()))?;

    let bytes = std::fs::read(file)?;
    let transcript = audio.transcribe(&bytes, format).await?;
    println!("{transcript}");
    Ok(())
}

async fn speak(
    audio: &AudioPipeline,
    text: &str,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let artifact = audio.synthesize(text).await?;
    // Persist before the scoped artifact is released
    std::fs::copy(artifact.path(), output)?;
    println!("wrote {}", output.display());
    Ok(())
}

fn build_responder(config: &Config) -> anyhow::Result<Arc<dyn Responder>> {
    let key = config.api_keys.gemini.clone().ok_or_else(|| {
        anyhow::anyhow!("GEMINI_API_KEY is required (env var or [api_keys] in config)")
    })?;
    Ok(Arc::new(GeminiResponder::new(
        key,
        config.responder_model.clone(),
        config.responder_temperature,
        config.responder_max_tokens,
    )?))
}

/// Build the voice pipeline. Without an `OpenAI` key the gateway still
/// runs; voice requests then fail with their typed errors and senders
/// get the matching apology.
fn build_audio_pipeline(config: &Config) -> AudioPipeline {
    let (transcriber, synthesizer): (Arc<dyn Transcriber>, Arc<dyn Synthesizer>) =
        match config.api_keys.openai.clone() {
            Some(key) => {
                let transcriber =
                    WhisperTranscriber::new(key.clone(), config.stt_model.clone());
                let synthesizer = OpenAiSynthesizer::new(
                    key,
                    config.tts_voice.clone(),
                    config.tts_speed,
                );
                match (transcriber, synthesizer) {
                    (Ok(t), Ok(s)) => (Arc::new(t), Arc::new(s)),
                    _ => {
                        tracing::warn!("speech engine init failed, voice disabled");
                        (Arc::new(VoiceDisabled), Arc::new(VoiceDisabled))
                    }
                }
            }
            None => {
                tracing::warn!("no OPENAI_API_KEY, voice disabled");
                (Arc::new(VoiceDisabled), Arc::new(VoiceDisabled))
            }
        };

    AudioPipeline::new(
        transcriber,
        synthesizer,
        config.audio_quality,
        config.temp_dir.clone(),
        config.stt_timeout,
        config.tts_timeout,
    )
}

/// Stand-in speech engines for key-less runs
struct VoiceDisabled;

#[async_trait::async_trait]
impl Transcriber for VoiceDisabled {
    async fn transcribe(
        &self,
        _path: &std::path::Path,
        _format: AudioFormat,
    ) -> tutor_gateway::Result<String> {
        Err(Error::TranscriptionFailed(
            tutor_gateway::TranscriptionError::Engine("voice is disabled".to_string()),
        ))
    }
}

#[async_trait::async_trait]
impl Synthesizer for VoiceDisabled {
    async fn synthesize(
        &self,
        _text: &str,
        _quality: tutor_gateway::AudioQuality,
    ) -> tutor_gateway::Result<(Vec<u8>, AudioFormat)> {
        Err(Error::SynthesisUnavailable("voice is disabled".to_string()))
    }
}

/// Console delivery: text to stdout, audio reported by path
struct ConsoleTransport;

#[async_trait::async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &'static str {
        "console"
    }

    fn max_message_len(&self) -> usize {
        4000
    }

    async fn send_text(&self, _recipient: &str, text: &str) -> tutor_gateway::Result<()> {
        println!("{text}\n");
        Ok(())
    }

    async fn send_audio(
        &self,
        _recipient: &str,
        artifact: &AudioArtifact,
    ) -> tutor_gateway::Result<()> {
        println!("[spoken reply: {}]", artifact.path().display());
        Ok(())
    }
}
