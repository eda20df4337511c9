//! Daemon - the long-running gateway service
//!
//! Pulls inbound events off a channel and spawns one routing task per
//! event, so a slow transcription or responder call never blocks the
//! queue and back-to-back questions from one sender are each answered.
//! A second channel carries explicit cancellations keyed by event id
//! (the transport sends one when the sender deletes their message);
//! cancelling suppresses delivery of that request only. Chunks go out
//! strictly in deliverable order, and each audio artifact is released
//! right after its upload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::router::MessageRouter;
use crate::transport::{Chunk, InboundEvent, Transport};

type InFlightMap = Arc<Mutex<HashMap<Uuid, watch::Sender<bool>>>>;

/// Drives the gateway: one spawned task per inbound event
pub struct Daemon<T: Transport + 'static> {
    router: MessageRouter,
    transport: Arc<T>,
    /// Cancellation handle per in-flight request, keyed by event id.
    /// Entries are removed when their request finishes.
    in_flight: InFlightMap,
}

impl<T: Transport + 'static> Daemon<T> {
    /// Create a daemon over a router and a delivery transport
    #[must_use]
    pub fn new(router: MessageRouter, transport: Arc<T>) -> Self {
        Self {
            router,
            transport,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run until the event channel closes.
    ///
    /// `cancels` carries ids of requests whose delivery should be
    /// suppressed; a cancel for an unknown or already-finished id is
    /// ignored. Closing the cancel channel only disables cancellation.
    pub async fn run(self, mut events: mpsc::Receiver<InboundEvent>, mut cancels: mpsc::Receiver<Uuid>) {
        tracing::info!(transport = self.transport.name(), "daemon running");
        let mut cancels_open = true;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.accept(event);
                }
                cancel = cancels.recv(), if cancels_open => {
                    match cancel {
                        Some(id) => self.cancel(id),
                        None => cancels_open = false,
                    }
                }
            }
        }

        tracing::info!("event channel closed, daemon stopping");
    }

    /// Register the event and spawn its routing task
    fn accept(&self, event: InboundEvent) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        lock(&self.in_flight).insert(event.id, cancel_tx);

        let router = self.router.clone();
        let transport = Arc::clone(&self.transport);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let routed = router.route_cancellable(&event, &cancel_rx).await;
            lock(&in_flight).remove(&event.id);

            if let Some(routed) = routed {
                deliver(transport.as_ref(), &event.sender_id, routed.deliverable.into_chunks())
                    .await;
            }
        });
    }

    /// Suppress delivery for one in-flight request
    fn cancel(&self, id: Uuid) {
        let handle = lock(&self.in_flight).remove(&id);
        match handle {
            Some(tx) if tx.send(true).is_ok() => {
                tracing::info!(request_id = %id, "request cancelled");
            }
            _ => {
                tracing::debug!(request_id = %id, "cancel for unknown or finished request");
            }
        }
    }

    #[cfg(test)]
    fn in_flight_handle(&self) -> InFlightMap {
        Arc::clone(&self.in_flight)
    }
}

/// A poisoned map still exposes a consistent id set
fn lock(map: &InFlightMap) -> std::sync::MutexGuard<'_, HashMap<Uuid, watch::Sender<bool>>> {
    map.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Send chunks in order; an audio artifact is dropped, and its file
/// removed, as soon as its upload finishes
async fn deliver<T: Transport>(transport: &T, recipient: &str, chunks: Vec<Chunk>) {
    for chunk in chunks {
        let result = match &chunk {
            Chunk::Text(text) => transport.send_text(recipient, text).await,
            Chunk::Audio(artifact) => transport.send_audio(recipient, artifact).await,
        };
        if let Err(e) = result {
            tracing::error!(
                transport = transport.name(),
                recipient,
                error = %e,
                "chunk delivery failed"
            );
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::assistant::{AssistantResponse, Responder};
    use crate::audio::{AudioArtifact, AudioFormat, AudioPipeline, Synthesizer, Transcriber};
    use crate::config::{AudioQuality, Config};
    use crate::request::AssistantRequest;
    use crate::{Error, Result};

    struct RecordingTransport {
        sent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn max_message_len(&self) -> usize {
            4000
        }

        async fn send_text(&self, _recipient: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_audio(&self, _recipient: &str, artifact: &AudioArtifact) -> Result<()> {
            assert!(artifact.path().exists(), "artifact must exist during upload");
            self.sent.lock().unwrap().push("<audio>".to_string());
            Ok(())
        }
    }

    struct EchoResponder {
        delay: Duration,
    }

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, request: &AssistantRequest) -> Result<AssistantResponse> {
            tokio::time::sleep(self.delay).await;
            Ok(AssistantResponse {
                text: format!("echo: {}", request.prose),
            })
        }
    }

    struct StubTranscriber;

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _path: &Path, _format: AudioFormat) -> Result<String> {
            Ok("spoken question".to_string())
        }
    }

    struct StubSynthesizer;

    #[async_trait]
    impl Synthesizer for StubSynthesizer {
        async fn synthesize(
            &self,
            text: &str,
            _quality: AudioQuality,
        ) -> Result<(Vec<u8>, AudioFormat)> {
            Ok((text.as_bytes().to_vec(), AudioFormat::Mp3))
        }
    }

    fn daemon_parts(
        dir: &Path,
        delay: Duration,
    ) -> (Daemon<RecordingTransport>, Arc<RecordingTransport>) {
        let config = Config {
            temp_dir: dir.to_path_buf(),
            ..Config::default()
        };
        let audio = AudioPipeline::new(
            Arc::new(StubTranscriber),
            Arc::new(StubSynthesizer),
            config.audio_quality,
            config.temp_dir.clone(),
            config.stt_timeout,
            config.tts_timeout,
        );
        let router = MessageRouter::new(&config, audio, Arc::new(EchoResponder { delay }));
        let transport = Arc::new(RecordingTransport {
            sent: StdMutex::new(Vec::new()),
        });
        (Daemon::new(router, Arc::clone(&transport)), transport)
    }

    fn channels() -> (
        mpsc::Sender<InboundEvent>,
        mpsc::Receiver<InboundEvent>,
        mpsc::Sender<Uuid>,
        mpsc::Receiver<Uuid>,
    ) {
        let (tx, rx) = mpsc::channel(8);
        let (cancel_tx, cancel_rx) = mpsc::channel(8);
        (tx, rx, cancel_tx, cancel_rx)
    }

    #[tokio::test]
    async fn events_flow_to_the_transport() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::ZERO);
        let (tx, rx, _cancel_tx, cancel_rx) = channels();

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(InboundEvent::text("u1", "what is a map"))
            .await
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        // Spawned request tasks may outlive the accept loop briefly
        tokio::time::sleep(Duration::from_millis(100)).await;
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["echo: what is a map"]);
    }

    #[tokio::test]
    async fn voice_event_delivers_audio_last_and_releases_it() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::ZERO);
        let (tx, rx, _cancel_tx, cancel_rx) = channels();

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(InboundEvent::voice("u1", vec![1, 2])).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.last().map(String::as_str), Some("<audio>"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn back_to_back_messages_from_one_sender_both_answered() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::from_millis(50));
        let (tx, rx, _cancel_tx, cancel_rx) = channels();

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(InboundEvent::text("u1", "first")).await.unwrap();
        tx.send(InboundEvent::text("u1", "second")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut sent = transport.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(sent, vec!["echo: first", "echo: second"]);
    }

    #[tokio::test]
    async fn explicit_cancel_suppresses_only_its_request() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::from_millis(100));
        let (tx, rx, cancel_tx, cancel_rx) = channels();

        let kept = InboundEvent::text("u1", "keep me");
        let dropped = InboundEvent::text("u1", "cancel me");
        let dropped_id = dropped.id;

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(kept).await.unwrap();
        tx.send(dropped).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel_tx.send(dropped_id).await.unwrap();
        // Let the cancel land before the event channel closes the loop
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["echo: keep me"]);
    }

    #[tokio::test]
    async fn cancel_after_completion_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::ZERO);
        let (tx, rx, cancel_tx, cancel_rx) = channels();

        let event = InboundEvent::text("u1", "already done");
        let id = event.id;

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(event).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_tx.send(id).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["echo: already done"]);
    }

    #[tokio::test]
    async fn finished_requests_leave_no_tracking_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, _transport) = daemon_parts(dir.path(), Duration::ZERO);
        let in_flight = daemon.in_flight_handle();
        let (tx, rx, _cancel_tx, cancel_rx) = channels();

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(InboundEvent::text("u1", "one")).await.unwrap();
        tx.send(InboundEvent::text("u2", "two")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_cancel_channel_does_not_stop_the_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, transport) = daemon_parts(dir.path(), Duration::ZERO);
        let (tx, rx, cancel_tx, cancel_rx) = channels();
        drop(cancel_tx);

        let handle = tokio::spawn(daemon.run(rx, cancel_rx));
        tx.send(InboundEvent::text("u1", "still served")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent, vec!["echo: still served"]);
    }

    #[tokio::test]
    async fn delivery_failure_stops_remaining_chunks() {
        struct FailingTransport;

        #[async_trait]
        impl Transport for FailingTransport {
            fn name(&self) -> &'static str {
                "failing"
            }

            fn max_message_len(&self) -> usize {
                4000
            }

            async fn send_text(&self, _recipient: &str, _text: &str) -> Result<()> {
                Err(Error::Transport("connection reset".to_string()))
            }
        }

        // Must not panic; the error is logged and the rest is dropped
        deliver(
            &FailingTransport,
            "u1",
            vec![
                Chunk::Text("one".to_string()),
                Chunk::Text("two".to_string()),
            ],
        )
        .await;
    }
}
