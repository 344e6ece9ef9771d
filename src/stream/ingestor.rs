use super::{Backoff, SseDecoder, SseMessage};
use crate::backend::BackendClient;
use crate::config::ConfigResolver;
use crate::error::{PingletError, Result};
use crate::render::{NotificationPayload, StreamEvent};
use crate::toast::{ToastId, ToastQueueManager};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const RECONNECT_BASE: Duration = Duration::from_secs(1);
const RECONNECT_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Connecting,
    Open,
    Processing,
    Closed,
}

/// Why a connected stream stopped delivering.
enum StreamEnd {
    Shutdown,
    Dropped(String),
}

/// Owns the long-lived SSE connection and feeds its events, in order, to
/// the renderer and the toast queue.
pub struct StreamIngestor {
    backend: Arc<BackendClient>,
    resolver: Arc<ConfigResolver>,
    queue: ToastQueueManager,
    state: Mutex<StreamState>,
    shutdown_tx: watch::Sender<bool>,
}

impl StreamIngestor {
    pub fn new(backend: Arc<BackendClient>, resolver: Arc<ConfigResolver>, queue: ToastQueueManager) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            backend,
            resolver,
            queue,
            state: Mutex::new(StreamState::Connecting),
            shutdown_tx,
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock()
    }

    fn set_state(&self, next: StreamState) {
        let mut state = self.state.lock();
        if *state == StreamState::Closed {
            return;
        }
        *state = next;
    }

    pub fn is_closed(&self) -> bool {
        self.state() == StreamState::Closed
    }

    /// Stop the stream for good. The running loop exits at its next await.
    pub fn shutdown(&self) {
        *self.state.lock() = StreamState::Closed;
        let _ = self.shutdown_tx.send(true);
        tracing::info!("Event stream shut down");
    }

    /// Connect and consume until [`shutdown`](Self::shutdown), reconnecting
    /// whenever the connection drops.
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut decoder = SseDecoder::new();
        let mut backoff = Backoff::new(RECONNECT_BASE, RECONNECT_CAP);

        loop {
            if *shutdown.borrow() || self.is_closed() {
                break;
            }
            self.set_state(StreamState::Connecting);

            let last_event_id = decoder.last_event_id().map(str::to_string);
            let connected = tokio::select! {
                result = self.backend.open_stream(last_event_id.as_deref()) => result,
                _ = shutdown.changed() => break,
            };

            match connected {
                Ok(response) => {
                    backoff.reset();
                    self.set_state(StreamState::Open);
                    tracing::info!("Event stream open");

                    match self.consume(response, &mut decoder, &mut shutdown).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Dropped(reason) => {
                            tracing::warn!("Event stream dropped: {}", reason);
                        }
                    }
                    decoder.reset();
                }
                Err(e) => {
                    tracing::warn!("Event stream handshake failed: {}", e);
                }
            }

            let delay = decoder.retry().unwrap_or_else(|| backoff.next_delay());
            self.set_state(StreamState::Connecting);
            tracing::debug!("Reconnecting in {:?}", delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        *self.state.lock() = StreamState::Closed;
        tracing::debug!("Event stream loop exited");
    }

    async fn consume(
        &self,
        response: reqwest::Response,
        decoder: &mut SseDecoder,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StreamEnd {
        let mut body = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                chunk = body.next() => chunk,
                _ = shutdown.changed() => return StreamEnd::Shutdown,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    for message in decoder.feed(&bytes) {
                        self.handle_message(&message);
                        if self.is_closed() {
                            return StreamEnd::Shutdown;
                        }
                    }
                }
                Some(Err(e)) => return StreamEnd::Dropped(e.to_string()),
                None => return StreamEnd::Dropped("closed by server".to_string()),
            }
        }
    }

    /// Process one complete message. Failures are logged and the event is
    /// dropped; the stream carries on.
    pub fn handle_message(&self, message: &SseMessage) -> Option<ToastId> {
        if message.data.trim().is_empty() {
            tracing::trace!("Heartbeat on event stream");
            return None;
        }

        self.set_state(StreamState::Processing);
        let result = self.process(&message.data);
        {
            let mut state = self.state.lock();
            if *state == StreamState::Processing {
                *state = StreamState::Open;
            }
        }

        match result {
            Ok(id) => id,
            Err(e @ PingletError::MalformedEvent(_)) => {
                tracing::warn!("Dropping stream event: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("Failed to handle stream event: {}", e);
                None
            }
        }
    }

    fn process(&self, data: &str) -> Result<Option<ToastId>> {
        let event: StreamEvent =
            serde_json::from_str(data).map_err(|e| PingletError::MalformedEvent(e.to_string()))?;

        let payload = match event.payload().map_err(PingletError::MalformedEvent)? {
            Some(payload) => payload,
            None => {
                tracing::debug!("Ignoring stream event with type {}", event.kind);
                return Ok(None);
            }
        };

        let template_layer = match &payload {
            NotificationPayload::Native(_) => {
                tracing::debug!("Native notification left to the service worker");
                return Ok(None);
            }
            NotificationPayload::Toast(_) => None,
            // A template without its own config keeps the project layer.
            NotificationPayload::Template { template_id, .. } => self
                .queue
                .renderer()
                .template(template_id)
                .map(|t| t.layer())
                .filter(|layer| !layer.is_empty()),
        };

        let resolved = self
            .resolver
            .resolve_for_event(template_layer.as_ref(), event.overrides.as_ref())?;
        Ok(self.queue.admit(&payload, &resolved.config, &resolved.style))
    }
}
