//! Server-sent event ingestion.

mod backoff;
mod ingestor;
mod sse;

pub use backoff::Backoff;
pub use ingestor::{StreamIngestor, StreamState};
pub use sse::{SseDecoder, SseMessage};
