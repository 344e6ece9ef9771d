//! Incremental `text/event-stream` decoder.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// `event:` field, `"message"` when absent.
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream, if any.
    pub id: Option<String>,
}

/// Feeds raw body chunks and yields complete messages. Chunks may split
/// lines, UTF-8 sequences and CRLF pairs anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    skip_lf: bool,
    data: String,
    has_data: bool,
    event: Option<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        let mut out = Vec::new();
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.finish_line(&mut out),
                b'\r' => {
                    self.finish_line(&mut out);
                    self.skip_lf = true;
                }
                _ => self.line.push(byte),
            }
        }
        out
    }

    /// Reconnection delay requested by the server with `retry:`.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Drop any partial message, e.g. after the connection broke mid-event.
    /// The event id and retry hint survive.
    pub fn reset(&mut self) {
        self.line.clear();
        self.skip_lf = false;
        self.data.clear();
        self.has_data = false;
        self.event = None;
    }

    fn finish_line(&mut self, out: &mut Vec<SseMessage>) {
        let raw = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&raw);
        let line = line.strip_prefix('\u{feff}').unwrap_or(&line);

        if line.is_empty() {
            if let Some(message) = self.dispatch() {
                out.push(message);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            other => tracing::trace!("Ignoring unknown SSE field '{}'", other),
        }
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseMessage {
            event: event.filter(|e| !e.is_empty()).unwrap_or_else(|| "message".to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiline_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b": keep-alive\ndata: first\ndata: second\n\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, "first\nsecond");
        assert_eq!(messages[0].event, "message");
    }

    #[test]
    fn test_line_endings() {
        let mut decoder = SseDecoder::new();
        let messages = decoder.feed(b"data: a\r\n\r\ndata: b\r\rdata: c\n\n");
        let data: Vec<&str> = messages.iter().map(|m| m.data.as_str()).collect();
        assert_eq!(data, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_chunks_split_anywhere() {
        let mut decoder = SseDecoder::new();
        let input = "event: notice\r\nid: 7\r\ndata: {\"title\":\"héllo\"}\r\n\r\n".as_bytes();
        let mut messages = Vec::new();
        for byte in input.chunks(1) {
            messages.extend(decoder.feed(byte));
        }
        assert_eq!(
            messages,
            vec![SseMessage {
                event: "notice".to_string(),
                data: "{\"title\":\"héllo\"}".to_string(),
                id: Some("7".to_string()),
            }]
        );
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn test_retry_field() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"retry: 2500\n\n").is_empty());
        assert_eq!(decoder.retry(), Some(Duration::from_millis(2500)));

        decoder.feed(b"retry: soon\n\n");
        assert_eq!(decoder.retry(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_event_without_data_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n").is_empty());
        let messages = decoder.feed(b"data: x\n\n");
        assert_eq!(messages[0].event, "message");
    }
}
