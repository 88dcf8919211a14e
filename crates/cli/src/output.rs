//! JSON-lines rendering of session events.

use std::io::Write;

use parking_lot::Mutex;
use pipeline::{EventEnvelope, EventListener, ListenerError};

/// Writes each envelope as one JSON object per line.
pub struct JsonLinesListener<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesListener<W> {
    /// Wraps a writer; each event is flushed as soon as it is written.
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> EventListener for JsonLinesListener<W> {
    fn on_event(&self, event: &EventEnvelope) -> Result<(), ListenerError> {
        let line = serde_json::to_string(event).map_err(|e| ListenerError::Failed(e.to_string()))?;
        let mut out = self.out.lock();
        writeln!(out, "{line}")
            .and_then(|_| out.flush())
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::BrokenPipe => ListenerError::Disconnected,
                _ => ListenerError::Failed(e.to_string()),
            })
    }
}
