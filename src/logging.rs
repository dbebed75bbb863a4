//! Logging setup for the binary and an in-memory capture layer.
//!
//! [`CaptureLayer`] records events into a bounded shared buffer. Embedders can
//! surface handler failures from it; the test suite uses it to check that
//! failing progress handlers are reported.
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{Event, Subscriber, field::Visit};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer};

const CAPTURE_LIMIT: usize = 1000;

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: tracing::Level,
    pub timestamp: String,
    pub message: String,
    pub target: String,
}

impl LogEntry {
    pub fn new(level: tracing::Level, message: String, target: String) -> Self {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f").to_string();
        Self {
            level,
            timestamp,
            message,
            target,
        }
    }
}

/// Install a formatting subscriber on stderr. `RUST_LOG` overrides `level`.
pub fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Layer that keeps the most recent events in memory.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    buffer: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.buffer.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

struct MessageVisitor {
    message: String,
}

impl MessageVisitor {
    fn new() -> Self {
        Self {
            message: String::new(),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = MessageVisitor::new();
        event.record(&mut visitor);

        let message = if !visitor.message.is_empty() {
            visitor.message
        } else {
            metadata.target().to_string()
        };

        let entry = LogEntry::new(*metadata.level(), message, metadata.target().to_string());

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(entry);
            if buf.len() > CAPTURE_LIMIT {
                buf.remove(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn capture_layer_records_message_and_level() {
        let capture = CaptureLayer::new();
        let subscriber = Registry::default().with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("handler {} failed", 3);
        });
        let entries = capture.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, tracing::Level::WARN);
        assert_eq!(entries[0].message, "handler 3 failed");
    }

    #[test]
    fn capture_layer_is_bounded() {
        let capture = CaptureLayer::new();
        let subscriber = Registry::default().with(capture.clone());
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..(CAPTURE_LIMIT + 5) {
                tracing::info!("event {}", i);
            }
        });
        let entries = capture.entries();
        assert_eq!(entries.len(), CAPTURE_LIMIT);
        assert_eq!(entries[0].message, "event 5");
        capture.clear();
        assert!(capture.entries().is_empty());
    }
}
