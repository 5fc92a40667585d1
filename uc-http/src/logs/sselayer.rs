//! A `tracing_subscriber::Layer` that pushes every event into a [`LogState`]
//! ring buffer, fanning it out over SSE via `log_sse`.

use std::time::SystemTime;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use super::{LogEntry, LogState};

/// Captures a tracing event's fields into a single formatted message.
///
/// The `message` field (the implicit string passed to `info!("...")` and
/// friends) is kept separate from the other fields so it can be used
/// verbatim; everything else is appended as `key=value`.
#[derive(Default)]
struct LogVisitor {
    message: String,
    extra: Vec<String>,
}

impl Visit for LogVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.extra.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.extra.push(format!("{}={}", field.name(), value));
        }
    }
}

/// Bridges `tracing` events into a [`LogState`] so they can be replayed and
/// streamed over SSE to operational dashboards.
#[derive(Clone)]
pub struct SseLayer {
    state: LogState,
}

impl SseLayer {
    pub fn new(state: LogState) -> Self {
        Self { state }
    }
}

impl<S: Subscriber> Layer<S> for SseLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LogVisitor::default();
        event.record(&mut visitor);

        let message = if visitor.extra.is_empty() {
            visitor.message
        } else {
            format!("{} {}", visitor.message, visitor.extra.join(" "))
        };

        let entry = LogEntry {
            timestamp: SystemTime::now(),
            level: event.metadata().level().to_string(),
            target: event.metadata().target().to_string(),
            message,
        };

        self.state.push(entry);
    }
}
