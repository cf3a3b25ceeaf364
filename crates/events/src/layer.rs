//! `tracing` layer that forwards records into a [`LogRelay`].

use std::fmt::{self, Write as _};

use temoa_core::{LogEvent, LogLevel, LogSource};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::relay::LogRelay;

/// Forwards every record at or above `min_level` into a relay.
///
/// The event's `message` becomes the log text; any other fields are appended
/// as `key=value` pairs in declaration order.
pub struct RelayLayer {
    relay: LogRelay,
    min_level: Level,
}

impl RelayLayer {
    /// Forward records at INFO and above.
    pub fn new(relay: LogRelay) -> Self {
        Self::with_min_level(relay, Level::INFO)
    }

    pub fn with_min_level(relay: LogRelay, min_level: Level) -> Self {
        Self { relay, min_level }
    }
}

impl<S> Layer<S> for RelayLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // `Level` orders TRACE > DEBUG > INFO > WARN > ERROR.
        if *metadata.level() > self.min_level {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.relay.publish(LogEvent::new(
            map_level(*metadata.level()),
            LogSource::Record {
                target: metadata.target().to_string(),
            },
            visitor.finish(),
        ));
    }
}

fn map_level(level: Level) -> LogLevel {
    match level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        _ => LogLevel::Info,
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::relay::InteractiveEvent;

    fn collect(min_level: Level, emit: impl FnOnce()) -> Vec<LogEvent> {
        let (relay, mut rx) = LogRelay::channel();
        let subscriber =
            tracing_subscriber::registry().with(RelayLayer::with_min_level(relay, min_level));
        tracing::subscriber::with_default(subscriber, emit);
        rx.drain()
            .into_iter()
            .map(|event| match event {
                InteractiveEvent::Log(log) => log,
                other => panic!("unexpected event {other:?}"),
            })
            .collect()
    }

    #[test]
    fn records_below_threshold_are_filtered() {
        let events = collect(Level::INFO, || {
            tracing::debug!("noise");
            tracing::info!("kept");
            tracing::trace!("noise");
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "kept");
    }

    #[test]
    fn levels_map_to_log_levels() {
        let events = collect(Level::INFO, || {
            tracing::info!("i");
            tracing::warn!("w");
            tracing::error!("e");
        });
        let levels: Vec<LogLevel> = events.iter().map(|e| e.level).collect();
        assert_eq!(levels, [LogLevel::Info, LogLevel::Warning, LogLevel::Error]);
    }

    #[test]
    fn structured_fields_are_appended_to_the_message() {
        let events = collect(Level::INFO, || {
            tracing::info!(port = 8080, root = "out", "Serving");
        });
        assert_eq!(events[0].text, "Serving port=8080 root=out");
        assert_matches!(&events[0].source, LogSource::Record { target } if target.contains("layer"));
    }
}
