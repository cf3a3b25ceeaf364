//! Log events relayed from worker and server contexts to the interactive
//! context.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LogLevel / LogSource
// ---------------------------------------------------------------------------

/// Severity of a [`LogEvent`].
///
/// `Raw` marks a line captured verbatim from a standard stream; it has no
/// severity of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Raw,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Raw => "RAW",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which producer emitted a [`LogEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogSource {
    /// Messages written by the job runner itself (output directory, config
    /// file name, captured failures).
    Runner,
    /// A `tracing` record, tagged with the record's target.
    Record { target: String },
    /// A line written to the computation's standard output.
    Stdout,
    /// A line written to the computation's standard error.
    Stderr,
    /// Provisioning messages from the artifact servers.
    Server,
}

impl LogSource {
    /// Short tag used when rendering or filtering.
    pub fn tag(&self) -> &str {
        match self {
            LogSource::Runner => "runner",
            LogSource::Record { .. } => "record",
            LogSource::Stdout => "stdout",
            LogSource::Stderr => "stderr",
            LogSource::Server => "server",
        }
    }
}

// ---------------------------------------------------------------------------
// LogEvent
// ---------------------------------------------------------------------------

/// One diagnostic line on its way to the interactive context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub source: LogSource,
    pub text: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, source: LogSource, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            source,
            text: text.into(),
        }
    }

    /// Informational line from the job runner.
    pub fn runner(level: LogLevel, text: impl Into<String>) -> Self {
        Self::new(level, LogSource::Runner, text)
    }

    /// Line from one of the artifact servers.
    pub fn server(level: LogLevel, text: impl Into<String>) -> Self {
        Self::new(level, LogSource::Server, text)
    }

    /// Verbatim standard-output line.
    pub fn stdout(line: impl Into<String>) -> Self {
        Self::new(LogLevel::Raw, LogSource::Stdout, line)
    }

    /// Verbatim standard-error line.
    pub fn stderr(line: impl Into<String>) -> Self {
        Self::new(LogLevel::Raw, LogSource::Stderr, line)
    }

    /// Render the event the way the log view shows it.
    ///
    /// Formatted records use `HH:MM:SS | LEVEL | message`; raw stream lines
    /// are shown verbatim.
    pub fn render(&self) -> String {
        match self.level {
            LogLevel::Raw => self.text.clone(),
            level => format!("{} | {} | {}", self.timestamp.format("%H:%M:%S"), level, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_lines_render_verbatim() {
        let event = LogEvent::stderr("  warning: solver slow");
        assert_eq!(event.render(), "  warning: solver slow");
        assert_eq!(event.source.tag(), "stderr");
    }

    #[test]
    fn formatted_lines_carry_time_and_level() {
        let event = LogEvent::runner(LogLevel::Warning, "disk almost full");
        let rendered = event.render();
        let parts: Vec<&str> = rendered.split(" | ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "12:34:56".len());
        assert_eq!(parts[1], "WARNING");
        assert_eq!(parts[2], "disk almost full");
    }

    #[test]
    fn record_source_keeps_target() {
        let event = LogEvent::new(
            LogLevel::Info,
            LogSource::Record {
                target: "temoa::solver".into(),
            },
            "solving",
        );
        assert_eq!(event.source.tag(), "record");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"]["kind"], "record");
        assert_eq!(json["source"]["target"], "temoa::solver");
    }
}
