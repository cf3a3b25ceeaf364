//! Scoped diagnostic capture for one computation.
//!
//! [`RunCapture::install`] routes the current thread's `tracing` records into
//! a relay and hands out line-buffered standard-stream writers. Everything is
//! released when the capture is dropped, including during unwinding, and
//! nothing process-wide is touched: two captures on two threads do not see
//! each other's output.

use std::io::{self, Write};

use temoa_core::LogEvent;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

use crate::layer::RelayLayer;
use crate::relay::LogRelay;

// ---------------------------------------------------------------------------
// LineSink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// `io::Write` adapter that publishes each completed line as a raw
/// [`LogEvent`].
///
/// A trailing partial line is held back until the next newline or until the
/// sink is dropped.
pub struct LineSink {
    relay: LogRelay,
    stream: Stream,
    pending: Vec<u8>,
}

impl LineSink {
    fn new(relay: LogRelay, stream: Stream) -> Self {
        Self {
            relay,
            stream,
            pending: Vec::new(),
        }
    }

    /// Independent sink for the same stream, e.g. for a reader thread.
    pub fn fork(&self) -> LineSink {
        LineSink::new(self.relay.clone(), self.stream)
    }

    /// Publish one line as-is.
    pub fn write_line(&mut self, line: &str) {
        self.emit(line.trim_end_matches(['\r', '\n']).to_string());
    }

    fn emit(&self, line: String) {
        let event = match self.stream {
            Stream::Stdout => LogEvent::stdout(line),
            Stream::Stderr => LogEvent::stderr(line),
        };
        self.relay.publish(event);
    }

    fn emit_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&bytes);
        self.emit(line.trim_end_matches('\r').to_string());
    }
}

impl Write for LineSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for chunk in buf.split_inclusive(|b| *b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(rest) => {
                    self.pending.extend_from_slice(rest);
                    let bytes = std::mem::take(&mut self.pending);
                    let line = String::from_utf8_lossy(&bytes);
                    self.emit(line.trim_end_matches('\r').to_string());
                }
                None => self.pending.extend_from_slice(chunk),
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LineSink {
    fn drop(&mut self) {
        self.emit_pending();
    }
}

// ---------------------------------------------------------------------------
// RunIo
// ---------------------------------------------------------------------------

/// Standard-stream replacements handed to a computation.
pub struct RunIo {
    stdout: LineSink,
    stderr: LineSink,
}

impl RunIo {
    pub fn new(relay: LogRelay) -> Self {
        Self {
            stdout: LineSink::new(relay.clone(), Stream::Stdout),
            stderr: LineSink::new(relay, Stream::Stderr),
        }
    }

    pub fn stdout(&mut self) -> &mut LineSink {
        &mut self.stdout
    }

    pub fn stderr(&mut self) -> &mut LineSink {
        &mut self.stderr
    }
}

// ---------------------------------------------------------------------------
// RunCapture
// ---------------------------------------------------------------------------

/// Capture installed for the duration of one computation.
pub struct RunCapture {
    io: RunIo,
    _subscriber: DefaultGuard,
}

impl RunCapture {
    /// Install the capture on the current thread.
    pub fn install(relay: &LogRelay) -> Self {
        let subscriber = tracing_subscriber::registry().with(RelayLayer::new(relay.clone()));
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            io: RunIo::new(relay.clone()),
            _subscriber: guard,
        }
    }

    pub fn io(&mut self) -> &mut RunIo {
        &mut self.io
    }

    /// Flush pending stream output and restore the previous subscriber.
    pub fn release(self) {
        drop(self);
    }
}
