//! Order-preserving hand-off from any context to the interactive context.
//!
//! [`LogRelay`] is the producer half; it is cheap to clone and may be used
//! from worker threads, blocking tasks, and async tasks alike. The single
//! [`RelayReceiver`] is owned by the interactive context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use temoa_core::{LogEvent, RunResult};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// InteractiveEvent
// ---------------------------------------------------------------------------

/// Everything that crosses into the interactive context.
///
/// Run outcomes travel through the same queue as log lines so a result is
/// always observed after every line its run published before it.
#[derive(Debug, Clone)]
pub enum InteractiveEvent {
    Log(LogEvent),
    RunFinished(RunResult),
}

// ---------------------------------------------------------------------------
// LogRelay
// ---------------------------------------------------------------------------

/// Producer half of the relay.
///
/// Publishing never blocks beyond an unbounded enqueue and never fails
/// visibly: once the receiver is gone, events are discarded and counted.
#[derive(Clone)]
pub struct LogRelay {
    sender: mpsc::UnboundedSender<InteractiveEvent>,
    dropped: Arc<AtomicU64>,
}

impl LogRelay {
    /// Create a connected relay / receiver pair.
    pub fn channel() -> (LogRelay, RelayReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let relay = LogRelay {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (relay, RelayReceiver { receiver })
    }

    /// Publish a log event.
    pub fn publish(&self, event: LogEvent) {
        self.send(InteractiveEvent::Log(event));
    }

    /// Hand a run outcome to the interactive context.
    pub fn finish(&self, result: RunResult) {
        self.send(InteractiveEvent::RunFinished(result));
    }

    /// Enqueue any interactive event.
    pub fn send(&self, event: InteractiveEvent) {
        if self.sender.send(event).is_err() {
            // The interactive context has shut down.
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events discarded because the receiver was gone.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the interactive context is still receiving.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// RelayReceiver
// ---------------------------------------------------------------------------

/// Consumer half of the relay, owned by the interactive context.
pub struct RelayReceiver {
    receiver: mpsc::UnboundedReceiver<InteractiveEvent>,
}

impl RelayReceiver {
    /// Take every event queued so far, in arrival order, without waiting.
    pub fn drain(&mut self) -> Vec<InteractiveEvent> {
        let mut batch = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            batch.push(event);
        }
        batch
    }

    /// Wait for the next event.
    ///
    /// Returns `None` only when every [`LogRelay`] clone has been dropped.
    pub async fn recv(&mut self) -> Option<InteractiveEvent> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use assert_matches::assert_matches;
    use temoa_core::{FailureKind, LogLevel};

    use super::*;

    fn text_of(event: &InteractiveEvent) -> &str {
        match event {
            InteractiveEvent::Log(log) => &log.text,
            InteractiveEvent::RunFinished(_) => "<finished>",
        }
    }

    #[test]
    fn drain_returns_events_in_publish_order() {
        let (relay, mut rx) = LogRelay::channel();
        for i in 0..5 {
            relay.publish(LogEvent::runner(LogLevel::Info, format!("line {i}")));
        }

        let texts: Vec<String> = rx.drain().iter().map(|e| text_of(e).to_string()).collect();
        assert_eq!(texts, ["line 0", "line 1", "line 2", "line 3", "line 4"]);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn per_producer_order_survives_concurrent_publishing() {
        let (relay, mut rx) = LogRelay::channel();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let relay = relay.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        relay.publish(LogEvent::runner(LogLevel::Info, format!("{p}:{i}")));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        let mut next = [0usize; 4];
        let batch = rx.drain();
        assert_eq!(batch.len(), 800);
        for event in &batch {
            let (p, i) = text_of(event).split_once(':').unwrap();
            let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
            assert_eq!(i, next[p], "producer {p} delivered out of order");
            next[p] += 1;
        }
    }

    #[test]
    fn publish_after_receiver_dropped_is_counted_not_raised() {
        let (relay, rx) = LogRelay::channel();
        drop(rx);

        assert!(!relay.is_connected());
        relay.publish(LogEvent::runner(LogLevel::Info, "orphan"));
        relay.publish(LogEvent::stdout("orphan"));
        assert_eq!(relay.dropped(), 2);
    }

    #[tokio::test]
    async fn result_follows_logs_from_the_same_producer() {
        let (relay, mut rx) = LogRelay::channel();
        let worker = relay.clone();
        tokio::task::spawn_blocking(move || {
            worker.publish(LogEvent::stdout("solving"));
            worker.finish(RunResult::failure(
                Default::default(),
                FailureKind::ComputationFailed,
                "bad bound",
            ));
        })
        .await
        .unwrap();
        drop(relay);

        assert_matches!(rx.recv().await, Some(InteractiveEvent::Log(_)));
        assert_matches!(rx.recv().await, Some(InteractiveEvent::RunFinished(r)) if !r.succeeded);
        assert_matches!(rx.recv().await, None);
    }
}
