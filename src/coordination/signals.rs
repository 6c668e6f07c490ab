//! Stop signalling for control loops
//!
//! A `StopSignal` is held by the supervisor; each loop gets a `StopToken`.
//! Stopping is cooperative: a loop checks its token once per tick boundary and
//! finishes any in-flight device call first.

use tokio::sync::watch;

/// Sender side, owned by whoever may stop the loop
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Hand out a token observing this signal
    pub fn token(&self) -> StopToken {
        StopToken { rx: self.tx.subscribe() }
    }

    /// Raise the signal. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side, owned by a loop or watcher task
#[derive(Debug, Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal is raised (or its sender is gone)
    pub async fn stopped(&mut self) {
        // An error means the sender was dropped, which we treat as a stop
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_signal_starts_clear() {
        let signal = StopSignal::new();
        assert!(!signal.is_stopped());
        assert!(!signal.token().is_stopped());
    }

    #[test]
    fn test_stop_is_seen_by_all_tokens() {
        let signal = StopSignal::new();
        let a = signal.token();
        let b = a.clone();
        signal.stop();
        signal.stop();
        assert!(a.is_stopped());
        assert!(b.is_stopped());
        assert!(signal.is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_stop() {
        let signal = StopSignal::new();
        let mut token = signal.token();
        let waiter = tokio::spawn(async move { token.stopped().await });
        signal.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("stop not observed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_signal_counts_as_stop() {
        let signal = StopSignal::new();
        let mut token = signal.token();
        drop(signal);
        tokio::time::timeout(Duration::from_secs(1), token.stopped())
            .await
            .expect("drop not observed");
    }
}
