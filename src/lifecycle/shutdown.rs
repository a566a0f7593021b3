//! Shutdown coordination for the topic workers.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Holds the sending side of a `watch` channel. Triggering is one-way: once
/// set, every [`ShutdownSignal`] observes it, including ones created later.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Hand out a signal for one worker.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Request cancellation. Calling it again is a no-op.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side handed to each worker.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Checkpoint test, never blocks.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested.
    ///
    /// If the coordinator is dropped without triggering, this never
    /// resolves; the worker keeps running until its own stop condition.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_existing_and_new_signals() {
        let shutdown = Shutdown::new();
        let mut early = shutdown.subscribe();
        assert!(!early.is_triggered());

        shutdown.trigger();
        shutdown.trigger();

        assert!(early.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), early.triggered())
            .await
            .expect("signal should resolve");

        let late = shutdown.subscribe();
        assert!(late.is_triggered());
    }

    #[tokio::test]
    async fn test_untriggered_signal_stays_pending() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.triggered()).await;
        assert!(waited.is_err());
        assert!(!signal.is_triggered());
    }
}
