//! Daemon-wide stop flag.
//!
//! The flag is a `watch` channel set once: a task that subscribes after the
//! daemon started stopping still observes it, and a subscriber whose
//! [`Shutdown`] is gone treats that as a stop too.

use tokio::sync::watch;

/// Owner of the stop flag. Clones set the same flag.
#[derive(Debug, Clone)]
pub struct Shutdown {
    stopping: watch::Sender<bool>,
}

/// Receiving side held by the control server and each loop runner.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    stopping: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        Self { stopping }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            stopping: self.stopping.subscribe(),
        }
    }

    /// Set the flag. Later calls change nothing.
    pub fn trigger(&self) {
        if !self.stopping.send_replace(true) {
            tracing::debug!(subscribers = self.receiver_count(), "Shutdown triggered");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Number of signals still held.
    pub fn receiver_count(&self) -> usize {
        self.stopping.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolves once the flag is set, or when every [`Shutdown`] is dropped.
    pub async fn recv(&mut self) {
        let _ = self.stopping.wait_for(|stopping| *stopping).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut server = shutdown.subscribe();
        let mut runner = shutdown.clone().subscribe();
        assert_eq!(shutdown.receiver_count(), 2);
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
        server.recv().await;
        runner.recv().await;
    }

    #[tokio::test]
    async fn late_subscriber_sees_earlier_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let mut late = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), late.recv())
            .await
            .expect("flag was set before subscribing");
    }

    #[tokio::test]
    async fn dropping_every_owner_releases_subscribers() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        drop(shutdown);

        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .expect("closed flag counts as a stop");
    }

    #[tokio::test]
    async fn untriggered_signal_keeps_waiting() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.recv()).await;
        assert!(waited.is_err());
    }
}
