//! Cooperative shutdown signal.

use tokio::sync::watch;

/// Triggers shutdown for every [`Shutdown`] subscribed to it.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side, cloned into each task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is triggered.
    ///
    /// Never completes if the handle is dropped without triggering.
    pub async fn triggered(&mut self) {
        let result = self.rx.wait_for(|stop| *stop).await.map(|_| ());
        if result.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
