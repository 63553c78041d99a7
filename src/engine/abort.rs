// src/engine/abort.rs

//! Run-wide abort signal.
//!
//! An [`AbortHandle`] is held by whoever may stop the run (Ctrl-C handler,
//! a GUI, a test). The scheduler and every execution unit hold an
//! [`AbortSignal`] and react to state changes without polling.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Current abort state of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortMode {
    /// Normal operation.
    Running,
    /// Stop dispatching new tasks; let in-flight ones finish.
    Drain,
    /// Stop dispatching and kill in-flight tasks.
    Kill,
}

#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<AbortMode>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AbortMode::Running);
        Self { tx: Arc::new(tx) }
    }

    /// Request an abort. Escalating from `Drain` to `Kill` is allowed;
    /// nothing ever returns the run to `Running`.
    pub fn abort(&self, kill_in_flight: bool) {
        let mode = if kill_in_flight {
            AbortMode::Kill
        } else {
            AbortMode::Drain
        };
        self.tx.send_if_modified(|current| {
            let escalate = match (*current, mode) {
                (AbortMode::Running, _) => true,
                (AbortMode::Drain, AbortMode::Kill) => true,
                _ => false,
            };
            if escalate {
                info!(?mode, "abort requested");
                *current = mode;
            }
            escalate
        });
    }

    pub fn mode(&self) -> AbortMode {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of the abort state.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<AbortMode>,
}

impl AbortSignal {
    pub fn mode(&self) -> AbortMode {
        *self.rx.borrow()
    }

    pub fn is_aborted(&self) -> bool {
        self.mode() != AbortMode::Running
    }

    /// Resolve once the mode is anything but `Running`.
    ///
    /// Never resolves if every handle is dropped without aborting.
    pub async fn aborted(&mut self) -> AbortMode {
        self.wait_for(|mode| mode != AbortMode::Running).await
    }

    /// Resolve once in-flight tasks should be killed.
    pub async fn killed(&mut self) {
        self.wait_for(|mode| mode == AbortMode::Kill).await;
    }

    async fn wait_for(&mut self, pred: impl Fn(AbortMode) -> bool) -> AbortMode {
        // Copy the mode out so the borrow guard is gone before any await.
        let observed = self.rx.wait_for(|mode| pred(*mode)).await.map(|mode| *mode);
        match observed {
            Ok(mode) => mode,
            Err(_) => std::future::pending().await,
        }
    }
}
