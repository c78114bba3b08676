//! Mechanisms for coordinating shutdown across background loops.

use futures::{channel::oneshot, future::Shared, FutureExt};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// A one-time broadcast that can be awaited by many loops.
///
/// A [Signal] resolves when its [Signaler] fires or is dropped. Completion is
/// tracked across clones: the receiver returned by [Signaler::signal] resolves
/// only once every clone of the [Signal] has been dropped, which is how the
/// owner of a loop waits for it to acknowledge a stop request.
///
/// _Polling a [Signal] again after it has resolved panics. Loops waiting on
/// `&mut signal` must stop polling it once it yields._
#[derive(Clone)]
pub struct Signal {
    inner: Shared<oneshot::Receiver<()>>,
    _guard: Arc<Guard>,
}

impl Future for Signal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A dropped signaler also means "stop".
        Pin::new(&mut self.inner).poll(cx).map(|_| ())
    }
}

/// Resolves the completion channel once the last [Signal] clone is dropped.
struct Guard {
    tx: Option<oneshot::Sender<()>>,
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Coordinates a one-time signal across many loops.
pub struct Signaler {
    tx: oneshot::Sender<()>,
    completion_rx: oneshot::Receiver<()>,
}

impl Signaler {
    /// Create a new [Signaler].
    ///
    /// Returns a [Signaler] and a [Signal] that will resolve when [Signaler::signal] is called.
    pub fn new() -> (Self, Signal) {
        let (tx, rx) = oneshot::channel();
        let (completion_tx, completion_rx) = oneshot::channel();

        let signaler = Self { tx, completion_rx };
        let signal = Signal {
            inner: rx.shared(),
            _guard: Arc::new(Guard {
                tx: Some(completion_tx),
            }),
        };
        (signaler, signal)
    }

    /// Resolve all [Signal]s associated with this [Signaler].
    ///
    /// The returned receiver resolves once every [Signal] has been dropped.
    pub fn signal(self) -> oneshot::Receiver<()> {
        let _ = self.tx.send(());
        self.completion_rx
    }
}

/// Employs [Signaler] to stop a loop exactly once.
pub enum Stopper {
    /// Stop has not been requested yet.
    Running {
        // Moved out when stopping.
        signaler: Option<Signaler>,
        signal: Signal,
    },
    /// Stop has been requested; completion is pending or resolved.
    Stopped {
        completion: Shared<oneshot::Receiver<()>>,
    },
}

impl Stopper {
    /// Create a new stopper in running mode.
    pub fn new() -> Self {
        let (signaler, signal) = Signaler::new();
        Self::Running {
            signaler: Some(signaler),
            signal,
        }
    }

    /// Get a signal for a loop to await.
    ///
    /// Returns `None` once stop has been requested.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            Self::Running { signal, .. } => Some(signal.clone()),
            Self::Stopped { .. } => None,
        }
    }

    /// Whether stop has been requested.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// Request stop, returning a future that resolves once every signal is dropped.
    ///
    /// Calling this again returns the same (possibly already resolved) completion.
    pub fn stop(&mut self) -> Shared<oneshot::Receiver<()>> {
        match self {
            Self::Running { signaler, .. } => {
                let completion = match signaler.take() {
                    Some(signaler) => signaler.signal().shared(),
                    None => unreachable!("signaler is always present while running"),
                };

                // Dropping the running state releases our own clone of the signal.
                *self = Self::Stopped {
                    completion: completion.clone(),
                };
                completion
            }
            Self::Stopped { completion } => completion.clone(),
        }
    }
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}
