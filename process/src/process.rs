//! A simulated process and its dispatch loop.

use crate::{Error, Handler};
use distsim_codec::Envelope;
use distsim_network::{DeliveryQueue, Router};
use distsim_runtime::Task;
use distsim_utils::ProcessId;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, RwLock, Weak},
    time::Duration,
};
use tracing::{debug, error};

/// How long the dispatch loop sleeps when no message is due.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of a dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Running,
    Stopping,
    Stopped,
}

/// Whether `content` is addressed to handlers using `prefix`.
///
/// Content starting with `*` is a control message for everyone. Otherwise it
/// must start with `prefix` followed by `_` and at least one more byte.
pub fn is_my_message(prefix: &[u8], content: &[u8]) -> bool {
    if content.first() == Some(&b'*') {
        return true;
    }
    if prefix.len() + 1 >= content.len() {
        return false;
    }
    content.starts_with(prefix) && content[prefix.len()] == b'_'
}

/// A logical process bound to an id on a [Router].
///
/// `S` is the algorithm state of the process, available to handlers through
/// [Process::state].
pub struct Process<S> {
    id: ProcessId,
    router: Arc<Router>,
    queue: Arc<DeliveryQueue>,
    handlers: RwLock<Vec<Arc<dyn Handler<S>>>>,
    state: Mutex<S>,

    task: Mutex<Task>,
    status: Mutex<Status>,
}

impl<S: Send + 'static> Process<S> {
    /// Register a new queue for `id` with `router` and start dispatching.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn(id: ProcessId, router: Arc<Router>, state: S) -> Result<Arc<Self>, Error> {
        let queue = Arc::new(DeliveryQueue::new());
        router.register_process(id, queue.clone())?;

        Ok(Arc::new_cyclic(|process: &Weak<Self>| {
            let task = Task::spawn(format!("process-{id}"), POLL_INTERVAL, {
                let process = process.clone();
                move || {
                    process
                        .upgrade()
                        .is_some_and(|process| process.dispatch_next())
                }
            });
            Self {
                id,
                router,
                queue,
                handlers: RwLock::new(Vec::new()),
                state: Mutex::new(state),
                task: Mutex::new(task),
                status: Mutex::new(Status::Running),
            }
        }))
    }

    /// Dispatch the earliest message if it is due, returning whether one was.
    fn dispatch_next(&self) -> bool {
        let Some(message) = self.queue.pop_due(self.router.now()) else {
            return false;
        };
        self.router.dispatched();

        // Handlers may register further handlers.
        let handlers = self.handlers.read().unwrap().clone();
        for (index, handler) in handlers.iter().enumerate() {
            let mut message = message.clone();
            match handler.handle(self, &mut message) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    error!(id = self.id, handler = index, ?err, "handler aborted");
                    return true;
                }
            }
        }
        debug!(id = self.id, from = message.from, "message not handled");
        true
    }
}

impl<S> Process<S> {
    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The queue of messages not yet dispatched.
    pub fn queue(&self) -> &Arc<DeliveryQueue> {
        &self.queue
    }

    pub fn status(&self) -> Status {
        *self.status.lock().unwrap()
    }

    /// Lock the algorithm state.
    ///
    /// Handlers must release the guard before returning.
    pub fn state(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap()
    }

    /// Append `handler` to the chain.
    pub fn register_handler(&self, handler: impl Handler<S>) {
        self.register_shared(Arc::new(handler));
    }

    /// Append a handler that may also be used by other processes.
    pub fn register_shared(&self, handler: Arc<dyn Handler<S>>) {
        self.handlers.write().unwrap().push(handler);
    }

    /// Number of handlers in the chain.
    pub fn handlers(&self) -> usize {
        self.handlers.read().unwrap().len()
    }

    /// Direct out-neighbors of this process.
    pub fn neighbors(&self) -> HashSet<ProcessId> {
        self.router.neighbors(self.id)
    }

    /// See [is_my_message].
    pub fn is_my_message(&self, prefix: &[u8], content: &[u8]) -> bool {
        is_my_message(prefix, content)
    }

    /// Send `message` from this process to `to` (or broadcast).
    pub fn send(&self, to: ProcessId, message: &Envelope) -> Result<(), distsim_network::Error> {
        self.router.send_message(self.id, to, message)
    }

    /// Stop the dispatch loop and wait for it to exit.
    ///
    /// A message being dispatched when stop is requested is finished first.
    /// Every caller, including concurrent ones, returns only once the loop has
    /// exited.
    pub async fn stop(&self) {
        let completion = {
            let mut status = self.status.lock().unwrap();
            if *status == Status::Running {
                *status = Status::Stopping;
            }
            self.task.lock().unwrap().request_stop()
        };
        let _ = completion.await;
        *self.status.lock().unwrap() = Status::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(b"", b"*", true; "star alone")]
    #[test_case(b"SETX", b"*TIME", true; "control message")]
    #[test_case(b"Lorem ipsum", b"", false; "prefix longer than content")]
    #[test_case(b"Lorem", b"Larem_ipsum", false; "wrong prefix")]
    #[test_case(b"Lorem", b"Lorem_ipsum", true; "matching prefix")]
    #[test_case(b"Lorem", b"Lorem_", false; "nothing after delimiter")]
    #[test_case(b"Lorem", b"Lorem-ipsum", false; "wrong delimiter")]
    #[test_case(b"SETX", b"SETX_INIT", true; "setx init")]
    fn test_is_my_message(prefix: &[u8], content: &[u8], expected: bool) {
        assert_eq!(is_my_message(prefix, content), expected);
    }
}
