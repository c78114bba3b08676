//! All processes of one run, plus the handlers they may be assigned.

use crate::{Error, Handler, Process};
use distsim_network::Router;
use distsim_utils::ProcessId;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::info;

/// A set of processes sharing one [Router].
///
/// Handlers are registered once by name and then assigned to any number of
/// processes. Names are only used at this boundary: assigned handlers are
/// called directly.
pub struct Simulation<S> {
    router: Arc<Router>,
    processes: BTreeMap<ProcessId, Arc<Process<S>>>,
    handlers: HashMap<String, Arc<dyn Handler<S>>>,
}

impl<S: Send + 'static> Simulation<S> {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            processes: BTreeMap::new(),
            handlers: HashMap::new(),
        }
    }

    /// Spawn a process for `id` with initial `state`.
    pub fn create_process(&mut self, id: ProcessId, state: S) -> Result<Arc<Process<S>>, Error> {
        let process = Process::spawn(id, self.router.clone(), state)?;
        self.processes.insert(id, process.clone());
        Ok(process)
    }

    /// Make `handler` assignable under `name`, replacing any handler with the
    /// same name.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: impl Handler<S>) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Append the handler registered as `name` to the chain of process `id`.
    pub fn assign_handler(&self, id: ProcessId, name: &str) -> Result<(), Error> {
        let process = self.processes.get(&id).ok_or(Error::UnknownProcess(id))?;
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| Error::UnknownHandler(name.to_string()))?;
        process.register_shared(handler.clone());
        Ok(())
    }

    /// Stop the router, then every process, waiting for each loop to exit.
    pub async fn stop(&self) {
        self.router.stop().await;
        for process in self.processes.values() {
            process.stop().await;
        }
        info!(processes = self.processes.len(), "simulation stopped");
    }
}

impl<S> Simulation<S> {
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn process(&self, id: ProcessId) -> Option<&Arc<Process<S>>> {
        self.processes.get(&id)
    }

    /// Processes ordered by id.
    pub fn processes(&self) -> impl Iterator<Item = &Arc<Process<S>>> {
        self.processes.values()
    }
}
