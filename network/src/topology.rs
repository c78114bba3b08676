//! Directed, costed links between processes.

use distsim_utils::{is_broadcast, ProcessId};
use std::collections::{HashMap, HashSet};

/// Ticks needed to traverse a link.
pub type Cost = u32;

/// Adjacency map of `from -> (to -> cost)`.
///
/// Self-loops are never stored: delivery to oneself is always free.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    links: HashMap<ProcessId, HashMap<ProcessId, Cost>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `from -> to` (and `to -> from` if `bidirectional`) with `cost`,
    /// replacing any existing cost. Does nothing if `from == to`.
    pub fn create_link(&mut self, from: ProcessId, to: ProcessId, bidirectional: bool, cost: Cost) {
        if from == to {
            return;
        }
        self.links.entry(from).or_default().insert(to, cost);
        if bidirectional {
            self.links.entry(to).or_default().insert(from, cost);
        }
    }

    /// Cost of sending from `from` to `to`.
    ///
    /// Broadcast origins and local delivery cost nothing. Returns `None` if
    /// `to` is unreachable from `from`.
    pub fn get_link(&self, from: ProcessId, to: ProcessId) -> Option<Cost> {
        if is_broadcast(from) || from == to {
            return Some(0);
        }
        self.links.get(&from)?.get(&to).copied()
    }

    /// Link `from` to every id in `0..size`.
    pub fn add_links_to_all(
        &mut self,
        from: ProcessId,
        bidirectional: bool,
        latency: Cost,
        size: ProcessId,
    ) {
        for to in 0..size {
            self.create_link(from, to, bidirectional, latency);
        }
    }

    /// Link every id in `0..size` to `to`.
    pub fn add_links_from_all(
        &mut self,
        to: ProcessId,
        bidirectional: bool,
        latency: Cost,
        size: ProcessId,
    ) {
        for from in 0..size {
            self.create_link(from, to, bidirectional, latency);
        }
    }

    /// Link every pair of distinct ids in `0..size`.
    pub fn add_links_all_to_all(&mut self, bidirectional: bool, latency: Cost, size: ProcessId) {
        for to in 0..size {
            self.add_links_from_all(to, bidirectional, latency, size);
        }
    }

    /// Direct out-neighbors of `from`.
    pub fn neighbors(&self, from: ProcessId) -> HashSet<ProcessId> {
        self.links
            .get(&from)
            .map(|out| out.keys().copied().collect())
            .unwrap_or_default()
    }
}
