//! Dispatch delivered messages through per-process handler chains.
//!
//! A [Process] owns one delivery queue registered with a
//! [Router](distsim_network::Router) and a background loop that hands every
//! due message to its [Handler]s in registration order. The first handler
//! returning `Ok(true)` ends the chain for that message.
//!
//! A [Simulation] groups the processes of one run with a registry of named
//! handlers and stops everything together.

mod handler;
mod process;
mod simulation;

pub use handler::Handler;
pub use process::{is_my_message, Process, Status, POLL_INTERVAL};
pub use simulation::Simulation;

use distsim_utils::ProcessId;
use thiserror::Error;

/// Errors returned while assembling a [Simulation].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] distsim_network::Error),
    #[error("unknown handler: {0}")]
    UnknownHandler(String),
    #[error("unknown process: {0}")]
    UnknownProcess(ProcessId),
}
