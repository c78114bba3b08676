//! Deliver messages between simulated processes over costed links.
//!
//! # Overview
//!
//! A [Router] owns the [Topology] (directed links with an integer cost in
//! ticks), the shared virtual clock and one [DeliveryQueue] per registered
//! process. Sending resolves the link cost, applies random loss and enqueues
//! the message on the recipient's queue with
//! `delivery_time = now + cost`. Each process drains its own queue once the
//! clock reaches a message's delivery time.
//!
//! # Example
//!
//! ```
//! use distsim_codec::{Envelope, Field};
//! use distsim_network::{Config, DeliveryQueue, Router};
//! use prometheus_client::registry::Registry;
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let router = Router::new(Config::default(), &mut Registry::default()).unwrap();
//!     let inbox = Arc::new(DeliveryQueue::new());
//!     router.register_process(0, Arc::new(DeliveryQueue::new())).unwrap();
//!     router.register_process(1, inbox.clone()).unwrap();
//!     router.create_link(0, 1, true, 5);
//!
//!     let msg = Envelope::from_fields([Field::string("PING_0").unwrap()]);
//!     router.send_message(0, 1, &msg).unwrap();
//!     assert_eq!(inbox.peek().unwrap().delivery_time, router.now() + 5);
//!     router.stop().await;
//! }
//! ```

mod metrics;
pub mod queue;
pub mod router;
mod timer;
pub mod topology;

pub use queue::DeliveryQueue;
pub use router::{Config, Router};
pub use timer::TIME_PREFIX;
pub use topology::{Cost, Topology};

use distsim_utils::ProcessId;
use thiserror::Error;

/// Errors returned by [Router] operations.
///
/// These are recoverable: callers may retry, ignore or report them, and they
/// never stop a background loop.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("destination {0} is outside the network")]
    SizeTooBig(ProcessId),
    #[error("item not found")]
    ItemNotFound,
    #[error("process {0} is already registered")]
    DuplicateItems(ProcessId),
    #[error("message lost")]
    TimeOut,
    #[error("invalid error rate (must be in [0, 1]): {0}")]
    InvalidErrorRate(f64),
    #[error("invalid process id: {0}")]
    InvalidProcess(ProcessId),
}
