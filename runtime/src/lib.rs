//! Run background loops and the shared virtual clock.
//!
//! Every long-running piece of the simulator (the clock, each process'
//! dispatch loop, periodic producers) is a [Task]: a [tokio] task paired with a
//! [signal::Stopper]. Stopping a [Task] requests shutdown and waits until the
//! loop has exited, so owners can release shared resources afterwards.
//!
//! Time is read from [tokio::time], so a simulation can be driven on a paused
//! runtime in tests.

pub mod clock;
pub mod signal;
mod task;

pub use clock::{Clock, VirtualClock};
pub use signal::{Signal, Signaler, Stopper};
pub use task::Task;
