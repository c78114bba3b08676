//! Leverage common functionality across the simulator crates.

pub mod priority_queue;
pub use priority_queue::PriorityQueue;

/// Identifier of a simulated process.
///
/// Negative values are reserved (see [BROADCAST]).
pub type ProcessId = i32;

/// One unit of the shared virtual clock.
pub type Tick = i64;

/// Destination (or origin) meaning "every registered process" or "unset".
pub const BROADCAST: ProcessId = -1;

/// Returns true if `id` is the broadcast/unset sentinel.
pub fn is_broadcast(id: ProcessId) -> bool {
    id < 0
}
