//! Per-process queue of messages ordered by delivery time.

use distsim_codec::Envelope;
use distsim_utils::{PriorityQueue, Tick};
use std::sync::Mutex;

/// A lock-protected min-heap of [Envelope]s keyed by `delivery_time`.
///
/// Any number of senders may [DeliveryQueue::enqueue] concurrently with the
/// single loop that drains it. No operation blocks beyond the lock.
/// Messages with equal delivery times come out in an unspecified order.
#[derive(Default)]
pub struct DeliveryQueue {
    heap: Mutex<PriorityQueue<Envelope>>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `envelope` by its delivery time.
    pub fn enqueue(&self, envelope: Envelope) {
        let priority = envelope.delivery_time;
        self.heap.lock().unwrap().push(priority, envelope);
    }

    /// Remove the message with the earliest delivery time.
    pub fn dequeue(&self) -> Option<Envelope> {
        self.heap.lock().unwrap().pop().map(|(_, envelope)| envelope)
    }

    /// The message with the earliest delivery time, left in place.
    pub fn peek(&self) -> Option<Envelope> {
        self.heap
            .lock()
            .unwrap()
            .peek()
            .map(|(_, envelope)| envelope.clone())
    }

    /// Remove the earliest message if it is due at `now`.
    ///
    /// Checking and removing happen under one lock, so a sender enqueuing an
    /// earlier message in between cannot reorder dispatch.
    pub fn pop_due(&self, now: Tick) -> Option<Envelope> {
        self.heap
            .lock()
            .unwrap()
            .pop_if_at_most(now)
            .map(|(_, envelope)| envelope)
    }

    /// Number of queued messages.
    pub fn size(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
