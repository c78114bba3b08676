//! Periodic broadcast of a counter to every process.

use crate::Router;
use distsim_codec::{Envelope, Field, Text};
use distsim_runtime::Task;
use distsim_utils::BROADCAST;
use std::{sync::Weak, time::Duration};
use tracing::debug;

/// Body prefix of every timer message.
pub const TIME_PREFIX: &str = "*TIME";

const PREFIX: Text = Text::from_static(TIME_PREFIX.as_bytes());

/// Spawn a loop that broadcasts `[*TIME, counter]` every `interval`, starting
/// immediately with counter `0`.
///
/// The loop holds only a weak handle so it never keeps the router alive.
pub(crate) fn spawn(router: Weak<Router>, interval: Duration) -> Task {
    let prefix = Field::String(PREFIX);
    let mut counter: i32 = 0;
    Task::spawn("timer", interval, move || {
        let Some(router) = router.upgrade() else {
            return false;
        };
        let message = Envelope::from_fields([prefix.clone(), Field::Int32(counter)]);
        debug!(counter, "timer tick");
        let _ = router.send_message(BROADCAST, BROADCAST, &message);
        counter = counter.wrapping_add(1);
        false
    })
}
