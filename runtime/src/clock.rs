//! The shared virtual clock.
//!
//! A single loop samples elapsed (tokio) time every `poll_interval` and
//! publishes `floor(elapsed / tick)`. Every other component only reads it.

use crate::Task;
use distsim_utils::Tick;
use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::Instant;

/// Configuration for a [VirtualClock].
#[derive(Clone, Debug)]
pub struct Config {
    /// Real duration of one tick.
    pub tick: Duration,

    /// How often elapsed time is sampled.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Read-only handle to the current tick.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    tick: Arc<AtomicI64>,
}

impl Clock {
    /// The most recently published tick.
    pub fn now(&self) -> Tick {
        self.tick.load(Ordering::Acquire)
    }

    fn publish(&self, tick: Tick) {
        // Never rewind.
        self.tick.fetch_max(tick, Ordering::AcqRel);
    }
}

/// Owner of the clock loop.
pub struct VirtualClock {
    clock: Clock,
    task: Task,
}

impl VirtualClock {
    /// Start the clock loop on the current [tokio] runtime at tick `0`.
    pub fn start(cfg: Config) -> Self {
        let clock = Clock::default();
        let tick_nanos = cfg.tick.as_nanos().max(1);
        let started = Instant::now();
        let task = Task::spawn("clock", cfg.poll_interval, {
            let clock = clock.clone();
            move || {
                let elapsed = started.elapsed().as_nanos() / tick_nanos;
                clock.publish(Tick::try_from(elapsed).unwrap_or(Tick::MAX));
                false
            }
        });
        Self { clock, task }
    }

    /// A read-only handle to the published tick.
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// The most recently published tick.
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// Stop the clock loop and wait for it to exit.
    ///
    /// The last published tick stays readable.
    pub async fn stop(&mut self) {
        self.task.stop().await;
    }
}
