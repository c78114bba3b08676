//! Propagate a value through a simulated network.
//!
//! Process `0` is sent `[SETX_INIT, value]`. It forwards `[SETX_SET, value]`
//! to itself, and every process that receives a `SETX_SET` carrying a value it
//! does not hold yet stores it and forwards it to all of its neighbors.
//! With a connected topology and no loss, every process ends up holding the
//! value.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin propagate -- --config demos/propagate/config.yaml --log-level debug
//! ```

use distsim_codec::{Envelope, Error, Field};
use distsim_network::Cost;
use distsim_process::Process;
use distsim_utils::ProcessId;
use serde::Deserialize;
use tracing::{debug, info};

/// Prefix owned by the propagation handler.
pub const PREFIX: &[u8] = b"SETX";
/// Starts propagation at the receiving process.
pub const INIT: &[u8] = b"SETX_INIT";
/// Carries the value being propagated.
pub const SET: &[u8] = b"SETX_SET";

/// Name the handler is registered under.
pub const HANDLER: &str = "SETX";

/// Demo configuration, read from YAML. Missing keys take their default.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Processes `0..processes` are created.
    pub processes: ProcessId,
    /// Cost of every link, in ticks.
    pub latency: Cost,
    pub bidirectional: bool,
    pub error_rate: f64,
    /// Real duration of one tick.
    pub tick_ms: u64,
    pub seed: Option<u64>,
    /// Value propagated from process `0`.
    pub value: i32,
    /// Interval of the timer broadcast, if any.
    pub timer_secs: Option<u64>,
    /// How long to run before stopping.
    pub run_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processes: 5,
            latency: 1,
            bidirectional: true,
            error_rate: 0.0,
            tick_ms: 1_000,
            seed: None,
            value: 42,
            timer_secs: None,
            run_secs: 10,
        }
    }
}

/// Value held by one process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetX {
    pub x: Option<i32>,
}

fn message(kind: &'static [u8], value: i32) -> Result<Envelope, Error> {
    Ok(Envelope::from_fields([
        Field::string(kind)?,
        Field::Int32(value),
    ]))
}

/// `[SETX_INIT, value]`
pub fn init(value: i32) -> Result<Envelope, Error> {
    message(INIT, value)
}

fn forward(process: &Process<SetX>, to: ProcessId, value: i32) -> Result<(), Error> {
    let set = message(SET, value)?;
    if let Err(err) = process.send(to, &set) {
        debug!(from = process.id(), to, ?err, "failed to forward value");
    }
    Ok(())
}

/// Handle `SETX_*` messages and consume control messages.
pub fn set_x(process: &Process<SetX>, message: &mut Envelope) -> Result<bool, Error> {
    let content = message.get_string()?;
    if !process.is_my_message(PREFIX, &content) {
        return Ok(false);
    }

    match &content[..] {
        INIT => {
            let value = message.get_i32()?;
            forward(process, process.id(), value)?;
        }
        SET => {
            let value = message.get_i32()?;
            info!(id = process.id(), value, from = message.from, "received value");
            let changed = {
                let mut state = process.state();
                let changed = state.x != Some(value);
                state.x = Some(value);
                changed
            };
            if changed {
                for neighbor in process.neighbors() {
                    forward(process, neighbor, value)?;
                }
            }
        }
        _ => {}
    }
    Ok(true)
}
