use crate::Process;
use distsim_codec::{Envelope, Error};

/// One step of a process's handler chain.
///
/// Returns `Ok(true)` if the message was fully handled and `Ok(false)` to pass
/// it to the next handler. A decode [Error] means the handler read the message
/// wrongly: the chain is aborted for that message and the error is logged.
pub trait Handler<S>: Send + Sync + 'static {
    fn handle(&self, process: &Process<S>, message: &mut Envelope) -> Result<bool, Error>;
}

impl<S, F> Handler<S> for F
where
    F: Fn(&Process<S>, &mut Envelope) -> Result<bool, Error> + Send + Sync + 'static,
{
    fn handle(&self, process: &Process<S>, message: &mut Envelope) -> Result<bool, Error> {
        self(process, message)
    }
}
