use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Why a message never reached a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    OutOfRange,
    Loss,
    NoQueue,
    NoLink,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OutOfRange => "out_of_range",
            Self::Loss => "loss",
            Self::NoQueue => "no_queue",
            Self::NoLink => "no_link",
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Dropped {
    pub reason: String,
}

impl From<Reason> for Dropped {
    fn from(reason: Reason) -> Self {
        Self {
            reason: reason.as_str().to_string(),
        }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub sent: Counter,
    pub dropped: Family<Dropped, Counter>,
    pub dispatched: Counter,
}

impl Metrics {
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "messages_sent",
            "messages enqueued for delivery",
            metrics.sent.clone(),
        );
        registry.register(
            "messages_dropped",
            "messages that never reached a queue",
            metrics.dropped.clone(),
        );
        registry.register(
            "messages_dispatched",
            "messages handed to a handler chain",
            metrics.dispatched.clone(),
        );
        metrics
    }

    pub fn record_drop(&self, reason: Reason) {
        self.dropped.get_or_create(&reason.into()).inc();
    }
}
