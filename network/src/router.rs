//! Route messages between registered processes.

use crate::{
    metrics::{Metrics, Reason},
    queue::DeliveryQueue,
    timer,
    topology::{Cost, Topology},
    Error,
};
use bytes::Bytes;
use distsim_codec::Envelope;
use distsim_runtime::{clock, Clock, Task, VirtualClock};
use distsim_utils::{is_broadcast, ProcessId, Tick};
use prometheus_client::registry::Registry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};
use tracing::debug;

/// Configuration for a [Router].
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Probability in `[0, 1]` that any single send is lost.
    pub error_rate: f64,

    /// Seed for loss injection. Uses entropy if `None`.
    pub seed: Option<u64>,

    /// Configuration of the virtual clock started with the router.
    pub clock: clock::Config,
}

fn validate(rate: f64) -> Result<f64, Error> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(Error::InvalidErrorRate(rate));
    }
    Ok(rate)
}

struct Loss {
    rate: f64,
    rng: StdRng,
}

/// Implementation of a simulated network.
///
/// Owns the topology, one [DeliveryQueue] handle per registered process and
/// the virtual clock that stamps every send. Topology and registrations may
/// change while traffic flows; both tables are guarded by their own lock.
pub struct Router {
    topology: RwLock<Topology>,
    queues: RwLock<BTreeMap<ProcessId, Arc<DeliveryQueue>>>,
    loss: Mutex<Loss>,

    clock: Clock,
    clock_loop: Mutex<Option<VirtualClock>>,
    timers: Mutex<Vec<Task>>,

    metrics: Metrics,
}

impl Router {
    /// Create a router and start its clock at tick `0`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(cfg: Config, registry: &mut Registry) -> Result<Arc<Self>, Error> {
        let rate = validate(cfg.error_rate)?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let metrics = Metrics::init(registry);
        let clock_loop = VirtualClock::start(cfg.clock);

        Ok(Arc::new(Self {
            topology: RwLock::new(Topology::new()),
            queues: RwLock::new(BTreeMap::new()),
            loss: Mutex::new(Loss { rate, rng }),
            clock: clock_loop.clock(),
            clock_loop: Mutex::new(Some(clock_loop)),
            timers: Mutex::new(Vec::new()),
            metrics,
        }))
    }

    /// Change the probability that a send is lost.
    pub fn set_error_rate(&self, rate: f64) -> Result<(), Error> {
        self.loss.lock().unwrap().rate = validate(rate)?;
        Ok(())
    }

    /// The current probability that a send is lost.
    pub fn error_rate(&self) -> f64 {
        self.loss.lock().unwrap().rate
    }

    /// Current tick of the virtual clock.
    pub fn now(&self) -> Tick {
        self.clock.now()
    }

    /// A read-only handle to the virtual clock.
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// One more than the highest registered id, or `0` if none is registered.
    pub fn network_size(&self) -> ProcessId {
        Self::size_of(&self.queues.read().unwrap())
    }

    fn size_of(queues: &BTreeMap<ProcessId, Arc<DeliveryQueue>>) -> ProcessId {
        queues
            .last_key_value()
            .map_or(0, |(id, _)| id.saturating_add(1))
    }

    /// Bind `queue` to `id`.
    ///
    /// Ids may be sparse; unregistered ids below the network size are
    /// unreachable destinations.
    pub fn register_process(&self, id: ProcessId, queue: Arc<DeliveryQueue>) -> Result<(), Error> {
        if is_broadcast(id) {
            return Err(Error::InvalidProcess(id));
        }
        let mut queues = self.queues.write().unwrap();
        if queues.contains_key(&id) {
            return Err(Error::DuplicateItems(id));
        }
        queues.insert(id, queue);
        debug!(id, size = Self::size_of(&queues), "registered process");
        Ok(())
    }

    pub fn create_link(&self, from: ProcessId, to: ProcessId, bidirectional: bool, cost: Cost) {
        self.topology
            .write()
            .unwrap()
            .create_link(from, to, bidirectional, cost);
    }

    /// Link `from` to every id below the current network size.
    pub fn add_links_to_all(&self, from: ProcessId, bidirectional: bool, latency: Cost) {
        let size = self.network_size();
        self.topology
            .write()
            .unwrap()
            .add_links_to_all(from, bidirectional, latency, size);
    }

    /// Link every id below the current network size to `to`.
    pub fn add_links_from_all(&self, to: ProcessId, bidirectional: bool, latency: Cost) {
        let size = self.network_size();
        self.topology
            .write()
            .unwrap()
            .add_links_from_all(to, bidirectional, latency, size);
    }

    /// Link every pair of distinct ids below the current network size.
    pub fn add_links_all_to_all(&self, bidirectional: bool, latency: Cost) {
        let size = self.network_size();
        self.topology
            .write()
            .unwrap()
            .add_links_all_to_all(bidirectional, latency, size);
    }

    /// See [Topology::get_link].
    pub fn get_link(&self, from: ProcessId, to: ProcessId) -> Option<Cost> {
        self.topology.read().unwrap().get_link(from, to)
    }

    /// See [Topology::neighbors].
    pub fn neighbors(&self, from: ProcessId) -> HashSet<ProcessId> {
        self.topology.read().unwrap().neighbors(from)
    }

    fn lost(&self) -> bool {
        let mut loss = self.loss.lock().unwrap();
        let rate = loss.rate;
        rate > 0.0 && loss.rng.gen_bool(rate)
    }

    fn dropped(&self, from: ProcessId, to: ProcessId, reason: Reason, err: Error) -> Error {
        debug!(from, to, reason = reason.as_str(), "dropped message");
        self.metrics.record_drop(reason);
        err
    }

    /// Enqueue `payload` on the queue of `to`, due after the cost of the link
    /// from `from`.
    ///
    /// Loss is decided before the destination queue is looked up, so a lost
    /// message never reaches any queue.
    pub fn send_bytes(&self, from: ProcessId, to: ProcessId, payload: Bytes) -> Result<(), Error> {
        let queue = {
            let queues = self.queues.read().unwrap();
            if to >= Self::size_of(&queues) {
                return Err(self.dropped(from, to, Reason::OutOfRange, Error::SizeTooBig(to)));
            }
            if self.lost() {
                return Err(self.dropped(from, to, Reason::Loss, Error::TimeOut));
            }
            queues.get(&to).cloned()
        };
        let Some(queue) = queue else {
            return Err(self.dropped(from, to, Reason::NoQueue, Error::ItemNotFound));
        };
        let Some(cost) = self.get_link(from, to) else {
            return Err(self.dropped(from, to, Reason::NoLink, Error::ItemNotFound));
        };

        let now = self.now();
        let mut envelope = Envelope::new(from, to, payload);
        envelope.send_time = now;
        envelope.delivery_time = now.saturating_add(Tick::from(cost));
        debug!(from, to, delivery_time = envelope.delivery_time, "enqueued message");
        queue.enqueue(envelope);
        self.metrics.sent.inc();
        Ok(())
    }

    /// Send the body of `message` to `to`, or to every registered process
    /// other than `from` if `to` is the broadcast sentinel.
    ///
    /// A broadcast attempts every destination independently and always
    /// returns `Ok(())`. Individual failures are only logged.
    pub fn send_message(
        &self,
        from: ProcessId,
        to: ProcessId,
        message: &Envelope,
    ) -> Result<(), Error> {
        if !is_broadcast(to) {
            return self.send_bytes(from, to, message.body().clone());
        }

        let recipients: Vec<ProcessId> = self
            .queues
            .read()
            .unwrap()
            .keys()
            .copied()
            .filter(|id| *id != from)
            .collect();
        for recipient in recipients {
            if let Err(err) = self.send_bytes(from, recipient, message.body().clone()) {
                debug!(from, to = recipient, ?err, "broadcast delivery failed");
            }
        }
        Ok(())
    }

    /// Record that a process handed a message to its handler chain.
    pub fn dispatched(&self) {
        self.metrics.dispatched.inc();
    }

    /// Broadcast `[*TIME, counter]` every `interval` until [Router::stop].
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn launch_timer(self: &Arc<Self>, interval: Duration) {
        let task = timer::spawn(Arc::downgrade(self), interval);
        self.timers.lock().unwrap().push(task);
    }

    /// Stop every timer, then the clock, waiting for each loop to exit.
    ///
    /// The last tick stays readable. Sending remains possible, stamped with
    /// the frozen tick.
    pub async fn stop(&self) {
        let timers = std::mem::take(&mut *self.timers.lock().unwrap());
        for mut timer in timers {
            timer.stop().await;
        }
        let clock_loop = self.clock_loop.lock().unwrap().take();
        if let Some(mut clock_loop) = clock_loop {
            clock_loop.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use distsim_codec::Field;
    use distsim_utils::BROADCAST;
    use prometheus_client::encoding::text::encode;

    fn router(cfg: Config) -> Arc<Router> {
        Router::new(cfg, &mut Registry::default()).unwrap()
    }

    fn with_queues(
        router: &Router,
        ids: impl IntoIterator<Item = ProcessId>,
    ) -> Vec<Arc<DeliveryQueue>> {
        ids.into_iter()
            .map(|id| {
                let queue = Arc::new(DeliveryQueue::new());
                router.register_process(id, queue.clone()).unwrap();
                queue
            })
            .collect()
    }

    fn ping() -> Envelope {
        Envelope::from_fields([Field::string("PING_0").unwrap()])
    }

    #[tokio::test]
    async fn test_invalid_error_rate() {
        for rate in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                Router::new(
                    Config {
                        error_rate: rate,
                        ..Default::default()
                    },
                    &mut Registry::default()
                ),
                Err(Error::InvalidErrorRate(_))
            ));
        }

        let router = router(Config::default());
        assert_eq!(router.set_error_rate(2.0), Err(Error::InvalidErrorRate(2.0)));
        assert_eq!(router.set_error_rate(1.0), Ok(()));
        assert_eq!(router.error_rate(), 1.0);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_register_process() {
        let router = router(Config::default());
        assert_eq!(router.network_size(), 0);

        let original = Arc::new(DeliveryQueue::new());
        router.register_process(0, original.clone()).unwrap();
        assert_eq!(router.network_size(), 1);

        let replacement = Arc::new(DeliveryQueue::new());
        assert_eq!(
            router.register_process(0, replacement.clone()),
            Err(Error::DuplicateItems(0))
        );
        assert_eq!(router.network_size(), 1);

        // The original binding is untouched.
        router.send_bytes(0, 0, Bytes::from_static(b"x")).unwrap();
        assert_eq!(original.size(), 1);
        assert!(replacement.is_empty());

        assert_eq!(
            router.register_process(BROADCAST, Arc::new(DeliveryQueue::new())),
            Err(Error::InvalidProcess(BROADCAST))
        );
        router.stop().await;
    }

    #[tokio::test]
    async fn test_sparse_registration() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 4]);
        assert_eq!(router.network_size(), 5);
        router.add_links_all_to_all(true, 1);

        // A gap below the network size is an unreachable destination.
        assert_eq!(
            router.send_bytes(0, 2, Bytes::new()),
            Err(Error::ItemNotFound)
        );
        router.send_bytes(0, 4, Bytes::new()).unwrap();
        assert_eq!(queues[1].size(), 1);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_size_too_big() {
        let router = router(Config::default());
        with_queues(&router, [0, 1]);
        router.create_link(0, 1, true, 1);

        assert_eq!(
            router.send_bytes(0, 2, Bytes::new()),
            Err(Error::SizeTooBig(2))
        );
        assert_eq!(
            router.send_message(0, 7, &ping()),
            Err(Error::SizeTooBig(7))
        );
        router.stop().await;
    }

    #[tokio::test]
    async fn test_negative_destination() {
        let router = router(Config::default());
        with_queues(&router, [0]);
        assert_eq!(
            router.send_bytes(0, BROADCAST, Bytes::new()),
            Err(Error::ItemNotFound)
        );
        router.stop().await;
    }

    #[tokio::test]
    async fn test_no_link() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1]);
        router.create_link(0, 1, false, 3);

        assert_eq!(router.send_bytes(1, 0, Bytes::new()), Err(Error::ItemNotFound));
        assert!(queues[0].is_empty());
        router.send_bytes(0, 1, Bytes::new()).unwrap();
        assert_eq!(queues[1].size(), 1);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_full_loss() {
        let router = router(Config {
            error_rate: 1.0,
            seed: Some(0),
            ..Default::default()
        });
        let queues = with_queues(&router, [0, 1]);
        router.add_links_all_to_all(true, 1);

        for _ in 0..100 {
            assert_eq!(router.send_bytes(0, 1, Bytes::new()), Err(Error::TimeOut));
        }
        assert!(queues[1].is_empty());

        // Loss precedes the queue lookup.
        assert_eq!(router.send_bytes(0, BROADCAST, Bytes::new()), Err(Error::TimeOut));
        router.stop().await;
    }

    #[tokio::test]
    async fn test_no_loss() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1]);
        router.add_links_all_to_all(true, 1);

        for _ in 0..100 {
            router.send_bytes(0, 1, Bytes::new()).unwrap();
        }
        assert_eq!(queues[1].size(), 100);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_partial_loss() {
        let router = router(Config {
            error_rate: 0.5,
            seed: Some(7),
            ..Default::default()
        });
        let queues = with_queues(&router, [0, 1]);
        router.add_links_all_to_all(true, 1);

        let lost = (0..1_000)
            .filter(|_| router.send_bytes(0, 1, Bytes::new()) == Err(Error::TimeOut))
            .count();
        assert!((300..700).contains(&lost), "lost {lost}");
        assert_eq!(queues[1].size(), 1_000 - lost);
        router.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_time() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1]);
        router.create_link(0, 1, true, 5);

        tokio::time::sleep(Duration::from_millis(10_050)).await;
        assert_eq!(router.now(), 10);

        router.send_message(0, 1, &ping()).unwrap();
        let envelope = queues[1].peek().unwrap();
        assert_eq!(envelope.send_time, 10);
        assert_eq!(envelope.delivery_time, 15);
        assert_eq!(envelope.from, 0);
        assert_eq!(envelope.to, 1);
        assert_eq!(envelope.body(), ping().body());

        // Costs apply at send time only.
        router.create_link(0, 1, true, 50);
        assert_eq!(queues[1].peek().unwrap().delivery_time, 15);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1, 2]);
        router.add_links_all_to_all(true, 2);

        assert_eq!(router.send_message(0, BROADCAST, &ping()), Ok(()));
        assert_eq!(queues[0].size(), 0);
        assert_eq!(queues[1].size(), 1);
        assert_eq!(queues[2].size(), 1);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_broadcast_ignores_failures() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1, 2]);
        router.create_link(0, 2, false, 1);

        // Unreachable process 1 is skipped silently.
        assert_eq!(router.send_message(0, BROADCAST, &ping()), Ok(()));
        assert!(queues[1].is_empty());
        assert_eq!(queues[2].size(), 1);

        router.set_error_rate(1.0).unwrap();
        assert_eq!(router.send_message(0, BROADCAST, &ping()), Ok(()));
        assert_eq!(queues[2].size(), 1);
        router.stop().await;
    }

    #[tokio::test]
    async fn test_neighbors() {
        let router = router(Config::default());
        with_queues(&router, [0, 1, 2, 3]);
        router.add_links_to_all(2, false, 1);
        assert_eq!(router.neighbors(2), HashSet::from([0, 1, 3]));
        assert!(router.neighbors(0).is_empty());

        router.add_links_from_all(0, false, 4);
        assert_eq!(router.get_link(3, 0), Some(4));
        assert_eq!(router.get_link(0, 3), None);
        router.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0, 1]);
        router.create_link(0, 1, true, 150);

        router.launch_timer(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        router.stop().await;

        for queue in &queues {
            assert_eq!(queue.size(), 2);
        }
        let mut first = queues[0].dequeue().unwrap();
        assert_eq!(first.from, BROADCAST);
        assert_eq!(first.delivery_time, first.send_time);
        assert_eq!(&first.get_string().unwrap()[..], b"*TIME");
        let counter = first.get_i32().unwrap();
        let expected = Envelope::from_fields([
            Field::string(crate::TIME_PREFIX).unwrap(),
            Field::Int32(counter),
        ]);
        assert_eq!(first.body(), expected.body());
        let mut second = queues[0].dequeue().unwrap();
        second.get_string().unwrap();
        assert_eq!(counter + second.get_i32().unwrap(), 1);

        // Stopped timers send nothing more.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(queues[1].size(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_without_stop() {
        let router = router(Config::default());
        let queues = with_queues(&router, [0]);
        router.launch_timer(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(1_250)).await;

        let clock = router.clock();
        drop(router);
        let (sent, tick) = (queues[0].size(), clock.now());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(queues[0].size(), sent);
        assert_eq!(clock.now(), tick);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_clock() {
        let router = router(Config::default());
        tokio::time::sleep(Duration::from_millis(3_050)).await;
        router.stop().await;
        router.stop().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(router.now(), 3);
    }

    #[tokio::test]
    async fn test_metrics() {
        let mut registry = Registry::default();
        let router = Router::new(Config::default(), &mut registry).unwrap();
        with_queues(&router, [0, 1]);
        router.create_link(0, 1, false, 1);

        router.send_bytes(0, 1, Bytes::new()).unwrap();
        let _ = router.send_bytes(1, 0, Bytes::new());
        let _ = router.send_bytes(0, 9, Bytes::new());
        router.dispatched();

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("messages_sent_total 1"));
        assert!(buffer.contains("messages_dropped_total{reason=\"no_link\"} 1"));
        assert!(buffer.contains("messages_dropped_total{reason=\"out_of_range\"} 1"));
        assert!(buffer.contains("messages_dispatched_total 1"));
        router.stop().await;
    }
}
