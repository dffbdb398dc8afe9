use std::sync::Arc;

use super::supervisor::Supervisor;
use crate::{
    config::Config,
    events::Bus,
    platform::Platform,
    policies::{VendorPolicy, policy_for},
    store::{MemoryStore, StateStore},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    platform: Platform,
    store: Option<Arc<dyn StateStore>>,
    policy: Option<VendorPolicy>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration and platform.
    pub fn new(cfg: Config, platform: Platform) -> Self {
        Self {
            cfg,
            platform,
            store: None,
            policy: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the durable store for the last requested mode.
    ///
    /// Defaults to a fresh [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the vendor policy otherwise looked up from the device manufacturer.
    pub fn with_policy(mut self, policy: VendorPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor and starts forwarding events to subscribers.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let policy = self
            .policy
            .unwrap_or_else(|| policy_for(&self.platform.device.manufacturer));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        subscriber_listener(&bus, &subs);
        Arc::new(Supervisor::new_internal(
            self.cfg,
            policy,
            self.platform,
            bus,
            subs,
            store,
        ))
    }
}

/// Forwards bus events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, subs: &Arc<SubscriberSet>) {
    if subs.is_empty() {
        return;
    }
    let mut rx = bus.subscribe();
    let set = Arc::clone(subs);
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

impl Supervisor {
    /// Starts building a supervisor for `platform`.
    pub fn builder(cfg: Config, platform: Platform) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg, platform)
    }
}
