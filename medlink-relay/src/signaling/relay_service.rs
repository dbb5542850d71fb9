use crate::registry::SignalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Peers silent for longer than this are expired.
    pub peer_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            peer_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct RelayInner {
    store: SignalStore,
    config: RelayConfig,
}

#[derive(Clone)]
pub struct RelayService {
    inner: Arc<RelayInner>,
}

impl RelayService {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                store: SignalStore::new(),
                config,
            }),
        }
    }

    pub fn store(&self) -> &SignalStore {
        &self.inner.store
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Periodically expires peers that stopped heartbeating.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            let config = service.config().clone();
            let mut tick = tokio::time::interval(config.sweep_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Peer sweeper started (ttl {:?}, every {:?})",
                config.peer_ttl, config.sweep_interval
            );

            loop {
                tick.tick().await;
                let expired = service.store().sweep(config.peer_ttl);
                debug!("Sweep pass expired {} peer(s)", expired.len());
            }
        })
    }
}

impl Default for RelayService {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
