//! Server selection behind one interface: the consistent-hash ring and the
//! stateless or lightly stateful strategies in [`crate::strategies`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::RingConfig;
use crate::error::{Error, Result};
use crate::hashring::HashRing;
use crate::hashring::placement::HashedPlacement;
use crate::router::KeyRouter;

/// What a strategy may look at when picking a server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Routing key: client address, session or request id.
    pub key: String,
    /// Client region, used by region based selection.
    pub region: Option<String>,
}

impl RequestContext {
    pub fn new(key: impl Into<String>) -> RequestContext {
        RequestContext {
            key: key.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> RequestContext {
        self.region = Some(region.into());
        self
    }
}

/// Selection interface shared by every balancing strategy.
///
/// Implementations use interior mutability so one balancer can be shared
/// between request handlers.
pub trait Balancer: Send + Sync {
    /// Register `id`. `weight` defaults to 1 where a strategy uses weights.
    fn add_server(&self, id: &str, weight: Option<u32>) -> Result<()>;

    fn remove_server(&self, id: &str) -> Result<()>;

    /// Pick a server for the request. Fails with `NoServersAvailable` when
    /// no server is registered.
    fn select_server(&self, request: &RequestContext) -> Result<String>;
}

/// Balancer routing request keys over a hashed ring.
///
/// Lookups clone an `Arc` to the current ring snapshot and never hold a lock
/// while walking it. Mutations copy the ring, change the copy and swap the
/// reference, so readers see either the old or the new topology in full.
#[derive(Debug)]
pub struct ConsistentHashBalancer {
    ring: RwLock<Arc<HashRing<String, HashedPlacement>>>,
    router: KeyRouter,
}

impl ConsistentHashBalancer {
    /// Empty balancer. Fails with `InvalidConfig` for a config no ring accepts.
    pub fn new(config: RingConfig) -> Result<ConsistentHashBalancer> {
        Ok(ConsistentHashBalancer {
            ring: RwLock::new(Arc::new(HashRing::new(config)?)),
            router: KeyRouter::hashed(),
        })
    }

    /// Balancer over `servers`. An empty list, or fewer servers than the
    /// `R + 1` owners each key needs, is a configuration error.
    pub fn with_servers<I, S>(config: RingConfig, servers: I) -> Result<ConsistentHashBalancer>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let balancer = ConsistentHashBalancer::new(config)?;
        for server in servers {
            balancer.add_server(server.as_ref(), None)?;
        }
        let ring = balancer.snapshot();
        if ring.is_empty() {
            return Err(Error::InvalidConfig("server list is empty".into()));
        }
        if ring.node_count() < ring.config().owner_count() {
            return Err(Error::InvalidConfig(format!(
                "replication factor {} needs at least {} servers, got {}",
                ring.replication_factor(),
                ring.config().owner_count(),
                ring.node_count()
            )));
        }
        Ok(balancer)
    }

    /// The current ring. Later mutations do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<HashRing<String, HashedPlacement>> {
        self.ring.read().clone()
    }

    /// Primary and replica servers for `key`, using the configured replication factor.
    pub fn owners(&self, key: &str) -> Result<Vec<String>> {
        let ring = self.snapshot();
        let owners = self.router.owners(&*ring, key);
        if owners.is_empty() {
            return Err(Error::NoServersAvailable);
        }
        Ok(owners)
    }

    fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashRing<String, HashedPlacement>) -> Result<()>,
    {
        let mut current = self.ring.write();
        let mut next = HashRing::clone(&current);
        change(&mut next)?;
        *current = Arc::new(next);
        Ok(())
    }
}

impl Balancer for ConsistentHashBalancer {
    fn add_server(&self, id: &str, weight: Option<u32>) -> Result<()> {
        let weight = weight.unwrap_or(1);
        self.mutate(|ring| {
            let count = ring.positions_for_weight(weight);
            ring.add_node_with_count(id.to_string(), count)?;
            Ok(())
        })?;
        info!(server = id, weight, "server added to ring");
        Ok(())
    }

    fn remove_server(&self, id: &str) -> Result<()> {
        self.mutate(|ring| {
            ring.remove_node(&id.to_string())?;
            Ok(())
        })?;
        info!(server = id, "server removed from ring");
        Ok(())
    }

    fn select_server(&self, request: &RequestContext) -> Result<String> {
        let ring = self.snapshot();
        let server = self
            .router
            .primary_owner(&*ring, request.key.as_str())
            .map_err(|_| Error::NoServersAvailable)?;
        debug!(key = %request.key, %server, "selected server");
        Ok(server.clone())
    }
}
