use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};

/// Live connection count of one server.
#[derive(Debug)]
pub struct ServerLoad {
    id: String,
    active: AtomicUsize,
}

impl ServerLoad {
    fn new(id: &str) -> ServerLoad {
        ServerLoad {
            id: id.to_string(),
            active: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// An open connection to a server. Dropping it closes the connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    load: Arc<ServerLoad>,
}

impl ConnectionGuard {
    pub fn server(&self) -> &str {
        self.load.id()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.load.active.fetch_sub(1, Ordering::AcqRel);
        trace!(server = %self.load.id, "connection closed");
    }
}

/// Picks the server with the fewest open connections, earliest registered
/// first on ties.
///
/// [`Balancer::select_server`] only reports the choice. Use
/// [`LeastConnectionsBalancer::acquire`] to count the connection for as long
/// as it stays open.
#[derive(Debug, Default)]
pub struct LeastConnectionsBalancer {
    servers: RwLock<Vec<Arc<ServerLoad>>>,
}

impl LeastConnectionsBalancer {
    pub fn new<'a, I>(servers: I) -> LeastConnectionsBalancer
    where
        I: IntoIterator<Item = &'a str>,
    {
        LeastConnectionsBalancer {
            servers: RwLock::new(
                servers
                    .into_iter()
                    .map(|id| Arc::new(ServerLoad::new(id)))
                    .collect(),
            ),
        }
    }

    /// Select a server and open a connection to it.
    pub fn acquire(&self, _request: &RequestContext) -> Result<ConnectionGuard> {
        let servers = self.servers.read();
        let load = least_loaded(&servers)?;
        load.active.fetch_add(1, Ordering::AcqRel);
        trace!(server = %load.id, "connection opened");
        Ok(ConnectionGuard {
            load: Arc::clone(load),
        })
    }

    /// Open connections of `id`, or `None` when it is not registered.
    pub fn active_connections(&self, id: &str) -> Option<usize> {
        self.servers
            .read()
            .iter()
            .find(|load| load.id == id)
            .map(|load| load.active())
    }
}

fn least_loaded(servers: &[Arc<ServerLoad>]) -> Result<&Arc<ServerLoad>> {
    servers
        .iter()
        .min_by_key(|load| load.active())
        .ok_or(Error::NoServersAvailable)
}

impl Balancer for LeastConnectionsBalancer {
    fn add_server(&self, id: &str, _weight: Option<u32>) -> Result<()> {
        let mut servers = self.servers.write();
        if servers.iter().any(|load| load.id == id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        servers.push(Arc::new(ServerLoad::new(id)));
        Ok(())
    }

    /// Connections still open to a removed server keep working; their guards
    /// hold the counter alive.
    fn remove_server(&self, id: &str) -> Result<()> {
        let mut servers = self.servers.write();
        let before = servers.len();
        servers.retain(|load| load.id != id);
        if servers.len() == before {
            return Err(Error::UnknownNode(id.to_string()));
        }
        Ok(())
    }

    fn select_server(&self, _request: &RequestContext) -> Result<String> {
        let servers = self.servers.read();
        least_loaded(&servers).map(|load| load.id.clone())
    }
}
