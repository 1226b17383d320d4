use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};

/// Hands out servers in registration order, one request each.
#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    servers: RwLock<Vec<String>>,
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new<I, S>(servers: I) -> RoundRobinBalancer
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RoundRobinBalancer {
            servers: RwLock::new(servers.into_iter().map(Into::into).collect()),
            counter: AtomicUsize::new(0),
        }
    }
}

impl Balancer for RoundRobinBalancer {
    fn add_server(&self, id: &str, _weight: Option<u32>) -> Result<()> {
        let mut servers = self.servers.write();
        if servers.iter().any(|s| s == id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        servers.push(id.to_string());
        Ok(())
    }

    fn remove_server(&self, id: &str) -> Result<()> {
        let mut servers = self.servers.write();
        let before = servers.len();
        servers.retain(|s| s != id);
        if servers.len() == before {
            return Err(Error::UnknownNode(id.to_string()));
        }
        Ok(())
    }

    fn select_server(&self, _request: &RequestContext) -> Result<String> {
        let servers = self.servers.read();
        if servers.is_empty() {
            return Err(Error::NoServersAvailable);
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % servers.len();
        Ok(servers[index].clone())
    }
}
