use std::collections::HashMap;
use std::hash::BuildHasher;

use parking_lot::{Mutex, RwLock};

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};
use crate::hashring::DefaultHashBuilder;

/// Assigns each client address to `hash(address) mod servers` on first sight
/// and keeps it there for as long as the server stays registered.
///
/// Unlike the ring, changing the server count reshuffles every client that is
/// not yet pinned.
#[derive(Debug)]
pub struct IpHashBalancer {
    servers: RwLock<Vec<String>>,
    sticky: Mutex<HashMap<String, String>>,
    hash_builder: DefaultHashBuilder,
}

impl IpHashBalancer {
    /// Fails with `InvalidConfig` for an empty server list.
    pub fn new<I, S>(servers: I) -> Result<IpHashBalancer>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let servers: Vec<String> = servers.into_iter().map(Into::into).collect();
        if servers.is_empty() {
            return Err(Error::InvalidConfig("server list is empty".into()));
        }
        Ok(IpHashBalancer {
            servers: RwLock::new(servers),
            sticky: Mutex::new(HashMap::new()),
            hash_builder: DefaultHashBuilder,
        })
    }

    /// Number of clients currently pinned to a server.
    pub fn pinned(&self) -> usize {
        self.sticky.lock().len()
    }
}

impl Balancer for IpHashBalancer {
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
        self.sticky.lock().retain(|_, server| server != id);
        Ok(())
    }

    fn select_server(&self, request: &RequestContext) -> Result<String> {
        if request.key.is_empty() {
            return Err(Error::InvalidRequest("client address is empty".into()));
        }

        let servers = self.servers.read();
        if servers.is_empty() {
            return Err(Error::NoServersAvailable);
        }

        let mut sticky = self.sticky.lock();
        if let Some(server) = sticky.get(&request.key) {
            return Ok(server.clone());
        }

        let index = (self.hash_builder.hash_one(&request.key) % servers.len() as u64) as usize;
        let server = servers[index].clone();
        sticky.insert(request.key.clone(), server.clone());
        Ok(server)
    }
}
