use std::collections::HashMap;

use parking_lot::RwLock;

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Regions {
    servers: HashMap<String, String>,
    fallback: Option<String>,
}

/// Routes by client region, case-insensitively, falling back to a default
/// server for unknown or missing regions.
///
/// Through [`Balancer`], `add_server` sets the default server and
/// `remove_server` drops a server from the default and every region.
#[derive(Debug, Default)]
pub struct GeolocationBalancer {
    regions: RwLock<Regions>,
}

impl GeolocationBalancer {
    pub fn new() -> GeolocationBalancer {
        GeolocationBalancer::default()
    }

    /// Serve `region` from `server`, replacing any previous mapping.
    pub fn add_region(&self, region: &str, server: &str) {
        self.regions
            .write()
            .servers
            .insert(region.to_lowercase(), server.to_string());
    }

    pub fn remove_region(&self, region: &str) -> Result<()> {
        match self.regions.write().servers.remove(&region.to_lowercase()) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownNode(region.to_string())),
        }
    }
}

impl Balancer for GeolocationBalancer {
    fn add_server(&self, id: &str, _weight: Option<u32>) -> Result<()> {
        self.regions.write().fallback = Some(id.to_string());
        Ok(())
    }

    fn remove_server(&self, id: &str) -> Result<()> {
        let mut regions = self.regions.write();
        let before = regions.servers.len();
        regions.servers.retain(|_, server| server != id);

        let was_fallback = regions.fallback.as_deref() == Some(id);
        if was_fallback {
            regions.fallback = None;
        }

        if !was_fallback && regions.servers.len() == before {
            return Err(Error::UnknownNode(id.to_string()));
        }
        Ok(())
    }

    fn select_server(&self, request: &RequestContext) -> Result<String> {
        let regions = self.regions.read();
        request
            .region
            .as_ref()
            .and_then(|region| regions.servers.get(&region.to_lowercase()))
            .or(regions.fallback.as_ref())
            .cloned()
            .ok_or(Error::NoServersAvailable)
    }
}
