use parking_lot::Mutex;

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};

#[derive(Debug)]
struct WeightedServer {
    id: String,
    weight: u64,
    current: u64,
}

#[derive(Debug, Default)]
struct State {
    servers: Vec<WeightedServer>,
    total_weight: u64,
    last: Option<usize>,
}

/// Weighted round robin: each visit adds a server's weight to its credit; a
/// server is picked once its credit reaches the total weight, which is then
/// subtracted. Over `total_weight` requests every server is picked `weight`
/// times.
#[derive(Debug, Default)]
pub struct WeightedBalancer {
    state: Mutex<State>,
}

impl WeightedBalancer {
    /// Fails with `InvalidConfig` for a zero weight.
    pub fn new<'a, I>(servers: I) -> Result<WeightedBalancer>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let balancer = WeightedBalancer::default();
        for (id, weight) in servers {
            balancer.add_server(id, Some(weight))?;
        }
        Ok(balancer)
    }
}

impl Balancer for WeightedBalancer {
    fn add_server(&self, id: &str, weight: Option<u32>) -> Result<()> {
        let weight = weight.unwrap_or(1);
        if weight == 0 {
            return Err(Error::InvalidConfig(format!("weight of {id} must be positive")));
        }

        let mut state = self.state.lock();
        if state.servers.iter().any(|s| s.id == id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        state.servers.push(WeightedServer {
            id: id.to_string(),
            weight: weight as u64,
            current: 0,
        });
        state.total_weight += weight as u64;
        Ok(())
    }

    fn remove_server(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock();
        let index = match state.servers.iter().position(|s| s.id == id) {
            Some(index) => index,
            None => return Err(Error::UnknownNode(id.to_string())),
        };
        let removed = state.servers.remove(index);
        state.total_weight -= removed.weight;
        state.last = None;
        Ok(())
    }

    fn select_server(&self, _request: &RequestContext) -> Result<String> {
        let mut state = self.state.lock();
        if state.servers.is_empty() {
            return Err(Error::NoServersAvailable);
        }

        let total = state.total_weight;
        let len = state.servers.len();
        // terminates: every full pass adds total_weight credit in aggregate
        loop {
            let index = state.last.map_or(0, |last| (last + 1) % len);
            state.last = Some(index);

            let server = &mut state.servers[index];
            server.current += server.weight;
            if server.current >= total {
                server.current -= total;
                return Ok(server.id.clone());
            }
        }
    }
}
