use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::balancer::{Balancer, RequestContext};
use crate::error::{Error, Result};

/// Completed requests of one server and their summed response time.
#[derive(Debug)]
pub struct ResponseStats {
    id: String,
    totals: Mutex<(Duration, u64)>,
}

impl ResponseStats {
    fn new(id: &str) -> ResponseStats {
        ResponseStats {
            id: id.to_string(),
            totals: Mutex::new((Duration::ZERO, 0)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn record(&self, elapsed: Duration) {
        let mut totals = self.totals.lock();
        totals.0 += elapsed;
        totals.1 += 1;
    }

    /// Mean response time, zero before the first sample.
    pub fn average(&self) -> Duration {
        let (total, count) = *self.totals.lock();
        if count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((total.as_nanos() / count as u128) as u64)
    }

    pub fn samples(&self) -> u64 {
        self.totals.lock().1
    }
}

/// Measures one request. Records the elapsed time when dropped, or when
/// [`ResponseTimer::observe`] is called.
#[derive(Debug)]
pub struct ResponseTimer {
    stats: Option<Arc<ResponseStats>>,
    start: Instant,
}

impl ResponseTimer {
    pub fn server(&self) -> &str {
        self.stats.as_ref().map_or("", |stats| stats.id())
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and record the duration.
    pub fn observe(mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if let Some(stats) = self.stats.take() {
            stats.record(elapsed);
        }
        elapsed
    }
}

impl Drop for ResponseTimer {
    fn drop(&mut self) {
        if let Some(stats) = self.stats.take() {
            stats.record(self.start.elapsed());
        }
    }
}

/// Picks the server with the lowest mean response time. Servers without
/// samples average zero, so new servers are tried first.
#[derive(Debug, Default)]
pub struct LeastResponseTimeBalancer {
    servers: RwLock<Vec<Arc<ResponseStats>>>,
}

impl LeastResponseTimeBalancer {
    pub fn new<'a, I>(servers: I) -> LeastResponseTimeBalancer
    where
        I: IntoIterator<Item = &'a str>,
    {
        LeastResponseTimeBalancer {
            servers: RwLock::new(
                servers
                    .into_iter()
                    .map(|id| Arc::new(ResponseStats::new(id)))
                    .collect(),
            ),
        }
    }

    /// Add a completed request's response time to `id`'s average.
    pub fn record_response_time(&self, id: &str, elapsed: Duration) -> Result<()> {
        self.stats(id)
            .ok_or_else(|| Error::UnknownNode(id.to_string()))?
            .record(elapsed);
        Ok(())
    }

    pub fn average_response_time(&self, id: &str) -> Option<Duration> {
        self.stats(id).map(|stats| stats.average())
    }

    /// Select a server and time the request sent to it.
    pub fn start(&self, request: &RequestContext) -> Result<ResponseTimer> {
        let id = self.select_server(request)?;
        let stats = self.stats(&id).ok_or(Error::NoServersAvailable)?;
        Ok(ResponseTimer {
            stats: Some(stats),
            start: Instant::now(),
        })
    }

    fn stats(&self, id: &str) -> Option<Arc<ResponseStats>> {
        self.servers.read().iter().find(|s| s.id == id).cloned()
    }
}

impl Balancer for LeastResponseTimeBalancer {
    fn add_server(&self, id: &str, _weight: Option<u32>) -> Result<()> {
        let mut servers = self.servers.write();
        if servers.iter().any(|s| s.id == id) {
            return Err(Error::DuplicateNode(id.to_string()));
        }
        servers.push(Arc::new(ResponseStats::new(id)));
        Ok(())
    }

    fn remove_server(&self, id: &str) -> Result<()> {
        let mut servers = self.servers.write();
        let before = servers.len();
        servers.retain(|s| s.id != id);
        if servers.len() == before {
            return Err(Error::UnknownNode(id.to_string()));
        }
        Ok(())
    }

    fn select_server(&self, _request: &RequestContext) -> Result<String> {
        self.servers
            .read()
            .iter()
            .min_by_key(|s| s.average())
            .map(|s| s.id.clone())
            .ok_or(Error::NoServersAvailable)
    }
}
