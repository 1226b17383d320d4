//! Peripheral selection strategies. None of them rebalances or orders
//! anything; they plug into [`Balancer`](crate::balancer::Balancer) next to
//! the consistent-hash ring.

mod geolocation;
mod ip_hash;
mod least_connections;
mod least_response_time;
mod round_robin;
mod weighted;

pub use geolocation::GeolocationBalancer;
pub use ip_hash::IpHashBalancer;
pub use least_connections::{ConnectionGuard, LeastConnectionsBalancer, ServerLoad};
pub use least_response_time::{LeastResponseTimeBalancer, ResponseStats, ResponseTimer};
pub use round_robin::RoundRobinBalancer;
pub use weighted::WeightedBalancer;
