//! Per-client rate limiting with `governor` through `tower_governor`.
//!
//! - `auth_rate_limiter`: login, registration and the contact form (~10/min, burst 5)
//! - `api_rate_limiter`: everything else under `/api` (~60/min, burst 100)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{extract::ConnectInfo, http::Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Client address for rate limiting. Proxy headers are honoured only when
/// `trust_proxy` is set; otherwise the socket address is the key. Requests
/// with no usable address (in-process tests) share one bucket keyed by the
/// unspecified address.
#[derive(Clone, Copy, Debug)]
pub struct ClientIpKeyExtractor {
    pub trust_proxy: bool,
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        Ok(client_ip(req, self.trust_proxy))
    }
}

pub fn client_ip<T>(req: &Request<T>, trust_proxy: bool) -> IpAddr {
    if let Some(ip) = trust_proxy.then(|| forwarded_ip(req)).flatten() {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn forwarded_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
}

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn build(
    replenish_secs: u64,
    burst: u32,
    trust_proxy: bool,
) -> anyhow::Result<RateLimiterLayer> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor { trust_proxy })
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?;
    Ok(GovernorLayer::new(Arc::new(config)))
}

/// One token every 6 seconds, burst of 5.
pub fn auth_rate_limiter(trust_proxy: bool) -> anyhow::Result<RateLimiterLayer> {
    build(6, 5, trust_proxy)
}

/// One token per second, burst of 100.
pub fn api_rate_limiter(trust_proxy: bool) -> anyhow::Result<RateLimiterLayer> {
    build(1, 100, trust_proxy)
}
