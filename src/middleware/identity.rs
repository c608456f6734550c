//! Client identity resolution for admission control and diagnostics.
//!
//! The identity is the caller's network address: the peer address of the
//! TCP connection as recorded by axum's [`ConnectInfo`] extension. The server
//! must be started with `into_make_service_with_connect_info::<SocketAddr>()`
//! for that extension to exist.
//!
//! # Forwarding Headers
//!
//! Behind a reverse proxy every connection comes from the proxy, so the
//! proxy's `X-Forwarded-For` / `X-Real-IP` headers carry the real client.
//! Those headers are client-controlled, so they are honored **only** when the
//! connection peer lies inside one of the configured trusted proxy ranges
//! (`TRUSTED_PROXIES`). With no ranges configured they are always ignored.
//!
//! ```text
//!  peer trusted? ──no──▶ peer address
//!       │
//!      yes
//!       ▼
//!  X-Forwarded-For (first hop) ──▶ X-Real-IP ──▶ peer address
//! ```
//!
//! # The "unknown" Fallback
//!
//! When no origin is observable (no `ConnectInfo`, e.g. in-process tests or a
//! custom transport), the identity is [`UNKNOWN_IDENTITY`]. All such requests
//! share one rate-limit partition; resolution itself never fails.

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::{debug, warn};

/// Identity used when the request's origin cannot be observed.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Parsed CIDR network range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Parse CIDR notation (`"10.0.0.0/8"`, `"::1/128"`) or a bare address.
    ///
    /// Returns `None` if the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();
        let (addr, prefix) = match cidr.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (cidr, None),
        };

        let network: IpAddr = addr.parse().ok()?;
        let max_prefix = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        let prefix_len = match prefix {
            Some(p) => p.parse::<u8>().ok().filter(|len| *len <= max_prefix)?,
            None => max_prefix,
        };

        Some(Self {
            network,
            prefix_len,
        })
    }

    /// Check whether `ip` falls inside this range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix_len))
                    .unwrap_or(0);
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            _ => false,
        }
    }
}

/// Set of proxy networks whose forwarding headers are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    ranges: Vec<CidrRange>,
}

impl TrustedProxies {
    /// Build from CIDR strings. Invalid entries are logged and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        if !ranges.is_empty() {
            debug!(count = ranges.len(), "Trusted proxy ranges configured");
        }

        Self { ranges }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Check whether a connection peer is a trusted proxy.
    ///
    /// With no ranges configured nothing is trusted.
    pub fn is_trusted(&self, peer: &IpAddr) -> bool {
        self.ranges.iter().any(|range| range.contains(peer))
    }
}

/// Peer address recorded by the server for this connection, if any.
#[inline]
pub fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Client address announced by a forwarding header.
///
/// The first `X-Forwarded-For` hop wins, then `X-Real-IP`. Values that do not
/// parse as an IP address are skipped.
fn forwarded_client<B>(req: &Request<B>) -> Option<IpAddr> {
    let headers = req.headers();

    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
    })
}

/// Resolve the rate-limit partition key for a request.
///
/// Never fails: an unobservable origin yields [`UNKNOWN_IDENTITY`] as a
/// borrowed `Cow` so the fallback costs no allocation.
pub fn resolve_client_identity<B>(
    req: &Request<B>,
    trusted_proxies: &TrustedProxies,
) -> Cow<'static, str> {
    let Some(peer) = peer_addr(req).map(|addr| addr.ip()) else {
        return Cow::Borrowed(UNKNOWN_IDENTITY);
    };

    if trusted_proxies.is_trusted(&peer)
        && let Some(client) = forwarded_client(req)
    {
        debug!(peer = %peer, client_ip = %client, "Using forwarded client address from trusted proxy");
        return Cow::Owned(client.to_string());
    }

    Cow::Owned(peer.to_string())
}
