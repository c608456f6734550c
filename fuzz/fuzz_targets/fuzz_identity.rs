//! Fuzz testing for client identity resolution.
//!
//! Feeds arbitrary CIDR strings, peer addresses and forwarding headers through
//! the trusted-proxy parser and the identity resolver. Both must never panic
//! and resolution must always yield a non-empty identity.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the identity fuzz target
//! cargo +nightly fuzz run fuzz_identity
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_identity -- -max_total_time=60
//! ```

#![no_main]

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use arbitrary::Arbitrary;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use libfuzzer_sys::fuzz_target;
use request_guard::middleware::{CidrRange, TrustedProxies, resolve_client_identity};

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    trusted: Vec<&'a str>,
    peer_v4: Option<[u8; 4]>,
    peer_v6: Option<[u8; 16]>,
    forwarded_for: Option<&'a [u8]>,
    real_ip: Option<&'a [u8]>,
}

fuzz_target!(|input: Input<'_>| {
    // CIDR parsing and matching (shouldn't panic)
    for cidr in &input.trusted {
        if let Some(range) = CidrRange::parse(cidr) {
            let _ = range.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST));
            let _ = range.contains(&IpAddr::V6(Ipv6Addr::LOCALHOST));
        }
    }

    let cidrs: Vec<String> = input.trusted.iter().map(|s| s.to_string()).collect();
    let trusted = TrustedProxies::new(&cidrs);

    let mut req = Request::new(Body::empty());
    let peer = input
        .peer_v4
        .map(IpAddr::from)
        .or_else(|| input.peer_v6.map(IpAddr::from));
    if let Some(ip) = peer {
        req.extensions_mut().insert(ConnectInfo(SocketAddr::new(ip, 443)));
    }
    if let Some(value) = input.forwarded_for.and_then(|v| HeaderValue::from_bytes(v).ok()) {
        req.headers_mut().insert("x-forwarded-for", value);
    }
    if let Some(value) = input.real_ip.and_then(|v| HeaderValue::from_bytes(v).ok()) {
        req.headers_mut().insert("x-real-ip", value);
    }

    // Identity resolution (shouldn't panic, never empty)
    let identity = resolve_client_identity(&req, &trusted);
    assert!(!identity.is_empty());
});
