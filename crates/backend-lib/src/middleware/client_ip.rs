// crates/backend-lib/src/middleware/client_ip.rs

//! Client address resolution for rate limiting.
//!
//! Precedence: the first parseable entry of `X-Forwarded-For`, then
//! `X-Real-IP`, then the transport peer. Candidates may carry a port and
//! IPv6 brackets.
use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolve the client address, or `None` when nothing usable was presented
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_candidate);
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = headers
        .get(X_REAL_IP)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_candidate);
    if real_ip.is_some() {
        return real_ip;
    }

    peer.map(|addr| addr.ip())
}

/// Parse `ip`, `ip:port`, `[v6]` or `[v6]:port`
fn parse_candidate(raw: &str) -> Option<IpAddr> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return None;
    }
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = candidate.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    candidate
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse().ok())
}
