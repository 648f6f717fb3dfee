//! Client IP resolution for rate limiting
//!
//! Proxy headers are only honoured when the deployment says a trusted
//! proxy sits in front of the server; otherwise they are trivially spoofable.

use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use warp::http::HeaderMap;

const FALLBACK_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let raw = headers.get(name)?.to_str().ok()?;
    // X-Forwarded-For can contain multiple IPs: "client, proxy1, proxy2"
    let candidate = raw.split(',').next()?.trim();
    match candidate.parse::<IpAddr>() {
        Ok(ip) => Some(ip),
        Err(_) => {
            warn!("Invalid IP format in {} header: {}", name, candidate);
            None
        }
    }
}

/// Resolve the address a request should be accounted to
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = header_ip(headers, "x-forwarded-for") {
            debug!("Extracted IP from X-Forwarded-For: {}", ip);
            return ip;
        }
        if let Some(ip) = header_ip(headers, "x-real-ip") {
            debug!("Extracted IP from X-Real-IP: {}", ip);
            return ip;
        }
    }

    match remote {
        Some(addr) => addr.ip(),
        None => {
            debug!("No peer address available, falling back to localhost");
            FALLBACK_IP
        }
    }
}
