//! Client address extraction.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use std::net::{IpAddr, SocketAddr};

/// Returns the address the request came from.
///
/// With `behind_proxy` set, the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise (or when neither header parses) the peer socket
/// address from [`ConnectInfo`] is used. Proxy headers are client-controlled
/// and must only be trusted behind a proxy that overwrites them.
pub fn client_ip<B>(req: &Request<B>, behind_proxy: bool) -> Option<IpAddr> {
    if behind_proxy && let Some(ip) = forwarded_ip(req.headers()) {
        return Some(ip);
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Rate-limit identity of an anonymous caller: `ip:<addr>`, or `ip:unknown`.
pub fn ip_identity<B>(req: &Request<B>, behind_proxy: bool) -> String {
    match client_ip(req, behind_proxy) {
        Some(ip) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}
