//! Admission policy for the HTTP API.
//!
//! The core performs no authorization itself; this layer decides whether an
//! inbound request may reach it at all. Local and private-network callers
//! (the backend lives next to the relay, usually in the same compose
//! network) are always admitted; anything else must present an `Origin`
//! from the configured allowlist.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::ORIGIN;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::relay_logic::state::AppState;

pub async fn require_authorized(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|value| value.to_str().ok());

    if is_permitted(addr.ip(), origin, &state.settings.allowed_origins) {
        next.run(request).await
    } else {
        log::warn!("Unauthorized access attempt from IP: {}", addr.ip());
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Unauthorized"})),
        )
            .into_response()
    }
}

fn is_permitted(ip: IpAddr, origin: Option<&str>, allowed_origins: &[String]) -> bool {
    // IPv6-mapped IPv4 addresses (::ffff:a.b.c.d) are compared as IPv4.
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    };

    if ip.is_loopback() {
        return true;
    }
    if let IpAddr::V4(v4) = ip {
        let octets = v4.octets();
        // Docker bridge and common private LAN ranges.
        if octets[0] == 172 || (octets[0] == 192 && octets[1] == 168) {
            return true;
        }
    }

    origin.is_some_and(|o| allowed_origins.iter().any(|allowed| allowed == o))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn loopback_always_admitted() {
        assert!(is_permitted(IpAddr::V4(Ipv4Addr::LOCALHOST), None, &[]));
        assert!(is_permitted(IpAddr::V6(Ipv6Addr::LOCALHOST), None, &[]));
    }

    #[test]
    fn mapped_ipv4_loopback_admitted() {
        let mapped: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(is_permitted(mapped, None, &[]));
    }

    #[test]
    fn private_ranges_admitted() {
        assert!(is_permitted("172.17.0.2".parse().unwrap(), None, &[]));
        assert!(is_permitted("192.168.1.50".parse().unwrap(), None, &[]));
    }

    #[test]
    fn public_ip_needs_allowed_origin() {
        let allowed = vec!["https://app.example.com".to_string()];
        let public: IpAddr = "203.0.113.9".parse().unwrap();

        assert!(!is_permitted(public, None, &allowed));
        assert!(!is_permitted(public, Some("https://evil.example"), &allowed));
        assert!(is_permitted(public, Some("https://app.example.com"), &allowed));
    }

    #[test]
    fn empty_allowlist_rejects_public() {
        let public: IpAddr = "203.0.113.9".parse().unwrap();
        assert!(!is_permitted(public, Some("https://app.example.com"), &[]));
    }
}
