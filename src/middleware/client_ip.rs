//! Client address resolution for anonymous usage tracking.
//!
//! Forwarding headers are only believed when the direct peer is a configured
//! trusted proxy. Otherwise any caller could rotate `X-Forwarded-For` and get a
//! fresh anonymous allowance on every request.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use ipnet::IpNet;
use std::net::{IpAddr, SocketAddr};

use crate::handlers::AppState;

/// Best-effort client address, used to key anonymous usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

#[derive(Debug, Clone)]
pub enum TrustedEntry {
    Ip(IpAddr),
    Cidr(IpNet),
}

/// Which peers may set forwarding headers.
#[derive(Debug, Clone, Default)]
pub enum TrustedProxies {
    /// Never trust forwarded headers.
    #[default]
    None,
    /// Trust headers from every peer. Development only.
    All,
    List(Vec<TrustedEntry>),
}

impl TrustedProxies {
    pub fn from_config(proxies: &[String]) -> Self {
        if proxies.is_empty() {
            return Self::None;
        }
        if proxies.len() == 1 && proxies[0] == "*" {
            tracing::warn!("Trusting forwarding headers from every peer");
            return Self::All;
        }

        let entries: Vec<TrustedEntry> = proxies
            .iter()
            .filter_map(|p| {
                if p.contains('/') {
                    match p.parse::<IpNet>() {
                        Ok(net) => Some(TrustedEntry::Cidr(net)),
                        Err(e) => {
                            tracing::warn!("Invalid CIDR in TRUSTED_PROXIES: '{}': {}", p, e);
                            None
                        }
                    }
                } else {
                    match p.parse::<IpAddr>() {
                        Ok(ip) => Some(TrustedEntry::Ip(ip)),
                        Err(e) => {
                            tracing::warn!("Invalid IP in TRUSTED_PROXIES: '{}': {}", p, e);
                            None
                        }
                    }
                }
            })
            .collect();

        if entries.is_empty() {
            Self::None
        } else {
            Self::List(entries)
        }
    }

    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        match self {
            TrustedProxies::None => false,
            TrustedProxies::All => true,
            TrustedProxies::List(entries) => entries.iter().any(|entry| match entry {
                TrustedEntry::Ip(trusted) => *trusted == ip,
                TrustedEntry::Cidr(net) => net.contains(&ip),
            }),
        }
    }

    /// Resolves the client address from the peer and, when the peer is
    /// trusted, its forwarding headers.
    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> String {
        let trust_headers = match peer {
            Some(ip) => self.is_trusted(ip),
            // Without ConnectInfo a listed proxy cannot be verified.
            None => matches!(self, TrustedProxies::All),
        };

        if trust_headers {
            if let Some(forwarded) = forwarded_client_ip(headers) {
                return forwarded;
            }
        }

        match peer {
            Some(ip) => ip.to_string(),
            None => "unknown".to_string(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for ClientAddress {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientAddress(state.trusted_proxies.resolve(peer, &parts.headers)))
    }
}

/// First valid address from the forwarding headers, in precedence order.
pub fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    let ip_headers = ["X-Forwarded-For", "X-Real-IP", "CF-Connecting-IP"];

    for header_name in &ip_headers {
        if let Some(header_value) = headers.get(*header_name) {
            if let Ok(ip_str) = header_value.to_str() {
                // X-Forwarded-For can contain multiple IPs, take the first one
                let ip = ip_str.split(',').next().unwrap_or(ip_str).trim();
                if ip.parse::<IpAddr>().is_ok() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    None
}
