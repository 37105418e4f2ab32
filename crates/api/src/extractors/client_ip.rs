//! Best-effort client address for audit entries.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::convert::Infallible;
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// First `X-Forwarded-For` hop, else the peer address, else nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

impl ClientIp {
    pub fn from_parts(parts: &Parts) -> Self {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let peer = || {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        };

        Self(forwarded.or_else(peer))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let p = parts(Request::builder().header(FORWARDED_FOR, "10.0.0.7, 172.16.0.1"));
        assert_eq!(ClientIp::from_parts(&p), ClientIp(Some("10.0.0.7".into())));
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut p = parts(Request::builder());
        assert_eq!(ClientIp::from_parts(&p), ClientIp(None));

        let addr: SocketAddr = "192.168.1.20:5000".parse().unwrap();
        p.extensions.insert(ConnectInfo(addr));
        assert_eq!(ClientIp::from_parts(&p), ClientIp(Some("192.168.1.20".into())));
    }
}
