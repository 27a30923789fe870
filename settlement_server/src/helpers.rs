use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;

static FORWARDED_FOR: Lazy<Regex> = Lazy::new(|| Regex::new(r#"for="?\[?(?P<ip>[^;,"\]]+)"#).unwrap());

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| FORWARDED_FOR.captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str())
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr();
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr.map(|a| a.ip())
    })
}

/// `None` accepts everyone. An empty list accepts no-one.
pub fn is_whitelisted(ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => whitelist.contains(&ip),
        (None, Some(_)) => false,
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use actix_web::test::TestRequest;

    use super::*;

    fn peer() -> SocketAddr {
        "192.168.1.20:5555".parse().unwrap()
    }

    #[test]
    fn forwarded_headers_are_only_used_when_enabled() {
        let req = TestRequest::default()
            .peer_addr(peer())
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("Forwarded", "for=198.51.100.17;proto=https"))
            .to_http_request();
        let ip = |xff, fwd| get_remote_ip(&req, xff, fwd).map(|ip| ip.to_string());
        assert_eq!(ip(false, false).as_deref(), Some("192.168.1.20"));
        assert_eq!(ip(true, false).as_deref(), Some("203.0.113.7"));
        assert_eq!(ip(false, true).as_deref(), Some("198.51.100.17"));
        assert_eq!(ip(true, true).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn quoted_ipv6_forwarded_header() {
        let req = TestRequest::default().insert_header(("Forwarded", r#"for="[2001:db8::17]:4711""#)).to_http_request();
        assert_eq!(get_remote_ip(&req, false, true), Some("2001:db8::17".parse().unwrap()));
    }

    #[test]
    fn whitelist_rules() {
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(is_whitelisted(None, None));
        assert!(is_whitelisted(Some(ip), Some(&[ip])));
        assert!(!is_whitelisted(Some(ip), Some(&[])));
        assert!(!is_whitelisted(None, Some(&[ip])));
    }
}
