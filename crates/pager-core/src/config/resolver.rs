//! Host name resolution for master entries.

use std::net::{IpAddr, ToSocketAddrs};

use thiserror::Error;

/// Error returned when a master token cannot be turned into an address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The name lookup failed or returned nothing.
    #[error("unknown host: {0}")]
    UnknownHost(String),
}

/// Resolves a master host name or address literal to a canonical IP.
///
/// Injected into [`super::ConfigStore`] so tests can run without DNS.
#[cfg_attr(test, mockall::automock)]
pub trait HostResolver: Send + Sync {
    /// Resolves `host` to one address.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownHost`] if `host` does not resolve.
    fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError>;
}

/// Resolver backed by the operating system (`getaddrinfo`).
///
/// Address literals are parsed directly without a lookup.  When a name has
/// both IPv4 and IPv6 addresses the first IPv4 address wins, because masters
/// connect to the IPv4 listener.
///
/// Name lookups block the calling thread.  Callers in async contexts should
/// load the store through `tokio::task::spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Result<IpAddr, ResolveError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(canonical_ip(ip));
        }

        let addrs: Vec<IpAddr> = (host, 0)
            .to_socket_addrs()
            .map_err(|_| ResolveError::UnknownHost(host.to_string()))?
            .map(|sa| canonical_ip(sa.ip()))
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ResolveError::UnknownHost(host.to_string()))
    }
}

/// Folds IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) into plain IPv4.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_resolver_parses_ipv4_literal_without_lookup() {
        let ip = SystemResolver.resolve("10.0.0.1").unwrap();
        assert_eq!(ip, "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_system_resolver_canonicalises_mapped_ipv6_literal() {
        let ip = SystemResolver.resolve("::ffff:192.168.1.7").unwrap();
        assert_eq!(ip.to_string(), "192.168.1.7");
    }

    #[test]
    fn test_system_resolver_keeps_plain_ipv6_literal() {
        let ip = SystemResolver.resolve("fe80::1").unwrap();
        assert_eq!(ip.to_string(), "fe80::1");
    }

    #[test]
    fn test_system_resolver_rejects_reserved_invalid_tld() {
        // `.invalid` is reserved by RFC 2606 and never resolves.
        let result = SystemResolver.resolve("bogus.invalid");
        assert_eq!(result, Err(ResolveError::UnknownHost("bogus.invalid".into())));
    }

    #[test]
    fn test_canonical_ip_leaves_ipv4_untouched() {
        let ip: IpAddr = "172.16.0.1".parse().unwrap();
        assert_eq!(canonical_ip(ip), ip);
    }
}
