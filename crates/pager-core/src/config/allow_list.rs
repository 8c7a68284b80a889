//! The master allow-list.
//!
//! An [`AllowList`] is either *unset* (no `master=` line was ever applied) or
//! an ordered list of resolved master addresses.  Only the unset list is
//! permissive.  A list that was set but ended up empty, for example because
//! none of its host names resolved, authorises nobody.
//!
//! # Deduplication
//!
//! [`AllowList::resolve`] makes a single pass over the input tokens and keys
//! duplicates on the *resolved* address: the first token that resolves to a
//! given IP wins and later tokens resolving to the same IP are dropped.  A
//! token repeated verbatim is recognised before it is resolved a second time.
//! The outcome therefore never depends on whether a host name appears before
//! or after its own address literal.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use tracing::{error, info};

use super::resolver::{canonical_ip, HostResolver};

/// Ordered, duplicate-free set of authorised master addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Option<Vec<IpAddr>>,
}

impl AllowList {
    /// The permissive, never-configured list.
    pub fn unset() -> Self {
        Self { entries: None }
    }

    /// Builds a list from already-resolved addresses, dropping duplicates.
    pub fn from_addrs(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut entries: Vec<IpAddr> = Vec::new();
        for ip in addrs.into_iter().map(canonical_ip) {
            if !entries.contains(&ip) {
                entries.push(ip);
            }
        }
        Self {
            entries: Some(entries),
        }
    }

    /// Resolves a whitespace-separated list of host names and addresses.
    ///
    /// Tokens that fail to resolve are logged and dropped.  Duplicates are
    /// removed as described in the module docs.  Every accepted entry is
    /// logged.
    pub fn resolve(raw: &str, resolver: &dyn HostResolver) -> Self {
        let mut seen_tokens: HashSet<&str> = HashSet::new();
        let mut entries: Vec<IpAddr> = Vec::new();

        for token in raw.split_whitespace() {
            if !seen_tokens.insert(token) {
                info!("duplicate master: {token}");
                continue;
            }

            let ip = match resolver.resolve(token) {
                Ok(ip) => canonical_ip(ip),
                Err(e) => {
                    error!("{e}");
                    continue;
                }
            };

            if entries.contains(&ip) {
                info!("duplicate master: {token} ({ip})");
                continue;
            }

            info!("master registered: {ip}");
            entries.push(ip);
        }

        Self {
            entries: Some(entries),
        }
    }

    /// Returns `true` if no `master=` list was ever applied.  Only then is
    /// every address authorised.
    pub fn is_unset(&self) -> bool {
        self.entries.is_none()
    }

    /// Returns `true` if the list was set but holds no address.
    pub fn denies_all(&self) -> bool {
        self.entries.as_ref().is_some_and(Vec::is_empty)
    }

    /// Returns `true` if `ip` may submit paging traffic.
    pub fn is_authorized(&self, ip: IpAddr) -> bool {
        match &self.entries {
            None => true,
            Some(entries) => entries.contains(&canonical_ip(ip)),
        }
    }

    /// The configured addresses in insertion order; empty when unset.
    pub fn entries(&self) -> &[IpAddr] {
        self.entries.as_deref().unwrap_or(&[])
    }

    /// Number of configured addresses.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` if no address is configured.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Space-joined addresses; the empty string when unset or empty.
impl fmt::Display for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ip) in self.entries().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{ip}")?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
