//! Hostname validation.
//!
//! A rendered hostname only becomes a managed instance if it resolves.
//! The check is injected as a [`HostnameResolver`] so tests (and dry
//! planning against a known inventory) can replace system DNS with a
//! fixed table.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`HostnameResolver::resolves`].
pub type ResolveFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Decides whether a candidate hostname is resolvable.
pub trait HostnameResolver: Send + Sync {
    /// `true` if `hostname` resolves to at least one address.
    fn resolves<'a>(&'a self, hostname: &'a str) -> ResolveFuture<'a>;
}

/// Resolver backed by the host system's DNS (`tokio::net::lookup_host`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl HostnameResolver for SystemResolver {
    fn resolves<'a>(&'a self, hostname: &'a str) -> ResolveFuture<'a> {
        Box::pin(async move {
            // lookup_host needs a port; it is not used for resolution.
            match tokio::net::lookup_host((hostname, 0)).await {
                Ok(mut addrs) => {
                    let found = addrs.next().is_some();
                    if !found {
                        tracing::debug!(%hostname, "system DNS returned no addresses");
                    }
                    found
                }
                Err(e) => {
                    tracing::debug!(%hostname, error = %e, "system DNS lookup failed");
                    false
                }
            }
        })
    }
}

/// Resolver backed by a fixed set of hostnames.
///
/// Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashSet<String>,
}

impl StaticResolver {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Build from `/etc/hosts`-format content.
    ///
    /// Each non-comment line is `<IP> <hostname> [hostname ...]`; every
    /// hostname on a line with a parseable IP is accepted.
    pub fn from_hosts_file(content: &str) -> Self {
        let mut hosts = HashSet::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(ip) = parts.next() else {
                continue;
            };
            if ip.parse::<std::net::IpAddr>().is_err() {
                tracing::debug!(%line, "skipping hosts line with invalid IP");
                continue;
            }

            for hostname in parts {
                if hostname.starts_with('#') {
                    break;
                }
                hosts.insert(hostname.to_lowercase());
            }
        }

        Self { hosts }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl HostnameResolver for StaticResolver {
    fn resolves<'a>(&'a self, hostname: &'a str) -> ResolveFuture<'a> {
        let found = self.hosts.contains(&hostname.to_lowercase());
        Box::pin(async move { found })
    }
}
