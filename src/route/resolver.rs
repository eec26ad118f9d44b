//! A-record lookups for route list domains
//!
//! Answers are returned as text, one per answer record, the way `dig +short`
//! prints them: addresses for A records and target names for the CNAME
//! records that led to them.

use crate::config::DnsConfig;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::Resolver;
use std::cell::OnceCell;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("Failed to set up DNS resolver: {0}")]
    Setup(String),
    #[error("DNS lookup failed for {domain}: {message}")]
    Lookup { domain: String, message: String },
}

/// Source of A-record answers for a domain
pub trait Resolve {
    /// Empty when the domain has no A records
    fn resolve(&self, domain: &str) -> Result<Vec<String>, DnsError>;
}

/// Blocking resolver backed by hickory
pub struct DnsResolver {
    resolver: Resolver,
}

impl DnsResolver {
    /// Use the configured name servers, or the system configuration if none
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let (resolver_config, opts) = if config.servers.is_empty() {
            debug!("Using system DNS configuration");
            hickory_resolver::system_conf::read_system_conf()
                .map_err(|e| DnsError::Setup(e.to_string()))?
        } else {
            debug!("Using DNS servers: {:?}", config.servers);
            (name_server_config(config), ResolverOpts::default())
        };

        let resolver = Resolver::new(resolver_config, apply_opts(opts, config))
            .map_err(|e| DnsError::Setup(e.to_string()))?;

        Ok(Self { resolver })
    }
}

impl Resolve for DnsResolver {
    fn resolve(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.lookup(domain, RecordType::A) {
            Ok(lookup) => Ok(lookup.iter().map(|rdata| rdata.to_string()).collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                debug!("No A records for {}", domain);
                Ok(Vec::new())
            }
            Err(e) => Err(DnsError::Lookup {
                domain: domain.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Defers resolver setup until the first domain is looked up
///
/// Route lists with only literal networks never read the system DNS
/// configuration. A setup failure is returned from every lookup until one
/// succeeds.
pub struct LazyResolver {
    config: DnsConfig,
    resolver: OnceCell<DnsResolver>,
}

impl LazyResolver {
    pub fn new(config: DnsConfig) -> Self {
        Self {
            config,
            resolver: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.resolver.get().is_some()
    }

    fn get(&self) -> Result<&DnsResolver, DnsError> {
        if let Some(resolver) = self.resolver.get() {
            return Ok(resolver);
        }
        let resolver = DnsResolver::new(&self.config)?;
        Ok(self.resolver.get_or_init(|| resolver))
    }
}

impl Resolve for LazyResolver {
    fn resolve(&self, domain: &str) -> Result<Vec<String>, DnsError> {
        self.get()?.resolve(domain)
    }
}

fn apply_opts(mut opts: ResolverOpts, config: &DnsConfig) -> ResolverOpts {
    opts.timeout = Duration::from_secs(config.timeout_secs);
    // Keep CNAME records in the answer alongside the addresses
    opts.preserve_intermediates = true;
    opts
}

fn name_server_config(config: &DnsConfig) -> ResolverConfig {
    let mut resolver_config = ResolverConfig::new();
    for &ip in &config.servers {
        let socket_addr = SocketAddr::new(ip, 53);
        resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
    }
    resolver_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_error_display() {
        let err = DnsError::Lookup {
            domain: "test.example.com".to_string(),
            message: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DNS lookup failed for test.example.com: timeout"
        );

        let err = DnsError::Setup("no resolv.conf".to_string());
        assert!(err.to_string().contains("no resolv.conf"));
    }

    #[test]
    fn test_name_server_config_uses_port_53() {
        let config = DnsConfig {
            servers: vec!["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()],
            timeout_secs: 5,
        };

        let resolver_config = name_server_config(&config);
        let addrs: Vec<SocketAddr> = resolver_config
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr)
            .collect();

        assert_eq!(
            addrs,
            vec![
                "10.0.0.2:53".parse::<SocketAddr>().unwrap(),
                "10.0.0.3:53".parse::<SocketAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn test_apply_opts() {
        let config = DnsConfig {
            servers: vec![],
            timeout_secs: 2,
        };
        let opts = apply_opts(ResolverOpts::default(), &config);
        assert_eq!(opts.timeout, Duration::from_secs(2));
        assert!(opts.preserve_intermediates);
    }

    #[test]
    fn test_resolver_with_explicit_servers() {
        let config = DnsConfig {
            servers: vec!["127.0.0.1".parse().unwrap()],
            timeout_secs: 1,
        };
        assert!(DnsResolver::new(&config).is_ok());
    }

    #[test]
    fn test_lazy_resolver_defers_setup() {
        let config = DnsConfig {
            servers: vec!["127.0.0.1".parse().unwrap()],
            timeout_secs: 1,
        };
        let resolver = LazyResolver::new(config);
        assert!(!resolver.is_initialized());
        assert!(resolver.get().is_ok());
        assert!(resolver.is_initialized());
    }
}
