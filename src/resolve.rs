//! Lazy DNS resolution for the probe layer.
//!
//! The target resolver (`targets.rs`) deliberately leaves hostnames
//! unresolved; each probe resolves its own job's host right before
//! connecting. The system resolver is tried first, falling back to a
//! standalone `hickory-resolver` (optionally pointed at custom
//! nameservers) when the OS resolver fails or isn't configured.

use std::net::IpAddr;
use std::sync::OnceLock;

use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

static FALLBACK_RESOLVER: OnceLock<TokioAsyncResolver> = OnceLock::new();

/// Resolves `host` to its IP addresses.
///
/// If `host` already parses as an IP literal, it is returned unchanged
/// without touching the network. Otherwise the OS resolver
/// (`tokio::net::lookup_host`) is tried first; on failure, a fallback
/// `hickory-resolver` instance is used, pointed at `custom_nameservers` if
/// given or the system's `/etc/resolv.conf` (with Cloudflare DNS-over-TLS as
/// the last resort) otherwise.
pub async fn resolve_host(host: &str, custom_nameservers: &[IpAddr]) -> std::io::Result<Vec<IpAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
            if !ips.is_empty() {
                return Ok(ips);
            }
        }
        Err(err) => debug!(%host, error = %err, "OS resolver failed, falling back to hickory-resolver"),
    }

    let resolver = fallback_resolver(custom_nameservers);
    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|err| std::io::Error::other(format!("failed to resolve '{host}': {err}")))?;

    let ips: Vec<IpAddr> = response.iter().collect();
    if ips.is_empty() {
        return Err(std::io::Error::other(format!("'{host}' resolved to no addresses")));
    }
    Ok(ips)
}

fn fallback_resolver(custom_nameservers: &[IpAddr]) -> &'static TokioAsyncResolver {
    FALLBACK_RESOLVER.get_or_init(|| {
        let config = if custom_nameservers.is_empty() {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok((config, _)) => config,
                Err(err) => {
                    warn!(error = %err, "could not read system resolver config, defaulting to Cloudflare DNS-over-TLS");
                    ResolverConfig::cloudflare_tls()
                }
            }
        } else {
            ResolverConfig::from_parts(
                None,
                vec![],
                NameServerConfigGroup::from_ips_clear(custom_nameservers, 53, true),
            )
        };
        TokioAsyncResolver::tokio(config, ResolverOpts::default())
    })
}
