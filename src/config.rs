//! Command-line arguments and the TOML configuration file they merge with
//! (§6's settings table).
//!
//! A `clap::Parser` struct carries CLI arguments; a parallel `Deserialize`
//! struct of all-`Option` fields is read from TOML, and a field-by-field
//! `merge` step applies it on top.

use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;

use crate::engine::ScanProtocol;

/// Which protocol(s) to scan, as accepted on the command line or in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolArg {
    Tcp,
    Udp,
    Both,
}

impl From<ProtocolArg> for ScanProtocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Tcp => Self::Tcp,
            ProtocolArg::Udp => Self::Udp,
            ProtocolArg::Both => Self::Both,
        }
    }
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "portsweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Concurrent TCP/UDP port scanning engine.
pub struct Opts {
    /// A comma-delimited list of IP addresses, CIDR blocks, or hostnames to scan.
    #[arg(short, long, value_delimiter = ',')]
    pub addresses: Vec<String>,

    /// A comma-delimited port specification. Examples: `80,443,8080` or
    /// `1-1000` or `1-1000,8080`.
    #[arg(short, long, default_value = "1-1000")]
    pub ports: String,

    /// Whether to ignore the configuration file.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to the configuration file.
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode: suppress decorated output, emit ndjson only.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode: turns off ANSI color for screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Which protocol(s) to scan.
    #[arg(long, value_enum, ignore_case = true, default_value = "tcp")]
    pub protocol: ProtocolArg,

    /// Permits per second across the whole scan; 0 disables rate limiting.
    #[arg(long, default_value = "0")]
    pub rate: i64,

    /// Worker pool size; 0 auto-detects from CPU count.
    #[arg(short, long, default_value = "0")]
    pub workers: usize,

    /// The timeout in milliseconds before a port is assumed filtered.
    #[arg(short, long, default_value = "1500")]
    pub timeout_ms: u64,

    /// The number of retries after an initial timeout before giving up.
    #[arg(long, default_value = "1")]
    pub retries: u32,

    /// Attempt to read a banner from ports found open.
    #[arg(long)]
    pub banner_grab: bool,

    /// Fraction (0.0-1.0) of the worker pool dedicated to the UDP phase
    /// when `--protocol both` is used.
    #[arg(long, default_value = "0.5")]
    pub udp_worker_ratio: f64,

    /// Maximum pre-send jitter for UDP probes, in milliseconds.
    #[arg(long, default_value = "0")]
    pub udp_jitter_max_ms: u64,

    /// Maximum number of hosts a single CIDR block may expand to.
    #[arg(long, default_value = "65536")]
    pub cidr_host_limit: u64,

    /// A comma-delimited list of custom DNS nameservers.
    #[arg(long, value_delimiter = ',')]
    pub resolver: Option<Vec<IpAddr>>,

    /// Automatically raises the open-file-descriptor limit to this value.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

impl Opts {
    /// Parses `std::env::args`.
    pub fn read() -> Self {
        Opts::parse()
    }

    /// Merges values from `config` into `self`, unless `--no-config` was
    /// passed. A config field present in the file always overwrites the
    /// corresponding CLI field, so a config file is a stronger source of
    /// truth than CLI defaults, not a fallback for fields left unset.
    pub fn merge(&mut self, config: &Config) {
        if self.no_config {
            return;
        }

        if let Some(addresses) = &config.addresses {
            self.addresses.clone_from(addresses);
        }
        if let Some(ports) = &config.ports {
            self.ports.clone_from(ports);
        }
        macro_rules! merge_optional {
            ($($field:ident),+) => {
                $(
                    if let Some(value) = config.$field.clone() {
                        self.$field = value;
                    }
                )+
            };
        }
        merge_optional!(greppable, accessible, protocol, rate, workers, timeout_ms, retries, banner_grab, udp_worker_ratio, udp_jitter_max_ms, cidr_host_limit, resolver, ulimit);
    }
}

/// All-`Option` mirror of [`Opts`], deserialized from the TOML config file.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    addresses: Option<Vec<String>>,
    ports: Option<String>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    protocol: Option<ProtocolArg>,
    rate: Option<i64>,
    workers: Option<usize>,
    timeout_ms: Option<u64>,
    retries: Option<u32>,
    banner_grab: Option<bool>,
    udp_worker_ratio: Option<f64>,
    udp_jitter_max_ms: Option<u64>,
    cidr_host_limit: Option<u64>,
    resolver: Option<Vec<IpAddr>>,
    ulimit: Option<u64>,
}

impl Config {
    /// Reads and parses the TOML configuration file at `custom_config_path`
    /// (or [`default_config_path`] if absent). A missing file yields
    /// defaults; a malformed file is treated as a configuration error
    /// rather than silently ignored.
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, crate::error::ConfigError> {
        let config_path = custom_config_path.unwrap_or_else(default_config_path);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|err| {
            crate::error::ConfigError::new(
                "CONFIG_UNREADABLE",
                "could not read the configuration file",
                format!("{}: {err}", config_path.display()),
                "check the file's permissions, or pass --no-config",
            )
        })?;

        toml::from_str(&content).map_err(|err| {
            crate::error::ConfigError::new(
                "CONFIG_INVALID_TOML",
                "the configuration file is not valid TOML",
                err.to_string(),
                "fix the syntax error, or pass --no-config to ignore the file",
            )
        })
    }
}

/// The default config file location: `~/.portsweep.toml`.
pub fn default_config_path() -> PathBuf {
    let mut config_path = dirs::home_dir().unwrap_or_default();
    config_path.push(".portsweep.toml");
    config_path
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Config, Opts, ProtocolArg};

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn parses_minimal_arguments() {
        let opts = Opts::parse_from(["portsweep", "--addresses", "127.0.0.1"]);
        assert_eq!(opts.addresses, vec!["127.0.0.1".to_string()]);
        assert_eq!(opts.ports, "1-1000");
        assert_eq!(opts.protocol, ProtocolArg::Tcp);
    }

    #[test]
    fn merge_fills_in_unset_fields_from_config() {
        let mut opts = Opts::parse_from(["portsweep", "--addresses", "127.0.0.1"]);
        let config = Config { rate: Some(500), workers: Some(20), ..Config::default() };

        opts.merge(&config);

        assert_eq!(opts.rate, 500);
        assert_eq!(opts.workers, 20);
    }

    #[test]
    fn merge_is_a_no_op_when_no_config_is_set() {
        let mut opts = Opts::parse_from(["portsweep", "--addresses", "127.0.0.1", "--no-config"]);
        let config = Config { rate: Some(500), ..Config::default() };

        opts.merge(&config);

        assert_eq!(opts.rate, 0);
    }

    #[test]
    fn config_rate_overwrites_explicit_cli_rate() {
        let mut opts = Opts::parse_from(["portsweep", "--addresses", "127.0.0.1", "--rate", "200"]);
        let config = Config { rate: Some(500), ..Config::default() };

        opts.merge(&config);

        assert_eq!(opts.rate, 500);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = Config::read(Some(std::path::PathBuf::from("/nonexistent/portsweep.toml"))).unwrap();
        assert!(config.addresses.is_none());
    }
}
