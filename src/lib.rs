//! `portsweep` is a concurrent TCP/UDP port scanning engine.
//!
//! It resolves a set of targets (IP addresses, CIDR blocks, or hostnames)
//! and a set of ports into a job sequence, runs those jobs through a
//! rate-limited worker pool, and streams back a tagged event union —
//! [`event::Event::Result`], [`event::Event::Progress`], and
//! [`event::Event::Error`] — on a single bounded channel.
//!
//! ## Architecture Overview
//!
//! 1. **Target resolution** ([`targets`]): tokens are expanded into an
//!    ordered, deduplicated list of hosts. CIDR blocks are fully enumerated;
//!    hostnames are validated but left unresolved until probe time.
//! 2. **Port parsing** ([`ports`]): a textual port specification becomes an
//!    ordered, deduplicated `Vec<u16>`.
//! 3. **The engine** ([`engine`]): combines targets and ports into jobs,
//!    runs them through a fixed-size worker pool behind a shared rate
//!    limiter ([`rate_limiter`]), and reports progress on a 100 ms cadence.
//!    When both protocols are requested, TCP and UDP run as sequential
//!    phases rather than concurrently.
//! 4. **Probing** ([`probe::tcp`], [`probe::udp`]): per-protocol connect/
//!    send-recv state machines that classify each port as open, closed, or
//!    filtered, with optional banner capture.
//! 5. **The probe registry** ([`registry`]): maps well-known UDP ports to
//!    probe payloads and response parsers, extensible at runtime.
//!
//! ## Basic Usage Example
//!
//! ```no_run
//! use portsweep::engine::{Engine, Options};
//! use portsweep::event::{Event, ScanTarget};
//! use portsweep::ports::parse_port_spec;
//! use portsweep::targets::{resolve_targets, ResolverOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let hosts = resolve_targets(&["127.0.0.1".to_string()], ResolverOptions::default())?;
//! let ports = parse_port_spec("22,80,443")?;
//! let targets: Vec<ScanTarget> =
//!     hosts.into_iter().map(|host| ScanTarget::new(host, ports.clone())).collect();
//!
//! let engine = Engine::new(Options::default());
//! let mut events = engine.start(targets, CancellationToken::new()).await?;
//! while let Some(event) = events.recv().await {
//!     if let Event::Result(result) = event {
//!         println!("{}:{} -> {:?}", result.host, result.port, result.state);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Non-goals
//!
//! This crate never opens raw or elevated-privilege sockets: every probe is
//! a userspace connect (TCP) or send/recv (UDP). It has no service
//! fingerprinting, OS detection, or scripting engine — it answers "what is
//! open" and, optionally, "what banner did it return," nothing more.

#![warn(missing_docs)]

/// Structured configuration and fatal-engine error types.
pub mod error;
/// The tagged event union, job/target types, and the engine/consumer
/// data model.
pub mod event;
/// The scan engine: worker pool, rate limiter wiring, phase sequencing.
pub mod engine;
/// CLI argument parsing and TOML configuration file merging.
pub mod config;
/// Textual port specification parsing.
pub mod ports;
/// Per-process rate limiting shared across every worker.
pub mod rate_limiter;
/// UDP probe payload/parser registry.
pub mod registry;
/// Lazy per-job DNS resolution.
pub mod resolve;
/// Target token expansion: IP literals, CIDR blocks, hostnames.
pub mod targets;
/// Per-protocol probe state machines.
pub mod probe;
/// Colored terminal output macros for the CLI.
pub mod tui;
