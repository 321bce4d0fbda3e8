//! Reference CLI binary: wires [`portsweep::config::Opts`] (merged with an
//! optional TOML config file) into [`portsweep::engine::Engine::start`] and
//! drains the resulting event stream as newline-delimited JSON on stdout.
//!
//! This binary is a *consumer* of the core engine, not part of it: it
//! implements exactly one of the three documented JSON stream modes
//! (newline-delimited) to prove the event-channel contract end-to-end, and
//! leaves CSV/array/wrapped-object output and the full theme system to
//! out-of-scope serializer/UI collaborators.

use std::process::ExitCode;

use portsweep::config::{Config, Opts, ProtocolArg};
use portsweep::engine::{Engine, Options, ScanProtocol};
use portsweep::error::ConfigError;
use portsweep::event::{Event, ScanState, ScanTarget};
use portsweep::ports::parse_port_spec;
use portsweep::targets::{resolve_targets, ResolverOptions};
use portsweep::{detail, warning};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut opts = Opts::read();
    match Config::read(opts.config_path.clone()) {
        Ok(config) => opts.merge(&config),
        Err(err) => {
            report_config_error(&opts, &err);
            return ExitCode::FAILURE;
        }
    }

    raise_fd_limit(&opts);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(opts))
}

async fn run(opts: Opts) -> ExitCode {
    let targets = match build_targets(&opts) {
        Ok(targets) => targets,
        Err(err) => {
            report_config_error(&opts, &err);
            return ExitCode::FAILURE;
        }
    };

    let engine = Engine::new(engine_options(&opts));
    let cancellation = CancellationToken::new();
    let ctrl_c_cancellation = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancellation.cancel();
        }
    });

    let mut events = match engine.start(targets, cancellation.clone()).await {
        Ok(events) => events,
        Err(err) => {
            report_config_error(&opts, &err);
            return ExitCode::FAILURE;
        }
    };

    detail!(
        format!("scanning {} target(s) on ports {}", opts.addresses.len(), opts.ports),
        opts.greppable,
        opts.accessible
    );

    let progress_bar = build_progress_bar(&opts);

    while let Some(event) = events.recv().await {
        match event {
            Event::Result(result) => {
                if !opts.greppable && matches!(result.state, ScanState::Open) {
                    let socket = format!("{}:{}", result.host, result.port);
                    eprintln!("{} {}", "Open".purple(), socket);
                }
                // stdout carries exactly one stream: newline-delimited JSON
                // result records (§6). Decorated status lines go to stderr
                // so the two never interleave.
                let line = serde_json::to_string(&result).unwrap_or_default();
                println!("{line}");
            }
            Event::Progress(progress) => {
                if let Some(bar) = &progress_bar {
                    bar.set_length(progress.total);
                    bar.set_position(progress.completed);
                }
            }
            Event::Error(err) => {
                warning!(err.message, opts.greppable, opts.accessible);
            }
        }
    }

    if let Some(bar) = progress_bar {
        bar.finish_and_clear();
    }

    if cancellation.is_cancelled() {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    }
}

fn build_targets(opts: &Opts) -> Result<Vec<ScanTarget>, ConfigError> {
    let ports = parse_port_spec(&opts.ports)?;
    let resolver_options = ResolverOptions { cidr_host_limit: opts.cidr_host_limit };
    let hosts = resolve_targets(&opts.addresses, resolver_options)?;
    Ok(hosts.into_iter().map(|host| ScanTarget::new(host, ports.clone())).collect())
}

fn engine_options(opts: &Opts) -> Options {
    Options {
        rate: opts.rate,
        workers: opts.workers,
        timeout_ms: opts.timeout_ms,
        max_retries: opts.retries,
        banner_grab: opts.banner_grab,
        udp_worker_ratio: opts.udp_worker_ratio,
        udp_jitter_max_ms: opts.udp_jitter_max_ms,
        protocol: protocol_of(opts.protocol),
        custom_nameservers: opts.resolver.clone().unwrap_or_default(),
    }
}

fn protocol_of(protocol: ProtocolArg) -> ScanProtocol {
    protocol.into()
}

/// Builds a decorated progress bar driven by `Event::Progress` snapshots,
/// drawn to stderr so it never interleaves with the ndjson result stream on
/// stdout. Suppressed in greppable mode.
fn build_progress_bar(opts: &Opts) -> Option<ProgressBar> {
    if opts.greppable {
        return None;
    }
    let bar = ProgressBar::new(0);
    let template = if opts.accessible {
        "{pos}/{len} ports scanned"
    } else {
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ports ({per_sec})"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("=>-"));
    }
    Some(bar)
}

fn report_config_error(opts: &Opts, err: &ConfigError) {
    warning!(format!("{}: {}", err.message, err.details), opts.greppable, opts.accessible);
    detail!(format!("suggestion: {}", err.suggestion), opts.greppable, opts.accessible);
}

/// Raises the open-file-descriptor soft limit so the worker pool's peak
/// socket usage (~W in-flight probes, §5) doesn't exhaust the default
/// per-process ceiling. An explicit `--ulimit` value is honored as given;
/// otherwise this is a best-effort raise to the hard limit and failures are
/// only logged, never fatal. Windows has no equivalent resource limit, so
/// this is a no-op there.
#[cfg(unix)]
fn raise_fd_limit(opts: &Opts) {
    use rlimit::Resource;

    let Ok((soft, hard)) = Resource::NOFILE.get() else {
        warning!("could not read the file descriptor limit", opts.greppable, opts.accessible);
        return;
    };

    let target = opts.ulimit.unwrap_or(hard);
    if target <= soft {
        return;
    }

    match Resource::NOFILE.set(target, hard.max(target)) {
        Ok(()) => detail!(format!("file descriptor limit raised to {target}"), opts.greppable, opts.accessible),
        Err(err) => warning!(
            format!("failed to raise the file descriptor limit to {target}: {err}"),
            opts.greppable,
            opts.accessible
        ),
    }
}

#[cfg(not(unix))]
fn raise_fd_limit(_opts: &Opts) {}
