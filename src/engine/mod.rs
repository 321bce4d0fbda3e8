//! The scan engine (§4.7, §4.8): assembles the job generator, worker pool,
//! shared rate limiter, and progress reporter behind a single bounded event
//! channel.
//!
//! A fixed number of worker tasks pull from one shared job queue, gated by
//! a shared rate limiter, feeding a single result-collecting channel. When
//! both protocols are requested, TCP and UDP run as two sequential phases,
//! with the worker pool split by `udp_worker_ratio` across them.

mod progress;
mod worker;

use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ConfigError, EngineError};
use crate::event::{expand_jobs, Event, EventError, Job, Port, ProbeStats, Protocol, ScanTarget};
use crate::probe::tcp::TcpProbeOptions;
use crate::probe::udp::UdpProbeOptions;
use crate::rate_limiter::{RateLimiter, SAFETY_CAP};
use crate::registry::Registry;

/// Per-port UDP probe counters accumulated across a scan (§3 `ProbeStats`),
/// shared between every worker and read back through [`Engine::udp_probe_stats`].
pub type ProbeStatsMap = HashMap<Port, ProbeStats>;

/// Event channel capacity (§4.8): bounded backpressure at 1,000 events.
const EVENT_CHANNEL_CAPACITY: usize = 1_000;
const MIN_AUTO_WORKERS: usize = 10;
const MAX_AUTO_WORKERS: usize = 200;
const MAX_WORKERS: usize = 1_000;
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Which protocol(s) a scan covers (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProtocol {
    Tcp,
    Udp,
    Both,
}

/// Engine configuration (§6's settings table). Validated synchronously by
/// [`Options::validate`] before a scan is allowed to start.
#[derive(Debug, Clone)]
pub struct Options {
    /// Permits per second; `<= 0` disables rate limiting.
    pub rate: i64,
    /// Worker pool size; `0` auto-detects from CPU count (§4.7).
    pub workers: usize,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub banner_grab: bool,
    /// Fraction of the worker pool dedicated to the UDP phase when
    /// `protocol` is `Both` (§4.7).
    pub udp_worker_ratio: f64,
    pub udp_jitter_max_ms: u64,
    pub protocol: ScanProtocol,
    pub custom_nameservers: Vec<IpAddr>,
    /// Port -> probe payload/parser map consulted by the UDP phase (§4.6).
    /// An owned value built by the caller rather than process-wide state
    /// (§9), so a scan can be configured with extra probes without
    /// mutating anything outside this `Options`.
    pub registry: Arc<Registry>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rate: 0,
            workers: 0,
            timeout_ms: 1_500,
            max_retries: 1,
            banner_grab: false,
            udp_worker_ratio: 0.5,
            udp_jitter_max_ms: 0,
            protocol: ScanProtocol::Tcp,
            custom_nameservers: Vec::new(),
            registry: Arc::new(Registry::new()),
        }
    }
}

impl Options {
    /// Rejects configuration the engine cannot run, with the structured
    /// `{code, message, details, suggestion}` codes named in §7.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate > i64::from(SAFETY_CAP) {
            return Err(ConfigError::new(
                "RATE_LIMIT_HIGH",
                "rate exceeds the safety cap",
                format!("{} > {SAFETY_CAP}", self.rate),
                format!("lower --rate below {SAFETY_CAP}"),
            ));
        }
        if self.workers > MAX_WORKERS {
            return Err(ConfigError::new(
                "WORKERS_OUT_OF_RANGE",
                "worker pool size exceeds the maximum",
                format!("{} > {MAX_WORKERS}", self.workers),
                format!("use 0 for auto-detect, or a value <= {MAX_WORKERS}"),
            ));
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::new(
                "TIMEOUT_OUT_OF_RANGE",
                "timeout_ms must be within range",
                format!("{} not in [1, {MAX_TIMEOUT_MS}]", self.timeout_ms),
                format!("use a timeout between 1 and {MAX_TIMEOUT_MS} ms"),
            ));
        }
        if !(0.0..=1.0).contains(&self.udp_worker_ratio) {
            return Err(ConfigError::new(
                "UDP_RATIO_OUT_OF_RANGE",
                "udp_worker_ratio must be within [0, 1]",
                self.udp_worker_ratio.to_string(),
                "use a fraction between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            (num_cpus() * 50).clamp(MIN_AUTO_WORKERS, MAX_AUTO_WORKERS)
        } else {
            self.workers
        }
    }

    fn protocols(&self) -> Vec<Protocol> {
        match self.protocol {
            ScanProtocol::Tcp => vec![Protocol::Tcp],
            ScanProtocol::Udp => vec![Protocol::Udp],
            ScanProtocol::Both => vec![Protocol::Tcp, Protocol::Udp],
        }
    }

    fn tcp_probe_options(&self) -> TcpProbeOptions {
        TcpProbeOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            max_retries: self.max_retries,
            banner_grab: self.banner_grab,
        }
    }

    fn udp_probe_options(&self) -> UdpProbeOptions {
        UdpProbeOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            jitter_max: Duration::from_millis(self.udp_jitter_max_ms),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(1)
}

/// The engine's lifecycle (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Cancelling,
    Drained,
    Done,
}

/// Owns one scan's worth of engine configuration. Rejects a second
/// concurrent `start` while a scan is active; a finished engine may be
/// restarted.
pub struct Engine {
    options: Options,
    state: Arc<StdMutex<EngineState>>,
    stats: Arc<StdMutex<ProbeStatsMap>>,
}

impl Engine {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            state: Arc::new(StdMutex::new(EngineState::Idle)),
            stats: Arc::new(StdMutex::new(ProbeStatsMap::new())),
        }
    }

    /// The engine's current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap()
    }

    /// Per-port UDP probe counters accumulated during the most recent (or
    /// currently running) scan (§3 `ProbeStats`). Empty until a UDP phase
    /// has run at least one job.
    pub fn udp_probe_stats(&self) -> ProbeStatsMap {
        self.stats.lock().unwrap().clone()
    }

    /// Validates `self.options`, builds the job sequence for `targets`, and
    /// spawns the worker pool and progress reporter. Returns the event
    /// stream immediately; the scan runs in the background and the stream
    /// closes once every worker has exited and the reporter has emitted its
    /// final snapshot (§4.8).
    pub async fn start(
        &self,
        targets: Vec<ScanTarget>,
        cancellation: CancellationToken,
    ) -> Result<mpsc::Receiver<Event>, ConfigError> {
        self.options.validate()?;

        {
            let mut state = self.state.lock().unwrap();
            if matches!(*state, EngineState::Running | EngineState::Cancelling) {
                return Err(ConfigError::new(
                    "SCAN_ALREADY_RUNNING",
                    "this engine instance already has an active scan",
                    String::new(),
                    "create a new Engine, or wait for the current scan to finish",
                ));
            }
            *state = EngineState::Running;
        }

        self.stats.lock().unwrap().clear();

        let protocols = self.options.protocols();
        let total: u64 =
            targets.iter().map(|t| t.ports.len() as u64).sum::<u64>() * protocols.len() as u64;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let completed = Arc::new(AtomicU64::new(0));
        let (done_tx, done_rx) = watch::channel(false);

        let reporter = tokio::spawn(progress::run(
            total,
            Arc::clone(&completed),
            done_rx,
            cancellation.clone(),
            event_tx.clone(),
        ));

        let phase_events = event_tx.clone();
        drop(event_tx);

        let options = Arc::new(self.options.clone());
        let limiter = Arc::new(RateLimiter::start(self.options.rate));
        let state_handle = Arc::clone(&self.state);
        let stats_handle = Arc::clone(&self.stats);
        let phase_cancellation = cancellation.clone();

        tokio::spawn(async move {
            run_phases(
                targets,
                protocols,
                options,
                limiter,
                completed,
                phase_events,
                phase_cancellation,
                Arc::clone(&state_handle),
                stats_handle,
            )
            .await;

            *state_handle.lock().unwrap() = EngineState::Drained;
            let _ = done_tx.send(true);
            let _ = reporter.await;
            *state_handle.lock().unwrap() = EngineState::Done;
        });

        Ok(event_rx)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_phases(
    targets: Vec<ScanTarget>,
    protocols: Vec<Protocol>,
    options: Arc<Options>,
    limiter: Arc<RateLimiter>,
    completed: Arc<AtomicU64>,
    events: mpsc::Sender<Event>,
    cancellation: CancellationToken,
    state: Arc<StdMutex<EngineState>>,
    stats: Arc<StdMutex<ProbeStatsMap>>,
) {
    let total_workers = options.effective_workers();
    let (tcp_workers, udp_workers) =
        split_workers(total_workers, protocols.len(), options.udp_worker_ratio);

    for protocol in &protocols {
        if cancellation.is_cancelled() {
            *state.lock().unwrap() = EngineState::Cancelling;
            break;
        }

        let worker_count = match protocol {
            Protocol::Tcp => tcp_workers,
            Protocol::Udp => udp_workers,
        };
        info!(?protocol, worker_count, "starting scan phase");

        let jobs = expand_jobs(&targets, std::slice::from_ref(protocol));
        if let Err(err) = run_phase(
            jobs,
            worker_count,
            &options,
            &limiter,
            &completed,
            &events,
            &cancellation,
            &stats,
        )
        .await
        {
            warn!(%err, "phase aborted by a fatal engine error");
            let _ = events.send(Event::Error(EventError::from(&err))).await;
            cancellation.cancel();
            *state.lock().unwrap() = EngineState::Cancelling;
            break;
        }
    }
}

/// Splits the worker pool across sequential phases. When only one protocol
/// runs, it gets the whole pool. Both phase counts are held to at least one
/// worker so a `udp_worker_ratio` of 0.0 or 1.0 cannot starve a phase that
/// still has jobs to run.
fn split_workers(total: usize, phase_count: usize, udp_ratio: f64) -> (usize, usize) {
    if phase_count < 2 {
        return (total, total);
    }
    let ceiling = total.saturating_sub(1).max(1);
    let udp = (((total as f64) * udp_ratio).floor() as usize).clamp(1, ceiling);
    let tcp = total.saturating_sub(udp).max(1);
    (tcp, udp)
}

#[allow(clippy::too_many_arguments)]
async fn run_phase(
    jobs: Vec<Job>,
    worker_count: usize,
    options: &Arc<Options>,
    limiter: &Arc<RateLimiter>,
    completed: &Arc<AtomicU64>,
    events: &mpsc::Sender<Event>,
    cancellation: &CancellationToken,
    stats: &Arc<StdMutex<ProbeStatsMap>>,
) -> Result<(), EngineError> {
    if jobs.is_empty() {
        return Ok(());
    }

    let (job_tx, job_rx) = mpsc::channel(worker_count.saturating_mul(4).max(1));
    let job_rx = Arc::new(Mutex::new(job_rx));

    let generator_cancellation = cancellation.clone();
    let generator = tokio::spawn(async move {
        for job in jobs {
            tokio::select! {
                () = generator_cancellation.cancelled() => return,
                sent = job_tx.send(job) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    });

    let mut handles = Vec::with_capacity(worker_count);
    for id in 0..worker_count {
        handles.push(tokio::spawn(worker::run(
            id,
            Arc::clone(&job_rx),
            Arc::clone(limiter),
            Arc::clone(options),
            Arc::clone(completed),
            events.clone(),
            cancellation.clone(),
            Arc::clone(stats),
        )));
    }

    for handle in handles {
        handle.await.map_err(|err| EngineError::WorkerFailed(err.to_string()))?;
    }
    let _ = generator.await;
    Ok(())
}
