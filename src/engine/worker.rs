//! A single worker task (§4.7): dequeue a job, wait for a rate-limit
//! permit, probe it, emit the result, repeat until the job queue closes.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{Event, Job, Protocol, ResultEvent, ScanState};
use crate::probe::{tcp, udp};
use crate::rate_limiter::RateLimiter;
use crate::resolve;

use super::{Options, ProbeStatsMap};

/// Runs until the shared job queue is drained or `cancellation` fires.
/// Every suspension point (dequeue, rate-limit acquire, probe, emit) is
/// raced against cancellation so a cancelled scan terminates promptly
/// rather than finishing its current job (§4.8, §9 cancellation semantics).
#[allow(clippy::too_many_arguments)]
pub async fn run(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    limiter: Arc<RateLimiter>,
    options: Arc<Options>,
    completed: Arc<AtomicU64>,
    events: mpsc::Sender<Event>,
    cancellation: CancellationToken,
    stats: Arc<StdMutex<ProbeStatsMap>>,
) {
    loop {
        let job = tokio::select! {
            () = cancellation.cancelled() => {
                debug!(worker = id, "cancelled while waiting for next job");
                return;
            }
            job = async {
                let mut rx = jobs.lock().await;
                rx.recv().await
            } => job,
        };

        let Some(job) = job else {
            debug!(worker = id, "job queue drained, exiting");
            return;
        };

        tokio::select! {
            () = cancellation.cancelled() => {
                debug!(worker = id, host = %job.host, port = job.port, "cancelled before rate-limit permit");
                return;
            }
            acquired = limiter.acquire() => {
                if acquired.is_err() {
                    debug!(worker = id, "rate limiter closed, exiting");
                    return;
                }
            }
        }

        let result = tokio::select! {
            () = cancellation.cancelled() => {
                debug!(worker = id, host = %job.host, port = job.port, "cancelled mid-probe");
                return;
            }
            result = probe_job(&job, &options, &stats) => result,
        };

        tokio::select! {
            () = cancellation.cancelled() => return,
            sent = events.send(Event::Result(result)) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        completed.fetch_add(1, Ordering::Relaxed);
    }
}

async fn probe_job(job: &Job, options: &Options, stats: &Arc<StdMutex<ProbeStatsMap>>) -> ResultEvent {
    let ips = match resolve::resolve_host(&job.host, &options.custom_nameservers).await {
        Ok(ips) if !ips.is_empty() => ips,
        _ => {
            debug!(host = %job.host, "host did not resolve to any address");
            return ResultEvent {
                host: job.host.clone(),
                port: job.port,
                protocol: job.protocol,
                state: ScanState::Filtered,
                banner: None,
                duration: Duration::ZERO,
            };
        }
    };
    let addr: IpAddr = ips[0];

    match job.protocol {
        Protocol::Tcp => {
            let result = tcp::probe(addr, job.port, options.tcp_probe_options()).await;
            ResultEvent {
                host: job.host.clone(),
                port: job.port,
                protocol: Protocol::Tcp,
                state: result.state,
                banner: result.banner,
                duration: result.duration,
            }
        }
        Protocol::Udp => {
            let result = udp::probe(addr, job.port, options.udp_probe_options(), &options.registry).await;

            let mut stats_map = stats.lock().unwrap();
            let entry = stats_map.entry(job.port).or_default();
            entry.sent += result.stats.sent;
            entry.responded += result.stats.responded;
            entry.timed_out += result.stats.timed_out;
            drop(stats_map);

            ResultEvent {
                host: job.host.clone(),
                port: job.port,
                protocol: Protocol::Udp,
                state: result.state,
                banner: result.banner,
                duration: result.duration,
            }
        }
    }
}
