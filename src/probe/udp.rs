//! UDP probe/response state machine (§4.5): ephemeral socket, optional
//! pre-send jitter, registry-driven payload, classification by response /
//! ICMP-unreachable / timeout.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

use crate::event::{ProbeStats, ScanState};
use crate::registry::Registry;

const HEX_FALLBACK_CAP: usize = 512;

/// Configuration for a single UDP probe attempt.
#[derive(Debug, Clone, Copy)]
pub struct UdpProbeOptions {
    pub timeout: Duration,
    pub jitter_max: Duration,
}

/// The outcome of probing one (host, port), plus the stats delta it produced.
#[derive(Debug, Clone)]
pub struct UdpProbeResult {
    pub state: ScanState,
    pub banner: Option<String>,
    pub duration: Duration,
    pub stats: ProbeStats,
}

/// Probes `addr:port`. Never retries internally — one attempt, one
/// classification (§4.5). `registry` supplies the port-specific payload and
/// response parser, if one is registered.
pub async fn probe(addr: IpAddr, port: u16, options: UdpProbeOptions, registry: &Registry) -> UdpProbeResult {
    let started = Instant::now();
    let mut stats = ProbeStats::default();

    if options.jitter_max > Duration::ZERO {
        let jitter_ms = rand::rng().random_range(0..=options.jitter_max.as_millis() as u64);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
    }

    let bind_addr = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(err) => {
            trace!(%addr, port, %err, "failed to bind ephemeral udp socket");
            return UdpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed(), stats };
        }
    };

    if let Err(err) = socket.connect((addr, port)).await {
        trace!(%addr, port, %err, "udp connect failed");
        return UdpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed(), stats };
    }

    let entry = registry.lookup(port);
    let payload: &[u8] = entry.map_or(&[][..], |e| e.payload.as_slice());

    stats.sent += 1;
    if let Err(err) = socket.send(payload).await {
        trace!(%addr, port, %err, "udp send failed");
        return classify_send_error(&err, started, stats);
    }

    let mut buf = [0u8; 2048];
    match timeout(options.timeout, socket.recv(&mut buf)).await {
        Ok(Ok(n)) => {
            stats.responded += 1;
            let banner = entry
                .and_then(|e| e.parser)
                .and_then(|parser| parser(&buf[..n]))
                .or_else(|| Some(hex_prefix(&buf[..n])));
            UdpProbeResult { state: ScanState::Open, banner, duration: started.elapsed(), stats }
        }
        Ok(Err(err)) => classify_recv_error(&err, started, stats),
        Err(_) => {
            stats.timed_out += 1;
            UdpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed(), stats }
        }
    }
}

/// Only `ConnectionRefused` (the ICMP-port-unreachable signal surfaced by a
/// connected UDP socket) classifies as Closed; everything else collapses to
/// Filtered (§9 Open Question (b)).
fn classify_recv_error(err: &std::io::Error, started: Instant, mut stats: ProbeStats) -> UdpProbeResult {
    if err.kind() == std::io::ErrorKind::ConnectionRefused {
        UdpProbeResult { state: ScanState::Closed, banner: None, duration: started.elapsed(), stats }
    } else {
        stats.timed_out += 1;
        UdpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed(), stats }
    }
}

fn classify_send_error(err: &std::io::Error, started: Instant, stats: ProbeStats) -> UdpProbeResult {
    if err.kind() == std::io::ErrorKind::ConnectionRefused {
        UdpProbeResult { state: ScanState::Closed, banner: None, duration: started.elapsed(), stats }
    } else {
        UdpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed(), stats }
    }
}

fn hex_prefix(data: &[u8]) -> String {
    data.iter().take(HEX_FALLBACK_CAP).map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silent_port_classifies_filtered_after_timeout() {
        // nothing listens here; expect a timeout-driven Filtered classification.
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let unused_port = socket.local_addr().unwrap().port();
        drop(socket);

        let result = probe(
            "127.0.0.1".parse().unwrap(),
            unused_port,
            UdpProbeOptions { timeout: Duration::from_millis(100), jitter_max: Duration::ZERO },
            &Registry::new(),
        )
        .await;
        assert!(matches!(result.state, ScanState::Filtered | ScanState::Closed));
        assert_eq!(result.stats.sent, 1);
    }

    #[tokio::test]
    async fn response_yields_open_with_hex_fallback_banner() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_port = server.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            if let Ok((n, peer)) = server.recv_from(&mut buf).await {
                let _ = server.send_to(&buf[..n.min(4)], peer).await;
            }
        });

        let result = probe(
            "127.0.0.1".parse().unwrap(),
            server_port,
            UdpProbeOptions { timeout: Duration::from_millis(500), jitter_max: Duration::ZERO },
            &Registry::new(),
        )
        .await;
        assert!(matches!(result.state, ScanState::Open));
        assert!(result.banner.is_some());
    }

    #[test]
    fn hex_prefix_caps_at_512_bytes() {
        let data = vec![0xabu8; 1000];
        assert_eq!(hex_prefix(&data).len(), HEX_FALLBACK_CAP * 2);
    }
}
