//! TCP connect probe (§4.4): timed connect, retry/backoff on timeout,
//! optional banner grab, classification into Open/Closed/Filtered.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::event::ScanState;

const BANNER_READ_CAP: usize = 1024;
const BANNER_MAX_CHARS: usize = 512;

/// Configuration shared by every TCP probe attempt.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbeOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub banner_grab: bool,
}

/// The outcome of probing one (host, port).
#[derive(Debug, Clone)]
pub struct TcpProbeResult {
    pub state: ScanState,
    pub banner: Option<String>,
    pub duration: Duration,
}

/// Probes `addr:port`, retrying up to `options.max_retries` additional times
/// on a timeout per §4.4. Definitive failures (connection refused,
/// unreachable, ...) short-circuit with `Closed` and no further attempts.
pub async fn probe(addr: IpAddr, port: u16, options: TcpProbeOptions) -> TcpProbeResult {
    let started = Instant::now();
    let target = (addr, port);

    for attempt in 0..=options.max_retries {
        match timeout(options.timeout, TcpStream::connect(target)).await {
            Ok(Ok(mut stream)) => {
                let banner = if options.banner_grab {
                    grab_banner(&mut stream, options.timeout).await
                } else {
                    None
                };
                drop(stream);
                return TcpProbeResult { state: ScanState::Open, banner, duration: started.elapsed() };
            }
            Ok(Err(err)) => {
                trace!(%addr, port, %err, "tcp connect failed definitively");
                return TcpProbeResult { state: ScanState::Closed, banner: None, duration: started.elapsed() };
            }
            Err(_) => {
                debug!(%addr, port, attempt, "tcp connect timed out");
                if attempt < options.max_retries {
                    tokio::time::sleep(backoff(attempt, options.timeout)).await;
                    continue;
                }
                return TcpProbeResult { state: ScanState::Filtered, banner: None, duration: started.elapsed() };
            }
        }
    }

    unreachable!("loop always returns before exhausting attempts")
}

/// `min((i+1)*50ms, timeout) + uniform_random(10ms, 50ms)` (§4.4).
fn backoff(attempt_index: u32, timeout: Duration) -> Duration {
    let scaled = Duration::from_millis(u64::from(attempt_index + 1) * 50).min(timeout);
    let jitter = rand::rng().random_range(10..=50);
    scaled + Duration::from_millis(jitter)
}

async fn grab_banner(stream: &mut TcpStream, deadline: Duration) -> Option<String> {
    let mut buf = [0u8; BANNER_READ_CAP];
    let n = match timeout(deadline, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(_)) | Err(_) => return None,
    };
    Some(sanitize_banner(&buf[..n]))
}

/// Strips control characters (`< 0x20` and `0x7F`) and truncates to 512
/// characters (§4.4 step 3).
fn sanitize_banner(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.chars()
        .filter(|c| !c.is_control())
        .take(BANNER_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_port_classifies_open_with_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let result = probe(
            "127.0.0.1".parse().unwrap(),
            port,
            TcpProbeOptions { timeout: Duration::from_millis(500), max_retries: 1, banner_grab: false },
        )
        .await;
        assert!(matches!(result.state, ScanState::Open));
    }

    #[tokio::test]
    async fn closed_port_classifies_closed_without_retry() {
        // bind then drop immediately to free a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = probe(
            "127.0.0.1".parse().unwrap(),
            port,
            TcpProbeOptions { timeout: Duration::from_millis(500), max_retries: 3, banner_grab: false },
        )
        .await;
        assert!(matches!(result.state, ScanState::Closed));
    }

    #[test]
    fn sanitize_strips_control_chars_and_truncates() {
        let raw = b"hello\x00\x01world\x7f!";
        assert_eq!(sanitize_banner(raw), "helloworld!");

        let long = vec![b'a'; 600];
        assert_eq!(sanitize_banner(&long).chars().count(), BANNER_MAX_CHARS);
    }

    #[test]
    fn backoff_is_bounded_by_timeout_plus_jitter() {
        let timeout = Duration::from_millis(30);
        let delay = backoff(5, timeout);
        assert!(delay >= timeout + Duration::from_millis(10));
        assert!(delay <= timeout + Duration::from_millis(50));
    }
}
