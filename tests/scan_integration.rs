//! End-to-end scan scenarios (§8): drives the public `Engine` API against
//! real loopback listeners instead of mocking the probe layer.

use std::time::Duration;

use portsweep::engine::{Engine, Options, ScanProtocol};
use portsweep::event::{Event, Protocol, ScanState, ScanTarget};
use portsweep::ports::parse_port_spec;
use portsweep::targets::{resolve_targets, ResolverOptions};
use tokio_util::sync::CancellationToken;

async fn bind_loopback_listener() -> (tokio::net::TcpListener, u16) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn tcp_scan_classifies_open_and_closed_ports() {
    let (listener, open_port) = bind_loopback_listener().await;
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                return;
            }
        }
    });

    let (closed_listener, closed_port) = bind_loopback_listener().await;
    drop(closed_listener);

    let engine = Engine::new(Options {
        workers: 4,
        protocol: ScanProtocol::Tcp,
        timeout_ms: 500,
        ..Options::default()
    });
    let targets = vec![ScanTarget::new("127.0.0.1", vec![open_port, closed_port])];
    let mut events = engine.start(targets, CancellationToken::new()).await.unwrap();

    let mut states = std::collections::HashMap::new();
    while let Some(event) = events.recv().await {
        if let Event::Result(result) = event {
            states.insert(result.port, result.state);
        }
    }

    assert_eq!(states.get(&open_port), Some(&ScanState::Open));
    assert_eq!(states.get(&closed_port), Some(&ScanState::Closed));
}

#[tokio::test]
async fn cancellation_terminates_a_large_scan_promptly() {
    let ports = parse_port_spec("20000-20200").unwrap();
    let targets = vec![ScanTarget::new("10.255.255.1", ports)];

    let engine = Engine::new(Options {
        workers: 8,
        protocol: ScanProtocol::Tcp,
        timeout_ms: 5_000,
        max_retries: 2,
        ..Options::default()
    });

    let cancellation = CancellationToken::new();
    let mut events = engine.start(targets, cancellation.clone()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancellation.cancel();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(_) => panic!("engine did not terminate promptly after cancellation"),
        }
    }
}

#[tokio::test]
async fn both_protocols_run_tcp_phase_entirely_before_udp_phase() {
    let (listener, tcp_port) = bind_loopback_listener().await;
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                return;
            }
        }
    });

    let udp_socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let udp_port = udp_socket.local_addr().unwrap().port();
    drop(udp_socket);

    let engine = Engine::new(Options {
        workers: 4,
        protocol: ScanProtocol::Both,
        timeout_ms: 300,
        udp_worker_ratio: 0.5,
        ..Options::default()
    });
    let targets = vec![
        ScanTarget::new("127.0.0.1", vec![tcp_port]),
        ScanTarget::new("127.0.0.1", vec![udp_port]),
    ];
    let mut events = engine.start(targets, CancellationToken::new()).await.unwrap();

    let mut protocols_seen = Vec::new();
    while let Some(event) = events.recv().await {
        if let Event::Result(result) = event {
            protocols_seen.push(result.protocol);
        }
    }

    let last_tcp = protocols_seen.iter().rposition(|p| *p == Protocol::Tcp);
    let first_udp = protocols_seen.iter().position(|p| *p == Protocol::Udp);
    if let (Some(last_tcp), Some(first_udp)) = (last_tcp, first_udp) {
        assert!(last_tcp < first_udp, "all TCP results must precede all UDP results");
    }
}

#[tokio::test]
async fn rate_above_safety_cap_is_rejected_before_any_job_runs() {
    let engine = Engine::new(Options { rate: 15_001, ..Options::default() });
    let err = engine.start(vec![], CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.code, "RATE_LIMIT_HIGH");
}

#[tokio::test]
async fn resolver_and_port_parser_compose_into_a_job_set() {
    let hosts = resolve_targets(
        &["127.0.0.1".to_string(), "192.168.1.0/30".to_string()],
        ResolverOptions { cidr_host_limit: 16 },
    )
    .unwrap();
    let ports = parse_port_spec("80,443").unwrap();
    let targets: Vec<ScanTarget> =
        hosts.into_iter().map(|host| ScanTarget::new(host, ports.clone())).collect();

    assert_eq!(targets.len(), 5);
    assert!(targets.iter().all(|t| t.ports == vec![80, 443]));
}
