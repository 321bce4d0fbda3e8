//! The data model crossing the engine/consumer boundary (§3, §6): targets,
//! jobs, scan outcomes, and the tagged event union delivered on the event
//! channel.
//!
//! One enum (`#[serde(tag = "type")]`) carries all three event kinds rather
//! than separate result/progress/error channels, preserving their relative
//! arrival order for consumers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single port number.
pub type Port = u16;

/// A resolved or unresolved target host, as produced by `targets.rs`.
pub type Host = String;

/// Which protocol a job probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// One (host, port, protocol) unit of work, as enqueued by the engine's job
/// generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub host: Host,
    pub port: Port,
    pub protocol: Protocol,
}

/// A host paired with the ports to probe on it, as produced by the target
/// resolver and port parser and handed to [`crate::engine::Engine::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub host: Host,
    pub ports: Vec<Port>,
}

impl ScanTarget {
    pub fn new(host: impl Into<Host>, ports: Vec<Port>) -> Self {
        Self { host: host.into(), ports }
    }
}

/// Expands `targets × protocols` into the declared-order job sequence
/// (§4.8: "targets × ports in declared order"). When `protocols` names more
/// than one protocol, every job for the first protocol precedes every job
/// for the second — the engine runs them as sequential phases (§4.7).
pub fn expand_jobs(targets: &[ScanTarget], protocols: &[Protocol]) -> Vec<Job> {
    let mut jobs = Vec::new();
    for &protocol in protocols {
        for target in targets {
            for &port in &target.ports {
                jobs.push(Job { host: target.host.clone(), port, protocol });
            }
        }
    }
    jobs
}

/// The outcome of probing a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Open,
    Closed,
    Filtered,
}

/// A completed probe result, the payload of [`Event::Result`] and the unit
/// of the JSON result record (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEvent {
    pub host: Host,
    pub port: Port,
    pub protocol: Protocol,
    pub state: ScanState,
    pub banner: Option<String>,
    /// Wall-clock time from dial start to classification. Serialized as
    /// `duration_ms` (whole milliseconds) to match the JSON result record
    /// in §6, rather than `serde`'s default `{secs, nanos}` encoding of
    /// [`Duration`].
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
}

/// (De)serializes a [`Duration`] as a millisecond count, per the JSON
/// result record's `duration_ms: number` field (§6).
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// A periodic progress snapshot, the payload of [`Event::Progress`],
/// emitted on a 100 ms cadence by the engine's progress reporter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub total: u64,
    pub completed: u64,
    /// Completed jobs per second, measured since the previous snapshot.
    pub rate: f64,
}

/// Cumulative counters for a single probe attempt, used internally by the
/// UDP state machine and surfaced for diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    pub sent: u64,
    pub responded: u64,
    pub timed_out: u64,
}

/// The tagged event union delivered on the engine's single event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Result(ResultEvent),
    Progress(ProgressEvent),
    Error(EventError),
}

/// A fatal, non-probe failure reported on the event channel (§7). Carries a
/// display string rather than [`crate::error::EngineError`] directly so the
/// event stream stays serializable without teaching `serde` about
/// `thiserror`'s `Error` trait object boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventError {
    pub message: String,
}

impl From<&crate::error::EngineError> for EventError {
    fn from(err: &crate::error::EngineError) -> Self {
        Self { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_event_serializes_with_tag() {
        let event = Event::Result(ResultEvent {
            host: "10.0.0.1".into(),
            port: 80,
            protocol: Protocol::Tcp,
            state: ScanState::Open,
            banner: None,
            duration: Duration::from_millis(12),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"result\""));
        assert!(json.contains("\"state\":\"open\""));
        assert!(json.contains("\"duration_ms\":12"));
    }

    #[test]
    fn progress_event_round_trips() {
        let event = Event::Progress(ProgressEvent { total: 100, completed: 40, rate: 12.5 });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        match back {
            Event::Progress(p) => assert_eq!(p.completed, 40),
            _ => panic!("expected Progress variant"),
        }
    }

    #[test]
    fn engine_error_converts_to_event_error() {
        let err = crate::error::EngineError::ChannelClosed;
        let event_error = EventError::from(&err);
        assert_eq!(event_error.message, "event channel closed unexpectedly");
    }

    #[test]
    fn expand_jobs_orders_by_protocol_then_target_then_port() {
        let targets = vec![
            ScanTarget::new("a", vec![1, 2]),
            ScanTarget::new("b", vec![3]),
        ];
        let jobs = expand_jobs(&targets, &[Protocol::Tcp, Protocol::Udp]);
        let shape: Vec<(&str, u16, Protocol)> =
            jobs.iter().map(|j| (j.host.as_str(), j.port, j.protocol)).collect();
        assert_eq!(
            shape,
            vec![
                ("a", 1, Protocol::Tcp),
                ("a", 2, Protocol::Tcp),
                ("b", 3, Protocol::Tcp),
                ("a", 1, Protocol::Udp),
                ("a", 2, Protocol::Udp),
                ("b", 3, Protocol::Udp),
            ]
        );
    }
}
