//! Structured error types for configuration validation and fatal engine failures.
//!
//! Probe-level outcomes (timeouts, refusals) are never errors — they are
//! [`crate::event::ScanState`] values. The types here cover only the two
//! cases §7 of the design calls out: a scan that never starts because its
//! configuration is invalid, and an internal failure severe enough to abort
//! an in-progress scan.

use thiserror::Error;

/// A structured configuration error, surfaced synchronously from
/// [`crate::engine::Engine::start`] before any job runs.
///
/// The four fields mirror the `{code, message, details, suggestion}` record
/// so a CLI or UI collaborator can render it without re-parsing a formatted
/// string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ConfigError {
    /// Machine-readable identifier, e.g. `"RATE_LIMIT_HIGH"`.
    pub code: &'static str,
    /// Human-readable summary of what is wrong.
    pub message: String,
    /// Additional context (the offending value, the limit it violated, ...).
    pub details: String,
    /// A suggested fix.
    pub suggestion: String,
}

impl ConfigError {
    /// Builds a `ConfigError`. Kept as an associated function (rather than a
    /// public-field struct literal everywhere) so call sites read as intent
    /// rather than bookkeeping.
    pub fn new(
        code: &'static str,
        message: impl Into<String>,
        details: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: details.into(),
            suggestion: suggestion.into(),
        }
    }
}

/// Error returned by the port specification parser (§4.1).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidPortSpec(pub String);

/// Errors returned by the target resolver (§4.2).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// A CIDR block expands to more hosts than `cidr_host_limit` allows.
    #[error("CIDR {cidr} expands to {host_count} hosts, exceeding the limit of {limit}")]
    CIDRTooLarge {
        /// The offending CIDR literal.
        cidr: String,
        /// The number of hosts it would expand to.
        host_count: u64,
        /// The configured limit it exceeded.
        limit: u64,
    },
    /// A token is neither an IP literal, a CIDR, nor a syntactically valid hostname.
    #[error("'{0}' is not a valid IP address, CIDR block, or hostname")]
    InvalidHost(String),
    /// The expansion produced no targets at all.
    #[error("no valid targets were provided")]
    NoValidTargets,
}

impl From<InvalidPortSpec> for ConfigError {
    fn from(err: InvalidPortSpec) -> Self {
        Self::new(
            "INVALID_PORT_SPEC",
            "the port specification could not be parsed",
            err.0,
            "use comma-separated ports or ranges, e.g. '22,80,443,1000-2000'",
        )
    }
}

impl From<TargetError> for ConfigError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::CIDRTooLarge { cidr, host_count, limit } => Self::new(
                "CIDR_TOO_LARGE",
                format!("{cidr} expands to {host_count} hosts, exceeding the limit of {limit}"),
                cidr,
                "narrow the CIDR prefix or raise --cidr-host-limit",
            ),
            TargetError::InvalidHost(host) => Self::new(
                "INVALID_HOST",
                "not a valid IP address, CIDR block, or hostname",
                host,
                "check the target for typos or unsupported syntax",
            ),
            TargetError::NoValidTargets => Self::new(
                "NO_VALID_TARGETS",
                "no valid targets were provided",
                String::new(),
                "pass at least one IP address, CIDR block, or hostname",
            ),
        }
    }
}

/// Fatal, non-probe engine errors (§7: "inability to spawn workers, internal
/// channel corruption, runtime panics"). Delivered on the event channel as
/// [`crate::event::Event::Error`] and cause the engine to transition to
/// `Cancelling`.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// A worker task could not be spawned or panicked.
    #[error("worker task failed: {0}")]
    WorkerFailed(String),
    /// The event channel receiver was dropped while workers were still producing.
    #[error("event channel closed unexpectedly")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_code_and_message() {
        let err = ConfigError::new("RATE_LIMIT_HIGH", "rate exceeds safety cap", "15001 > 15000", "lower --rate below 15000");
        assert_eq!(err.to_string(), "RATE_LIMIT_HIGH: rate exceeds safety cap");
        assert_eq!(err.suggestion, "lower --rate below 15000");
    }

    #[test]
    fn port_spec_error_converts_with_suggestion() {
        let err: ConfigError = InvalidPortSpec("invalid port number '0'".into()).into();
        assert_eq!(err.code, "INVALID_PORT_SPEC");
        assert!(err.details.contains("invalid port number"));
    }

    #[test]
    fn target_error_converts_preserving_code() {
        let err: ConfigError = TargetError::NoValidTargets.into();
        assert_eq!(err.code, "NO_VALID_TARGETS");
    }
}
