//! Shared types used across upwatch crates.
//!
//! Durations are persisted as integer milliseconds (latency as
//! microseconds) so every record serializes to plain JSON numbers.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque service identifier, assigned by the persistence layer.
pub type ServiceId = String;

// ── Service definition ─────────────────────────────────────────────

/// The closed set of health check strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    HttpHead,
    HttpGet,
    Tcp,
    Ping,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::HttpHead => "http_head",
            ProbeKind::HttpGet => "http_get",
            ProbeKind::Tcp => "tcp",
            ProbeKind::Ping => "ping",
        }
    }

    /// Parse a probe name as it appears in requests and config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "http_head" | "head" => Some(ProbeKind::HttpHead),
            "http_get" | "get" | "http" => Some(ProbeKind::HttpGet),
            "tcp" => Some(ProbeKind::Tcp),
            "ping" | "icmp" => Some(ProbeKind::Ping),
            _ => None,
        }
    }

    pub fn is_http(&self) -> bool {
        matches!(self, ProbeKind::HttpHead | ProbeKind::HttpGet)
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a probe is aimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    /// Full `http://` or `https://` URL (HTTP probes).
    Url { url: String },
    /// Host with an optional port (TCP and ping probes).
    Host { host: String, port: Option<u16> },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Url { url } => f.write_str(url),
            Target::Host { host, port: Some(port) } => write!(f, "{host}:{port}"),
            Target::Host { host, port: None } => f.write_str(host),
        }
    }
}

/// Validated service configuration, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    #[serde(rename = "ping_service_name")]
    pub kind: ProbeKind,
    pub target: Target,
    /// Max wait per probe.
    pub timeout_ms: u64,
    /// Time between probes while not failing.
    pub interval_ms: u64,
    /// Time between probes while failing.
    pub failure_interval_ms: u64,
    /// Latency above which a successful probe counts as a warning.
    pub warning_threshold_ms: u64,
    /// Consecutive failures before the service is marked failing.
    pub failure_threshold: u32,
}

impl ServiceSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn failure_interval(&self) -> Duration {
        Duration::from_millis(self.failure_interval_ms)
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_millis(self.warning_threshold_ms)
    }
}

/// A persisted service definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    #[serde(flatten)]
    pub spec: ServiceSpec,
    /// Unix timestamp (milliseconds) when the service was created.
    pub created_at: u64,
}

// ── Health ─────────────────────────────────────────────────────────

/// Current classification of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// No probe has completed yet (or history was reset).
    #[default]
    Unknown,
    Healthy,
    Warning,
    Failing,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Warning => "warning",
            HealthState::Failing => "failing",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Probe outcomes ─────────────────────────────────────────────────

/// Why a probe failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorDetail {
    Timeout,
    ConnectionRefused,
    Dns { message: String },
    Tls { message: String },
    HttpStatus { code: u16 },
    Io { message: String },
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorDetail::Timeout => f.write_str("timed out"),
            ErrorDetail::ConnectionRefused => f.write_str("connection refused"),
            ErrorDetail::Dns { message } => write!(f, "dns: {message}"),
            ErrorDetail::Tls { message } => write!(f, "tls: {message}"),
            ErrorDetail::HttpStatus { code } => write!(f, "http status {code}"),
            ErrorDetail::Io { message } => write!(f, "io: {message}"),
        }
    }
}

/// Result of one probe execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub service_id: ServiceId,
    /// Unix timestamp (milliseconds) when the probe finished.
    pub timestamp: u64,
    pub success: bool,
    pub latency_us: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ProbeOutcome {
    pub fn success(service_id: &str, latency: Duration) -> Self {
        Self {
            service_id: service_id.to_string(),
            timestamp: unix_millis(),
            success: true,
            latency_us: latency.as_micros() as u64,
            error: None,
        }
    }

    pub fn failure(service_id: &str, latency: Duration, error: ErrorDetail) -> Self {
        Self {
            service_id: service_id.to_string(),
            timestamp: unix_millis(),
            success: false,
            latency_us: latency.as_micros() as u64,
            error: Some(error),
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_micros(self.latency_us)
    }
}

/// A recorded health state transition (surfaced as an incident).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub service_id: ServiceId,
    pub timestamp: u64,
    pub from: HealthState,
    pub to: HealthState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// ── Snapshots ──────────────────────────────────────────────────────

/// Read-only view of a service: its definition plus live runtime state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    #[serde(flatten)]
    pub definition: ServiceDefinition,
    pub state: HealthState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub probes_total: u64,
    pub last_probe_at: Option<u64>,
    pub last_latency_us: Option<u64>,
    pub next_probe_at: Option<u64>,
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
