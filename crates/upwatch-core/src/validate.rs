//! Service creation requests and their validation.
//!
//! Every field of [`NewService`] is optional on the wire so that a missing
//! field and an out-of-range value can be reported as distinct errors.

use std::time::Duration;

use http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::DurationValue;
use crate::types::{ProbeKind, ServiceSpec, Target};

/// Default number of consecutive failures before a service is failing.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Longest accepted timeout, interval or threshold (30 days).
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Why a service definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    Missing { field: &'static str },

    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Missing { .. } => "missing_field",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::Invalid { .. } => "invalid_value",
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Invalid { field, .. } => *field,
        }
    }
}

/// A request to monitor a new service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "pingServiceName", skip_serializing_if = "Option::is_none")]
    pub ping_service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<DurationValue>,
    #[serde(default, alias = "failureInterval", skip_serializing_if = "Option::is_none")]
    pub failure_interval: Option<DurationValue>,
    #[serde(default, alias = "warningThreshold", skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<DurationValue>,
    #[serde(default, alias = "failureThreshold", skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

impl NewService {
    /// Validate the request into a [`ServiceSpec`].
    ///
    /// `default_failure_threshold` applies when the request leaves
    /// `failure_threshold` unset.
    pub fn validate(&self, default_failure_threshold: u32) -> Result<ServiceSpec, ValidationError> {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::Missing { field: "name" })?;

        let kind_name = self
            .ping_service_name
            .as_deref()
            .ok_or(ValidationError::Missing {
                field: "ping_service_name",
            })?;
        let kind = ProbeKind::from_name(kind_name).ok_or_else(|| ValidationError::Invalid {
            field: "ping_service_name",
            reason: format!("unknown probe kind {kind_name:?}"),
        })?;

        let target = self.target_for(kind)?;

        let timeout = required_duration("timeout", &self.timeout)?;
        let interval = required_duration("interval", &self.interval)?;
        let failure_interval = required_duration("failure_interval", &self.failure_interval)?;
        let warning_threshold = required_duration("warning_threshold", &self.warning_threshold)?;

        if timeout >= interval {
            return Err(ValidationError::OutOfRange {
                field: "timeout",
                reason: format!(
                    "{}ms must be less than interval {}ms",
                    timeout.as_millis(),
                    interval.as_millis()
                ),
            });
        }

        let failure_threshold = self.failure_threshold.unwrap_or(default_failure_threshold);
        if failure_threshold == 0 {
            return Err(ValidationError::OutOfRange {
                field: "failure_threshold",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(ServiceSpec {
            name: name.to_string(),
            kind,
            target,
            timeout_ms: timeout.as_millis() as u64,
            interval_ms: interval.as_millis() as u64,
            failure_interval_ms: failure_interval.as_millis() as u64,
            warning_threshold_ms: warning_threshold.as_millis() as u64,
            failure_threshold,
        })
    }

    fn target_for(&self, kind: ProbeKind) -> Result<Target, ValidationError> {
        match kind {
            ProbeKind::HttpHead | ProbeKind::HttpGet => {
                let url = self
                    .url
                    .as_deref()
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .ok_or(ValidationError::Missing { field: "url" })?;
                validate_url(url)?;
                Ok(Target::Url {
                    url: url.to_string(),
                })
            }
            ProbeKind::Tcp => {
                let host = self.required_host()?;
                let port = self.port.ok_or(ValidationError::Missing { field: "port" })?;
                Ok(Target::Host {
                    host,
                    port: Some(check_port(port)?),
                })
            }
            ProbeKind::Ping => {
                let host = self.required_host()?;
                let port = self.port.map(check_port).transpose()?;
                Ok(Target::Host { host, port })
            }
        }
    }

    fn required_host(&self) -> Result<String, ValidationError> {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or(ValidationError::Missing { field: "host" })
    }
}

fn required_duration(
    field: &'static str,
    value: &Option<DurationValue>,
) -> Result<Duration, ValidationError> {
    let value = value.as_ref().ok_or(ValidationError::Missing { field })?;
    let duration = value.to_duration().ok_or_else(|| ValidationError::Invalid {
        field,
        reason: format!("cannot parse duration {value}"),
    })?;
    if duration.is_zero() {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    if duration > MAX_DURATION {
        return Err(ValidationError::OutOfRange {
            field,
            reason: format!(
                "{}ms exceeds the maximum of {}ms",
                duration.as_millis(),
                MAX_DURATION.as_millis()
            ),
        });
    }
    Ok(duration)
}

fn check_port(port: u32) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ValidationError::OutOfRange {
            field: "port",
            reason: format!("{port} is not in 1..=65535"),
        }),
    }
}

fn validate_url(url: &str) -> Result<(), ValidationError> {
    let uri: Uri = url.parse().map_err(|e| ValidationError::Invalid {
        field: "url",
        reason: format!("{e}"),
    })?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => {
            return Err(ValidationError::Invalid {
                field: "url",
                reason: format!("unsupported scheme {other:?}"),
            });
        }
        None => {
            return Err(ValidationError::Invalid {
                field: "url",
                reason: "missing scheme".to_string(),
            });
        }
    }
    if uri.host().is_none_or(str::is_empty) {
        return Err(ValidationError::Invalid {
            field: "url",
            reason: "missing host".to_string(),
        });
    }
    if uri.port_u16() == Some(0) {
        return Err(ValidationError::OutOfRange {
            field: "port",
            reason: "0 is not in 1..=65535".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_request() -> NewService {
        NewService {
            name: Some("homepage".to_string()),
            ping_service_name: Some("http_head".to_string()),
            url: Some("https://example.com/".to_string()),
            timeout: Some(DurationValue::Millis(5_000)),
            interval: Some(DurationValue::Millis(60_000)),
            failure_interval: Some(DurationValue::Millis(30_000)),
            warning_threshold: Some(DurationValue::Millis(30_000)),
            ..NewService::default()
        }
    }

    #[test]
    fn valid_http_service() {
        let spec = http_request().validate(DEFAULT_FAILURE_THRESHOLD).unwrap();
        assert_eq!(spec.kind, ProbeKind::HttpHead);
        assert_eq!(spec.interval_ms, 60_000);
        assert_eq!(spec.failure_threshold, 3);
        assert_eq!(
            spec.target,
            Target::Url {
                url: "https://example.com/".to_string()
            }
        );
    }

    #[test]
    fn missing_name_is_missing() {
        let mut req = http_request();
        req.name = None;
        let err = req.validate(3).unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "name" });
        assert_eq!(err.code(), "missing_field");

        req.name = Some("   ".to_string());
        assert_eq!(req.validate(3).unwrap_err().code(), "missing_field");
    }

    #[test]
    fn missing_interval_is_missing() {
        let mut req = http_request();
        req.interval = None;
        assert_eq!(
            req.validate(3).unwrap_err(),
            ValidationError::Missing { field: "interval" }
        );
    }

    #[test]
    fn timeout_must_be_below_interval() {
        let mut req = http_request();
        req.timeout = Some(DurationValue::Millis(60_000));
        let err = req.validate(3).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.field(), "timeout");
    }

    #[test]
    fn zero_durations_are_out_of_range() {
        let mut req = http_request();
        req.failure_interval = Some(DurationValue::Millis(0));
        let err = req.validate(3).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.field(), "failure_interval");
    }

    #[test]
    fn unparseable_duration_is_invalid() {
        let mut req = http_request();
        req.warning_threshold = Some(DurationValue::Text("whenever".to_string()));
        assert_eq!(req.validate(3).unwrap_err().code(), "invalid_value");
    }

    #[test]
    fn tcp_requires_port_in_range() {
        let mut req = http_request();
        req.ping_service_name = Some("tcp".to_string());
        req.url = None;
        req.host = Some("db.internal".to_string());

        assert_eq!(
            req.validate(3).unwrap_err(),
            ValidationError::Missing { field: "port" }
        );

        req.port = Some(70_000);
        let err = req.validate(3).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.field(), "port");

        req.port = Some(5432);
        let spec = req.validate(3).unwrap();
        assert_eq!(
            spec.target,
            Target::Host {
                host: "db.internal".to_string(),
                port: Some(5432)
            }
        );
    }

    #[test]
    fn ping_port_is_optional() {
        let mut req = http_request();
        req.ping_service_name = Some("ping".to_string());
        req.url = None;
        req.host = Some("10.0.0.1".to_string());
        let spec = req.validate(3).unwrap();
        assert_eq!(
            spec.target,
            Target::Host {
                host: "10.0.0.1".to_string(),
                port: None
            }
        );
    }

    #[test]
    fn url_scheme_is_checked() {
        let mut req = http_request();
        req.url = Some("ftp://example.com/".to_string());
        assert_eq!(req.validate(3).unwrap_err().code(), "invalid_value");

        req.url = Some("example.com/path".to_string());
        assert_eq!(req.validate(3).unwrap_err().code(), "invalid_value");
    }

    #[test]
    fn unknown_probe_kind_is_invalid() {
        let mut req = http_request();
        req.ping_service_name = Some("carrier-pigeon".to_string());
        let err = req.validate(3).unwrap_err();
        assert_eq!(err.field(), "ping_service_name");
        assert_eq!(err.code(), "invalid_value");
    }

    #[test]
    fn oversized_durations_are_out_of_range() {
        let mut req = http_request();
        req.interval = Some(DurationValue::Millis(u64::MAX));
        let err = req.validate(3).unwrap_err();
        assert_eq!(err.code(), "out_of_range");
        assert_eq!(err.field(), "interval");

        let mut req = http_request();
        req.failure_interval = Some(DurationValue::Text("721h".to_string()));
        assert_eq!(req.validate(3).unwrap_err().field(), "failure_interval");

        let mut req = http_request();
        req.interval = Some(DurationValue::Text("720h".to_string()));
        assert!(req.validate(3).is_ok());
    }

    #[test]
    fn overflowing_duration_text_is_invalid() {
        let mut req = http_request();
        req.interval = Some(DurationValue::Text("999999999999999999h".to_string()));
        assert_eq!(req.validate(3).unwrap_err().code(), "invalid_value");
    }

    #[test]
    fn zero_failure_threshold_is_out_of_range() {
        let mut req = http_request();
        req.failure_threshold = Some(0);
        assert_eq!(req.validate(3).unwrap_err().code(), "out_of_range");
    }

    #[test]
    fn camel_case_aliases_deserialize() {
        let req: NewService = serde_json::from_value(serde_json::json!({
            "name": "api",
            "pingServiceName": "http_get",
            "url": "http://localhost:8080/healthz",
            "timeout": "2s",
            "interval": 60000,
            "failureInterval": 30000,
            "warningThreshold": "1500ms"
        }))
        .unwrap();
        let spec = req.validate(3).unwrap();
        assert_eq!(spec.kind, ProbeKind::HttpGet);
        assert_eq!(spec.timeout_ms, 2000);
        assert_eq!(spec.warning_threshold_ms, 1500);
    }
}
