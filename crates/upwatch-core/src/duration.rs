//! Human-friendly duration values (`"500ms"`, `"30s"`, `"2m"`, `"1h"`).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A duration as written in requests or config: integer milliseconds or a
/// suffixed string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Millis(u64),
    Text(String),
}

impl DurationValue {
    pub fn to_duration(&self) -> Option<Duration> {
        match self {
            DurationValue::Millis(ms) => Some(Duration::from_millis(*ms)),
            DurationValue::Text(s) => parse_duration(s),
        }
    }
}

impl From<Duration> for DurationValue {
    fn from(d: Duration) -> Self {
        DurationValue::Millis(d.as_millis() as u64)
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationValue::Millis(ms) => write!(f, "{ms}ms"),
            DurationValue::Text(s) => f.write_str(s),
        }
    }
}

/// Parse a duration string. A bare number is milliseconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        let mins = mins.trim().parse::<u64>().ok()?;
        mins.checked_mul(60).map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        let hours = hours.trim().parse::<u64>().ok()?;
        hours.checked_mul(3600).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_millis)
    }
}
