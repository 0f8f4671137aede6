//! Human readable durations
//!
//! Timeouts in the configuration are written as `"10s"`, `"1m30s"` or
//! `"250ms"`: one or more `<number><unit>` groups with units `h`, `m`, `s`
//! and `ms`. A bare `"0"` is also accepted.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::error::ConfError;

/// Duration that (de)serializes as a unit-suffixed string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringDuration(pub Duration);

impl StringDuration {
    /// Whole seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Inner duration
    pub fn get(self) -> Duration {
        self.0
    }
}

impl From<Duration> for StringDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl From<StringDuration> for Duration {
    fn from(d: StringDuration) -> Self {
        d.0
    }
}

impl FromStr for StringDuration {
    type Err = ConfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfError::InvalidDuration(s.to_string());

        let s = s.trim();
        if s == "0" {
            return Ok(Self(Duration::ZERO));
        }
        if s.is_empty() {
            return Err(invalid());
        }

        let mut total = Duration::ZERO;
        let mut rest = s;

        while !rest.is_empty() {
            let num_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(invalid)?;
            if num_end == 0 {
                return Err(invalid());
            }
            let value: f64 = rest[..num_end].parse().map_err(|_| invalid())?;
            rest = &rest[num_end..];

            let unit_end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let scale = match &rest[..unit_end] {
                "h" => 3600.0,
                "m" => 60.0,
                "s" => 1.0,
                "ms" => 0.001,
                _ => return Err(invalid()),
            };
            rest = &rest[unit_end..];

            let part = Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())?;
            total = total.checked_add(part).ok_or_else(invalid)?;
        }

        Ok(Self(total))
    }
}

impl fmt::Display for StringDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = self.0.as_millis();
        if total_ms == 0 {
            return f.write_str("0s");
        }

        let hours = total_ms / 3_600_000;
        let minutes = (total_ms / 60_000) % 60;
        let seconds = (total_ms / 1000) % 60;
        let millis = total_ms % 1000;

        if hours > 0 {
            write!(f, "{}h", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}m", minutes)?;
        }
        if seconds > 0 {
            write!(f, "{}s", seconds)?;
        }
        if millis > 0 {
            write!(f, "{}ms", millis)?;
        }
        Ok(())
    }
}

impl Serialize for StringDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StringDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
