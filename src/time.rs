//! Message timestamps.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A ROS-style timestamp: whole seconds plus nanoseconds.
///
/// `nsec` is always normalized into `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Time {
    /// Whole seconds.
    pub sec: i64,
    /// Nanoseconds within the second.
    pub nsec: u32,
}

impl Time {
    /// Create a time, carrying nanosecond overflow into seconds.
    pub fn new(sec: i64, nsec: u32) -> Self {
        let carry = i64::from(nsec) / NANOS_PER_SEC;
        Self {
            sec: sec.saturating_add(carry),
            nsec: (i64::from(nsec) % NANOS_PER_SEC) as u32,
        }
    }

    /// Convert floating point seconds into a time.
    pub fn from_seconds(seconds: f64) -> Self {
        let sec = seconds.floor();
        let nsec = ((seconds - sec) * NANOS_PER_SEC as f64).round() as i64;
        let sec = sec as i64;
        if nsec >= NANOS_PER_SEC {
            Self {
                sec: sec.saturating_add(1),
                nsec: 0,
            }
        } else {
            Self { sec, nsec: nsec as u32 }
        }
    }

    /// Floating point seconds.
    pub fn to_seconds(self) -> f64 {
        self.sec as f64 + f64::from(self.nsec) / NANOS_PER_SEC as f64
    }

    /// Seconds elapsed since `start` (negative when `self` is earlier).
    pub fn seconds_since(self, start: Time) -> f64 {
        (i128::from(self.sec) - i128::from(start.sec)) as f64
            + (i64::from(self.nsec) - i64::from(start.nsec)) as f64 / NANOS_PER_SEC as f64
    }

    /// Decode a `{ sec, nsec }` object (ROS 1 `secs`/`nsecs` spellings accepted).
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let sec = object.get("sec").or_else(|| object.get("secs"))?.as_i64()?;
        let nsec = object.get("nsec").or_else(|| object.get("nsecs"))?.as_u64()?;
        let nsec = u32::try_from(nsec).ok()?;
        Some(Self::new(sec, nsec))
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}
