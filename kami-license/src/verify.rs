//! The cached verification record and expiry arithmetic.
//!
//! A [`VerifyInfo`] is written after every successful login and is the only
//! thing the client consults offline. Its expiry is compared against the
//! wall clock on every read: a record whose `vip_expire_time` is at or
//! before "now" is expired.

use serde::{Deserialize, Serialize};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Marker rendered for an expired license.
pub const EXPIRED_MARKER: &str = "已过期";

/// A cached license session.
///
/// Field names on the wire match the records older clients wrote, so an
/// existing cache keeps working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyInfo {
    /// The key the user entered.
    #[serde(rename = "kami")]
    pub license_key: String,
    /// Seconds since epoch after which the session is invalid.
    #[serde(rename = "vipExpireTime")]
    pub vip_expire_time: i64,
    /// Seconds since epoch of the last successful remote verification.
    #[serde(rename = "verifyTime")]
    pub verified_at: i64,
}

impl VerifyInfo {
    #[must_use]
    pub fn new(license_key: impl Into<String>, vip_expire_time: i64, verified_at: i64) -> Self {
        Self {
            license_key: license_key.into(),
            vip_expire_time,
            verified_at,
        }
    }

    /// Expiry at exactly `now` counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.vip_expire_time <= now
    }

    /// Time left on this session as of `now`.
    #[must_use]
    pub fn remaining_at(&self, now: i64) -> RemainingTime {
        RemainingTime::between(now, self.vip_expire_time)
    }
}

/// Human-scale time left before expiry.
///
/// Only the two coarsest units are kept: days take priority over hours,
/// hours over minutes. Lower units are floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RemainingTime {
    Expired,
    DaysHours { days: i64, hours: i64 },
    HoursMinutes { hours: i64, minutes: i64 },
    Minutes { minutes: i64 },
}

impl RemainingTime {
    /// Classifies a remaining duration in seconds.
    #[must_use]
    pub fn from_secs(remaining: i64) -> Self {
        if remaining <= 0 {
            return Self::Expired;
        }

        let days = remaining / SECS_PER_DAY;
        let hours = (remaining % SECS_PER_DAY) / SECS_PER_HOUR;
        let minutes = (remaining % SECS_PER_HOUR) / SECS_PER_MINUTE;

        if days > 0 {
            Self::DaysHours { days, hours }
        } else if hours > 0 {
            Self::HoursMinutes { hours, minutes }
        } else {
            Self::Minutes { minutes }
        }
    }

    /// Time from `now` until `expire`, both in epoch seconds.
    #[must_use]
    pub fn between(now: i64, expire: i64) -> Self {
        Self::from_secs(expire.saturating_sub(now))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

impl std::fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => f.write_str(EXPIRED_MARKER),
            Self::DaysHours { days, hours } => write!(f, "{days}天{hours}小时"),
            Self::HoursMinutes { hours, minutes } => write!(f, "{hours}小时{minutes}分钟"),
            Self::Minutes { minutes } => write!(f, "{minutes}分钟"),
        }
    }
}

/// Formats epoch seconds in local time as `YYYY/MM/DD HH:MM`.
///
/// Returns `None` for timestamps chrono cannot represent.
#[must_use]
pub fn format_expire_time(epoch_secs: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(epoch_secs, 0).map(|utc| {
        utc.with_timezone(&chrono::Local)
            .format("%Y/%m/%d %H:%M")
            .to_string()
    })
}
