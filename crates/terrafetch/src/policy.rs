//! Cache usage and freshness policy.
//!
//! A [`CachePolicy`] says whether a cache may be read from or written to, and
//! how old a cached record may be before it is considered expired. Policies
//! layer: a per-layer policy can be overlaid on a global one with
//! [`CachePolicy::merge_and_override`], where only the fields the overlay
//! sets take effect.

use std::{
    fmt,
    str::FromStr,
    time::{Duration, SystemTime},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a cache may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheUsage {
    /// Read from and write to the cache.
    ReadWrite,
    /// Read from the cache but never store new records.
    ReadOnly,
    /// The cache is the only source of data; misses are failures.
    CacheOnly,
    /// Neither read from nor write to the cache.
    NoCache,
}

impl CacheUsage {
    /// The serialized name of this usage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CacheUsage::ReadWrite => "read-write",
            CacheUsage::ReadOnly => "read-only",
            CacheUsage::CacheOnly => "cache-only",
            CacheUsage::NoCache => "no-cache",
        }
    }
}

impl fmt::Display for CacheUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read-write" => Ok(CacheUsage::ReadWrite),
            "read-only" => Ok(CacheUsage::ReadOnly),
            "cache-only" => Ok(CacheUsage::CacheOnly),
            "no-cache" => Ok(CacheUsage::NoCache),
            other => Err(Error::Configuration {
                context: "cache usage",
                detail: format!("unrecognized value '{other}'"),
            }),
        }
    }
}

/// Cache usage mode plus freshness limits.
///
/// Every field is optional so that policies can be overlaid. An unset usage
/// behaves as [`CacheUsage::ReadWrite`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// How the cache may be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CacheUsage>,
    /// Oldest acceptable age of a record, relative to now.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "secs")]
    pub max_age: Option<Duration>,
    /// Absolute oldest acceptable timestamp. Takes precedence over `max_age`.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "unix_secs")]
    pub min_time: Option<SystemTime>,
}

impl CachePolicy {
    /// Read from and write to the cache.
    pub const DEFAULT: CachePolicy = CachePolicy::from_usage(CacheUsage::ReadWrite);
    /// Never use the cache.
    pub const NO_CACHE: CachePolicy = CachePolicy::from_usage(CacheUsage::NoCache);
    /// Only use the cache.
    pub const CACHE_ONLY: CachePolicy = CachePolicy::from_usage(CacheUsage::CacheOnly);

    /// A policy with only a usage mode set.
    #[must_use]
    pub const fn from_usage(usage: CacheUsage) -> Self {
        Self {
            usage: Some(usage),
            max_age: None,
            min_time: None,
        }
    }

    /// Parse a policy from JSON. Unrecognized usage values are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the policy to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Overlay every field `other` sets onto this policy.
    pub fn merge_and_override(&mut self, other: &CachePolicy) {
        if other.usage.is_some() {
            self.usage = other.usage;
        }
        if other.min_time.is_some() {
            self.min_time = other.min_time;
        }
        if other.max_age.is_some() {
            self.max_age = other.max_age;
        }
    }

    /// By-value form of [`merge_and_override`](Self::merge_and_override).
    #[must_use]
    pub fn merged(mut self, other: &CachePolicy) -> Self {
        self.merge_and_override(other);
        self
    }

    /// The usage in effect.
    #[must_use]
    pub fn effective_usage(&self) -> CacheUsage {
        self.usage.unwrap_or(CacheUsage::ReadWrite)
    }

    /// The oldest timestamp for which a record is still acceptable.
    #[must_use]
    pub fn min_accept_time(&self, now: SystemTime) -> SystemTime {
        match (self.min_time, self.max_age) {
            (Some(min_time), _) => min_time,
            (None, Some(max_age)) => now
                .checked_sub(max_age)
                .map_or(SystemTime::UNIX_EPOCH, |t| t.max(SystemTime::UNIX_EPOCH)),
            (None, None) => SystemTime::UNIX_EPOCH,
        }
    }

    /// Whether a record last modified at `last_modified` is expired now.
    #[must_use]
    pub fn is_expired(&self, last_modified: SystemTime) -> bool {
        self.is_expired_at(last_modified, SystemTime::now())
    }

    /// Whether a record last modified at `last_modified` is expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, last_modified: SystemTime, now: SystemTime) -> bool {
        last_modified < self.min_accept_time(now)
    }

    /// Whether the cache is used at all.
    #[must_use]
    pub fn is_cache_enabled(&self) -> bool {
        self.is_cache_readable() || self.is_cache_writeable()
    }

    /// Whether the cache is not used at all.
    #[must_use]
    pub fn is_cache_disabled(&self) -> bool {
        !self.is_cache_enabled()
    }

    /// Whether cached records may be returned.
    #[must_use]
    pub fn is_cache_readable(&self) -> bool {
        matches!(
            self.effective_usage(),
            CacheUsage::ReadWrite | CacheUsage::CacheOnly | CacheUsage::ReadOnly
        )
    }

    /// Whether fetched records may be stored.
    #[must_use]
    pub fn is_cache_writeable(&self) -> bool {
        self.effective_usage() == CacheUsage::ReadWrite
    }

    /// Whether the cache is the only permitted source.
    #[must_use]
    pub fn is_cache_only(&self) -> bool {
        self.effective_usage() == CacheUsage::CacheOnly
    }

    /// Readable name of the usage, `"unknown"` when unset.
    #[must_use]
    pub fn usage_string(&self) -> &'static str {
        self.usage.map_or("unknown", CacheUsage::as_str)
    }
}

/// `Option<Duration>` as fractional seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}

/// `Option<SystemTime>` as whole seconds since the Unix epoch.
mod unix_secs {
    use std::time::{Duration, SystemTime};

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<SystemTime>, s: S) -> Result<S::Ok, S::Error> {
        let Some(time) = value else {
            return s.serialize_none();
        };
        let secs = match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_secs()).map_or(i64::MIN, |s| -s),
        };
        s.serialize_some(&secs)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<SystemTime>, D::Error> {
        let Some(secs) = Option::<i64>::deserialize(d)? else {
            return Ok(None);
        };
        let offset = Duration::from_secs(secs.unsigned_abs());
        let time = if secs >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(offset)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(offset)
        };
        time.map(Some)
            .ok_or_else(|| D::Error::custom(format!("timestamp {secs} out of range")))
    }
}
