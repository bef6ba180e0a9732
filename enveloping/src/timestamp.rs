//! Block timestamps and request deadlines.
//!
//! Relay and deploy requests carry a `validUntilTime` deadline in seconds
//! since the Unix epoch, where zero means "no deadline". The ledger clock
//! uses the same unit, so both are a [`UnixTimestamp`].

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds since the Unix epoch.
///
/// Serialized as a decimal string so 64-bit values survive JSON clients;
/// plain integers are accepted when deserializing.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnixTimestamp(u64);

impl UnixTimestamp {
    /// Timestamp at `secs` seconds past the epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time. A clock set before the epoch reads as zero.
    #[must_use]
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self(elapsed.as_secs())
    }

    /// Raw seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    /// This time moved forward by `secs`, saturating at `u64::MAX`.
    #[must_use]
    pub const fn after(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Whether a request deadline has passed at this time.
    ///
    /// A zero deadline never expires. Otherwise the request is valid strictly
    /// before `valid_until`.
    #[must_use]
    pub const fn is_past(&self, valid_until: u64) -> bool {
        valid_until != 0 && self.0 >= valid_until
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

struct SecondsVisitor;

impl Visitor<'_> for SecondsVisitor {
    type Value = UnixTimestamp;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("seconds since the Unix epoch")
    }

    fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Self::Value, E> {
        Ok(UnixTimestamp(secs))
    }

    fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Self::Value, E> {
        u64::try_from(secs)
            .map(UnixTimestamp)
            .map_err(|_| E::custom("timestamp must be a non-negative integer"))
    }

    fn visit_str<E: de::Error>(self, secs: &str) -> Result<Self::Value, E> {
        secs.parse::<u64>()
            .map(UnixTimestamp)
            .map_err(|_| E::custom("timestamp must be a non-negative integer"))
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SecondsVisitor)
    }
}
