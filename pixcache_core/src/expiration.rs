//! Time-to-live policies for cache items

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// How long a cache item stays fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiration {
    /// Never expires
    Never,
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
    /// Expires once this instant has passed, whatever the basis
    At(DateTime<Utc>),
    /// Already stale
    Expired,
}

/// Which timestamp of an item an [`Expiration`] is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationBasis {
    CreationTime,
    LastAccessTime,
}

impl Expiration {
    /// Fixed lifetime measured from a basis timestamp.
    ///
    /// `None` for variants that are not relative to a basis.
    pub fn lifetime(&self) -> Option<TimeDelta> {
        let seconds = match *self {
            Self::Seconds(s) => s,
            Self::Minutes(m) => m.saturating_mul(60),
            Self::Hours(h) => h.saturating_mul(60 * 60),
            Self::Days(d) => d.saturating_mul(24 * 60 * 60),
            Self::Never | Self::At(_) | Self::Expired => return None,
        };
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        Some(TimeDelta::try_seconds(seconds).unwrap_or(TimeDelta::MAX))
    }

    /// Instant at which an item stamped at `basis` becomes stale.
    ///
    /// `None` means the item never expires.
    pub fn expires_at(&self, basis: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::Expired => Some(DateTime::<Utc>::MIN_UTC),
            Self::At(instant) => Some(*instant),
            _ => {
                let lifetime = self.lifetime()?;
                // Overflowing the calendar is as good as never.
                basis.checked_add_signed(lifetime)
            }
        }
    }
}
