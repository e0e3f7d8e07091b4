//! Byte-count value type used for capacities and item costs

use serde::{Deserialize, Serialize};
use std::fmt;

/// A byte count.
///
/// Magnitudes are base-2. [`DataSize::UNBOUNDED`] is the largest
/// representable value, so every ordinary size compares below it.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSize(u64);

impl DataSize {
    pub const ZERO: Self = Self(0);
    pub const UNBOUNDED: Self = Self(u64::MAX);

    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    pub const fn bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub fn from_len(len: usize) -> Self {
        Self(u64::try_from(len).unwrap_or(u64::MAX))
    }

    pub const fn kib(kib: u64) -> Self {
        Self(kib.saturating_mul(Self::KIB))
    }

    pub const fn mib(mib: u64) -> Self {
        Self(mib.saturating_mul(Self::MIB))
    }

    pub const fn gib(gib: u64) -> Self {
        Self(gib.saturating_mul(Self::GIB))
    }

    /// `None` means unbounded.
    pub fn from_limit(limit: Option<u64>) -> Self {
        limit.map_or(Self::UNBOUNDED, Self)
    }

    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    pub const fn is_unbounded(self) -> bool {
        self.0 == u64::MAX
    }

    pub fn as_kib(self) -> f64 {
        self.scaled(Self::KIB)
    }

    pub fn as_mib(self) -> f64 {
        self.scaled(Self::MIB)
    }

    pub fn as_gib(self) -> f64 {
        self.scaled(Self::GIB)
    }

    fn scaled(self, unit: u64) -> f64 {
        if self.is_unbounded() {
            f64::INFINITY
        } else {
            self.0 as f64 / unit as f64
        }
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Debug for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "unbounded")
        } else {
            write!(f, "{} bytes", self.0)
        }
    }
}

impl fmt::Display for DataSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            return write!(f, "unbounded");
        }
        let bytes = self.0;
        if bytes >= Self::GIB {
            write!(f, "{:.2} GiB", self.as_gib())
        } else if bytes >= Self::MIB {
            write!(f, "{:.1} MiB", self.as_mib())
        } else if bytes >= Self::KIB {
            write!(f, "{:.1} KiB", self.as_kib())
        } else {
            write!(f, "{bytes} B")
        }
    }
}
