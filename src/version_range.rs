// SPDX-License-Identifier: MPL-2.0

//! Module helping with parsing and serialization of NuGet version ranges.
//!
//! A range is written in interval notation:
//!
//! ```text
//! 1.0          1.0 <= v
//! [1.0]        v == 1.0
//! (,1.0]       v <= 1.0
//! (,1.0)       v < 1.0
//! (1.0,)       1.0 < v
//! [1.0,2.0)    1.0 <= v < 2.0
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::version::{NuGetVersion, VersionParseError};

/// A contiguous interval of versions, each side optionally bounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<NuGetVersion>,
    min_inclusive: bool,
    max: Option<NuGetVersion>,
    max_inclusive: bool,
}

/// Error creating [VersionRange] from [String].
#[derive(Error, Debug, PartialEq)]
pub enum RangeParseError {
    /// Nothing to parse.
    #[error("Invalid range: empty string")]
    Empty,
    /// Interval must be delimited by brackets or parentheses with at most two bounds.
    #[error("Invalid format \"{full_range}\": expected a version or an interval like \"[1.0, 2.0)\"")]
    InvalidFormat {
        /// Range that was being parsed.
        full_range: String,
    },
    /// Floating versions such as `1.*` are not valid range bounds here.
    #[error("Invalid range \"{full_range}\": floating versions are not supported")]
    Floating {
        /// Range that was being parsed.
        full_range: String,
    },
    /// The lower bound is above the upper bound, or the interval is empty.
    #[error("Invalid range \"{full_range}\": it does not contain any version")]
    EmptyInterval {
        /// Range that was being parsed.
        full_range: String,
    },
    /// Invalid version.
    #[error("Invalid version in range")]
    InvalidVersion(#[from] VersionParseError),
}

impl VersionRange {
    /// Range with the given bounds.
    pub fn new(
        min: Option<NuGetVersion>,
        min_inclusive: bool,
        max: Option<NuGetVersion>,
        max_inclusive: bool,
    ) -> Self {
        // An unbounded side is normalized to inclusive so equal ranges compare equal.
        Self {
            min_inclusive: min_inclusive || min.is_none(),
            max_inclusive: max_inclusive || max.is_none(),
            min,
            max,
        }
    }

    /// The range of every version, prerelease or not.
    pub fn all() -> Self {
        Self::new(None, true, None, true)
    }

    /// `[v]`
    pub fn exact(version: NuGetVersion) -> Self {
        Self::new(Some(version.clone()), true, Some(version), true)
    }

    /// `[v, )`
    pub fn at_least(version: NuGetVersion) -> Self {
        Self::new(Some(version), true, None, true)
    }

    /// `[low, high]`, both ends included.
    pub fn between_inclusive(low: NuGetVersion, high: NuGetVersion) -> Self {
        Self::new(Some(low), true, Some(high), true)
    }

    /// Lower bound, `None` when unbounded.
    pub fn min_version(&self) -> Option<&NuGetVersion> {
        self.min.as_ref()
    }

    /// Upper bound, `None` when unbounded.
    pub fn max_version(&self) -> Option<&NuGetVersion> {
        self.max.as_ref()
    }

    /// Whether the lower bound itself satisfies the range.
    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    /// Whether the upper bound itself satisfies the range.
    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// The range has a finite lower bound.
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_some()
    }

    /// The range has a finite upper bound.
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_some()
    }

    /// Both sides of the interval are finite.
    pub fn has_lower_and_upper_bounds(&self) -> bool {
        self.has_lower_bound() && self.has_upper_bound()
    }

    /// Whether one of the bounds is itself a prerelease, which opts the
    /// range into prerelease versions of the package.
    pub fn includes_prerelease(&self) -> bool {
        self.min.as_ref().map_or(false, NuGetVersion::is_prerelease)
            || self.max.as_ref().map_or(false, NuGetVersion::is_prerelease)
    }

    /// Check if a version is inside the interval, respecting inclusivity.
    pub fn satisfies(&self, version: &NuGetVersion) -> bool {
        let above_min = match &self.min {
            None => true,
            Some(min) if self.min_inclusive => version >= min,
            Some(min) => version > min,
        };
        let below_max = match &self.max {
            None => true,
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
        };
        above_min && below_max
    }

    /// Whether the range selects a version when resolving dependencies.
    ///
    /// Prerelease versions also need to be allowed, either by `include_prerelease`
    /// or by a prerelease bound of the range.
    pub fn admits(&self, version: &NuGetVersion, include_prerelease: bool) -> bool {
        self.satisfies(version) && (!version.is_prerelease() || include_prerelease || self.includes_prerelease())
    }
}

impl FromStr for VersionRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RangeParseError::Empty);
        }
        let invalid_format = || RangeParseError::InvalidFormat {
            full_range: s.to_string(),
        };
        if trimmed.contains('*') {
            return Err(RangeParseError::Floating {
                full_range: s.to_string(),
            });
        }

        // A bare version is a lower inclusive bound.
        let first = trimmed.as_bytes()[0];
        if first != b'[' && first != b'(' {
            return Ok(Self::at_least(trimmed.parse()?));
        }

        let min_inclusive = first == b'[';
        let max_inclusive = match trimmed.as_bytes()[trimmed.len() - 1] {
            b']' => true,
            b')' => false,
            _ => return Err(invalid_format()),
        };
        if trimmed.len() < 2 {
            return Err(invalid_format());
        }
        let inner = &trimmed[1..trimmed.len() - 1];
        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        let (min_str, max_str) = match *parts.as_slice() {
            // (1.0.0] and [1.0.0),(1.0.0) are invalid.
            [single] if min_inclusive && max_inclusive => (single, single),
            [low, high] => (low, high),
            _ => return Err(invalid_format()),
        };
        if min_str.is_empty() && max_str.is_empty() {
            return Err(invalid_format());
        }

        let min = parse_bound(min_str)?;
        let max = parse_bound(max_str)?;
        if let (Some(low), Some(high)) = (&min, &max) {
            if low > high || (low == high && !(min_inclusive && max_inclusive)) {
                return Err(RangeParseError::EmptyInterval {
                    full_range: s.to_string(),
                });
            }
        }
        Ok(Self::new(min, min_inclusive, max, max_inclusive))
    }
}

fn parse_bound(bound: &str) -> Result<Option<NuGetVersion>, RangeParseError> {
    if bound.is_empty() {
        Ok(None)
    } else {
        Ok(Some(bound.parse()?))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(low), Some(high)) = (&self.min, &self.max) {
            if low == high && self.min_inclusive && self.max_inclusive {
                return write!(f, "[{}]", low);
            }
        }
        match &self.min {
            Some(low) if self.min_inclusive => write!(f, "[{}, ", low)?,
            Some(low) => write!(f, "({}, ", low)?,
            None => f.write_str("(, ")?,
        }
        match &self.max {
            Some(high) if self.max_inclusive => write!(f, "{}]", high),
            Some(high) => write!(f, "{})", high),
            None => f.write_str(")"),
        }
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::all()
    }
}

impl Serialize for VersionRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}
