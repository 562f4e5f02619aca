// SPDX-License-Identifier: MPL-2.0

//! Module defining the version type used by NuGet feeds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// A NuGet package version.
///
/// It is a semantic version with an optional fourth "revision" number,
/// optional dot separated prerelease labels and optional build metadata.
/// Build metadata is kept for display but never takes part in comparisons.
#[derive(Debug, Clone)]
pub struct NuGetVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    release_labels: Vec<String>,
    metadata: Option<String>,
}

/// Error creating [NuGetVersion] from [String].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    /// A version has between one and four numeric parts.
    #[error("Invalid version \"{full_version}\": expected between 1 and 4 numeric parts")]
    InvalidPartCount {
        /// Version that was being parsed.
        full_version: String,
    },
    /// Numeric parts only contain ascii digits.
    #[error("Invalid version \"{full_version}\": \"{part}\" is not a valid number")]
    InvalidNumber {
        /// Version that was being parsed.
        full_version: String,
        /// The faulty numeric part.
        part: String,
    },
    /// Labels and metadata are non empty and made of `[0-9A-Za-z-]`.
    #[error("Invalid version \"{full_version}\": malformed label \"{label}\"")]
    InvalidLabel {
        /// Version that was being parsed.
        full_version: String,
        /// The faulty label.
        label: String,
    },
}

impl NuGetVersion {
    /// Create a stable version with a zero revision.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision: 0,
            release_labels: Vec::new(),
            metadata: None,
        }
    }

    /// Version 0.0.0
    pub fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Replace the revision (fourth) number.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Replace the prerelease labels.
    pub fn with_release_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.release_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Major number.
    pub fn major(&self) -> u64 {
        self.major
    }

    /// Minor number.
    pub fn minor(&self) -> u64 {
        self.minor
    }

    /// Patch number.
    pub fn patch(&self) -> u64 {
        self.patch
    }

    /// Revision number, 0 for most versions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Prerelease labels, in order.
    pub fn release_labels(&self) -> &[String] {
        &self.release_labels
    }

    /// Build metadata, if any.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// A version is a prerelease when it carries at least one label.
    pub fn is_prerelease(&self) -> bool {
        !self.release_labels.is_empty()
    }

    /// Smallest version strictly greater than this one.
    ///
    /// A stable version moves to the first prerelease of the next revision,
    /// a prerelease gets an extra `0` label appended.
    pub fn bump(&self) -> Self {
        if self.is_prerelease() {
            let mut next = self.clone();
            next.metadata = None;
            next.release_labels.push("0".to_string());
            next
        } else {
            Self::new(self.major, self.minor, self.patch)
                .with_revision(self.revision + 1)
                .with_release_labels(["0"])
        }
    }
}

impl From<(u64, u64, u64)> for NuGetVersion {
    fn from((major, minor, patch): (u64, u64, u64)) -> Self {
        Self::new(major, minor, patch)
    }
}

// Comparison ##################################################################

impl Ord for NuGetVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.revision)
            .cmp(&(other.major, other.minor, other.patch, other.revision))
            .then_with(|| compare_release_labels(&self.release_labels, &other.release_labels))
    }
}

impl PartialOrd for NuGetVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NuGetVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NuGetVersion {}

impl Hash for NuGetVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.major, self.minor, self.patch, self.revision).hash(state);
        for label in &self.release_labels {
            match numeric_label(label) {
                Some(n) => n.hash(state),
                None => label.to_ascii_lowercase().hash(state),
            }
        }
    }
}

/// A stable version (no label) sorts after all its prereleases.
fn compare_release_labels(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_label(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
    }
}

fn compare_label(a: &str, b: &str) -> Ordering {
    match (numeric_label(a), numeric_label(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

fn numeric_label(label: &str) -> Option<u64> {
    if label.bytes().all(|b| b.is_ascii_digit()) {
        label.parse().ok()
    } else {
        None
    }
}

// Parsing and printing ########################################################

impl FromStr for NuGetVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, metadata) = match s.split_once('+') {
            Some((rest, meta)) => {
                parse_labels(meta, s)?;
                (rest, Some(meta.to_string()))
            }
            None => (s, None),
        };
        let (numbers, labels) = match rest.split_once('-') {
            Some((numbers, labels)) => (numbers, parse_labels(labels, s)?),
            None => (rest, Vec::new()),
        };

        let parts: Vec<&str> = numbers.split('.').collect();
        if parts.len() > 4 {
            return Err(VersionParseError::InvalidPartCount {
                full_version: s.to_string(),
            });
        }
        let mut values = [0u64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            let invalid_number = || VersionParseError::InvalidNumber {
                full_version: s.to_string(),
                part: part.to_string(),
            };
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid_number());
            }
            *value = part.parse().map_err(|_| invalid_number())?;
        }
        let [major, minor, patch, revision] = values;
        Ok(Self {
            major,
            minor,
            patch,
            revision,
            release_labels: labels,
            metadata,
        })
    }
}

fn parse_labels(labels: &str, full_version: &str) -> Result<Vec<String>, VersionParseError> {
    labels
        .split('.')
        .map(|label| {
            let valid = !label.is_empty()
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-');
            if valid {
                Ok(label.to_string())
            } else {
                Err(VersionParseError::InvalidLabel {
                    full_version: full_version.to_string(),
                    label: label.to_string(),
                })
            }
        })
        .collect()
}

impl fmt::Display for NuGetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.revision > 0 {
            write!(f, ".{}", self.revision)?;
        }
        if self.is_prerelease() {
            write!(f, "-{}", self.release_labels.join("."))?;
        }
        if let Some(metadata) = &self.metadata {
            write!(f, "+{}", metadata)?;
        }
        Ok(())
    }
}

impl Serialize for NuGetVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for NuGetVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}
