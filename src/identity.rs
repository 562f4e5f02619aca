// SPDX-License-Identifier: MPL-2.0

//! Module defining the base types identifying a package and a package version.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

use crate::version::{NuGetVersion, VersionParseError};
use crate::version_range::VersionRange;

/// A unique package version: an id and a version.
///
/// Ids are compared case-insensitively, versions on their normalized value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// Package id, as spelled by the feed.
    pub id: String,
    /// Package version.
    pub version: NuGetVersion,
}

/// A package id together with the range of versions asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Package id.
    pub id: String,
    /// Accepted versions.
    pub range: VersionRange,
}

/// Error creating [PackageIdentity] from [String].
#[derive(Error, Debug, PartialEq)]
pub enum IdentityParseError {
    /// Identity must have the shape "Id@version".
    #[error("Invalid package \"{full_identity}\": expected the shape \"Id@version\"")]
    MissingSeparator {
        /// Identity that was being parsed.
        full_identity: String,
    },
    /// Invalid version.
    #[error("Invalid version in package identity")]
    InvalidVersion(#[from] VersionParseError),
}

impl PackageIdentity {
    /// Build an identity from anything convertible into an id and a version.
    pub fn new<S: Into<String>, V: Into<NuGetVersion>>(id: S, version: V) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Lowercase id, the key under which the package is known during resolution.
    pub fn key(&self) -> String {
        package_key(&self.id)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, version) = s
            .split_once('@')
            .filter(|(id, _)| !id.is_empty())
            .ok_or_else(|| IdentityParseError::MissingSeparator {
                full_identity: s.to_string(),
            })?;
        Ok(Self {
            id: id.to_string(),
            version: version.parse()?,
        })
    }
}

impl PackageRequest {
    /// Request for the versions of `id` inside `range`.
    pub fn new<S: Into<String>>(id: S, range: VersionRange) -> Self {
        Self {
            id: id.into(),
            range,
        }
    }

    /// Lowercase id, see [PackageIdentity::key].
    pub fn key(&self) -> String {
        package_key(&self.id)
    }
}

/// A package identity requests exactly its own version.
impl From<PackageIdentity> for PackageRequest {
    fn from(identity: PackageIdentity) -> Self {
        Self {
            range: VersionRange::exact(identity.version),
            id: identity.id,
        }
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.range)
    }
}

/// Package ids are case-insensitive, every map keyed by id uses this.
pub fn package_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_equality_ignores_id_case() {
        let a: PackageIdentity = "Newtonsoft.Json@13.0.1".parse().unwrap();
        let b = PackageIdentity::new("newtonsoft.json", (13, 0, 1));
        assert_eq!(a, b);
        assert_eq!(a.key(), "newtonsoft.json");
        assert_eq!(a.to_string(), "Newtonsoft.Json@13.0.1");
    }

    #[test]
    fn identity_parse_errors() {
        assert!(matches!(
            "Newtonsoft.Json".parse::<PackageIdentity>(),
            Err(IdentityParseError::MissingSeparator { .. })
        ));
        assert!(matches!(
            "@1.0".parse::<PackageIdentity>(),
            Err(IdentityParseError::MissingSeparator { .. })
        ));
        assert!(matches!(
            "A@x".parse::<PackageIdentity>(),
            Err(IdentityParseError::InvalidVersion(_))
        ));
    }

    #[test]
    fn identity_requests_its_exact_version() {
        let request = PackageRequest::from(PackageIdentity::new("A", (1, 2, 0)));
        assert!(request.range.satisfies(&NuGetVersion::new(1, 2, 0)));
        assert!(!request.range.satisfies(&NuGetVersion::new(1, 2, 1)));
    }
}
