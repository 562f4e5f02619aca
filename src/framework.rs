// SPDX-License-Identifier: MPL-2.0

//! Target frameworks and the reduction of dependency groups
//! to the one nearest to the framework of a project.
//!
//! Only the part of the framework compatibility model needed to pick
//! a dependency group lives here:
//! frameworks of the same family are compatible with older versions of themselves,
//! modern .NET Framework and .NET Core versions can consume .NET Standard,
//! and the "any" framework is compatible with everything.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of the .NET Framework family.
pub const NET_FRAMEWORK: &str = ".NETFramework";
/// Identifier of the .NET Standard family.
pub const NET_STANDARD: &str = ".NETStandard";
/// Identifier of the .NET Core family, which includes net5.0 and later.
pub const NET_CORE_APP: &str = ".NETCoreApp";

/// A target framework such as `net472` or `netstandard2.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Framework {
    identifier: String,
    version: [u32; 4],
}

/// Error creating [Framework] from [String].
#[derive(Error, Debug, PartialEq)]
pub enum FrameworkParseError {
    /// A framework name starts with its identifier.
    #[error("Invalid framework \"{full_framework}\": missing framework identifier")]
    MissingIdentifier {
        /// Framework that was being parsed.
        full_framework: String,
    },
    /// The version must be dot separated numbers, at most four of them.
    #[error("Invalid framework \"{full_framework}\": bad version \"{version}\"")]
    InvalidVersion {
        /// Framework that was being parsed.
        full_framework: String,
        /// The faulty version.
        version: String,
    },
}

impl Framework {
    /// Framework with an identifier such as [NET_STANDARD] and a version.
    pub fn new<S: Into<String>>(identifier: S, version: [u32; 4]) -> Self {
        Self {
            identifier: identifier.into(),
            version,
        }
    }

    /// The framework of dependency groups that do not declare one.
    pub fn any() -> Self {
        Self::new("Any", [0; 4])
    }

    /// Whether this is the framework of groups without target framework.
    pub fn is_any(&self) -> bool {
        self.identifier == "Any"
    }

    /// Family identifier, e.g. `.NETFramework`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Framework version, padded with zeros.
    pub fn version(&self) -> [u32; 4] {
        self.version
    }

    fn is_family(&self, identifier: &str) -> bool {
        self.identifier.eq_ignore_ascii_case(identifier)
    }

    fn at_least(&self, version: [u32; 4]) -> bool {
        self.version >= version
    }

    /// Highest .NET Standard version a project targeting this framework can consume.
    fn max_net_standard(&self) -> Option<[u32; 4]> {
        if self.is_family(NET_FRAMEWORK) {
            [
                ([4, 6, 1, 0], [2, 0, 0, 0]),
                ([4, 6, 0, 0], [1, 3, 0, 0]),
                ([4, 5, 1, 0], [1, 2, 0, 0]),
                ([4, 5, 0, 0], [1, 1, 0, 0]),
            ]
            .iter()
            .find(|(min_framework, _)| self.at_least(*min_framework))
            .map(|(_, standard)| *standard)
        } else if self.is_family(NET_CORE_APP) {
            if self.at_least([3, 0, 0, 0]) {
                Some([2, 1, 0, 0])
            } else if self.at_least([2, 0, 0, 0]) {
                Some([2, 0, 0, 0])
            } else {
                Some([1, 6, 0, 0])
            }
        } else if self.is_family(NET_STANDARD) {
            Some(self.version)
        } else {
            None
        }
    }

    /// Whether a project targeting `self` can use assets built for `candidate`.
    pub fn is_compatible_with(&self, candidate: &Framework) -> bool {
        if candidate.is_any() {
            return true;
        }
        if self.is_family(&candidate.identifier) {
            return candidate.version <= self.version;
        }
        candidate.is_family(NET_STANDARD)
            && self
                .max_net_standard()
                .map_or(false, |max| candidate.version <= max)
    }
}

// Reduction ###################################################################

/// Pick, among the frameworks of a package's dependency groups,
/// the one that applies to a project target framework.
pub trait FrameworkReducer: Send + Sync {
    /// The nearest compatible candidate, or `None` if none is compatible.
    fn nearest(&self, target: &Framework, candidates: &[Framework]) -> Option<Framework>;
}

/// Exact match first, then the same family with the highest version not above
/// the target, then the highest compatible .NET Standard, then "any".
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFrameworkReducer;

impl FrameworkReducer for DefaultFrameworkReducer {
    fn nearest(&self, target: &Framework, candidates: &[Framework]) -> Option<Framework> {
        if let Some(exact) = candidates.iter().find(|c| *c == target) {
            return Some(exact.clone());
        }
        let precedence = |candidate: &Framework| {
            let tier = if candidate.is_any() {
                0
            } else if target.is_family(&candidate.identifier) {
                2
            } else {
                1
            };
            (tier, candidate.version)
        };
        candidates
            .iter()
            .filter(|candidate| target.is_compatible_with(candidate))
            .max_by_key(|candidate| precedence(candidate))
            .cloned()
    }
}

// Parsing and printing ########################################################

impl FromStr for Framework {
    type Err = FrameworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::any());
        }

        // Long form: ".NETStandard,Version=v2.0"
        if let Some((identifier, version)) = trimmed.split_once(',') {
            let version = version.trim();
            let version = version
                .strip_prefix("Version=")
                .map(|v| v.trim_start_matches(|c| c == 'v' || c == 'V'))
                .ok_or_else(|| FrameworkParseError::InvalidVersion {
                    full_framework: s.to_string(),
                    version: version.to_string(),
                })?;
            let version = parse_version(version, true, s)?;
            return Ok(Self::new(canonical_identifier(identifier.trim(), version), version));
        }

        // Short form, "net8.0-windows" targets net8.0.
        let name = trimmed.split('-').next().unwrap_or(trimmed);
        let digits_start = name
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(name.len());
        let (identifier, version) = name.split_at(digits_start);
        if identifier.is_empty() {
            return Err(FrameworkParseError::MissingIdentifier {
                full_framework: s.to_string(),
            });
        }
        let version = parse_version(version, version.contains('.'), s)?;
        Ok(Self::new(canonical_identifier(identifier, version), version))
    }
}

/// Dotted versions are split on dots, compact ones ("472") have one digit per part.
fn parse_version(version: &str, dotted: bool, full: &str) -> Result<[u32; 4], FrameworkParseError> {
    let invalid = || FrameworkParseError::InvalidVersion {
        full_framework: full.to_string(),
        version: version.to_string(),
    };
    let numbers: Vec<u32> = if version.is_empty() {
        Vec::new()
    } else if dotted {
        version
            .split('.')
            .map(|n| n.parse().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?
    } else {
        version
            .chars()
            .map(|c| c.to_digit(10).ok_or_else(invalid))
            .collect::<Result<_, _>>()?
    };
    if numbers.len() > 4 {
        return Err(invalid());
    }
    let mut parts = [0u32; 4];
    parts.iter_mut().zip(numbers).for_each(|(part, n)| *part = n);
    Ok(parts)
}

fn canonical_identifier(identifier: &str, version: [u32; 4]) -> String {
    match identifier.to_ascii_lowercase().as_str() {
        "net" if version[0] >= 5 => NET_CORE_APP.to_string(),
        "net" | "netframework" | ".netframework" => NET_FRAMEWORK.to_string(),
        "netstandard" | ".netstandard" => NET_STANDARD.to_string(),
        "netcoreapp" | ".netcoreapp" => NET_CORE_APP.to_string(),
        _ => identifier.to_string(),
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("any");
        }
        let [major, minor, build, revision] = self.version;
        write!(f, "{},Version=v{}.{}", self.identifier, major, minor)?;
        if build > 0 || revision > 0 {
            write!(f, ".{}", build)?;
        }
        if revision > 0 {
            write!(f, ".{}", revision)?;
        }
        Ok(())
    }
}

impl Serialize for Framework {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

impl<'de> Deserialize<'de> for Framework {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw(s: &str) -> Framework {
        s.parse().unwrap()
    }

    #[test]
    fn short_and_long_names() {
        assert_eq!(fw("net472"), Framework::new(NET_FRAMEWORK, [4, 7, 2, 0]));
        assert_eq!(fw(".NETFramework4.7.2"), fw("net472"));
        assert_eq!(fw("netstandard2.0"), fw(".NETStandard,Version=v2.0"));
        assert_eq!(fw("net6.0"), fw("netcoreapp6.0"));
        assert_eq!(fw("net8.0-windows"), fw("net8.0"));
        assert_eq!(fw(""), Framework::any());
        assert_eq!(fw("netstandard2.0").to_string(), ".NETStandard,Version=v2.0");
        assert!("4.5".parse::<Framework>().is_err());
    }

    #[test]
    fn nearest_prefers_exact_then_family_then_standard_then_any() {
        let reducer = DefaultFrameworkReducer;
        let groups = vec![
            Framework::any(),
            fw("netstandard1.3"),
            fw("netstandard2.0"),
            fw("net45"),
            fw("net472"),
        ];
        assert_eq!(reducer.nearest(&fw("net472"), &groups), Some(fw("net472")));
        assert_eq!(reducer.nearest(&fw("net48"), &groups), Some(fw("net472")));
        assert_eq!(reducer.nearest(&fw("net46"), &groups), Some(fw("net45")));
        assert_eq!(reducer.nearest(&fw("net6.0"), &groups), Some(fw("netstandard2.0")));
        assert_eq!(reducer.nearest(&fw("netcoreapp1.1"), &groups), Some(fw("netstandard1.3")));
        assert_eq!(reducer.nearest(&fw("uap10.0"), &groups), Some(Framework::any()));
    }

    #[test]
    fn no_compatible_group() {
        let reducer = DefaultFrameworkReducer;
        let groups = vec![fw("net6.0")];
        assert_eq!(reducer.nearest(&fw("net472"), &groups), None);
        assert_eq!(reducer.nearest(&fw("net472"), &[]), None);
    }
}
