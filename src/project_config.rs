// SPDX-License-Identifier: MPL-2.0

//! Module dealing with the configuration of a restore: the project
//! requesting packages, and the resolver performing the requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;
use thiserror::Error;

use crate::framework::Framework;
use crate::identity::PackageRequest;
use crate::registration::RegistrationSource;
use crate::solver::VersionStrategy;
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Registrations of nuget.org, with SemVer 2.0.0 packages.
pub const NUGET_ORG_REGISTRATION: &str = "https://api.nuget.org/v3/registration5-gz-semver2/";

/// A restore request: the direct dependencies of a project and the framework it targets.
///
/// ```json
/// {
///   "framework": "net6.0",
///   "dependencies": {
///     "Newtonsoft.Json": "[13.0.1, )",
///     "Serilog": "2.12.0"
///   },
///   "allowedVersions": {
///     "System.Text.Json": "(, 8.0.0)"
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Target framework of the project.
    pub framework: Framework,
    /// Direct dependencies, by package id.
    pub dependencies: Map<String, VersionRange>,
    /// Restrictions on the versions of any package of the graph, by package id.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub allowed_versions: Map<String, VersionRange>,
    /// Overrides the resolver setting when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_prerelease: Option<bool>,
}

/// Packages selected for a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependencies {
    /// Versions of the packages the project asked for.
    pub direct: Map<String, NuGetVersion>,
    /// Versions of the packages needed by other packages.
    pub indirect: Map<String, NuGetVersion>,
}

/// Settings of a [Resolver](crate::solver::Resolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResolverConfig {
    /// Registration sources, queried in order.
    pub sources: Vec<RegistrationSource>,
    /// Maximum number of documents fetched at the same time.
    pub max_concurrent_requests: usize,
    /// Whether prerelease versions may be picked without being asked for explicitly.
    pub include_prerelease: bool,
    /// Which versions are tried first when selecting packages.
    pub version_strategy: VersionStrategy,
}

/// Invalid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not a valid configuration.
    #[error("Invalid configuration")]
    Json(#[from] serde_json::Error),
    /// Requests could never be sent.
    #[error("maxConcurrentRequests must be at least 1")]
    InvalidConcurrency,
    /// Nothing to fetch registrations from.
    #[error("At least one registration source is required")]
    NoSource,
}

impl ProjectConfig {
    /// Decode a restore request.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    /// The direct dependencies as package requests.
    pub fn requests(&self) -> Vec<PackageRequest> {
        self.dependencies
            .iter()
            .map(|(id, range)| PackageRequest::new(id.clone(), range.clone()))
            .collect()
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            sources: vec![RegistrationSource::new(NUGET_ORG_REGISTRATION)],
            max_concurrent_requests: 16,
            include_prerelease: false,
            version_strategy: VersionStrategy::Newest,
        }
    }
}

impl ResolverConfig {
    /// Decode and validate resolver settings, missing fields take their default value.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the settings can be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSource);
        }
        Ok(())
    }
}
