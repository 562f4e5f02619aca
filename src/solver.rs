// SPDX-License-Identifier: MPL-2.0

//! Module providing the resolver: gathering of the dependency graph of a project,
//! trimming with its allowed versions, and selection of one version per package.

use log::{debug, info};
use pubgrub::error::PubGrubError;
use pubgrub::report::{DefaultStringReporter, Reporter};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::dependency_provider::{GraphDependencyProvider, ProjectAdapter, SolverPackage};
use crate::feed::JsonFetcher;
use crate::framework::{DefaultFrameworkReducer, Framework, FrameworkReducer};
use crate::gather::GraphBuilder;
use crate::graph::DependencyGraph;
use crate::identity::{package_key, PackageRequest};
use crate::project_config::{ConfigError, ProjectConfig, ResolvedDependencies, ResolverConfig};
use crate::registration::{RegistrationError, RegistrationFetcher, RegistrationSource};
use crate::trim::{prune_unsatisfiable, trim_by_allowed_versions};
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Which versions to try first when selecting packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Highest versions first.
    Newest,
    /// Lowest applicable versions first.
    Oldest,
}

impl Default for VersionStrategy {
    fn default() -> Self {
        VersionStrategy::Newest
    }
}

/// Failure of a restore.
#[derive(Error, Debug)]
pub enum SolveError {
    /// The registrations could not be gathered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    /// No set of versions satisfies every constraint.
    #[error("No solution:\n{0}")]
    NoSolution(String),
    /// The solver itself failed.
    #[error("Dependency resolution failed: {0}")]
    Failure(String),
}

impl From<PubGrubError<SolverPackage, NuGetVersion>> for SolveError {
    fn from(err: PubGrubError<SolverPackage, NuGetVersion>) -> Self {
        match err {
            PubGrubError::NoSolution(mut tree) => {
                tree.collapse_no_versions();
                SolveError::NoSolution(DefaultStringReporter::report(&tree))
            }
            err => SolveError::Failure(err.to_string()),
        }
    }
}

/// Resolves the dependencies of projects against registration sources.
pub struct Resolver<F, R = DefaultFrameworkReducer> {
    fetcher: RegistrationFetcher<F>,
    sources: Vec<RegistrationSource>,
    reducer: R,
    include_prerelease: bool,
    strategy: VersionStrategy,
}

impl<F: JsonFetcher> Resolver<F> {
    /// Resolver fetching documents through `feed`.
    pub fn new(feed: F, config: &ResolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher: RegistrationFetcher::new(feed, config.max_concurrent_requests, CancellationToken::new()),
            sources: config.sources.clone(),
            reducer: DefaultFrameworkReducer,
            include_prerelease: config.include_prerelease,
            strategy: config.version_strategy,
        })
    }
}

impl<F: JsonFetcher, R: FrameworkReducer> Resolver<F, R> {
    /// Use another framework compatibility model.
    pub fn with_reducer<R2: FrameworkReducer>(self, reducer: R2) -> Resolver<F, R2> {
        Resolver {
            fetcher: self.fetcher,
            sources: self.sources,
            reducer,
            include_prerelease: self.include_prerelease,
            strategy: self.strategy,
        }
    }

    /// Cancelling this token makes every running and future operation
    /// of this resolver fail with [RegistrationError::Cancelled].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.fetcher.cancellation_token().clone()
    }

    /// The feed documents are fetched from.
    pub fn feed(&self) -> &F {
        self.fetcher.feed()
    }

    /// Gather the dependency graph of the requests, without any trimming.
    pub async fn gather(
        &self,
        requests: &[PackageRequest],
        target_framework: &Framework,
        include_prerelease: bool,
    ) -> Result<DependencyGraph, RegistrationError> {
        GraphBuilder::new(
            &self.fetcher,
            &self.sources,
            &self.reducer,
            target_framework,
            include_prerelease,
        )
        .build(requests)
        .await
    }

    /// Gather the dependency graph of the requests, then remove the versions
    /// that are not allowed and those that can no longer be satisfied.
    pub async fn resolve_dependency_graph(
        &self,
        requests: &[PackageRequest],
        target_framework: &Framework,
        include_prerelease: bool,
        allowed_versions: &Map<String, VersionRange>,
    ) -> Result<DependencyGraph, RegistrationError> {
        let mut graph = self.gather(requests, target_framework, include_prerelease).await?;
        let mut removed = prune_unsatisfiable(&mut graph);
        removed += trim_by_allowed_versions(&mut graph, allowed_versions);
        debug!("Trimming removed {} versions", removed);
        Ok(graph)
    }

    /// Select one version per package of the graph, satisfying every request.
    pub fn solve(&self, graph: &DependencyGraph, requests: &[PackageRequest]) -> Result<ResolvedDependencies, SolveError> {
        let graph_provider = GraphDependencyProvider::new(graph, self.strategy);
        let project_provider = ProjectAdapter::new(requests, &graph_provider);

        // Solve dependencies and remove the root from the solution.
        let mut solution = pubgrub::solver::resolve(&project_provider, SolverPackage::Root, NuGetVersion::zero())?;
        solution.remove(&SolverPackage::Root);

        // Split solution into direct and indirect dependencies.
        let direct_keys: FxHashSet<String> = requests.iter().map(PackageRequest::key).collect();
        let mut resolved = ResolvedDependencies {
            direct: Map::new(),
            indirect: Map::new(),
        };
        for (package, version) in solution {
            if let SolverPackage::Package(id) = package {
                if direct_keys.contains(&package_key(&id)) {
                    resolved.direct.insert(id, version);
                } else {
                    resolved.indirect.insert(id, version);
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve the dependencies of a project.
    pub async fn restore(&self, project: &ProjectConfig) -> Result<ResolvedDependencies, SolveError> {
        let requests = project.requests();
        let include_prerelease = project.include_prerelease.unwrap_or(self.include_prerelease);
        let graph = self
            .resolve_dependency_graph(&requests, &project.framework, include_prerelease, &project.allowed_versions)
            .await?;
        let resolved = self.solve(&graph, &requests)?;
        info!(
            "Selected {} direct and {} indirect packages",
            resolved.direct.len(),
            resolved.indirect.len()
        );
        Ok(resolved)
    }
}
