// SPDX-License-Identifier: MPL-2.0

// # Dependency provider over a gathered graph
//
// There are two methods to implement for a dependency provider:
//   1. choose_package_version
//   2. get_dependencies
//
// Unlike a provider talking to a feed, everything needed here was already
// fetched while gathering, so both methods only read the graph arena.
//
// ## Ranges
//
// pubgrub ranges are unions of half-open intervals of versions.
// A NuGet range such as [1.0, 2.0] has an inclusive upper bound,
// which cannot be expressed with a finite version as exclusive bound
// without knowing every version in between.
// Since the graph knows every candidate version, a dependency edge is instead
// translated into the union of the exact versions of its target satisfying the edge.
// When that union is empty, the dependent version is reported as unavailable.
//
// ## Root
//
// The project itself is a synthetic root package, depending on every request.

use log::debug;
use pubgrub::range::Range;
use pubgrub::solver::{Dependencies, DependencyProvider};
use pubgrub::type_aliases::Map;
use pubgrub::version::Version;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt;

use crate::graph::{DependencyGraph, RegistrationId};
use crate::identity::PackageRequest;
use crate::solver::VersionStrategy;
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Packages seen by the solver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SolverPackage {
    /// The project being restored.
    Root,
    /// A package, by id as spelled in its registration.
    Package(String),
}

impl fmt::Display for SolverPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverPackage::Root => f.write_str("the project"),
            SolverPackage::Package(id) => f.write_str(id),
        }
    }
}

impl Version for NuGetVersion {
    fn lowest() -> Self {
        NuGetVersion::zero().with_release_labels(["0"])
    }

    fn bump(&self) -> Self {
        NuGetVersion::bump(self)
    }
}

/// Dependency provider reading a [DependencyGraph].
pub struct GraphDependencyProvider<'a> {
    graph: &'a DependencyGraph,
    strategy: VersionStrategy,
}

impl<'a> GraphDependencyProvider<'a> {
    /// Provider of the versions and dependencies stored in `graph`.
    pub fn new(graph: &'a DependencyGraph, strategy: VersionStrategy) -> Self {
        Self { graph, strategy }
    }

    /// The solver range matching the versions of a package inside `range`.
    /// Unknown packages have no versions.
    pub fn range_of(&self, id: &str, range: &VersionRange) -> Range<NuGetVersion> {
        match self.graph.find(id) {
            Some(handle) => self.registration_range(handle, range),
            None => Range::none(),
        }
    }

    fn registration_range(&self, handle: RegistrationId, range: &VersionRange) -> Range<NuGetVersion> {
        let registration = &self.graph[handle];
        registration
            .packages()
            .iter()
            .map(|p| p.version())
            .filter(|v| registration.admits(range, v))
            .fold(Range::none(), |acc, v| acc.union(&Range::exact(v.clone())))
    }

    /// Versions of a package in the order they should be tried.
    /// Listed versions come before unlisted ones.
    fn list_available_versions(&self, package: &SolverPackage) -> Vec<NuGetVersion> {
        let id = match package {
            SolverPackage::Root => return vec![NuGetVersion::zero()],
            SolverPackage::Package(id) => id,
        };
        let mut packages: Vec<_> = match self.graph.find(id) {
            Some(handle) => self.graph[handle].packages().iter().collect(),
            None => return Vec::new(),
        };
        packages.sort_by(|a, b| {
            let by_version = match self.strategy {
                VersionStrategy::Newest => b.version().cmp(a.version()),
                VersionStrategy::Oldest => a.version().cmp(b.version()),
            };
            b.listed().cmp(&a.listed()).then(by_version)
        });
        packages.into_iter().map(|p| p.version().clone()).collect()
    }
}

impl<'a> DependencyProvider<SolverPackage, NuGetVersion> for GraphDependencyProvider<'a> {
    /// Pick the package with the fewest versions available.
    fn choose_package_version<T: Borrow<SolverPackage>, U: Borrow<Range<NuGetVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<NuGetVersion>), Box<dyn Error>> {
        Ok(pubgrub::solver::choose_package_with_fewest_versions(
            |p: &SolverPackage| self.list_available_versions(p).into_iter(),
            potential_packages,
        ))
    }

    fn get_dependencies(
        &self,
        package: &SolverPackage,
        version: &NuGetVersion,
    ) -> Result<Dependencies<SolverPackage, NuGetVersion>, Box<dyn Error>> {
        let id = match package {
            SolverPackage::Root => return Ok(Dependencies::Known(Map::default())),
            SolverPackage::Package(id) => id,
        };
        let info = self
            .graph
            .find(id)
            .and_then(|handle| self.graph[handle].find(version));
        let info = match info {
            Some(info) => info,
            None => return Ok(Dependencies::Unknown),
        };
        let own = self.graph.find(id);
        let mut dependencies: Map<SolverPackage, Range<NuGetVersion>> = Map::default();
        for dependency in info.dependencies() {
            if Some(dependency.registration()) == own {
                continue;
            }
            let target = SolverPackage::Package(self.graph[dependency.registration()].id().to_string());
            let range = self.registration_range(dependency.registration(), dependency.range());
            let entry = dependencies.entry(target).or_insert_with(Range::any);
            *entry = entry.intersection(&range);
        }
        Ok(known_or_unavailable(package, version, dependencies))
    }
}

/// Dependency provider of a project, wrapping the provider of its packages.
/// Will only work properly if used to resolve dependencies for [SolverPackage::Root].
///
/// ```ignore
/// let graph_dp = GraphDependencyProvider::new(&graph, VersionStrategy::Newest);
/// let project_dp = ProjectAdapter::new(&requests, &graph_dp);
/// let solution = resolve(&project_dp, SolverPackage::Root, NuGetVersion::zero())?;
/// ```
pub struct ProjectAdapter<'a> {
    direct_deps: Map<SolverPackage, Range<NuGetVersion>>,
    deps_provider: &'a GraphDependencyProvider<'a>,
}

impl<'a> ProjectAdapter<'a> {
    /// Initialize a project dependency provider.
    /// Several requests for the same id must all be satisfied.
    pub fn new(requests: &[PackageRequest], deps_provider: &'a GraphDependencyProvider<'a>) -> Self {
        let mut direct_deps: Map<SolverPackage, Range<NuGetVersion>> = Map::default();
        for request in requests {
            let id = match deps_provider.graph.find(&request.id) {
                Some(handle) => deps_provider.graph[handle].id().to_string(),
                None => request.id.clone(),
            };
            let range = deps_provider.range_of(&request.id, &request.range);
            let entry = direct_deps
                .entry(SolverPackage::Package(id))
                .or_insert_with(Range::any);
            *entry = entry.intersection(&range);
        }
        Self {
            direct_deps,
            deps_provider,
        }
    }
}

impl<'a> DependencyProvider<SolverPackage, NuGetVersion> for ProjectAdapter<'a> {
    /// The root package is always picked alone, first, at version zero.
    fn choose_package_version<T: Borrow<SolverPackage>, U: Borrow<Range<NuGetVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<NuGetVersion>), Box<dyn Error>> {
        let mut potential_packages = potential_packages.peekable();
        let root_first = potential_packages
            .peek()
            .map_or(false, |(p, _)| <T as Borrow<SolverPackage>>::borrow(p) == &SolverPackage::Root);
        if root_first {
            if let Some((p, _)) = potential_packages.next() {
                return Ok((p, Some(NuGetVersion::zero())));
            }
        }
        self.deps_provider.choose_package_version(potential_packages)
    }

    fn get_dependencies(
        &self,
        package: &SolverPackage,
        version: &NuGetVersion,
    ) -> Result<Dependencies<SolverPackage, NuGetVersion>, Box<dyn Error>> {
        match package {
            SolverPackage::Root => Ok(known_or_unavailable(package, version, self.direct_deps.clone())),
            SolverPackage::Package(_) => self.deps_provider.get_dependencies(package, version),
        }
    }
}

/// Dependencies that no version can satisfy make the dependent version unavailable.
fn known_or_unavailable(
    package: &SolverPackage,
    version: &NuGetVersion,
    dependencies: Map<SolverPackage, Range<NuGetVersion>>,
) -> Dependencies<SolverPackage, NuGetVersion> {
    match dependencies.iter().find(|(_, range)| **range == Range::none()) {
        Some((dependency, _)) => {
            debug!("{} {} has no version of {} to depend on", package, version, dependency);
            Dependencies::Unknown
        }
        None => Dependencies::Known(dependencies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> NuGetVersion {
        s.parse().unwrap()
    }

    fn graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        graph.add_root(a);
        for version in ["1.0", "2.0", "3.0"] {
            graph.add_package(a, v(version), version != "3.0", None);
        }
        graph
    }

    #[test]
    fn range_is_the_union_of_satisfying_versions() {
        let graph = graph();
        let provider = GraphDependencyProvider::new(&graph, VersionStrategy::Newest);
        let range = provider.range_of("a", &"[1.0, 2.0]".parse().unwrap());
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("2.0")));
        assert!(!range.contains(&v("1.5")));
        assert!(!range.contains(&v("3.0")));
        assert_eq!(provider.range_of("B", &VersionRange::all()), Range::none());
    }

    #[test]
    fn listed_versions_are_tried_first() {
        let graph = graph();
        let newest = GraphDependencyProvider::new(&graph, VersionStrategy::Newest);
        let package = SolverPackage::Package("A".to_string());
        assert_eq!(newest.list_available_versions(&package), vec![v("2.0"), v("1.0"), v("3.0")]);
        let oldest = GraphDependencyProvider::new(&graph, VersionStrategy::Oldest);
        assert_eq!(oldest.list_available_versions(&package), vec![v("1.0"), v("2.0"), v("3.0")]);
    }

    #[test]
    fn unsatisfiable_edges_make_a_version_unavailable() {
        let mut graph = graph();
        let a = graph.find("A").unwrap();
        graph.add_dependency(a, &v("1.0"), "Missing", VersionRange::all());
        graph.add_dependency(a, &v("2.0"), "a", VersionRange::all());
        let provider = GraphDependencyProvider::new(&graph, VersionStrategy::Newest);
        let package = SolverPackage::Package("A".to_string());
        assert!(matches!(
            provider.get_dependencies(&package, &v("1.0")),
            Ok(Dependencies::Unknown)
        ));
        match provider.get_dependencies(&package, &v("2.0")) {
            Ok(Dependencies::Known(dependencies)) => assert!(dependencies.is_empty()),
            _ => panic!("self dependencies are ignored"),
        }
    }
}
