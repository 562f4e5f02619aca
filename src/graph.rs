// SPDX-License-Identifier: MPL-2.0

//! The dependency graph gathered from package registrations.
//!
//! Registrations live in an arena owned by [DependencyGraph] and refer to each other
//! through [RegistrationId] handles, so a package reachable from several parents
//! (diamonds) or from its own dependencies (cycles) is stored once.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{self, Write};
use std::ops::{Index, IndexMut};

use crate::identity::package_key;
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Handle of a registration inside its [DependencyGraph].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(usize);

/// All the known versions of one package id.
#[derive(Debug, Clone)]
pub struct RegistrationInfo {
    handle: RegistrationId,
    id: String,
    include_prerelease: bool,
    packages: Vec<PackageInfo>,
}

/// One version of a package and its dependencies for the target framework.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    registration: RegistrationId,
    listed: bool,
    version: NuGetVersion,
    package_content: Option<String>,
    dependencies: Vec<DependencyInfo>,
}

/// An edge of the graph: a dependency declared by a package version.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyInfo {
    id: String,
    range: VersionRange,
    registration: RegistrationId,
}

/// Registrations reachable from a set of root package ids.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    registrations: Vec<RegistrationInfo>,
    by_key: FxHashMap<String, RegistrationId>,
    roots: Vec<RegistrationId>,
}

impl RegistrationInfo {
    /// Handle of this registration in its graph.
    pub fn handle(&self) -> RegistrationId {
        self.handle
    }

    /// Package id, spelled as first requested.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether prerelease versions were accepted while gathering.
    pub fn include_prerelease(&self) -> bool {
        self.include_prerelease
    }

    /// Known versions, in insertion order.
    pub fn packages(&self) -> &[PackageInfo] {
        &self.packages
    }

    /// The package with this exact version.
    pub fn find(&self, version: &NuGetVersion) -> Option<&PackageInfo> {
        self.packages.iter().find(|p| &p.version == version)
    }

    /// Whether `range` selects `version` for this registration,
    /// following the same prerelease rule as when gathering.
    pub fn admits(&self, range: &VersionRange, version: &NuGetVersion) -> bool {
        range.admits(version, self.include_prerelease)
    }

    /// Whether no version is known.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Versions are unique: adding an existing version is refused.
    fn add(&mut self, package: PackageInfo) -> bool {
        if self.find(&package.version).is_some() {
            return false;
        }
        self.packages.push(package);
        true
    }

    /// Remove the given version, returns whether it was present.
    pub(crate) fn remove(&mut self, version: &NuGetVersion) -> bool {
        let before = self.packages.len();
        self.packages.retain(|p| &p.version != version);
        self.packages.len() != before
    }

    /// Keep only the versions matching `keep`, returns the number removed.
    pub(crate) fn retain<F: FnMut(&PackageInfo) -> bool>(&mut self, keep: F) -> usize {
        let before = self.packages.len();
        self.packages.retain(keep);
        before - self.packages.len()
    }
}

impl PackageInfo {
    /// Registration owning this package.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }

    /// Whether the version is listed on its feed.
    pub fn listed(&self) -> bool {
        self.listed
    }

    /// Version of the package.
    pub fn version(&self) -> &NuGetVersion {
        &self.version
    }

    /// Download URI of the package archive.
    pub fn package_content(&self) -> Option<&str> {
        self.package_content.as_deref()
    }

    /// Dependencies for the target framework.
    pub fn dependencies(&self) -> &[DependencyInfo] {
        &self.dependencies
    }
}

impl DependencyInfo {
    /// Id of the dependency, as declared.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Versions accepted by the dependent package.
    pub fn range(&self) -> &VersionRange {
        &self.range
    }

    /// Registration of the dependency.
    pub fn registration(&self) -> RegistrationId {
        self.registration
    }
}

impl DependencyGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registration of `id`, created empty if unknown.
    pub fn registration_for(&mut self, id: &str, include_prerelease: bool) -> RegistrationId {
        let key = package_key(id);
        if let Some(handle) = self.by_key.get(&key) {
            return *handle;
        }
        let handle = RegistrationId(self.registrations.len());
        self.registrations.push(RegistrationInfo {
            handle,
            id: id.to_string(),
            include_prerelease,
            packages: Vec::new(),
        });
        self.by_key.insert(key, handle);
        handle
    }

    /// The registration of `id`, compared case-insensitively.
    pub fn find(&self, id: &str) -> Option<RegistrationId> {
        self.by_key.get(&package_key(id)).copied()
    }

    /// Mark a registration as a root of the graph.
    pub fn add_root(&mut self, registration: RegistrationId) {
        if !self.roots.contains(&registration) {
            self.roots.push(registration);
        }
    }

    /// Roots, in the order they were added.
    pub fn roots(&self) -> &[RegistrationId] {
        &self.roots
    }

    /// Every registration, reachable or not.
    pub fn registrations(&self) -> impl Iterator<Item = &RegistrationInfo> {
        self.registrations.iter()
    }

    /// Total number of package versions in the graph.
    pub fn package_count(&self) -> usize {
        self.registrations.iter().map(|r| r.packages.len()).sum()
    }

    /// Add a version to a registration.
    /// Returns `false`, leaving the graph untouched, if the version is already known.
    pub fn add_package(
        &mut self,
        registration: RegistrationId,
        version: NuGetVersion,
        listed: bool,
        package_content: Option<String>,
    ) -> bool {
        self[registration].add(PackageInfo {
            registration,
            listed,
            version,
            package_content,
            dependencies: Vec::new(),
        })
    }

    /// Declare that the given version of a registration depends on `id` in `range`.
    ///
    /// The registration of the dependency is shared with every other edge to the same id.
    /// Returns it, or `None` if the dependent version is unknown.
    pub fn add_dependency(
        &mut self,
        registration: RegistrationId,
        version: &NuGetVersion,
        id: &str,
        range: VersionRange,
    ) -> Option<RegistrationId> {
        self[registration].find(version)?;
        let include_prerelease = self[registration].include_prerelease;
        let target = self.registration_for(id, include_prerelease);
        let package = self[registration]
            .packages
            .iter_mut()
            .find(|p| &p.version == version)?;
        package.dependencies.push(DependencyInfo {
            id: id.to_string(),
            range,
            registration: target,
        });
        Some(target)
    }

    /// Registrations reachable from the roots, in depth-first pre-order.
    pub fn reachable(&self) -> Vec<RegistrationId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();
        let mut stack: Vec<RegistrationId> = self.roots.iter().rev().copied().collect();
        while let Some(handle) = stack.pop() {
            if !visited.insert(handle) {
                continue;
            }
            order.push(handle);
            let children = self[handle]
                .packages
                .iter()
                .flat_map(|p| p.dependencies.iter())
                .map(|d| d.registration)
                .collect::<Vec<_>>();
            stack.extend(children.into_iter().rev().filter(|c| !visited.contains(c)));
        }
        order
    }

    /// Whether some known version is admitted by the range of this dependency.
    ///
    /// The registration is shared with other edges, so a prerelease version is only
    /// counted if this edge would have gathered it too.
    pub fn is_satisfiable(&self, dependency: &DependencyInfo) -> bool {
        let registration = &self[dependency.registration];
        registration
            .packages
            .iter()
            .any(|p| registration.admits(&dependency.range, &p.version))
    }

    /// Indented rendering of the graph, for diagnostics.
    /// Registrations already printed are marked with `(*)` and not expanded again.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut printed = FxHashSet::default();
        for root in &self.roots {
            self.render_registration(*root, 0, &mut printed, &mut out);
        }
        out
    }

    fn render_registration(
        &self,
        handle: RegistrationId,
        depth: usize,
        printed: &mut FxHashSet<RegistrationId>,
        out: &mut String,
    ) {
        let registration = &self[handle];
        let indent = "  ".repeat(depth);
        if !printed.insert(handle) {
            let _ = writeln!(out, "{}{} (*)", indent, registration.id);
            return;
        }
        let versions: Vec<String> = registration.packages.iter().map(|p| p.version.to_string()).collect();
        let _ = writeln!(out, "{}{} [{}]", indent, registration.id, versions.join(", "));
        let mut children: Vec<RegistrationId> = Vec::new();
        for dependency in registration.packages.iter().flat_map(|p| p.dependencies.iter()) {
            if !children.contains(&dependency.registration) {
                children.push(dependency.registration);
            }
        }
        for child in children {
            self.render_registration(child, depth + 1, printed, out);
        }
    }
}

impl Index<RegistrationId> for DependencyGraph {
    type Output = RegistrationInfo;

    fn index(&self, handle: RegistrationId) -> &RegistrationInfo {
        &self.registrations[handle.0]
    }
}

impl IndexMut<RegistrationId> for DependencyGraph {
    fn index_mut(&mut self, handle: RegistrationId) -> &mut RegistrationInfo {
        &mut self.registrations[handle.0]
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> NuGetVersion {
        s.parse().unwrap()
    }

    #[test]
    fn registrations_are_shared_by_id() {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        let b = graph.registration_for("B", false);
        let c = graph.registration_for("C", false);
        graph.add_root(a);
        graph.add_package(a, v("1.0"), true, None);
        graph.add_package(b, v("1.0"), true, None);
        graph.add_package(c, v("1.0"), true, None);
        assert_eq!(graph.add_dependency(a, &v("1.0"), "B", VersionRange::all()), Some(b));
        assert_eq!(graph.add_dependency(a, &v("1.0"), "c", VersionRange::all()), Some(c));
        assert_eq!(graph.add_dependency(b, &v("1.0"), "C", VersionRange::all()), Some(c));
        assert_eq!(graph.registrations().count(), 3);
        assert_eq!(graph.reachable(), vec![a, b, c]);
    }

    #[test]
    fn versions_are_unique() {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        assert!(graph.add_package(a, v("1.0"), true, None));
        assert!(!graph.add_package(a, v("1.0.0.0"), false, None));
        assert_eq!(graph[a].packages().len(), 1);
        assert!(graph[a].packages()[0].listed());
        assert_eq!(graph[a].packages()[0].registration(), a);
    }

    #[test]
    fn dependency_of_unknown_version() {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        assert_eq!(graph.add_dependency(a, &v("1.0"), "B", VersionRange::all()), None);
        assert_eq!(graph.find("B"), None);
    }

    #[test]
    fn prerelease_only_satisfies_edges_asking_for_it() {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        graph.add_package(a, v("1.0"), true, None);
        let p = graph
            .add_dependency(a, &v("1.0"), "P", "[2.0.0-alpha, )".parse().unwrap())
            .unwrap();
        graph.add_dependency(a, &v("1.0"), "P", "[1.5.0, )".parse().unwrap());
        graph.add_package(p, v("2.0.0-beta"), true, None);
        let edges = graph[a].packages()[0].dependencies().to_vec();
        assert!(graph.is_satisfiable(&edges[0]));
        assert!(!graph.is_satisfiable(&edges[1]));
    }

    #[test]
    fn reachable_terminates_on_cycles() {
        let mut graph = DependencyGraph::new();
        let a = graph.registration_for("A", false);
        graph.add_root(a);
        graph.add_package(a, v("1.0"), true, None);
        let b = graph.add_dependency(a, &v("1.0"), "B", VersionRange::all()).unwrap();
        graph.add_package(b, v("1.0"), true, None);
        graph.add_dependency(b, &v("1.0"), "A", VersionRange::all());
        assert_eq!(graph.reachable(), vec![a, b]);
        assert_eq!(graph.render_tree(), "A [1.0.0]\n  B [1.0.0]\n    A (*)\n");
    }
}
