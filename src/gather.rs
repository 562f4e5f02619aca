// SPDX-License-Identifier: MPL-2.0

//! Build the [DependencyGraph] of a set of package requests.
//!
//! The graph is explored breadth first. Each level gathers the pending
//! `(package, range)` requests, fetches their registration pages concurrently,
//! then inserts the matching versions sequentially. Only versions that were not
//! known yet produce the requests of the next level, so the exploration
//! terminates even when packages depend on each other in cycles.
//!
//! Requests for the same package are processed one after the other inside a level,
//! which keeps at most one expansion in flight per registration.
//! Registration documents are kept for the whole exploration: each index and page
//! is fetched at most once per source, whatever the number of ranges requested.

use futures::future::try_join_all;
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::feed::JsonFetcher;
use crate::framework::{Framework, FrameworkReducer};
use crate::graph::{DependencyGraph, RegistrationId};
use crate::identity::PackageRequest;
use crate::registration::{
    page_is_relevant, CatalogEntry, PackageDependency, RegistrationError, RegistrationFetcher,
    RegistrationLeaf, RegistrationPage, RegistrationSource,
};
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Pages of one registration on each source, `None` until its index is fetched.
type SourcePages = Vec<Option<Vec<RegistrationPage>>>;

/// Explores registrations to build a [DependencyGraph].
pub struct GraphBuilder<'a, F, R> {
    fetcher: &'a RegistrationFetcher<F>,
    sources: &'a [RegistrationSource],
    reducer: &'a R,
    target_framework: &'a Framework,
    include_prerelease: bool,
}

impl<'a, F: JsonFetcher, R: FrameworkReducer> GraphBuilder<'a, F, R> {
    /// Sources are queried in order, versions found in several of them are kept once.
    pub fn new(
        fetcher: &'a RegistrationFetcher<F>,
        sources: &'a [RegistrationSource],
        reducer: &'a R,
        target_framework: &'a Framework,
        include_prerelease: bool,
    ) -> Self {
        Self {
            fetcher,
            sources,
            reducer,
            target_framework,
            include_prerelease,
        }
    }

    /// Gather every version reachable from `requests`.
    /// The requested packages are the roots of the graph.
    pub async fn build(&self, requests: &[PackageRequest]) -> Result<DependencyGraph, RegistrationError> {
        let mut graph = DependencyGraph::new();
        let mut seen: FxHashSet<(RegistrationId, VersionRange)> = FxHashSet::default();
        let mut pending = Vec::new();
        for request in requests {
            let handle = graph.registration_for(&request.id, self.include_prerelease);
            graph.add_root(handle);
            if seen.insert((handle, request.range.clone())) {
                pending.push((handle, request.range.clone()));
            }
        }

        let mut documents: FxHashMap<RegistrationId, SourcePages> = FxHashMap::default();
        let mut depth = 0;
        while !pending.is_empty() {
            debug!("Gathering level {}: {} requests", depth, pending.len());
            let mut batches = Vec::new();
            for (handle, id, ranges) in group_by_registration(&graph, pending) {
                let mut pages = documents
                    .remove(&handle)
                    .unwrap_or_else(|| vec![None; self.sources.len()]);
                batches.push(async move {
                    let mut results = Vec::with_capacity(ranges.len());
                    for range in ranges {
                        let leaves = self.fetch_leaves(&id, &range, &mut pages).await?;
                        results.push(leaves);
                    }
                    Ok::<_, RegistrationError>((handle, pages, results))
                });
            }
            let fetched = try_join_all(batches).await?;

            let mut next = Vec::new();
            for (handle, pages, results) in fetched {
                documents.insert(handle, pages);
                for leaf in results.into_iter().flatten() {
                    for request in self.insert_leaf(&mut graph, handle, leaf)? {
                        if seen.insert(request.clone()) {
                            next.push(request);
                        }
                    }
                }
            }
            pending = next;
            depth += 1;
        }
        info!(
            "Gathered {} versions of {} packages",
            graph.package_count(),
            graph.registrations().count()
        );
        Ok(graph)
    }

    /// Leaves of every source matching `range`, without duplicates.
    /// `pages` holds the documents of this registration already fetched from each source.
    async fn fetch_leaves(
        &self,
        id: &str,
        range: &VersionRange,
        pages: &mut SourcePages,
    ) -> Result<Vec<RegistrationLeaf>, RegistrationError> {
        let per_source = try_join_all(
            self.sources
                .iter()
                .zip(pages.iter_mut())
                .map(|(source, known)| self.source_leaves(source, id, range, known)),
        )
        .await?;
        let mut unique = FxHashSet::default();
        let leaves = per_source
            .into_iter()
            .flatten()
            .filter(|leaf| self.accepts(range, &leaf.catalog_entry.version))
            .filter(|leaf| unique.insert(leaf.clone()))
            .collect();
        Ok(leaves)
    }

    /// Leaves of the pages of one source relevant to `range`,
    /// fetching only the documents not known yet.
    async fn source_leaves(
        &self,
        source: &RegistrationSource,
        id: &str,
        range: &VersionRange,
        known: &mut Option<Vec<RegistrationPage>>,
    ) -> Result<Vec<RegistrationLeaf>, RegistrationError> {
        let mut pages = match known.take() {
            Some(pages) => pages,
            None => self.fetcher.fetch_index(source, id).await?,
        };
        self.fetcher.complete_pages(id, &mut pages, range).await?;
        let leaves = pages
            .iter()
            .filter(|page| page_is_relevant(range, &page.lower, &page.upper))
            .flat_map(|page| page.items.iter().flatten().cloned())
            .collect();
        *known = Some(pages);
        Ok(leaves)
    }

    fn accepts(&self, range: &VersionRange, version: &NuGetVersion) -> bool {
        range.admits(version, self.include_prerelease)
    }

    /// Add the version of a leaf to its registration.
    /// Returns the requests for its dependencies, none if the version was already known.
    fn insert_leaf(
        &self,
        graph: &mut DependencyGraph,
        handle: RegistrationId,
        leaf: RegistrationLeaf,
    ) -> Result<Vec<(RegistrationId, VersionRange)>, RegistrationError> {
        let entry = leaf.catalog_entry;
        if let Some(known) = graph[handle].find(&entry.version) {
            if known.package_content() != leaf.package_content.as_deref() {
                warn!(
                    "Ignoring a second registration of {}@{} with different content",
                    entry.id, entry.version
                );
            }
            return Ok(Vec::new());
        }
        let dependencies = self.nearest_dependencies(&entry)?;
        graph.add_package(handle, entry.version.clone(), entry.listed, leaf.package_content);
        let mut requests = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let range = dependency.range.unwrap_or_default();
            if let Some(target) = graph.add_dependency(handle, &entry.version, &dependency.id, range.clone()) {
                requests.push((target, range));
            }
        }
        Ok(requests)
    }

    /// Dependencies of the group nearest to the target framework.
    fn nearest_dependencies(&self, entry: &CatalogEntry) -> Result<Vec<PackageDependency>, RegistrationError> {
        if entry.dependency_groups.is_empty() {
            return Ok(Vec::new());
        }
        let frameworks = entry
            .dependency_groups
            .iter()
            .map(|group| group.target_framework.as_deref().unwrap_or("").parse::<Framework>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RegistrationError::InvalidFramework {
                package: format!("{}@{}", entry.id, entry.version),
                source,
            })?;
        let nearest = match self.reducer.nearest(self.target_framework, &frameworks) {
            Some(nearest) => nearest,
            None => {
                debug!(
                    "{}@{} has no dependency group for {}",
                    entry.id, entry.version, self.target_framework
                );
                return Ok(Vec::new());
            }
        };
        Ok(entry
            .dependency_groups
            .iter()
            .zip(&frameworks)
            .filter(|(_, framework)| **framework == nearest)
            .flat_map(|(group, _)| group.dependencies.iter().cloned())
            .collect())
    }
}

/// Requests of a level, grouped by registration in first-seen order.
fn group_by_registration(
    graph: &DependencyGraph,
    requests: Vec<(RegistrationId, VersionRange)>,
) -> Vec<(RegistrationId, String, Vec<VersionRange>)> {
    let mut position: FxHashMap<RegistrationId, usize> = FxHashMap::default();
    let mut batches: Vec<(RegistrationId, String, Vec<VersionRange>)> = Vec::new();
    for (handle, range) in requests {
        let index = *position.entry(handle).or_insert_with(|| {
            batches.push((handle, graph[handle].id().to_string(), Vec::new()));
            batches.len() - 1
        });
        batches[index].2.push(range);
    }
    batches
}
