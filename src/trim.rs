// SPDX-License-Identifier: MPL-2.0

//! Trimming of a gathered [DependencyGraph].
//!
//! Versions excluded by an allowed-versions constraint are removed first.
//! Removing them may leave other versions with a dependency that no remaining
//! version satisfies, so those are removed in turn until nothing changes.

use log::debug;
use std::collections::BTreeMap as Map;

use crate::graph::{DependencyGraph, RegistrationId};
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

/// Restrict the graph to the allowed versions of each listed package id,
/// then prune the versions made unsatisfiable.
///
/// Ids are compared case-insensitively. Returns the number of versions removed.
/// Applying it a second time with the same constraints removes nothing.
pub fn trim_by_allowed_versions(graph: &mut DependencyGraph, allowed_versions: &Map<String, VersionRange>) -> usize {
    let mut removed = 0;
    for (id, range) in allowed_versions {
        removed += remove_disallowed(graph, id, range);
        removed += prune_unsatisfiable(graph);
    }
    removed
}

fn remove_disallowed(graph: &mut DependencyGraph, id: &str, range: &VersionRange) -> usize {
    let mut removed = 0;
    for handle in graph.reachable() {
        let registration = &mut graph[handle];
        if registration.id().eq_ignore_ascii_case(id) {
            let count = registration.retain(|p| range.satisfies(p.version()));
            if count > 0 {
                debug!("Removed {} versions of {} outside {}", count, registration.id(), range);
            }
            removed += count;
        }
    }
    removed
}

/// Remove, until a fixpoint is reached, every reachable version having a dependency
/// that no known version satisfies. Returns the number of versions removed.
pub fn prune_unsatisfiable(graph: &mut DependencyGraph) -> usize {
    let mut removed = 0;
    loop {
        let marked = unsatisfiable_packages(graph);
        if marked.is_empty() {
            return removed;
        }
        for (handle, version) in marked {
            if graph[handle].remove(&version) {
                debug!("Pruned {}@{}: a dependency can no longer be satisfied", graph[handle].id(), version);
                removed += 1;
            }
        }
    }
}

fn unsatisfiable_packages(graph: &DependencyGraph) -> Vec<(RegistrationId, NuGetVersion)> {
    let mut marked = Vec::new();
    for handle in graph.reachable() {
        for package in graph[handle].packages() {
            if package.dependencies().iter().any(|d| !graph.is_satisfiable(d)) {
                marked.push((handle, package.version().clone()));
            }
        }
    }
    marked
}
