// SPDX-License-Identifier: MPL-2.0

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

use nuget_solve_deps::graph::DependencyGraph;
use nuget_solve_deps::trim::{prune_unsatisfiable, trim_by_allowed_versions};
use nuget_solve_deps::version::NuGetVersion;
use nuget_solve_deps::version_range::VersionRange;

/// Versions of each package, with dependencies as (target package, lowest major, width).
type GraphShape = Vec<Vec<(u64, Vec<(usize, u64, u64)>)>>;

fn graph_shape() -> impl Strategy<Value = GraphShape> {
    let dependency = (0usize..6, 1u64..5, 0u64..3);
    let version = (1u64..5, vec(dependency, 0..3));
    vec(vec(version, 1..4), 1..6)
}

fn allowed_shape() -> impl Strategy<Value = Vec<(usize, u64, u64)>> {
    vec((0usize..6, 1u64..5, 0u64..3), 0..3)
}

fn name(index: usize) -> String {
    format!("P{}", index)
}

fn major_range(lowest: u64, width: u64) -> VersionRange {
    VersionRange::between_inclusive(
        NuGetVersion::new(lowest, 0, 0),
        NuGetVersion::new(lowest + width, 0, 0),
    )
}

fn build(shape: &GraphShape) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    let handles: Vec<_> = (0..shape.len())
        .map(|i| graph.registration_for(&name(i), false))
        .collect();
    for handle in &handles {
        graph.add_root(*handle);
    }
    for (handle, versions) in handles.iter().zip(shape) {
        for (major, dependencies) in versions {
            let version = NuGetVersion::new(*major, 0, 0);
            graph.add_package(*handle, version.clone(), true, None);
            for (target, lowest, width) in dependencies {
                let target = name(target % shape.len());
                graph.add_dependency(*handle, &version, &target, major_range(*lowest, *width));
            }
        }
    }
    graph
}

fn allowed(shape: &[(usize, u64, u64)]) -> BTreeMap<String, VersionRange> {
    shape.iter()
        .map(|(index, lowest, width)| (name(*index).to_lowercase(), major_range(*lowest, *width)))
        .collect()
}

proptest! {
    #[test]
    fn trimming_converges(shape in graph_shape(), allowed_shape in allowed_shape()) {
        let mut graph = build(&shape);
        let allowed = allowed(&allowed_shape);
        prune_unsatisfiable(&mut graph);
        trim_by_allowed_versions(&mut graph, &allowed);
        prop_assert_eq!(trim_by_allowed_versions(&mut graph, &allowed), 0);
        prop_assert_eq!(prune_unsatisfiable(&mut graph), 0);
    }

    #[test]
    fn trimmed_graph_is_consistent(shape in graph_shape(), allowed_shape in allowed_shape()) {
        let mut graph = build(&shape);
        let allowed = allowed(&allowed_shape);
        let before = graph.package_count();
        let removed = prune_unsatisfiable(&mut graph) + trim_by_allowed_versions(&mut graph, &allowed);
        prop_assert_eq!(graph.package_count() + removed, before);

        for handle in graph.reachable() {
            let registration = &graph[handle];
            for package in registration.packages() {
                for dependency in package.dependencies() {
                    prop_assert!(graph.is_satisfiable(dependency));
                    prop_assert!(!graph[dependency.registration()].is_empty());
                }
            }
            if let Some(range) = allowed.get(&registration.id().to_lowercase()) {
                for package in registration.packages() {
                    prop_assert!(range.satisfies(package.version()));
                }
            }
        }
    }
}

#[test]
fn empty_registration_prunes_its_dependents() {
    let mut graph = DependencyGraph::new();
    let a = graph.registration_for("A", false);
    graph.add_root(a);
    graph.add_package(a, NuGetVersion::new(1, 0, 0), true, None);
    graph.add_package(a, NuGetVersion::new(2, 0, 0), true, None);
    let missing = graph
        .add_dependency(a, &NuGetVersion::new(2, 0, 0), "Missing", VersionRange::all())
        .unwrap();
    assert!(graph[missing].is_empty());
    assert_eq!(prune_unsatisfiable(&mut graph), 1);
    let versions: Vec<_> = graph[a].packages().iter().map(|p| p.version().to_string()).collect();
    assert_eq!(versions, vec!["1.0.0"]);
}
