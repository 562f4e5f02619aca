// SPDX-License-Identifier: MPL-2.0

use proptest::collection::{btree_set, vec};
use proptest::prelude::*;

use nuget_solve_deps::aggregate::{aggregate, SearchResultSet};
use nuget_solve_deps::identity::PackageIdentity;
use nuget_solve_deps::search::{merge_entries, SearchMetadata};
use nuget_solve_deps::version::NuGetVersion;

fn entry(id: &str) -> SearchMetadata {
    SearchMetadata::new(PackageIdentity::new(id, (1, 0, 0)))
}

fn list(ids: &[&str]) -> Vec<SearchMetadata> {
    ids.iter().map(|id| entry(id)).collect()
}

fn ids(entries: &[SearchMetadata]) -> Vec<String> {
    entries.iter().map(|e| e.identity.id.clone()).collect()
}

/// Output entries restricted to the ids of `input`, in output order.
fn restricted(output: &[SearchMetadata], input: &[&str]) -> Vec<String> {
    ids(output)
        .into_iter()
        .filter(|id| input.contains(&id.as_str()))
        .collect()
}

#[test]
fn every_input_order_is_preserved() {
    let l1 = ["P1", "P2", "P3"];
    let l2 = ["P4", "P1", "P5"];
    let l3 = ["P2", "P6"];
    let output = aggregate(
        "",
        &[
            SearchResultSet::unranked("one", list(&l1)),
            SearchResultSet::unranked("two", list(&l2)),
            SearchResultSet::unranked("three", list(&l3)),
        ],
    );
    assert_eq!(output.len(), 6);
    for input in [&l1[..], &l2[..], &l3[..]] {
        assert_eq!(restricted(&output, input), input);
    }
}

#[test]
fn every_input_order_is_preserved_with_ranks() {
    let l1 = ["P1", "P2", "P3"];
    let l2 = ["P4", "P1", "P5"];
    let l3 = ["P2", "P6"];
    let output = aggregate(
        "p",
        &[
            SearchResultSet::unranked("one", list(&l1)),
            SearchResultSet::ranked("two", list(&l2)),
            SearchResultSet::ranked("three", list(&l3)),
        ],
    );
    for input in [&l1[..], &l2[..], &l3[..]] {
        assert_eq!(restricted(&output, input), input);
    }
}

#[test]
fn identical_feeds_give_the_feed_itself() {
    let feed = list(&["Serilog", "Newtonsoft.Json", "NUnit", "xunit"]);
    let output = aggregate(
        "",
        &[
            SearchResultSet::ranked("first", feed.clone()),
            SearchResultSet::ranked("second", feed.clone()),
        ],
    );
    assert_eq!(ids(&output), ids(&feed));
}

#[test]
fn nothing_to_aggregate() {
    assert!(aggregate("json", &[]).is_empty());
    assert!(aggregate("json", &[SearchResultSet::ranked("empty", Vec::new())]).is_empty());
}

fn versions() -> impl Strategy<Value = std::collections::BTreeSet<NuGetVersion>> {
    btree_set((0u64..5, 0u64..5).prop_map(|(major, minor)| NuGetVersion::new(major, minor, 0)), 0..6)
}

fn result_lists() -> impl Strategy<Value = Vec<Vec<usize>>> {
    vec(
        proptest::sample::subsequence((0..8).collect::<Vec<usize>>(), 0..8).prop_shuffle(),
        1..4,
    )
}

proptest! {
    #[test]
    fn merge_unions_versions(a in versions(), b in versions(), major_a in 0u64..3, major_b in 0u64..3) {
        let mut first = SearchMetadata::new(PackageIdentity::new("Pkg", (major_a, 0, 0)));
        first.versions = a.clone();
        let mut second = SearchMetadata::new(PackageIdentity::new("pkg", (major_b, 0, 0)));
        second.versions = b.clone();
        let merged = merge_entries(first.clone(), second);
        let union: std::collections::BTreeSet<NuGetVersion> = a.union(&b).cloned().collect();
        prop_assert_eq!(merged.versions, union);
        prop_assert_eq!(merge_entries(first.clone(), first.clone()), first);
    }

    #[test]
    fn every_id_appears_once(lists in result_lists()) {
        let names: Vec<Vec<String>> = lists
            .iter()
            .map(|l| l.iter().map(|i| format!("P{}", i)).collect())
            .collect();
        let sets: Vec<SearchResultSet> = names
            .iter()
            .enumerate()
            .map(|(n, l)| {
                let entries = l.iter().map(|id| entry(id)).collect();
                if n % 2 == 0 {
                    SearchResultSet::ranked(format!("feed{}", n), entries)
                } else {
                    SearchResultSet::unranked(format!("feed{}", n), entries)
                }
            })
            .collect();
        let output = aggregate("", &sets);
        let mut distinct: Vec<String> = names.iter().flatten().cloned().collect();
        distinct.sort();
        distinct.dedup();
        let mut output_ids = ids(&output);
        output_ids.sort();
        prop_assert_eq!(output_ids, distinct);
    }

    #[test]
    fn single_list_is_kept_as_is(lists in result_lists()) {
        let names: Vec<String> = lists[0].iter().map(|i| format!("P{}", i)).collect();
        let entries = names.iter().map(|id| entry(id)).collect();
        let output = aggregate("p", &[SearchResultSet::unranked("only", entries)]);
        prop_assert_eq!(ids(&output), names);
    }
}
