// SPDX-License-Identifier: MPL-2.0

//! Merge of the search results of several feeds into a single list.
//!
//! Each input list is already ordered by its feed, and that order is kept:
//! if a package comes before another in some input, it also does in the output.
//! Every input list adds "comes before" edges between its consecutive entries,
//! and the output is a topological order of those edges.
//! Ranks only decide between entries that no input orders.

use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::ranking::RankingIndex;
use crate::search::{merge_entries, SearchMetadata};

/// Results of one feed for a query.
#[derive(Debug, Clone)]
pub struct SearchResultSet {
    /// Name of the feed, for diagnostics.
    pub source: String,
    /// Results, best match first.
    pub entries: Vec<SearchMetadata>,
    /// Whether the position of an entry is a relevance rank worth sharing with other feeds.
    pub authoritative: bool,
}

impl SearchResultSet {
    /// Results of a feed whose order is a relevance rank.
    pub fn ranked<S: Into<String>>(source: S, entries: Vec<SearchMetadata>) -> Self {
        Self {
            source: source.into(),
            entries,
            authoritative: true,
        }
    }

    /// Results of a feed without meaningful ranking.
    pub fn unranked<S: Into<String>>(source: S, entries: Vec<SearchMetadata>) -> Self {
        Self {
            source: source.into(),
            entries,
            authoritative: false,
        }
    }
}

/// Merge the results of several feeds into one list without duplicate ids.
///
/// Entries with the same id are merged with [merge_entries].
/// The relative order of the entries of each input list is preserved.
/// Between unordered entries, the best rank comes first: ranks are the positions in
/// the authoritative result sets, or the relevance to `query` when none is authoritative.
/// Remaining ties keep the order in which entries were first seen.
pub fn aggregate(query: &str, result_sets: &[SearchResultSet]) -> Vec<SearchMetadata> {
    // Merge entries by id, in first-seen order.
    let mut merged: Vec<SearchMetadata> = Vec::new();
    let mut position: FxHashMap<String, usize> = FxHashMap::default();
    let mut orders: Vec<Vec<usize>> = Vec::with_capacity(result_sets.len());
    for set in result_sets {
        let mut order = Vec::with_capacity(set.entries.len());
        let mut in_set = FxHashSet::default();
        for entry in &set.entries {
            let key = entry.key();
            let node = match position.get(&key) {
                Some(&node) => {
                    merged[node] = merge_entries(merged[node].clone(), entry.clone());
                    node
                }
                None => {
                    merged.push(entry.clone());
                    position.insert(key, merged.len() - 1);
                    merged.len() - 1
                }
            };
            if in_set.insert(node) {
                order.push(node);
            } else {
                debug!("{} lists {} twice", set.source, entry.identity.id);
            }
        }
        orders.push(order);
    }

    let index = ranking_index(query, result_sets);
    let ranks: Vec<usize> = merged
        .iter()
        .map(|entry| index.rank_of(&entry.identity.id, None))
        .collect();

    // "Comes before" edges between consecutive entries of each list.
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); merged.len()];
    let mut predecessors_count = vec![0usize; merged.len()];
    let mut edges = FxHashSet::default();
    for order in &orders {
        for pair in order.windows(2) {
            if edges.insert((pair[0], pair[1])) {
                successors[pair[0]].push(pair[1]);
                predecessors_count[pair[1]] += 1;
            }
        }
    }

    // Kahn's algorithm, picking the best ranked entry among the available ones.
    let mut emitted = vec![false; merged.len()];
    let mut available: BinaryHeap<Reverse<(usize, usize)>> = (0..merged.len())
        .filter(|node| predecessors_count[*node] == 0)
        .map(|node| Reverse((ranks[node], node)))
        .collect();
    let mut output_order = Vec::with_capacity(merged.len());
    while output_order.len() < merged.len() {
        let node = match available.pop() {
            Some(Reverse((_, node))) if emitted[node] => continue,
            Some(Reverse((_, node))) => node,
            None => {
                // Inputs disagree on the order: break the cycle with the best remaining entry.
                let node = (0..merged.len())
                    .filter(|node| !emitted[*node])
                    .min_by_key(|node| (ranks[*node], *node));
                match node {
                    Some(node) => {
                        warn!("Search results disagree on the position of {}", merged[node].identity.id);
                        node
                    }
                    None => break,
                }
            }
        };
        emitted[node] = true;
        output_order.push(node);
        for &next in &successors[node] {
            predecessors_count[next] = predecessors_count[next].saturating_sub(1);
            if predecessors_count[next] == 0 && !emitted[next] {
                available.push(Reverse((ranks[next], next)));
            }
        }
    }

    let mut slots: Vec<Option<SearchMetadata>> = merged.into_iter().map(Some).collect();
    output_order
        .into_iter()
        .filter_map(|node| slots[node].take())
        .collect()
}

fn ranking_index(query: &str, result_sets: &[SearchResultSet]) -> RankingIndex {
    let mut index = RankingIndex::new();
    for set in result_sets.iter().filter(|set| set.authoritative) {
        index.merge(&RankingIndex::from_ranked_list(&set.entries));
    }
    if index.is_empty() {
        index = RankingIndex::from_query(query, result_sets.iter().flat_map(|set| set.entries.iter()));
    }
    index
}
