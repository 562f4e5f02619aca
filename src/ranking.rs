// SPDX-License-Identifier: MPL-2.0

//! Relevance ranks of search results. A lower rank is a better match.

use rustc_hash::FxHashMap;

use crate::identity::package_key;
use crate::search::SearchMetadata;

/// Rank of the entries for which nothing is known.
pub const DEFAULT_RANK: usize = usize::MAX;

/// Best known rank of each package id.
#[derive(Debug, Clone, Default)]
pub struct RankingIndex {
    ranks: FxHashMap<String, usize>,
}

impl RankingIndex {
    /// An index without any known rank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of a result list ordered best first: each entry is ranked by its position.
    pub fn from_ranked_list<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a SearchMetadata>,
    {
        let mut index = Self::new();
        for (position, entry) in entries.into_iter().enumerate() {
            index.record(&entry.identity.id, position);
        }
        index
    }

    /// Index ranking each entry by how well its id and text match a query.
    ///
    /// Exact id matches come first, then ids starting with the query,
    /// then ids containing it, then entries mentioning it in their title, tags or description.
    /// Entries not matching at all stay unranked.
    pub fn from_query<'a, I>(query: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a SearchMetadata>,
    {
        let mut index = Self::new();
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return index;
        }
        for entry in entries {
            if let Some(rank) = query_rank(&query, entry) {
                index.record(&entry.identity.id, rank);
            }
        }
        index
    }

    /// Record a rank for an id, keeping the best one already known.
    pub fn record(&mut self, id: &str, rank: usize) {
        let known = self.ranks.entry(package_key(id)).or_insert(rank);
        *known = (*known).min(rank);
    }

    /// Keep the best rank of each id known to either index.
    pub fn merge(&mut self, other: &RankingIndex) {
        for (key, rank) in &other.ranks {
            self.record(key, *rank);
        }
    }

    /// Known rank of an id.
    pub fn get(&self, id: &str) -> Option<usize> {
        self.ranks.get(&package_key(id)).copied()
    }

    /// Rank of an entry: its own rank if it has one, otherwise the rank
    /// of another entry with the same id, otherwise [DEFAULT_RANK].
    pub fn rank_of(&self, id: &str, own_rank: Option<usize>) -> usize {
        own_rank.or_else(|| self.get(id)).unwrap_or(DEFAULT_RANK)
    }

    /// Whether no rank is known.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

fn query_rank(query: &str, entry: &SearchMetadata) -> Option<usize> {
    let id = entry.identity.id.to_lowercase();
    if id == query {
        return Some(0);
    }
    if id.starts_with(query) {
        return Some(1);
    }
    if id.contains(query) {
        return Some(2);
    }
    let mentions = |text: &str| text.to_lowercase().contains(query);
    let in_text = entry.title.as_deref().map_or(false, mentions)
        || entry.tags.iter().any(|tag| mentions(tag))
        || entry.description.as_deref().map_or(false, mentions);
    if in_text {
        Some(3)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PackageIdentity;

    fn entry(id: &str) -> SearchMetadata {
        SearchMetadata::new(PackageIdentity::new(id, (1, 0, 0)))
    }

    #[test]
    fn known_inherited_and_default_ranks() {
        let ranked = vec![entry("A"), entry("B")];
        let index = RankingIndex::from_ranked_list(&ranked);
        assert_eq!(index.rank_of("A", Some(7)), 7);
        assert_eq!(index.rank_of("b", None), 1);
        assert_eq!(index.rank_of("C", None), DEFAULT_RANK);
    }

    #[test]
    fn best_rank_wins() {
        let mut index = RankingIndex::new();
        index.record("A", 4);
        index.record("a", 2);
        index.record("A", 3);
        assert_eq!(index.get("A"), Some(2));
    }

    #[test]
    fn merged_lists_keep_best_positions() {
        let first = vec![entry("A"), entry("B"), entry("C")];
        let second = vec![entry("c"), entry("D")];
        let mut index = RankingIndex::from_ranked_list(&first);
        index.merge(&RankingIndex::from_ranked_list(&second));
        assert_eq!(index.get("A"), Some(0));
        assert_eq!(index.get("B"), Some(1));
        assert_eq!(index.get("C"), Some(0));
        assert_eq!(index.get("D"), Some(1));
    }

    #[test]
    fn query_relevance() {
        let mut tagged = entry("Other");
        tagged.tags = vec!["JSON".to_string()];
        let entries = vec![entry("Json"), entry("Json.Net"), entry("FastJson"), tagged, entry("Xml")];
        let index = RankingIndex::from_query("json", &entries);
        assert_eq!(index.get("json"), Some(0));
        assert_eq!(index.get("Json.Net"), Some(1));
        assert_eq!(index.get("FastJson"), Some(2));
        assert_eq!(index.get("Other"), Some(3));
        assert_eq!(index.get("Xml"), None);
    }
}
