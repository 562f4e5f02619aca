// SPDX-License-Identifier: MPL-2.0

//! Search results returned by package feeds, and the merge of two results
//! describing the same package.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::identity::PackageIdentity;
use crate::version::NuGetVersion;

/// One package in a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    /// Id and latest version of the package.
    #[serde(flatten)]
    pub identity: PackageIdentity,
    /// Every version offered by the feed.
    #[serde(default, deserialize_with = "version_entries")]
    pub versions: BTreeSet<NuGetVersion>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Long description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Authors of the package.
    #[serde(default, deserialize_with = "one_or_many")]
    pub authors: Vec<String>,
    /// Icon location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Project home page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    /// Search tags.
    #[serde(default, deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    /// Downloads across all versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_downloads: Option<u64>,
    /// Whether the id prefix is reserved by the owner.
    #[serde(default)]
    pub verified: bool,
}

/// A page of search results as returned by a search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Number of matching packages on the feed, beyond this page.
    #[serde(default)]
    pub total_hits: u64,
    /// Results, best match first.
    #[serde(default)]
    pub data: Vec<SearchMetadata>,
}

impl SearchPage {
    /// Decode a search response.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl SearchMetadata {
    /// Metadata with only an identity, listing its own version.
    pub fn new(identity: PackageIdentity) -> Self {
        Self {
            versions: std::iter::once(identity.version.clone()).collect(),
            identity,
            title: None,
            description: None,
            summary: None,
            authors: Vec::new(),
            icon_url: None,
            project_url: None,
            tags: Vec::new(),
            total_downloads: None,
            verified: false,
        }
    }

    /// Lowercase package id.
    pub fn key(&self) -> String {
        self.identity.key()
    }
}

/// Merge two results for the same package.
///
/// Descriptive fields come from the result with the strictly greater version,
/// or from `a` when both versions are equal. Versions are the union of both sets.
///
/// # Panics
///
/// If the two results are for different package ids.
pub fn merge_entries(a: SearchMetadata, b: SearchMetadata) -> SearchMetadata {
    assert!(
        a.identity.id.eq_ignore_ascii_case(&b.identity.id),
        "Cannot merge search results of different packages: {} and {}",
        a.identity,
        b.identity
    );
    let (mut newest, other) = if b.identity.version > a.identity.version {
        (b, a)
    } else {
        (a, b)
    };
    newest.versions.extend(other.versions);
    newest
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionEntry {
    Plain(NuGetVersion),
    Detailed { version: NuGetVersion },
}

fn version_entries<'de, D>(deserializer: D) -> Result<BTreeSet<NuGetVersion>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<VersionEntry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            VersionEntry::Plain(version) | VersionEntry::Detailed { version } => version,
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(many) => many,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, version: &str, versions: &[&str], title: &str) -> SearchMetadata {
        let mut metadata = SearchMetadata::new(PackageIdentity::new(id, version.parse::<NuGetVersion>().unwrap()));
        metadata.versions = versions.iter().map(|v| v.parse().unwrap()).collect();
        metadata.title = Some(title.to_string());
        metadata
    }

    #[test]
    fn newest_description_and_version_union() {
        let old = entry("Pkg", "1.0.0", &["0.9.0", "1.0.0"], "old");
        let new = entry("pkg", "2.0.0", &["1.0.0", "2.0.0"], "new");
        for merged in [merge_entries(old.clone(), new.clone()), merge_entries(new, old)] {
            assert_eq!(merged.title.as_deref(), Some("new"));
            assert_eq!(merged.identity.version, "2.0.0".parse::<NuGetVersion>().unwrap());
            let versions: Vec<String> = merged.versions.iter().map(|v| v.to_string()).collect();
            assert_eq!(versions, vec!["0.9.0", "1.0.0", "2.0.0"]);
        }
    }

    #[test]
    fn equal_versions_keep_the_first() {
        let a = entry("Pkg", "1.0.0", &["1.0.0"], "first");
        let b = entry("Pkg", "1.0.0", &["1.0.0"], "second");
        assert_eq!(merge_entries(a, b).title.as_deref(), Some("first"));
    }

    #[test]
    fn merging_with_itself_is_identity() {
        let a = entry("Pkg", "1.0.0", &["0.1.0", "1.0.0"], "t");
        assert_eq!(merge_entries(a.clone(), a.clone()), a);
    }

    #[test]
    #[should_panic(expected = "Foo@1.0.0 and Bar@1.0.0")]
    fn merging_different_packages_panics() {
        merge_entries(entry("Foo", "1.0.0", &[], "f"), entry("Bar", "1.0.0", &[], "b"));
    }

    #[test]
    fn decode_search_page() {
        let page = SearchPage::from_json(
            r#"{
                "totalHits": 1,
                "data": [{
                    "id": "Newtonsoft.Json",
                    "version": "13.0.3",
                    "description": "Json.NET",
                    "authors": "James Newton-King",
                    "tags": ["json"],
                    "totalDownloads": 42,
                    "verified": true,
                    "versions": [{ "version": "12.0.1", "downloads": 1 }, { "version": "13.0.3", "downloads": 2 }]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(page.total_hits, 1);
        let result = &page.data[0];
        assert_eq!(result.identity.to_string(), "Newtonsoft.Json@13.0.3");
        assert_eq!(result.authors, vec!["James Newton-King"]);
        assert_eq!(result.versions.len(), 2);
        assert!(result.verified);
    }
}
