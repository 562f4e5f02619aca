// SPDX-License-Identifier: MPL-2.0

//! Retrieval of the registration metadata of a package.
//!
//! A registration index lists pages, each one covering the versions between
//! its `lower` and `upper` bounds. Small indexes inline the leaves of every page,
//! large ones only reference pages that must be fetched separately.
//! Only pages relevant to the requested range are downloaded.

use futures::future::try_join_all;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::feed::{BoxError, JsonFetcher};
use crate::identity::package_key;
use crate::version::NuGetVersion;
use crate::version_range::VersionRange;

// Wire format #################################################################

/// Top level registration document of a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationIndex {
    /// Pages of the registration, ordered by version.
    #[serde(default)]
    pub items: Vec<RegistrationPage>,
}

/// A page of a registration, covering the versions in `[lower, upper]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationPage {
    /// URI of the page document, used when `items` is not inlined.
    #[serde(rename = "@id")]
    pub id: String,
    /// Lowest version of the page.
    pub lower: NuGetVersion,
    /// Highest version of the page.
    pub upper: NuGetVersion,
    /// Leaves of the page, absent when the page must be fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<RegistrationLeaf>>,
}

/// One package version in a registration page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationLeaf {
    /// Metadata of the package version.
    pub catalog_entry: CatalogEntry,
    /// Download URI of the package archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_content: Option<String>,
}

/// Metadata of a package version relevant for dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Package id as spelled by its author.
    pub id: String,
    /// Package version.
    pub version: NuGetVersion,
    /// Unlisted versions are hidden from search but still restorable.
    #[serde(default = "listed_by_default")]
    pub listed: bool,
    /// Dependencies, grouped by target framework.
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroup>,
}

/// Dependencies of a package version for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGroup {
    /// Short or long framework name, absent for "any framework".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<String>,
    /// The dependencies of the group.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

/// A dependency as declared in a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Id of the dependency.
    pub id: String,
    /// Accepted versions, every version when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<VersionRange>,
}

fn listed_by_default() -> bool {
    true
}

// Errors ######################################################################

/// Failure while retrieving registration metadata.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// A page referenced by a registration index does not exist.
    #[error("Registration page {uri} of package {package_id} was not found")]
    PageNotFound {
        /// URI of the missing page.
        uri: String,
        /// Package whose registration references the page.
        package_id: String,
    },
    /// A document could not be decoded.
    #[error("Malformed registration document {uri}")]
    MalformedDocument {
        /// URI of the document.
        uri: String,
        /// Decoding error.
        source: serde_json::Error,
    },
    /// A fetched page does not contain its leaves.
    #[error("Registration page {uri} does not list its package versions")]
    MissingItems {
        /// URI of the page.
        uri: String,
    },
    /// A dependency group targets a framework that cannot be parsed.
    #[error("Package {package} declares dependencies for an invalid framework")]
    InvalidFramework {
        /// Package declaring the dependency group.
        package: String,
        /// Parsing error.
        source: crate::framework::FrameworkParseError,
    },
    /// The transport failed.
    #[error("Failed to fetch {uri}")]
    Transport {
        /// URI of the document.
        uri: String,
        /// Error reported by the [JsonFetcher].
        source: BoxError,
    },
    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,
}

// Sources #####################################################################

/// Base address of the registrations of a feed.
///
/// The address is either a template containing `{id-lower}` or `{id}`,
/// or a base URL under which each package has a `{id-lower}/index.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationSource {
    url: String,
}

impl RegistrationSource {
    /// Source from a registration base URL or URI template.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self { url: url.into() }
    }

    /// The URL or template this source was created with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URI of the registration index of a package.
    pub fn index_uri(&self, package_id: &str) -> String {
        if self.url.contains("{id-lower}") {
            self.url.replace("{id-lower}", &package_key(package_id))
        } else if self.url.contains("{id}") {
            self.url.replace("{id}", package_id)
        } else {
            format!(
                "{}/{}/index.json",
                self.url.trim_end_matches('/'),
                package_key(package_id)
            )
        }
    }
}

// Fetching ####################################################################

/// Whether a page covering `[lower, upper]` may hold versions satisfying `range`.
///
/// A range bounded on both sides selects the pages containing one of its bounds.
/// Otherwise a page is selected when one of its own bounds is inside the range.
pub fn page_is_relevant(range: &VersionRange, lower: &NuGetVersion, upper: &NuGetVersion) -> bool {
    match (range.min_version(), range.max_version()) {
        (Some(min), Some(max)) => {
            let page = VersionRange::between_inclusive(lower.clone(), upper.clone());
            page.satisfies(min) || page.satisfies(max)
        }
        _ => range.satisfies(lower) || range.satisfies(upper),
    }
}

/// Download registration documents through a [JsonFetcher],
/// with a bounded number of requests in flight.
pub struct RegistrationFetcher<F> {
    feed: F,
    limiter: Semaphore,
    cancel: CancellationToken,
}

impl<F: JsonFetcher> RegistrationFetcher<F> {
    /// At most `max_concurrent_requests` documents are fetched simultaneously.
    pub fn new(feed: F, max_concurrent_requests: usize, cancel: CancellationToken) -> Self {
        Self {
            feed,
            limiter: Semaphore::new(max_concurrent_requests),
            cancel,
        }
    }

    /// The token cancelling every operation of this fetcher.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The underlying feed.
    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Fetch the registration pages of `package_id` relevant to `range`,
    /// with their leaves, in index order.
    ///
    /// A package without registration has no pages.
    pub async fn fetch_pages(
        &self,
        source: &RegistrationSource,
        package_id: &str,
        range: &VersionRange,
    ) -> Result<Vec<RegistrationPage>, RegistrationError> {
        let mut pages = self.fetch_index(source, package_id).await?;
        pages.retain(|page| page_is_relevant(range, &page.lower, &page.upper));
        self.complete_pages(package_id, &mut pages, range).await?;
        Ok(pages)
    }

    /// Fetch the pages listed by the registration index of `package_id`,
    /// leaves included only where the index inlines them.
    ///
    /// A package without registration has no pages.
    pub async fn fetch_index(
        &self,
        source: &RegistrationSource,
        package_id: &str,
    ) -> Result<Vec<RegistrationPage>, RegistrationError> {
        let index_uri = source.index_uri(package_id);
        match self.fetch_document(&index_uri).await? {
            Some(document) => Ok(decode::<RegistrationIndex>(&index_uri, document)?.items),
            None => {
                debug!("No registration for {} at {}", package_id, index_uri);
                Ok(Vec::new())
            }
        }
    }

    /// Fetch the leaves of the pages relevant to `range` that do not have them yet.
    /// Pages already holding their leaves are not fetched again.
    pub async fn complete_pages(
        &self,
        package_id: &str,
        pages: &mut [RegistrationPage],
        range: &VersionRange,
    ) -> Result<(), RegistrationError> {
        let missing = pages
            .iter_mut()
            .filter(|page| page.items.is_none() && page_is_relevant(range, &page.lower, &page.upper))
            .map(move |page| async move {
                let fetched = self.fetch_page(package_id, &page.id).await?;
                *page = fetched;
                Ok::<_, RegistrationError>(())
            });
        try_join_all(missing).await?;
        Ok(())
    }

    async fn fetch_page(&self, package_id: &str, uri: &str) -> Result<RegistrationPage, RegistrationError> {
        let document = self
            .fetch_document(uri)
            .await?
            .ok_or_else(|| RegistrationError::PageNotFound {
                uri: uri.to_string(),
                package_id: package_id.to_string(),
            })?;
        let page: RegistrationPage = decode(uri, document)?;
        if page.items.is_none() {
            return Err(RegistrationError::MissingItems {
                uri: uri.to_string(),
            });
        }
        Ok(page)
    }

    async fn fetch_document(&self, uri: &str) -> Result<Option<Value>, RegistrationError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RegistrationError::Cancelled),
            permit = self.limiter.acquire() => permit.map_err(|_| RegistrationError::Cancelled)?,
        };
        debug!("Fetching {}", uri);
        let document = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RegistrationError::Cancelled),
            result = self.feed.fetch_json(uri) => result.map_err(|source| RegistrationError::Transport {
                uri: uri.to_string(),
                source,
            })?,
        };
        trace!("Fetched {} (found: {})", uri, document.is_some());
        Ok(document)
    }
}

fn decode<T: serde::de::DeserializeOwned>(uri: &str, document: Value) -> Result<T, RegistrationError> {
    serde_json::from_value(document).map_err(|source| RegistrationError::MalformedDocument {
        uri: uri.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> NuGetVersion {
        s.parse().unwrap()
    }

    fn r(s: &str) -> VersionRange {
        s.parse().unwrap()
    }

    #[test]
    fn bounded_range_selects_pages_holding_a_bound() {
        let range = r("[1.5, 2.5]");
        assert!(page_is_relevant(&range, &v("1.0"), &v("2.0")));
        assert!(page_is_relevant(&range, &v("2.0"), &v("3.0")));
        assert!(!page_is_relevant(&range, &v("3.0"), &v("4.0")));
        assert!(!page_is_relevant(&range, &v("0.1"), &v("0.9")));
    }

    #[test]
    fn half_open_range_selects_pages_with_a_bound_inside() {
        let range = r("[2.0, )");
        assert!(!page_is_relevant(&range, &v("1.0"), &v("1.9")));
        assert!(page_is_relevant(&range, &v("1.0"), &v("2.0")));
        assert!(page_is_relevant(&range, &v("3.0"), &v("4.0")));
        let all = VersionRange::all();
        assert!(page_is_relevant(&all, &v("0.1"), &v("0.2")));
    }

    #[test]
    fn index_uri_templates() {
        let base = RegistrationSource::new("https://example.org/reg/");
        assert_eq!(
            base.index_uri("Newtonsoft.Json"),
            "https://example.org/reg/newtonsoft.json/index.json"
        );
        let lower = RegistrationSource::new("https://example.org/{id-lower}/index.json");
        assert_eq!(lower.index_uri("A.B"), "https://example.org/a.b/index.json");
        let verbatim = RegistrationSource::new("https://example.org/{id}.json");
        assert_eq!(verbatim.index_uri("A.B"), "https://example.org/A.B.json");
    }

    #[test]
    fn leaf_defaults() {
        let leaf: RegistrationLeaf = serde_json::from_value(serde_json::json!({
            "catalogEntry": { "id": "A", "version": "1.0.0" }
        }))
        .unwrap();
        assert!(leaf.catalog_entry.listed);
        assert!(leaf.catalog_entry.dependency_groups.is_empty());
        assert_eq!(leaf.package_content, None);
    }

    #[test]
    fn entry_without_version_is_malformed() {
        let result: Result<RegistrationLeaf, _> = decode(
            "uri",
            serde_json::json!({ "catalogEntry": { "id": "A" } }),
        );
        assert!(matches!(
            result,
            Err(RegistrationError::MalformedDocument { .. })
        ));
    }
}
