// SPDX-License-Identifier: MPL-2.0

//! Access to the JSON documents served by a package feed.
//!
//! The transport (HTTP client, retries, caching, timeouts) is not part of this crate.
//! It is plugged in by implementing [JsonFetcher].
//! A [MemoryFeed] serving documents from memory is provided for tests and tooling.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Error type of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Retrieve a JSON document by its URI.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    /// `Ok(None)` means the document does not exist (HTTP 404).
    /// Any other failure is an error.
    async fn fetch_json(&self, uri: &str) -> Result<Option<Value>, BoxError>;
}

#[async_trait]
impl<T: JsonFetcher + ?Sized> JsonFetcher for Arc<T> {
    async fn fetch_json(&self, uri: &str) -> Result<Option<Value>, BoxError> {
        (**self).fetch_json(uri).await
    }
}

#[async_trait]
impl<T: JsonFetcher + ?Sized> JsonFetcher for &T {
    async fn fetch_json(&self, uri: &str) -> Result<Option<Value>, BoxError> {
        (**self).fetch_json(uri).await
    }
}

/// A feed holding its documents in memory, keyed by URI.
///
/// Every request is recorded, which lets tests check what was fetched.
#[derive(Debug, Default)]
pub struct MemoryFeed {
    documents: HashMap<String, Value>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFeed {
    /// An empty feed, every request is answered with "not found".
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` at `uri`.
    pub fn with_document<S: Into<String>>(mut self, uri: S, document: Value) -> Self {
        self.insert(uri, document);
        self
    }

    /// Requests to `uri` fail with a transport error.
    pub fn with_failure<S: Into<String>>(mut self, uri: S) -> Self {
        self.failing.insert(uri.into());
        self
    }

    /// Serve `document` at `uri`, replacing any previous one.
    pub fn insert<S: Into<String>>(&mut self, uri: S, document: Value) {
        self.documents.insert(uri.into(), document);
    }

    /// All requested URIs, in request order.
    pub fn requested_uris(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of times `uri` was requested.
    pub fn request_count(&self, uri: &str) -> usize {
        self.requested_uris().iter().filter(|u| *u == uri).count()
    }
}

#[async_trait]
impl JsonFetcher for MemoryFeed {
    async fn fetch_json(&self, uri: &str) -> Result<Option<Value>, BoxError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(uri.to_string());
        if self.failing.contains(uri) {
            return Err(format!("connection refused while fetching {}", uri).into());
        }
        Ok(self.documents.get(uri).cloned())
    }
}
