// SPDX-License-Identifier: MPL-2.0

//! Shared helpers to build in-memory feeds for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use nuget_solve_deps::feed::MemoryFeed;
use nuget_solve_deps::project_config::ResolverConfig;
use nuget_solve_deps::registration::RegistrationSource;
use nuget_solve_deps::solver::Resolver;

pub const BASE: &str = "https://feed.test/registration";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn index_uri(id: &str) -> String {
    format!("{}/{}/index.json", BASE, id.to_lowercase())
}

pub fn page_uri(id: &str, lower: &str, upper: &str) -> String {
    format!("{}/{}/page/{}/{}.json", BASE, id.to_lowercase(), lower, upper)
}

/// A leaf with a single dependency group valid for any framework.
pub fn leaf(id: &str, version: &str, dependencies: &[(&str, &str)]) -> Value {
    let dependencies: Vec<Value> = dependencies
        .iter()
        .map(|(dep, range)| json!({ "id": dep, "range": range }))
        .collect();
    json!({
        "catalogEntry": {
            "id": id,
            "version": version,
            "dependencyGroups": [{ "dependencies": dependencies }]
        },
        "packageContent": format!("https://feed.test/content/{}/{}.nupkg", id.to_lowercase(), version)
    })
}

/// An index with a single page holding its leaves inline.
pub fn inline_index(id: &str, leaves: Vec<Value>) -> Value {
    let versions: Vec<&str> = leaves
        .iter()
        .filter_map(|l| l["catalogEntry"]["version"].as_str())
        .collect();
    let lower = versions.first().copied().unwrap_or("0.0.0");
    let upper = versions.last().copied().unwrap_or("0.0.0");
    json!({
        "items": [{
            "@id": page_uri(id, lower, upper),
            "lower": lower,
            "upper": upper,
            "items": leaves
        }]
    })
}

/// Feed builder where every package has an inline index.
#[derive(Default)]
pub struct Packages {
    leaves: BTreeMap<String, (String, Vec<Value>)>,
}

impl Packages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version of `id` with its dependencies, as `(id, range)` pairs.
    pub fn version(mut self, id: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        self.leaves
            .entry(id.to_lowercase())
            .or_insert_with(|| (id.to_string(), Vec::new()))
            .1
            .push(leaf(id, version, dependencies));
        self
    }

    pub fn feed(self) -> MemoryFeed {
        let mut feed = MemoryFeed::new();
        for (id, leaves) in self.leaves.into_values() {
            feed.insert(index_uri(&id), inline_index(&id, leaves));
        }
        feed
    }

    pub fn shared(self) -> Arc<MemoryFeed> {
        Arc::new(self.feed())
    }
}

pub fn config() -> ResolverConfig {
    ResolverConfig {
        sources: vec![RegistrationSource::new(BASE)],
        max_concurrent_requests: 4,
        ..ResolverConfig::default()
    }
}

pub fn resolver(feed: Arc<MemoryFeed>) -> Resolver<Arc<MemoryFeed>> {
    Resolver::new(feed, &config()).unwrap()
}
