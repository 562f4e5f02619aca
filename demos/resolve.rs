// SPDX-License-Identifier: MPL-2.0

//! Restore a project against nuget.org.
//!
//! ```sh
//! RUST_LOG=info cargo run --example resolve -- project.json
//! ```
//!
//! Without argument, a small project depending on Serilog is restored.

use async_trait::async_trait;
use serde_json::Value;

use nuget_solve_deps::feed::{BoxError, JsonFetcher};
use nuget_solve_deps::project_config::{ProjectConfig, ResolverConfig};
use nuget_solve_deps::registration::RegistrationSource;
use nuget_solve_deps::solver::Resolver;

/// ureq does not decompress the gzip flavors of the registrations.
const REGISTRATION: &str = "https://api.nuget.org/v3/registration5-semver1/";

const DEFAULT_PROJECT: &str = r#"{
    "framework": "net6.0",
    "dependencies": {
        "Serilog.Sinks.Console": "[4.0.0, )",
        "Newtonsoft.Json": "[13.0.1, )"
    }
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let project = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEFAULT_PROJECT.to_string(),
    };
    let project = ProjectConfig::from_json(&project)?;
    let config = ResolverConfig {
        sources: vec![RegistrationSource::new(REGISTRATION)],
        ..ResolverConfig::default()
    };
    let resolver = Resolver::new(UreqFeed, &config)?;

    let requests = project.requests();
    let include_prerelease = project.include_prerelease.unwrap_or(config.include_prerelease);
    let graph = resolver
        .resolve_dependency_graph(&requests, &project.framework, include_prerelease, &project.allowed_versions)
        .await?;
    eprintln!("{}", graph.render_tree());

    let solution = resolver.solve(&graph, &requests)?;
    println!("{}", serde_json::to_string_pretty(&solution)?);
    Ok(())
}

/// Blocking HTTP client moved to the blocking thread pool.
struct UreqFeed;

#[async_trait]
impl JsonFetcher for UreqFeed {
    async fn fetch_json(&self, uri: &str) -> Result<Option<Value>, BoxError> {
        let uri = uri.to_string();
        tokio::task::spawn_blocking(move || http_fetch(&uri)).await?
    }
}

fn http_fetch(url: &str) -> Result<Option<Value>, BoxError> {
    let response = ureq::get(url).timeout_connect(10_000).call();
    if response.status() == 404 {
        return Ok(None);
    }
    if let Some(err) = response.synthetic_error() {
        return Err(format!("{}: {}", url, err).into());
    }
    if !response.ok() {
        return Err(format!("{} answered {}", url, response.status()).into());
    }
    let body = response.into_string()?;
    Ok(Some(serde_json::from_str(&body)?))
}
