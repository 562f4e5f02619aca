// SPDX-License-Identifier: MPL-2.0

//! # Dependency resolution for NuGet packages
//!
//! The nuget-solve-deps crate provides a set of types, functions and traits
//! to resolve the dependencies of .NET projects against NuGet feeds.
//! Version selection is based on the [pubgrub crate][pubgrub].
//!
//! [pubgrub]: https://github.com/pubgrub-rs/pubgrub
//!
//! Resolution starts from the direct dependencies of a project and its target framework:
//!
//! ```json
//! {
//!   "framework": "net6.0",
//!   "dependencies": {
//!     "Serilog.Sinks.Console": "[4.1.0, )",
//!     "Newtonsoft.Json": "13.0.1"
//!   },
//!   "allowedVersions": {
//!     "Serilog": "(, 3.0.0)"
//!   }
//! }
//! ```
//!
//! It then goes through three steps.
//!
//! 1. **Gathering.** The registration of every requested package is fetched,
//!    keeping only the pages relevant to the requested range.
//!    The dependencies declared for the framework nearest to the project's framework
//!    are requested in turn, until every reachable package is known.
//!    The result is a [`graph::DependencyGraph`] where each package id has
//!    a single registration shared by all the packages depending on it.
//! 2. **Trimming.** Versions outside the allowed versions are removed from the graph,
//!    as well as every version left with a dependency no remaining version satisfies.
//! 3. **Selection.** One version per package is chosen with pubgrub,
//!    newest first by default, and split into direct and indirect dependencies:
//!
//! ```json
//! {
//!   "direct": {
//!     "Newtonsoft.Json": "13.0.3",
//!     "Serilog.Sinks.Console": "5.0.1"
//!   },
//!   "indirect": {
//!     "Serilog": "2.12.0"
//!   }
//! }
//! ```
//!
//! ## Resolver
//!
//! The [`solver::Resolver`] performs all three steps.
//! It does not know how to talk to a feed: documents are retrieved through
//! a [`feed::JsonFetcher`], an async trait to implement with the HTTP client of your choice.
//!
//! ```no_run
//! # use nuget_solve_deps::feed::MemoryFeed;
//! # use nuget_solve_deps::project_config::{ProjectConfig, ResolverConfig};
//! # use nuget_solve_deps::solver::Resolver;
//! # async fn run(feed: MemoryFeed) -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = Resolver::new(feed, &ResolverConfig::default())?;
//! let project = ProjectConfig::from_json(&std::fs::read_to_string("restore.json")?)?;
//! let solution = resolver.restore(&project).await?;
//! println!("{}", serde_json::to_string_pretty(&solution)?);
//! # Ok(())
//! # }
//! ```
//!
//! At most [`max_concurrent_requests`](project_config::ResolverConfig::max_concurrent_requests)
//! documents are fetched at the same time.
//! A resolution can be aborted with the resolver's
//! [cancellation token](solver::Resolver::cancellation_token),
//! in which case no partial graph is returned.
//!
//! The steps are also available separately:
//! [`gather`](solver::Resolver::gather),
//! [`resolve_dependency_graph`](solver::Resolver::resolve_dependency_graph) (gather and trim),
//! [`trim::trim_by_allowed_versions`] and [`solve`](solver::Resolver::solve).
//!
//! ## Search results
//!
//! Searching several feeds for the same query gives several ordered result lists.
//! [`aggregate::aggregate`] merges them into one list without duplicates,
//! merging the entries of the same package with [`search::merge_entries`]
//! and keeping the relative order of every input list.
//!
//! ## Other helper modules
//!
//! - [`version`] and [`version_range`]: NuGet versions and version ranges.
//! - [`identity`]: package identities and requests.
//! - [`framework`]: target frameworks and the choice of the nearest dependency group.
//! - [`registration`]: the registration documents and their retrieval.
//! - [`ranking`]: relevance ranks of search results.
//! - [`dependency_provider`]: the pubgrub dependency provider over a gathered graph.

#![warn(missing_docs)]

pub mod aggregate;
pub mod dependency_provider;
pub mod feed;
pub mod framework;
pub mod gather;
pub mod graph;
pub mod identity;
pub mod project_config;
pub mod ranking;
pub mod registration;
pub mod search;
pub mod solver;
pub mod trim;
pub mod version;
pub mod version_range;
