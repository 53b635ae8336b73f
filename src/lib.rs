//! # kres-core - Kernel Resolution & Cache Reconciliation Engine
//!
//! Resolves the set of kernel builds a CI pipeline must produce for a
//! fleet of Linux distributions. For every configured distribution
//! version it fetches the upstream file listing, matches filenames
//! against configured version patterns, reconciles the result with an
//! artifact-repository cache and emits a worklist of [`Kernel`]
//! entries.
//!
//! ## Listing sources
//!
//! - Plain HTTP index pages (Ubuntu and CentOS mirrors) scraped for
//!   `href` attributes
//! - The Red Hat subscription packages API, paginated and fetched by a
//!   three-worker stride fan-out
//! - GitHub release tags (minikube), each tag's buildroot defconfig
//!   resolved to the pinned kernel version
//!
//! ## Cache reconciliation
//!
//! When an artifact repository is configured the engine queries it once
//! per run, keys every artifact by `(distro, version, filename)` and
//! short-circuits downloads whose checksum already matches.
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │ upstream  │──▶│ matcher  │──▶│ worklist  │
//! │ listings  │   │ + cache  │   │ (Kernel)  │
//! └───────────┘   └──────────┘   └───────────┘
//! ```

pub mod artifact;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod matcher;
pub mod minikube;
pub mod report;
pub mod resolver;

pub use artifact::{ArtifactEntry, ArtifactStore, ArtifactoryClient, UploadStats};
pub use cache::KernelCache;
pub use config::{CustomConfig, DistroFamily, DistroVersion, Distribution, Distributions};
pub use errors::{KresError, Result};
pub use fetch::packages::{PackageApi, PackageFetch, RhApiClient, RhPackage};
pub use fetch::tags::{GithubTagClient, TagApi, TagPage};
pub use fetch::{HttpFetch, RetryingClient};
pub use matcher::{MatchOutcome, VersionMatch, VersionRange};
pub use minikube::MinikubeResolution;
pub use report::{ReportFormat, ResolutionReport};
pub use resolver::{FileSource, Kernel, Resolver, Status};

/// Crate version, surfaced by the CLI `--version` flag.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
