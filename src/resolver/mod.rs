//! Kernel list assembly
//!
//! Drives the per-distribution-version state machine: obtain a raw
//! listing with the family's fetch strategy, group matched filenames
//! by resolved version key, reconcile against the cache index, and
//! synthesize the final deduplicated, validated list of build targets
//! including custom-configuration variants.
//!
//! Grouping uses ordered maps throughout so two runs over the same
//! listings produce identical output regardless of fetch timing.

use crate::cache::KernelCache;
use crate::config::{Distribution, DistroFamily, DistroVersion};
use crate::errors::{KresError, Result};
use crate::fetch::packages::{fetch_packages, resolve_packages, PackageApi};
use crate::fetch::tags::{fetch_tag_listing, TagApi};
use crate::fetch::{index, HttpFetch};
use crate::matcher::{match_version, MatchOutcome, VersionRange};
use crate::minikube::resolve_tag_versions;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use std::collections::BTreeMap;

/// Upstream package naming omits the suffix Ubuntu kernels report at
/// runtime; the assembler restores it. Policy constant, not parsed.
const UBUNTU_LOCAL_VERSION: &str = "-generic";

/// Package name filter applied inside the paginated catalog fetch.
const RHEL_PACKAGE_NAME: &str = "kernel-devel";

/// Tri-state progress marker for the later pipeline stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Fail,
    Success,
}

/// Where one required file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum FileSource {
    /// A real, fetchable location.
    Remote { url: String },
    /// Cache-verified by checksum; nothing to download. Kept as a
    /// distinct variant so no consumer mistakes it for a URL.
    AlreadySatisfied { filename: String },
}

impl FileSource {
    pub fn remote(url: &str) -> Self {
        FileSource::Remote {
            url: url.to_string(),
        }
    }

    /// Basename of the file, for cache lookups and dedup.
    pub fn file_name(&self) -> Option<String> {
        match self {
            FileSource::AlreadySatisfied { filename } => Some(filename.clone()),
            FileSource::Remote { url } => {
                let parsed = Url::parse(url).ok()?;
                parsed
                    .path_segments()?
                    .filter(|s| !s.is_empty())
                    .next_back()
                    .map(|s| s.to_string())
            }
        }
    }
}

/// One resolved build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kernel {
    /// Resolved version key, e.g. "5.4" or "5.10.7".
    pub name: String,
    pub files: Vec<FileSource>,
    pub distro: DistroFamily,
    pub distro_version: String,
    /// Tags that resolved to this kernel (minikube only, reporting).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub minikube_versions: Vec<String>,
    /// Suffix distinguishing a variant build from the base build.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<BTreeMap<String, String>>,
    pub required: bool,
    pub downloaded: Status,
    pub extracted: Status,
    pub compiled: Status,
}

impl Kernel {
    /// Build identity: name plus local-version suffix.
    pub fn full_name(&self) -> String {
        format!("{}{}", self.name, self.local_version)
    }
}

/// Resolution engine for one run. Borrows the injected collaborators
/// and the run-wide read-only cache index.
pub struct Resolver<'a, C, P, T> {
    http: &'a C,
    packages: &'a P,
    tags: &'a T,
    cache: &'a KernelCache,
    /// Cache-synchronization mode: listings come from the upstreams
    /// and cache membership decides per-kernel download status. When
    /// off, cache-enabled versions list the artifact mirror instead.
    sync_cache: bool,
}

impl<'a, C, P, T> Resolver<'a, C, P, T>
where
    C: HttpFetch,
    P: PackageApi,
    T: TagApi,
{
    pub fn new(http: &'a C, packages: &'a P, tags: &'a T, cache: &'a KernelCache, sync_cache: bool) -> Self {
        Self {
            http,
            packages,
            tags,
            cache,
            sync_cache,
        }
    }

    /// Resolve every configured version of one distribution and
    /// validate its required kernels. Fatal errors abort the whole
    /// distribution, not just the version that raised them.
    pub async fn resolve_distribution(&self, distribution: &Distribution) -> Result<Vec<Kernel>> {
        let parsers = compile_parsers(&distribution.parser)?;
        let mut kernels: Vec<Kernel> = Vec::new();

        for version in &distribution.versions {
            let (grouped, aliases) = self.listing_for_version(distribution, version, &parsers).await?;
            tracing::debug!(
                distro = %distribution.name,
                version = %version.name,
                targets = grouped.len(),
                "grouped upstream listing"
            );

            for (key, files) in grouped {
                let downloaded = self.download_status(distribution.name, version, &files);
                let minikube_versions = aliases.get(&key).cloned().unwrap_or_default();
                let local_version = if distribution.name == DistroFamily::Ubuntu {
                    UBUNTU_LOCAL_VERSION.to_string()
                } else {
                    String::new()
                };

                let base = Kernel {
                    name: key.clone(),
                    files: files.clone(),
                    distro: distribution.name,
                    distro_version: version.name.clone(),
                    minikube_versions,
                    local_version,
                    custom_config: None,
                    required: false,
                    downloaded,
                    extracted: Status::Unknown,
                    compiled: Status::Unknown,
                };

                // Variant builds share the file set but are independent
                // entries, never merged with the base kernel.
                let mut variants = Vec::new();
                for custom in &version.custom_configs {
                    if custom.kernel_name != key {
                        continue;
                    }
                    let mut properties = custom.properties.clone();
                    properties.insert(
                        "CONFIG_LOCALVERSION".to_string(),
                        custom.local_version_suffix.clone(),
                    );
                    let mut variant = base.clone();
                    variant.local_version = custom.local_version_suffix.clone();
                    variant.custom_config = Some(properties);
                    variants.push(variant);
                }
                kernels.push(base);
                kernels.extend(variants);
            }
        }

        validate_required(&distribution.name.to_string(), &distribution.required_versions, &mut kernels)?;
        Ok(kernels)
    }

    async fn listing_for_version(
        &self,
        distribution: &Distribution,
        version: &DistroVersion,
        parsers: &[Regex],
    ) -> Result<(BTreeMap<String, Vec<FileSource>>, BTreeMap<String, Vec<String>>)> {
        let no_aliases = BTreeMap::new();

        // Cache-read mode lists previously uploaded files from the
        // artifact mirror for every family but minikube, which always
        // goes through tag resolution (only its archive URLs move).
        if !self.sync_cache
            && distribution.name != DistroFamily::Minikube
            && version.artifactory_cache
        {
            let listing = index::fetch_href_list(self.http, &version.base_url).await?;
            return Ok((group_listing(&listing, version, parsers)?, no_aliases));
        }

        match distribution.name {
            DistroFamily::Rhel => {
                let name_pattern = Regex::new(RHEL_PACKAGE_NAME)?;
                let fetch = fetch_packages(self.packages, &version.rh_repository, &name_pattern).await;
                if let Some(failure) = &fetch.failure {
                    if fetch.packages.is_empty() {
                        return Err(KresError::UpstreamFetch(failure.clone()));
                    }
                    // Flaky by design upstream: several requests carry
                    // no kernel packages. Continue with what arrived.
                    tracing::error!(
                        version = %version.name,
                        error = %failure,
                        "package catalog fetch degraded, continuing with partial results"
                    );
                }
                let grouped = resolve_packages(
                    self.packages,
                    &fetch.packages,
                    &distribution.name.to_string(),
                    version,
                    parsers,
                    self.cache,
                )
                .await?;
                Ok((grouped, no_aliases))
            }
            DistroFamily::Ubuntu | DistroFamily::Centos => {
                let listing = index::fetch_href_list(self.http, &version.base_url).await?;
                Ok((group_listing(&listing, version, parsers)?, no_aliases))
            }
            DistroFamily::Minikube => {
                let listing = fetch_tag_listing(self.http, self.tags, &version.base_url).await?;
                let grouped = group_listing(&listing, version, parsers)?;
                let matched_tags: Vec<String> = grouped.into_keys().collect();
                let resolution = resolve_tag_versions(self.http, &matched_tags, version).await?;
                Ok((resolution.files, resolution.aliases))
            }
        }
    }

    /// Download status policy: in sync mode a kernel counts as
    /// downloaded when every one of its files is cache-verified, or
    /// unconditionally when caching is disabled for the version
    /// (caching is opt-in; "downloaded" doubles as the skip signal).
    fn download_status(
        &self,
        distro: DistroFamily,
        version: &DistroVersion,
        files: &[FileSource],
    ) -> Status {
        if !self.sync_cache {
            return Status::Unknown;
        }
        if !version.artifactory_cache {
            return Status::Success;
        }
        if self.all_files_cached(distro, &version.name, files) {
            Status::Success
        } else {
            Status::Unknown
        }
    }

    fn all_files_cached(&self, distro: DistroFamily, version: &str, files: &[FileSource]) -> bool {
        if self.cache.is_empty() {
            return false;
        }
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            if !self.cache.contains(&distro.to_string(), version, &name) {
                return false;
            }
        }
        true
    }
}

fn compile_parsers(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                KresError::Configuration(format!("invalid parser pattern {:?}: {}", p, e))
            })
        })
        .collect()
}

/// Group a raw filename listing by resolved version key. Every
/// configured pattern that matches contributes; unmatched filenames
/// are upstream noise and are dropped.
pub fn group_listing(
    listing: &[String],
    version: &DistroVersion,
    parsers: &[Regex],
) -> Result<BTreeMap<String, Vec<FileSource>>> {
    let range = VersionRange::parse(&version.min_version, &version.max_version)?;
    let mut grouped: BTreeMap<String, Vec<FileSource>> = BTreeMap::new();
    for file in listing {
        for parser in parsers {
            match match_version(file, parser, &range) {
                MatchOutcome::InRange(matched) => {
                    let url = format!("{}/{}", version.base_url, matched.matched_text());
                    grouped
                        .entry(matched.key())
                        .or_default()
                        .push(FileSource::Remote { url });
                }
                MatchOutcome::OutOfRange | MatchOutcome::NoMatch => {}
            }
        }
    }
    Ok(grouped)
}

/// Check every declared required kernel identity against the assembled
/// list, flagging matches. All misses are reported in one error so the
/// operator gets complete feedback in a single run.
pub fn validate_required(
    distro: &str,
    required_versions: &[String],
    kernels: &mut [Kernel],
) -> Result<()> {
    let mut missing = Vec::new();
    for required in required_versions {
        let mut found = false;
        for kernel in kernels.iter_mut() {
            if kernel.full_name() == *required {
                kernel.required = true;
                found = true;
            }
        }
        if !found {
            missing.push(required.clone());
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(KresError::RequiredVersionMissing {
            distro: distro.to_string(),
            missing,
        })
    }
}
