//! Authenticated paginated package API
//!
//! The RHEL package catalog is served by a flaky paginated API. Three
//! workers walk the offset space in strides: worker i starts at
//! `i * PAGE_SIZE` and advances by `WORKER_COUNT * PAGE_SIZE` after
//! each page, stopping when a page reports `count < limit`. Each
//! worker keeps a local result list; the lists are merged after all
//! workers finish, so no shared accumulator is needed.
//!
//! A failed worker does not discard what the other workers gathered:
//! the merged partial results are returned together with the failure
//! and the caller decides whether degraded results are acceptable.

use crate::cache::KernelCache;
use crate::config::DistroVersion;
use crate::errors::{KresError, Result};
use crate::matcher::{match_version, MatchOutcome, VersionRange};
use crate::resolver::FileSource;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

pub const PAGE_SIZE: u64 = 100;
pub const WORKER_COUNT: u64 = 3;

/// Paging metadata reported with every page.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub count: u64,
}

/// One package as reported by the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RhPackage {
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub epoch: String,
    pub name: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub download_href: String,
}

impl RhPackage {
    /// Canonical RPM filename of the package.
    pub fn file_name(&self) -> String {
        format!("{}-{}-{}.{}.rpm", self.name, self.version, self.release, self.arch)
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoPage {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(rename = "body", default)]
    pub packages: Vec<RhPackage>,
}

/// Catalog interface: page listing and signed download URL minting.
#[allow(async_fn_in_trait)]
pub trait PackageApi {
    async fn list_page(&self, repo: &str, offset: u64) -> Result<RepoPage>;
    async fn mint_download_url(&self, package: &RhPackage) -> Result<String>;
}

/// Fan-out fetch result. `failure` is set when any worker errored;
/// `packages` then holds whatever the remaining workers gathered.
#[derive(Debug, Default)]
pub struct PackageFetch {
    pub packages: Vec<RhPackage>,
    pub failure: Option<String>,
}

async fn stride_worker<A: PackageApi>(
    api: &A,
    repo: &str,
    name_pattern: &Regex,
    start_offset: u64,
) -> Result<Vec<RhPackage>> {
    let mut matched = Vec::new();
    let mut offset = start_offset;
    loop {
        let page = api.list_page(repo, offset).await?;
        tracing::debug!(repo, offset, count = page.pagination.count, "fetched catalog page");
        matched.extend(
            page.packages
                .into_iter()
                .filter(|pkg| name_pattern.is_match(&pkg.name)),
        );
        if page.pagination.count < page.pagination.limit {
            break;
        }
        offset += WORKER_COUNT * PAGE_SIZE;
    }
    Ok(matched)
}

/// Run the three stride workers concurrently and merge their local
/// results after completion.
pub async fn fetch_packages<A: PackageApi>(
    api: &A,
    repo: &str,
    name_pattern: &Regex,
) -> PackageFetch {
    let (first, second, third) = tokio::join!(
        stride_worker(api, repo, name_pattern, 0),
        stride_worker(api, repo, name_pattern, PAGE_SIZE),
        stride_worker(api, repo, name_pattern, 2 * PAGE_SIZE),
    );

    let mut fetch = PackageFetch::default();
    for result in [first, second, third] {
        match result {
            Ok(mut packages) => fetch.packages.append(&mut packages),
            Err(err) => {
                tracing::error!(repo, error = %err, "catalog worker failed, results can be incomplete");
                fetch.failure = Some(err.to_string());
            }
        }
    }
    fetch
}

/// Match fetched packages against the configured patterns and range,
/// grouping them by resolved version key.
///
/// A package whose cached copy is checksum-verified is emitted as
/// `AlreadySatisfied`, skipping the extra authenticated request that
/// would mint a signed URL; everything else gets a real minted URL.
pub async fn resolve_packages<A: PackageApi>(
    api: &A,
    packages: &[RhPackage],
    distro: &str,
    version: &DistroVersion,
    parsers: &[Regex],
    cache: &KernelCache,
) -> Result<BTreeMap<String, Vec<FileSource>>> {
    let range = VersionRange::parse(&version.min_version, &version.max_version)?;
    let mut grouped: BTreeMap<String, Vec<FileSource>> = BTreeMap::new();

    for package in packages {
        let file_name = package.file_name();
        for parser in parsers {
            let matched = match match_version(&file_name, parser, &range) {
                MatchOutcome::InRange(m) => m,
                MatchOutcome::OutOfRange | MatchOutcome::NoMatch => continue,
            };
            let source = if !cache.is_empty()
                && cache.checksum_matches(distro, &version.name, &file_name, &package.checksum)
            {
                FileSource::AlreadySatisfied {
                    filename: file_name.clone(),
                }
            } else {
                let url = api.mint_download_url(package).await?;
                FileSource::Remote { url }
            };
            grouped.entry(matched.key()).or_default().push(source);
        }
    }
    Ok(grouped)
}

const SSO_TOKEN_URL: &str =
    "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token";
const API_BASE: &str = "https://api.access.redhat.com/management/v1";
const SSO_CLIENT_ID: &str = "rhsm-api";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DownloadInfo {
    body: DownloadFile,
}

#[derive(Debug, Deserialize)]
struct DownloadFile {
    #[serde(default)]
    href: String,
}

/// Authenticated catalog client. Exchanges the operator's long-lived
/// offline token for an access token on first use.
pub struct RhApiClient {
    http: reqwest::Client,
    offline_token: String,
    access_token: tokio::sync::Mutex<Option<String>>,
}

impl RhApiClient {
    pub fn new(offline_token: &str) -> Result<Self> {
        // The download endpoint answers with a JSON body carrying the
        // signed URL; automatic redirect following would lose it.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            offline_token: offline_token.to_string(),
            access_token: tokio::sync::Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let response = self
            .http
            .post(SSO_TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", SSO_CLIENT_ID),
                ("refresh_token", self.offline_token.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(KresError::UpstreamFetch(format!(
                "token exchange returned {}",
                response.status()
            )));
        }
        let token: TokenResponse = response.json().await?;
        *cached = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(KresError::UpstreamFetch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

impl PackageApi for RhApiClient {
    async fn list_page(&self, repo: &str, offset: u64) -> Result<RepoPage> {
        let url = format!(
            "{}/packages/cset/{}/arch/x86_64?limit={}&offset={}",
            API_BASE, repo, PAGE_SIZE, offset
        );
        self.get_json(&url).await
    }

    async fn mint_download_url(&self, package: &RhPackage) -> Result<String> {
        let info: DownloadInfo = self.get_json(&package.download_href).await?;
        Ok(info.body.href)
    }
}
