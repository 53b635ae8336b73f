//! Source-control tag listing
//!
//! Minikube kernels are discovered from repository tags rather than a
//! file index. The tag API is paged until the provider reports no
//! further page. When the configured base URL does not point at the
//! tag provider's host the listing falls back to the index scrape.

use super::{index, HttpFetch};
use crate::errors::{KresError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use serde::Deserialize;

/// One page of tag names plus the next page number, if any.
#[derive(Debug, Clone)]
pub struct TagPage {
    pub names: Vec<String>,
    pub next_page: Option<u32>,
}

/// Paginated tag listing interface.
#[allow(async_fn_in_trait)]
pub trait TagApi {
    async fn list_tags(&self, owner: &str, repo: &str, page: u32) -> Result<TagPage>;
}

/// Accumulate every tag name, first page to last.
pub async fn fetch_all_tags<T: TagApi>(api: &T, owner: &str, repo: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut page = 1;
    loop {
        let result = api.list_tags(owner, repo, page).await?;
        names.extend(result.names);
        match result.next_page {
            Some(next) => page = next,
            None => break,
        }
    }
    Ok(names)
}

/// Extract (owner, repo) when the URL points at the tag provider.
/// Returns None for any other host; errors when the provider URL does
/// not carry both path segments.
pub fn github_owner_repo(base_url: &str) -> Result<Option<(String, String)>> {
    let url = Url::parse(base_url)
        .map_err(|e| KresError::Configuration(format!("bad base URL {}: {}", base_url, e)))?;
    if url.host_str() != Some("github.com") {
        return Ok(None);
    }
    let segments: Vec<&str> = url
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() < 2 {
        return Err(KresError::Configuration(format!(
            "unable to find owner and repository in provided url: {}",
            base_url
        )));
    }
    Ok(Some((segments[0].to_string(), segments[1].to_string())))
}

/// Tag-based listing when the base URL is hosted by the tag provider,
/// index scrape otherwise.
pub async fn fetch_tag_listing<C: HttpFetch, T: TagApi>(
    client: &C,
    api: &T,
    base_url: &str,
) -> Result<Vec<String>> {
    match github_owner_repo(base_url)? {
        Some((owner, repo)) => fetch_all_tags(api, &owner, &repo).await,
        None => index::fetch_href_list(client, base_url).await,
    }
}

const TAGS_PER_PAGE: u32 = 99;

static LINK_NEXT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[?&]page=(\d+)[^>]*>;\s*rel="next""#).unwrap());

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
}

/// GitHub REST tag client.
pub struct GithubTagClient {
    http: reqwest::Client,
}

impl GithubTagClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for GithubTagClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TagApi for GithubTagClient {
    async fn list_tags(&self, owner: &str, repo: &str, page: u32) -> Result<TagPage> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/tags?per_page={}&page={}",
            owner, repo, TAGS_PER_PAGE, page
        );
        let response = self
            .http
            .get(&url)
            .header("User-Agent", concat!("kernel-resolver/", env!("CARGO_PKG_VERSION")))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(KresError::UpstreamFetch(format!(
                "tag listing {} returned {}",
                url,
                response.status()
            )));
        }
        let next_page = response
            .headers()
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_page);
        let tags: Vec<GithubTag> = response.json().await?;
        Ok(TagPage {
            names: tags.into_iter().map(|t| t.name).collect(),
            next_page,
        })
    }
}

fn parse_next_page(link_header: &str) -> Option<u32> {
    LINK_NEXT_PATTERN
        .captures(link_header)
        .and_then(|c| c[1].parse().ok())
}
