//! Remote artifact repository access
//!
//! The resolver only needs two operations from the artifact store: a
//! recursive search of the cache namespace (to build the cache index)
//! and an upload of freshly downloaded kernels. Both sit behind the
//! `ArtifactStore` trait so the resolution engine can run against an
//! in-memory store in tests.

use crate::errors::{KresError, Result};
use serde::Deserialize;
use std::path::Path;

/// One file known to the artifact repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Repository path of the containing directory, e.g.
    /// `kernel-cache/ubuntu/focal`.
    pub path: String,
    /// File name within `path`.
    pub name: String,
    /// Content checksum as stored by the repository.
    pub sha256: String,
}

/// Counts returned by an upload pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: usize,
    pub failed: usize,
}

/// Search/upload interface of the remote artifact repository.
#[allow(async_fn_in_trait)]
pub trait ArtifactStore {
    /// Recursively list every file under `repo`.
    async fn search(&self, repo: &str) -> Result<Vec<ArtifactEntry>>;

    /// Upload every file under `local_dir` to `target` preserving the
    /// directory hierarchy below `local_dir`.
    async fn upload(&self, local_dir: &Path, target: &str) -> Result<UploadStats>;
}

/// Artifactory REST client. Searches with AQL and deploys with PUT.
pub struct ArtifactoryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct AqlResponse {
    results: Vec<AqlItem>,
}

#[derive(Debug, Deserialize)]
struct AqlItem {
    path: String,
    name: String,
    #[serde(default)]
    sha256: String,
}

impl ArtifactoryClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_files(&path, out)?;
            } else {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl ArtifactStore for ArtifactoryClient {
    async fn search(&self, repo: &str) -> Result<Vec<ArtifactEntry>> {
        let query = format!(
            "items.find({{\"repo\":\"{}\"}}).include(\"name\",\"path\",\"sha256\")",
            repo
        );
        let response = self
            .http
            .post(format!("{}/api/search/aql", self.base_url))
            .header("X-JFrog-Art-Api", &self.token)
            .header("Content-Type", "text/plain")
            .body(query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(KresError::ArtifactStore(format!(
                "search of {} failed with status {}",
                repo,
                response.status()
            )));
        }
        let parsed: AqlResponse = response.json().await?;
        Ok(parsed
            .results
            .into_iter()
            .map(|item| ArtifactEntry {
                path: item.path,
                name: item.name,
                sha256: item.sha256,
            })
            .collect())
    }

    async fn upload(&self, local_dir: &Path, target: &str) -> Result<UploadStats> {
        let mut files = Vec::new();
        Self::collect_files(local_dir, &mut files)?;

        let mut stats = UploadStats::default();
        for file in files {
            let relative = file
                .strip_prefix(local_dir)
                .map_err(|e| KresError::ArtifactStore(e.to_string()))?;
            let url = format!(
                "{}/{}/{}",
                self.base_url,
                target.trim_matches('/'),
                relative.display()
            );
            let bytes = std::fs::read(&file)?;
            let result = self
                .http
                .put(&url)
                .header("X-JFrog-Art-Api", &self.token)
                .body(bytes)
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => stats.uploaded += 1,
                Ok(resp) => {
                    tracing::error!(url = %url, status = %resp.status(), "upload rejected");
                    stats.failed += 1;
                }
                Err(err) => {
                    tracing::error!(url = %url, error = %err, "upload failed");
                    stats.failed += 1;
                }
            }
        }
        Ok(stats)
    }
}
