//! Declarative kernel definitions
//!
//! Parses the per-distribution, per-version description of which
//! upstream kernels to resolve: URL templates, filename patterns,
//! semantic version bounds, custom configuration variants and the
//! operator-declared required versions.
//!
//! The distribution family is a tagged enum resolved at parse time so
//! the resolver dispatches on a typed variant, not on name strings.

use crate::errors::{KresError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Upstream source family. Selects the fetch/parse strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    Ubuntu,
    Centos,
    Rhel,
    Minikube,
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistroFamily::Ubuntu => write!(f, "ubuntu"),
            DistroFamily::Centos => write!(f, "centos"),
            DistroFamily::Rhel => write!(f, "rhel"),
            DistroFamily::Minikube => write!(f, "minikube"),
        }
    }
}

/// Root of the kernel definitions file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distributions {
    pub distributions: Vec<Distribution>,
    /// Artifact repository namespace used for cache reads and uploads.
    #[serde(default)]
    pub artifactory_repo: String,
}

/// One upstream kernel source family and everything needed to resolve it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub name: DistroFamily,
    pub versions: Vec<DistroVersion>,
    /// Ordered filename patterns. Each capturing regex extracts the
    /// version string (group 1) and optionally a minor component
    /// (group 2) used to build the grouping key.
    #[serde(default)]
    pub parser: Vec<String>,
    /// Kernel identities (name + local-version suffix) that must exist
    /// in the resolved set, else resolution of this distribution fails.
    #[serde(default)]
    pub required_versions: Vec<String>,
}

/// One configured version bracket of a distribution.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistroVersion {
    pub name: String,
    #[serde(default)]
    pub min_version: String,
    #[serde(default)]
    pub max_version: String,
    #[serde(default, rename = "baseURL")]
    pub base_url: String,
    /// Minikube: base URL the kernel archive is synthesized under.
    #[serde(default, rename = "kernelURL")]
    pub kernel_url: String,
    /// Minikube: per-tag buildroot defconfig URL template. `{version}`
    /// is replaced with the tag-derived version key.
    #[serde(default, rename = "defconfigURL")]
    pub defconfig_url: String,
    /// Minikube: kernel defconfig URL template, `{version}` placeholder.
    #[serde(default, rename = "kernelDefconfigURL")]
    pub kernel_defconfig_url: String,
    /// Whether the artifact cache is consulted for this version.
    /// Caching is opt-in per version.
    #[serde(default)]
    pub artifactory_cache: bool,
    /// RHEL: content set name for the package API.
    #[serde(default)]
    pub rh_repository: String,
    #[serde(default)]
    pub custom_configs: Vec<CustomConfig>,
}

/// Declaration of a custom-configuration kernel variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomConfig {
    /// Base kernel name (resolved version key) this variant targets.
    pub kernel_name: String,
    /// Appended to the kernel name to form the variant's identity.
    pub local_version_suffix: String,
    /// Kernel config properties applied on top of the default config.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Distributions {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

impl Distribution {
    /// Point cache-enabled versions at the artifact mirror instead of
    /// the upstream source. Used on cache-read runs, where previously
    /// uploaded listings stand in for the flaky upstreams.
    ///
    /// Minikube archives live under `kernelURL`; every other family
    /// lists from `baseURL`.
    pub fn use_artifact_cache(&mut self, artifactory_repo_url: &str) -> Result<()> {
        let base = Url::parse(&ensure_trailing_slash(artifactory_repo_url))
            .map_err(|e| KresError::Configuration(format!("bad artifact repo URL: {}", e)))?;
        for version in &mut self.versions {
            if !version.artifactory_cache {
                continue;
            }
            let mirrored = base
                .join(&format!("{}/{}", self.name, version.name))
                .map_err(|e| {
                    KresError::Configuration(format!(
                        "cannot build mirror URL for {} {}: {}",
                        self.name, version.name, e
                    ))
                })?;
            if self.name == DistroFamily::Minikube {
                version.kernel_url = mirrored.to_string();
            } else {
                version.base_url = mirrored.to_string();
            }
        }
        Ok(())
    }
}

fn ensure_trailing_slash(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{}/", trimmed)
}

/// Expand a `{version}` URL template.
pub fn expand_url_template(template: &str, version: &str) -> String {
    template.replace("{version}", version)
}
