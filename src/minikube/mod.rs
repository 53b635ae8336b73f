//! Minikube kernel version resolution
//!
//! A minikube tag name is not the kernel version it ships. For every
//! tag the buildroot defconfig is fetched and the embedded custom
//! kernel version extracted; the tag then contributes one kernel
//! archive URL and one defconfig entry under that resolved version.
//! Many tags resolve to the same kernel, so entries are deduplicated
//! by filename and the tag names are kept as aliases for reporting.

use crate::config::{expand_url_template, DistroVersion};
use crate::errors::Result;
use crate::fetch::HttpFetch;
use crate::resolver::FileSource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

static CUSTOM_VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"BR2_LINUX_KERNEL_CUSTOM_VERSION_VALUE="(.*)""#).unwrap());

/// Outcome of one resolution pass, scoped to the run.
#[derive(Debug, Default, Clone)]
pub struct MinikubeResolution {
    /// Resolved kernel version key -> files required to build it.
    pub files: BTreeMap<String, Vec<FileSource>>,
    /// Resolved kernel version key -> tags that produced it. Used for
    /// reporting only, never for build identity.
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// Resolve each matched tag to its embedded kernel version.
///
/// A tag whose defconfig fetch fails or does not carry a custom kernel
/// version is skipped with a warning; it is a tag without a custom
/// kernel build, not an error.
pub async fn resolve_tag_versions<C: HttpFetch>(
    client: &C,
    tags: &[String],
    version: &DistroVersion,
) -> Result<MinikubeResolution> {
    let mut resolution = MinikubeResolution::default();
    let mut emitted: HashSet<String> = HashSet::new();

    for tag in tags {
        let defconfig_url = expand_url_template(&version.defconfig_url, tag);
        let body = match client.get_text(&defconfig_url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(tag = %tag, error = %err, "defconfig fetch failed, skipping tag");
                continue;
            }
        };
        let kernel_version = match CUSTOM_VERSION_PATTERN
            .captures(&body)
            .map(|c| c[1].to_string())
        {
            Some(v) if !v.is_empty() => v,
            _ => {
                tracing::debug!(tag = %tag, "no custom kernel version in defconfig, skipping tag");
                continue;
            }
        };

        resolution
            .aliases
            .entry(kernel_version.clone())
            .or_default()
            .push(tag.clone());

        let archive_url = format!("{}/linux-{}.tar.gz", version.kernel_url, kernel_version);
        let archive_name = format!("linux-{}.tar.gz", kernel_version);
        if emitted.insert(archive_name) {
            resolution
                .files
                .entry(kernel_version.clone())
                .or_default()
                .push(FileSource::Remote { url: archive_url });
        }

        let kernel_defconfig = expand_url_template(&version.kernel_defconfig_url, tag);
        if let Some(name) = FileSource::remote(&kernel_defconfig).file_name() {
            // Keyed by version + filename: the same defconfig name can
            // legitimately appear under different kernel versions.
            if emitted.insert(format!("{}{}", kernel_version, name)) {
                resolution
                    .files
                    .entry(kernel_version.clone())
                    .or_default()
                    .push(FileSource::Remote {
                        url: kernel_defconfig,
                    });
            }
        }
    }
    Ok(resolution)
}
