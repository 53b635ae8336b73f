//! Cache index over the remote artifact repository
//!
//! Built exactly once per run from a recursive search of the cache
//! namespace, then shared read-only by every distribution resolution.
//! Answers "is this kernel file already cached" and "does the cached
//! copy match this checksum".

use crate::artifact::ArtifactEntry;
use std::collections::HashMap;

/// Immutable membership index keyed by (distro, version, filename).
///
/// All operations are pure reads after construction; the index is
/// `Send + Sync` and safe for concurrent use without locking.
#[derive(Debug, Default, Clone)]
pub struct KernelCache {
    entries: HashMap<(String, String, String), String>,
}

impl KernelCache {
    /// An index with no entries. Every membership query answers false.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from artifact search results. The distro and
    /// distro-version keys are the last two path segments of each
    /// result; results with shorter paths cannot be attributed to a
    /// distribution and are skipped.
    pub fn from_entries(entries: &[ArtifactEntry]) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            let Some((distro, version)) = distro_version_from_path(&entry.path) else {
                tracing::warn!(path = %entry.path, file = %entry.name, "unusable cache path, skipping");
                continue;
            };
            map.insert(
                (distro.to_string(), version.to_string(), entry.name.clone()),
                entry.sha256.clone(),
            );
        }
        Self { entries: map }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether a file of this name is cached for (distro, version).
    pub fn contains(&self, distro: &str, version: &str, filename: &str) -> bool {
        self.entries
            .contains_key(&(distro.to_string(), version.to_string(), filename.to_string()))
    }

    /// True only when the file is cached and its stored checksum equals
    /// `checksum`. A same-named file with a different checksum is a
    /// logical cache miss.
    pub fn checksum_matches(
        &self,
        distro: &str,
        version: &str,
        filename: &str,
        checksum: &str,
    ) -> bool {
        match self
            .entries
            .get(&(distro.to_string(), version.to_string(), filename.to_string()))
        {
            Some(stored) => stored == checksum,
            None => false,
        }
    }
}

/// Take the last two path segments as (distro, distro-version).
fn distro_version_from_path(path: &str) -> Option<(&str, &str)> {
    let mut segments = path.trim_matches('/').rsplit('/');
    let version = segments.next()?;
    let distro = segments.next()?;
    if distro.is_empty() || version.is_empty() {
        return None;
    }
    Some((distro, version))
}
