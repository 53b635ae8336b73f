//! Error types for the kernel resolution engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KresError {
    /// A defect in the kernel definitions file (malformed version
    /// bounds, bad pattern, unknown report format). Always fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid version range [{min}, {max}]: {reason}")]
    InvalidVersionRange {
        min: String,
        max: String,
        reason: String,
    },

    /// Network or API failure while listing an upstream source.
    /// Fatal to the enclosing distribution version.
    #[error("upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// One or more operator-declared required kernels were not present
    /// in the assembled list. Carries every missing name at once.
    #[error("required kernels missing for {distro}: {missing:?}")]
    RequiredVersionMissing { distro: String, missing: Vec<String> },

    #[error("artifact store error: {0}")]
    ArtifactStore(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(String),
}

impl From<regex::Error> for KresError {
    fn from(err: regex::Error) -> Self {
        KresError::Regex(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KresError>;
