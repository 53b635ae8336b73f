//! Version matching for upstream filenames
//!
//! Applies a configured pattern to a filename and validates the
//! extracted version against an inclusive semantic-version range.
//! Pure functions, no I/O.
//!
//! Two failure modes are kept strictly apart: a range bound that does
//! not parse is our own configuration defect and surfaces as an error,
//! while an extracted version that does not parse is upstream noise
//! (a distro naming quirk) and is treated as no-match.

use crate::errors::{KresError, Result};
use regex::Regex;
use semver::Version;

/// Inclusive semantic-version bounds for one distribution version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    min: Version,
    max: Version,
}

impl VersionRange {
    /// Parse the configured bounds. Bounds accept partial versions
    /// ("5", "5.4") which are padded to full semantic versions.
    /// Unparseable bounds or min > max are fatal configuration errors.
    pub fn parse(min: &str, max: &str) -> Result<Self> {
        let min_ver = lenient_version(min).ok_or_else(|| KresError::InvalidVersionRange {
            min: min.to_string(),
            max: max.to_string(),
            reason: "min bound is not a semantic version".to_string(),
        })?;
        let max_ver = lenient_version(max).ok_or_else(|| KresError::InvalidVersionRange {
            min: min.to_string(),
            max: max.to_string(),
            reason: "max bound is not a semantic version".to_string(),
        })?;
        if min_ver > max_ver {
            return Err(KresError::InvalidVersionRange {
                min: min.to_string(),
                max: max.to_string(),
                reason: "min bound is greater than max bound".to_string(),
            });
        }
        Ok(Self { min: min_ver, max: max_ver })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, version: &Version) -> bool {
        *version >= self.min && *version <= self.max
    }
}

/// Result of applying one pattern to one filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Pattern did not match, or the extracted version is not a
    /// semantic version.
    NoMatch,
    /// Pattern matched but the version falls outside the range.
    OutOfRange,
    /// Pattern matched and the version is within the range.
    InRange(VersionMatch),
}

/// Capture groups of a successful match. Group 0 is the whole matched
/// text; group 1 is the version (or major component); group 2, when the
/// pattern captures it, is the minor component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMatch {
    groups: Vec<String>,
}

impl VersionMatch {
    /// The matched substring of the filename. Appended to the base URL
    /// to form the file's location.
    pub fn matched_text(&self) -> &str {
        &self.groups[0]
    }

    /// Grouping key identifying one build target: `"<major>"` or
    /// `"<major>.<minor>"` depending on how many groups the pattern
    /// captured.
    pub fn key(&self) -> String {
        if self.groups.len() == 3 {
            format!("{}.{}", self.groups[1], self.groups[2])
        } else {
            self.groups[1].clone()
        }
    }
}

/// Apply `pattern` to `filename` and check the extracted version
/// against `range`.
pub fn match_version(filename: &str, pattern: &Regex, range: &VersionRange) -> MatchOutcome {
    let captures = match pattern.captures(filename) {
        Some(c) => c,
        None => return MatchOutcome::NoMatch,
    };
    let groups: Vec<String> = captures
        .iter()
        .map(|g| g.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect();
    if groups.len() < 2 {
        // Pattern has no capture group: nothing to build a key from.
        return MatchOutcome::NoMatch;
    }
    let version = match lenient_version(&groups[1]) {
        Some(v) => v,
        None => return MatchOutcome::NoMatch,
    };
    if range.contains(&version) {
        MatchOutcome::InRange(VersionMatch { groups })
    } else {
        MatchOutcome::OutOfRange
    }
}

/// Parse a version string the way the original resolver's semver
/// library did: tolerate a leading `v` and pad missing minor/patch
/// components with zeros, keeping any pre-release or build suffix.
pub fn lenient_version(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    if stripped.is_empty() {
        return None;
    }

    // Split the numeric core from pre-release / build metadata.
    let core_end = stripped
        .find(|c: char| c == '-' || c == '+')
        .unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(core_end);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    let mut padded: Vec<&str> = parts;
    while padded.len() < 3 {
        padded.push("0");
    }
    let candidate = format!("{}.{}.{}{}", padded[0], padded[1], padded[2], suffix);
    Version::parse(&candidate).ok()
}
