//! # Version Normalization and Comparison
//!
//! Release tags and published versions arrive in slightly different shapes
//! (`v1.2.3`, `1.2.3-rc1+build`, `1.2.3.rc1.build`). The reconciler compares
//! them through two helpers:
//!
//! - [`normalize`] strips a single leading `v` and replaces every `+` and
//!   `-` separator with `.`, producing the canonical dotted form. Equality of
//!   normalized strings is the primary "nothing to do" check.
//! - [`parse_loose`] attempts a semantic interpretation of a normalized
//!   string, used only for the "tag is older than published" ordering check.
//!   Normalized pre-release forms are not strict semver, so after a strict
//!   parse fails it falls back to the numeric `major.minor.patch` prefix.
//!   `None` means the comparison is inconclusive, and the reconciler fails
//!   open toward building.

use semver::Version;

/// Normalize a tag or version string for comparison.
///
/// Idempotent: normalizing an already-normalized string is a no-op.
pub fn normalize(version: &str) -> String {
    let version = version.strip_prefix('v').unwrap_or(version);
    version.replace(['+', '-'], ".")
}

/// Leniently parse a normalized version string.
///
/// Tries a strict semver parse first, then falls back to the numeric
/// `major.minor.patch` prefix of the dotted form (so `1.2.3.rc1.build`
/// compares as `1.2.3`). Returns `None` when no ordering can be derived.
pub fn parse_loose(version: &str) -> Option<Version> {
    if let Ok(v) = Version::parse(version) {
        return Some(v);
    }

    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some(Version::new(major, minor, patch))
}
