//! Elasticsearch version handling
//!
//! Versions follow `{major}.{minor}.{patch}[-{label}]`. Feature gates compare
//! the numeric triple only, so pre-release builds of a version get the features
//! of that version.

use semver::Version;

/// Parse an Elasticsearch version string
pub fn parse(version: &str) -> Result<Version, semver::Error> {
    Version::parse(version.trim())
}

/// Build a version from its numeric parts
pub fn from(major: u64, minor: u64, patch: u64) -> Version {
    Version::new(major, minor, patch)
}

/// Returns true if `version` is at least `major.minor.patch`, ignoring pre-release labels
pub fn at_least(version: &Version, major: u64, minor: u64, patch: u64) -> bool {
    (version.major, version.minor, version.patch) >= (major, minor, patch)
}

/// Why a version falls outside a [`MinMaxVersion`] range
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeViolation {
    /// The version is lower than the range minimum
    BelowMin {
        /// Lowest accepted version
        min: Version,
    },
    /// The version is higher than the range maximum
    AboveMax {
        /// Highest accepted version
        max: Version,
    },
}

/// An inclusive range of versions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinMaxVersion {
    /// Lowest accepted version
    pub min: Version,
    /// Highest accepted version
    pub max: Version,
}

impl MinMaxVersion {
    /// Create a new inclusive range
    pub fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    /// Check whether `version` lies within the range
    pub fn within_range(&self, version: &Version) -> Result<(), RangeViolation> {
        let triple = (version.major, version.minor, version.patch);
        if triple < (self.min.major, self.min.minor, self.min.patch) {
            return Err(RangeViolation::BelowMin {
                min: self.min.clone(),
            });
        }
        if triple > (self.max.major, self.max.minor, self.max.patch) {
            return Err(RangeViolation::AboveMax {
                max: self.max.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_labels() {
        let v = parse("8.12.0-SNAPSHOT").expect("labelled version should parse");
        assert_eq!((v.major, v.minor, v.patch), (8, 12, 0));
        assert!(parse("7.x").is_err());
        assert!(parse("7.10").is_err());
    }

    /// Story: a pre-release build gets the features of its numeric version
    #[test]
    fn story_feature_gates_ignore_prerelease() {
        let snapshot = parse("8.0.0-SNAPSHOT").expect("version should parse");
        assert!(at_least(&snapshot, 8, 0, 0));
        assert!(!at_least(&from(7, 17, 3), 8, 0, 0));
        assert!(at_least(&from(7, 10, 1), 7, 10, 0));
    }

    #[test]
    fn test_within_range_reports_side() {
        let range = MinMaxVersion::new(from(6, 8, 0), from(7, 99, 99));
        assert!(range.within_range(&from(7, 1, 0)).is_ok());
        assert!(range.within_range(&from(6, 8, 0)).is_ok());
        assert_eq!(
            range.within_range(&from(6, 5, 0)),
            Err(RangeViolation::BelowMin { min: from(6, 8, 0) })
        );
        assert_eq!(
            range.within_range(&from(8, 0, 0)),
            Err(RangeViolation::AboveMax {
                max: from(7, 99, 99)
            })
        );
    }
}
