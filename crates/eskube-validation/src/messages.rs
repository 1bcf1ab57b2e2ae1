//! Fixed message table
//!
//! Reasons are matched by identity in tests and by operators reading the
//! admission response, so their text never varies.

use std::fmt;

/// Why a validation failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Node set configuration cannot be read
    ConfigInvalid,
    /// No master-eligible node set with a positive count
    MasterRequired,
    /// `spec.version` does not parse
    ParseVersion,
    /// The persisted version does not parse
    ParseStoredVersion,
    /// A SAN IP is not an IP address
    InvalidSanIp,
    /// Claim templates of an existing node set changed
    PvcImmutable,
    /// Generated resource names would be invalid
    InvalidNames,
    /// Version outside the supported range
    UnsupportedVersion,
    /// Setting reserved for the controller
    UnsupportedConfig,
    /// Setting that users cannot set at all
    DenylistedConfig,
    /// Two node sets share a name
    DuplicateNodeSets,
    /// The proposed version is lower than the current one
    NoDowngrades,
    /// The upgrade path is not supported
    UnsupportedUpgrade,
    /// The current version is below the oldest version the target line upgrades from
    UpgradeSpanTooLargeBackward,
    /// The current version is above the newest version the target line accepts
    UpgradeSpanTooLargeForward,
    /// `node.roles` used before it existed
    NodeRolesInOldVersion,
    /// `node.roles` mixed with legacy `node.*` role flags
    MixedRoleConfig,
}

impl Reason {
    /// Placeholder replaced by the error detail in templated messages
    pub const PLACEHOLDER: &'static str = "{attrs}";

    /// Message text
    pub fn message(&self) -> &'static str {
        match self {
            Reason::ConfigInvalid => "Configuration invalid",
            Reason::MasterRequired => "Elasticsearch needs to have at least one master node",
            Reason::ParseVersion => "Cannot parse Elasticsearch version. String format must be {major}.{minor}.{patch}[-{label}]",
            Reason::ParseStoredVersion => "Cannot parse current Elasticsearch version. String format must be {major}.{minor}.{patch}[-{label}]",
            Reason::InvalidSanIp => "Invalid SAN IP address. Must be a valid IPv4 or IPv6 address",
            Reason::PvcImmutable => "Volume claim templates cannot be modified",
            Reason::InvalidNames => {
                "Elasticsearch configuration would generate resources with invalid names"
            }
            Reason::UnsupportedVersion => "Unsupported version",
            Reason::UnsupportedConfig => {
                "Configuration setting is reserved for internal use. User-configured use is unsupported"
            }
            Reason::DenylistedConfig => "Configuration setting is not user-configurable",
            Reason::DuplicateNodeSets => "NodeSet names must be unique",
            Reason::NoDowngrades => "Downgrades are not supported",
            Reason::UnsupportedUpgrade => "Unsupported version upgrade path",
            Reason::UpgradeSpanTooLargeBackward => {
                "Unsupported version upgrade path: current version is too old for the target version"
            }
            Reason::UpgradeSpanTooLargeForward => {
                "Unsupported version upgrade path: current version is newer than the target version line supports"
            }
            Reason::NodeRolesInOldVersion => {
                "node.roles setting is not available in this version of Elasticsearch"
            }
            Reason::MixedRoleConfig => {
                "Detected a combination of node.roles and {attrs}. Use only node.roles"
            }
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_messages_share_prefix() {
        for reason in [
            Reason::UpgradeSpanTooLargeBackward,
            Reason::UpgradeSpanTooLargeForward,
        ] {
            assert!(reason
                .message()
                .starts_with(Reason::UnsupportedUpgrade.message()));
        }
    }

    #[test]
    fn test_only_mixed_roles_is_templated() {
        assert!(Reason::MixedRoleConfig.message().contains(Reason::PLACEHOLDER));
        assert!(!Reason::DenylistedConfig.message().contains(Reason::PLACEHOLDER));
        assert_eq!(Reason::DuplicateNodeSets.to_string(), "NodeSet names must be unique");
    }
}
