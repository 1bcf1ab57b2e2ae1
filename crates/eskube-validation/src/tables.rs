//! Static setting and version tables

use semver::Version;

use eskube_common::version::{self, MinMaxVersion};

/// Settings owned by the controller; users setting them is a hard failure
pub const DENYLISTED_SETTINGS: &[&str] = &[
    "cluster.name",
    "cluster.initial_master_nodes",
    "discovery.zen.minimum_master_nodes",
    "network.host",
    "network.publish_host",
    "node.name",
    "path.data",
    "path.logs",
    "xpack.security.authc.reserved_realm.enabled",
    "xpack.security.enabled",
    "xpack.security.http.ssl.enabled",
    "xpack.security.transport.ssl.enabled",
    "xpack.security.transport.ssl.verification_mode",
];

/// Settings managed through certificates; users setting them only gets a warning
pub const UNSUPPORTED_SETTINGS: &[&str] = &[
    "xpack.security.http.ssl.certificate",
    "xpack.security.http.ssl.certificate_authorities",
    "xpack.security.http.ssl.key",
    "xpack.security.transport.ssl.certificate",
    "xpack.security.transport.ssl.certificate_authorities",
    "xpack.security.transport.ssl.key",
];

/// Minimum version supporting `node.roles`, as `(major, minor, patch)`
pub const NODE_ROLES_MIN_VERSION: (u64, u64, u64) = (7, 9, 0);

/// Versions a cluster on the major line of `v` may run and upgrade from
///
/// `None` when the major line is not supported at all.
pub fn supported_versions(v: &Version) -> Option<MinMaxVersion> {
    let (min, max) = match v.major {
        6 => (version::from(6, 8, 0), version::from(6, 99, 99)),
        7 => (version::from(6, 8, 0), version::from(7, 99, 99)),
        8 => (version::from(7, 17, 0), version::from(8, 99, 99)),
        9 => (version::from(8, 18, 0), version::from(9, 99, 99)),
        _ => return None,
    };
    Some(MinMaxVersion::new(min, max))
}
