//! Server/plugin version compatibility.
//!
//! While the protocol is at 0.x, a minor bump may break the wire format, so
//! two versions are compatible only when major and minor both match.

use semver::Version;

/// Compare the server version with the version a plugin advertised.
///
/// Returns `None` when compatible, or a human-readable warning otherwise.
pub fn check_version_compatibility(local: &str, peer: &str) -> Option<String> {
    let (Some(local_v), Some(peer_v)) = (parse(local), parse(peer)) else {
        return Some(format!(
            "Cannot parse versions: local={}, bridge={}",
            local, peer
        ));
    };

    if local_v.major != peer_v.major || local_v.minor != peer_v.minor {
        return Some(format!(
            "Version mismatch: server v{} <-> bridge v{}. Minor version must match during 0.x development. See compatibility guide.",
            local, peer
        ));
    }

    None
}

/// Read the leading `major.minor.patch`. Anything after the patch digits
/// (pre-release tags, a fourth component) is ignored; a `v` prefix is not.
fn parse(version: &str) -> Option<Version> {
    let mut parts = version.splitn(3, '.');
    let major = number(parts.next()?)?;
    let minor = number(parts.next()?)?;
    let rest = parts.next()?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let patch = number(&rest[..end])?;
    Some(Version::new(major, minor, patch))
}

fn number(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
