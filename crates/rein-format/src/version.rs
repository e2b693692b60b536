//! Container header and format version gate.

use std::fmt;

use tracing::error;

use crate::error::{FormatError, Result};

/// Size of one container page; header, section table and sections are
/// page-aligned.
pub const PAGE_SIZE: usize = 4096;

/// Size of the fixed container header.
pub const HEADER_SIZE: usize = 4096;

/// Fixed ASCII tag opening every container. Its length places the version
/// string at byte offset 62 of the header.
pub const HEADER_TAG: &[u8] = b"REIN -- relocatable embedded inference network\n\nmodel version ";

/// Byte offset of the ASCII version string within the header.
pub const VERSION_OFFSET: usize = 62;

/// Format revision written by this build.
pub const CURRENT_VERSION: FormatVersion = FormatVersion { major: 2, minor: 0 };

/// Oldest format revision this build can still load.
pub const MIN_SUPPORTED_VERSION: FormatVersion = FormatVersion { major: 1, minor: 0 };

/// A structured format revision.
///
/// Stored as ASCII `major.minor[.patch]` in the header and compared as an
/// integer pair; no floating-point versions anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    /// Incompatible layout revisions.
    pub major: u16,
    /// Backward-compatible additions.
    pub minor: u16,
}

impl FormatVersion {
    /// Parse `major.minor` from the front of an ASCII version string;
    /// trailing components (patch, build metadata) are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let mut fields = s.split('.');
        let major = fields.next()?.trim().parse().ok()?;
        let minor = fields.next()?.trim().parse().ok()?;
        Some(Self { major, minor })
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Build the 4096-byte container header for the current format revision.
pub fn write_header() -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(HEADER_TAG);
    debug_assert_eq!(header.len(), VERSION_OFFSET);
    header.extend_from_slice(format!("{}.0\n", CURRENT_VERSION).as_bytes());
    header.resize(HEADER_SIZE, 0);
    header
}

/// Validate the header tag and parse the format revision.
///
/// Rejects buffers that are not REIN containers and revisions below the
/// oldest supported one, with a diagnostic either way.
pub fn check_version(header: &[u8]) -> Result<FormatVersion> {
    if header.len() < HEADER_SIZE || &header[..HEADER_TAG.len()] != HEADER_TAG {
        error!("buffer does not carry a REIN binary model header");
        return Err(FormatError::BadHeader);
    }
    let tail = &header[VERSION_OFFSET..HEADER_SIZE];
    let end = tail
        .iter()
        .position(|&b| b == 0 || b == b'\n')
        .unwrap_or(tail.len());
    let text = std::str::from_utf8(&tail[..end]).map_err(|_| FormatError::BadHeader)?;
    let found = FormatVersion::parse(text).ok_or(FormatError::BadHeader)?;
    if found < MIN_SUPPORTED_VERSION {
        error!(%found, "binary model version is no longer supported");
        return Err(FormatError::UnsupportedVersion {
            found,
            min: MIN_SUPPORTED_VERSION,
        });
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(version: &str) -> Vec<u8> {
        let mut h = Vec::new();
        h.extend_from_slice(HEADER_TAG);
        h.extend_from_slice(version.as_bytes());
        h.push(b'\n');
        h.resize(HEADER_SIZE, 0);
        h
    }

    #[test]
    fn tag_places_version_at_62() {
        assert_eq!(HEADER_TAG.len(), VERSION_OFFSET);
        let header = write_header();
        assert_eq!(&header[VERSION_OFFSET..VERSION_OFFSET + 3], b"2.0");
    }

    #[test]
    fn parses_current_and_legacy() {
        assert_eq!(
            check_version(&header_with("2.0.0")).unwrap(),
            FormatVersion { major: 2, minor: 0 }
        );
        assert_eq!(
            check_version(&header_with("1.0")).unwrap(),
            FormatVersion { major: 1, minor: 0 }
        );
    }

    #[test]
    fn rejects_prehistoric_versions() {
        assert!(matches!(
            check_version(&header_with("0.9")),
            Err(FormatError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn rejects_foreign_buffers() {
        assert!(matches!(
            check_version(&[0u8; HEADER_SIZE]),
            Err(FormatError::BadHeader)
        ));
        assert!(matches!(check_version(b"short"), Err(FormatError::BadHeader)));
    }

    #[test]
    fn version_ordering_is_integer() {
        // 1.10 is newer than 1.9 — a float comparison would say otherwise.
        let v1_9 = FormatVersion::parse("1.9").unwrap();
        let v1_10 = FormatVersion::parse("1.10").unwrap();
        assert!(v1_10 > v1_9);
    }
}
