//! Stored-image header
//!
//! Images produced by the host-side packaging tool begin with a four-byte
//! marker followed by a four-byte little-endian length. This core only ever
//! reads the header; it is written by the tool that builds the image.

/// Marker bytes at the start of a stored image
pub const MARKER: [u8; 4] = *b"FIMG";

/// Header found at the start of an image-bearing region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Total image length in bytes
    pub len: u32,
}

impl ImageHeader {
    /// Number of bytes the header occupies
    pub const LEN: usize = 8;

    /// Parse the first eight bytes of a region.
    ///
    /// Returns `None` when the marker is absent, which callers treat as
    /// "no image stored here" rather than an error.
    pub fn probe(raw: &[u8; Self::LEN]) -> Option<Self> {
        if raw[..4] != MARKER {
            return None;
        }
        Some(Self {
            len: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_with_marker() {
        let mut raw = [0u8; ImageHeader::LEN];
        raw[..4].copy_from_slice(&MARKER);
        raw[4..].copy_from_slice(&0x0002_0000u32.to_le_bytes());
        assert_eq!(ImageHeader::probe(&raw), Some(ImageHeader { len: 0x0002_0000 }));
    }

    #[test]
    fn probe_without_marker() {
        assert_eq!(ImageHeader::probe(&[0xFF; ImageHeader::LEN]), None);
        assert_eq!(ImageHeader::probe(&[0; ImageHeader::LEN]), None);
    }
}
