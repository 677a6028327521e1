//! File fingerprint shared by the graph and restriction artifacts
//!
//! Layout (16 bytes, little-endian):
//!
//!   magic:        u32 = 0x57415947  // "WAYG"
//!   version:      u16 = 1
//!   reserved:     u16 = 0
//!   layout_crc64: u64               // CRC-64 of the record layout descriptor
//!
//! The layout checksum changes whenever a record layout changes, so a reader
//! built against a different layout refuses the file up front. It is derived
//! from a static descriptor string, never from timestamps, keeping repeated
//! runs byte-identical.

use anyhow::{ensure, Result};
use crc::{Crc, CRC_64_GO_ISO};

pub const MAGIC: u32 = 0x57415947; // "WAYG"
pub const VERSION: u16 = 1;
pub const FINGERPRINT_SIZE: usize = 16;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);
const LAYOUT_DESCRIPTOR: &[u8] = b"node:20 edge:32 restriction:28 name-block:16";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerPrint {
    pub magic: u32,
    pub version: u16,
    pub layout_crc64: u64,
}

impl FingerPrint {
    /// The fingerprint written by this build.
    pub fn current() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            layout_crc64: CRC64.checksum(LAYOUT_DESCRIPTOR),
        }
    }

    pub fn to_bytes(&self) -> [u8; FINGERPRINT_SIZE] {
        let mut bytes = [0u8; FINGERPRINT_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        // bytes 6..8 reserved
        bytes[8..16].copy_from_slice(&self.layout_crc64.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() >= FINGERPRINT_SIZE, "Fingerprint too short");
        let fingerprint = Self {
            magic: u32::from_le_bytes(bytes[0..4].try_into()?),
            version: u16::from_le_bytes(bytes[4..6].try_into()?),
            layout_crc64: u64::from_le_bytes(bytes[8..16].try_into()?),
        };
        ensure!(
            fingerprint.magic == MAGIC,
            "Invalid magic: expected 0x{:08x}, got 0x{:08x}",
            MAGIC,
            fingerprint.magic
        );
        ensure!(
            fingerprint.version == VERSION,
            "Unsupported version: {}",
            fingerprint.version
        );
        ensure!(
            fingerprint.layout_crc64 == Self::current().layout_crc64,
            "Record layout mismatch: file was written by an incompatible build"
        );
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_roundtrip() {
        let fp = FingerPrint::current();
        assert_eq!(FingerPrint::from_bytes(&fp.to_bytes()).unwrap(), fp);
    }

    #[test]
    fn test_fingerprint_rejects_wrong_magic() {
        let mut bytes = FingerPrint::current().to_bytes();
        bytes[0] ^= 0xff;
        assert!(FingerPrint::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(FingerPrint::current().to_bytes(), FingerPrint::current().to_bytes());
    }
}
