//! Turn restrictions file
//!
//! Format (little-endian):
//!
//!   FingerPrint (16 bytes)
//!   count: u32            // back-patched after streaming
//!   records: count × 28 bytes
//!     from_node: u64
//!     via_node:  u64
//!     to_node:   u64
//!     is_only:   u8
//!     reserved:  [3]u8
//!
//! Only fully resolved restrictions are written; anything still carrying a
//! sentinel endpoint is dropped here.

use anyhow::{ensure, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::fingerprint::{FingerPrint, FINGERPRINT_SIZE};
use crate::records::TurnRestriction;

pub const RECORD_SIZE: usize = 28;

/// A restriction as consumed by the routing engine: node-based, fully
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRestriction {
    pub from_node: u64,
    pub via_node: u64,
    pub to_node: u64,
    pub is_only: bool,
}

pub struct RestrictionsFile;

impl RestrictionsFile {
    /// Stream restrictions, writing only the resolved ones. Returns the
    /// written count.
    pub fn write<P, I>(path: P, restrictions: I) -> Result<u32>
    where
        P: AsRef<Path>,
        I: Iterator<Item = Result<TurnRestriction>>,
    {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&FingerPrint::current().to_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;

        let mut count = 0u32;
        let mut record = [0u8; RECORD_SIZE];
        for restriction in restrictions {
            let restriction = restriction?;
            if !restriction.is_resolved() {
                continue;
            }
            record[0..8].copy_from_slice(&restriction.from_node.to_le_bytes());
            record[8..16].copy_from_slice(&restriction.via_node.to_le_bytes());
            record[16..24].copy_from_slice(&restriction.to_node.to_le_bytes());
            record[24] = restriction.is_only as u8;
            record[25..28].fill(0);
            writer.write_all(&record)?;
            count += 1;
        }

        writer.seek(SeekFrom::Start(FINGERPRINT_SIZE as u64))?;
        writer.write_all(&count.to_le_bytes())?;
        writer.flush()?;
        Ok(count)
    }

    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<ResolvedRestriction>> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; FINGERPRINT_SIZE + 4];
        reader.read_exact(&mut header)?;
        FingerPrint::from_bytes(&header[..FINGERPRINT_SIZE])?;
        let count = u32::from_le_bytes(header[FINGERPRINT_SIZE..].try_into()?);

        let mut restrictions = Vec::with_capacity(count as usize);
        let mut record = [0u8; RECORD_SIZE];
        for _ in 0..count {
            reader.read_exact(&mut record)?;
            restrictions.push(ResolvedRestriction {
                from_node: u64::from_le_bytes(record[0..8].try_into()?),
                via_node: u64::from_le_bytes(record[8..16].try_into()?),
                to_node: u64::from_le_bytes(record[16..24].try_into()?),
                is_only: record[24] != 0,
            });
        }
        Ok(restrictions)
    }

    pub fn verify<P: AsRef<Path>>(path: P) -> Result<()> {
        let mut file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;

        let mut header = [0u8; FINGERPRINT_SIZE + 4];
        file.read_exact(&mut header)?;
        FingerPrint::from_bytes(&header[..FINGERPRINT_SIZE])?;
        let count = u32::from_le_bytes(header[FINGERPRINT_SIZE..].try_into()?);

        let expected = (FINGERPRINT_SIZE + 4) as u64 + count as u64 * RECORD_SIZE as u64;
        let actual = file.seek(SeekFrom::End(0))?;
        ensure!(
            actual == expected,
            "Size mismatch in {}: expected {} bytes, got {}",
            path.as_ref().display(),
            expected,
            actual
        );

        println!(
            "  ✓ {} verified ({} restrictions, {} bytes)",
            path.as_ref().display(),
            count,
            actual
        );
        Ok(())
    }
}
