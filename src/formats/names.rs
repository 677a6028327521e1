//! Street name index file
//!
//! Format: `RangeTable | u32 total_length | u8[total_length]` where the
//! blob is the concatenation of every name clamped to at most 255 bytes.
//! The range table alone recovers the (offset, length) of any name id.

use anyhow::{ensure, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::range_table::RangeTable;
use super::raw_names::RawNamesFile;

pub const MAX_NAME_LENGTH: usize = 255;

/// Clamped byte length of a name: at most 255, never splitting a UTF-8
/// codepoint, so the blob stays valid UTF-8.
pub fn clamped_len(name: &str) -> usize {
    if name.len() <= MAX_NAME_LENGTH {
        return name.len();
    }
    let mut len = MAX_NAME_LENGTH;
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    len
}

pub struct NamesFile;

impl NamesFile {
    /// Write the name index, streaming the raw table twice (lengths pass,
    /// bytes pass). Returns the entry count.
    pub fn write<P: AsRef<Path>>(path: P, source: &RawNamesFile) -> Result<u32> {
        let mut lengths = Vec::new();
        for name in source.iter()? {
            lengths.push(clamped_len(&name?) as u32);
        }
        let table = RangeTable::new(&lengths);

        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);

        table.write_to(&mut writer)?;
        writer.write_all(&table.sum_lengths().to_le_bytes())?;
        for name in source.iter()? {
            let name = name?;
            writer.write_all(&name.as_bytes()[..clamped_len(&name)])?;
        }
        writer.flush()?;

        Ok(table.len())
    }

    /// Read every name back via the range table.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let mut reader = BufReader::new(file);

        let table = RangeTable::read_from(&mut reader)?;
        let mut word = [0u8; 4];
        reader.read_exact(&mut word)?;
        let total_length = u32::from_le_bytes(word);
        ensure!(
            total_length == table.sum_lengths(),
            "Name blob length {} does not match range table sum {}",
            total_length,
            table.sum_lengths()
        );

        let mut blob = vec![0u8; total_length as usize];
        reader.read_exact(&mut blob)?;

        let mut names = Vec::with_capacity(table.len() as usize);
        for i in 0..table.len() {
            let (offset, length) = table.range(i).expect("index within table");
            let bytes = &blob[offset as usize..(offset + length) as usize];
            names.push(std::str::from_utf8(bytes)?.to_string());
        }
        Ok(names)
    }

    /// Structural check: table is well-formed and the blob size matches.
    pub fn verify<P: AsRef<Path>>(path: P) -> Result<()> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let table = RangeTable::read_from(&mut reader)?;
        let expected = table.serialized_size() + 4 + table.sum_lengths() as u64;
        ensure!(
            file_len == expected,
            "Size mismatch in {}: expected {} bytes, got {}",
            path.as_ref().display(),
            expected,
            file_len
        );

        println!(
            "  ✓ {} verified ({} names, {} bytes)",
            path.as_ref().display(),
            table.len(),
            file_len
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_clamped_len() {
        assert_eq!(clamped_len(""), 0);
        assert_eq!(clamped_len("Main St"), 7);
        assert_eq!(clamped_len(&"x".repeat(260)), 255);
        // 2-byte codepoints: 130 × "ß" = 260 bytes; clamp backs off to a boundary.
        assert_eq!(clamped_len(&"ß".repeat(130)), 254);
    }

    #[test]
    fn test_write_read_clamps_long_names() {
        let dir = tempdir().unwrap();
        let long = "x".repeat(260);
        let raw =
            RawNamesFile::write(dir.path().join("names.raw"), &["", "Main St", &long]).unwrap();

        let out = dir.path().join("names.idx");
        let count = NamesFile::write(&out, &raw).unwrap();
        assert_eq!(count, 3);

        let names = NamesFile::read_all(&out).unwrap();
        assert_eq!(names[0], "");
        assert_eq!(names[1], "Main St");
        assert_eq!(names[2], "x".repeat(255));

        NamesFile::verify(&out).unwrap();
    }
}
