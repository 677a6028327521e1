//! names.raw container - street name table deposited by the parser
//!
//! Format: one `u16` byte length followed by that many UTF-8 bytes, per
//! entry, in name-id order. Entry 0 is the empty string (the "no name"
//! id). Raw entries may exceed the 255-byte output clamp; clamping happens
//! when the name index is written.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

pub struct RawNamesFile {
    path: PathBuf,
}

impl RawNamesFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::metadata(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn write<P: AsRef<Path>, S: AsRef<str>>(path: P, names: &[S]) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        let mut writer = BufWriter::new(file);
        for name in names {
            let bytes = name.as_ref().as_bytes();
            writer.write_all(&(bytes.len() as u16).to_le_bytes())?;
            writer.write_all(bytes)?;
        }
        writer.flush()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream all names in id order. The name writer calls this twice:
    /// once for lengths, once for bytes.
    pub fn iter(&self) -> Result<RawNamesIter> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        Ok(RawNamesIter {
            reader: BufReader::new(file),
        })
    }
}

pub struct RawNamesIter {
    reader: BufReader<File>,
}

impl Iterator for RawNamesIter {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut len_bytes = [0u8; 2];
        match self.reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(Err(e.into())),
        }
        let len = u16::from_le_bytes(len_bytes) as usize;
        let mut bytes = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut bytes) {
            return Some(Err(anyhow::Error::from(e).context("Truncated name entry")));
        }
        Some(String::from_utf8(bytes).map_err(Into::into))
    }
}
