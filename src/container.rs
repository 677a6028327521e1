//! On-disk record containers
//!
//! An `ExternalVec` is an append-only file of packed records (no header;
//! the record count is the file length divided by the record size). The
//! upstream parser populates these files; the consolidation passes rewrite
//! them wholesale via temp-file-and-rename, so a crash never leaves a
//! half-mutated container behind.

use anyhow::{ensure, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::records::Record;

pub struct ExternalVec<T: Record> {
    path: PathBuf,
    len: u64,
    writer: Option<BufWriter<File>>,
    _marker: PhantomData<T>,
}

impl<T: Record> ExternalVec<T> {
    /// Create an empty container, truncating any existing file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            len: 0,
            writer: Some(BufWriter::new(file)),
            _marker: PhantomData,
        })
    }

    /// Open an existing container populated by the upstream parser.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let meta = std::fs::metadata(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        ensure!(
            meta.len() % T::SIZE as u64 == 0,
            "{}: length {} is not a multiple of the {}-byte record size",
            path.as_ref().display(),
            meta.len(),
            T::SIZE
        );
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            len: meta.len() / T::SIZE as u64,
            writer: None,
            _marker: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the container lives in; scratch files go next to it so
    /// renames stay on one filesystem.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one record. Only valid on containers opened with `create`
    /// or re-opened for appending.
    pub fn push(&mut self, record: &T) -> Result<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .with_context(|| format!("Failed to append to {}", self.path.display()))?;
            self.writer = Some(BufWriter::new(file));
        }
        let mut buf = vec![0u8; T::SIZE];
        record.encode(&mut buf);
        self.writer.as_mut().unwrap().write_all(&buf)?;
        self.len += 1;
        Ok(())
    }

    /// Flush buffered appends and close the write handle.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("Failed to flush {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Stream all records in file order.
    pub fn iter(&self) -> Result<RecordIter<T>> {
        ensure!(
            self.writer.is_none(),
            "{}: container is still open for appending; flush() first",
            self.path.display()
        );
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        Ok(RecordIter {
            reader: BufReader::new(file),
            buf: vec![0u8; T::SIZE],
            _marker: PhantomData,
        })
    }

    /// Atomically replace the container contents with a rewritten file.
    pub fn replace_with(&mut self, replacement: NamedTempFile) -> Result<()> {
        self.flush()?;
        replacement
            .persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        self.len = std::fs::metadata(&self.path)?.len() / T::SIZE as u64;
        Ok(())
    }

    /// Drop adjacent duplicate records. Only meaningful after a sort.
    pub fn dedup_sorted(&mut self) -> Result<()>
    where
        T: PartialEq,
    {
        self.flush()?;
        let mut out = NamedTempFile::new_in(self.dir())?;
        {
            let mut writer = BufWriter::new(out.as_file_mut());
            let mut buf = vec![0u8; T::SIZE];
            let mut previous: Option<T> = None;
            for record in self.iter()? {
                let record = record?;
                if previous.as_ref() != Some(&record) {
                    record.encode(&mut buf);
                    writer.write_all(&buf)?;
                    previous = Some(record);
                }
            }
            writer.flush()?;
        }
        self.replace_with(out)
    }
}

pub struct RecordIter<T: Record> {
    reader: BufReader<File>,
    buf: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: Record> Iterator for RecordIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_exact(&mut self.buf) {
            Ok(()) => Some(Ok(T::decode(&self.buf))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_push_flush_iter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ids.raw");
        let mut vec: ExternalVec<u64> = ExternalVec::create(&path).unwrap();
        for id in [5u64, 3, 9] {
            vec.push(&id).unwrap();
        }
        vec.flush().unwrap();
        assert_eq!(vec.len(), 3);

        let records: Vec<u64> = vec.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![5, 3, 9]);

        // Reopening sees the same contents.
        let reopened: ExternalVec<u64> = ExternalVec::open(&path).unwrap();
        assert_eq!(reopened.len(), 3);
    }

    #[test]
    fn test_iter_before_flush_is_rejected() {
        let dir = tempdir().unwrap();
        let mut vec: ExternalVec<u64> = ExternalVec::create(dir.path().join("x.raw")).unwrap();
        vec.push(&1).unwrap();
        assert!(vec.iter().is_err());
    }

    #[test]
    fn test_dedup_sorted() {
        let dir = tempdir().unwrap();
        let mut vec: ExternalVec<u64> = ExternalVec::create(dir.path().join("d.raw")).unwrap();
        for id in [1u64, 1, 2, 2, 2, 7] {
            vec.push(&id).unwrap();
        }
        vec.flush().unwrap();
        vec.dedup_sorted().unwrap();
        let records: Vec<u64> = vec.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![1, 2, 7]);
    }

    #[test]
    fn test_open_rejects_truncated_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.raw");
        std::fs::write(&path, [0u8; 13]).unwrap();
        assert!(ExternalVec::<u64>::open(&path).is_err());
    }
}
