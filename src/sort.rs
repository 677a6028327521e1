//! External k-way merge sort over record containers
//!
//! A sort pass is bounded by a byte budget: the input is cut into runs that
//! fit the budget, each run is sorted in memory (rayon-parallel) and spilled
//! to a run file, and the runs are merged through a min-heap into a
//! replacement container file. Run files live in a scratch directory next to
//! the container and are removed when the sort finishes, successfully or not.
//!
//! Inputs that fit the budget outright are sorted in memory and rewritten
//! without touching the disk twice.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

use crate::container::ExternalVec;
use crate::records::Record;

pub struct ExternalSorter {
    budget_bytes: usize,
}

impl ExternalSorter {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Sort `vec` ascending by `key`, rewriting its backing file.
    pub fn sort_by_key<T, K, F>(&self, vec: &mut ExternalVec<T>, key: F) -> Result<()>
    where
        T: Record + Send,
        K: Ord + Copy + Send,
        F: Fn(&T) -> K + Sync,
    {
        vec.flush()?;
        if vec.len() < 2 {
            return Ok(());
        }

        let run_capacity = (self.budget_bytes / T::SIZE).max(1);
        if vec.len() <= run_capacity as u64 {
            return self.sort_in_memory(vec, &key);
        }

        let scratch = TempDir::with_prefix_in("sort-runs-", vec.dir())
            .context("Failed to create sort scratch directory")?;
        let runs = self.spill_runs(vec, run_capacity, scratch.path(), &key)?;
        let merged = self.merge_runs::<T, K, F>(vec.dir(), runs, &key)?;
        vec.replace_with(merged)
        // scratch drops here, removing the run files
    }

    fn sort_in_memory<T, K, F>(&self, vec: &mut ExternalVec<T>, key: &F) -> Result<()>
    where
        T: Record + Send,
        K: Ord + Copy + Send,
        F: Fn(&T) -> K + Sync,
    {
        let mut records: Vec<T> = vec.iter()?.collect::<Result<_>>()?;
        records.par_sort_unstable_by(|a, b| key(a).cmp(&key(b)));

        let mut out = NamedTempFile::new_in(vec.dir())?;
        {
            let mut writer = BufWriter::new(out.as_file_mut());
            let mut buf = vec![0u8; T::SIZE];
            for record in &records {
                record.encode(&mut buf);
                writer.write_all(&buf)?;
            }
            writer.flush()?;
        }
        vec.replace_with(out)
    }

    fn spill_runs<T, K, F>(
        &self,
        vec: &ExternalVec<T>,
        run_capacity: usize,
        scratch: &Path,
        key: &F,
    ) -> Result<Vec<File>>
    where
        T: Record + Send,
        K: Ord + Copy + Send,
        F: Fn(&T) -> K + Sync,
    {
        let mut runs = Vec::new();
        let mut iter = vec.iter()?;
        let mut buf = vec![0u8; T::SIZE];
        loop {
            let mut run: Vec<T> = Vec::with_capacity(run_capacity);
            for record in iter.by_ref().take(run_capacity) {
                run.push(record?);
            }
            if run.is_empty() {
                break;
            }
            run.par_sort_unstable_by(|a, b| key(a).cmp(&key(b)));

            let path = scratch.join(format!("run-{}", runs.len()));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create run file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            for record in &run {
                record.encode(&mut buf);
                writer.write_all(&buf)?;
            }
            writer.flush()?;
            // Reopen read-only for the merge phase.
            runs.push(File::open(&path)?);
        }
        Ok(runs)
    }

    fn merge_runs<T, K, F>(&self, out_dir: &Path, runs: Vec<File>, key: &F) -> Result<NamedTempFile>
    where
        T: Record,
        K: Ord + Copy,
        F: Fn(&T) -> K,
    {
        let mut cursors: Vec<RunCursor<T>> = runs
            .into_iter()
            .map(|file| RunCursor::new(file, T::SIZE))
            .collect();

        let mut heap: BinaryHeap<Reverse<(K, usize)>> = BinaryHeap::new();
        for (idx, cursor) in cursors.iter_mut().enumerate() {
            if let Some(record) = cursor.advance()? {
                heap.push(Reverse((key(record), idx)));
            }
        }

        let mut out = NamedTempFile::new_in(out_dir)?;
        {
            let mut writer = BufWriter::new(out.as_file_mut());
            let mut buf = vec![0u8; T::SIZE];
            while let Some(Reverse((_, idx))) = heap.pop() {
                let cursor = &mut cursors[idx];
                cursor
                    .current
                    .as_ref()
                    .expect("heap entry without a record")
                    .encode(&mut buf);
                writer.write_all(&buf)?;
                if let Some(record) = cursor.advance()? {
                    heap.push(Reverse((key(record), idx)));
                }
            }
            writer.flush()?;
        }
        Ok(out)
    }
}

struct RunCursor<T> {
    reader: BufReader<File>,
    buf: Vec<u8>,
    current: Option<T>,
}

impl<T: Record> RunCursor<T> {
    fn new(file: File, record_size: usize) -> Self {
        Self {
            reader: BufReader::new(file),
            buf: vec![0u8; record_size],
            current: None,
        }
    }

    fn advance(&mut self) -> Result<Option<&T>> {
        match self.reader.read_exact(&mut self.buf) {
            Ok(()) => {
                self.current = Some(T::decode(&self.buf));
                Ok(self.current.as_ref())
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.current = None;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
