//! Linear merge-joins over externally sorted containers
//!
//! Both joins advance two cursors over sequences sorted by the same key,
//! never seeking backwards. Unmatched records on either side are skipped
//! silently; callers read the returned stats when a skip is worth a
//! diagnostic.

use anyhow::Result;
use std::io::{BufWriter, Write};
use tempfile::NamedTempFile;

use crate::container::ExternalVec;
use crate::records::Record;

#[derive(Debug, Default, Clone, Copy)]
pub struct JoinStats {
    pub matched: u64,
    pub unmatched_left: u64,
}

/// Left-semi-join with a side effect: every left record is rewritten, and
/// `apply` mutates those with a matching right record.
///
/// Duplicate keys on the left are allowed; the right cursor holds its
/// position until the left key moves past it, so each left duplicate sees
/// the same right record. Right keys must be unique.
pub fn semi_join_update<L, R, K, KL, KR, F>(
    left: &mut ExternalVec<L>,
    right: &mut ExternalVec<R>,
    left_key: KL,
    right_key: KR,
    mut apply: F,
) -> Result<JoinStats>
where
    L: Record,
    R: Record,
    K: Ord,
    KL: Fn(&L) -> K,
    KR: Fn(&R) -> K,
    F: FnMut(&mut L, &R) -> Result<()>,
{
    left.flush()?;
    right.flush()?;

    let mut stats = JoinStats::default();
    let mut out = NamedTempFile::new_in(left.dir())?;
    {
        let mut writer = BufWriter::new(out.as_file_mut());
        let mut buf = vec![0u8; L::SIZE];

        let mut right_iter = right.iter()?;
        let mut current_right: Option<R> = right_iter.next().transpose()?;

        for record in left.iter()? {
            let mut record = record?;
            let key = left_key(&record);

            while let Some(r) = &current_right {
                if right_key(r) < key {
                    current_right = right_iter.next().transpose()?;
                } else {
                    break;
                }
            }

            match &current_right {
                Some(r) if right_key(r) == key => {
                    apply(&mut record, r)?;
                    stats.matched += 1;
                }
                _ => stats.unmatched_left += 1,
            }

            record.encode(&mut buf);
            writer.write_all(&buf)?;
        }
        writer.flush()?;
    }
    left.replace_with(out)?;
    Ok(stats)
}

/// Inner join over two sequences with unique keys; `emit` is called once per
/// matched pair and both cursors advance past the match.
pub fn inner_join<L, R, K, KL, KR, F>(
    left: &mut ExternalVec<L>,
    right: &mut ExternalVec<R>,
    left_key: KL,
    right_key: KR,
    mut emit: F,
) -> Result<u64>
where
    L: Record,
    R: Record,
    K: Ord,
    KL: Fn(&L) -> K,
    KR: Fn(&R) -> K,
    F: FnMut(&L, &R) -> Result<()>,
{
    left.flush()?;
    right.flush()?;

    let mut matched = 0u64;
    let mut left_iter = left.iter()?;
    let mut right_iter = right.iter()?;
    let mut l = left_iter.next().transpose()?;
    let mut r = right_iter.next().transpose()?;

    while let (Some(left_rec), Some(right_rec)) = (&l, &r) {
        let lk = left_key(left_rec);
        let rk = right_key(right_rec);
        if lk < rk {
            l = left_iter.next().transpose()?;
        } else if lk > rk {
            r = right_iter.next().transpose()?;
        } else {
            emit(left_rec, right_rec)?;
            matched += 1;
            l = left_iter.next().transpose()?;
            r = right_iter.next().transpose()?;
        }
    }
    Ok(matched)
}
