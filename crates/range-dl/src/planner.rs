//! Chunk planning: split a known size into inclusive byte ranges

use serde::Serialize;

use crate::error::TransferError;

/// One inclusive byte range of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    /// Ranges are inclusive, so a range is never empty.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Plan the ordered ranges covering `total_size` bytes.
///
/// A zero size means the size is unknown, which makes range planning
/// impossible and is reported as [`TransferError::SizeUnknown`].
pub fn plan_chunks(total_size: u64, chunk_size: u64) -> Result<Vec<ChunkRange>, TransferError> {
    if total_size == 0 {
        return Err(TransferError::SizeUnknown);
    }
    if chunk_size == 0 {
        return Err(TransferError::InvalidConfig("chunk_size must be > 0".into()));
    }

    let total_chunks = total_size.div_ceil(chunk_size) as usize;
    let ranges = (0..total_chunks)
        .map(|index| {
            let start = index as u64 * chunk_size;
            let end = std::cmp::min(start + chunk_size - 1, total_size - 1);
            ChunkRange { index, start, end }
        })
        .collect();

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn assert_covers(total: u64, chunk: u64) {
        let ranges = plan_chunks(total, chunk).unwrap();
        assert_eq!(ranges.len() as u64, total.div_ceil(chunk));
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, total - 1);
        for (i, pair) in ranges.windows(2).enumerate() {
            assert_eq!(pair[0].index, i);
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap at {}", i);
        }
        let sum: u64 = ranges.iter().map(ChunkRange::len).sum();
        assert_eq!(sum, total);
    }

    #[test]
    fn sixteen_mib_splits_into_two_eight_mib_chunks() {
        let ranges = plan_chunks(16 * MIB, 8 * MIB).unwrap();
        assert_eq!(
            ranges,
            vec![
                ChunkRange {
                    index: 0,
                    start: 0,
                    end: 8_388_607,
                },
                ChunkRange {
                    index: 1,
                    start: 8_388_608,
                    end: 16_777_215,
                },
            ]
        );
        assert_eq!(ranges[1].header_value(), "bytes=8388608-16777215");
    }

    #[test]
    fn ranges_are_contiguous_for_many_sizes() {
        for total in [1, 2, 7, 8, 9, 63, 64, 65, 1000, 8 * MIB + 1] {
            for chunk in [1, 3, 8, 64, 8 * MIB] {
                assert_covers(total, chunk);
            }
        }
    }

    #[test]
    fn last_chunk_is_short_when_size_is_not_a_multiple() {
        let ranges = plan_chunks(10, 4).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(
            ranges[2],
            ChunkRange {
                index: 2,
                start: 8,
                end: 9,
            }
        );
        assert_eq!(ranges[2].len(), 2);
    }

    #[test]
    fn zero_size_is_size_unknown() {
        assert_eq!(plan_chunks(0, 8 * MIB), Err(TransferError::SizeUnknown));
    }
}
