//! Row offset index
//!
//! `offset[bin1_id]` is the position in `pixels/*` of the first pixel whose
//! `bin1_id` equals that row. Offsets are kept per chromosome; the flat view
//! written to `indexes/bin1_offset` has `bins.len() + 1` elements, the last
//! one being the total number of stored pixels.

use super::bin_table::BinTable;
use super::error::{IndexError, IndexResult};
use std::sync::Arc;

/// Marker for rows whose first pixel has not been seen yet
pub const OFFSET_NOT_SET: u64 = u64::MAX;

/// Per-chromosome vectors of row offsets
#[derive(Debug, Clone)]
pub struct Index {
    bins: Arc<BinTable>,
    idx: Vec<Vec<u64>>,
    size: u64,
    nnz: u64,
}

impl Index {
    /// Create an index with every slot unset
    pub fn new(bins: Arc<BinTable>) -> Self {
        let idx: Vec<Vec<u64>> = bins
            .chromosomes()
            .iter()
            .map(|chrom| {
                let n = bins.chrom_num_bins(chrom.id()).unwrap_or(0);
                vec![OFFSET_NOT_SET; n as usize]
            })
            .collect();
        let size = idx.iter().map(|v| v.len() as u64).sum();

        Self {
            bins,
            idx,
            size,
            nnz: 0,
        }
    }

    /// Rebuild an index from the flat `indexes/bin1_offset` representation.
    ///
    /// The last element is taken as nnz. The result is validated.
    pub fn from_offsets(bins: Arc<BinTable>, offsets: &[u64]) -> IndexResult<Self> {
        let mut index = Self::new(bins);
        let expected = index.size + 1;
        if offsets.len() as u64 != expected {
            return Err(IndexError::Import(format!(
                "expected {} offsets, found {}",
                expected,
                offsets.len()
            )));
        }

        let mut pos = 0usize;
        for chrom_offsets in index.idx.iter_mut() {
            let n = chrom_offsets.len();
            chrom_offsets.copy_from_slice(&offsets[pos..pos + n]);
            pos += n;
        }
        index.nnz = offsets[pos];
        index.validate()?;
        Ok(index)
    }

    #[inline]
    pub fn bins(&self) -> &Arc<BinTable> {
        &self.bins
    }

    /// Number of rows (equal to the number of bins)
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    #[inline]
    pub fn bin_size(&self) -> u32 {
        self.bins.bin_size()
    }

    pub fn num_chromosomes(&self) -> usize {
        self.idx.len()
    }

    /// Offsets of the rows belonging to `chrom_id`
    pub fn chrom_offsets(&self, chrom_id: u32) -> IndexResult<&[u64]> {
        self.bins.chromosomes().at(chrom_id)?;
        Ok(&self.idx[chrom_id as usize])
    }

    pub fn get_offset_by_bin_id(&self, bin_id: u64) -> IndexResult<u64> {
        if bin_id == self.size {
            return Ok(self.nnz);
        }
        let (chrom_id, row) = self.locate(bin_id)?;
        self.get_offset_by_row_idx(chrom_id, row)
    }

    pub fn get_offset_by_pos(&self, chrom: &str, pos: u32) -> IndexResult<u64> {
        let chrom_id = self.bins.chromosomes().id_of(chrom)?;
        self.get_offset_by_row_idx(chrom_id, u64::from(pos / self.bin_size()))
    }

    pub fn get_offset_by_row_idx(&self, chrom_id: u32, row_idx: u64) -> IndexResult<u64> {
        let offsets = self.checked_row(chrom_id, row_idx)?;
        Ok(self.idx[offsets.0][offsets.1])
    }

    pub fn set_offset_by_bin_id(&mut self, bin_id: u64, offset: u64) -> IndexResult<()> {
        let (chrom_id, row) = self.locate(bin_id)?;
        self.set_offset_by_row_idx(chrom_id, row, offset)
    }

    pub fn set_offset_by_pos(&mut self, chrom: &str, pos: u32, offset: u64) -> IndexResult<()> {
        let chrom_id = self.bins.chromosomes().id_of(chrom)?;
        self.set_offset_by_row_idx(chrom_id, u64::from(pos / self.bin_size()), offset)
    }

    pub fn set_offset_by_row_idx(
        &mut self,
        chrom_id: u32,
        row_idx: u64,
        offset: u64,
    ) -> IndexResult<()> {
        let (c, r) = self.checked_row(chrom_id, row_idx)?;
        self.idx[c][r] = offset;
        Ok(())
    }

    /// Replace unset slots and freeze the index.
    ///
    /// Empty rows inherit the offset of the next non-empty row, scanning
    /// right to left, so a lookup on an empty row lands on the pixel that
    /// follows it.
    pub fn finalize(&mut self, nnz: u64) -> IndexResult<()> {
        self.nnz = nnz;
        let mut fill_value = nnz;

        for offsets in self.idx.iter_mut().rev() {
            for offset in offsets.iter_mut().rev() {
                if *offset == OFFSET_NOT_SET {
                    *offset = fill_value;
                } else {
                    fill_value = *offset;
                }
            }
        }

        if let Some(first) = self.idx.iter_mut().find_map(|v| v.first_mut()) {
            *first = 0;
        }

        self.validate()
    }

    /// Check ordering and bounds chromosome by chromosome
    pub fn validate(&self) -> IndexResult<()> {
        let chroms = self.bins.chromosomes();
        let mut prev_last: Option<u64> = None;

        for (chrom, offsets) in chroms.iter().zip(self.idx.iter()) {
            let corrupt = |reason: String| IndexError::Corrupt {
                chrom: chrom.name().to_string(),
                reason,
            };
            let Some(&front) = offsets.first() else {
                continue;
            };

            match prev_last {
                None if front != 0 => return Err(corrupt("first offset is not zero".into())),
                Some(prev) if front < prev => {
                    return Err(corrupt(format!(
                        "offsets are not in ascending order: offset for bin {}:0-{} should be >= {}, found {}",
                        chrom.name(),
                        self.bin_size().min(chrom.length()),
                        prev,
                        front
                    )));
                }
                _ => {}
            }

            if let Some(i) = offsets.windows(2).position(|w| w[0] > w[1]) {
                return Err(corrupt(format!(
                    "offsets are not in ascending order: pixels/bin1_offset[{}]={} > pixels/bin1_offset[{}]={}",
                    i,
                    offsets[i],
                    i + 1,
                    offsets[i + 1]
                )));
            }

            if self.nnz != 0 {
                if let Some(&bad) = offsets.iter().find(|&&o| o > self.nnz) {
                    return Err(corrupt(format!(
                        "invalid offset {}: offset is greater than nnz ({} > {})",
                        bad, bad, self.nnz
                    )));
                }
            }

            prev_last = offsets.last().copied();
        }
        Ok(())
    }

    /// Per-chromosome starting bin ids, `num_chromosomes + 1` values
    pub fn compute_chrom_offsets(&self) -> Vec<u64> {
        let mut buff = Vec::with_capacity(self.idx.len() + 1);
        buff.push(0);
        let mut offset = 0u64;
        for offsets in &self.idx {
            offset += offsets.len() as u64;
            buff.push(offset);
        }
        buff
    }

    /// Every slot in row order followed by nnz
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.idx
            .iter()
            .flat_map(|v| v.iter().copied())
            .chain(std::iter::once(self.nnz))
    }

    fn locate(&self, bin_id: u64) -> IndexResult<(u32, u64)> {
        if bin_id >= self.size {
            return Err(IndexError::BinIdOutOfRange {
                bin_id,
                size: self.size,
            });
        }
        let prefix = self.bins.prefix_sum();
        let chrom_idx = prefix.partition_point(|&n| n <= bin_id) - 1;
        Ok((chrom_idx as u32, bin_id - prefix[chrom_idx]))
    }

    fn checked_row(&self, chrom_id: u32, row_idx: u64) -> IndexResult<(usize, usize)> {
        let chrom = self.bins.chromosomes().at(chrom_id)?;
        let offsets = &self.idx[chrom_id as usize];
        if row_idx >= offsets.len() as u64 {
            return Err(IndexError::RowOutOfRange {
                row: row_idx,
                chrom: chrom.to_string(),
            });
        }
        Ok((chrom_id as usize, row_idx as usize))
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.nnz == other.nnz && self.idx == other.idx && self.bins == other.bins
    }
}
