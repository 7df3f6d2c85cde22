//! Range queries over the stored upper-triangular matrix
//!
//! A [`PixelSelector`] describes the cartesian product of two half-open bin
//! ranges. Iterating it seeks to the first row with the index, crops columns
//! by binary search over `pixels/bin2_id`, and stops at an end offset that is
//! computed once, up front.

use super::bin_table::BinTable;
use super::chromosome::{Chromosome, ChromosomeSet};
use super::dataset::{lower_bound, Dataset, DatasetCursor};
use super::error::{QueryError, QueryResult, Result};
use super::index::Index;
use super::numeric::Count;
use super::pixel::Pixel;
use std::fmt;
use std::sync::Arc;

/// A genomic interval `[start, end)` on a single chromosome
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub chrom: Chromosome,
    pub start: u32,
    pub end: u32,
}

impl GenomicInterval {
    /// Interval spanning a whole chromosome
    pub fn whole(chrom: &Chromosome) -> Self {
        Self {
            chrom: chrom.clone(),
            start: 0,
            end: chrom.length(),
        }
    }

    /// Build an interval from explicit coordinates.
    ///
    /// `end` is clamped to the chromosome length.
    pub fn new(chroms: &ChromosomeSet, chrom: &str, start: u32, end: u32) -> QueryResult<Self> {
        let query = format!("{}:{}-{}", chrom, start, end);
        let chrom = chroms
            .get_by_name(chrom)
            .ok_or_else(|| QueryError::UnknownChromosome {
                query: query.clone(),
                chrom: chrom.to_string(),
            })?;
        Self::checked(chrom, start, end, &query)
    }

    /// Parse `chrom` or `chrom:start-end`.
    ///
    /// Positions may contain `,` separators. An end past the chromosome
    /// length is clamped.
    pub fn parse_ucsc(chroms: &ChromosomeSet, query: &str) -> QueryResult<Self> {
        let malformed = |reason: &str| QueryError::Malformed {
            query: query.to_string(),
            reason: reason.to_string(),
        };

        if query.is_empty() {
            return Err(malformed("query is empty"));
        }
        if let Some(chrom) = chroms.get_by_name(query) {
            return Ok(Self::whole(chrom));
        }

        let (p1, p2) = match (query.rfind(':'), query.rfind('-')) {
            (Some(p1), Some(p2)) if p1 < p2 => (p1, p2),
            (None, _) => {
                return Err(QueryError::UnknownChromosome {
                    query: query.to_string(),
                    chrom: query.to_string(),
                })
            }
            _ => return Err(malformed("expected a query in the form chrom:start-end")),
        };

        let chrom_name = &query[..p1];
        let start_str = &query[p1 + 1..p2];
        let end_str = &query[p2 + 1..];

        let chrom = chroms
            .get_by_name(chrom_name)
            .ok_or_else(|| QueryError::UnknownChromosome {
                query: query.to_string(),
                chrom: chrom_name.to_string(),
            })?;
        if start_str.is_empty() {
            return Err(malformed("missing start position"));
        }
        if end_str.is_empty() {
            return Err(malformed("missing end position"));
        }

        let start = parse_position(query, "start", start_str)?;
        let end = parse_position(query, "end", end_str)?;
        Self::checked(chrom, start, end, query)
    }

    fn checked(chrom: &Chromosome, start: u32, end: u32, query: &str) -> QueryResult<Self> {
        if start > end {
            return Err(QueryError::InvalidRange {
                query: query.to_string(),
                start,
                end,
            });
        }
        let end = end.min(chrom.length());
        if start > end {
            return Err(QueryError::InvalidPosition {
                query: query.to_string(),
                reason: format!(
                    "start position is greater than the chromosome size ({} > {})",
                    start,
                    chrom.length()
                ),
            });
        }
        Ok(Self {
            chrom: chrom.clone(),
            start,
            end,
        })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Bins overlapping the interval, as a half-open range of bin ids
    pub fn bin_range(&self, bins: &BinTable) -> Result<BinRange> {
        if self.start == self.chrom.length() {
            let end = bins.chrom_offset(self.chrom.id())? + bins.chrom_num_bins(self.chrom.id())?;
            return Ok(BinRange::new(end, end));
        }
        let lo = bins.coord_to_bin_id_by_chrom_id(self.chrom.id(), self.start)?;
        if self.is_empty() {
            return Ok(BinRange::new(lo, lo));
        }
        let hi = bins.coord_to_bin_id_by_chrom_id(self.chrom.id(), self.end - 1)? + 1;
        Ok(BinRange::new(lo, hi))
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom.name(), self.start, self.end)
    }
}

fn parse_position(query: &str, what: &str, s: &str) -> QueryResult<u32> {
    let digits: String = s.chars().filter(|&c| c != ',').collect();
    digits.parse::<u32>().map_err(|e| QueryError::InvalidPosition {
        query: query.to_string(),
        reason: format!("invalid {} position \"{}\": {}", what, s, e),
    })
}

/// Half-open range of bin ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BinRange {
    pub lo: u64,
    pub hi: u64,
}

impl BinRange {
    #[inline]
    pub fn new(lo: u64, hi: u64) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }

    #[inline]
    pub fn contains(&self, bin_id: u64) -> bool {
        bin_id >= self.lo && bin_id < self.hi
    }
}

/// Cartesian range query over `pixels/*`
#[derive(Debug, Clone)]
pub struct PixelSelector {
    index: Arc<Index>,
    bin1_dset: Dataset,
    bin2_dset: Dataset,
    count_dset: Dataset,
    range1: BinRange,
    range2: BinRange,
}

impl PixelSelector {
    pub fn new(
        index: Arc<Index>,
        bin1_dset: Dataset,
        bin2_dset: Dataset,
        count_dset: Dataset,
        range1: BinRange,
        range2: BinRange,
    ) -> Self {
        Self {
            index,
            bin1_dset,
            bin2_dset,
            count_dset,
            range1,
            range2,
        }
    }

    /// Selector spanning every bin
    pub fn whole(index: Arc<Index>, bin1_dset: Dataset, bin2_dset: Dataset, count_dset: Dataset) -> Self {
        let all = BinRange::new(0, index.size());
        Self::new(index, bin1_dset, bin2_dset, count_dset, all, all)
    }

    #[inline]
    pub fn range1(&self) -> BinRange {
        self.range1
    }

    #[inline]
    pub fn range2(&self) -> BinRange {
        self.range2
    }

    pub fn bins(&self) -> &Arc<BinTable> {
        self.index.bins()
    }

    /// Lazily iterate matching pixels, reading counts as `N`
    pub fn iter<N: Count>(&self) -> Result<PixelIter<N>> {
        PixelIter::new(self)
    }

    /// Collect every matching pixel
    pub fn read_all<N: Count>(&self) -> Result<Vec<Pixel<N>>> {
        self.iter::<N>()?.collect()
    }
}

/// Iterator over the pixels of a [`PixelSelector`], in storage order
pub struct PixelIter<N> {
    index: Arc<Index>,
    bin1: DatasetCursor<u64>,
    bin2: DatasetCursor<u64>,
    count: DatasetCursor<N>,
    range1: BinRange,
    range2: BinRange,
    offset: u64,
    end_offset: u64,
    current: Option<Pixel<N>>,
    needs_advance: bool,
    failed: bool,
}

impl<N: Count> PixelIter<N> {
    fn new(sel: &PixelSelector) -> Result<Self> {
        let mut it = Self {
            index: Arc::clone(&sel.index),
            bin1: sel.bin1_dset.cursor(0),
            bin2: sel.bin2_dset.cursor(0),
            count: sel.count_dset.cursor(0),
            range1: sel.range1,
            range2: sel.range2,
            offset: 0,
            end_offset: 0,
            current: None,
            needs_advance: false,
            failed: false,
        };

        if it.range1.is_empty() || it.range2.is_empty() || it.index.nnz() == 0 {
            return Ok(it);
        }

        it.offset = it.index.get_offset_by_bin_id(it.range1.lo)?;
        it.end_offset = it.compute_end_offset()?;
        if it.end_offset < it.offset {
            it.end_offset = it.offset;
        }
        it.jump_to_next_overlap()?;
        Ok(it)
    }

    /// Current position in `pixels/*`
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset just past the last matching pixel
    #[inline]
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    fn compute_end_offset(&mut self) -> Result<u64> {
        // rows past range2 cannot hold upper-triangular pixels inside range2
        let last_row = self.range1.hi.min(self.range2.hi);
        let mut row = last_row;
        while row > self.range1.lo {
            row -= 1;
            let row_start = self.index.get_offset_by_bin_id(row)?;
            let row_end = self.index.get_offset_by_bin_id(row + 1)?;
            if row_start >= row_end {
                continue;
            }
            let lb = lower_bound(&mut self.bin2, row_start, row_end, self.range2.lo)?;
            let ub = lower_bound(&mut self.bin2, lb, row_end, self.range2.hi)?;
            if lb < ub {
                return Ok(ub);
            }
        }
        Ok(self.offset)
    }

    /// Move forward until the cursor lies inside `range1 x range2`
    fn jump_to_next_overlap(&mut self) -> Result<()> {
        while self.offset < self.end_offset {
            let b1 = self.bin1.value_at(self.offset)?;
            let b2 = self.bin2.value_at(self.offset)?;

            if b2 < self.range2.lo {
                // jump to column
                let row_end = self.index.get_offset_by_bin_id(b1 + 1)?;
                self.offset = lower_bound(&mut self.bin2, self.offset, row_end, self.range2.lo)?;
                continue;
            }
            if b2 >= self.range2.hi {
                // jump to row
                let next_row = b1 + 1;
                if next_row >= self.range1.hi {
                    self.offset = self.end_offset;
                    break;
                }
                self.offset = self.index.get_offset_by_bin_id(next_row)?;
                continue;
            }
            break;
        }
        self.offset = self.offset.min(self.end_offset);
        Ok(())
    }

    /// Pixel under the cursor, read once and cached until the next advance
    pub fn current(&mut self) -> Result<Option<Pixel<N>>> {
        if self.offset >= self.end_offset {
            return Ok(None);
        }
        if self.current.is_none() {
            let bin1_id = self.bin1.value_at(self.offset)?;
            let bin2_id = self.bin2.value_at(self.offset)?;
            let count = self.count.value_at(self.offset)?;
            self.current = Some(Pixel::new(bin1_id, bin2_id, count));
        }
        Ok(self.current)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = None;
        self.offset += 1;
        self.jump_to_next_overlap()
    }
}

impl<N: Count> Iterator for PixelIter<N> {
    type Item = Result<Pixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.needs_advance {
            self.needs_advance = false;
            if let Err(e) = self.advance() {
                self.failed = true;
                return Some(Err(e));
            }
        }
        match self.current() {
            Ok(Some(pixel)) => {
                self.needs_advance = true;
                Some(Ok(pixel))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
