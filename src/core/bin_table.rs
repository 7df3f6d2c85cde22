//! Fixed-width bin table
//!
//! The table is virtual: bins are derived on demand from the chromosome
//! lengths and the bin size. `prefix_sum[i]` holds the number of bins
//! over chromosomes `[0, i)`, so mapping between bin ids and genomic
//! coordinates is an upper-bound search plus an integer division.

use super::chromosome::{Chromosome, ChromosomeSet};
use super::error::{BinTableError, BinTableResult};
use std::fmt;

/// A genomic interval of at most `bin_size` bp on a single chromosome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bin<'a> {
    id: u64,
    chrom: &'a Chromosome,
    start: u32,
    end: u32,
}

impl<'a> Bin<'a> {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn chrom(&self) -> &'a Chromosome {
        self.chrom
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.end
    }
}

impl fmt::Display for Bin<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom.name(), self.start, self.end)
    }
}

/// Table of fixed-width bins covering every chromosome of a [`ChromosomeSet`]
#[derive(Debug, Clone)]
pub struct BinTable {
    chroms: ChromosomeSet,
    bin_size: u32,
    prefix_sum: Vec<u64>,
}

impl BinTable {
    /// Build the table for `chroms` at resolution `bin_size`.
    pub fn new(chroms: ChromosomeSet, bin_size: u32) -> BinTableResult<Self> {
        if bin_size == 0 {
            return Err(BinTableError::ZeroBinSize);
        }

        let mut prefix_sum = Vec::with_capacity(chroms.len() + 1);
        prefix_sum.push(0u64);
        let mut total = 0u64;
        for chrom in chroms.iter() {
            total += num_bins(chrom.length(), bin_size);
            prefix_sum.push(total);
        }

        Ok(Self {
            chroms,
            bin_size,
            prefix_sum,
        })
    }

    /// Total number of bins
    #[inline]
    pub fn len(&self) -> u64 {
        self.prefix_sum.last().copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    #[inline]
    pub fn chromosomes(&self) -> &ChromosomeSet {
        &self.chroms
    }

    pub fn num_chromosomes(&self) -> usize {
        self.chroms.len()
    }

    /// Cumulative number of bins per chromosome, starting with 0
    pub fn prefix_sum(&self) -> &[u64] {
        &self.prefix_sum
    }

    /// Id of the first bin of chromosome `chrom_id`
    pub fn chrom_offset(&self, chrom_id: u32) -> BinTableResult<u64> {
        self.chroms.at(chrom_id)?;
        Ok(self.prefix_sum[chrom_id as usize])
    }

    /// Number of bins of chromosome `chrom_id`
    pub fn chrom_num_bins(&self, chrom_id: u32) -> BinTableResult<u64> {
        let chrom = self.chroms.at(chrom_id)?;
        Ok(num_bins(chrom.length(), self.bin_size))
    }

    pub fn iter(&self) -> BinIter<'_> {
        BinIter {
            table: self,
            front: 0,
            back: self.len(),
        }
    }

    /// Map a bin id back to its genomic coordinates
    pub fn bin_id_to_coords(&self, bin_id: u64) -> BinTableResult<Bin<'_>> {
        if bin_id >= self.len() {
            return Err(BinTableError::BinIdOutOfRange(bin_id));
        }
        // upper bound: first prefix strictly greater than bin_id
        let chrom_idx = self.prefix_sum.partition_point(|&n| n <= bin_id) - 1;
        Ok(self.make_bin(chrom_idx, bin_id))
    }

    /// Alias of [`BinTable::bin_id_to_coords`]
    #[inline]
    pub fn at_id(&self, bin_id: u64) -> BinTableResult<Bin<'_>> {
        self.bin_id_to_coords(bin_id)
    }

    /// Bin overlapping `pos` on chromosome `chrom`
    pub fn at(&self, chrom: &str, pos: u32) -> BinTableResult<Bin<'_>> {
        let bin_id = self.coord_to_bin_id(chrom, pos)?;
        self.bin_id_to_coords(bin_id)
    }

    /// Map `(chrom, pos)` to a bin id. Requires `pos <= chrom.length`.
    pub fn coord_to_bin_id(&self, chrom: &str, pos: u32) -> BinTableResult<u64> {
        let chrom_id = self.chroms.id_of(chrom)?;
        self.coord_to_bin_id_by_chrom_id(chrom_id, pos)
    }

    pub fn coord_to_bin_id_by_chrom_id(&self, chrom_id: u32, pos: u32) -> BinTableResult<u64> {
        let chrom = self.chroms.at(chrom_id)?;
        if pos > chrom.length() {
            return Err(BinTableError::PositionOutOfRange {
                chrom: chrom.name().to_string(),
                pos,
                length: chrom.length(),
            });
        }
        Ok(self.prefix_sum[chrom_id as usize] + u64::from(pos / self.bin_size))
    }

    /// Table restricted to a single chromosome, same resolution
    pub fn subset(&self, chrom: &str) -> BinTableResult<BinTable> {
        let chrom = self.chroms.at_name(chrom)?;
        let chroms = ChromosomeSet::new([(chrom.name(), chrom.length())])?;
        BinTable::new(chroms, self.bin_size)
    }

    fn make_bin(&self, chrom_idx: usize, bin_id: u64) -> Bin<'_> {
        let chrom = &self.chroms.as_slice()[chrom_idx];
        let rel = bin_id - self.prefix_sum[chrom_idx];
        let start = (rel * u64::from(self.bin_size)) as u32;
        let end = start.saturating_add(self.bin_size).min(chrom.length());
        Bin {
            id: bin_id,
            chrom,
            start,
            end,
        }
    }
}

impl PartialEq for BinTable {
    fn eq(&self, other: &Self) -> bool {
        self.bin_size == other.bin_size && self.chroms == other.chroms
    }
}

impl Eq for BinTable {}

impl<'a> IntoIterator for &'a BinTable {
    type Item = Bin<'a>;
    type IntoIter = BinIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy, double-ended sequence of bins
#[derive(Debug, Clone)]
pub struct BinIter<'a> {
    table: &'a BinTable,
    front: u64,
    back: u64,
}

impl<'a> Iterator for BinIter<'a> {
    type Item = Bin<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let id = self.front;
        self.front += 1;
        self.table.bin_id_to_coords(id).ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.back - self.front) as usize;
        (n, Some(n))
    }
}

impl DoubleEndedIterator for BinIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.table.bin_id_to_coords(self.back).ok()
    }
}

impl ExactSizeIterator for BinIter<'_> {}

#[inline]
fn num_bins(length: u32, bin_size: u32) -> u64 {
    u64::from(length).div_ceil(u64::from(bin_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BinTable {
        let chroms =
            ChromosomeSet::new([("chr1", 50001), ("chr2", 25017), ("chr3", 10000)]).unwrap();
        BinTable::new(chroms, 5000).unwrap()
    }

    #[test]
    fn test_len() {
        assert_eq!(table().len(), 19);
        assert_eq!(table().prefix_sum(), &[0, 11, 17, 19]);
    }

    #[test]
    fn test_bin_id_to_coords() {
        let bins = table();
        let bin = bins.bin_id_to_coords(10).unwrap();
        assert_eq!(bin.chrom().name(), "chr1");
        assert_eq!((bin.start(), bin.end()), (50000, 50001));

        let bin = bins.bin_id_to_coords(11).unwrap();
        assert_eq!(bin.chrom().name(), "chr2");
        assert_eq!((bin.start(), bin.end()), (0, 5000));

        let last = bins.bin_id_to_coords(18).unwrap();
        assert_eq!(last.to_string(), "chr3:5000-10000");

        assert_eq!(
            bins.bin_id_to_coords(19).unwrap_err(),
            BinTableError::BinIdOutOfRange(19)
        );
    }

    #[test]
    fn test_coord_to_bin_id() {
        let bins = table();
        assert_eq!(bins.coord_to_bin_id("chr1", 50000).unwrap(), 10);
        assert_eq!(bins.coord_to_bin_id("chr2", 4999).unwrap(), 11);
        assert_eq!(bins.coord_to_bin_id("chr3", 0).unwrap(), 17);
        assert!(matches!(
            bins.coord_to_bin_id("chr1", 50002),
            Err(BinTableError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            bins.coord_to_bin_id("chrX", 0),
            Err(BinTableError::Chromosome(_))
        ));
    }

    #[test]
    fn test_iteration_both_directions() {
        let bins = table();
        let forward: Vec<u64> = bins.iter().map(|b| b.id()).collect();
        assert_eq!(forward, (0..19).collect::<Vec<_>>());

        let last = bins.iter().next_back().unwrap();
        assert_eq!(last.id(), 18);
        assert_eq!(bins.iter().rev().count(), 19);
        assert_eq!(bins.iter().len(), 19);
    }

    #[test]
    fn test_subset() {
        let bins = table();
        let sub = bins.subset("chr2").unwrap();
        assert_eq!(sub.len(), 6);
        assert_eq!(sub.bin_size(), 5000);
        assert_eq!(sub.bin_id_to_coords(5).unwrap().end(), 25017);
    }

    #[test]
    fn test_zero_bin_size() {
        let chroms = ChromosomeSet::new([("chr1", 10)]).unwrap();
        assert_eq!(BinTable::new(chroms, 0).unwrap_err(), BinTableError::ZeroBinSize);
    }

    #[test]
    fn test_single_bin_chromosome() {
        let chroms = ChromosomeSet::new([("chrM", 16569)]).unwrap();
        let bins = BinTable::new(chroms, 100_000).unwrap();
        assert_eq!(bins.len(), 1);
        let bin = bins.bin_id_to_coords(0).unwrap();
        assert_eq!((bin.start(), bin.end()), (0, 16569));
    }

    #[test]
    fn test_empty_table() {
        let bins = BinTable::new(ChromosomeSet::default(), 10).unwrap();
        assert!(bins.is_empty());
        assert_eq!(bins.iter().count(), 0);
    }
}
