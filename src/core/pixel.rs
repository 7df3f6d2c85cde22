//! Pixels of the upper-triangular contact matrix

use super::bin_table::{Bin, BinTable};
use super::error::BinTableResult;
use std::cmp::Ordering;
use std::fmt;

/// Row/column pair of bin ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PixelCoordinates {
    pub bin1_id: u64,
    pub bin2_id: u64,
}

impl PixelCoordinates {
    #[inline]
    pub fn new(bin1_id: u64, bin2_id: u64) -> Self {
        Self { bin1_id, bin2_id }
    }

    #[inline]
    pub fn is_upper_triangular(&self) -> bool {
        self.bin1_id <= self.bin2_id
    }

    /// Resolve both bin ids against `bins`
    pub fn bins<'a>(&self, bins: &'a BinTable) -> BinTableResult<(Bin<'a>, Bin<'a>)> {
        Ok((
            bins.bin_id_to_coords(self.bin1_id)?,
            bins.bin_id_to_coords(self.bin2_id)?,
        ))
    }
}

impl fmt::Display for PixelCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.bin1_id, self.bin2_id)
    }
}

/// A stored matrix entry: coordinates plus a count
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pixel<N> {
    pub coords: PixelCoordinates,
    pub count: N,
}

impl<N> Pixel<N> {
    #[inline]
    pub fn new(bin1_id: u64, bin2_id: u64, count: N) -> Self {
        Self {
            coords: PixelCoordinates::new(bin1_id, bin2_id),
            count,
        }
    }

    #[inline]
    pub fn bin1_id(&self) -> u64 {
        self.coords.bin1_id
    }

    #[inline]
    pub fn bin2_id(&self) -> u64 {
        self.coords.bin2_id
    }
}

/// Ordering only looks at coordinates (row-major)
impl<N: PartialEq> PartialOrd for Pixel<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.coords.cmp(&other.coords))
    }
}

impl<N: fmt::Display> fmt::Display for Pixel<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.coords.bin1_id, self.coords.bin2_id, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ChromosomeSet;

    #[test]
    fn test_ordering_is_row_major() {
        let a = Pixel::new(0, 5, 10u32);
        let b = Pixel::new(1, 1, 1u32);
        let c = Pixel::new(1, 2, 1u32);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(
            Pixel::new(3, 3, 1u32).partial_cmp(&Pixel::new(3, 3, 2u32)),
            Some(Ordering::Equal)
        );
        assert_ne!(Pixel::new(3, 3, 1u32), Pixel::new(3, 3, 2u32));
    }

    #[test]
    fn test_resolve_bins() {
        let chroms = ChromosomeSet::new([("chr1", 100), ("chr2", 50)]).unwrap();
        let bins = BinTable::new(chroms, 30).unwrap();
        let (b1, b2) = PixelCoordinates::new(3, 5).bins(&bins).unwrap();
        assert_eq!(b1.to_string(), "chr1:90-100");
        assert_eq!(b2.to_string(), "chr2:30-50");
        assert!(PixelCoordinates::new(0, 6).bins(&bins).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Pixel::new(1, 2, 3.5f64).to_string(), "1\t2\t3.5");
        assert_eq!(PixelCoordinates::new(4, 9).to_string(), "(4, 9)");
    }
}
