//! Balanced views over a [`PixelSelector`]

use super::error::Result;
use super::numeric::Count;
use super::pixel::Pixel;
use super::selector::{PixelIter, PixelSelector};
use super::weights::{WeightKind, Weights};
use std::marker::PhantomData;
use std::sync::Arc;

/// Pairs a selector with a weight vector
#[derive(Debug, Clone)]
pub struct Balancer<N> {
    selector: PixelSelector,
    weights: Arc<Weights>,
    _count: PhantomData<N>,
}

impl<N: Count> Balancer<N> {
    pub fn new(selector: PixelSelector, weights: Arc<Weights>) -> Self {
        Self {
            selector,
            weights,
            _count: PhantomData,
        }
    }

    #[inline]
    pub fn kind(&self) -> WeightKind {
        self.weights.kind()
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn iter(&self) -> Result<BalancedIter<N>> {
        Ok(BalancedIter {
            inner: self.selector.iter::<N>()?,
            weights: Arc::clone(&self.weights),
        })
    }

    pub fn read_all(&self) -> Result<Vec<Pixel<f64>>> {
        self.iter()?.collect()
    }
}

/// Raw pixels converted to balanced `f64` counts
pub struct BalancedIter<N> {
    inner: PixelIter<N>,
    weights: Arc<Weights>,
}

impl<N: Count> Iterator for BalancedIter<N> {
    type Item = Result<Pixel<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        let pixel = match self.inner.next()? {
            Ok(p) => p,
            Err(e) => return Some(Err(e)),
        };
        let count = self
            .weights
            .balance(pixel.bin1_id(), pixel.bin2_id(), pixel.count.to_f64());
        Some(Ok(Pixel {
            coords: pixel.coords,
            count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chromosome::ChromosomeSet;
    use crate::core::file::File;
    use tempfile::tempdir;

    #[test]
    fn test_balanced_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cool");
        let uri = path.to_str().unwrap();
        let chroms = ChromosomeSet::new([("chr1", 30)]).unwrap();
        let mut clr = File::create_new_cooler::<i32>(uri, chroms, 10, false).unwrap();
        clr.append_pixels([Pixel::new(0, 0, 4), Pixel::new(0, 2, 8), Pixel::new(1, 2, 6)])
            .unwrap();
        clr.write_weights("KR", &[2.0, 1.0, 4.0], WeightKind::Divisive, false)
            .unwrap();
        clr.write_weights("weight", &[2.0, 1.0, 4.0], WeightKind::Multiplicative, false)
            .unwrap();
        clr.close().unwrap();

        let clr = File::open_read_only(uri).unwrap();
        let kr = Balancer::<i32>::new(clr.pixels().unwrap(), clr.read_weights("KR").unwrap());
        assert_eq!(kr.kind(), WeightKind::Divisive);
        let counts: Vec<f64> = kr.read_all().unwrap().iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![1.0, 1.0, 1.5]);

        let ice = Balancer::<i32>::new(clr.fetch("chr1:0-10").unwrap(), clr.read_weights("weight").unwrap());
        let counts: Vec<f64> = ice.read_all().unwrap().iter().map(|p| p.count).collect();
        assert_eq!(counts, vec![16.0]);
    }
}
