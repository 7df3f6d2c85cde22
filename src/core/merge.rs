//! K-way merge of Coolers sharing the same bin table

use super::error::{CoolerError, Result};
use super::file::{CreateOptions, File};
use super::numeric::{Count, CountType};
use super::pixel::{Pixel, PixelCoordinates};
use super::selector::PixelIter;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::time::Instant;

/// Pixels buffered before each append to the destination
pub const DEFAULT_MERGE_CHUNK_SIZE: usize = 2_000_000;

/// How input streams are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Stream through a min-heap holding one pixel per input
    #[default]
    PriorityQueue,
    /// Accumulate every pixel in an ordered map, then write once
    InMemory,
}

struct Node<N> {
    pixel: Pixel<N>,
    source: usize,
}

impl<N> PartialEq for Node<N> {
    fn eq(&self, other: &Self) -> bool {
        self.pixel.coords == other.pixel.coords && self.source == other.source
    }
}

impl<N> Eq for Node<N> {}

impl<N> PartialOrd for Node<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for Node<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pixel
            .coords
            .cmp(&other.pixel.coords)
            .then(self.source.cmp(&other.source))
    }
}

/// Yields the union of sorted pixel streams, summing counts that share
/// coordinates
pub struct PixelMerger<N> {
    sources: Vec<PixelIter<N>>,
    heap: BinaryHeap<Reverse<Node<N>>>,
}

impl<N: Count> PixelMerger<N> {
    pub fn new(sources: Vec<PixelIter<N>>) -> Result<Self> {
        let mut merger = Self {
            heap: BinaryHeap::with_capacity(sources.len()),
            sources,
        };
        for i in 0..merger.sources.len() {
            merger.refill(i)?;
        }
        Ok(merger)
    }

    fn refill(&mut self, source: usize) -> Result<()> {
        if let Some(pixel) = self.sources[source].next() {
            self.heap.push(Reverse(Node {
                pixel: pixel?,
                source,
            }));
        }
        Ok(())
    }

    fn next_merged(&mut self) -> Result<Option<Pixel<N>>> {
        let Some(Reverse(top)) = self.heap.pop() else {
            return Ok(None);
        };
        self.refill(top.source)?;
        let mut current = top.pixel;

        // coalesce
        loop {
            let same = matches!(
                self.heap.peek(),
                Some(Reverse(node)) if node.pixel.coords == current.coords
            );
            if !same {
                break;
            }
            let Some(Reverse(node)) = self.heap.pop() else {
                break;
            };
            current.count = current.count + node.pixel.count;
            self.refill(node.source)?;
        }
        Ok(Some(current))
    }
}

impl<N: Count> Iterator for PixelMerger<N> {
    type Item = Result<Pixel<N>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_merged().transpose()
    }
}

/// Merge `sources` into a new Cooler at `dest_uri`.
///
/// Inputs must agree on chromosomes and bin size. The output stores `f64`
/// counts when any input has float counts and `i64` otherwise.
pub fn merge<S: AsRef<str>>(
    sources: &[S],
    dest_uri: &str,
    overwrite: bool,
    chunk_size: usize,
    strategy: MergeStrategy,
) -> Result<()> {
    let start = Instant::now();
    let clrs = sources
        .iter()
        .map(|uri| File::open_read_only(uri.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    if clrs.len() < 2 {
        return Err(CoolerError::IncompatibleInputs(
            "unable to merge less than 2 coolers".to_string(),
        ));
    }
    check_compatible(&clrs)?;

    let float = clrs.iter().any(|clr| clr.count_type().is_float());
    let count_type = if float { CountType::F64 } else { CountType::I64 };
    let first = &clrs[0];
    let opts = CreateOptions::default().with_count_type(count_type);
    let mut dest = File::create(
        dest_uri,
        first.chromosomes().clone(),
        first.bin_size(),
        overwrite,
        opts,
    )?;

    log::info!(
        "merging {} coolers into \"{}\" ({})",
        clrs.len(),
        dest_uri,
        count_type
    );
    let chunk_size = chunk_size.max(1);
    if float {
        merge_into::<f64>(&clrs, &mut dest, chunk_size, strategy)?;
    } else {
        merge_into::<i64>(&clrs, &mut dest, chunk_size, strategy)?;
    }

    let nnz = dest.nnz();
    dest.close()?;
    log::info!(
        "merged {} pixels in {:.2}s",
        nnz,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn check_compatible(clrs: &[File]) -> Result<()> {
    let first = &clrs[0];
    for clr in &clrs[1..] {
        if clr.bin_size() != first.bin_size() {
            return Err(CoolerError::IncompatibleInputs(format!(
                "cooler \"{}\" and \"{}\" have different resolutions ({} and {} respectively)",
                first.uri(),
                clr.uri(),
                first.bin_size(),
                clr.bin_size()
            )));
        }
        if clr.chromosomes() != first.chromosomes() {
            return Err(CoolerError::IncompatibleInputs(format!(
                "cooler \"{}\" and \"{}\" use different reference genomes",
                first.uri(),
                clr.uri()
            )));
        }
    }
    Ok(())
}

fn merge_into<N: Count>(
    clrs: &[File],
    dest: &mut File,
    chunk_size: usize,
    strategy: MergeStrategy,
) -> Result<()> {
    let iters = clrs
        .iter()
        .map(|clr| clr.pixels()?.iter::<N>())
        .collect::<Result<Vec<_>>>()?;

    match strategy {
        MergeStrategy::PriorityQueue => merge_pqueue(PixelMerger::new(iters)?, dest, chunk_size),
        MergeStrategy::InMemory => merge_in_memory(iters, dest),
    }
}

fn merge_pqueue<N: Count>(merger: PixelMerger<N>, dest: &mut File, chunk_size: usize) -> Result<()> {
    let mut buffer: Vec<Pixel<N>> = Vec::with_capacity(chunk_size.min(1 << 20));
    let mut processed = 0u64;

    for pixel in merger {
        let pixel = pixel?;
        // opposite counts may cancel out
        if pixel.count.is_zero() {
            continue;
        }
        buffer.push(pixel);
        if buffer.len() == chunk_size {
            dest.append_pixels(buffer.drain(..))?;
            processed += chunk_size as u64;
            log::debug!("processed {} pixels...", processed);
        }
    }
    dest.append_pixels(buffer.drain(..))?;
    Ok(())
}

fn merge_in_memory<N: Count>(iters: Vec<PixelIter<N>>, dest: &mut File) -> Result<()> {
    let mut tank: BTreeMap<PixelCoordinates, N> = BTreeMap::new();
    for iter in iters {
        for pixel in iter {
            let pixel = pixel?;
            let count = tank.entry(pixel.coords).or_default();
            *count = *count + pixel.count;
        }
    }
    log::debug!("accumulated {} distinct pixels in memory", tank.len());
    dest.append_pixels(
        tank.into_iter()
            .filter(|(_, count)| !count.is_zero())
            .map(|(coords, count)| Pixel {
                coords,
                count,
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chromosome::ChromosomeSet;
    use tempfile::tempdir;

    fn write<N: Count>(path: &std::path::Path, chroms: &ChromosomeSet, pixels: Vec<Pixel<N>>) {
        let mut clr =
            File::create_new_cooler::<N>(path.to_str().unwrap(), chroms.clone(), 10, false).unwrap();
        clr.append_pixels(pixels).unwrap();
        clr.close().unwrap();
    }

    fn read_i64(path: &std::path::Path) -> Vec<(u64, u64, i64)> {
        let clr = File::open_read_only(path.to_str().unwrap()).unwrap();
        clr.pixels()
            .unwrap()
            .iter::<i64>()
            .unwrap()
            .map(|p| {
                let p = p.unwrap();
                (p.bin1_id(), p.bin2_id(), p.count)
            })
            .collect()
    }

    #[test]
    fn test_merge_two() {
        let dir = tempdir().unwrap();
        let chroms = ChromosomeSet::new([("chr1", 100)]).unwrap();
        let a = dir.path().join("a.cool");
        let b = dir.path().join("b.cool");
        write(&a, &chroms, vec![Pixel::new(0, 0, 3i32), Pixel::new(0, 1, 5)]);
        write(&b, &chroms, vec![Pixel::new(0, 0, 2i32), Pixel::new(1, 1, 7)]);

        for strategy in [MergeStrategy::PriorityQueue, MergeStrategy::InMemory] {
            let out = dir.path().join(format!("out_{:?}.cool", strategy));
            let sources = [a.to_str().unwrap(), b.to_str().unwrap()];
            merge(&sources, out.to_str().unwrap(), false, 1, strategy).unwrap();

            assert_eq!(read_i64(&out), vec![(0, 0, 5), (0, 1, 5), (1, 1, 7)]);
            let clr = File::open_read_only(out.to_str().unwrap()).unwrap();
            assert_eq!(clr.count_type(), CountType::I64);
            assert_eq!(clr.sum().as_i64(), 17);
        }
    }

    #[test]
    fn test_merge_float_upgrades() {
        let dir = tempdir().unwrap();
        let chroms = ChromosomeSet::new([("chr1", 100)]).unwrap();
        let a = dir.path().join("a.cool");
        let b = dir.path().join("b.cool");
        write(&a, &chroms, vec![Pixel::new(0, 0, 1u8)]);
        write(&b, &chroms, vec![Pixel::new(0, 0, 0.5f32)]);

        let out = dir.path().join("out.cool");
        merge(
            &[a.to_str().unwrap(), b.to_str().unwrap()],
            out.to_str().unwrap(),
            false,
            DEFAULT_MERGE_CHUNK_SIZE,
            MergeStrategy::PriorityQueue,
        )
        .unwrap();
        let clr = File::open_read_only(out.to_str().unwrap()).unwrap();
        assert_eq!(clr.count_type(), CountType::F64);
        assert_eq!(clr.sum().as_f64(), 1.5);
    }

    #[test]
    fn test_incompatible_inputs() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.cool");
        let b = dir.path().join("b.cool");
        write(&a, &ChromosomeSet::new([("chr1", 100)]).unwrap(), vec![Pixel::new(0, 0, 1i32)]);
        write(&b, &ChromosomeSet::new([("chr2", 100)]).unwrap(), vec![Pixel::new(0, 0, 1i32)]);

        let out = dir.path().join("out.cool");
        let err = merge(
            &[a.to_str().unwrap(), b.to_str().unwrap()],
            out.to_str().unwrap(),
            false,
            10,
            MergeStrategy::PriorityQueue,
        )
        .unwrap_err();
        assert!(matches!(err, CoolerError::IncompatibleInputs(_)));

        let err = merge(&[a.to_str().unwrap()], out.to_str().unwrap(), false, 10, MergeStrategy::InMemory)
            .unwrap_err();
        assert!(matches!(err, CoolerError::IncompatibleInputs(_)));
    }
}
