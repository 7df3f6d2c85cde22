//! Property-based tests for the Cooler writer and range queries
//!
//! **Property 2: stored pixels are upper triangular and inside the bin table**
//! **Property 3: the stored pixel stream is strictly sorted**
//! **Property 5: write, close and reopen yields the written pixels and sums**
//! **Property 6: range queries select exactly the matching pixels in order**
//! **Property 7: repeated range queries are identical**

use cooler::core::{BinRange, BinTable, ChromosomeSet, CountType, File, Pixel};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;

fn arb_chroms() -> impl Strategy<Value = ChromosomeSet> {
    prop::collection::vec(1u32..400, 1..=3).prop_map(|lengths| {
        let records: Vec<(String, u32)> = lengths
            .into_iter()
            .enumerate()
            .map(|(i, len)| (format!("chr{}", i + 1), len))
            .collect();
        ChromosomeSet::new(records).unwrap()
    })
}

/// Chromosomes, bin size and a sorted, duplicate-free set of upper
/// triangular pixels with non-zero counts
fn arb_matrix() -> impl Strategy<Value = (ChromosomeSet, u32, Vec<Pixel<i32>>)> {
    (arb_chroms(), 10u32..50).prop_flat_map(|(chroms, bin_size)| {
        let nbins = BinTable::new(chroms.clone(), bin_size).unwrap().len();
        prop::collection::vec((0..nbins, 0..nbins, 1i32..1000), 0..200).prop_map(move |raw| {
            let mut cells = BTreeMap::new();
            for (a, b, count) in raw {
                cells.insert((a.min(b), a.max(b)), count);
            }
            let pixels = cells
                .into_iter()
                .map(|((bin1, bin2), count)| Pixel::new(bin1, bin2, count))
                .collect();
            (chroms.clone(), bin_size, pixels)
        })
    })
}

fn arb_range(nbins: u64) -> impl Strategy<Value = BinRange> {
    (0..=nbins, 0..=nbins).prop_map(|(a, b)| BinRange::new(a.min(b), a.max(b)))
}

fn write_cooler<N: cooler::Count>(
    uri: &str,
    chroms: ChromosomeSet,
    bin_size: u32,
    pixels: &[Pixel<N>],
) {
    let mut clr = File::create_new_cooler::<N>(uri, chroms, bin_size, false).unwrap();
    clr.append_pixels(pixels.iter().copied()).unwrap();
    clr.close().unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_roundtrip_preserves_pixels_and_sums((chroms, bin_size, pixels) in arb_matrix()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.cool");
        let uri = path.to_str().unwrap();
        write_cooler(uri, chroms, bin_size, &pixels);

        let clr = File::open_read_only_strict(uri).unwrap();
        prop_assert_eq!(clr.count_type(), CountType::I32);
        prop_assert_eq!(clr.nnz(), pixels.len() as u64);

        let stored: Vec<Pixel<i32>> = clr.pixels().unwrap().read_all().unwrap();
        prop_assert_eq!(&stored, &pixels);

        let nbins = clr.bins().len();
        for p in &stored {
            prop_assert!(p.bin1_id() <= p.bin2_id());
            prop_assert!(p.bin2_id() < nbins);
        }
        prop_assert!(stored.windows(2).all(|w| w[0].coords < w[1].coords));

        let mut sum = 0i64;
        let mut cis = 0i64;
        for p in &pixels {
            sum += i64::from(p.count);
            let (bin1, bin2) = p.coords.bins(clr.bins()).unwrap();
            if bin1.chrom().id() == bin2.chrom().id() {
                cis += i64::from(p.count);
            }
        }
        prop_assert_eq!(clr.attributes().sum.map(|s| s.as_i64()), Some(sum));
        prop_assert_eq!(clr.attributes().cis.map(|s| s.as_i64()), Some(cis));
    }

    #[test]
    fn prop_range_query_matches_filter(
        ((chroms, bin_size, pixels), (r1, r2)) in arb_matrix().prop_flat_map(|m| {
            let nbins = BinTable::new(m.0.clone(), m.1).unwrap().len();
            (Just(m), (arb_range(nbins), arb_range(nbins)))
        })
    ) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.cool");
        let uri = path.to_str().unwrap();
        write_cooler(uri, chroms, bin_size, &pixels);
        let clr = File::open_read_only(uri).unwrap();

        let expected: Vec<Pixel<i32>> = pixels
            .iter()
            .filter(|p| r1.contains(p.bin1_id()) && r2.contains(p.bin2_id()))
            .copied()
            .collect();
        let found: Vec<Pixel<i32>> = clr.fetch_bins(r1, r2).unwrap().read_all().unwrap();
        prop_assert_eq!(&found, &expected);

        let again: Vec<Pixel<i32>> = clr.fetch_bins(r1, r2).unwrap().read_all().unwrap();
        prop_assert_eq!(&again, &found);
    }

    #[test]
    fn prop_chromosome_queries_match_filter((chroms, bin_size, pixels) in arb_matrix()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matrix.cool");
        let uri = path.to_str().unwrap();
        write_cooler(uri, chroms.clone(), bin_size, &pixels);
        let clr = File::open_read_only(uri).unwrap();

        for chrom1 in chroms.iter() {
            for chrom2 in chroms.iter() {
                let expected: Vec<Pixel<i32>> = pixels
                    .iter()
                    .filter(|p| {
                        let (b1, b2) = p.coords.bins(clr.bins()).unwrap();
                        b1.chrom().id() == chrom1.id() && b2.chrom().id() == chrom2.id()
                    })
                    .copied()
                    .collect();
                let found: Vec<Pixel<i32>> = clr
                    .fetch2(chrom1.name(), chrom2.name())
                    .unwrap()
                    .read_all()
                    .unwrap();
                prop_assert_eq!(&found, &expected);
            }
        }
    }
}

#[test]
fn test_float_counts_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("float.cool");
    let uri = path.to_str().unwrap();
    let chroms = ChromosomeSet::new([("chr1", 100), ("chr2", 40)]).unwrap();
    let pixels = vec![
        Pixel::new(0, 0, 0.5f64),
        Pixel::new(0, 12, 1.25),
        Pixel::new(3, 9, 2.0),
        Pixel::new(11, 13, 4.75),
    ];
    write_cooler(uri, chroms, 10, &pixels);

    let clr = File::open_read_only(uri).unwrap();
    assert_eq!(clr.count_type(), CountType::F64);
    let stored: Vec<Pixel<f64>> = clr.pixels().unwrap().read_all().unwrap();
    assert_eq!(stored, pixels);
    assert_eq!(clr.sum().as_f64(), 8.5);
    assert_eq!(clr.cis_sum().as_f64(), 7.25);
}

#[test]
fn test_query_end_is_clamped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("clamp.cool");
    let uri = path.to_str().unwrap();
    let chroms = ChromosomeSet::new([("chr1", 95)]).unwrap();
    let pixels = vec![Pixel::new(0, 9, 1i32), Pixel::new(9, 9, 2)];
    write_cooler(uri, chroms, 10, &pixels);

    let clr = File::open_read_only(uri).unwrap();
    let found: Vec<Pixel<i32>> = clr.fetch("chr1:90-5000").unwrap().read_all().unwrap();
    assert_eq!(found, vec![Pixel::new(9, 9, 2)]);
}

/// chr1 covers bins 0-9, chr2 covers bins 10-13
fn write_two_chrom_matrix(uri: &str) {
    let chroms = ChromosomeSet::new([("chr1", 100), ("chr2", 40)]).unwrap();
    let pixels = vec![
        Pixel::new(0, 0, 1i32),
        Pixel::new(0, 5, 2),
        Pixel::new(0, 12, 3),
        Pixel::new(1, 1, 4),
        Pixel::new(5, 9, 5),
        Pixel::new(9, 10, 6),
        Pixel::new(9, 13, 7),
        Pixel::new(10, 13, 8),
        Pixel::new(12, 12, 9),
    ];
    write_cooler(uri, chroms, 10, &pixels);
}

#[test]
fn test_single_bp_query_selects_one_bin() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("one_bp.cool");
    let uri = path.to_str().unwrap();
    write_two_chrom_matrix(uri);

    let clr = File::open_read_only(uri).unwrap();
    let found: Vec<Pixel<i32>> = clr.fetch("chr1:5-6").unwrap().read_all().unwrap();
    assert_eq!(found, vec![Pixel::new(0, 0, 1)]);

    let found: Vec<Pixel<i32>> = clr
        .fetch2("chr1:5-6", "chr2:25-26")
        .unwrap()
        .read_all()
        .unwrap();
    assert_eq!(found, vec![Pixel::new(0, 12, 3)]);
}

#[test]
fn test_trans_query_ending_at_chrom_boundary() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trans.cool");
    let uri = path.to_str().unwrap();
    write_two_chrom_matrix(uri);

    let clr = File::open_read_only(uri).unwrap();
    let found: Vec<Pixel<i32>> = clr
        .fetch2("chr1:50-100", "chr2:0-20")
        .unwrap()
        .read_all()
        .unwrap();
    assert_eq!(found, vec![Pixel::new(9, 10, 6)]);

    let found: Vec<Pixel<i32>> = clr.fetch2("chr1:50-100", "chr2").unwrap().read_all().unwrap();
    assert_eq!(found, vec![Pixel::new(9, 10, 6), Pixel::new(9, 13, 7)]);

    // a query ending at the chr1 boundary stops before chr2's first bin
    let found: Vec<Pixel<i32>> = clr
        .fetch2("chr1:0-100", "chr1:90-100")
        .unwrap()
        .read_all()
        .unwrap();
    assert_eq!(found, vec![Pixel::new(5, 9, 5)]);
}

#[test]
fn test_empty_queries_return_no_pixels() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty_query.cool");
    let uri = path.to_str().unwrap();
    write_two_chrom_matrix(uri);

    let clr = File::open_read_only(uri).unwrap();
    for (q1, q2) in [
        ("chr1:10-10", "chr1:10-10"),
        ("chr1:10-10", "chr2"),
        ("chr1", "chr1:100-100"),
        ("chr2:40-40", "chr2"),
    ] {
        let found: Vec<Pixel<i32>> = clr.fetch2(q1, q2).unwrap().read_all().unwrap();
        assert!(found.is_empty(), "{} x {} returned {:?}", q1, q2, found);
    }

    let found: Vec<Pixel<i32>> = clr
        .fetch_bins(BinRange::new(3, 3), BinRange::new(0, 14))
        .unwrap()
        .read_all()
        .unwrap();
    assert!(found.is_empty());
}
