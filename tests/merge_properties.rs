//! Property-based tests for merging Coolers
//!
//! **Property 8: merging sorted Coolers over the same bins yields a sorted
//! Cooler whose counts are the per-pixel sums of the inputs**

use cooler::core::{CoolerError, CountType};
use cooler::{merge, BinTable, ChromosomeSet, File, MergeStrategy, Pixel};
use proptest::prelude::*;
use std::collections::BTreeMap;
use tempfile::tempdir;

const BIN_SIZE: u32 = 10;

fn chroms() -> ChromosomeSet {
    ChromosomeSet::new([("chr1", 200), ("chr2", 120), ("chr3", 35)]).unwrap()
}

fn arb_pixels(nbins: u64) -> impl Strategy<Value = Vec<Pixel<i32>>> {
    prop::collection::vec((0..nbins, 0..nbins, 1i32..500), 0..150).prop_map(|raw| {
        let cells: BTreeMap<(u64, u64), i32> = raw
            .into_iter()
            .map(|(a, b, count)| ((a.min(b), a.max(b)), count))
            .collect();
        cells
            .into_iter()
            .map(|((bin1, bin2), count)| Pixel::new(bin1, bin2, count))
            .collect()
    })
}

fn arb_inputs() -> impl Strategy<Value = Vec<Vec<Pixel<i32>>>> {
    let nbins = BinTable::new(chroms(), BIN_SIZE).unwrap().len();
    prop::collection::vec(arb_pixels(nbins), 2..=4)
}

fn arb_strategy() -> impl Strategy<Value = MergeStrategy> {
    prop_oneof![Just(MergeStrategy::PriorityQueue), Just(MergeStrategy::InMemory)]
}

fn write_inputs(dir: &std::path::Path, inputs: &[Vec<Pixel<i32>>]) -> Vec<String> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, pixels)| {
            let uri = dir.join(format!("input{}.cool", i)).to_str().unwrap().to_string();
            let mut clr = File::create_new_cooler::<i32>(&uri, chroms(), BIN_SIZE, false).unwrap();
            clr.append_pixels(pixels.iter().copied()).unwrap();
            clr.close().unwrap();
            uri
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_merge_sums_counts(
        inputs in arb_inputs(),
        strategy in arb_strategy(),
        chunk_size in 1usize..64,
    ) {
        let dir = tempdir().unwrap();
        let sources = write_inputs(dir.path(), &inputs);
        let dest = dir.path().join("merged.cool");
        let dest = dest.to_str().unwrap();
        merge(&sources, dest, false, chunk_size, strategy).unwrap();

        let mut expected: BTreeMap<(u64, u64), i64> = BTreeMap::new();
        for p in inputs.iter().flatten() {
            *expected.entry((p.bin1_id(), p.bin2_id())).or_default() += i64::from(p.count);
        }
        let expected: Vec<Pixel<i64>> = expected
            .into_iter()
            .map(|((bin1, bin2), count)| Pixel::new(bin1, bin2, count))
            .collect();

        let clr = File::open_read_only_strict(dest).unwrap();
        prop_assert_eq!(clr.count_type(), CountType::I64);
        let merged: Vec<Pixel<i64>> = clr.pixels().unwrap().read_all().unwrap();
        prop_assert!(merged.windows(2).all(|w| w[0].coords < w[1].coords));
        prop_assert_eq!(&merged, &expected);

        let input_nnz: usize = inputs.iter().map(Vec::len).sum();
        prop_assert!(clr.nnz() as usize <= input_nnz);
        let input_sum: i64 = inputs.iter().flatten().map(|p| i64::from(p.count)).sum();
        prop_assert_eq!(clr.sum().as_i64(), input_sum);
    }
}

#[test]
fn test_merge_two_coolers() {
    let dir = tempdir().unwrap();
    let sources = write_inputs(
        dir.path(),
        &[
            vec![Pixel::new(0, 0, 3), Pixel::new(0, 1, 5)],
            vec![Pixel::new(0, 0, 2), Pixel::new(1, 1, 7)],
        ],
    );
    let dest = dir.path().join("merged.cool");
    let dest = dest.to_str().unwrap();
    merge(&sources, dest, false, 1000, MergeStrategy::default()).unwrap();

    let clr = File::open_read_only(dest).unwrap();
    let merged: Vec<Pixel<i64>> = clr.pixels().unwrap().read_all().unwrap();
    assert_eq!(
        merged,
        vec![Pixel::new(0, 0, 5), Pixel::new(0, 1, 5), Pixel::new(1, 1, 7)]
    );
    assert_eq!(clr.sum().as_i64(), 17);
}

#[test]
fn test_merge_rejects_different_bin_sizes() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.cool");
    let b = dir.path().join("b.cool");
    File::create_new_cooler::<i32>(a.to_str().unwrap(), chroms(), 10, false)
        .unwrap()
        .close()
        .unwrap();
    File::create_new_cooler::<i32>(b.to_str().unwrap(), chroms(), 20, false)
        .unwrap()
        .close()
        .unwrap();

    let dest = dir.path().join("merged.cool");
    let err = merge(
        &[a.to_str().unwrap(), b.to_str().unwrap()],
        dest.to_str().unwrap(),
        false,
        1000,
        MergeStrategy::PriorityQueue,
    )
    .unwrap_err();
    assert!(matches!(err, CoolerError::IncompatibleInputs(_)));
    assert!(!dest.exists());
}
