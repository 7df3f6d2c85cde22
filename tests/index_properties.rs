//! Property-based tests for the row offset index
//!
//! **Property 4: a finalized index is anchored at zero, non-decreasing,
//! ends at nnz and brackets every pixel of its row**

use cooler::core::{BinTable, ChromosomeSet, Index};
use proptest::prelude::*;
use std::sync::Arc;

fn arb_bins() -> impl Strategy<Value = Arc<BinTable>> {
    (prop::collection::vec(1u32..5_000, 1..=4), 100u32..1_000).prop_map(|(lengths, bin_size)| {
        let records: Vec<(String, u32)> = lengths
            .into_iter()
            .enumerate()
            .map(|(i, len)| (format!("chr{}", i + 1), len))
            .collect();
        Arc::new(BinTable::new(ChromosomeSet::new(records).unwrap(), bin_size).unwrap())
    })
}

/// Row ids of a sorted pixel stream over `bins`, with 1-3 pixels per
/// non-empty row
fn arb_rows(bins: Arc<BinTable>) -> impl Strategy<Value = (Arc<BinTable>, Vec<u64>)> {
    let nbins = bins.len() as usize;
    prop::collection::vec(0usize..=3, nbins).prop_map(move |per_row| {
        let rows = per_row
            .iter()
            .enumerate()
            .flat_map(|(row, &n)| std::iter::repeat(row as u64).take(n))
            .collect();
        (Arc::clone(&bins), rows)
    })
}

/// Record offsets the way a writer does: on the first pixel of each row
fn build_index(bins: Arc<BinTable>, rows: &[u64]) -> Index {
    let mut index = Index::new(bins);
    let mut last = None;
    for (k, &row) in rows.iter().enumerate() {
        if last != Some(row) {
            index.set_offset_by_bin_id(row, k as u64).unwrap();
            last = Some(row);
        }
    }
    index.finalize(rows.len() as u64).unwrap();
    index
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_finalized_index_shape((bins, rows) in arb_bins().prop_flat_map(arb_rows)) {
        let index = build_index(Arc::clone(&bins), &rows);
        let flat: Vec<u64> = index.iter().collect();

        prop_assert_eq!(flat.len() as u64, bins.len() + 1);
        prop_assert_eq!(flat[0], 0);
        prop_assert_eq!(*flat.last().unwrap(), rows.len() as u64);
        prop_assert!(flat.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn prop_offsets_bracket_rows((bins, rows) in arb_bins().prop_flat_map(arb_rows)) {
        let index = build_index(bins, &rows);
        for (k, &row) in rows.iter().enumerate() {
            let lo = index.get_offset_by_bin_id(row).unwrap();
            let hi = index.get_offset_by_bin_id(row + 1).unwrap();
            prop_assert!(lo <= k as u64 && (k as u64) < hi);
        }
    }

    #[test]
    fn prop_flat_offsets_roundtrip((bins, rows) in arb_bins().prop_flat_map(arb_rows)) {
        let index = build_index(Arc::clone(&bins), &rows);
        let flat: Vec<u64> = index.iter().collect();
        let imported = Index::from_offsets(bins, &flat).unwrap();
        prop_assert!(imported == index);
    }
}

fn two_chrom_index() -> Index {
    let chroms = ChromosomeSet::new([("chr1", 10_001), ("chr2", 5_000)]).unwrap();
    let bins = Arc::new(BinTable::new(chroms, 1000).unwrap());
    let mut offsets: Vec<u64> = (0..=10).map(|i| i * 10).collect();
    offsets.extend([110, 120, 130, 140, 150]);
    offsets.push(150);
    Index::from_offsets(bins, &offsets).unwrap()
}

#[test]
fn test_validate_reports_first_bad_bin() {
    let mut index = two_chrom_index();
    assert!(index.validate().is_ok());

    index.set_offset_by_row_idx(1, 0, 99).unwrap();
    let err = index.validate().unwrap_err();
    assert!(err
        .to_string()
        .contains("offset for bin chr2:0-1000 should be >= 100, found 99"));
}
