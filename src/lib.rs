//! cooler-rs - Reader and writer for Cooler Hi-C contact matrices
//!
//! Cooler stores sparse, upper-triangular contact matrices in HDF5. This
//! crate reads and writes single-resolution Coolers, the multi-resolution
//! (`.mcool`) and single-cell (`.scool`) containers built from them, and
//! answers 2D genomic range queries without loading the pixel table.
//!
//! # Features
//!
//! - Chunked dataset cursors: one HDF5 read per non-contiguous jump
//! - Range queries driven by the row offset index
//! - Streaming writer with crash detection through a sentinel attribute
//! - K-way merge of Coolers sharing a bin table
//! - Balancing weights and structural validation
//!
//! # Example
//!
//! ```ignore
//! use cooler::File;
//!
//! let clr = File::open_read_only("sample.mcool::/resolutions/10000")?;
//! let sel = clr.fetch2("chr1:0-1,000,000", "chr2")?;
//! for pixel in sel.iter::<i32>()? {
//!     let pixel = pixel?;
//!     println!("{}\t{}\t{}", pixel.bin1_id(), pixel.bin2_id(), pixel.count);
//! }
//! ```

pub mod core;
pub mod formats;

// Re-export commonly used types
pub use core::{
    is_cooler, is_multires, is_scool, merge, parse_uri, Balancer, Bin, BinRange, BinTable,
    Chromosome, ChromosomeSet, CoolerError, CoolerUri, Count, CountType, CreateOptions, File,
    GenomicInterval, Index, MergeStrategy, Pixel, PixelCoordinates, PixelSelector, PixelSum,
    Result, WeightKind, Weights,
};
pub use formats::{bg2, chrom_sizes};
