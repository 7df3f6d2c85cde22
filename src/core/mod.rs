//! Core Cooler functionality
//!
//! This module contains the genomic model (chromosomes, bins, pixels),
//! the HDF5 plumbing and the reader/writer built on top of it.

pub mod attributes;
mod balancer;
mod bin_table;
mod chromosome;
pub mod dataset;
mod error;
mod file;
mod index;
pub mod io;
mod merge;
pub mod multires;
mod numeric;
mod pixel;
mod selector;
mod uri;
pub mod utils;
pub mod validate;
mod weights;

pub use balancer::{BalancedIter, Balancer};
pub use bin_table::{Bin, BinIter, BinTable};
pub use chromosome::{Chromosome, ChromosomeSet};
pub use error::{
    BinTableError, BinTableResult, ChromosomeError, CoolerError, IndexError, IndexResult,
    QueryError, QueryResult, Result,
};
pub use file::{
    CreateOptions, File, Mode, DEFAULT_CACHE_SIZE, MANDATORY_DATASETS, MANDATORY_GROUPS,
    PIXEL_WRITE_BATCH,
};
pub use index::{Index, OFFSET_NOT_SET};
pub use merge::{merge, MergeStrategy, PixelMerger, DEFAULT_MERGE_CHUNK_SIZE};
pub use multires::{init_mcool, init_scool, list_cells, list_resolutions};
pub use numeric::{Count, CountType, PixelSum};
pub use pixel::{Pixel, PixelCoordinates};
pub use selector::{BinRange, GenomicInterval, PixelIter, PixelSelector};
pub use uri::{parse_uri, CoolerUri, URI_SEPARATOR};
pub use validate::{
    is_cooler, is_hdf5, is_multires, is_scool, ValidationStatusCooler, ValidationStatusMultires,
    ValidationStatusScool,
};
pub use weights::{WeightKind, Weights, DIVISIVE_WEIGHTS_ATTR};
