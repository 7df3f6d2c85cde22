//! Text interchange formats
//!
//! Pixel lines (bg2/COO), BEDPE queries and chromosome sizes files used by
//! the command line tools.

pub mod bg2;
pub mod chrom_sizes;

pub use bg2::{
    parse_bedpe_query, parse_bg2_line, parse_coo_line, parse_pixel_line, write_pixel,
    Bg2ParseError, PixelFormat,
};
pub use chrom_sizes::{read_chrom_sizes, read_chrom_sizes_file, ChromSizesError};
