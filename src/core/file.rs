//! Cooler reader/writer
//!
//! A [`File`] is either opened read-only on an existing Cooler or created as
//! a writer. Writers stamp `format-version` with a sentinel before doing any
//! other work and only restore it at the very end of [`File::finalize`],
//! which also runs on drop.
//!
//! # Example
//!
//! ```ignore
//! use cooler::{ChromosomeSet, File, Pixel};
//!
//! let chroms = ChromosomeSet::new([("chr1", 1000)])?;
//! let mut clr = File::create_new_cooler::<i32>("out.cool", chroms, 10, false)?;
//! clr.append_pixels([Pixel::new(0, 0, 1), Pixel::new(0, 1, 2)])?;
//! clr.finalize()?;
//!
//! let clr = File::open_read_only("out.cool")?;
//! for pixel in clr.fetch("chr1:0-20")?.iter::<i32>()? {
//!     println!("{}", pixel?);
//! }
//! ```

use super::attributes::{
    write_attr, StandardAttributes, GENERATED_BY, DEFAULT_ASSEMBLY, DEFAULT_METADATA,
    SENTINEL_FORMAT_VERSION,
};
use super::bin_table::BinTable;
use super::chromosome::ChromosomeSet;
use super::dataset::{Dataset, DatasetOptions, DEFAULT_COMPRESSION_LEVEL, DEFAULT_HDF5_CHUNK_SIZE};
use super::error::{CoolerError, Result};
use super::index::Index;
use super::numeric::{Count, CountType, PixelSum};
use super::pixel::{Pixel, PixelCoordinates};
use super::selector::{BinRange, GenomicInterval, PixelSelector};
use super::uri::CoolerUri;
use super::weights::{self, WeightKind, Weights};
use hdf5::Group;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Default size of the HDF5 chunk cache
pub const DEFAULT_CACHE_SIZE: usize = 256 * 1024 * 1024;

/// Number of hash slots of the HDF5 chunk cache
const CACHE_SLOTS: usize = 10_007;

/// Pixels buffered before they are flushed to `pixels/*`
pub const PIXEL_WRITE_BATCH: usize = 1 << 20;

pub const MANDATORY_GROUPS: [&str; 4] = ["chroms", "bins", "pixels", "indexes"];

pub const MANDATORY_DATASETS: [&str; 10] = [
    "chroms/name",
    "chroms/length",
    "bins/chrom",
    "bins/start",
    "bins/end",
    "pixels/bin1_id",
    "pixels/bin2_id",
    "pixels/count",
    "indexes/bin1_offset",
    "indexes/chrom_offset",
];

/// Writer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub count_type: CountType,
    pub compression_level: u8,
    pub chunk_size: usize,
    pub cache_size: usize,
    pub assembly: String,
    pub generated_by: String,
    pub metadata: String,
    /// Check every appended pixel
    pub validate: bool,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            count_type: CountType::I32,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_HDF5_CHUNK_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            assembly: DEFAULT_ASSEMBLY.to_string(),
            generated_by: GENERATED_BY.to_string(),
            metadata: DEFAULT_METADATA.to_string(),
            validate: true,
        }
    }
}

impl CreateOptions {
    pub fn with_count_type(mut self, count_type: CountType) -> Self {
        self.count_type = count_type;
        self
    }

    /// Deflate level, clamped to `0..=9`
    pub fn with_compression(mut self, level: u8) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes.max(1);
        self
    }

    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = bytes;
        self
    }

    pub fn with_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    pub fn with_generated_by(mut self, generated_by: impl Into<String>) -> Self {
        self.generated_by = generated_by.into();
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            compression_level: self.compression_level,
            chunk_size: self.chunk_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReadOnly,
    Write,
}

#[derive(Debug, Clone)]
struct Datasets {
    chrom_name: Dataset,
    chrom_length: Dataset,
    bin_chrom: Dataset,
    bin_start: Dataset,
    bin_end: Dataset,
    bin1_id: Dataset,
    bin2_id: Dataset,
    count: Dataset,
    bin1_offset: Dataset,
    chrom_offset: Dataset,
}

impl Datasets {
    fn open(root: &Group) -> Result<Self> {
        Ok(Self {
            chrom_name: Dataset::open(root, "chroms/name")?,
            chrom_length: Dataset::open(root, "chroms/length")?,
            bin_chrom: Dataset::open(root, "bins/chrom")?,
            bin_start: Dataset::open(root, "bins/start")?,
            bin_end: Dataset::open(root, "bins/end")?,
            bin1_id: Dataset::open(root, "pixels/bin1_id")?,
            bin2_id: Dataset::open(root, "pixels/bin2_id")?,
            count: Dataset::open(root, "pixels/count")?,
            bin1_offset: Dataset::open(root, "indexes/bin1_offset")?,
            chrom_offset: Dataset::open(root, "indexes/chrom_offset")?,
        })
    }

    fn create(
        root: &Group,
        chroms: &ChromosomeSet,
        count_type: CountType,
        opts: &DatasetOptions,
    ) -> Result<Self> {
        for group in MANDATORY_GROUPS {
            root.create_group(group)?;
        }
        Ok(Self {
            chrom_name: Dataset::create_fixed_str(root, "chroms/name", chroms.longest_name(), opts)?,
            chrom_length: Dataset::create::<i32>(root, "chroms/length", opts)?,
            bin_chrom: Dataset::create::<i32>(root, "bins/chrom", opts)?,
            bin_start: Dataset::create::<i32>(root, "bins/start", opts)?,
            bin_end: Dataset::create::<i32>(root, "bins/end", opts)?,
            bin1_id: Dataset::create::<i64>(root, "pixels/bin1_id", opts)?,
            bin2_id: Dataset::create::<i64>(root, "pixels/bin2_id", opts)?,
            count: Dataset::create_as(root, "pixels/count", &count_type.type_descriptor(), opts)?,
            bin1_offset: Dataset::create::<i64>(root, "indexes/bin1_offset", opts)?,
            chrom_offset: Dataset::create::<i64>(root, "indexes/chrom_offset", opts)?,
        })
    }
}

/// Handle to a single-resolution Cooler
pub struct File {
    uri: CoolerUri,
    file: hdf5::File,
    root: Group,
    mode: Mode,
    attrs: StandardAttributes,
    count_type: CountType,
    bins: Arc<BinTable>,
    index: Arc<Index>,
    datasets: Datasets,
    dataset_opts: DatasetOptions,
    weights: Mutex<HashMap<String, Arc<Weights>>>,

    // writer state
    validate: bool,
    finalized: bool,
    nnz: u64,
    sum: PixelSum,
    cis: PixelSum,
    last_pixel: Option<PixelCoordinates>,
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("uri", &self.uri)
            .field("mode", &self.mode)
            .field("bin_size", &self.bins.bin_size())
            .field("count_type", &self.count_type)
            .field("nnz", &self.nnz)
            .finish()
    }
}

impl File {
    /// Open an existing Cooler for reading
    pub fn open_read_only(uri: &str) -> Result<Self> {
        Self::open_with(uri, false)
    }

    /// Open for reading and check that `bins/*` matches the table
    /// implied by the chromosomes and the bin size
    pub fn open_read_only_strict(uri: &str) -> Result<Self> {
        Self::open_with(uri, true)
    }

    fn open_with(uri: &str, validate_bins: bool) -> Result<Self> {
        let parsed = CoolerUri::parse(uri)?;
        if !parsed.path().exists() {
            return Err(CoolerError::PathNotFound(parsed.file_path.clone()));
        }
        let file = open_hdf5(parsed.path(), DEFAULT_CACHE_SIZE)?;
        if !parsed.is_root() && !file.link_exists(&parsed.group_path) {
            return Err(CoolerError::PathNotFound(parsed.to_string()));
        }
        let root = file.group(&parsed.group_path)?;
        let uri_str = parsed.to_string();

        check_mandatory_nodes(&root, &uri_str)?;
        let attrs = StandardAttributes::read(&root, &uri_str)?;
        let datasets = Datasets::open(&root)?;

        let desc = datasets.count.type_descriptor()?;
        let count_type = CountType::from_descriptor(&desc)
            .ok_or_else(|| CoolerError::UnsupportedCountType(format!("{:?}", desc)))?;

        let chroms = import_chromosomes(&datasets, &uri_str)?;
        let bins = Arc::new(BinTable::new(chroms, attrs.bin_size)?);

        let offsets = datasets.bin1_offset.read_all::<u64>()?;
        let index = Index::from_offsets(Arc::clone(&bins), &offsets)?;
        if index.nnz() != datasets.bin1_id.len() {
            return Err(CoolerError::CorruptDataset {
                uri: uri_str,
                message: format!(
                    "index reports {} pixels but pixels/bin1_id has {}",
                    index.nnz(),
                    datasets.bin1_id.len()
                ),
            });
        }

        let sum = attrs.sum.unwrap_or_else(|| count_type.zero_sum());
        let cis = attrs.cis.unwrap_or_else(|| count_type.zero_sum());
        let clr = Self {
            uri: parsed,
            file,
            root,
            mode: Mode::ReadOnly,
            count_type,
            nnz: index.nnz(),
            bins,
            index: Arc::new(index),
            datasets,
            dataset_opts: DatasetOptions::default(),
            weights: Mutex::new(HashMap::new()),
            validate: false,
            finalized: true,
            sum,
            cis,
            last_pixel: None,
            attrs,
        };

        if validate_bins {
            clr.validate_bins()?;
        }
        log::info!(
            "opened \"{}\" ({} bins, {} pixels, {})",
            clr.uri,
            clr.bins.len(),
            clr.nnz,
            clr.count_type
        );
        Ok(clr)
    }

    /// Create a new Cooler storing counts of type `N`
    pub fn create_new_cooler<N: Count>(
        uri: &str,
        chroms: ChromosomeSet,
        bin_size: u32,
        overwrite: bool,
    ) -> Result<Self> {
        let opts = CreateOptions::default().with_count_type(N::COUNT_TYPE);
        Self::create(uri, chroms, bin_size, overwrite, opts)
    }

    /// Create a new Cooler.
    ///
    /// Fails with [`CoolerError::PathExists`] when the file (or, for group
    /// URIs, the group) already exists and `overwrite` is not set.
    pub fn create(
        uri: &str,
        chroms: ChromosomeSet,
        bin_size: u32,
        overwrite: bool,
        opts: CreateOptions,
    ) -> Result<Self> {
        let parsed = CoolerUri::parse(uri)?;
        let bins = Arc::new(BinTable::new(chroms, bin_size)?);

        let file = if parsed.is_root() {
            if parsed.path().exists() && !overwrite {
                return Err(CoolerError::PathExists(parsed.file_path.clone()));
            }
            hdf5::File::with_options()
                .with_fapl(|p| p.chunk_cache(CACHE_SLOTS, opts.cache_size, 1.0))
                .create(parsed.path())?
        } else {
            let file = hdf5::File::with_options()
                .with_fapl(|p| p.chunk_cache(CACHE_SLOTS, opts.cache_size, 1.0))
                .append(parsed.path())?;
            // empty placeholders left by init_mcool/init_scool are reused
            if file.link_exists(&parsed.group_path)
                && !file.group(&parsed.group_path)?.member_names()?.is_empty()
            {
                if !overwrite {
                    return Err(CoolerError::PathExists(parsed.to_string()));
                }
                file.unlink(&parsed.group_path)?;
            }
            file
        };
        let root = create_group_path(&file, &parsed.group_path)?;

        // stamp the sentinel before anything else
        write_attr(&root, "format-version", &SENTINEL_FORMAT_VERSION)?;
        file.flush()?;

        let dataset_opts = opts.dataset_options();
        let datasets = Datasets::create(&root, bins.chromosomes(), opts.count_type, &dataset_opts)?;

        let mut attrs = StandardAttributes::init(bin_size);
        attrs.assembly = Some(opts.assembly.clone());
        attrs.generated_by = Some(opts.generated_by.clone());
        attrs.metadata = Some(opts.metadata.clone());
        attrs.nbins = Some(bins.len());
        attrs.nchroms = Some(bins.num_chromosomes() as u32);
        attrs.write(&root, true)?;

        let index = Index::new(Arc::clone(&bins));
        log::info!(
            "creating \"{}\" ({} bins, bin size {}, {})",
            parsed,
            bins.len(),
            bin_size,
            opts.count_type
        );

        Ok(Self {
            uri: parsed,
            file,
            root,
            mode: Mode::Write,
            attrs,
            count_type: opts.count_type,
            bins,
            index: Arc::new(index),
            datasets,
            dataset_opts,
            weights: Mutex::new(HashMap::new()),
            validate: opts.validate,
            finalized: false,
            nnz: 0,
            sum: opts.count_type.zero_sum(),
            cis: opts.count_type.zero_sum(),
            last_pixel: None,
        })
    }

    #[inline]
    pub fn uri(&self) -> &CoolerUri {
        &self.uri
    }

    #[inline]
    pub fn path(&self) -> &Path {
        self.uri.path()
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.mode == Mode::ReadOnly
    }

    pub fn attributes(&self) -> &StandardAttributes {
        &self.attrs
    }

    #[inline]
    pub fn count_type(&self) -> CountType {
        self.count_type
    }

    #[inline]
    pub fn bin_size(&self) -> u32 {
        self.bins.bin_size()
    }

    pub fn chromosomes(&self) -> &ChromosomeSet {
        self.bins.chromosomes()
    }

    pub fn bins(&self) -> &BinTable {
        &self.bins
    }

    pub fn bins_arc(&self) -> Arc<BinTable> {
        Arc::clone(&self.bins)
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    #[inline]
    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    /// Sum of all counts written so far (or stored, for readers)
    #[inline]
    pub fn sum(&self) -> PixelSum {
        self.sum
    }

    /// Sum of counts whose bins lie on the same chromosome
    #[inline]
    pub fn cis_sum(&self) -> PixelSum {
        self.cis
    }

    /// HDF5 group holding this Cooler
    pub fn group(&self) -> &Group {
        &self.root
    }

    /// Append pixels validating them when the file was created with
    /// validation on
    pub fn append_pixels<N, I>(&mut self, pixels: I) -> Result<()>
    where
        N: Count,
        I: IntoIterator<Item = Pixel<N>>,
    {
        let validate = self.validate;
        self.append_pixels_with(pixels, validate)
    }

    /// Append pixels in row-major order.
    ///
    /// The first pixel of each new row records the current nnz in the index.
    /// On error, pixels accepted before the offending one are kept.
    pub fn append_pixels_with<N, I>(&mut self, pixels: I, validate: bool) -> Result<()>
    where
        N: Count,
        I: IntoIterator<Item = Pixel<N>>,
    {
        self.check_writable()?;
        if N::COUNT_TYPE != self.count_type {
            return Err(CoolerError::CountTypeMismatch {
                expected: self.count_type.to_string(),
                found: N::COUNT_TYPE.to_string(),
            });
        }

        let mut batch = PixelBatch::<N>::with_capacity(PIXEL_WRITE_BATCH);
        let mut row_chrom: Option<(u64, u32)> = None;

        for pixel in pixels {
            if let Err(e) = self.accept_pixel(&pixel, validate, &mut row_chrom) {
                self.write_batch(&mut batch)?;
                return Err(e);
            }
            batch.push(pixel);
            if batch.len() == PIXEL_WRITE_BATCH {
                self.write_batch(&mut batch)?;
            }
        }
        self.write_batch(&mut batch)?;
        Ok(())
    }

    fn accept_pixel<N: Count>(
        &mut self,
        pixel: &Pixel<N>,
        validate: bool,
        row_chrom: &mut Option<(u64, u32)>,
    ) -> Result<()> {
        let coords = pixel.coords;
        if validate {
            self.validate_pixel(pixel)?;
        }

        let new_row = self.last_pixel.map_or(true, |p| p.bin1_id != coords.bin1_id);
        if new_row {
            Arc::make_mut(&mut self.index).set_offset_by_bin_id(coords.bin1_id, self.nnz)?;
        }

        let chrom1 = match *row_chrom {
            Some((row, chrom)) if row == coords.bin1_id => chrom,
            _ => {
                let chrom = self.bins.bin_id_to_coords(coords.bin1_id)?.chrom().id();
                *row_chrom = Some((coords.bin1_id, chrom));
                chrom
            }
        };
        let chrom2 = self.bins.bin_id_to_coords(coords.bin2_id)?.chrom().id();

        pixel.count.accumulate(&mut self.sum);
        if chrom1 == chrom2 {
            pixel.count.accumulate(&mut self.cis);
        }
        self.nnz += 1;
        self.last_pixel = Some(coords);
        Ok(())
    }

    fn validate_pixel<N: Count>(&self, pixel: &Pixel<N>) -> Result<()> {
        let invalid = |message: String| CoolerError::InvalidPixel {
            pixel: pixel.to_string(),
            message,
        };
        if pixel.count.is_zero() {
            return Err(CoolerError::PixelValueZero(pixel.to_string()));
        }
        let nbins = self.bins.len();
        if pixel.bin1_id() >= nbins {
            return Err(invalid(format!("bin1_id is out of range (>= {})", nbins)));
        }
        if pixel.bin2_id() >= nbins {
            return Err(invalid(format!("bin2_id is out of range (>= {})", nbins)));
        }
        if !pixel.coords.is_upper_triangular() {
            return Err(invalid("bin1_id is greater than bin2_id".to_string()));
        }
        if let Some(previous) = self.last_pixel {
            if pixel.coords <= previous {
                return Err(CoolerError::WriteOrder {
                    new: pixel.coords.to_string(),
                    previous: previous.to_string(),
                });
            }
        }
        Ok(())
    }

    fn write_batch<N: Count>(&self, batch: &mut PixelBatch<N>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.datasets.bin1_id.append(&batch.bin1_ids)?;
        self.datasets.bin2_id.append(&batch.bin2_ids)?;
        self.datasets.count.append(&batch.counts)?;
        log::debug!("{}: flushed {} pixels (nnz={})", self.uri, batch.len(), self.nnz);
        batch.clear();
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode == Mode::ReadOnly {
            return Err(CoolerError::ReadOnlyFile(self.uri.to_string()));
        }
        if self.finalized {
            return Err(CoolerError::ReadOnlyFile(format!("{} (finalized)", self.uri)));
        }
        Ok(())
    }

    fn check_readable(&self) -> Result<()> {
        if !self.finalized {
            return Err(CoolerError::NotFinalized(self.uri.to_string()));
        }
        Ok(())
    }

    /// Write chromosomes, bins, indexes and attributes, then restore
    /// `format-version`. Calling it more than once is a no-op.
    pub fn finalize(&mut self) -> Result<()> {
        if self.mode == Mode::ReadOnly || self.finalized {
            return Ok(());
        }
        self.finalized = true;

        self.write_chromosomes()?;
        self.write_bin_table()?;

        Arc::make_mut(&mut self.index).finalize(self.nnz)?;
        self.datasets
            .bin1_offset
            .append_buffered(self.index.iter().map(|o| o as i64))?;
        self.datasets.chrom_offset.append_buffered(
            self.index
                .compute_chrom_offsets()
                .into_iter()
                .map(|o| o as i64),
        )?;

        self.attrs.nnz = Some(self.nnz);
        self.attrs.nbins = Some(self.bins.len());
        self.attrs.nchroms = Some(self.bins.num_chromosomes() as u32);
        self.attrs.sum = Some(self.sum);
        self.attrs.cis = Some(self.cis);
        self.attrs.write(&self.root, true)?;

        // commit point
        write_attr(&self.root, "format-version", &self.attrs.format_version)?;
        self.file.flush()?;

        log::info!(
            "finalized \"{}\" (nnz={}, sum={})",
            self.uri,
            self.nnz,
            self.sum
        );
        Ok(())
    }

    /// Finalize and release the handle, surfacing any error
    pub fn close(mut self) -> Result<()> {
        self.finalize()
    }

    fn write_chromosomes(&self) -> Result<()> {
        append_chromosomes(
            &self.datasets.chrom_name,
            &self.datasets.chrom_length,
            self.bins.chromosomes(),
        )
    }

    fn write_bin_table(&self) -> Result<()> {
        append_bins(
            &self.datasets.bin_chrom,
            &self.datasets.bin_start,
            &self.datasets.bin_end,
            &self.bins,
        )
    }

    /// Compare `bins/*` against the table rebuilt from the chromosomes
    pub fn validate_bins(&self) -> Result<()> {
        let corrupt = |message: String| CoolerError::CorruptDataset {
            uri: self.uri.to_string(),
            message,
        };
        let nbins = self.bins.len();
        for ds in [&self.datasets.bin_chrom, &self.datasets.bin_start, &self.datasets.bin_end] {
            if ds.len() != nbins {
                return Err(corrupt(format!(
                    "{} has {} elements, expected {}",
                    ds.name(),
                    ds.len(),
                    nbins
                )));
            }
        }

        let starts = self.datasets.bin_start.read_all::<i64>()?;
        let ends = self.datasets.bin_end.read_all::<i64>()?;
        let chroms = match self.datasets.bin_chrom.type_descriptor()? {
            // enum columns are read through their integer values
            hdf5::types::TypeDescriptor::Integer(_)
            | hdf5::types::TypeDescriptor::Unsigned(_)
            | hdf5::types::TypeDescriptor::Enum(_) => self.datasets.bin_chrom.read_all::<i64>()?,
            other => {
                return Err(corrupt(format!(
                    "bins/chrom has unsupported datatype {:?}",
                    other
                )))
            }
        };

        for (i, bin) in self.bins.iter().enumerate() {
            let expected = (i64::from(bin.start()), i64::from(bin.end()));
            if (starts[i], ends[i]) != expected {
                return Err(corrupt(format!(
                    "bin #{} is {}-{}, expected {}",
                    i, starts[i], ends[i], bin
                )));
            }
            if chroms[i] != i64::from(bin.chrom().id()) {
                return Err(corrupt(format!(
                    "bin #{} maps to chromosome {}, expected {}",
                    i,
                    chroms[i],
                    bin.chrom().id()
                )));
            }
        }
        Ok(())
    }

    /// Selector over every stored pixel
    pub fn pixels(&self) -> Result<PixelSelector> {
        self.check_readable()?;
        Ok(PixelSelector::whole(
            Arc::clone(&self.index),
            self.datasets.bin1_id.clone(),
            self.datasets.bin2_id.clone(),
            self.datasets.count.clone(),
        ))
    }

    /// Symmetric query, e.g. `chr1:0-1000000`
    pub fn fetch(&self, query: &str) -> Result<PixelSelector> {
        let interval = GenomicInterval::parse_ucsc(self.chromosomes(), query)?;
        self.fetch_intervals(&interval, &interval)
    }

    /// Asymmetric query over `query1 x query2`
    pub fn fetch2(&self, query1: &str, query2: &str) -> Result<PixelSelector> {
        let interval1 = GenomicInterval::parse_ucsc(self.chromosomes(), query1)?;
        let interval2 = GenomicInterval::parse_ucsc(self.chromosomes(), query2)?;
        self.fetch_intervals(&interval1, &interval2)
    }

    pub fn fetch_intervals(
        &self,
        interval1: &GenomicInterval,
        interval2: &GenomicInterval,
    ) -> Result<PixelSelector> {
        let range1 = interval1.bin_range(&self.bins)?;
        let range2 = interval2.bin_range(&self.bins)?;
        self.fetch_bins(range1, range2)
    }

    /// Query by half-open bin id ranges
    pub fn fetch_bins(&self, range1: BinRange, range2: BinRange) -> Result<PixelSelector> {
        self.check_readable()?;
        Ok(PixelSelector::new(
            Arc::clone(&self.index),
            self.datasets.bin1_id.clone(),
            self.datasets.bin2_id.clone(),
            self.datasets.count.clone(),
            range1,
            range2,
        ))
    }

    /// Names of the weight vectors stored under `bins/`
    pub fn avail_weights(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .root
            .group("bins")?
            .member_names()?
            .into_iter()
            .filter(|n| !matches!(n.as_str(), "chrom" | "start" | "end"))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn has_weights(&self, name: &str) -> bool {
        !name.is_empty() && self.root.link_exists(&format!("bins/{}", name))
    }

    /// Read `bins/<name>`, cached per handle
    pub fn read_weights(&self, name: &str) -> Result<Arc<Weights>> {
        let mut cache = self.weights.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(w) = cache.get(name) {
            return Ok(Arc::clone(w));
        }
        let w = Arc::new(weights::read_weights(&self.root, name, self.bins.len())?);
        cache.insert(name.to_string(), Arc::clone(&w));
        Ok(w)
    }

    /// Store a weight vector. Only writers may do so.
    pub fn write_weights(
        &mut self,
        name: &str,
        values: &[f64],
        kind: WeightKind,
        overwrite: bool,
    ) -> Result<()> {
        if self.mode == Mode::ReadOnly {
            return Err(CoolerError::ReadOnlyFile(self.uri.to_string()));
        }
        weights::write_weights(
            &self.root,
            name,
            values,
            kind,
            self.bins.len(),
            overwrite,
            &self.dataset_opts,
        )?;
        let mut cache = self.weights.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(name.to_string(), Arc::new(Weights::new(values.to_vec(), kind)));
        Ok(())
    }

    /// Drop cached weights; `None` clears the whole cache
    pub fn purge_weights(&self, name: Option<&str>) -> bool {
        let mut cache = self.weights.lock().unwrap_or_else(|e| e.into_inner());
        match name {
            Some(name) => cache.remove(name).is_some(),
            None => {
                let had_any = !cache.is_empty();
                cache.clear();
                had_any
            }
        }
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            log::error!("failed to finalize \"{}\": {}", self.uri, e);
            log::warn!("\"{}\" was not closed cleanly", self.uri);
        }
    }
}

/// Column buffers for [`File::append_pixels`]
struct PixelBatch<N> {
    bin1_ids: Vec<i64>,
    bin2_ids: Vec<i64>,
    counts: Vec<N>,
}

impl<N: Count> PixelBatch<N> {
    fn with_capacity(n: usize) -> Self {
        let n = n.min(1 << 16);
        Self {
            bin1_ids: Vec::with_capacity(n),
            bin2_ids: Vec::with_capacity(n),
            counts: Vec::with_capacity(n),
        }
    }

    #[inline]
    fn push(&mut self, pixel: Pixel<N>) {
        self.bin1_ids.push(pixel.bin1_id() as i64);
        self.bin2_ids.push(pixel.bin2_id() as i64);
        self.counts.push(pixel.count);
    }

    #[inline]
    fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn clear(&mut self) {
        self.bin1_ids.clear();
        self.bin2_ids.clear();
        self.counts.clear();
    }
}

fn open_hdf5(path: &Path, cache_size: usize) -> Result<hdf5::File> {
    Ok(hdf5::File::with_options()
        .with_fapl(|p| p.chunk_cache(CACHE_SLOTS, cache_size, 1.0))
        .open(path)?)
}

/// Open `group_path`, creating missing components
pub(crate) fn create_group_path(file: &hdf5::File, group_path: &str) -> Result<Group> {
    let mut group = file.group("/")?;
    for component in group_path.split('/').filter(|c| !c.is_empty()) {
        group = if group.link_exists(component) {
            group.group(component)?
        } else {
            group.create_group(component)?
        };
    }
    Ok(group)
}

fn to_int32<T: Copy + Into<u64>>(dataset: &str, value: T) -> Result<i32> {
    i32::try_from(value.into()).map_err(|_| CoolerError::Int32Overflow {
        dataset: dataset.to_string(),
        value: value.into(),
    })
}

fn append_chromosomes(names: &Dataset, lengths: &Dataset, chroms: &ChromosomeSet) -> Result<()> {
    let values = chroms
        .lengths()
        .map(|l| to_int32("chroms/length", l))
        .collect::<Result<Vec<_>>>()?;
    names.append_strings(chroms.names())?;
    lengths.append_buffered(values)?;
    Ok(())
}

fn append_bins(chrom: &Dataset, start: &Dataset, end: &Dataset, bins: &BinTable) -> Result<()> {
    let chroms = bins
        .iter()
        .map(|b| to_int32("bins/chrom", b.chrom().id()))
        .collect::<Result<Vec<_>>>()?;
    let starts = bins
        .iter()
        .map(|b| to_int32("bins/start", b.start()))
        .collect::<Result<Vec<_>>>()?;
    let ends = bins
        .iter()
        .map(|b| to_int32("bins/end", b.end()))
        .collect::<Result<Vec<_>>>()?;
    chrom.append_buffered(chroms)?;
    start.append_buffered(starts)?;
    end.append_buffered(ends)?;
    Ok(())
}

/// Write `chroms/*` and `bins/*` under `root` in one go
pub(crate) fn write_bin_table_groups(
    root: &Group,
    bins: &BinTable,
    opts: &DatasetOptions,
) -> Result<()> {
    let chroms = bins.chromosomes();
    root.create_group("chroms")?;
    root.create_group("bins")?;
    append_chromosomes(
        &Dataset::create_fixed_str(root, "chroms/name", chroms.longest_name(), opts)?,
        &Dataset::create::<i32>(root, "chroms/length", opts)?,
        chroms,
    )?;
    append_bins(
        &Dataset::create::<i32>(root, "bins/chrom", opts)?,
        &Dataset::create::<i32>(root, "bins/start", opts)?,
        &Dataset::create::<i32>(root, "bins/end", opts)?,
        bins,
    )
}

fn check_mandatory_nodes(root: &Group, uri: &str) -> Result<()> {
    for group in MANDATORY_GROUPS {
        if !root.link_exists(group) {
            return Err(CoolerError::MissingGroup {
                uri: uri.to_string(),
                group: group.to_string(),
            });
        }
    }
    for dataset in MANDATORY_DATASETS {
        if !root.link_exists(dataset) {
            return Err(CoolerError::MissingDataset {
                uri: uri.to_string(),
                dataset: dataset.to_string(),
            });
        }
    }
    Ok(())
}

fn import_chromosomes(datasets: &Datasets, uri: &str) -> Result<ChromosomeSet> {
    let names = datasets.chrom_name.read_strings()?;
    let lengths = datasets.chrom_length.read_all::<i64>()?;
    if names.len() != lengths.len() {
        return Err(CoolerError::CorruptDataset {
            uri: uri.to_string(),
            message: format!(
                "chroms/name and chroms/length have different shapes ({} != {})",
                names.len(),
                lengths.len()
            ),
        });
    }

    let mut records = Vec::with_capacity(names.len());
    for (name, length) in names.into_iter().zip(lengths) {
        let length = u32::try_from(length).map_err(|_| CoolerError::CorruptDataset {
            uri: uri.to_string(),
            message: format!("chromosome \"{}\" has invalid length {}", name, length),
        })?;
        records.push((name, length));
    }
    Ok(ChromosomeSet::new(records)?)
}
