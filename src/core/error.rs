//! Error types for cooler-rs
//!
//! Defines all error types used throughout the library.

use thiserror::Error;

/// Main error type for Cooler operations
#[derive(Debug, Error)]
pub enum CoolerError {
    /// Errors raised by the HDF5 storage layer
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chromosome lookup and construction errors
    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),

    /// Bin table lookup errors
    #[error(transparent)]
    BinTable(#[from] BinTableError),

    /// Index lookup and validation errors
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Range query parsing errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Refusing to clobber an existing file or group
    #[error("unable to create \"{0}\": path already exists")]
    PathExists(String),

    /// File or group could not be found
    #[error("\"{0}\" does not exist")]
    PathNotFound(String),

    /// URI could not be split into file and group components
    #[error("malformed URI \"{0}\"")]
    MalformedUri(String),

    /// A mandatory group is absent
    #[error("\"{uri}\" does not look like a valid Cooler file: missing mandatory group \"{group}\"")]
    MissingGroup { uri: String, group: String },

    /// A mandatory dataset is absent
    #[error("\"{uri}\" does not look like a valid Cooler file: missing mandatory dataset \"{dataset}\"")]
    MissingDataset { uri: String, dataset: String },

    /// A mandatory attribute is absent
    #[error("\"{uri}\" does not look like a valid Cooler file: missing mandatory attribute \"{attribute}\"")]
    MissingAttribute { uri: String, attribute: String },

    /// Attribute exists but holds a type we cannot interpret
    #[error("attribute \"{name}\" has an unexpected type: {message}")]
    AttributeType { name: String, message: String },

    /// `format`, `format-version`, `bin-type` or `storage-mode` is not supported
    #[error("\"{uri}\": {message}")]
    UnsupportedFormat { uri: String, message: String },

    /// `pixels/count` uses a datatype outside the supported numeric set
    #[error("unsupported pixel count type: {0}")]
    UnsupportedCountType(String),

    /// The sentinel `format-version` is still set
    #[error("file \"{0}\" was not properly closed")]
    NotClosedCleanly(String),

    /// Stored datasets disagree with each other
    #[error("\"{uri}\" is corrupted: {message}")]
    CorruptDataset { uri: String, message: String },

    /// Dataset access past its last element
    #[error("attempt to access element {offset} of dataset \"{dataset}\" with {size} elements")]
    OutOfBounds { dataset: String, offset: u64, size: u64 },

    /// Reading from a writer before it has been finalized
    #[error("file \"{0}\" is still open for writing")]
    NotFinalized(String),

    /// Mutating operation on a read-only handle
    #[error("file \"{0}\" was opened in read-only mode")]
    ReadOnlyFile(String),

    /// Pixels were appended with a count type different from the one chosen at creation
    #[error("pixel count type mismatch: file stores {expected}, got {found}")]
    CountTypeMismatch { expected: String, found: String },

    /// Named weights dataset does not exist
    #[error("unable to find weights \"{0}\"")]
    WeightsNotFound(String),

    /// Weight names may not shadow the bin table columns
    #[error("invalid weights name \"{0}\"")]
    InvalidWeightsName(String),

    /// Weight vector length differs from the number of bins
    #[error("weights shape mismatch: expected {expected} values, found {found}")]
    WeightsShape { expected: u64, found: u64 },

    /// Inputs to merge disagree on chromosomes or resolution
    #[error("incompatible inputs: {0}")]
    IncompatibleInputs(String),

    /// An appended pixel is located upstream of the last stored pixel
    #[error("new pixel {new} is located upstream of pixel {previous}")]
    WriteOrder { new: String, previous: String },

    /// Pixels with a count of zero must not be stored
    #[error("found pixel with count 0: {0}")]
    PixelValueZero(String),

    /// Pixel refers to an unknown chromosome or bin, or lies below the diagonal
    #[error("invalid pixel {pixel}: {message}")]
    InvalidPixel { pixel: String, message: String },

    /// Value cannot be stored in an int32 dataset
    #[error("value {value} does not fit in int32 dataset \"{dataset}\"")]
    Int32Overflow { dataset: String, value: u64 },
}

/// Errors raised while building or querying a chromosome set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChromosomeError {
    /// Same chromosome name inserted twice
    #[error("found multiple entries for chromosome \"{name}\" (sizes {size_a} and {size_b})")]
    Duplicate { name: String, size_a: u32, size_b: u32 },

    /// Chromosome names must be non-empty
    #[error("chromosome names cannot be empty")]
    EmptyName,

    /// Chromosome lengths must be non-zero
    #[error("chromosome \"{0}\" has length 0")]
    ZeroLength(String),

    /// Lookup by name failed
    #[error("chromosome \"{0}\" not found")]
    NotFoundByName(String),

    /// Lookup by id failed
    #[error("chromosome with id {0} not found")]
    NotFoundById(u32),
}

/// Errors raised by the bin table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BinTableError {
    /// Bin size must be strictly positive
    #[error("bin size must be greater than 0")]
    ZeroBinSize,

    /// Bin id is not part of the table
    #[error("bin id {0} not found: out of range")]
    BinIdOutOfRange(u64),

    /// Position lies past the end of its chromosome
    #[error("position {pos} is greater than chromosome {chrom} length {length}")]
    PositionOutOfRange { chrom: String, pos: u32, length: u32 },

    /// Chromosome lookup failed
    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),
}

/// Errors raised by the row offset index
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Row index maps outside of its chromosome
    #[error("invalid row_index {row}: row maps outside of chromosome {chrom}")]
    RowOutOfRange { row: u64, chrom: String },

    /// Bin id is larger than the index
    #[error("invalid bin id {bin_id}: index only covers {size} bins")]
    BinIdOutOfRange { bin_id: u64, size: u64 },

    /// Validation failure
    #[error("{chrom} index is corrupted or incomplete: {reason}")]
    Corrupt { chrom: String, reason: String },

    /// Stored offsets cannot be mapped onto the bin table
    #[error("failed to import offsets: {0}")]
    Import(String),

    /// Chromosome lookup failed
    #[error(transparent)]
    Chromosome(#[from] ChromosomeError),
}

/// Errors raised while parsing UCSC-style range queries
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Query string is structurally invalid
    #[error("query \"{query}\" is malformed: {reason}")]
    Malformed { query: String, reason: String },

    /// Query names a chromosome absent from the file
    #[error("query \"{query}\" is invalid: invalid chromosome \"{chrom}\"")]
    UnknownChromosome { query: String, chrom: String },

    /// Start or end could not be parsed or lies outside the chromosome
    #[error("query \"{query}\" is invalid: {reason}")]
    InvalidPosition { query: String, reason: String },

    /// Start position is greater than end position
    #[error("query \"{query}\" is invalid: start position is greater than end position ({start} > {end})")]
    InvalidRange { query: String, start: u32, end: u32 },
}

/// Result type alias for Cooler operations
pub type Result<T> = std::result::Result<T, CoolerError>;

/// Result type alias for bin table operations
pub type BinTableResult<T> = std::result::Result<T, BinTableError>;

/// Result type alias for index operations
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result type alias for query parsing
pub type QueryResult<T> = std::result::Result<T, QueryError>;
