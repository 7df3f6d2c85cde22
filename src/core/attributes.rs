//! Standard Cooler root attributes
//!
//! Attribute names on disk are hyphenated (`bin-size`, `format-version`, ...).
//! While a writer holds a file open, `format-version` carries the sentinel
//! value [`SENTINEL_FORMAT_VERSION`].

use super::error::{CoolerError, Result};
use super::numeric::PixelSum;
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{H5Type, Location};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub const COOL_MAGIC: &str = "HDF5::Cooler";
pub const MCOOL_MAGIC: &str = "HDF5::MCOOL";
pub const SCOOL_MAGIC: &str = "HDF5::SCOOL";

pub const DEFAULT_FORMAT_VERSION: u8 = 3;
pub const SENTINEL_FORMAT_VERSION: u8 = 255;
pub const DEFAULT_FORMAT_URL: &str = "https://github.com/open2c/cooler";
pub const DEFAULT_ASSEMBLY: &str = "unknown";
pub const DEFAULT_METADATA: &str = "{}";
pub const BIN_TYPE_FIXED: &str = "fixed";
pub const STORAGE_MODE_SYMMETRIC_UPPER: &str = "symmetric-upper";
pub const GENERATED_BY: &str = concat!("cooler-rs-v", env!("CARGO_PKG_VERSION"));

/// Root attributes shared by every Cooler
#[derive(Debug, Clone, PartialEq)]
pub struct StandardAttributes {
    pub bin_size: u32,
    pub bin_type: Option<String>,
    pub format: String,
    pub format_version: u8,
    pub storage_mode: Option<String>,

    pub creation_date: Option<String>,
    pub generated_by: Option<String>,
    pub assembly: Option<String>,
    pub metadata: Option<String>,
    pub format_url: Option<String>,
    pub nbins: Option<u64>,
    pub nchroms: Option<u32>,
    pub nnz: Option<u64>,
    pub sum: Option<PixelSum>,
    pub cis: Option<PixelSum>,
}

impl StandardAttributes {
    /// Attributes for a new file, with defaults filled in
    pub fn init(bin_size: u32) -> Self {
        Self {
            bin_size,
            bin_type: Some(BIN_TYPE_FIXED.to_string()),
            format: COOL_MAGIC.to_string(),
            format_version: DEFAULT_FORMAT_VERSION,
            storage_mode: Some(STORAGE_MODE_SYMMETRIC_UPPER.to_string()),
            creation_date: Some(utc_timestamp(SystemTime::now())),
            generated_by: Some(GENERATED_BY.to_string()),
            assembly: Some(DEFAULT_ASSEMBLY.to_string()),
            metadata: Some(DEFAULT_METADATA.to_string()),
            format_url: Some(DEFAULT_FORMAT_URL.to_string()),
            nbins: Some(0),
            nchroms: Some(0),
            nnz: Some(0),
            sum: None,
            cis: None,
        }
    }

    /// Attributes with only the mandatory fields set
    pub fn init_empty() -> Self {
        Self {
            bin_size: 0,
            bin_type: None,
            format: COOL_MAGIC.to_string(),
            format_version: DEFAULT_FORMAT_VERSION,
            storage_mode: None,
            creation_date: None,
            generated_by: None,
            assembly: None,
            metadata: None,
            format_url: None,
            nbins: None,
            nchroms: None,
            nnz: None,
            sum: None,
            cis: None,
        }
    }

    /// Read attributes from a Cooler root and check the mandatory ones
    pub fn read(root: &Location, uri: &str) -> Result<Self> {
        let missing = |attribute: &str| CoolerError::MissingAttribute {
            uri: uri.to_string(),
            attribute: attribute.to_string(),
        };

        let format = read_str_attr(root, "format")?.ok_or_else(|| missing("format"))?;
        let format_version =
            read_attr::<u8>(root, "format-version")?.ok_or_else(|| missing("format-version"))?;
        if format_version == SENTINEL_FORMAT_VERSION {
            return Err(CoolerError::NotClosedCleanly(uri.to_string()));
        }
        let bin_size = read_attr::<u32>(root, "bin-size")?.ok_or_else(|| missing("bin-size"))?;
        let bin_type = read_str_attr(root, "bin-type")?;
        let storage_mode = read_str_attr(root, "storage-mode")?;

        if format_version >= 3 {
            if bin_type.is_none() {
                return Err(missing("bin-type"));
            }
            if storage_mode.is_none() {
                return Err(missing("storage-mode"));
            }
        }

        let assembly = match read_str_attr(root, "genome-assembly")? {
            Some(a) => Some(a),
            None => read_str_attr(root, "assembly")?,
        };

        let attrs = Self {
            bin_size,
            bin_type,
            format,
            format_version,
            storage_mode,
            creation_date: read_str_attr(root, "creation-date")?,
            generated_by: read_str_attr(root, "generated-by")?,
            assembly,
            metadata: read_str_attr(root, "metadata")?,
            format_url: read_str_attr(root, "format-url")?,
            nbins: read_attr::<u64>(root, "nbins")?,
            nchroms: read_attr::<u32>(root, "nchroms")?,
            nnz: read_attr::<u64>(root, "nnz")?,
            sum: read_sum_attr(root, "sum")?,
            cis: read_sum_attr(root, "cis")?,
        };
        attrs.check_supported(uri)?;
        Ok(attrs)
    }

    fn check_supported(&self, uri: &str) -> Result<()> {
        let unsupported = |message: String| CoolerError::UnsupportedFormat {
            uri: uri.to_string(),
            message,
        };
        if self.format != COOL_MAGIC {
            return Err(unsupported(format!(
                "expected format \"{}\", found \"{}\"",
                COOL_MAGIC, self.format
            )));
        }
        if self.format_version == 0 || self.format_version > DEFAULT_FORMAT_VERSION {
            return Err(unsupported(format!(
                "unsupported format-version {}",
                self.format_version
            )));
        }
        if let Some(bin_type) = &self.bin_type {
            if bin_type != BIN_TYPE_FIXED {
                return Err(unsupported(format!(
                    "unsupported bin-type \"{}\": only \"{}\" is supported",
                    bin_type, BIN_TYPE_FIXED
                )));
            }
        }
        if let Some(mode) = &self.storage_mode {
            if mode != STORAGE_MODE_SYMMETRIC_UPPER {
                return Err(unsupported(format!(
                    "unsupported storage-mode \"{}\"",
                    mode
                )));
            }
        }
        if self.bin_size == 0 {
            return Err(unsupported("bin-size must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Write every attribute. `format-version` is left alone when
    /// `skip_format_version` is set so the sentinel survives until commit.
    pub fn write(&self, root: &Location, skip_format_version: bool) -> Result<()> {
        write_attr(root, "bin-size", &self.bin_size)?;
        if let Some(v) = &self.bin_type {
            write_str_attr(root, "bin-type", v)?;
        }
        write_str_attr(root, "format", &self.format)?;
        if !skip_format_version {
            write_attr(root, "format-version", &self.format_version)?;
        }
        if let Some(v) = &self.storage_mode {
            write_str_attr(root, "storage-mode", v)?;
        }

        if let Some(v) = &self.creation_date {
            write_str_attr(root, "creation-date", v)?;
        }
        if let Some(v) = &self.generated_by {
            write_str_attr(root, "generated-by", v)?;
        }
        if let Some(v) = &self.assembly {
            write_str_attr(root, "genome-assembly", v)?;
        }
        if let Some(v) = &self.metadata {
            write_str_attr(root, "metadata", v)?;
        }
        if let Some(v) = &self.format_url {
            write_str_attr(root, "format-url", v)?;
        }
        if let Some(v) = &self.nbins {
            write_attr(root, "nbins", v)?;
        }
        if let Some(v) = &self.nchroms {
            write_attr(root, "nchroms", v)?;
        }
        if let Some(v) = &self.nnz {
            write_attr(root, "nnz", v)?;
        }
        if let Some(v) = self.sum {
            write_sum_attr(root, "sum", v)?;
        }
        if let Some(v) = self.cis {
            write_sum_attr(root, "cis", v)?;
        }
        Ok(())
    }
}

pub fn has_attr(loc: &Location, name: &str) -> Result<bool> {
    Ok(loc.attr_names()?.iter().any(|n| n == name))
}

/// Read a scalar attribute, `None` when absent
pub fn read_attr<T: H5Type>(loc: &Location, name: &str) -> Result<Option<T>> {
    if !has_attr(loc, name)? {
        return Ok(None);
    }
    Ok(Some(loc.attr(name)?.read_scalar::<T>()?))
}

/// Read a string attribute stored with any of the HDF5 string encodings
pub fn read_str_attr(loc: &Location, name: &str) -> Result<Option<String>> {
    if !has_attr(loc, name)? {
        return Ok(None);
    }
    let attr = loc.attr(name)?;
    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::VarLenUnicode => attr.read_scalar::<VarLenUnicode>()?.to_string(),
        TypeDescriptor::VarLenAscii => attr.read_scalar::<VarLenAscii>()?.to_string(),
        TypeDescriptor::FixedAscii(_) => attr.read_scalar::<FixedAscii<1024>>()?.to_string(),
        TypeDescriptor::FixedUnicode(_) => attr.read_scalar::<FixedUnicode<1024>>()?.to_string(),
        other => {
            return Err(CoolerError::AttributeType {
                name: name.to_string(),
                message: format!("expected a string, found {:?}", other),
            })
        }
    };
    Ok(Some(value))
}

/// Read `sum`/`cis`, picking the arm from the stored datatype
pub fn read_sum_attr(loc: &Location, name: &str) -> Result<Option<PixelSum>> {
    if !has_attr(loc, name)? {
        return Ok(None);
    }
    let attr = loc.attr(name)?;
    let sum = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) => PixelSum::Int(attr.read_scalar::<i64>()?),
        TypeDescriptor::Unsigned(_) => PixelSum::UInt(attr.read_scalar::<u64>()?),
        TypeDescriptor::Float(_) => PixelSum::Float(attr.read_scalar::<f64>()?),
        other => {
            return Err(CoolerError::AttributeType {
                name: name.to_string(),
                message: format!("expected a number, found {:?}", other),
            })
        }
    };
    Ok(Some(sum))
}

/// Create or overwrite a scalar attribute
pub fn write_attr<T: H5Type>(loc: &Location, name: &str, value: &T) -> Result<()> {
    if has_attr(loc, name)? {
        loc.attr(name)?.write_scalar(value)?;
    } else {
        loc.new_attr::<T>().create(name)?.write_scalar(value)?;
    }
    Ok(())
}

pub fn write_str_attr(loc: &Location, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value).map_err(|e| CoolerError::AttributeType {
        name: name.to_string(),
        message: format!("invalid utf-8 attribute: {}", e),
    })?;
    write_attr(loc, name, &value)
}

pub fn write_sum_attr(loc: &Location, name: &str, value: PixelSum) -> Result<()> {
    match value {
        PixelSum::Int(v) => write_attr(loc, name, &v),
        PixelSum::UInt(v) => write_attr(loc, name, &v),
        PixelSum::Float(v) => write_attr(loc, name, &v),
    }
}

/// Format `t` as `YYYY-MM-DDTHH:MM:SS` (UTC)
pub fn utc_timestamp(t: SystemTime) -> String {
    let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0) as i64;
    let (days, rem) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

// days since 1970-01-01 to proleptic Gregorian (y, m, d)
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_timestamp() {
        assert_eq!(utc_timestamp(UNIX_EPOCH), "1970-01-01T00:00:00");
        let t = UNIX_EPOCH + Duration::from_secs(951_782_400 + 3661);
        assert_eq!(utc_timestamp(t), "2000-02-29T01:01:01");
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        let mut attrs = StandardAttributes::init(5000);
        attrs.sum = Some(PixelSum::Int(17));
        attrs.cis = Some(PixelSum::Float(2.5));
        attrs.write(&file, false).unwrap();

        let read = StandardAttributes::read(&file, "attrs.h5").unwrap();
        assert_eq!(read, attrs);
    }

    #[test]
    fn test_sentinel_detected() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        let attrs = StandardAttributes::init(10);
        attrs.write(&file, true).unwrap();
        write_attr(&file, "format-version", &SENTINEL_FORMAT_VERSION).unwrap();

        assert!(matches!(
            StandardAttributes::read(&file, "attrs.h5"),
            Err(CoolerError::NotClosedCleanly(_))
        ));

        write_attr(&file, "format-version", &3u8).unwrap();
        assert!(StandardAttributes::read(&file, "attrs.h5").is_ok());
    }

    #[test]
    fn test_unsupported_bin_type() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        let mut attrs = StandardAttributes::init(10);
        attrs.bin_type = Some("variable".into());
        attrs.write(&file, false).unwrap();
        assert!(matches!(
            StandardAttributes::read(&file, "attrs.h5"),
            Err(CoolerError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_mandatory() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        write_str_attr(&file, "format", COOL_MAGIC).unwrap();
        write_attr(&file, "format-version", &3u8).unwrap();
        let err = StandardAttributes::read(&file, "attrs.h5").unwrap_err();
        assert!(err.to_string().contains("bin-size"));
    }

    #[test]
    fn test_assembly_fallback() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("attrs.h5")).unwrap();
        let mut attrs = StandardAttributes::init(10);
        attrs.assembly = None;
        attrs.write(&file, false).unwrap();
        write_str_attr(&file, "assembly", "hg38").unwrap();
        let read = StandardAttributes::read(&file, "attrs.h5").unwrap();
        assert_eq!(read.assembly.as_deref(), Some("hg38"));
    }
}
