//! Structural validation of `.cool`, `.mcool` and `.scool` files
//!
//! Checks only look at attributes and group layout; datasets are never read.

use super::attributes::{
    read_attr, read_str_attr, BIN_TYPE_FIXED, COOL_MAGIC, DEFAULT_FORMAT_VERSION, MCOOL_MAGIC,
    SCOOL_MAGIC, SENTINEL_FORMAT_VERSION,
};
use super::error::{CoolerError, Result};
use super::file::MANDATORY_GROUPS;
use super::uri::CoolerUri;
use hdf5::Group;
use std::fmt;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// Report for a single Cooler
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationStatusCooler {
    pub uri: String,
    pub is_hdf5: bool,
    pub file_closed_cleanly: bool,
    pub missing_or_invalid_format: bool,
    pub missing_or_invalid_bin_type: bool,
    pub missing_groups: Vec<String>,
}

impl ValidationStatusCooler {
    fn new(uri: String) -> Self {
        Self {
            uri,
            missing_or_invalid_format: true,
            missing_or_invalid_bin_type: true,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_hdf5
            && self.file_closed_cleanly
            && !self.missing_or_invalid_format
            && !self.missing_or_invalid_bin_type
            && self.missing_groups.is_empty()
    }
}

impl fmt::Display for ValidationStatusCooler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uri=\"{}\"", self.uri)?;
        writeln!(f, "is_hdf5={}", self.is_hdf5)?;
        writeln!(f, "file_closed_cleanly={}", self.file_closed_cleanly)?;
        writeln!(f, "missing_or_invalid_format_attr={}", self.missing_or_invalid_format)?;
        writeln!(f, "missing_or_invalid_bin_type_attr={}", self.missing_or_invalid_bin_type)?;
        writeln!(f, "missing_groups=[{}]", self.missing_groups.join(", "))?;
        write!(f, "is_valid_cooler={}", self.is_valid())
    }
}

/// Report for a multi-resolution container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationStatusMultires {
    pub uri: String,
    pub is_hdf5: bool,
    pub file_closed_cleanly: bool,
    pub missing_or_invalid_format: bool,
    pub missing_or_invalid_bin_type: bool,
    pub missing_groups: Vec<String>,
    pub invalid_resolutions: Vec<ValidationStatusCooler>,
}

impl ValidationStatusMultires {
    pub fn is_valid(&self) -> bool {
        self.is_hdf5
            && self.file_closed_cleanly
            && !self.missing_or_invalid_format
            && !self.missing_or_invalid_bin_type
            && self.missing_groups.is_empty()
            && self.invalid_resolutions.is_empty()
    }
}

impl fmt::Display for ValidationStatusMultires {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uri=\"{}\"", self.uri)?;
        writeln!(f, "is_hdf5={}", self.is_hdf5)?;
        writeln!(f, "file_closed_cleanly={}", self.file_closed_cleanly)?;
        writeln!(f, "missing_or_invalid_format_attr={}", self.missing_or_invalid_format)?;
        writeln!(f, "missing_or_invalid_bin_type_attr={}", self.missing_or_invalid_bin_type)?;
        writeln!(f, "missing_groups=[{}]", self.missing_groups.join(", "))?;
        writeln!(f, "is_valid_multires_file={}", self.is_valid())?;
        write_children(f, "invalid_resolutions", &self.invalid_resolutions)
    }
}

/// Report for a single-cell container
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationStatusScool {
    pub uri: String,
    pub is_hdf5: bool,
    pub file_closed_cleanly: bool,
    pub missing_or_invalid_format: bool,
    pub missing_or_invalid_bin_type: bool,
    pub missing_groups: Vec<String>,
    pub unexpected_number_of_cells: bool,
    pub invalid_cells: Vec<ValidationStatusCooler>,
}

impl ValidationStatusScool {
    pub fn is_valid(&self) -> bool {
        self.is_hdf5
            && self.file_closed_cleanly
            && !self.missing_or_invalid_format
            && !self.missing_or_invalid_bin_type
            && self.missing_groups.is_empty()
            && !self.unexpected_number_of_cells
            && self.invalid_cells.is_empty()
    }
}

impl fmt::Display for ValidationStatusScool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "uri=\"{}\"", self.uri)?;
        writeln!(f, "is_hdf5={}", self.is_hdf5)?;
        writeln!(f, "file_closed_cleanly={}", self.file_closed_cleanly)?;
        writeln!(f, "missing_or_invalid_format_attr={}", self.missing_or_invalid_format)?;
        writeln!(f, "missing_or_invalid_bin_type_attr={}", self.missing_or_invalid_bin_type)?;
        writeln!(f, "missing_groups=[{}]", self.missing_groups.join(", "))?;
        writeln!(f, "unexpected_number_of_cells={}", self.unexpected_number_of_cells)?;
        writeln!(f, "is_valid_scool_file={}", self.is_valid())?;
        write_children(f, "invalid_cells", &self.invalid_cells)
    }
}

fn write_children(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    children: &[ValidationStatusCooler],
) -> fmt::Result {
    if children.is_empty() {
        return write!(f, "{}=[]", label);
    }
    write!(f, "{}:", label)?;
    for child in children {
        write!(f, "\n - {}", child.uri)?;
    }
    Ok(())
}

/// Look for the HDF5 signature at offset 0, 512, 1024, 2048, ...
pub fn is_hdf5(path: &Path) -> bool {
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let mut buf = [0u8; 8];
    let mut offset = 0u64;
    while offset + 8 <= len {
        let matched = file.seek(SeekFrom::Start(offset)).is_ok()
            && file.read_exact(&mut buf).is_ok()
            && buf == HDF5_SIGNATURE;
        if matched {
            return true;
        }
        offset = if offset == 0 { 512 } else { offset * 2 };
    }
    false
}

fn open_checked(path: &Path) -> Result<Option<hdf5::File>> {
    if !path.exists() {
        return Err(CoolerError::PathNotFound(path.display().to_string()));
    }
    if !is_hdf5(path) {
        return Ok(None);
    }
    Ok(Some(hdf5::File::open(path)?))
}

/// Validate the Cooler at `uri`
pub fn is_cooler(uri: &str) -> Result<ValidationStatusCooler> {
    let uri = CoolerUri::parse(uri)?;
    let Some(file) = open_checked(uri.path())? else {
        return Ok(ValidationStatusCooler::new(uri.to_string()));
    };
    if !uri.is_root() && !file.link_exists(&uri.group_path) {
        let mut status = ValidationStatusCooler::new(uri.to_string());
        status.is_hdf5 = true;
        status.missing_groups.push(uri.group_path.clone());
        return Ok(status);
    }
    let root = file.group(&uri.group_path)?;
    check_cooler_group(&root, uri.to_string())
}

/// Validate an already opened group
pub fn check_cooler_group(root: &Group, uri: String) -> Result<ValidationStatusCooler> {
    let mut status = ValidationStatusCooler::new(uri);
    status.is_hdf5 = true;

    if let Some(format) = read_str_attr(root, "format")? {
        status.missing_or_invalid_format = format != COOL_MAGIC;
    }

    let version = read_attr::<u8>(root, "format-version")?;
    match version {
        Some(v) => {
            status.file_closed_cleanly = v != SENTINEL_FORMAT_VERSION;
            status.missing_or_invalid_format |= v == 0 || v > DEFAULT_FORMAT_VERSION;
        }
        None => status.missing_or_invalid_format = true,
    }

    match read_str_attr(root, "bin-type")? {
        Some(bin_type) => status.missing_or_invalid_bin_type = bin_type != BIN_TYPE_FIXED,
        // fixed bins are implied before v3
        None => status.missing_or_invalid_bin_type = version.map_or(true, |v| v >= 3),
    }

    status.missing_groups = MANDATORY_GROUPS
        .iter()
        .filter(|g| !root.link_exists(g))
        .map(|g| g.to_string())
        .collect();
    Ok(status)
}

fn read_container_attrs(
    root: &Group,
    magic: &str,
) -> Result<(bool, bool)> {
    let mut invalid_format = match read_str_attr(root, "format")? {
        Some(format) => format != magic,
        None => true,
    };
    if let Some(v) = read_attr::<u8>(root, "format-version")? {
        invalid_format |= v == 0 || v > DEFAULT_FORMAT_VERSION;
    }
    // containers need not advertise a bin type
    let invalid_bin_type = match read_str_attr(root, "bin-type")? {
        Some(bin_type) => bin_type != BIN_TYPE_FIXED,
        None => false,
    };
    Ok((invalid_format, invalid_bin_type))
}

fn child_names(file: &hdf5::File, group: &str) -> Result<Vec<String>> {
    if !file.link_exists(group) {
        return Ok(Vec::new());
    }
    Ok(file.group(group)?.member_names()?)
}

/// Validate a multi-resolution container. Each resolution is checked with
/// [`is_cooler`] when `validate_resolutions` is set.
pub fn is_multires(path: &str, validate_resolutions: bool) -> Result<ValidationStatusMultires> {
    let uri = CoolerUri::parse(path)?;
    let mut status = ValidationStatusMultires {
        uri: uri.file_path.clone(),
        missing_or_invalid_format: true,
        ..Default::default()
    };
    let Some(file) = open_checked(uri.path())? else {
        return Ok(status);
    };
    status.is_hdf5 = true;
    status.file_closed_cleanly = true;

    let (invalid_format, invalid_bin_type) = read_container_attrs(&file, MCOOL_MAGIC)?;
    status.missing_or_invalid_format = invalid_format;
    status.missing_or_invalid_bin_type = invalid_bin_type;

    let resolutions = child_names(&file, "resolutions")?;
    if resolutions.is_empty() {
        status.missing_groups.push("resolutions".to_string());
    }

    if validate_resolutions {
        for resolution in &resolutions {
            let child_uri = uri.join("resolutions").join(resolution);
            let root = file.group(&child_uri.group_path)?;
            let child = check_cooler_group(&root, child_uri.to_string())?;
            if !child.is_valid() {
                status.file_closed_cleanly &= child.file_closed_cleanly;
                status.invalid_resolutions.push(child);
            }
        }
    }
    Ok(status)
}

/// Validate a single-cell container. Each cell is checked with
/// [`is_cooler`] when `validate_cells` is set.
pub fn is_scool(path: &str, validate_cells: bool) -> Result<ValidationStatusScool> {
    let uri = CoolerUri::parse(path)?;
    let mut status = ValidationStatusScool {
        uri: uri.file_path.clone(),
        missing_or_invalid_format: true,
        ..Default::default()
    };
    let Some(file) = open_checked(uri.path())? else {
        return Ok(status);
    };
    status.is_hdf5 = true;
    status.file_closed_cleanly = true;

    let (invalid_format, invalid_bin_type) = read_container_attrs(&file, SCOOL_MAGIC)?;
    status.missing_or_invalid_format = invalid_format;
    status.missing_or_invalid_bin_type = invalid_bin_type;

    status.missing_groups = ["chroms", "bins", "cells"]
        .iter()
        .filter(|g| !file.link_exists(g))
        .map(|g| g.to_string())
        .collect();

    let cells = child_names(&file, "cells")?;
    if let Some(ncells) = read_attr::<u64>(&file, "ncells")? {
        status.unexpected_number_of_cells = ncells != cells.len() as u64;
    }

    if validate_cells {
        for cell in &cells {
            let child_uri = uri.join("cells").join(cell);
            let root = file.group(&child_uri.group_path)?;
            let child = check_cooler_group(&root, child_uri.to_string())?;
            if !child.is_valid() {
                status.file_closed_cleanly &= child.file_closed_cleanly;
                status.invalid_cells.push(child);
            }
        }
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chromosome::ChromosomeSet;
    use crate::core::file::File;
    use crate::core::pixel::Pixel;
    use tempfile::tempdir;

    fn chroms() -> ChromosomeSet {
        ChromosomeSet::new([("chr1", 100)]).unwrap()
    }

    #[test]
    fn test_closed_file_is_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cool");
        let uri = path.to_str().unwrap();
        let mut clr = File::create_new_cooler::<i32>(uri, chroms(), 10, false).unwrap();
        clr.append_pixels([Pixel::new(0, 0, 1)]).unwrap();

        let status = is_cooler(uri).unwrap();
        assert!(!status.file_closed_cleanly);
        assert!(!status.is_valid());

        clr.close().unwrap();
        let status = is_cooler(uri).unwrap();
        assert!(status.is_valid(), "{}", status);
        assert!(status.to_string().ends_with("is_valid_cooler=true"));
    }

    #[test]
    fn test_not_hdf5() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.txt");
        std::fs::write(&path, "chr1\t100\n").unwrap();
        let status = is_cooler(path.to_str().unwrap()).unwrap();
        assert!(!status.is_hdf5);
        assert!(!status.is_valid());

        assert!(matches!(
            is_cooler(dir.path().join("missing.cool").to_str().unwrap()),
            Err(CoolerError::PathNotFound(_))
        ));
    }

    #[test]
    fn test_missing_groups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.h5");
        let file = hdf5::File::create(&path).unwrap();
        file.create_group("chroms").unwrap();
        drop(file);

        let status = is_cooler(path.to_str().unwrap()).unwrap();
        assert!(status.is_hdf5);
        assert!(status.missing_or_invalid_format);
        assert_eq!(status.missing_groups, vec!["bins", "pixels", "indexes"]);
        assert!(status.to_string().contains("missing_groups=[bins, pixels, indexes]"));
    }
}
