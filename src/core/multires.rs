//! Multi-resolution (`.mcool`) and single-cell (`.scool`) containers
//!
//! Both are plain HDF5 files whose children are regular Coolers:
//!
//! ```text
//! sample.mcool              cells.scool
//! └── resolutions           ├── chroms
//!     ├── 1000              ├── bins
//!     └── 5000              └── cells
//!                               ├── cell_a
//!                               └── cell_b
//! ```
//!
//! The init functions only lay out the container and leave empty child
//! groups behind. Children are then written through
//! [`File::create`](super::file::File::create) with URIs such as
//! `sample.mcool::/resolutions/1000`.

use super::attributes::{write_attr, write_str_attr, BIN_TYPE_FIXED, MCOOL_MAGIC, SCOOL_MAGIC};
use super::bin_table::BinTable;
use super::chromosome::ChromosomeSet;
use super::dataset::DatasetOptions;
use super::error::{CoolerError, Result};
use super::file::write_bin_table_groups;
use super::uri::CoolerUri;
use std::path::Path;

pub const MCOOL_FORMAT_VERSION: u8 = 2;
pub const SCOOL_FORMAT_VERSION: u8 = 1;

fn create_container(path: &Path, overwrite: bool) -> Result<hdf5::File> {
    if path.exists() && !overwrite {
        return Err(CoolerError::PathExists(path.display().to_string()));
    }
    Ok(hdf5::File::create(path)?)
}

/// Lay out an empty `.mcool` with one placeholder group per resolution
pub fn init_mcool<P: AsRef<Path>>(path: P, resolutions: &[u32], overwrite: bool) -> Result<()> {
    let path = path.as_ref();
    let file = create_container(path, overwrite)?;
    write_str_attr(&file, "format", MCOOL_MAGIC)?;
    write_attr(&file, "format-version", &MCOOL_FORMAT_VERSION)?;

    let group = file.create_group("resolutions")?;
    let mut resolutions = resolutions.to_vec();
    resolutions.sort_unstable();
    resolutions.dedup();
    for res in &resolutions {
        group.create_group(&res.to_string())?;
    }
    file.flush()?;
    log::info!(
        "initialized \"{}\" with {} resolution(s)",
        path.display(),
        resolutions.len()
    );
    Ok(())
}

/// Lay out an empty `.scool`: a shared bin table plus one placeholder group
/// per cell
pub fn init_scool<P, S>(
    path: P,
    chroms: ChromosomeSet,
    bin_size: u32,
    cells: &[S],
    overwrite: bool,
) -> Result<()>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let bins = BinTable::new(chroms, bin_size)?;
    let file = create_container(path, overwrite)?;
    write_str_attr(&file, "format", SCOOL_MAGIC)?;
    write_attr(&file, "format-version", &SCOOL_FORMAT_VERSION)?;
    write_str_attr(&file, "bin-type", BIN_TYPE_FIXED)?;
    write_attr(&file, "bin-size", &bin_size)?;
    write_attr(&file, "ncells", &(cells.len() as u64))?;

    write_bin_table_groups(&file, &bins, &DatasetOptions::default())?;

    let group = file.create_group("cells")?;
    for cell in cells {
        let name = cell.as_ref();
        if name.is_empty() || name.contains('/') {
            return Err(CoolerError::MalformedUri(format!(
                "{}::/cells/{}",
                path.display(),
                name
            )));
        }
        group.create_group(name)?;
    }
    file.flush()?;
    log::info!(
        "initialized \"{}\" with {} cell(s) ({} bins)",
        path.display(),
        cells.len(),
        bins.len()
    );
    Ok(())
}

fn list_children(path: &Path, group: &str) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(CoolerError::PathNotFound(path.display().to_string()));
    }
    let file = hdf5::File::open(path)?;
    if !file.link_exists(group) {
        return Err(CoolerError::MissingGroup {
            uri: path.display().to_string(),
            group: group.to_string(),
        });
    }
    Ok(file.group(group)?.member_names()?)
}

/// Resolutions stored in an `.mcool`, ascending
pub fn list_resolutions<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let mut resolutions = Vec::new();
    for name in list_children(path, "resolutions")? {
        match name.parse::<u32>() {
            Ok(res) => resolutions.push(res),
            Err(_) => log::warn!(
                "\"{}\": ignoring non-numeric resolution \"{}\"",
                path.display(),
                name
            ),
        }
    }
    resolutions.sort_unstable();
    Ok(resolutions)
}

/// Cell names stored in an `.scool`, sorted
pub fn list_cells<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let mut cells = list_children(path.as_ref(), "cells")?;
    cells.sort();
    Ok(cells)
}

/// URI of one resolution inside an `.mcool`
pub fn resolution_uri<P: AsRef<Path>>(path: P, resolution: u32) -> CoolerUri {
    CoolerUri::new(
        path.as_ref().display().to_string(),
        format!("/resolutions/{}", resolution),
    )
}

/// URI of one cell inside an `.scool`
pub fn cell_uri<P: AsRef<Path>>(path: P, cell: &str) -> CoolerUri {
    CoolerUri::new(path.as_ref().display().to_string(), format!("/cells/{}", cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::file::File;
    use crate::core::pixel::Pixel;
    use crate::core::validate::{is_multires, is_scool};
    use tempfile::tempdir;

    fn chroms() -> ChromosomeSet {
        ChromosomeSet::new([("chr1", 1000), ("chr2", 500)]).unwrap()
    }

    #[test]
    fn test_init_mcool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.mcool");
        let resolutions = [50, 10, 30, 20, 40];
        init_mcool(&path, &resolutions, false).unwrap();
        assert_eq!(list_resolutions(&path).unwrap(), vec![10, 20, 30, 40, 50]);

        for res in resolutions {
            let uri = resolution_uri(&path, res).to_string();
            let mut clr = File::create_new_cooler::<i32>(&uri, chroms(), res, false).unwrap();
            clr.append_pixels([Pixel::new(0, 1, 1)]).unwrap();
            clr.close().unwrap();
        }

        let status = is_multires(path.to_str().unwrap(), true).unwrap();
        assert!(status.is_valid(), "{}", status);

        let clr = File::open_read_only(&resolution_uri(&path, 30).to_string()).unwrap();
        assert_eq!(clr.bin_size(), 30);
        assert_eq!(clr.nnz(), 1);
    }

    #[test]
    fn test_init_mcool_refuses_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.mcool");
        init_mcool(&path, &[10], false).unwrap();
        assert!(matches!(
            init_mcool(&path, &[10], false),
            Err(CoolerError::PathExists(_))
        ));
        init_mcool(&path, &[20], true).unwrap();
        assert_eq!(list_resolutions(&path).unwrap(), vec![20]);
    }

    #[test]
    fn test_unfinished_resolution_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.mcool");
        init_mcool(&path, &[], false).unwrap();
        let uri = resolution_uri(&path, 10).to_string();
        let clr = File::create_new_cooler::<i32>(&uri, chroms(), 10, false).unwrap();

        let status = is_multires(path.to_str().unwrap(), true).unwrap();
        assert!(!status.is_valid());
        assert!(!status.file_closed_cleanly);
        assert_eq!(status.invalid_resolutions.len(), 1);

        drop(clr);
        assert!(is_multires(path.to_str().unwrap(), true).unwrap().is_valid());
    }

    #[test]
    fn test_init_scool() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.scool");
        init_scool(&path, chroms(), 100, &["cell_b", "cell_a"], false).unwrap();
        assert_eq!(list_cells(&path).unwrap(), vec!["cell_a", "cell_b"]);

        for cell in ["cell_a", "cell_b"] {
            let uri = cell_uri(&path, cell).to_string();
            let mut clr = File::create_new_cooler::<u32>(&uri, chroms(), 100, false).unwrap();
            clr.append_pixels([Pixel::new(0, 0, 2u32)]).unwrap();
            clr.close().unwrap();
        }

        let status = is_scool(path.to_str().unwrap(), true).unwrap();
        assert!(status.is_valid(), "{}", status);
        assert!(matches!(
            list_resolutions(&path),
            Err(CoolerError::MissingGroup { .. })
        ));
    }
}
