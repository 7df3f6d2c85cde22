//! Comparisons between Coolers

use super::error::Result;
use super::file::File;

/// Open both URIs and compare them with [`equal_files`]
pub fn equal(uri1: &str, uri2: &str, ignore_attributes: bool) -> Result<bool> {
    let clr1 = File::open_read_only(uri1)?;
    let clr2 = File::open_read_only(uri2)?;
    equal_files(&clr1, &clr2, ignore_attributes)
}

/// Two Coolers are equal when they share chromosomes, bin size and count
/// type and store the same pixels. Root attributes are compared as well
/// unless `ignore_attributes` is set.
pub fn equal_files(clr1: &File, clr2: &File, ignore_attributes: bool) -> Result<bool> {
    if clr1.bin_size() != clr2.bin_size()
        || clr1.chromosomes() != clr2.chromosomes()
        || clr1.count_type() != clr2.count_type()
        || clr1.nnz() != clr2.nnz()
    {
        return Ok(false);
    }
    if !ignore_attributes && clr1.attributes() != clr2.attributes() {
        log::debug!("\"{}\" and \"{}\" differ in their attributes", clr1.uri(), clr2.uri());
        return Ok(false);
    }

    let mut pixels2 = clr2.pixels()?.iter::<f64>()?;
    for p1 in clr1.pixels()?.iter::<f64>()? {
        let p1 = p1?;
        match pixels2.next().transpose()? {
            Some(p2) if p1 == p2 => {}
            _ => return Ok(false),
        }
    }
    Ok(pixels2.next().is_none())
}
