//! Pixel text formats
//!
//! - bg2 (bedGraph2): `chrom1 start1 end1 chrom2 start2 end2 count`
//! - COO: `bin1_id bin2_id count`
//!
//! Fields are tab separated. Parsing works on raw bytes and only splits the
//! fields it needs.

use crate::core::{BinTable, BinTableError, Count, Pixel};
use memchr::memchr_iter;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Layout of a pixel line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Bg2,
    Coo,
}

impl PixelFormat {
    /// Number of tab separated fields a line must have
    pub fn num_fields(self) -> usize {
        match self {
            PixelFormat::Bg2 => 7,
            PixelFormat::Coo => 3,
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bg2" => Ok(PixelFormat::Bg2),
            "coo" => Ok(PixelFormat::Coo),
            other => Err(format!("unknown pixel format \"{}\"", other)),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelFormat::Bg2 => f.write_str("bg2"),
            PixelFormat::Coo => f.write_str("coo"),
        }
    }
}

/// Pixel line parsing error
#[derive(Debug, thiserror::Error)]
pub enum Bg2ParseError {
    #[error("Empty line")]
    EmptyLine,

    #[error("Too few fields: expected at least {expected}, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("Invalid UTF-8 in field: {0}")]
    InvalidUtf8(&'static str),

    #[error("Invalid number in field {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error(transparent)]
    Bin(#[from] BinTableError),
}

/// Split `line` at tabs, keeping at most `max` fields
fn split_fields(line: &[u8], max: usize) -> Vec<&[u8]> {
    let mut fields = Vec::with_capacity(max);
    let mut start = 0;
    for tab in memchr_iter(b'\t', line) {
        if fields.len() + 1 == max {
            break;
        }
        fields.push(&line[start..tab]);
        start = tab + 1;
    }
    fields.push(&line[start..]);
    fields
}

fn split_exact(line: &[u8], n: usize) -> Result<Vec<&[u8]>, Bg2ParseError> {
    if line.is_empty() {
        return Err(Bg2ParseError::EmptyLine);
    }
    let fields = split_fields(line, n + 1);
    if fields.len() < n {
        return Err(Bg2ParseError::TooFewFields {
            expected: n,
            found: fields.len(),
        });
    }
    Ok(fields)
}

#[inline]
fn as_str<'a>(field: &'a [u8], name: &'static str) -> Result<&'a str, Bg2ParseError> {
    std::str::from_utf8(field).map_err(|_| Bg2ParseError::InvalidUtf8(name))
}

#[inline]
fn parse_num<T: FromStr>(field: &[u8], name: &'static str) -> Result<T, Bg2ParseError> {
    let s = as_str(field, name)?;
    s.trim()
        .parse()
        .map_err(|_| Bg2ParseError::InvalidNumber(name, s.to_string()))
}

/// Parse `bin1_id bin2_id count`
pub fn parse_coo_line<N: Count>(line: &[u8]) -> Result<Pixel<N>, Bg2ParseError> {
    let fields = split_exact(line, 3)?;
    Ok(Pixel::new(
        parse_num(fields[0], "bin1_id")?,
        parse_num(fields[1], "bin2_id")?,
        parse_num(fields[2], "count")?,
    ))
}

/// Parse a bg2 line, mapping both start positions onto `bins`.
/// End positions are not checked.
pub fn parse_bg2_line<N: Count>(line: &[u8], bins: &BinTable) -> Result<Pixel<N>, Bg2ParseError> {
    let fields = split_exact(line, 7)?;
    let chrom1 = as_str(fields[0], "chrom1")?;
    let start1: u32 = parse_num(fields[1], "start1")?;
    let chrom2 = as_str(fields[3], "chrom2")?;
    let start2: u32 = parse_num(fields[4], "start2")?;
    let count: N = parse_num(fields[6], "count")?;

    Ok(Pixel::new(
        bins.coord_to_bin_id(chrom1, start1)?,
        bins.coord_to_bin_id(chrom2, start2)?,
        count,
    ))
}

pub fn parse_pixel_line<N: Count>(
    line: &[u8],
    format: PixelFormat,
    bins: &BinTable,
) -> Result<Pixel<N>, Bg2ParseError> {
    match format {
        PixelFormat::Bg2 => parse_bg2_line(line, bins),
        PixelFormat::Coo => parse_coo_line(line),
    }
}

/// Turn a BEDPE line into a pair of UCSC queries, e.g.
/// `chr1 0 100 chr2 50 75` becomes `("chr1:0-100", "chr2:50-75")`
pub fn parse_bedpe_query(line: &str) -> Result<(String, String), Bg2ParseError> {
    let fields = split_exact(line.as_bytes(), 6)?;
    let mut queries = Vec::with_capacity(2);
    for (i, chunk) in fields[..6].chunks(3).enumerate() {
        let (chrom, start, end) = if i == 0 {
            ("chrom1", "start1", "end1")
        } else {
            ("chrom2", "start2", "end2")
        };
        let start: u32 = parse_num(chunk[1], start)?;
        let end: u32 = parse_num(chunk[2], end)?;
        queries.push(format!("{}:{}-{}", as_str(chunk[0], chrom)?, start, end));
    }
    let query2 = queries.pop().unwrap_or_default();
    let query1 = queries.pop().unwrap_or_default();
    Ok((query1, query2))
}

/// Write `bin1_id bin2_id count`
#[inline]
pub fn write_coo<W: Write, N: fmt::Display>(out: &mut W, pixel: &Pixel<N>) -> io::Result<()> {
    writeln!(out, "{}\t{}\t{}", pixel.bin1_id(), pixel.bin2_id(), pixel.count)
}

/// Write a pixel as bg2, resolving both bins against `bins`
pub fn write_bg2<W: Write, N: fmt::Display>(
    out: &mut W,
    pixel: &Pixel<N>,
    bins: &BinTable,
) -> io::Result<()> {
    let (bin1, bin2) = pixel
        .coords
        .bins(bins)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(
        out,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        bin1.chrom().name(),
        bin1.start(),
        bin1.end(),
        bin2.chrom().name(),
        bin2.start(),
        bin2.end(),
        pixel.count
    )
}

pub fn write_pixel<W: Write, N: fmt::Display>(
    out: &mut W,
    pixel: &Pixel<N>,
    join: bool,
    bins: &BinTable,
) -> io::Result<()> {
    if join {
        write_bg2(out, pixel, bins)
    } else {
        write_coo(out, pixel)
    }
}
