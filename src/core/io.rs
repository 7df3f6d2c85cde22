//! Text I/O for the command line front-end
//!
//! Inputs may be plain, gzip or bzip2 compressed; the format is picked from
//! the extension first and from the magic bytes otherwise. `-` stands for
//! stdin/stdout.

use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Default buffer size for readers and writers (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Compression of a text input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Plain,
    /// `.gz`
    Gzip,
    /// `.bz2`
    Bzip2,
}

impl CompressionFormat {
    fn from_magic(magic: &[u8]) -> Self {
        match magic {
            [0x1f, 0x8b, ..] => CompressionFormat::Gzip,
            // "BZh"
            [0x42, 0x5a, 0x68, ..] => CompressionFormat::Bzip2,
            _ => CompressionFormat::Plain,
        }
    }

    fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Some(CompressionFormat::Gzip),
            Some("bz2") => Some(CompressionFormat::Bzip2),
            _ => None,
        }
    }
}

/// Detect compression from the file extension or, failing that, its
/// first bytes
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    if let Some(format) = CompressionFormat::from_extension(path) {
        return Ok(format);
    }
    let mut file = File::open(path)?;
    let mut magic = [0u8; 3];
    let n = file.read(&mut magic)?;
    Ok(CompressionFormat::from_magic(&magic[..n]))
}

#[inline]
fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Open a possibly compressed text input
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if is_stdio(path) {
        return Ok(Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            io::stdin(),
        )));
    }
    let format = detect_compression(path)?;
    let file = File::open(path)?;
    log::debug!("reading \"{}\" ({:?})", path.display(), format);
    Ok(match format {
        CompressionFormat::Gzip => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            flate2::read::MultiGzDecoder::new(file),
        )),
        CompressionFormat::Bzip2 => Box::new(BufReader::with_capacity(
            DEFAULT_BUFFER_SIZE,
            bzip2::read::BzDecoder::new(file),
        )),
        CompressionFormat::Plain => Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file)),
    })
}

/// Open a text output; `.gz` paths are gzip compressed
pub fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(BufWriter::with_capacity(
            DEFAULT_BUFFER_SIZE,
            io::stdout().lock(),
        )));
    }
    let file = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, File::create(path)?);
    Ok(match CompressionFormat::from_extension(path) {
        Some(CompressionFormat::Gzip) => {
            Box::new(GzEncoder::new(file, flate2::Compression::default()))
        }
        Some(CompressionFormat::Bzip2) => Box::new(bzip2::write::BzEncoder::new(
            file,
            bzip2::Compression::default(),
        )),
        _ => Box::new(file),
    })
}

/// Line iterator that reuses a buffer to avoid allocations
pub struct LineIterator<R: BufRead> {
    reader: R,
    buffer: String,
    line_number: usize,
}

impl<R: BufRead> LineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(1024),
            line_number: 0,
        }
    }

    /// 1-based number of the line returned last
    #[inline]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next line without its terminator.
    /// Returns None at EOF.
    pub fn next_line(&mut self) -> Option<io::Result<&str>> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }
                self.line_number += 1;
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }
}
