//! One-dimensional HDF5 datasets
//!
//! [`Dataset`] wraps an extendable, chunked, deflate-compressed 1-D dataset.
//! [`DatasetCursor`] turns it into a random-access cursor backed by an
//! in-memory window that is refilled lazily on dereference.

use super::error::{CoolerError, Result};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Group, H5Type};
use ndarray::{s, ArrayView1};
use std::sync::Arc;

/// Default HDF5 chunk size in bytes
pub const DEFAULT_HDF5_CHUNK_SIZE: usize = 1024 * 1024;

/// Default deflate level
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// Number of elements held by a cursor window
pub const DEFAULT_CURSOR_CAPACITY: usize = 32 * 1024;

/// Strings are flushed in batches of this many elements
pub const STRING_WRITE_BUFFER_LEN: usize = 256;

/// Numeric writes are flushed in batches of this many bytes
pub const NUMERIC_WRITE_BUFFER_BYTES: usize = 64 * 1024 * 1024;

/// Widest chromosome name we can round-trip through `chroms/name`
pub const MAX_STRING_WIDTH: usize = 256;

type NameBuf = FixedAscii<MAX_STRING_WIDTH>;

/// Number of elements buffered before an append is issued
#[inline]
pub fn write_buffer_len<T>() -> usize {
    (NUMERIC_WRITE_BUFFER_BYTES / std::mem::size_of::<T>().max(1)).max(1)
}

/// Storage options shared by every dataset of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetOptions {
    pub compression_level: u8,
    pub chunk_size: usize,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_HDF5_CHUNK_SIZE,
        }
    }
}

impl DatasetOptions {
    fn chunk_len(&self, elem_size: usize) -> usize {
        (self.chunk_size / elem_size.max(1)).max(1)
    }
}

/// Handle to a 1-D dataset addressed by its path relative to the Cooler root
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    inner: hdf5::Dataset,
}

impl Dataset {
    pub fn open(root: &Group, name: &str) -> Result<Self> {
        let inner = root.dataset(name)?;
        Ok(Self {
            name: name.to_string(),
            inner,
        })
    }

    /// Create an empty, extendable dataset of `T`
    pub fn create<T: H5Type>(root: &Group, name: &str, opts: &DatasetOptions) -> Result<Self> {
        let mut builder = root
            .new_dataset::<T>()
            .shape((0..,))
            .chunk((opts.chunk_len(std::mem::size_of::<T>()),));
        if opts.compression_level > 0 {
            builder = builder.deflate(opts.compression_level);
        }
        let inner = builder.create(name)?;
        log::debug!("created dataset \"{}\"", name);
        Ok(Self {
            name: name.to_string(),
            inner,
        })
    }

    /// Create an empty, extendable dataset whose type is only known at runtime
    pub fn create_as(
        root: &Group,
        name: &str,
        desc: &TypeDescriptor,
        opts: &DatasetOptions,
    ) -> Result<Self> {
        let mut builder = root
            .new_dataset_builder()
            .empty_as(desc)
            .shape((0..,))
            .chunk((opts.chunk_len(desc.size()),));
        if opts.compression_level > 0 {
            builder = builder.deflate(opts.compression_level);
        }
        let inner = builder.create(name)?;
        log::debug!("created dataset \"{}\" ({:?})", name, desc);
        Ok(Self {
            name: name.to_string(),
            inner,
        })
    }

    /// Create a NUL-padded fixed-width ASCII dataset
    pub fn create_fixed_str(
        root: &Group,
        name: &str,
        width: usize,
        opts: &DatasetOptions,
    ) -> Result<Self> {
        let width = width.clamp(1, MAX_STRING_WIDTH);
        Self::create_as(root, name, &TypeDescriptor::FixedAscii(width), opts)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.inner.size() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn inner(&self) -> &hdf5::Dataset {
        &self.inner
    }

    pub fn type_descriptor(&self) -> Result<TypeDescriptor> {
        Ok(self.inner.dtype()?.to_descriptor()?)
    }

    /// Read `[start, end)`
    pub fn read_range<T: H5Type>(&self, start: u64, end: u64) -> Result<Vec<T>> {
        let size = self.len();
        if start > end || end > size {
            return Err(CoolerError::OutOfBounds {
                dataset: self.name.clone(),
                offset: end,
                size,
            });
        }
        if start == end {
            return Ok(Vec::new());
        }
        let data = self
            .inner
            .read_slice_1d::<T, _>(start as usize..end as usize)?;
        Ok(data.to_vec())
    }

    pub fn read_all<T: H5Type>(&self) -> Result<Vec<T>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.inner.read_raw::<T>()?)
    }

    /// Read a string column regardless of its fixed/variable width encoding
    pub fn read_strings(&self) -> Result<Vec<String>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let strings = match self.type_descriptor()? {
            TypeDescriptor::FixedAscii(_) => self
                .inner
                .read_raw::<NameBuf>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            TypeDescriptor::FixedUnicode(_) => self
                .inner
                .read_raw::<FixedUnicode<MAX_STRING_WIDTH>>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            TypeDescriptor::VarLenAscii => self
                .inner
                .read_raw::<VarLenAscii>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            TypeDescriptor::VarLenUnicode => self
                .inner
                .read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
            other => {
                return Err(CoolerError::CorruptDataset {
                    uri: self.name.clone(),
                    message: format!("expected a string dataset, found {:?}", other),
                })
            }
        };
        Ok(strings)
    }

    /// Append `data` after the last element, growing the dataset
    pub fn append<T: H5Type>(&self, data: &[T]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let offset = self.inner.size();
        let new_len = offset + data.len();
        self.inner.resize((new_len,))?;
        let view = ArrayView1::from(data);
        self.inner.write_slice(view, s![offset..new_len])?;
        Ok(())
    }

    /// Append in batches of [`write_buffer_len`] elements
    pub fn append_buffered<T, I>(&self, values: I) -> Result<u64>
    where
        T: H5Type,
        I: IntoIterator<Item = T>,
    {
        let capacity = write_buffer_len::<T>();
        let mut buffer = Vec::with_capacity(capacity.min(1 << 16));
        let mut written = 0u64;
        for value in values {
            buffer.push(value);
            if buffer.len() == capacity {
                self.append(&buffer)?;
                written += buffer.len() as u64;
                buffer.clear();
            }
        }
        self.append(&buffer)?;
        written += buffer.len() as u64;
        Ok(written)
    }

    /// Append strings in batches of [`STRING_WRITE_BUFFER_LEN`]
    pub fn append_strings<'a, I>(&self, values: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut buffer: Vec<NameBuf> = Vec::with_capacity(STRING_WRITE_BUFFER_LEN);
        let mut written = 0u64;
        for value in values {
            let encoded = NameBuf::from_ascii(value).map_err(|e| {
                hdf5::Error::from(format!("unable to encode \"{}\": {}", value, e))
            })?;
            buffer.push(encoded);
            if buffer.len() == STRING_WRITE_BUFFER_LEN {
                self.append(&buffer)?;
                written += buffer.len() as u64;
                buffer.clear();
            }
        }
        self.append(&buffer)?;
        written += buffer.len() as u64;
        Ok(written)
    }

    pub fn cursor<T: H5Type + Copy>(&self, offset: u64) -> DatasetCursor<T> {
        DatasetCursor::new(self, offset, DEFAULT_CURSOR_CAPACITY)
    }

    pub fn end_cursor<T: H5Type + Copy>(&self) -> DatasetCursor<T> {
        DatasetCursor::new(self, self.len(), DEFAULT_CURSOR_CAPACITY)
    }
}

/// Random-access cursor over a [`Dataset`].
///
/// Moving the cursor only updates its offset. The first dereference outside
/// the cached window reads `min(capacity, len - offset)` elements starting at
/// the offset. Stepping before the window re-anchors it so that the current
/// element becomes the last element of the new window. Cloned cursors share
/// the window until one of them reads a new chunk.
#[derive(Debug, Clone)]
pub struct DatasetCursor<T> {
    name: Arc<str>,
    dataset: hdf5::Dataset,
    size: u64,
    capacity: usize,
    buffer: Option<Arc<Vec<T>>>,
    buffer_start: u64,
    offset: u64,
}

impl<T: H5Type + Copy> DatasetCursor<T> {
    pub fn new(dataset: &Dataset, offset: u64, capacity: usize) -> Self {
        let size = dataset.len();
        Self {
            name: Arc::from(dataset.name()),
            dataset: dataset.inner.clone(),
            size,
            capacity: capacity.max(1).min(size.max(1) as usize),
            buffer: None,
            buffer_start: offset.min(size),
            offset: offset.min(size),
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[inline]
    pub fn dataset_len(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.offset >= self.size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Window currently held, as `(start, len)`
    pub fn window(&self) -> Option<(u64, usize)> {
        self.buffer.as_ref().map(|b| (self.buffer_start, b.len()))
    }

    #[inline]
    pub fn advance(&mut self, n: u64) {
        self.offset = (self.offset + n).min(self.size);
    }

    #[inline]
    pub fn retreat(&mut self, n: u64) {
        self.offset = self.offset.saturating_sub(n);
    }

    #[inline]
    pub fn seek(&mut self, offset: u64) {
        self.offset = offset.min(self.size);
    }

    /// Signed distance `self - other`
    #[inline]
    pub fn distance(&self, other: &Self) -> i64 {
        self.offset as i64 - other.offset as i64
    }

    /// Element under the cursor
    pub fn get(&mut self) -> Result<T> {
        if self.offset >= self.size {
            return Err(CoolerError::OutOfBounds {
                dataset: self.name.to_string(),
                offset: self.offset,
                size: self.size,
            });
        }

        match self.buffer.as_ref().map(|b| b.len() as u64) {
            None => self.read_chunk_at(self.offset)?,
            Some(_) if self.offset < self.buffer_start => {
                let start = self.offset - (self.capacity as u64 - 1).min(self.offset);
                self.read_chunk_at(start)?;
            }
            Some(len) if self.offset >= self.buffer_start + len => {
                self.read_chunk_at(self.offset)?;
            }
            Some(_) => {}
        }

        let idx = (self.offset - self.buffer_start) as usize;
        self.buffer
            .as_ref()
            .and_then(|b| b.get(idx).copied())
            .ok_or_else(|| CoolerError::OutOfBounds {
                dataset: self.name.to_string(),
                offset: self.offset,
                size: self.size,
            })
    }

    /// Seek to `offset` and dereference
    #[inline]
    pub fn value_at(&mut self, offset: u64) -> Result<T> {
        self.seek(offset);
        self.get()
    }

    fn read_chunk_at(&mut self, start: u64) -> Result<()> {
        let end = (start + self.capacity as u64).min(self.size);
        let data = self
            .dataset
            .read_slice_1d::<T, _>(start as usize..end as usize)?
            .to_vec();
        log::trace!("{}: read [{}, {})", self.name, start, end);
        self.buffer = Some(Arc::new(data));
        self.buffer_start = start;
        Ok(())
    }
}

impl<T: H5Type + Copy> Iterator for DatasetCursor<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_end() {
            return None;
        }
        let value = self.get();
        self.advance(1);
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.size - self.offset) as usize;
        (n, Some(n))
    }
}

impl<T> PartialEq for DatasetCursor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl<T> PartialOrd for DatasetCursor<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.offset.partial_cmp(&other.offset)
    }
}

/// First position in `[lo, hi)` whose value is not less than `value`
pub fn lower_bound<T>(cursor: &mut DatasetCursor<T>, lo: u64, hi: u64, value: T) -> Result<u64>
where
    T: H5Type + Copy + PartialOrd,
{
    let mut first = lo;
    let mut count = hi.saturating_sub(lo);
    while count > 0 {
        let step = count / 2;
        let mid = first + step;
        if cursor.value_at(mid)? < value {
            first = mid + 1;
            count -= step + 1;
        } else {
            count = step;
        }
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn numbers(n: u64) -> (tempfile::TempDir, Dataset) {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("test.h5")).unwrap();
        let opts = DatasetOptions {
            chunk_size: 64,
            ..Default::default()
        };
        let ds = Dataset::create::<u64>(&file, "values", &opts).unwrap();
        ds.append_buffered(0..n).unwrap();
        (dir, ds)
    }

    #[test]
    fn test_append_and_read() {
        let (_dir, ds) = numbers(1000);
        assert_eq!(ds.len(), 1000);
        assert_eq!(ds.read_range::<u64>(10, 13).unwrap(), vec![10, 11, 12]);
        assert_eq!(ds.read_all::<u64>().unwrap().len(), 1000);
        assert!(ds.read_range::<u64>(990, 1001).is_err());
    }

    #[test]
    fn test_cursor_forward_reads_lazily() {
        let (_dir, ds) = numbers(1000);
        let mut cursor: DatasetCursor<u64> = DatasetCursor::new(&ds, 0, 100);
        assert!(cursor.window().is_none());
        assert_eq!(cursor.get().unwrap(), 0);
        assert_eq!(cursor.window(), Some((0, 100)));

        cursor.advance(150);
        assert_eq!(cursor.get().unwrap(), 150);
        assert_eq!(cursor.window(), Some((150, 100)));

        cursor.seek(950);
        assert_eq!(cursor.get().unwrap(), 950);
        assert_eq!(cursor.window(), Some((950, 50)));
    }

    #[test]
    fn test_cursor_backward_reanchors() {
        let (_dir, ds) = numbers(1000);
        let mut cursor: DatasetCursor<u64> = DatasetCursor::new(&ds, 500, 100);
        assert_eq!(cursor.get().unwrap(), 500);
        cursor.retreat(1);
        assert_eq!(cursor.get().unwrap(), 499);
        assert_eq!(cursor.window(), Some((400, 100)));

        cursor.seek(30);
        assert_eq!(cursor.get().unwrap(), 30);
        assert_eq!(cursor.window(), Some((0, 100)));
    }

    #[test]
    fn test_cursor_end_and_distance() {
        let (_dir, ds) = numbers(10);
        let begin = ds.cursor::<u64>(0);
        let mut end = ds.end_cursor::<u64>();
        assert!(end.is_end());
        assert!(end.get().is_err());
        assert_eq!(end.distance(&begin), 10);
        assert!(begin < end);

        let values: Vec<u64> = begin.map(|v| v.unwrap()).collect();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_cloned_cursors_diverge() {
        let (_dir, ds) = numbers(1000);
        let mut a: DatasetCursor<u64> = DatasetCursor::new(&ds, 0, 64);
        assert_eq!(a.get().unwrap(), 0);
        let mut b = a.clone();
        b.advance(700);
        assert_eq!(b.get().unwrap(), 700);
        assert_eq!(a.get().unwrap(), 0);
        assert_eq!(a.window(), Some((0, 64)));
    }

    #[test]
    fn test_lower_bound() {
        let (_dir, ds) = numbers(1000);
        let mut cursor = ds.cursor::<u64>(0);
        assert_eq!(lower_bound(&mut cursor, 0, 1000, 123).unwrap(), 123);
        assert_eq!(lower_bound(&mut cursor, 200, 300, 123).unwrap(), 200);
        assert_eq!(lower_bound(&mut cursor, 0, 100, 500).unwrap(), 100);
        assert_eq!(lower_bound(&mut cursor, 5, 5, 0).unwrap(), 5);
    }

    #[test]
    fn test_strings() {
        let dir = tempdir().unwrap();
        let file = hdf5::File::create(dir.path().join("test.h5")).unwrap();
        let ds = Dataset::create_fixed_str(&file, "names", 5, &DatasetOptions::default()).unwrap();
        let names: Vec<String> = (0..600).map(|i| format!("c{}", i)).collect();
        ds.append_strings(names.iter().map(|s| s.as_str())).unwrap();
        assert_eq!(ds.read_strings().unwrap(), names);
    }
}
