//! The growable, file-backed memory mapping a [`super::LogSink`] appends
//! records into.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::errors::LogSinkError;

const INITIAL_FILE_SIZE: u64 = 1024 * 1024;
const EXPANSION_STEP: u64 = 128 * 1024 * 1024;
const HIGH_WATER_NUMERATOR: u64 = 9;
const HIGH_WATER_DENOMINATOR: u64 = 10;

/// Bytes `[0, write_offset)` are authoritative, newline-terminated log
/// content; bytes `[write_offset, mapped_size)` are reserve.
pub struct MappedLog {
    path: PathBuf,
    file: File,
    mmap: MmapMut,
    mapped_size: u64,
    write_offset: u64,
}

impl MappedLog {
    pub fn open(path: &Path) -> Result<Self, LogSinkError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|source| LogSinkError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        file.set_len(INITIAL_FILE_SIZE)
            .map_err(|source| LogSinkError::Truncate {
                path: path.to_path_buf(),
                size: INITIAL_FILE_SIZE,
                source,
            })?;

        // SAFETY: the file is owned exclusively by this LogSink for its lifetime;
        // nothing else truncates or writes to it concurrently.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| LogSinkError::Map {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            mmap,
            mapped_size: INITIAL_FILE_SIZE,
            write_offset: 0,
        })
    }

    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Grows the mapping if `required` bytes would cross the 90% high-water
    /// mark of the current mapping, in fixed `EXPANSION_STEP` increments.
    pub fn ensure_capacity(&mut self, required: u64) -> Result<(), LogSinkError> {
        let threshold = self.mapped_size * HIGH_WATER_NUMERATOR / HIGH_WATER_DENOMINATOR;
        if required < threshold {
            return Ok(());
        }

        let mut new_size = self.mapped_size;
        while new_size <= required {
            new_size += EXPANSION_STEP;
        }

        self.file
            .set_len(new_size)
            .map_err(|source| LogSinkError::Truncate {
                path: self.path.clone(),
                size: new_size,
                source,
            })?;

        self.mmap.flush().map_err(|source| LogSinkError::Map {
            path: self.path.clone(),
            source,
        })?;

        // SAFETY: same invariant as `open` — exclusive ownership of the file.
        let mmap = unsafe { MmapMut::map_mut(&self.file) }.map_err(|source| LogSinkError::Map {
            path: self.path.clone(),
            source,
        })?;

        self.mmap = mmap;
        self.mapped_size = new_size;
        let _ = self.mmap.advise(memmap2::Advice::Sequential);

        Ok(())
    }

    /// Appends one record and its newline terminator. Caller must have
    /// already called `ensure_capacity` for `record.len() + 1` bytes.
    pub fn append_record(&mut self, record: &str) {
        let start = self.write_offset as usize;
        let bytes = record.as_bytes();
        self.mmap[start..start + bytes.len()].copy_from_slice(bytes);
        self.mmap[start + bytes.len()] = b'\n';
        self.write_offset += (bytes.len() + 1) as u64;
    }

    pub fn flush_async(&self) {
        let _ = self.mmap.flush_async_range(0, self.write_offset as usize);
    }

    pub fn flush_sync(&self) {
        let _ = self.mmap.flush_range(0, self.write_offset as usize);
    }

    /// Truncates the backing file to exactly `write_offset`, dropping
    /// trailing reserve bytes. Only safe to call on shutdown.
    pub fn truncate_to_write_offset(&self) {
        let _ = self.file.set_len(self.write_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_advances_write_offset_by_len_plus_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut log = MappedLog::open(&path).unwrap();

        log.ensure_capacity(32).unwrap();
        log.append_record("[QUERY] SELECT 1;");

        assert_eq!(log.write_offset(), "[QUERY] SELECT 1;".len() as u64 + 1);
    }

    #[test]
    fn growth_preserves_previously_written_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut log = MappedLog::open(&path).unwrap();

        log.ensure_capacity(32).unwrap();
        log.append_record("hello");
        let offset_before = log.write_offset();

        // Force growth by requiring more than 90% of the (small, post-growth) mapping.
        log.ensure_capacity(INITIAL_FILE_SIZE).unwrap();

        assert_eq!(log.write_offset(), offset_before);
        assert_eq!(&log.mmap[0..5], b"hello");
    }

    #[test]
    fn truncate_drops_reserve_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut log = MappedLog::open(&path).unwrap();
        log.ensure_capacity(32).unwrap();
        log.append_record("hi");
        log.truncate_to_write_offset();

        let metadata = std::fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), log.write_offset());
    }
}
