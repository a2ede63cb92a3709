//! Keyed array archives.
//!
//! # Format Overview
//!
//! An archive stores any number of named arrays:
//!
//! ```text
//! ┌──────────────┬────────────────────────────────────────┐
//! │ Header       │ "arfl"[4]  u8: version  u32: count     │
//! ├──────────────┼────────────────────────────────────────┤
//! │ Entry × count│ u32: key length   [u8] key (UTF-8)     │
//! │              │ u8: dtype code    u8: ndims (1 or 2)   │
//! │              │ [u64; ndims] dims                      │
//! │              │ raw element bytes, row-major           │
//! └──────────────┴────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Element bytes are written in host order,
//! so archives are portable between little-endian machines.
//!
//! Every entry read back is checked with `briny`'s [`Validate`] before it is
//! turned into an [`Array`].

use crate::array::{Array, ArrayData};
use crate::backend::DeviceId;
use crate::dtype::DType;
use crate::error::{BlockError, Result};
use briny::prelude::*;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"arfl";
const VERSION: u8 = 1;

/// One named array as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub key: String,
    pub dtype: DType,
    pub dims: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl Validate for ArchiveEntry {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.key.is_empty() || self.dims.is_empty() || self.dims.len() > 2 {
            return Err(ValidationError);
        }
        let elements = self
            .dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or(ValidationError)?;
        if elements.checked_mul(self.dtype.size()) != Some(self.bytes.len()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl ArchiveEntry {
    pub fn from_array(key: &str, array: &Array) -> Self {
        Self {
            key: key.to_owned(),
            dtype: array.dtype(),
            dims: array.dims().to_vec(),
            bytes: array.data().as_bytes().to_vec(),
        }
    }

    pub fn to_array(&self, device: DeviceId) -> Result<Array> {
        Array::new(ArrayData::from_bytes(self.dtype, &self.bytes)?, self.dims.clone(), device)
    }

    /// Rows of the stored array; a 1-D entry is one row.
    pub fn rows(&self) -> usize {
        if self.dims.len() == 2 { self.dims[0] } else { 1 }
    }
}

fn truncated(err: io::Error) -> BlockError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        BlockError::DataFormat("archive is truncated".into())
    } else {
        BlockError::Io(err)
    }
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf[0])
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn to_usize(v: u64) -> Result<usize> {
    usize::try_from(v).map_err(|_| BlockError::DataFormat(format!("dimension {v} is too large")))
}

fn read_entry(r: &mut impl Read) -> Result<ArchiveEntry> {
    let key_len = read_u32(r)? as usize;
    let mut key = vec![0u8; key_len];
    r.read_exact(&mut key).map_err(truncated)?;
    let key = String::from_utf8(key).map_err(|_| BlockError::DataFormat("key is not UTF-8".into()))?;

    let dtype = DType::try_from(read_u8(r)?)?;
    let ndims = read_u8(r)?;
    if !(1..=2).contains(&ndims) {
        return Err(BlockError::DataFormat(format!("entry \"{key}\" has {ndims} dims")));
    }
    let dims = (0..ndims)
        .map(|_| read_u64(r).and_then(to_usize))
        .collect::<Result<Vec<usize>>>()?;
    let len = dims
        .iter()
        .try_fold(dtype.size(), |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| BlockError::DataFormat(format!("entry \"{key}\" is too large")))?;
    let mut bytes = Vec::new();
    r.take(len as u64).read_to_end(&mut bytes)?;

    let malformed = BlockError::DataFormat(format!("entry \"{key}\" is malformed"));
    let trusted = TrustedData::new(ArchiveEntry { key, dtype, dims, bytes }).map_err(|_| malformed)?;
    Ok(trusted.into_inner())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => BlockError::FileNotFound(path.display().to_string()),
        _ => BlockError::Io(err),
    })
}

/// Reads every entry of the archive at `path`.
///
/// # Errors
/// - [`BlockError::FileNotFound`] when `path` does not exist
/// - [`BlockError::DataFormat`] on a bad header, truncation or malformed entry
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<ArchiveEntry>> {
    let path = path.as_ref();
    let mut file = BufReader::new(open(path)?);

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).map_err(truncated)?;
    if &magic != MAGIC {
        return Err(BlockError::DataFormat(format!("{} is not an array archive", path.display())));
    }
    let version = read_u8(&mut file)?;
    if version != VERSION {
        return Err(BlockError::DataFormat(format!("unsupported archive version {version}")));
    }
    let count = read_u32(&mut file)?;
    (0..count).map(|_| read_entry(&mut file)).collect()
}

fn write_entries(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let count = u32::try_from(entries.len())
        .map_err(|_| BlockError::invalid("too many archive entries"))?;
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(MAGIC)?;
    file.write_all(&[VERSION])?;
    file.write_all(&count.to_le_bytes())?;
    for entry in entries {
        let key_len = u32::try_from(entry.key.len())
            .map_err(|_| BlockError::invalid("archive key is too long"))?;
        file.write_all(&key_len.to_le_bytes())?;
        file.write_all(entry.key.as_bytes())?;
        file.write_all(&[entry.dtype as u8, entry.dims.len() as u8])?;
        for &d in &entry.dims {
            file.write_all(&(d as u64).to_le_bytes())?;
        }
        file.write_all(&entry.bytes)?;
    }
    file.flush()?;
    Ok(())
}

/// Position of `key` among the archive's entries.
pub fn find_key(path: impl AsRef<Path>, key: &str) -> Result<Option<usize>> {
    Ok(read_entries(path)?.iter().position(|e| e.key == key))
}

/// Loads the array stored under `key`, tagged with `device`.
///
/// # Errors
/// - [`BlockError::NotFound`] when no entry has that key
pub fn read_array(path: impl AsRef<Path>, key: &str, device: DeviceId) -> Result<Array> {
    let path = path.as_ref();
    read_entries(path)?
        .into_iter()
        .find(|e| e.key == key)
        .ok_or_else(|| BlockError::NotFound(format!("key \"{key}\" in {}", path.display())))?
        .to_array(device)
}

/// Joins `extra` onto the end of every row of `existing`.
fn concat_columns(existing: &ArchiveEntry, extra: &Array) -> Result<ArchiveEntry> {
    if existing.dtype != extra.dtype() {
        return Err(BlockError::invalid(format!(
            "cannot append {} to \"{}\" of type {}",
            extra.dtype(),
            existing.key,
            existing.dtype
        )));
    }
    if existing.rows() != extra.rows() {
        return Err(BlockError::invalid(format!(
            "cannot append {} rows to \"{}\" with {} rows",
            extra.rows(),
            existing.key,
            existing.rows()
        )));
    }
    let old = existing.to_array(extra.device())?;
    let joined = if old.numdims() == 1 && extra.numdims() == 1 {
        Array::from_data(ArrayData::concat(&[old.data(), extra.data()])?, extra.device())
    } else {
        let rows = old
            .row_arrays()?
            .iter()
            .zip(extra.row_arrays()?)
            .map(|(a, b)| Ok(Array::from_data(ArrayData::concat(&[a.data(), b.data()])?, a.device())))
            .collect::<Result<Vec<Array>>>()?;
        Array::stack_rows(&rows)?
    };
    Ok(ArchiveEntry::from_array(&existing.key, &joined))
}

/// Stores `array` under `key`.
///
/// Without `append` the file is replaced by a one-entry archive. With
/// `append` the entry is added to an existing archive, or joined onto an
/// existing entry of the same key along the element axis.
pub fn save_array(path: impl AsRef<Path>, key: &str, array: &Array, append: bool) -> Result<()> {
    let path = path.as_ref();
    if key.is_empty() {
        return Err(BlockError::invalid("archive key cannot be empty"));
    }
    let mut entries = if append && path.exists() { read_entries(path)? } else { Vec::new() };
    match entries.iter().position(|e| e.key == key) {
        Some(i) => entries[i] = concat_columns(&entries[i], array)?,
        None => entries.push(ArchiveEntry::from_array(key, array)),
    }
    log::debug!("saving \"{key}\" ({} {}) to {}", array.elements(), array.dtype(), path.display());
    write_entries(path, &entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.arfl");
        let a = Array::from_rows(vec![vec![1i16, 2], vec![3, 4]], DeviceId::CPU).unwrap();
        save_array(&path, "a", &a, false).unwrap();
        assert_eq!(read_array(&path, "a", DeviceId::CPU).unwrap(), a);
        assert_eq!(find_key(&path, "a").unwrap(), Some(0));
        assert_eq!(find_key(&path, "b").unwrap(), None);
        assert!(matches!(read_array(&path, "b", DeviceId::CPU), Err(BlockError::NotFound(_))));
    }

    #[test]
    fn append_joins_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.arfl");
        let a = Array::from_rows(vec![vec![1.0f32, 2.0], vec![3.0, 4.0]], DeviceId::CPU).unwrap();
        let b = Array::from_rows(vec![vec![5.0f32], vec![6.0]], DeviceId::CPU).unwrap();
        save_array(&path, "x", &a, false).unwrap();
        save_array(&path, "x", &b, true).unwrap();
        save_array(&path, "y", &b, true).unwrap();

        let x = read_array(&path, "x", DeviceId::CPU).unwrap();
        assert_eq!(x.dims(), &[2, 3]);
        assert_eq!(x.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 5.0, 3.0, 4.0, 6.0]);
        assert_eq!(read_entries(&path).unwrap().len(), 2);

        let wrong = Array::from_vec(vec![1i32], DeviceId::CPU);
        assert!(save_array(&path, "x", &wrong, true).is_err());
    }

    #[test]
    fn rejects_foreign_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        assert!(matches!(read_entries(&path), Err(BlockError::FileNotFound(_))));
        std::fs::write(&path, b"nope, not an archive").unwrap();
        assert!(matches!(read_entries(&path), Err(BlockError::DataFormat(_))));
        std::fs::write(&path, b"arfl\x01\x01\x00\x00\x00").unwrap();
        assert!(matches!(read_entries(&path), Err(BlockError::DataFormat(_))));
    }

    #[test]
    fn short_payload_fails_validation() {
        let entry = ArchiveEntry { key: "k".into(), dtype: DType::Float64, dims: vec![2], bytes: vec![0; 8] };
        assert!(entry.validate().is_err());
    }
}
