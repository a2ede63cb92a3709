//! Archive-backed file source and sink.
//!
//! Both blocks read and write the keyed format in [`crate::archive`].
//! Every path check happens at construction, so a block that was built
//! successfully can only fail later on I/O errors.

use crate::archive;
use crate::array::{Array, ArrayData};
use crate::block::{ArrayBlock, Block, single_arg, unknown_call};
use crate::buffer::BufferChunk;
use crate::dtype::{DType, DTypeSupport, validate_dtype};
use crate::error::{BlockError, Result};
use crate::value::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Posts the array stored under `key`: a 1-D array on one output, a 2-D
/// array row by row on one output per row.
///
/// The contents are posted once, or on every `work()` when `repeat` is set.
pub struct FileSourceBlock {
    base: ArrayBlock,
    path: PathBuf,
    key: String,
    repeat: bool,
    contents: Array,
    posted: bool,
}

impl FileSourceBlock {
    /// # Errors
    /// - [`BlockError::FileNotFound`] when `path` does not exist
    /// - [`BlockError::DataFormat`] when it is not a valid archive
    /// - [`BlockError::InvalidArgument`] when it has no entry `key`
    pub fn new(device: &str, path: impl AsRef<Path>, key: &str, repeat: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(BlockError::FileNotFound(path.display().to_string()));
        }
        if archive::find_key(&path, key)?.is_none() {
            return Err(BlockError::invalid(format!("Could not find key in array archive: {key}")));
        }
        let mut base = ArrayBlock::new("file_source", device)?;
        let contents = archive::read_array(&path, key, base.device_id())?;
        validate_dtype(contents.dtype(), DTypeSupport::ALL)?;
        let outputs = if contents.numdims() == 1 { 1 } else { contents.rows() };
        for _ in 0..outputs {
            base.setup_output(contents.dtype());
        }
        log::debug!("{}: \"{key}\" is {:?} {}", path.display(), contents.dims(), contents.dtype());
        Ok(Self { base, path, key: key.to_owned(), repeat, contents, posted: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }
}

impl Block for FileSourceBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        self.base.begin_work()?;
        if (self.posted && !self.repeat) || self.contents.elements() == 0 {
            return Ok(());
        }
        if self.contents.numdims() == 1 {
            self.base.post_array(0, &self.contents)?;
        } else {
            self.base.post_2d_array_to_numbered_outputs(&self.contents)?;
        }
        self.posted = true;
        Ok(())
    }

    fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        match name {
            "getFilepath" => Ok(Value::from(self.path.display().to_string())),
            "getKey" => Ok(Value::from(self.key.as_str())),
            "getRepeat" => Ok(Value::Bool(self.repeat)),
            "setRepeat" => {
                self.set_repeat(single_arg(name, args)?.as_bool()?);
                Ok(Value::Null)
            }
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

/// Accumulates every input and writes one `[nchans, elems]` array under
/// `key` when deactivated. Shorter channels are zero-padded to the longest.
pub struct FileSinkBlock {
    base: ArrayBlock,
    path: PathBuf,
    key: String,
    append: bool,
    dtype: DType,
    buffers: Vec<BufferChunk>,
}

fn check_existing(path: &Path, key: &str, dtype: DType, nchans: usize, append: bool) -> Result<()> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() {
        return Err(BlockError::FileAccess(format!(
            "This path is valid but does not correspond to a regular file: {}",
            path.display()
        )));
    }
    if meta.permissions().readonly() {
        return Err(BlockError::FileAccess(format!("{} is read-only", path.display())));
    }
    let entries = archive::read_entries(path).map_err(|err| match err {
        BlockError::DataFormat(_) => {
            BlockError::DataFormat(format!("{} exists but is not a valid array archive", path.display()))
        }
        other => other,
    })?;
    if !append {
        return Ok(());
    }
    if let Some(existing) = entries.iter().find(|e| e.key == key) {
        if existing.rows() != nchans || existing.dtype != dtype {
            return Err(BlockError::DataFormat(format!(
                "Cannot append to the existing array ({}, {} chans); input: {dtype}, {nchans} chans",
                existing.dtype,
                existing.rows()
            )));
        }
    }
    Ok(())
}

fn check_parent(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let meta = fs::metadata(parent).map_err(|_| BlockError::FileNotFound(parent.display().to_string()))?;
    if !meta.is_dir() || meta.permissions().readonly() {
        return Err(BlockError::FileAccess(format!(
            "Cannot write a file to the parent directory: {}",
            path.display()
        )));
    }
    Ok(())
}

impl FileSinkBlock {
    /// # Errors
    /// - [`BlockError::FileAccess`] when `path` is not a writable regular file
    ///   or its directory is not writable
    /// - [`BlockError::DataFormat`] when an existing file is not an archive, or
    ///   appending would change the stored entry's type or channel count
    pub fn new(device: &str, path: impl AsRef<Path>, key: &str, dtype: DType, nchans: usize, append: bool) -> Result<Self> {
        validate_dtype(dtype, DTypeSupport::ALL)?;
        if key.is_empty() {
            return Err(BlockError::invalid("key cannot be empty"));
        }
        if nchans == 0 {
            return Err(BlockError::invalid("numChannels must be >= 1."));
        }
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            check_existing(&path, key, dtype, nchans, append)?;
        } else {
            check_parent(&path)?;
        }
        let mut base = ArrayBlock::new("file_sink", device)?;
        for _ in 0..nchans {
            base.setup_input(dtype);
        }
        let buffers = vec![BufferChunk::empty(dtype); nchans];
        Ok(Self { base, path, key: key.to_owned(), append, dtype, buffers })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn append(&self) -> bool {
        self.append
    }

    /// The accumulated channels as one zero-padded 2-D array.
    fn padded(&self) -> Result<Array> {
        let cols = self.buffers.iter().map(BufferChunk::elements).max().unwrap_or(0);
        let rows = self
            .buffers
            .iter()
            .map(|chunk| {
                let data = ArrayData::from_bytes(self.dtype, chunk.as_bytes())?;
                ArrayData::concat(&[&data, &ArrayData::zeros(self.dtype, cols - chunk.elements())])
            })
            .collect::<Result<Vec<ArrayData>>>()?;
        let parts: Vec<&ArrayData> = rows.iter().collect();
        Array::new(ArrayData::concat(&parts)?, vec![self.buffers.len(), cols], self.base.device_id())
    }
}

impl Block for FileSinkBlock {
    fn base(&self) -> &ArrayBlock {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ArrayBlock {
        &mut self.base
    }

    fn work(&mut self) -> Result<()> {
        self.base.begin_work()?;
        for (port, acc) in self.buffers.iter_mut().enumerate() {
            let input = self.base.input_mut(port)?;
            let pending = input.elements();
            if pending > 0 {
                acc.append(input.buffer())?;
                input.consume(pending)?;
            }
        }
        Ok(())
    }

    fn deactivate(&mut self) -> Result<()> {
        self.base.deactivate();
        if self.buffers.iter().all(BufferChunk::is_empty) {
            log::debug!("{}: nothing to save under \"{}\"", self.path.display(), self.key);
            return Ok(());
        }
        let array = self.padded()?;
        archive::save_array(&self.path, &self.key, &array, self.append)?;
        for acc in &mut self.buffers {
            *acc = BufferChunk::empty(self.dtype);
        }
        Ok(())
    }

    fn call(&mut self, name: &str, _args: &[Value]) -> Result<Value> {
        match name {
            "getFilepath" => Ok(Value::from(self.path.display().to_string())),
            "getKey" => Ok(Value::from(self.key.as_str())),
            "getAppend" => Ok(Value::Bool(self.append)),
            _ => Err(unknown_call(&self.base, name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DeviceId;
    use crate::config::AUTO_DEVICE;

    #[test]
    fn sink_pads_short_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.arfl");
        let mut sink = FileSinkBlock::new(AUTO_DEVICE, &path, "x", DType::Int32, 2, false).unwrap();
        sink.activate().unwrap();
        sink.input(0).unwrap().push(&BufferChunk::from_slice(&[1i32, 2, 3])).unwrap();
        sink.input(1).unwrap().push(&BufferChunk::from_slice(&[4i32])).unwrap();
        sink.work().unwrap();
        sink.input(1).unwrap().push(&BufferChunk::from_slice(&[5i32])).unwrap();
        sink.work().unwrap();
        sink.deactivate().unwrap();

        let saved = archive::read_array(&path, "x", DeviceId::CPU).unwrap();
        assert_eq!(saved.dims(), &[2, 3]);
        assert_eq!(saved.to_vec::<i32>().unwrap(), vec![1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn source_posts_once_unless_repeating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.arfl");
        let rows = Array::from_rows(vec![vec![1.0f64, 2.0], vec![3.0, 4.0]], DeviceId::CPU).unwrap();
        archive::save_array(&path, "rows", &rows, false).unwrap();

        let mut source = FileSourceBlock::new(AUTO_DEVICE, &path, "rows", false).unwrap();
        assert_eq!(source.base().outputs().len(), 2);
        source.activate().unwrap();
        source.work().unwrap();
        source.work().unwrap();
        assert_eq!(source.output(1).unwrap().collect_vec::<f64>().unwrap(), vec![3.0, 4.0]);

        source.call("setRepeat", &[Value::Bool(true)]).unwrap();
        source.work().unwrap();
        assert_eq!(source.output(0).unwrap().collect_vec::<f64>().unwrap(), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn construction_checks() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.arfl");
        assert!(matches!(
            FileSourceBlock::new(AUTO_DEVICE, &missing, "k", false),
            Err(BlockError::FileNotFound(_))
        ));
        assert!(matches!(
            FileSinkBlock::new(AUTO_DEVICE, dir.path(), "k", DType::Float32, 1, false),
            Err(BlockError::FileAccess(_))
        ));
        assert!(matches!(
            FileSinkBlock::new(AUTO_DEVICE, dir.path().join("no/such/dir/x.arfl"), "k", DType::Float32, 1, false),
            Err(BlockError::FileNotFound(_))
        ));

        let junk = dir.path().join("junk.arfl");
        std::fs::write(&junk, b"not an archive").unwrap();
        assert!(matches!(
            FileSinkBlock::new(AUTO_DEVICE, &junk, "k", DType::Float32, 1, true),
            Err(BlockError::DataFormat(_))
        ));
    }
}
