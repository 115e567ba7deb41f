//! Checkpoint file lifecycle: create, map, flush, release.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use hs_core::ensure_len;
use hs_model::{GridModel, TransientState};
use memmap2::MmapMut;
use tracing::{debug, warn};

use crate::codec::{HEADER_BYTES, Header, HeaderError, Layout, MAGIC};
use crate::{CheckpointError, CheckpointResult};

/// A checkpoint mapped read-write for the lifetime of one invocation.
///
/// Holds an exclusive lock on the file. The solver mutates the payload in
/// place through [`TransientState`]; nothing reaches stable storage before
/// [`flush`](Self::flush).
pub struct MappedCheckpoint {
    path: PathBuf,
    file: File,
    map: MmapMut,
    layout: Layout,
}

impl std::fmt::Debug for MappedCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedCheckpoint")
            .field("path", &self.path)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

fn lock(path: &Path, file: &File) -> CheckpointResult<()> {
    match file.try_lock() {
        Ok(()) => Ok(()),
        Err(TryLockError::WouldBlock) => Err(CheckpointError::Busy {
            path: path.to_path_buf(),
        }),
        Err(TryLockError::Error(e)) => Err(CheckpointError::io(path, e)),
    }
}

/// Map the checkpoint at `path` and validate it against `model`. The
/// stored index must be `expected_index`, the predecessor of the caller.
pub fn load(path: &Path, model: &GridModel, expected_index: u32) -> CheckpointResult<MappedCheckpoint> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| CheckpointError::io(path, e))?;
    lock(path, &file)?;

    let file_len = file
        .metadata()
        .map_err(|e| CheckpointError::io(path, e))?
        .len();
    if file_len < HEADER_BYTES as u64 {
        return Err(CheckpointError::invalid(path, HeaderError::Truncated { len: file_len }));
    }

    // SAFETY: the file is exclusively locked for as long as the mapping
    // lives, so no cooperating process resizes or rewrites it underneath.
    let map = unsafe { MmapMut::map_mut(&file) }.map_err(|e| CheckpointError::io(path, e))?;

    let layout = Layout::for_model(model);
    let header = Header::decode(&map).map_err(|e| CheckpointError::invalid(path, e))?;
    header
        .validate(&layout, file_len, expected_index)
        .map_err(|e| CheckpointError::invalid(path, e))?;
    if bytemuck::try_cast_slice::<u8, f64>(&map[HEADER_BYTES..]).is_err() {
        return Err(CheckpointError::invalid(path, HeaderError::Misaligned));
    }

    debug!(path = %path.display(), index = header.last_index, "mapped checkpoint");
    Ok(MappedCheckpoint {
        path: path.to_path_buf(),
        file,
        map,
        layout,
    })
}

impl MappedCheckpoint {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn header(&self) -> CheckpointResult<Header> {
        Header::decode(&self.map).map_err(|e| CheckpointError::invalid(&self.path, e))
    }

    fn payload(&self) -> &[f64] {
        bytemuck::cast_slice(&self.map[HEADER_BYTES..])
    }

    fn payload_mut(&mut self) -> &mut [f64] {
        bytemuck::cast_slice_mut(&mut self.map[HEADER_BYTES..])
    }

    /// Cell `(l, r, c)` of the stored field.
    pub fn cuboid(&self, l: usize, r: usize, c: usize) -> Option<f64> {
        let i = self.layout.cuboid_index(l, r, c)?;
        self.payload().get(i).copied()
    }

    /// Extra node `i` of the stored field.
    pub fn extra(&self, i: usize) -> Option<f64> {
        (i < self.layout.extra).then(|| self.payload()[self.layout.cuboid_len() + i])
    }

    /// Entry `i` of the stored temperature vector.
    pub fn temp(&self, i: usize) -> Option<f64> {
        self.last_temp().get(i).copied()
    }

    /// Store `index` as the last invocation and write the mapping back to
    /// disk.
    pub fn flush(&mut self, index: u32) -> CheckpointResult<()> {
        let index = i32::try_from(index).map_err(|_| {
            CheckpointError::invalid(&self.path, HeaderError::Overflow {
                what: "invocation index",
            })
        })?;
        self.map[Header::index_range()].copy_from_slice(&index.to_ne_bytes());
        self.map
            .flush()
            .map_err(|e| CheckpointError::io(&self.path, e))
    }

    /// Unmap and unlock. Consumes the checkpoint.
    pub fn release(self) -> CheckpointResult<()> {
        let Self { path, file, map, .. } = self;
        drop(map);
        file.unlock().map_err(|e| CheckpointError::io(&path, e))?;
        debug!(path = %path.display(), "released checkpoint");
        Ok(())
    }
}

impl TransientState for MappedCheckpoint {
    fn last_trans(&self) -> &[f64] {
        &self.payload()[..self.layout.trans_len()]
    }

    fn last_temp(&self) -> &[f64] {
        &self.payload()[self.layout.trans_len()..]
    }

    fn split_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        let split = self.layout.trans_len();
        self.payload_mut().split_at_mut(split)
    }
}

/// Write a fresh checkpoint for `state` with `index` as the last invocation.
pub fn create<S: TransientState + ?Sized>(
    path: &Path,
    model: &GridModel,
    state: &S,
    index: u32,
) -> CheckpointResult<()> {
    let layout = Layout::for_model(model);
    ensure_len("transient state", layout.trans_len(), state.last_trans().len())?;
    ensure_len("temperature vector", layout.temp_len(), state.last_temp().len())?;
    let header = Header::new(index, &layout).map_err(|e| CheckpointError::invalid(path, e))?;

    let mut bytes = Vec::with_capacity(layout.total_size());
    bytes.extend_from_slice(&header.encode());
    bytes.extend_from_slice(bytemuck::cast_slice(state.last_trans()));
    bytes.extend_from_slice(bytemuck::cast_slice(state.last_temp()));

    let mut file = File::create(path).map_err(|e| CheckpointError::io(path, e))?;
    file.write_all(&bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| CheckpointError::io(path, e))?;
    debug!(path = %path.display(), index, bytes = bytes.len(), "created checkpoint");
    Ok(())
}

/// Delete a checkpoint left over from an earlier sequence. Returns whether
/// a file was removed.
pub fn remove_stale(path: &Path) -> CheckpointResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            warn!(path = %path.display(), "deleted obsolete checkpoint");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CheckpointError::io(path, e)),
    }
}

/// Decode the header of a checkpoint without mapping it.
pub fn inspect(path: &Path) -> CheckpointResult<Header> {
    let mut file = File::open(path).map_err(|e| CheckpointError::io(path, e))?;
    let mut raw = Vec::with_capacity(HEADER_BYTES);
    (&mut file)
        .take(HEADER_BYTES as u64)
        .read_to_end(&mut raw)
        .map_err(|e| CheckpointError::io(path, e))?;
    let header = Header::decode(&raw).map_err(|e| CheckpointError::invalid(path, e))?;
    if header.magic != MAGIC {
        return Err(CheckpointError::invalid(path, HeaderError::BadMagic { found: header.magic }));
    }
    Ok(header)
}
