//! Named, fixed-size memory mapping backing the shared region.
//!
//! There is no portable `shared_memory`-style crate in play here; like the
//! teacher, the region is a plain file opened by every attaching process and
//! mapped with `memmap2`. The file's path stands in for the "name" in
//! spec terms: all local processes of the same user agree on a well-known
//! directory, so repeated `attach` calls converge on the same backing file.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::{Error, Result};

pub struct MmapRegion {
    path: PathBuf,
    _file: File,
    mmap: MmapMut,
}

impl MmapRegion {
    /// Creates the backing file at `size` bytes if absent, else opens it,
    /// truncating or extending it to match. Either path converges on a
    /// mapping of exactly `size` bytes.
    pub fn attach(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::AttachError {
                name: path.display().to_string(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| Error::AttachError {
                name: path.display().to_string(),
                source,
            })?;
        let current_len = file.metadata()?.len();
        if current_len != size as u64 {
            file.set_len(size as u64).map_err(|source| Error::AttachError {
                name: path.display().to_string(),
                source,
            })?;
        }
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| Error::AttachError {
            name: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path,
            _file: file,
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap[..]
    }

    /// Raw base pointer. Every offset stored inside the region is relative to
    /// this pointer within the *current* process's mapping; it must never be
    /// persisted or sent to another process.
    pub fn base_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn flush(&self) -> Result<()> {
        self.mmap.flush().map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn attach_creates_and_sizes_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");
        let region = MmapRegion::attach(&path, 4096).unwrap();
        assert_eq!(region.len(), 4096);
        assert_eq!(path.metadata().unwrap().len(), 4096);
    }

    #[test]
    fn reattaching_opens_the_same_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");
        {
            let mut region = MmapRegion::attach(&path, 4096).unwrap();
            region.as_mut_slice()[0] = 0xAB;
            region.flush().unwrap();
        }
        let region = MmapRegion::attach(&path, 4096).unwrap();
        assert_eq!(region.as_slice()[0], 0xAB);
    }
}
