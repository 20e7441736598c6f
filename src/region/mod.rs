//! Shared Region (SR): a named, fixed-size mapping holding the root object,
//! the subscription registry and every subscription's bounded event queue.
//!
//! Spec §4.1: "repeated opens from any process converge on the same root."
//! Here that means mapping the same backing file and casting the same
//! `RegionImage` layout over it; the root object's one-time initialization
//! is idempotent across concurrent first attachers (see [`root::find_or_construct_root`]).

pub mod layout;
pub mod mmap;
pub mod mutex;
pub mod root;
pub mod sentinel;

use std::path::{Path, PathBuf};

use crate::region::layout::{ChannelBlock, RegionImage};
use crate::region::mmap::MmapRegion;
use crate::region::mutex::{RegionMutex, RegionMutexGuard};
use crate::Result;

/// A process's attachment to the shared region.
pub struct Region {
    backing: MmapRegion,
}

impl Region {
    /// Creates the region's backing file if absent, else opens it, and
    /// ensures the root object is initialized. `name` is the well-known
    /// identifier (spec §6: "a versioned fixed ASCII identifier"); it is
    /// resolved to a path under the OS temp directory shared by all local
    /// sessions of the same user, the same role `managed_windows_shared_memory`
    /// plays in the original implementation.
    pub fn attach(name: &str) -> Result<Self> {
        Self::attach_at(&default_region_path(name))
    }

    pub fn attach_at(path: impl AsRef<Path>) -> Result<Self> {
        let backing = MmapRegion::attach(path, RegionImage::SIZE)?;
        let region = Self { backing };
        root::find_or_construct_root(region.image().root())?;
        Ok(region)
    }

    pub fn path(&self) -> &Path {
        self.backing.path()
    }

    fn image(&self) -> RegionImageRef<'_> {
        // SAFETY: the backing mapping is exactly `RegionImage::SIZE` bytes
        // (enforced in `attach_at`) and `RegionImage` is `#[repr(C)]` with no
        // padding-sensitive invariants beyond what every field's all-zero
        // bit pattern already satisfies.
        let ptr = self.backing.as_slice().as_ptr() as *const RegionImage;
        RegionImageRef {
            ptr,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn root(&self) -> &layout::Root {
        self.image().root()
    }

    pub fn channel(&self, index: usize) -> &ChannelBlock {
        self.image().channel(index)
    }

    pub fn lock(&self) -> Result<RegionMutexGuard<'_>> {
        RegionMutex::new(self.root()).lock()
    }

    pub fn validate_root(&self) -> Result<()> {
        root::validate(self.root())
    }
}

/// Thin wrapper translating a base pointer into typed references into the
/// region image. Exists only to keep the unsafe cast in one place.
struct RegionImageRef<'a> {
    ptr: *const RegionImage,
    _marker: std::marker::PhantomData<&'a RegionImage>,
}

impl<'a> RegionImageRef<'a> {
    fn root(&self) -> &'a layout::Root {
        unsafe { &(*self.ptr).root }
    }

    fn channel(&self, index: usize) -> &'a ChannelBlock {
        unsafe { &(*self.ptr).channels[index] }
    }
}

fn default_region_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("overlay-bus-{name}.region"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn attach_initializes_root_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");
        let region = Region::attach_at(&path).unwrap();
        region.validate_root().unwrap();
    }

    #[test]
    fn second_attach_reuses_initialized_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");
        let first = Region::attach_at(&path).unwrap();
        drop(first);
        let second = Region::attach_at(&path).unwrap();
        second.validate_root().unwrap();
    }

    #[test]
    fn mutex_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("region.bin");
        let region = Region::attach_at(&path).unwrap();
        {
            let _guard = region.lock().unwrap();
        }
        let _guard2 = region.lock().unwrap();
    }
}
