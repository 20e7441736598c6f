//! One-time initialization and validation of the region's root object.

use std::sync::atomic::Ordering;

use crate::region::layout::Root;
use crate::region::sentinel::{check, ROOT_MAGIC, ROOT_SENTINEL, ROOT_VERSION};
use crate::{Error, Result};

/// Finds the already-initialized root, or constructs it if this is the first
/// attacher to see a zeroed region. Races between simultaneous first-time
/// attachers are resolved by a CAS on `magic`: exactly one attacher observes
/// the 0 -> [`ROOT_MAGIC`] transition and performs the rest of the
/// initialization; every other attacher (including one that loses the race
/// mid-init) spins briefly until it observes a fully-initialized root.
pub fn find_or_construct_root(root: &Root) -> Result<()> {
    if root
        .magic
        .compare_exchange(0, ROOT_MAGIC, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
    {
        root.version.store(ROOT_VERSION, Ordering::Release);
        // SAFETY: the sentinels are plain (non-atomic) fields; only the
        // attacher that just won the `magic` CAS above reaches this branch,
        // so no other thread observes or writes them concurrently.
        unsafe {
            let ptr = root as *const Root as *mut Root;
            (*ptr).sentinel1 = ROOT_SENTINEL;
            (*ptr).sentinel2 = ROOT_SENTINEL;
        }
        root.mutex_state.store(0, Ordering::Release);
        root.mutex_owner_pid.store(0, Ordering::Release);
        root.terminating.store(0, Ordering::Release);
        return Ok(());
    }

    for _ in 0..1000 {
        if root.magic.load(Ordering::Acquire) == ROOT_MAGIC && root.sentinels_valid() {
            return validate(root);
        }
        std::thread::yield_now();
    }
    Err(Error::SharedMemoryCorrupt(
        "root never finished initializing",
    ))
}

pub fn validate(root: &Root) -> Result<()> {
    if root.magic.load(Ordering::Acquire) != ROOT_MAGIC {
        return Err(Error::SharedMemoryCorrupt("root magic mismatch"));
    }
    check(root.sentinel1, ROOT_SENTINEL, "root sentinel1")?;
    check(root.sentinel2, ROOT_SENTINEL, "root sentinel2")?;
    Ok(())
}
