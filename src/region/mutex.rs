//! Inter-process mutex serializing all registry and queue mutation in the
//! root object (spec §4.1, §5).
//!
//! Built on the futex primitive in [`crate::wait`], with dead-owner recovery:
//! if the recorded holder pid is no longer running, the next acquirer steals
//! the lock rather than blocking forever. This is the "the mutex is
//! recovered on next acquisition" behavior from spec §5 — recovery is not
//! linearizable with the dead process's last (unfinished) critical section,
//! but that process can no longer observe or extend it, so a subsequent
//! sentinel check on the resumed structures is what actually guards
//! correctness.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::liveness::is_process_alive;
use crate::region::layout::Root;
use crate::wait::{futex_wait, futex_wake};
use crate::Result;

/// How long a contended lock attempt waits before re-checking holder liveness.
const RECHECK_INTERVAL: Duration = Duration::from_millis(50);

pub struct RegionMutex<'a> {
    root: &'a Root,
}

impl<'a> RegionMutex<'a> {
    pub fn new(root: &'a Root) -> Self {
        Self { root }
    }

    pub fn lock(&self) -> Result<RegionMutexGuard<'a>> {
        loop {
            if self
                .root
                .mutex_state
                .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.root
                    .mutex_owner_pid
                    .store(std::process::id(), Ordering::Release);
                return Ok(RegionMutexGuard { root: self.root });
            }

            let holder = self.root.mutex_owner_pid.load(Ordering::Acquire);
            if holder != 0 && !is_process_alive(holder) {
                log::warn!("region mutex held by dead pid {holder}, recovering");
                // Force the state back to locked-by-us regardless of its
                // current bit pattern: the dead process cannot contend.
                self.root.mutex_state.store(1, Ordering::Release);
                self.root
                    .mutex_owner_pid
                    .store(std::process::id(), Ordering::Release);
                return Ok(RegionMutexGuard { root: self.root });
            }

            futex_wait(&self.root.mutex_state, 1, Some(RECHECK_INTERVAL))?;
        }
    }
}

pub struct RegionMutexGuard<'a> {
    root: &'a Root,
}

impl<'a> Drop for RegionMutexGuard<'a> {
    fn drop(&mut self) {
        self.root.mutex_owner_pid.store(0, Ordering::Release);
        self.root.mutex_state.store(0, Ordering::Release);
        let _ = futex_wake(&self.root.mutex_state);
    }
}
