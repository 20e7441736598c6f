//! The Badge record entity: a badge-kind plus the set of (publisher-pid,
//! syncbox-id) pairs currently asserting it for one path (spec §3).

use std::collections::{HashMap, HashSet};

use crate::ids::SyncboxId;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BadgeKind {
    /// Marks a root-folder entry in the Root Store rather than a badge.
    None = 0,
    Synced = 1,
    Syncing = 2,
    Failed = 3,
    Selective = 4,
}

impl BadgeKind {
    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => BadgeKind::None,
            1 => BadgeKind::Synced,
            2 => BadgeKind::Syncing,
            3 => BadgeKind::Failed,
            4 => BadgeKind::Selective,
            _ => return Err(Error::SharedMemoryCorrupt("unknown badge kind")),
        })
    }

    /// Icon index assigned per overlay kind (spec §6).
    pub fn icon_index(self) -> Option<u32> {
        match self {
            BadgeKind::Syncing => Some(0),
            BadgeKind::Synced => Some(1),
            BadgeKind::Selective => Some(2),
            BadgeKind::Failed => Some(3),
            BadgeKind::None => None,
        }
    }
}

/// A single path's badge state: which kind, and who is asserting it.
#[derive(Debug, Clone)]
pub struct BadgeRecord {
    pub badge_kind: BadgeKind,
    pub publishers: HashMap<u64, HashSet<SyncboxId>>,
}

impl BadgeRecord {
    pub fn new(badge_kind: BadgeKind, pub_pid: u64, pub_syncbox: SyncboxId) -> Self {
        let mut publishers = HashMap::new();
        publishers.insert(pub_pid, HashSet::from([pub_syncbox]));
        Self {
            badge_kind,
            publishers,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    /// Removes `pub_syncbox` from `pub_pid`'s set. Returns true if the whole
    /// record is now empty and should be dropped by the caller.
    pub fn remove(&mut self, pub_pid: u64, pub_syncbox: SyncboxId) -> bool {
        if let Some(set) = self.publishers.get_mut(&pub_pid) {
            set.remove(&pub_syncbox);
            if set.is_empty() {
                self.publishers.remove(&pub_pid);
            }
        }
        self.is_empty()
    }

    /// Removes every contribution from `pid`. Returns true if now empty.
    pub fn remove_pid(&mut self, pid: u64) -> bool {
        self.publishers.remove(&pid);
        self.is_empty()
    }

    pub fn contains_pid(&self, pid: u64) -> bool {
        self.publishers.contains_key(&pid)
    }
}
