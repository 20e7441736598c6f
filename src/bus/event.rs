//! The event wire record and its owned, process-local counterpart.
//!
//! [`EventPayload`] is what callers actually see; [`write_into`]/[`read_from`]
//! marshal it to and from the fixed-layout [`EventSlot`](crate::region::layout::EventSlot)
//! living inside the region, copying the path out of shared memory before the
//! mutex guarding it is released (spec §4.2).

use crate::badge::record::BadgeKind;
use crate::ids::{PublisherId, SyncboxId};
use crate::region::layout::{EventSlot, PATH_CAPACITY};
use crate::region::sentinel::{check, EVENT_SENTINEL};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum EventKind {
    Init = 0,
    AddRoot = 1,
    RemoveRoot = 2,
    AddBadge = 3,
    RemoveBadge = 4,
}

impl EventKind {
    pub fn from_u32(value: u32) -> Result<Self> {
        Ok(match value {
            0 => EventKind::Init,
            1 => EventKind::AddRoot,
            2 => EventKind::RemoveRoot,
            3 => EventKind::AddBadge,
            4 => EventKind::RemoveBadge,
            _ => return Err(Error::SharedMemoryCorrupt("unknown event kind")),
        })
    }
}

/// Scoping for `AddRoot`/`RemoveRoot`: `None` means broadcast to every
/// overlay kind, any other value restricts fan-out to that kind (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subkind(pub u32);

#[derive(Debug, Clone)]
pub struct EventPayload {
    pub kind: EventKind,
    pub subkind: Subkind,
    pub badge_kind: BadgeKind,
    pub full_path: String,
    pub publisher_pid: u64,
    pub publisher_tid: u64,
    pub publisher_syncbox_id: SyncboxId,
    pub seq: u64,
}

impl EventPayload {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: EventKind,
        subkind: Subkind,
        badge_kind: BadgeKind,
        full_path: impl Into<String>,
        publisher_pid: u64,
        publisher_tid: u64,
        publisher_syncbox_id: SyncboxId,
    ) -> Self {
        Self {
            kind,
            subkind,
            badge_kind,
            full_path: full_path.into(),
            publisher_pid,
            publisher_tid,
            publisher_syncbox_id,
            seq: 0,
        }
    }
}

/// The publisher id is carried as the pid for reclamation purposes; spec
/// GLOSSARY also calls out a distinct per-lifetime publisher-id, which this
/// crate treats as equal to the OS pid scoped to the process's current
/// lifetime (a dead pid can never be reused by the same logical publisher).
pub fn publisher_id_for(pid: u64) -> PublisherId {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&pid.to_le_bytes());
    PublisherId::from_bytes(bytes)
}

/// Writes `payload` into `slot`. Caller must hold the region mutex and the
/// slot must belong to the caller's queue (see `bus::queue`).
///
/// # Safety
/// `slot` must not be aliased by any other writer while this call executes.
pub unsafe fn write_into(slot: *mut EventSlot, payload: &EventPayload, seq: u64) -> Result<()> {
    let units: Vec<u16> = payload.full_path.encode_utf16().collect();
    if units.len() >= PATH_CAPACITY {
        return Err(Error::Overflow {
            subscriber: "path exceeds wide-text capacity".to_string(),
        });
    }
    let slot = &mut *slot;
    slot.sentinel1 = EVENT_SENTINEL;
    slot.kind = payload.kind as u32;
    slot.subkind = payload.subkind.0;
    slot.publisher_pid = payload.publisher_pid;
    slot.publisher_tid = payload.publisher_tid;
    slot.badge_kind = payload.badge_kind as u32;
    slot.path_len = units.len() as u32;
    slot.path[..units.len()].copy_from_slice(&units);
    slot.publisher_syncbox_id = *payload.publisher_syncbox_id.as_bytes();
    slot.seq = seq;
    slot.sentinel2 = EVENT_SENTINEL;
    Ok(())
}

/// Reads and validates `slot`, returning an owned payload. Caller must hold
/// the region mutex for the duration of this call; the returned value no
/// longer borrows from the region.
pub fn read_from(slot: &EventSlot) -> Result<EventPayload> {
    check(slot.sentinel1, EVENT_SENTINEL, "event sentinel1")?;
    check(slot.sentinel2, EVENT_SENTINEL, "event sentinel2")?;
    let len = slot.path_len as usize;
    if len >= PATH_CAPACITY {
        return Err(Error::SharedMemoryCorrupt("event path_len out of bounds"));
    }
    let full_path = String::from_utf16(&slot.path[..len])
        .map_err(|_| Error::SharedMemoryCorrupt("event path is not valid UTF-16"))?;
    let kind = EventKind::from_u32(slot.kind)?;
    let badge_kind = BadgeKind::from_u32(slot.badge_kind)?;
    Ok(EventPayload {
        kind,
        subkind: Subkind(slot.subkind),
        badge_kind,
        full_path,
        publisher_pid: slot.publisher_pid,
        publisher_tid: slot.publisher_tid,
        publisher_syncbox_id: SyncboxId::from_bytes(slot.publisher_syncbox_id),
        seq: slot.seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_payload() {
        let mut slot = EventSlot::zeroed();
        let payload = EventPayload::new(
            EventKind::AddBadge,
            Subkind(0),
            BadgeKind::Synced,
            "C:\\Cloud\\a.txt",
            100,
            1,
            SyncboxId::generate(),
        );
        unsafe {
            write_into(&mut slot as *mut EventSlot, &payload, 7).unwrap();
        }
        let back = read_from(&slot).unwrap();
        assert_eq!(back.full_path, payload.full_path);
        assert_eq!(back.publisher_pid, 100);
        assert_eq!(back.seq, 7);
    }

    #[test]
    fn corrupted_sentinel_is_rejected() {
        let mut slot = EventSlot::zeroed();
        let payload = EventPayload::new(
            EventKind::AddBadge,
            Subkind(0),
            BadgeKind::Synced,
            "x",
            1,
            1,
            SyncboxId::generate(),
        );
        unsafe {
            write_into(&mut slot as *mut EventSlot, &payload, 0).unwrap();
        }
        slot.sentinel2 = 0;
        assert!(read_from(&slot).is_err());
    }
}
