//! Fixed byte layout of everything the region holds.
//!
//! Every attaching process maps this region at a (possibly different) base
//! address, so nothing here is an absolute pointer: subscriptions, queues and
//! events are plain fields inside one big `#[repr(C)]` image, addressed by
//! array index rather than by pointer, the same way `ControlBlock` in the
//! teacher crate is a single fixed-layout struct cast directly over mapped
//! bytes.

use std::sync::atomic::{AtomicU32, AtomicU64};

use crate::region::sentinel::{EVENT_SENTINEL, ROOT_SENTINEL, SUBSCRIPTION_SENTINEL};

/// Number of distinct subscriber-ids a single channel can hold concurrently.
pub const MAX_SUBSCRIPTIONS_PER_CHANNEL: usize = 64;
/// Per-subscription bounded event queue depth. Spec requires at least 16.
pub const QUEUE_CAPACITY: usize = 32;
/// Capacity, in UTF-16 code units, of the wide-text `full_path` field.
pub const PATH_CAPACITY: usize = 512;
/// The two channels in the bus, as spec'd: controlling app <-> overlay handlers.
pub const CHANNEL_COUNT: usize = 2;

/// Wire-format event record (spec §6's richer layout, sequence number included).
#[repr(C)]
pub struct EventSlot {
    pub sentinel1: u64,
    pub kind: u32,
    pub subkind: u32,
    pub publisher_pid: u64,
    pub publisher_tid: u64,
    pub badge_kind: u32,
    pub path_len: u32,
    pub path: [u16; PATH_CAPACITY],
    pub publisher_syncbox_id: [u8; 16],
    pub seq: u64,
    pub sentinel2: u64,
}

impl EventSlot {
    pub fn zeroed() -> Self {
        // SAFETY: every field is plain-old-data (integers, arrays of
        // integers); an all-zero bit pattern is a valid value for each.
        unsafe { std::mem::zeroed() }
    }

    pub fn sentinels_valid(&self) -> bool {
        self.sentinel1 == EVENT_SENTINEL && self.sentinel2 == EVENT_SENTINEL
    }
}

/// One Subscription record: sentinels around a fixed header plus its bounded
/// event queue, per spec §6.
#[repr(C)]
pub struct SubscriptionSlot {
    pub sentinel1: u64,
    pub in_use: AtomicU32,
    pub owner_pid: AtomicU32,
    pub owner_tid: AtomicU32,
    pub channel: AtomicU32,
    pub subscriber_id: [u8; 16],
    pub waiting: AtomicU32,
    pub cancelled: AtomicU32,
    /// Futex word signalled once per `Publish` that lands an event here.
    pub futex_word: AtomicU32,
    pub queue_head: AtomicU32,
    pub queue_len: AtomicU32,
    pub next_seq: AtomicU64,
    pub sentinel2: u64,
    pub events: [EventSlot; QUEUE_CAPACITY],
}

impl SubscriptionSlot {
    pub fn sentinels_valid(&self) -> bool {
        self.sentinel1 == SUBSCRIPTION_SENTINEL && self.sentinel2 == SUBSCRIPTION_SENTINEL
    }
}

#[repr(C)]
pub struct ChannelBlock {
    pub subscriptions: [SubscriptionSlot; MAX_SUBSCRIPTIONS_PER_CHANNEL],
}

/// Root control object: magic/version sentinels, the inter-process mutex
/// state, and the terminating flag. Directly modeled on the teacher's
/// `ControlBlock` (padded atomics, magic + version at the front).
#[repr(C, align(128))]
pub struct Root {
    pub magic: AtomicU32,
    pub version: AtomicU32,
    pub sentinel1: u64,
    pub mutex_state: AtomicU32,
    pub mutex_owner_pid: AtomicU32,
    pub terminating: AtomicU32,
    pub _pad0: u32,
    pub sentinel2: u64,
}

impl Root {
    pub fn sentinels_valid(&self) -> bool {
        self.sentinel1 == ROOT_SENTINEL && self.sentinel2 == ROOT_SENTINEL
    }
}

/// The whole region, cast directly over the mmap'd bytes.
#[repr(C)]
pub struct RegionImage {
    pub root: Root,
    pub channels: [ChannelBlock; CHANNEL_COUNT],
}

impl RegionImage {
    pub const SIZE: usize = std::mem::size_of::<RegionImage>();
}
