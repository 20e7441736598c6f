//! The subscription registry: for one channel, a fixed pool of subscription
//! slots keyed by subscriber-id (spec §3's "ordered map channel -> ordered
//! map subscriber-id -> Subscription").
//!
//! The region has no general-purpose allocator (every attacher maps it at a
//! different base address, so a heap of pointer-linked nodes would not be
//! portable — see spec §9's "cyclic ownership" note); instead each channel
//! gets a fixed-capacity array of slots, searched linearly under the region
//! mutex. [`MAX_SUBSCRIPTIONS_PER_CHANNEL`] bounds concurrent subscribers per
//! channel, the same way the original's `_knMaxEventsInEventQueue` bounds a
//! subscription's queue.

use crate::bus::subscription;
use crate::ids::SubscriberId;
use crate::region::layout::{ChannelBlock, SubscriptionSlot};
use crate::{Error, Result};

/// Finds the in-use slot for `id`, if any.
pub fn find<'a>(channel: &'a ChannelBlock, id: &SubscriberId) -> Option<&'a SubscriptionSlot> {
    channel
        .subscriptions
        .iter()
        .find(|slot| subscription::matches(slot, id))
}

/// Finds the slot for `id`, claiming a free one if this is the first call
/// for this subscriber-id. Caller must hold the region mutex.
pub fn find_or_create<'a>(
    channel: &'a ChannelBlock,
    channel_index: u32,
    id: SubscriberId,
    owner_pid: u32,
    owner_tid: u32,
) -> Result<&'a SubscriptionSlot> {
    if let Some(slot) = find(channel, &id) {
        slot.owner_pid.store(owner_pid, std::sync::atomic::Ordering::Release);
        slot.owner_tid.store(owner_tid, std::sync::atomic::Ordering::Release);
        return Ok(slot);
    }
    let free = channel
        .subscriptions
        .iter()
        .find(|slot| !subscription::is_in_use(slot))
        .ok_or_else(|| Error::Overflow {
            subscriber: "subscription registry is full for this channel".to_string(),
        })?;
    subscription::claim(free, channel_index, id, owner_pid, owner_tid);
    Ok(free)
}

pub fn remove(slot: &SubscriptionSlot) {
    subscription::release(slot);
}

/// Every in-use subscription in `channel`, ordered by subscriber-id bytes
/// (spec §3: "deterministic ordering by id bytes"). Physical slot storage is
/// unordered; this is computed on demand for enumeration operations
/// (`CancelSubscriptionsForProcess`, `CleanUpUnusedResources`, diagnostics).
pub fn ordered_subscriptions(channel: &ChannelBlock) -> Vec<&SubscriptionSlot> {
    let mut slots: Vec<&SubscriptionSlot> = channel
        .subscriptions
        .iter()
        .filter(|slot| subscription::is_in_use(slot))
        .collect();
    slots.sort_by_key(|slot| subscription::subscriber_id(slot).0);
    slots
}
