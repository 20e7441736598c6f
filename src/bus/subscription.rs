//! Operations on a single Subscription record inside the region (spec §3,
//! §6). Every function here assumes the caller holds the region mutex.

use std::sync::atomic::Ordering;

use crate::ids::SubscriberId;
use crate::region::layout::SubscriptionSlot;
use crate::region::sentinel::{check, SUBSCRIPTION_SENTINEL};
use crate::Result;

pub fn is_in_use(slot: &SubscriptionSlot) -> bool {
    slot.in_use.load(Ordering::Acquire) != 0
}

pub fn subscriber_id(slot: &SubscriptionSlot) -> SubscriberId {
    SubscriberId::from_bytes(slot.subscriber_id)
}

pub fn matches(slot: &SubscriptionSlot, id: &SubscriberId) -> bool {
    is_in_use(slot) && &subscriber_id(slot) == id
}

pub fn owner_pid(slot: &SubscriptionSlot) -> u32 {
    slot.owner_pid.load(Ordering::Acquire)
}

pub fn is_waiting(slot: &SubscriptionSlot) -> bool {
    slot.waiting.load(Ordering::Acquire) != 0
}

pub fn set_waiting(slot: &SubscriptionSlot, value: bool) {
    slot.waiting.store(value as u32, Ordering::Release);
}

pub fn is_cancelled(slot: &SubscriptionSlot) -> bool {
    slot.cancelled.load(Ordering::Acquire) != 0
}

pub fn set_cancelled(slot: &SubscriptionSlot, value: bool) {
    slot.cancelled.store(value as u32, Ordering::Release);
}

pub fn sentinels_valid(slot: &SubscriptionSlot) -> bool {
    slot.sentinels_valid()
}

pub fn validate(slot: &SubscriptionSlot) -> Result<()> {
    check(slot.sentinel1, SUBSCRIPTION_SENTINEL, "subscription sentinel1")?;
    check(slot.sentinel2, SUBSCRIPTION_SENTINEL, "subscription sentinel2")?;
    Ok(())
}

/// Claims `slot` for (channel, id), recording the current process/thread as
/// owner. Caller must already hold the region mutex and have verified the
/// slot was free.
pub fn claim(slot: &SubscriptionSlot, channel: u32, id: SubscriberId, owner_pid: u32, owner_tid: u32) {
    // SAFETY: subscriber_id is plain data written only here, under the
    // region mutex, before `in_use` is published.
    unsafe {
        let ptr = slot as *const SubscriptionSlot as *mut SubscriptionSlot;
        (*ptr).subscriber_id = *id.as_bytes();
        (*ptr).sentinel1 = SUBSCRIPTION_SENTINEL;
        (*ptr).sentinel2 = SUBSCRIPTION_SENTINEL;
    }
    slot.channel.store(channel, Ordering::Release);
    slot.owner_pid.store(owner_pid, Ordering::Release);
    slot.owner_tid.store(owner_tid, Ordering::Release);
    slot.waiting.store(0, Ordering::Release);
    slot.cancelled.store(0, Ordering::Release);
    slot.queue_head.store(0, Ordering::Release);
    slot.queue_len.store(0, Ordering::Release);
    slot.in_use.store(1, Ordering::Release);
}

/// Releases `slot` back to the free pool. Does not touch queued events; a
/// freshly claimed slot resets its own queue pointers.
pub fn release(slot: &SubscriptionSlot) {
    slot.in_use.store(0, Ordering::Release);
    slot.cancelled.store(0, Ordering::Release);
    slot.waiting.store(0, Ordering::Release);
}
