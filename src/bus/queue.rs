//! The bounded per-subscription event queue: a ring buffer of `EventSlot`s
//! embedded directly inside a [`SubscriptionSlot`], dequeued from the head
//! and appended at the tail (spec §4.2's "Key algorithm — queue layout").
//!
//! Every function here assumes the caller already holds the region mutex;
//! none of them take a lock themselves.

use std::sync::atomic::Ordering;

use crate::bus::event::{self, EventPayload};
use crate::region::layout::{EventSlot, SubscriptionSlot, QUEUE_CAPACITY};
use crate::{Error, Result};

pub fn len(slot: &SubscriptionSlot) -> usize {
    slot.queue_len.load(Ordering::Acquire) as usize
}

pub fn is_full(slot: &SubscriptionSlot) -> bool {
    len(slot) >= QUEUE_CAPACITY
}

/// Appends `payload` to the tail of `slot`'s queue. Returns `Overflow` if the
/// queue is already at capacity; the caller (per spec §4.2) reports this for
/// the affected subscriber only and continues publishing to the rest.
pub fn push(slot: &SubscriptionSlot, subscriber: &str, payload: &EventPayload) -> Result<()> {
    let current_len = len(slot);
    if current_len >= QUEUE_CAPACITY {
        return Err(Error::Overflow {
            subscriber: subscriber.to_string(),
        });
    }
    let head = slot.queue_head.load(Ordering::Acquire) as usize;
    let tail = (head + current_len) % QUEUE_CAPACITY;
    let seq = slot.next_seq.fetch_add(1, Ordering::AcqRel) + 1;

    // SAFETY: caller holds the region mutex, so no other writer touches this
    // slot's queue concurrently; `tail` is within bounds by construction.
    let slot_ptr = &slot.events[tail] as *const EventSlot as *mut EventSlot;
    unsafe {
        event::write_into(slot_ptr, payload, seq)?;
    }
    slot.queue_len
        .store((current_len + 1) as u32, Ordering::Release);
    Ok(())
}

/// Removes and returns the head of `slot`'s queue, or `None` if empty.
pub fn pop(slot: &SubscriptionSlot) -> Result<Option<EventPayload>> {
    let current_len = len(slot);
    if current_len == 0 {
        return Ok(None);
    }
    let head = slot.queue_head.load(Ordering::Acquire) as usize;
    let payload = event::read_from(&slot.events[head])?;
    let next_head = (head + 1) % QUEUE_CAPACITY;
    slot.queue_head.store(next_head as u32, Ordering::Release);
    slot.queue_len
        .store((current_len - 1) as u32, Ordering::Release);
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::record::BadgeKind;
    use crate::bus::event::{EventKind, Subkind};
    use crate::ids::SyncboxId;

    fn payload(path: &str) -> EventPayload {
        EventPayload::new(
            EventKind::AddBadge,
            Subkind(0),
            BadgeKind::Synced,
            path,
            1,
            1,
            SyncboxId::generate(),
        )
    }

    #[test]
    fn fifo_order_is_preserved() {
        let slot = zeroed_subscription_slot();
        push(&slot, "s", &payload("a")).unwrap();
        push(&slot, "s", &payload("b")).unwrap();
        let first = pop(&slot).unwrap().unwrap();
        let second = pop(&slot).unwrap().unwrap();
        assert_eq!(first.full_path, "a");
        assert_eq!(second.full_path, "b");
        assert!(first.seq < second.seq);
    }

    #[test]
    fn overflow_is_reported_once_full() {
        let slot = zeroed_subscription_slot();
        for i in 0..QUEUE_CAPACITY {
            push(&slot, "s", &payload(&format!("p{i}"))).unwrap();
        }
        assert!(push(&slot, "s", &payload("overflow")).is_err());
        // Draining one slot makes room again.
        pop(&slot).unwrap();
        assert!(push(&slot, "s", &payload("fits-now")).is_ok());
    }

    fn zeroed_subscription_slot() -> SubscriptionSlot {
        // SAFETY: all-zero is a valid initial state for every field in
        // SubscriptionSlot (atomics zero-init, arrays of POD zero-init).
        unsafe { std::mem::zeroed() }
    }
}
