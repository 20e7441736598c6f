//! The Bus Server itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::bus::event::EventPayload;
use crate::bus::{queue, registry, subscription, Channel};
use crate::ids::SubscriberId;
use crate::liveness::is_process_alive;
use crate::region::Region;
use crate::wait::{futex_wait, futex_wake};
use crate::{Error, Result};

/// Outcome of a `Publish` call: which currently-subscribed ids (if any)
/// could not receive the event because their queue was full. Other
/// subscribers still received it (spec §4.2).
#[derive(Debug, Default, Clone)]
pub struct PublishOutcome {
    pub overflowed: Vec<SubscriberId>,
}

#[derive(Debug)]
pub enum SubscribeOutcome {
    GotEvent(EventPayload),
    TimedOut,
    Cancelled,
}

pub struct BusServer {
    region: Region,
}

static THREAD_ID_SEQ: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = THREAD_ID_SEQ.fetch_add(1, Ordering::Relaxed);
}

fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| *id)
}

impl BusServer {
    pub fn new(region: Region) -> Self {
        Self { region }
    }

    pub fn attach(name: &str) -> Result<Self> {
        Ok(Self::new(Region::attach(name)?))
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    fn is_terminating(&self) -> bool {
        self.region.root().terminating.load(Ordering::Acquire) != 0
    }

    /// Appends `payload` to every currently-subscribed slot on `channel`.
    /// Never blocks on a consumer: a full queue is reported as an overflow
    /// for that subscriber only, and publishing continues to the rest.
    pub fn publish(&self, channel: Channel, payload: EventPayload) -> Result<PublishOutcome> {
        let guard = self.region.lock()?;
        if self.is_terminating() {
            drop(guard);
            return Err(Error::Terminating);
        }
        if let Err(err) = self.region.validate_root() {
            drop(guard);
            return Err(err);
        }
        let block = self.region.channel(channel.index());
        let mut outcome = PublishOutcome::default();
        for slot in block.subscriptions.iter() {
            if !subscription::is_in_use(slot) {
                continue;
            }
            if let Err(err) = subscription::validate(slot) {
                drop(guard);
                return Err(err);
            }
            let id = subscription::subscriber_id(slot);
            match queue::push(slot, &id.to_string(), &payload) {
                Ok(()) => {
                    slot.futex_word.fetch_add(1, Ordering::AcqRel);
                    futex_wake(&slot.futex_word)?;
                }
                Err(Error::Overflow { .. }) => outcome.overflowed.push(id),
                Err(other) => return Err(other),
            }
        }
        drop(guard);
        Ok(outcome)
    }

    /// Finds or creates the Subscription for (channel, id), then either
    /// returns an already-queued event immediately or blocks on the
    /// subscription's semaphore for up to `timeout` (spec §4.2).
    pub fn subscribe(
        &self,
        channel: Channel,
        id: SubscriberId,
        timeout: Duration,
    ) -> Result<SubscribeOutcome> {
        let guard = self.region.lock()?;
        if self.is_terminating() {
            drop(guard);
            return Err(Error::Terminating);
        }
        self.region.validate_root()?;
        let block = self.region.channel(channel.index());
        let slot = registry::find_or_create(
            block,
            channel.index() as u32,
            id,
            std::process::id(),
            current_thread_id() as u32,
        )?;
        subscription::validate(slot)?;

        if let Some(payload) = queue::pop(slot)? {
            drop(guard);
            return Ok(SubscribeOutcome::GotEvent(payload));
        }

        subscription::set_waiting(slot, true);
        let expected = slot.futex_word.load(Ordering::Acquire);
        drop(guard);

        futex_wait(&slot.futex_word, expected, Some(timeout))?;

        let guard = self.region.lock()?;
        self.region.validate_root()?;
        subscription::validate(slot)?;
        subscription::set_waiting(slot, false);
        let result = if subscription::is_cancelled(slot) {
            Ok(SubscribeOutcome::Cancelled)
        } else if let Some(payload) = queue::pop(slot)? {
            Ok(SubscribeOutcome::GotEvent(payload))
        } else {
            Ok(SubscribeOutcome::TimedOut)
        };
        drop(guard);
        result
    }

    /// Wakes any waiter on (channel, id) and marks it cancelled. Does not
    /// delete the Subscription; the owner removes it on its next `Subscribe`
    /// return, or `CleanUpUnusedResources` does once the owner pid is dead.
    pub fn cancel_waiting_subscription(&self, channel: Channel, id: SubscriberId) -> Result<()> {
        let guard = self.region.lock()?;
        let block = self.region.channel(channel.index());
        if let Some(slot) = registry::find(block, &id) {
            subscription::set_cancelled(slot, true);
            slot.futex_word.fetch_add(1, Ordering::AcqRel);
            futex_wake(&slot.futex_word)?;
        }
        drop(guard);
        Ok(())
    }

    /// Cancels, wakes and deletes every Subscription owned by `pid`, across
    /// both channels.
    pub fn cancel_subscriptions_for_process(&self, pid: u32) -> Result<()> {
        let guard = self.region.lock()?;
        for index in 0..crate::region::layout::CHANNEL_COUNT {
            let block = self.region.channel(index);
            for slot in block.subscriptions.iter() {
                if subscription::is_in_use(slot) && subscription::owner_pid(slot) == pid {
                    subscription::set_cancelled(slot, true);
                    slot.futex_word.fetch_add(1, Ordering::AcqRel);
                    futex_wake(&slot.futex_word)?;
                    registry::remove(slot);
                }
            }
        }
        drop(guard);
        Ok(())
    }

    /// Removes every Subscription whose owner pid is no longer a live OS
    /// process (spec §4.2, §4.6).
    pub fn clean_up_unused_resources(&self) -> Result<()> {
        let guard = self.region.lock()?;
        for index in 0..crate::region::layout::CHANNEL_COUNT {
            let block = self.region.channel(index);
            for slot in block.subscriptions.iter() {
                if subscription::is_in_use(slot) && !is_process_alive(subscription::owner_pid(slot))
                {
                    log::debug!(
                        "reclaiming subscription {} owned by dead pid {}",
                        subscription::subscriber_id(slot),
                        subscription::owner_pid(slot)
                    );
                    registry::remove(slot);
                }
            }
        }
        drop(guard);
        Ok(())
    }

    /// Marks the bus as terminating; subsequent operations fail cleanly.
    pub fn terminate(&self) -> Result<()> {
        let guard = self.region.lock()?;
        self.region.root().terminating.store(1, Ordering::Release);
        drop(guard);
        Ok(())
    }
}
