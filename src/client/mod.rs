//! Subscription Client (SC): per (channel, subscriber-id), owns a subscriber
//! loop (pulls events, dispatches callbacks) and a watcher loop (liveness,
//! periodic tick, restart) — spec §4.3.
//!
//! Both loops are dedicated OS threads; there is no cooperative scheduler.
//! Callbacks run on the subscriber thread and are expected to be short.

pub mod callbacks;

pub use callbacks::Callbacks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::badge::record::BadgeKind;
use crate::bus::event::{EventKind, EventPayload};
use crate::bus::{BusServer, Channel, SubscribeOutcome};
use crate::client::callbacks::RootSelector;
use crate::config::BusConfig;
use crate::ids::SubscriberId;
use crate::Result;

/// A single-fire latch the parent thread blocks on until the subscriber loop
/// completes its first `Subscribe` round trip (spec §4.3's "started" latch).
struct Latch {
    fired: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn signal(&self) {
        let mut fired = self.fired.lock().unwrap();
        *fired = true;
        self.cv.notify_all();
    }

    /// Returns whether the latch fired before `timeout` elapsed.
    fn wait(&self, timeout: Duration) -> bool {
        let fired = self.fired.lock().unwrap();
        if *fired {
            return true;
        }
        let (fired, _) = self
            .cv
            .wait_timeout_while(fired, timeout, |f| !*f)
            .unwrap();
        *fired
    }
}

struct Shared {
    bus: Arc<BusServer>,
    channel: Channel,
    subscriber_id: SubscriberId,
    config: BusConfig,
    callbacks: Arc<Callbacks>,
    /// Reset by the watcher each tick; set by the subscriber loop on every
    /// successful (non-erroring) `Subscribe` round trip.
    alive: AtomicBool,
    exit_requested: AtomicBool,
    started: Latch,
    wake_lock: Mutex<()>,
    wake_cv: Condvar,
    subscriber_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Owns one (channel, subscriber-id) pair end to end: the subscriber and
/// watcher threads, and the shutdown sequence that tears both down.
pub struct SubscriptionClient {
    shared: Arc<Shared>,
    watcher_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionClient {
    /// Starts both loops and blocks up to `config.started_latch_timeout` for
    /// the subscriber loop's first round trip, matching spec §4.3.
    pub fn start(
        bus: Arc<BusServer>,
        channel: Channel,
        subscriber_id: SubscriberId,
        callbacks: Callbacks,
        config: BusConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            bus,
            channel,
            subscriber_id,
            config,
            callbacks: Arc::new(callbacks),
            alive: AtomicBool::new(false),
            exit_requested: AtomicBool::new(false),
            started: Latch::new(),
            wake_lock: Mutex::new(()),
            wake_cv: Condvar::new(),
            subscriber_handle: Mutex::new(None),
        });

        *shared.subscriber_handle.lock().unwrap() = Some(spawn_subscriber_loop(shared.clone()));
        let watcher_handle = spawn_watcher_loop(shared.clone());

        let timeout = shared.config.started_latch_timeout;
        if !shared.started.wait(timeout) {
            log::warn!(
                "subscription client {} did not complete its first Subscribe within {:?}",
                subscriber_id,
                timeout
            );
        }

        Self {
            shared,
            watcher_handle: Mutex::new(Some(watcher_handle)),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.shared.subscriber_id
    }

    pub fn channel(&self) -> Channel {
        self.shared.channel
    }

    /// Escalating shutdown per spec §4.3/§5: request-exit, cancel the
    /// waiting subscription to unblock the subscriber thread, give both
    /// loops a bounded grace window, then stop waiting (a stuck OS thread
    /// cannot be safely force-killed from safe Rust; it is detached and
    /// logged instead).
    pub fn shutdown(&self) {
        self.shared.exit_requested.store(true, Ordering::Release);
        let _ = self
            .shared
            .bus
            .cancel_waiting_subscription(self.shared.channel, self.shared.subscriber_id);
        {
            let _guard = self.shared.wake_lock.lock().unwrap();
            self.shared.wake_cv.notify_all();
        }

        for _ in 0..self.shared.config.shutdown_grace_steps {
            let sub_done = self
                .shared
                .subscriber_handle
                .lock()
                .unwrap()
                .as_ref()
                .map(JoinHandle::is_finished)
                .unwrap_or(true);
            let watch_done = self
                .watcher_handle
                .lock()
                .unwrap()
                .as_ref()
                .map(JoinHandle::is_finished)
                .unwrap_or(true);
            if sub_done && watch_done {
                break;
            }
            std::thread::sleep(self.shared.config.shutdown_grace_step);
        }

        join_or_detach(
            "subscriber",
            self.shared.subscriber_id,
            self.shared.subscriber_handle.lock().unwrap().take(),
        );
        join_or_detach(
            "watcher",
            self.shared.subscriber_id,
            self.watcher_handle.lock().unwrap().take(),
        );
    }
}

impl Drop for SubscriptionClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join_or_detach(which: &str, id: SubscriberId, handle: Option<JoinHandle<()>>) {
    match handle {
        Some(h) if h.is_finished() => {
            let _ = h.join();
        }
        Some(_) => {
            log::warn!("{which} loop for {id} did not exit within the shutdown grace window; detaching");
        }
        None => {}
    }
}

fn spawn_subscriber_loop(shared: Arc<Shared>) -> JoinHandle<()> {
    std::thread::spawn(move || subscriber_loop(shared))
}

fn subscriber_loop(shared: Arc<Shared>) {
    let mut signalled = false;
    loop {
        if shared.exit_requested.load(Ordering::Acquire) {
            break;
        }
        match shared
            .bus
            .subscribe(shared.channel, shared.subscriber_id, shared.config.subscribe_poll_timeout)
        {
            Ok(SubscribeOutcome::GotEvent(payload)) => {
                dispatch(&shared.callbacks, payload);
                shared.alive.store(true, Ordering::Release);
            }
            Ok(SubscribeOutcome::TimedOut) => {
                shared.alive.store(true, Ordering::Release);
            }
            Ok(SubscribeOutcome::Cancelled) => {
                log::debug!("subscriber loop for {} cancelled", shared.subscriber_id);
                break;
            }
            Err(err) => {
                log::warn!("subscriber loop for {} exiting on error: {err}", shared.subscriber_id);
                break;
            }
        }
        if !signalled {
            shared.started.signal();
            signalled = true;
        }
    }
}

fn spawn_watcher_loop(shared: Arc<Shared>) -> JoinHandle<()> {
    std::thread::spawn(move || watcher_loop(shared))
}

fn watcher_loop(shared: Arc<Shared>) {
    loop {
        {
            let guard = shared.wake_lock.lock().unwrap();
            let _ = shared
                .wake_cv
                .wait_timeout(guard, shared.config.watcher_tick_interval)
                .unwrap();
        }
        if shared.exit_requested.load(Ordering::Acquire) {
            break;
        }

        (shared.callbacks.on_tick)();

        let was_alive = shared.alive.swap(false, Ordering::AcqRel);
        if !was_alive && !shared.exit_requested.load(Ordering::Acquire) {
            log::warn!(
                "subscriber loop for {} missed its liveness tick; restarting",
                shared.subscriber_id
            );
            (shared.callbacks.on_watcher_failed)();
            restart_subscriber(&shared);
        }

        if let Err(err) = shared.bus.clean_up_unused_resources() {
            log::warn!("clean_up_unused_resources failed: {err}");
        }
    }
}

fn restart_subscriber(shared: &Arc<Shared>) {
    let mut guard = shared.subscriber_handle.lock().unwrap();
    match guard.take() {
        Some(old) if old.is_finished() => {
            let _ = old.join();
        }
        Some(_) => {
            log::warn!(
                "previous subscriber loop for {} still running at restart time; detaching it",
                shared.subscriber_id
            );
        }
        None => {}
    }
    // Cancel any stale wait the old loop left behind so a reused
    // subscriber-id slot does not look perpetually "waiting".
    let _ = shared
        .bus
        .cancel_waiting_subscription(shared.channel, shared.subscriber_id);
    *guard = Some(spawn_subscriber_loop(shared.clone()));
}

fn dispatch(callbacks: &Callbacks, payload: EventPayload) {
    let kind = payload.kind;
    let path = payload.full_path.clone();
    let result = match kind {
        EventKind::Init => Ok(()),
        EventKind::AddBadge => (callbacks.on_add_badge)(
            &payload.full_path,
            payload.badge_kind,
            payload.publisher_pid,
            payload.publisher_syncbox_id,
        ),
        EventKind::RemoveBadge => {
            (callbacks.on_remove_badge)(
                &payload.full_path,
                payload.publisher_pid,
                payload.publisher_syncbox_id,
            );
            Ok(())
        }
        EventKind::AddRoot => root_selector(payload.subkind.0).and_then(|selector| {
            (callbacks.on_add_root)(
                &payload.full_path,
                selector,
                payload.publisher_pid,
                payload.publisher_syncbox_id,
            )
        }),
        EventKind::RemoveRoot => root_selector(payload.subkind.0).and_then(|selector| {
            (callbacks.on_remove_root)(
                &payload.full_path,
                selector,
                payload.publisher_pid,
                payload.publisher_syncbox_id,
            )
        }),
    };
    if let Err(err) = result {
        log::error!("callback for {kind:?} on {path:?} failed: {err}");
    }
}

fn root_selector(subkind: u32) -> Result<RootSelector> {
    Ok(match BadgeKind::from_u32(subkind)? {
        BadgeKind::None => None,
        other => Some(other),
    })
}
