//! `overlay-bus-cli`: a manual test harness for the bus, standing in for the
//! original COM test harness (`BadgeComTestComSide`) that simulated the
//! shell host (SPEC_FULL.md §B.6). `publish` and `subscribe` drive the bus
//! directly; `inspect` dumps the region's subscription registry; `doctor`
//! runs one liveness sweep.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use overlay_bus::badge::BadgeKind;
use overlay_bus::bus::event::{EventKind, EventPayload, Subkind};
use overlay_bus::ids::{SubscriberId, SyncboxId};
use overlay_bus::{BusServer, Channel, SubscribeOutcome};

#[derive(Parser)]
#[command(name = "overlay-bus-cli", version, about = "Manual inspection tool for the overlay event bus")]
struct Cli {
    /// Shared region name (matches the name every overlay handler attaches to).
    #[arg(long, default_value = "default")]
    region: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    AppToOverlay,
    OverlayToApp,
}

impl From<ChannelArg> for Channel {
    fn from(value: ChannelArg) -> Self {
        match value {
            ChannelArg::AppToOverlay => Channel::AppToOverlay,
            ChannelArg::OverlayToApp => Channel::OverlayToApp,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EventKindArg {
    Init,
    AddRoot,
    RemoveRoot,
    AddBadge,
    RemoveBadge,
}

impl From<EventKindArg> for EventKind {
    fn from(value: EventKindArg) -> Self {
        match value {
            EventKindArg::Init => EventKind::Init,
            EventKindArg::AddRoot => EventKind::AddRoot,
            EventKindArg::RemoveRoot => EventKind::RemoveRoot,
            EventKindArg::AddBadge => EventKind::AddBadge,
            EventKindArg::RemoveBadge => EventKind::RemoveBadge,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum BadgeKindArg {
    None,
    Synced,
    Syncing,
    Failed,
    Selective,
}

impl From<BadgeKindArg> for BadgeKind {
    fn from(value: BadgeKindArg) -> Self {
        match value {
            BadgeKindArg::None => BadgeKind::None,
            BadgeKindArg::Synced => BadgeKind::Synced,
            BadgeKindArg::Syncing => BadgeKind::Syncing,
            BadgeKindArg::Failed => BadgeKind::Failed,
            BadgeKindArg::Selective => BadgeKind::Selective,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Publish one event onto a channel.
    Publish {
        #[arg(long, value_enum)]
        channel: ChannelArg,
        #[arg(long, value_enum)]
        kind: EventKindArg,
        #[arg(long, value_enum, default_value = "none")]
        badge_kind: BadgeKindArg,
        #[arg(long)]
        path: String,
        #[arg(long, default_value_t = std::process::id())]
        pid: u32,
    },
    /// Block waiting for events on a channel and print each as it arrives.
    Subscribe {
        #[arg(long, value_enum)]
        channel: ChannelArg,
        #[arg(long)]
        timeout_secs: u64,
        /// Stop after this many events (default: run until timeout).
        #[arg(long)]
        count: Option<usize>,
    },
    /// Dump the subscription registry for both channels.
    Inspect,
    /// Run one liveness sweep (`CleanUpUnusedResources`).
    Doctor,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let bus = match BusServer::attach(&cli.region) {
        Ok(bus) => Arc::new(bus),
        Err(err) => {
            eprintln!("failed to attach region {:?}: {err}", cli.region);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Publish {
            channel,
            kind,
            badge_kind,
            path,
            pid,
        } => {
            let payload = EventPayload::new(
                kind.into(),
                Subkind(0),
                badge_kind.into(),
                path,
                pid as u64,
                0,
                SyncboxId::generate(),
            );
            match bus.publish(channel.into(), payload) {
                Ok(outcome) if outcome.overflowed.is_empty() => {
                    println!("published");
                    ExitCode::SUCCESS
                }
                Ok(outcome) => {
                    println!("published with overflow for {} subscriber(s)", outcome.overflowed.len());
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("publish failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Subscribe {
            channel,
            timeout_secs,
            count,
        } => {
            let id = SubscriberId::generate();
            println!("subscriber-id: {id}");
            let deadline = std::time::Instant::now() + Duration::from_secs(timeout_secs);
            let mut seen = 0usize;
            loop {
                if std::time::Instant::now() >= deadline {
                    break;
                }
                if let Some(limit) = count {
                    if seen >= limit {
                        break;
                    }
                }
                match bus.subscribe(channel.into(), id, Duration::from_secs(1)) {
                    Ok(SubscribeOutcome::GotEvent(event)) => {
                        println!(
                            "{:?} badge={:?} path={:?} pub_pid={} syncbox={} seq={}",
                            event.kind,
                            event.badge_kind,
                            event.full_path,
                            event.publisher_pid,
                            event.publisher_syncbox_id,
                            event.seq
                        );
                        seen += 1;
                    }
                    Ok(SubscribeOutcome::TimedOut) => continue,
                    Ok(SubscribeOutcome::Cancelled) => {
                        println!("cancelled");
                        break;
                    }
                    Err(err) => {
                        eprintln!("subscribe failed: {err}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Commands::Inspect => {
            for (name, channel) in [
                ("App->Overlay", Channel::AppToOverlay),
                ("Overlay->App", Channel::OverlayToApp),
            ] {
                let guard = match bus.region().lock() {
                    Ok(guard) => guard,
                    Err(err) => {
                        eprintln!("failed to lock region: {err}");
                        return ExitCode::FAILURE;
                    }
                };
                let block = bus.region().channel(channel.index());
                let subs = overlay_bus::bus::registry::ordered_subscriptions(block);
                println!("{name}: {} subscriber(s)", subs.len());
                for slot in subs {
                    println!(
                        "  {} owner_pid={} waiting={} cancelled={}",
                        overlay_bus::bus::subscription::subscriber_id(slot),
                        overlay_bus::bus::subscription::owner_pid(slot),
                        overlay_bus::bus::subscription::is_waiting(slot),
                        overlay_bus::bus::subscription::is_cancelled(slot),
                    );
                }
                drop(guard);
            }
            ExitCode::SUCCESS
        }
        Commands::Doctor => match bus.clean_up_unused_resources() {
            Ok(()) => {
                println!("liveness sweep complete");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("liveness sweep failed: {err}");
                ExitCode::FAILURE
            }
        },
    }
}
