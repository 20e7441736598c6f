use thiserror::Error;

/// Error taxonomy for the bus, the badge store, and the region beneath them.
///
/// Nothing here crosses the host overlay ABI boundary: `overlay::OverlayAdapter`
/// converts every variant into a conservative "no overlay" answer before it
/// reaches the shell host.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to attach shared region {name:?}: {source}")]
    AttachError {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shared memory corrupt: {0}")]
    SharedMemoryCorrupt(&'static str),

    #[error("subscriber queue overflow for subscriber {subscriber}")]
    Overflow { subscriber: String },

    #[error("operation timed out")]
    TimedOut,

    #[error("subscription cancelled")]
    Cancelled,

    #[error("invariant violated: {0}")]
    InvariantViolated(&'static str),

    #[error("owner process {pid} is dead")]
    OwnerDead { pid: u32 },

    #[error("bus is terminating")]
    Terminating,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
