//! Framing sentinels for every fixed-layout record stored inside the region.
//!
//! A mismatch on read means either genuine corruption or a stale/incompatible
//! layout version, and both are treated identically: the caller gets
//! [`crate::Error::SharedMemoryCorrupt`] and aborts the operation.

pub const EVENT_SENTINEL: u64 = 0x1212_1212_1212_1212;
pub const SUBSCRIPTION_SENTINEL: u64 = 0xCACA_CACA_CACA_CACA;
pub const ROOT_SENTINEL: u64 = 0xACAC_ACAC_ACAC_ACAC;

pub const ROOT_MAGIC: u32 = 0x4F42_5553; // "OBUS"
pub const ROOT_VERSION: u32 = 1;

use crate::{Error, Result};

pub fn check(actual: u64, expected: u64, what: &'static str) -> Result<()> {
    if actual != expected {
        return Err(Error::SharedMemoryCorrupt(what));
    }
    Ok(())
}
