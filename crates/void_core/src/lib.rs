//! # void_core - Void Engine Core
//!
//! Zero-dependency primitives shared by the inventory and persistence crates:
//! - **Identity**: monotonic 64-bit counters that can be fast-forwarded after
//!   restoring saved data
//! - **Codec**: little-endian binary writer/reader used by the replication
//!   protocol and the save format
//! - **Errors**: codec error type with no external dependencies

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod codec;
pub mod error;
pub mod id;

pub use codec::*;
pub use error::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::{ByteReader, ByteWriter};
    pub use crate::error::{CodecError, CodecResult};
    pub use crate::id::IdCounter;
}
