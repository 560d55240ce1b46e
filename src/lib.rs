//! A multi-tier frequency sketch with heavy-key promotion (support no_std).
//!
//! [`FunnelSketch`] estimates how many times each key (typically a network
//! flow identifier) has been inserted, using bounded memory and never
//! under-counting. Counts cascade from 4-bit to 8-bit counters, then into
//! exact per-bucket key-value slots or 16-bit counters, and finally into a
//! 32-bit heavy array. Most keys cost a few bits; the few heavy ones are
//! tracked exactly.
//!
//! ## Example
//!
//! ```rust
//! use funnelsketch::{FunnelConfig, FunnelSketch};
//!
//! let config = FunnelConfig::new(3, 2, 1 << 16, 4096, 1024, 8, 4);
//! let mut sketch = FunnelSketch::new(config).unwrap();
//!
//! for _ in 0..1000 {
//!     sketch.increment(b"192.168.0.1:53 -> 8.8.8.8:53 udp");
//! }
//! assert!(sketch.query(b"192.168.0.1:53 -> 8.8.8.8:53 udp") >= 1000);
//! ```
//!
//! ## Feature flags
//!
//! - `std` (default): `std::error::Error` and [`XxFlowHasher::random`].
//! - `xxhash` (default): xxHash32 as the default hasher.
//! - `hashbrown`: use hashbrown's hash builder for [`DefaultHashBuilder`].
//! - `tracing`: emit `tracing` events on tier escalation and key promotion.
//!
//! [`FunnelSketch`]: struct.FunnelSketch.html
//! [`XxFlowHasher::random`]: struct.XxFlowHasher.html#method.random
//! [`DefaultHashBuilder`]: type.DefaultHashBuilder.html
#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
extern crate alloc;
#[cfg(feature = "hashbrown")]
extern crate hashbrown;

#[cfg(any(test, feature = "std", not(feature = "hashbrown")))]
extern crate std;

#[macro_use]
mod macros;

mod bucket;
mod error;
mod hash;
mod heavy;
mod light;
mod sketch;

pub use error::FunnelSketchError;
pub use hash::{BuildFlowHasher, DefaultFlowHasher, FlowHasher};
pub use sketch::{
    FunnelConfig, FunnelSketch, FunnelSketchBuilder, Tier, DEFAULT_KEY_CAPACITY,
    DEFAULT_THRESHOLD_RATIO,
};

cfg_xxhash!(
    pub use hash::XxFlowHasher;
);

/// Upper bound on the number of light and middle layers.
pub const MAX_LAYERS: usize = 32;

#[cfg(feature = "hashbrown")]
/// The hash builder behind [`BuildFlowHasher`] by default.
///
/// [`BuildFlowHasher`]: struct.BuildFlowHasher.html
pub type DefaultHashBuilder = hashbrown::hash_map::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
/// The hash builder behind [`BuildFlowHasher`] by default.
///
/// [`BuildFlowHasher`]: struct.BuildFlowHasher.html
pub type DefaultHashBuilder =
    core::hash::BuildHasherDefault<std::collections::hash_map::DefaultHasher>;

/// Result of inserting into one tier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The tier absorbed the count; carries the value within the tier.
    Absorbed(u32),
    /// The tier saturated; carries the count left for the next tier.
    Overflow(u32),
}
