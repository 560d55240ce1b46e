//! Hash providers for the sketch.
//!
//! Every tier probes its storage with `hash(key, seed)`, where the seed is the
//! layer index. For the estimates to hold, values produced for different seeds
//! on the same key must behave like independent random probes.
use crate::{cfg_std, cfg_xxhash, DefaultHashBuilder, MAX_LAYERS};
use core::hash::{BuildHasher, Hasher};

/// `FlowHasher` maps a flow key and a layer seed to a 32-bit value.
pub trait FlowHasher {
    /// hash the key for the given layer
    fn hash(&self, key: &[u8], seed: u32) -> u32;
}

impl<F> FlowHasher for F
where
    F: Fn(&[u8], u32) -> u32,
{
    fn hash(&self, key: &[u8], seed: u32) -> u32 {
        self(key, seed)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "xxhash")] {
        /// The hasher used by [`FunnelSketch::new`].
        ///
        /// [`FunnelSketch::new`]: struct.FunnelSketch.html#method.new
        pub type DefaultFlowHasher = XxFlowHasher;
    } else {
        /// The hasher used by [`FunnelSketch::new`].
        ///
        /// [`FunnelSketch::new`]: struct.FunnelSketch.html#method.new
        pub type DefaultFlowHasher = BuildFlowHasher<DefaultHashBuilder>;
    }
}

cfg_xxhash!(
    /// `XxFlowHasher` seeds xxHash32 with `base + seed`.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct XxFlowHasher {
        base: u32,
    }

    impl XxFlowHasher {
        /// Returns a hasher with base seed 0.
        pub fn new() -> Self {
            Self { base: 0 }
        }

        /// Returns a hasher whose layer seeds start at `base`.
        ///
        /// Two sketches only agree on where a key lands when their bases agree.
        pub fn with_base(base: u32) -> Self {
            Self { base }
        }

        /// Returns the base seed.
        pub fn base(&self) -> u32 {
            self.base
        }
    }

    impl FlowHasher for XxFlowHasher {
        #[inline]
        fn hash(&self, key: &[u8], seed: u32) -> u32 {
            xxhash_rust::xxh32::xxh32(key, self.base.wrapping_add(seed))
        }
    }
);

cfg_std!(
    #[cfg(feature = "xxhash")]
    impl XxFlowHasher {
        /// Returns a hasher with a random base seed, so that collisions differ
        /// from one sketch instance to another.
        pub fn random() -> Self {
            use rand::Rng;
            Self {
                base: rand::thread_rng().gen::<u32>(),
            }
        }
    }
);

/// `BuildFlowHasher` adapts any [`BuildHasher`] into a [`FlowHasher`].
///
/// The seed is written before the key, and the 64-bit output is folded to
/// 32 bits.
///
/// [`BuildHasher`]: https://doc.rust-lang.org/core/hash/trait.BuildHasher.html
/// [`FlowHasher`]: trait.FlowHasher.html
#[derive(Clone, Debug, Default)]
pub struct BuildFlowHasher<S = DefaultHashBuilder> {
    builder: S,
}

impl<S: BuildHasher> BuildFlowHasher<S> {
    /// Wraps the hash builder.
    pub fn new(builder: S) -> Self {
        Self { builder }
    }

    /// Returns the inner hash builder.
    pub fn builder(&self) -> &S {
        &self.builder
    }
}

impl<S: BuildHasher> FlowHasher for BuildFlowHasher<S> {
    fn hash(&self, key: &[u8], seed: u32) -> u32 {
        let mut h = self.builder.build_hasher();
        h.write_u32(seed);
        h.write(key);
        let v = h.finish();
        (v ^ (v >> 32)) as u32
    }
}

/// The per-layer hash values of one key, computed once per operation.
pub(crate) struct Probes {
    values: [u32; MAX_LAYERS],
}

impl Probes {
    pub(crate) fn new<H: FlowHasher>(hasher: &H, key: &[u8], layers: usize) -> Self {
        let mut values = [0u32; MAX_LAYERS];
        values
            .iter_mut()
            .take(layers)
            .enumerate()
            .for_each(|(seed, v)| *v = hasher.hash(key, seed as u32));
        Self { values }
    }

    #[inline]
    pub(crate) fn get(&self, layer: usize) -> u32 {
        self.values[layer]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fnv::FnvBuildHasher;

    #[test]
    fn test_closure_hasher() {
        let h = |key: &[u8], seed: u32| key.len() as u32 + seed;
        assert_eq!(FlowHasher::hash(&h, b"abc", 2), 5);
    }

    #[test]
    fn test_build_flow_hasher_seeds_differ() {
        let h = BuildFlowHasher::new(FnvBuildHasher::default());
        assert_eq!(h.hash(b"flow", 0), h.hash(b"flow", 0));
        assert_ne!(h.hash(b"flow", 0), h.hash(b"flow", 1));
    }

    #[cfg(feature = "xxhash")]
    #[test]
    fn test_xx_flow_hasher() {
        let h = XxFlowHasher::new();
        assert_eq!(h.hash(b"flow", 3), xxhash_rust::xxh32::xxh32(b"flow", 3));
        assert_ne!(h.hash(b"flow", 0), h.hash(b"flow", 1));

        let shifted = XxFlowHasher::with_base(7);
        assert_eq!(shifted.hash(b"flow", 0), h.hash(b"flow", 7));
    }

    #[test]
    fn test_probes() {
        let h = |_: &[u8], seed: u32| seed * 10;
        let p = Probes::new(&h, b"k", 3);
        assert_eq!(p.get(0), 0);
        assert_eq!(p.get(1), 10);
        assert_eq!(p.get(2), 20);
        assert_eq!(p.get(3), 0);
    }
}
