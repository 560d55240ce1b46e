use crate::bucket::{Cells, MiddleTier, BYTE_CAPACITY, WORD_CAPACITY, WORD_SATURATED};
use crate::hash::{DefaultFlowHasher, FlowHasher, Probes};
use crate::heavy::HeavyArray;
use crate::light::{LightTier, LIGHT_CAPACITY};
use crate::{FunnelSketchError, Outcome, MAX_LAYERS};
use core::fmt::{Debug, Formatter};

/// Default ratio a key's 16-bit estimate must reach, relative to the lightest
/// tracked key, to take over its key-value slot.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 2.0;

/// Default number of bytes reserved for the key of every key-value slot,
/// enough for an IPv6 5-tuple.
pub const DEFAULT_KEY_CAPACITY: usize = 40;

const BYTE_BASE: u32 = LIGHT_CAPACITY;
const SLOT_BASE: u32 = BYTE_BASE + BYTE_CAPACITY;
const HEAVY_BASE: u32 = SLOT_BASE + WORD_CAPACITY;

/// The tier that resolved an estimate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// 4-bit counters
    Light,
    /// 8-bit counters
    Byte,
    /// An exact key-value slot
    KeyValue,
    /// 16-bit counters
    Word,
    /// 32-bit heavy array
    Heavy,
}

/// `FunnelConfig` holds the dimensions of a [`FunnelSketch`].
///
/// All sizes must be positive, and both layer counts at most [`MAX_LAYERS`].
///
/// [`FunnelSketch`]: struct.FunnelSketch.html
/// [`MAX_LAYERS`]: constant.MAX_LAYERS.html
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FunnelConfig {
    /// Number of 4-bit counter layers
    pub light_layers: usize,
    /// Number of bucket layers
    pub middle_layers: usize,
    /// Number of 4-bit counters in each light layer, rounded up to even
    pub light_counters: usize,
    /// Number of buckets in each middle layer
    pub buckets: usize,
    /// Number of 32-bit counters in the heavy array
    pub heavy_counters: usize,
    /// Number of 8-bit counters in each bucket
    pub bucket_8bit_len: usize,
    /// Number of 16-bit counters in each bucket
    pub bucket_16bit_len: usize,
    /// Promotion threshold ratio
    pub threshold_ratio: f64,
    /// Longest key a key-value slot can hold
    pub key_capacity: usize,
}

impl FunnelConfig {
    /// Returns a config with the given dimensions, [`DEFAULT_THRESHOLD_RATIO`]
    /// and [`DEFAULT_KEY_CAPACITY`].
    ///
    /// [`DEFAULT_THRESHOLD_RATIO`]: constant.DEFAULT_THRESHOLD_RATIO.html
    /// [`DEFAULT_KEY_CAPACITY`]: constant.DEFAULT_KEY_CAPACITY.html
    pub fn new(
        light_layers: usize,
        middle_layers: usize,
        light_counters: usize,
        buckets: usize,
        heavy_counters: usize,
        bucket_8bit_len: usize,
        bucket_16bit_len: usize,
    ) -> Self {
        Self {
            light_layers,
            middle_layers,
            light_counters,
            buckets,
            heavy_counters,
            bucket_8bit_len,
            bucket_16bit_len,
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
            key_capacity: DEFAULT_KEY_CAPACITY,
        }
    }

    /// Checks every dimension, returning the first invalid one.
    pub fn validate(&self) -> Result<(), FunnelSketchError> {
        for &layers in [self.light_layers, self.middle_layers].iter() {
            if layers == 0 || layers > MAX_LAYERS {
                return Err(FunnelSketchError::InvalidLayers(layers));
            }
        }

        if self.light_counters == 0 {
            return Err(FunnelSketchError::InvalidLightCounters(self.light_counters));
        }

        if self.buckets == 0 {
            return Err(FunnelSketchError::InvalidBuckets(self.buckets));
        }

        if self.heavy_counters == 0 {
            return Err(FunnelSketchError::InvalidHeavyCounters(self.heavy_counters));
        }

        if self.bucket_8bit_len == 0 {
            return Err(FunnelSketchError::InvalidBucket8BitLen(self.bucket_8bit_len));
        }

        if self.bucket_16bit_len == 0 {
            return Err(FunnelSketchError::InvalidBucket16BitLen(self.bucket_16bit_len));
        }

        if self.key_capacity == 0 {
            return Err(FunnelSketchError::InvalidKeyCapacity(self.key_capacity));
        }

        if !(self.threshold_ratio.is_finite() && self.threshold_ratio > 0.0) {
            return Err(FunnelSketchError::InvalidThresholdRatio(self.threshold_ratio));
        }

        Ok(())
    }
}

/// `FunnelSketchBuilder` is used to help build a [`FunnelSketch`] with custom configurations.
///
/// [`FunnelSketch`]: struct.FunnelSketch.html
pub struct FunnelSketchBuilder<H = DefaultFlowHasher> {
    config: FunnelConfig,
    hasher: H,
}

impl Default for FunnelSketchBuilder {
    fn default() -> Self {
        Self {
            config: FunnelConfig::new(0, 0, 0, 0, 0, 0, 0),
            hasher: DefaultFlowHasher::default(),
        }
    }
}

impl FunnelSketchBuilder {
    /// Returns a builder with every size unset and the default hasher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: FlowHasher> FunnelSketchBuilder<H> {
    /// Set the number of 4-bit counter layers
    pub fn set_light_layers(self, layers: usize) -> Self {
        self.map_config(|c| c.light_layers = layers)
    }

    /// Set the number of bucket layers
    pub fn set_middle_layers(self, layers: usize) -> Self {
        self.map_config(|c| c.middle_layers = layers)
    }

    /// Set the number of 4-bit counters per light layer
    pub fn set_light_counters(self, counters: usize) -> Self {
        self.map_config(|c| c.light_counters = counters)
    }

    /// Set the number of buckets per middle layer
    pub fn set_buckets(self, buckets: usize) -> Self {
        self.map_config(|c| c.buckets = buckets)
    }

    /// Set the number of 32-bit counters in the heavy array
    pub fn set_heavy_counters(self, counters: usize) -> Self {
        self.map_config(|c| c.heavy_counters = counters)
    }

    /// Set the number of 8-bit counters per bucket
    pub fn set_bucket_8bit_len(self, len: usize) -> Self {
        self.map_config(|c| c.bucket_8bit_len = len)
    }

    /// Set the number of 16-bit counters per bucket
    pub fn set_bucket_16bit_len(self, len: usize) -> Self {
        self.map_config(|c| c.bucket_16bit_len = len)
    }

    /// Set the promotion threshold ratio
    pub fn set_threshold_ratio(self, ratio: f64) -> Self {
        self.map_config(|c| c.threshold_ratio = ratio)
    }

    /// Set the key capacity of the key-value slots
    pub fn set_key_capacity(self, capacity: usize) -> Self {
        self.map_config(|c| c.key_capacity = capacity)
    }

    /// Replace every dimension with the given config
    pub fn set_config(self, config: FunnelConfig) -> Self {
        Self {
            config,
            hasher: self.hasher,
        }
    }

    /// Set the hasher
    pub fn set_hasher<NH: FlowHasher>(self, hasher: NH) -> FunnelSketchBuilder<NH> {
        FunnelSketchBuilder {
            config: self.config,
            hasher,
        }
    }

    /// Finalize the builder to [`FunnelSketch`]
    ///
    /// [`FunnelSketch`]: struct.FunnelSketch.html
    pub fn finalize(self) -> Result<FunnelSketch<H>, FunnelSketchError> {
        FunnelSketch::with_hasher(self.config, self.hasher)
    }

    fn map_config(mut self, f: impl FnOnce(&mut FunnelConfig)) -> Self {
        f(&mut self.config);
        self
    }
}

/// `FunnelSketch` estimates how often each key of a stream was inserted, and
/// never reports less than the true count.
///
/// Counts funnel through four tiers of growing width. Every key starts in
/// conservative-update 4-bit counters; once those saturate the rest flows into
/// 8-bit counters, then into a per-bucket key-value slot that tracks a heavy
/// key exactly (or, when all candidate slots belong to other keys, into
/// 16-bit counters), and finally into a shared array of 32-bit counters.
///
/// A key counted in the 16-bit tier takes over the lightest candidate slot as
/// soon as its estimate reaches `threshold_ratio` times the slot's value.
///
/// The sketch does no locking; share it across threads behind your own lock,
/// or keep one sketch per worker.
///
/// # Example
///
/// ```rust
/// use funnelsketch::{FunnelConfig, FunnelSketch};
///
/// let mut sketch = FunnelSketch::new(FunnelConfig::new(2, 2, 1024, 256, 64, 4, 2)).unwrap();
///
/// sketch.insert(b"10.0.0.1:443", 10);
/// assert_eq!(sketch.query(b"10.0.0.1:443"), 10);
///
/// sketch.insert(b"10.0.0.1:443", 10);
/// assert!(sketch.query(b"10.0.0.1:443") >= 20);
/// ```
pub struct FunnelSketch<H = DefaultFlowHasher> {
    config: FunnelConfig,
    light: LightTier,
    middle: MiddleTier,
    heavy: HeavyArray,
    hasher: H,
}

impl FunnelSketch {
    /// Creates a sketch with the default hasher.
    pub fn new(config: FunnelConfig) -> Result<Self, FunnelSketchError> {
        Self::with_hasher(config, DefaultFlowHasher::default())
    }

    /// Returns a [`FunnelSketchBuilder`] to help build a [`FunnelSketch`].
    ///
    /// # Example
    /// ```rust
    /// use funnelsketch::{BuildFlowHasher, FunnelSketch};
    /// use rustc_hash::FxHasher;
    /// use std::hash::BuildHasherDefault;
    ///
    /// let mut sketch = FunnelSketch::builder()
    ///     .set_light_layers(3)
    ///     .set_middle_layers(2)
    ///     .set_light_counters(4096)
    ///     .set_buckets(512)
    ///     .set_heavy_counters(128)
    ///     .set_bucket_8bit_len(8)
    ///     .set_bucket_16bit_len(4)
    ///     .set_hasher(BuildFlowHasher::new(BuildHasherDefault::<FxHasher>::default()))
    ///     .finalize()
    ///     .unwrap();
    ///
    /// assert_eq!(sketch.increment(b"flow"), 1);
    /// ```
    ///
    /// [`FunnelSketchBuilder`]: struct.FunnelSketchBuilder.html
    /// [`FunnelSketch`]: struct.FunnelSketch.html
    pub fn builder() -> FunnelSketchBuilder {
        FunnelSketchBuilder::new()
    }
}

impl<H: FlowHasher> FunnelSketch<H> {
    /// Creates a sketch probing its tiers with `hasher`.
    pub fn with_hasher(config: FunnelConfig, hasher: H) -> Result<Self, FunnelSketchError> {
        config.validate()?;

        Ok(Self {
            light: LightTier::new(config.light_layers, config.light_counters),
            middle: MiddleTier::new(
                config.middle_layers,
                config.buckets,
                config.bucket_8bit_len,
                config.bucket_16bit_len,
                config.key_capacity,
            ),
            heavy: HeavyArray::new(config.heavy_counters),
            config,
            hasher,
        })
    }

    #[inline]
    fn probes(&self, key: &[u8]) -> Probes {
        Probes::new(
            &self.hasher,
            key,
            self.light.layers().max(self.middle.layers()),
        )
    }

    /// Adds `count` occurrences of `key` and returns its new estimate.
    ///
    /// A zero `count` leaves the sketch untouched and returns the current
    /// estimate.
    pub fn insert(&mut self, key: &[u8], count: u32) -> u32 {
        if count == 0 {
            return self.query(key);
        }

        let probes = self.probes(key);

        let remaining = match self.light.insert(&probes, count) {
            Outcome::Absorbed(v) => return v,
            Outcome::Overflow(r) => r,
        };
        sketch_trace!(remaining, "light tier saturated");

        let cells = self.middle.locate(&probes);
        let remaining = match self.middle.insert_bytes(&cells, remaining) {
            Outcome::Absorbed(v) => return BYTE_BASE + v,
            Outcome::Overflow(r) => r,
        };
        sketch_trace!(remaining, "8-bit tier saturated");

        let heavy_hash = probes.get(0);
        if let Some(layer) = self.middle.find_slot(&cells, key) {
            return match self.middle.insert_slot(&cells, layer, key, remaining) {
                Outcome::Absorbed(v) => SLOT_BASE + v,
                Outcome::Overflow(excess) => {
                    sketch_trace!(layer, excess, "key-value slot saturated");
                    HEAVY_BASE.saturating_add(self.heavy.add(heavy_hash, excess))
                }
            };
        }

        let (estimate, observed) = match self.middle.insert_words(&cells, remaining) {
            Outcome::Absorbed(v) => (SLOT_BASE + v, v),
            Outcome::Overflow(excess) => {
                sketch_trace!(excess, "16-bit tier saturated");
                let estimate = HEAVY_BASE.saturating_add(self.heavy.add(heavy_hash, excess));
                (estimate, WORD_SATURATED)
            }
        };
        self.promote(&cells, key, observed);
        estimate
    }

    /// Adds one occurrence of `key` and returns its new estimate.
    #[inline]
    pub fn increment(&mut self, key: &[u8]) -> u32 {
        self.insert(key, 1)
    }

    /// Hands the lightest candidate slot to `key` once the post-update 16-bit
    /// estimate reaches `threshold_ratio` times that slot's value.
    fn promote(&mut self, cells: &Cells, key: &[u8], observed: u32) {
        if !self.middle.fits(key) {
            return;
        }

        let (layer, tracked) = match self.middle.min_slot(cells) {
            Some(v) => v,
            None => return,
        };

        if f64::from(observed) >= f64::from(tracked) * self.config.threshold_ratio {
            self.middle.evict(&self.hasher, cells, layer, key, observed);
            sketch_debug!(layer, tracked, observed, "promoted key into key-value slot");
        }
    }

    /// Returns the estimate for `key`.
    pub fn query(&self, key: &[u8]) -> u32 {
        self.query_with_tier(key).0
    }

    /// Returns the estimate for `key` along with the tier that resolved it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use funnelsketch::{FunnelConfig, FunnelSketch, Tier};
    ///
    /// let mut sketch = FunnelSketch::new(FunnelConfig::new(2, 2, 64, 16, 8, 2, 2)).unwrap();
    /// sketch.insert(b"a", 14);
    /// assert_eq!(sketch.query_with_tier(b"a"), (14, Tier::Light));
    ///
    /// sketch.insert(b"a", 1);
    /// assert_eq!(sketch.query_with_tier(b"a"), (15, Tier::Byte));
    /// ```
    pub fn query_with_tier(&self, key: &[u8]) -> (u32, Tier) {
        let probes = self.probes(key);
        if let Some(v) = self.light.query(&probes) {
            return (v, Tier::Light);
        }

        let cells = self.middle.locate(&probes);
        if let Some(v) = self.middle.query_bytes(&cells) {
            return (BYTE_BASE + v, Tier::Byte);
        }

        let heavy = HEAVY_BASE.saturating_add(self.heavy.get(probes.get(0)));
        match self.middle.query_slot(&cells, key) {
            Some(v) if v < WORD_SATURATED => return (SLOT_BASE + v, Tier::KeyValue),
            Some(_) => return (heavy, Tier::Heavy),
            None => {}
        }

        match self.middle.query_words(&cells) {
            Some(v) => (SLOT_BASE + v, Tier::Word),
            None => (heavy, Tier::Heavy),
        }
    }

    /// Iterates the keys currently holding a key-value slot, with their
    /// estimates.
    pub fn heavy_hitters(&self) -> impl Iterator<Item = (&[u8], u32)> + '_ {
        self.middle
            .tracked()
            .map(move |key| (key, self.query(key)))
    }

    /// Resets every counter and slot, keeping the allocated storage.
    pub fn clear(&mut self) {
        self.light.clear();
        self.middle.clear();
        self.heavy.clear();
    }

    /// Returns the config the sketch was built with.
    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// Returns the hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Approximate memory used by the counters and key-value slots, in bytes.
    pub fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.light.size_bytes()
            + self.middle.size_bytes()
            + self.heavy.size_bytes()
    }
}

impl<H> Debug for FunnelSketch<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FunnelSketch")
            .field("config", &self.config)
            .field("light", &self.light)
            .field("middle", &self.middle)
            .field("heavy", &self.heavy)
            .finish()
    }
}
