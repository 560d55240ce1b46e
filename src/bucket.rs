//! The middle tier: layers of buckets.
//!
//! Each bucket owns a small array of 8-bit counters, a small array of 16-bit
//! counters, and one key-value slot that tracks a single heavy key exactly.
//! Within a bucket, the counter index reuses the bucket hash
//! (`bucket % len`), so bucket and counter selection are correlated.
use crate::hash::{FlowHasher, Probes};
use crate::{Outcome, MAX_LAYERS};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

/// Saturation marker of an 8-bit counter.
pub(crate) const BYTE_SATURATED: u32 = u8::MAX as u32;
/// Largest count the 8-bit counters account for.
pub(crate) const BYTE_CAPACITY: u32 = BYTE_SATURATED - 1;
/// Saturation marker of a 16-bit counter or key-value slot.
pub(crate) const WORD_SATURATED: u32 = u16::MAX as u32;
/// Largest count the 16-bit counters and key-value slots account for.
pub(crate) const WORD_CAPACITY: u32 = WORD_SATURATED - 1;

/// Fixed-capacity key storage plus the aggregate tied to that key.
pub(crate) struct KeySlot {
    key: Box<[u8]>,
    len: usize,
    occupied: bool,
    value: u16,
}

impl KeySlot {
    fn new(capacity: usize) -> Self {
        Self {
            key: vec![0; capacity].into_boxed_slice(),
            len: 0,
            occupied: false,
            value: 0,
        }
    }

    pub(crate) fn key(&self) -> Option<&[u8]> {
        if self.occupied {
            Some(&self.key[..self.len])
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn value(&self) -> u32 {
        self.value as u32
    }

    #[inline]
    fn matches(&self, key: &[u8]) -> bool {
        self.occupied && &self.key[..self.len] == key
    }

    /// The caller checks that `key` fits the capacity.
    fn claim(&mut self, key: &[u8]) {
        self.key[..key.len()].copy_from_slice(key);
        self.len = key.len();
        self.occupied = true;
    }

    fn clear(&mut self) {
        self.key.iter_mut().for_each(|b| *b = 0);
        self.len = 0;
        self.occupied = false;
        self.value = 0;
    }
}

pub(crate) struct Bucket {
    bytes: Box<[u8]>,
    words: Box<[u16]>,
    slot: KeySlot,
}

impl Bucket {
    fn new(len8: usize, len16: usize, key_capacity: usize) -> Self {
        Self {
            bytes: vec![0; len8].into_boxed_slice(),
            words: vec![0; len16].into_boxed_slice(),
            slot: KeySlot::new(key_capacity),
        }
    }

    fn clear(&mut self) {
        self.bytes.iter_mut().for_each(|v| *v = 0);
        self.words.iter_mut().for_each(|v| *v = 0);
        self.slot.clear();
    }
}

/// Where a key lands in one middle layer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cell {
    bucket: usize,
    byte: usize,
    word: usize,
}

/// A key's cells in every middle layer, in layer order.
pub(crate) struct Cells {
    cells: [Cell; MAX_LAYERS],
    len: usize,
}

impl Cells {
    #[inline]
    fn iter(&self) -> core::slice::Iter<'_, Cell> {
        self.cells[..self.len].iter()
    }

    #[inline]
    fn get(&self, layer: usize) -> Cell {
        self.cells[layer]
    }
}

pub(crate) struct MiddleTier {
    layers: Vec<Vec<Bucket>>,
    buckets: usize,
    len8: usize,
    len16: usize,
    key_capacity: usize,
}

impl MiddleTier {
    pub(crate) fn new(
        layers: usize,
        buckets: usize,
        len8: usize,
        len16: usize,
        key_capacity: usize,
    ) -> Self {
        Self {
            layers: (0..layers)
                .map(|_| {
                    (0..buckets)
                        .map(|_| Bucket::new(len8, len16, key_capacity))
                        .collect()
                })
                .collect(),
            buckets,
            len8,
            len16,
            key_capacity,
        }
    }

    #[inline]
    pub(crate) fn layers(&self) -> usize {
        self.layers.len()
    }

    /// Whether `key` fits into a key-value slot.
    #[inline]
    pub(crate) fn fits(&self, key: &[u8]) -> bool {
        key.len() <= self.key_capacity
    }

    pub(crate) fn locate(&self, probes: &Probes) -> Cells {
        let mut cells = [Cell::default(); MAX_LAYERS];
        (0..self.layers.len()).for_each(|layer| {
            let bucket = probes.get(layer) as usize % self.buckets;
            cells[layer] = Cell {
                bucket,
                byte: bucket % self.len8,
                word: bucket % self.len16,
            };
        });
        Cells {
            cells,
            len: self.layers.len(),
        }
    }

    #[inline]
    fn bucket(&self, layer: usize, cell: Cell) -> &Bucket {
        &self.layers[layer][cell.bucket]
    }

    #[inline]
    fn bucket_mut(&mut self, layer: usize, cell: Cell) -> &mut Bucket {
        &mut self.layers[layer][cell.bucket]
    }

    fn min_byte(&self, cells: &Cells) -> u32 {
        cells
            .iter()
            .enumerate()
            .map(|(layer, &c)| self.bucket(layer, c).bytes[c.byte] as u32)
            .min()
            .unwrap_or(BYTE_SATURATED)
    }

    fn min_word(&self, cells: &Cells) -> u32 {
        cells
            .iter()
            .enumerate()
            .map(|(layer, &c)| self.bucket(layer, c).words[c.word] as u32)
            .min()
            .unwrap_or(WORD_SATURATED)
    }

    /// Conservative update of the probed 8-bit counters.
    pub(crate) fn insert_bytes(&mut self, cells: &Cells, remaining: u32) -> Outcome {
        let min = self.min_byte(cells);
        let candidate = min.saturating_add(remaining);

        if candidate < BYTE_SATURATED {
            for (layer, &c) in cells.iter().enumerate() {
                let counter = &mut self.bucket_mut(layer, c).bytes[c.byte];
                let v = *counter as u32;
                *counter = (v + remaining).min(candidate).max(v) as u8;
            }
            return Outcome::Absorbed(candidate);
        }

        for (layer, &c) in cells.iter().enumerate() {
            self.bucket_mut(layer, c).bytes[c.byte] = BYTE_SATURATED as u8;
        }
        Outcome::Overflow(remaining - BYTE_CAPACITY.saturating_sub(min))
    }

    pub(crate) fn query_bytes(&self, cells: &Cells) -> Option<u32> {
        let min = self.min_byte(cells);
        if min < BYTE_SATURATED {
            Some(min)
        } else {
            None
        }
    }

    /// Returns the layer of the bucket whose slot holds `key`, or failing that
    /// the first layer whose slot is unclaimed.
    pub(crate) fn find_slot(&self, cells: &Cells, key: &[u8]) -> Option<usize> {
        for (layer, &c) in cells.iter().enumerate() {
            if self.bucket(layer, c).slot.matches(key) {
                return Some(layer);
            }
        }

        if !self.fits(key) {
            return None;
        }

        for (layer, &c) in cells.iter().enumerate() {
            if !self.bucket(layer, c).slot.occupied {
                return Some(layer);
            }
        }
        None
    }

    /// Adds `remaining` to the slot found by [`find_slot`], claiming it first
    /// if it is free. Overflow carries the excess beyond 65534.
    ///
    /// A claimed slot starts from the key's 16-bit estimate, which holds
    /// whatever the key was counted with while it had no slot.
    ///
    /// [`find_slot`]: #method.find_slot
    pub(crate) fn insert_slot(
        &mut self,
        cells: &Cells,
        layer: usize,
        key: &[u8],
        remaining: u32,
    ) -> Outcome {
        let carried = self.min_word(cells);
        let slot = &mut self.bucket_mut(layer, cells.get(layer)).slot;
        let value = if slot.occupied {
            slot.value()
        } else {
            slot.claim(key);
            carried
        };

        let sum = value.saturating_add(remaining);
        if sum < WORD_SATURATED {
            slot.value = sum as u16;
            return Outcome::Absorbed(sum);
        }

        slot.value = WORD_SATURATED as u16;
        Outcome::Overflow(remaining - WORD_CAPACITY.saturating_sub(value))
    }

    /// Returns the value of the slot holding `key`, if any.
    pub(crate) fn query_slot(&self, cells: &Cells, key: &[u8]) -> Option<u32> {
        cells
            .iter()
            .enumerate()
            .map(|(layer, &c)| &self.bucket(layer, c).slot)
            .find(|slot| slot.matches(key))
            .map(KeySlot::value)
    }

    /// Conservative update of the probed 16-bit counters.
    ///
    /// `Absorbed` carries the post-update minimum; on `Overflow` every probe is
    /// 65535 and the excess beyond 65534 is returned.
    pub(crate) fn insert_words(&mut self, cells: &Cells, remaining: u32) -> Outcome {
        let min = self.min_word(cells);
        let candidate = min.saturating_add(remaining);

        if candidate < WORD_SATURATED {
            for (layer, &c) in cells.iter().enumerate() {
                let counter = &mut self.bucket_mut(layer, c).words[c.word];
                let v = *counter as u32;
                *counter = (v + remaining).min(candidate).max(v) as u16;
            }
            return Outcome::Absorbed(candidate);
        }

        for (layer, &c) in cells.iter().enumerate() {
            self.bucket_mut(layer, c).words[c.word] = WORD_SATURATED as u16;
        }
        Outcome::Overflow(remaining - WORD_CAPACITY.saturating_sub(min))
    }

    pub(crate) fn query_words(&self, cells: &Cells) -> Option<u32> {
        let min = self.min_word(cells);
        if min < WORD_SATURATED {
            Some(min)
        } else {
            None
        }
    }

    /// Returns the layer and value of the lightest claimed slot among the
    /// candidate buckets. Ties go to the lowest layer.
    pub(crate) fn min_slot(&self, cells: &Cells) -> Option<(usize, u32)> {
        let mut min: Option<(usize, u32)> = None;
        for (layer, &c) in cells.iter().enumerate() {
            let slot = &self.bucket(layer, c).slot;
            if !slot.occupied {
                continue;
            }
            match min {
                Some((_, v)) if v <= slot.value() => {}
                _ => min = Some((layer, slot.value())),
            }
        }
        min
    }

    /// Hands the slot in `layer` over to `key` with the given value, and folds
    /// the displaced value into the 16-bit counters the displaced key probes.
    ///
    /// Returns the displaced value.
    pub(crate) fn evict<H: FlowHasher>(
        &mut self,
        hasher: &H,
        cells: &Cells,
        layer: usize,
        key: &[u8],
        value: u32,
    ) -> u32 {
        let cell = cells.get(layer);
        let displaced = match self.bucket(layer, cell).slot.key() {
            Some(old) => self.locate(&Probes::new(hasher, old, self.layers.len())),
            None => return 0,
        };

        let slot = &mut self.bucket_mut(layer, cell).slot;
        let old = slot.value();
        slot.claim(key);
        slot.value = value.min(WORD_SATURATED) as u16;

        for (l, &c) in displaced.iter().enumerate() {
            let counter = &mut self.bucket_mut(l, c).words[c.word];
            *counter = (*counter as u32 + old).min(WORD_SATURATED) as u16;
        }
        old
    }

    /// Iterates the keys currently holding a slot.
    pub(crate) fn tracked(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.layers
            .iter()
            .flat_map(|layer| layer.iter())
            .filter_map(|bucket| bucket.slot.key())
    }

    pub(crate) fn clear(&mut self) {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.iter_mut())
            .for_each(Bucket::clear)
    }

    pub(crate) fn size_bytes(&self) -> usize {
        let per_bucket = core::mem::size_of::<Bucket>()
            + self.len8
            + self.len16 * core::mem::size_of::<u16>()
            + self.key_capacity;
        self.layers.len() * self.buckets * per_bucket
    }
}

impl Debug for MiddleTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MiddleTier")
            .field("layers", &self.layers.len())
            .field("buckets", &self.buckets)
            .field("tracked", &self.tracked().count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::vec::Vec;

    fn hasher(key: &[u8], seed: u32) -> u32 {
        // first byte picks the bucket, the layer shifts it
        key.first().copied().unwrap_or(0) as u32 + seed
    }

    fn cells(tier: &MiddleTier, key: &[u8]) -> Cells {
        tier.locate(&Probes::new(&hasher, key, tier.layers()))
    }

    #[test]
    fn test_locate_correlated_index() {
        let tier = MiddleTier::new(2, 8, 3, 2, 4);
        let c = cells(&tier, &[5]);
        assert_eq!(c.get(0), Cell { bucket: 5, byte: 2, word: 1 });
        assert_eq!(c.get(1), Cell { bucket: 6, byte: 0, word: 0 });
    }

    #[test]
    fn test_insert_bytes() {
        let mut tier = MiddleTier::new(2, 4, 2, 2, 4);
        let c = cells(&tier, &[0]);

        assert_eq!(tier.insert_bytes(&c, 100), Outcome::Absorbed(100));
        assert_eq!(tier.query_bytes(&c), Some(100));
        // 100 + 200 crosses 255, 154 of it fits below 254
        assert_eq!(tier.insert_bytes(&c, 200), Outcome::Overflow(46));
        assert_eq!(tier.query_bytes(&c), None);
        assert_eq!(tier.insert_bytes(&c, 5), Outcome::Overflow(5));
    }

    #[test]
    fn test_find_slot_prefers_match() {
        let mut tier = MiddleTier::new(2, 4, 2, 2, 4);
        let a = cells(&tier, &[1, b'a']);
        let b = cells(&tier, &[1, b'b']);

        assert_eq!(tier.find_slot(&a, &[1, b'a']), Some(0));
        assert_eq!(tier.insert_slot(&a, 0, &[1, b'a'], 10), Outcome::Absorbed(10));

        assert_eq!(tier.find_slot(&b, &[1, b'b']), Some(1));
        assert_eq!(tier.insert_slot(&b, 1, &[1, b'b'], 3), Outcome::Absorbed(3));

        assert_eq!(tier.find_slot(&a, &[1, b'a']), Some(0));
        assert_eq!(tier.find_slot(&b, &[1, b'b']), Some(1));
        assert_eq!(tier.find_slot(&a, &[1, b'c']), None);

        assert_eq!(tier.query_slot(&a, &[1, b'a']), Some(10));
        assert_eq!(tier.query_slot(&a, &[1, b'c']), None);
        assert_eq!(tier.min_slot(&a), Some((1, 3)));
    }

    #[test]
    fn test_oversized_key_never_claims() {
        let tier = MiddleTier::new(2, 4, 2, 2, 4);
        let key = [1u8, 2, 3, 4, 5];
        let c = cells(&tier, &key);
        assert_eq!(tier.find_slot(&c, &key), None);
    }

    #[test]
    fn test_insert_slot_overflow() {
        let mut tier = MiddleTier::new(1, 1, 1, 1, 4);
        let c = cells(&tier, b"k");
        assert_eq!(tier.insert_slot(&c, 0, b"k", 65_530), Outcome::Absorbed(65_530));
        assert_eq!(tier.insert_slot(&c, 0, b"k", 10), Outcome::Overflow(6));
        assert_eq!(tier.query_slot(&c, b"k"), Some(65_535));
        assert_eq!(tier.insert_slot(&c, 0, b"k", 10), Outcome::Overflow(10));
    }

    #[test]
    fn test_claim_carries_word_estimate() {
        let mut tier = MiddleTier::new(2, 4, 2, 2, 4);
        let c = cells(&tier, &[3]);
        tier.insert_words(&c, 40);
        assert_eq!(tier.insert_slot(&c, 0, &[3], 5), Outcome::Absorbed(45));
        // already claimed: the 16-bit counters no longer matter
        tier.insert_words(&c, 100);
        assert_eq!(tier.insert_slot(&c, 0, &[3], 5), Outcome::Absorbed(50));


        let mut tier = MiddleTier::new(1, 1, 1, 1, 4);
        let c = cells(&tier, &[5]);
        assert_eq!(tier.insert_words(&c, 65_535), Outcome::Overflow(1));
        assert_eq!(tier.insert_slot(&c, 0, &[5], 7), Outcome::Overflow(7));
        assert_eq!(tier.query_slot(&c, &[5]), Some(65_535));
    }

    #[test]
    fn test_insert_words() {
        let mut tier = MiddleTier::new(2, 4, 2, 2, 4);
        let c = cells(&tier, &[0]);
        assert_eq!(tier.insert_words(&c, 1_000), Outcome::Absorbed(1_000));
        assert_eq!(tier.query_words(&c), Some(1_000));
        assert_eq!(tier.insert_words(&c, 65_000), Outcome::Overflow(466));
        assert_eq!(tier.query_words(&c), None);
    }

    #[test]
    fn test_evict_folds_into_displaced_probes() {
        let mut tier = MiddleTier::new(2, 4, 2, 2, 4);
        let old = [2u8, b'o'];
        let new = [2u8, b'n'];
        let c = cells(&tier, &new);

        tier.insert_slot(&c, 0, &old, 40);
        tier.insert_slot(&c, 1, &[2, b'x'], 90);
        assert_eq!(tier.min_slot(&c), Some((0, 40)));

        assert_eq!(tier.evict(&hasher, &c, 0, &new, 100), 40);
        assert_eq!(tier.query_slot(&c, &new), Some(100));
        assert_eq!(tier.query_slot(&c, &old), None);
        assert_eq!(tier.query_words(&cells(&tier, &old)), Some(40));

        let tracked: Vec<&[u8]> = tier.tracked().collect();
        assert_eq!(tracked, [&new[..], &[2u8, b'x'][..]]);
    }

    #[test]
    fn test_clear() {
        let mut tier = MiddleTier::new(1, 2, 1, 1, 4);
        let c = cells(&tier, b"k");
        tier.insert_bytes(&c, 7);
        tier.insert_slot(&c, 0, b"k", 7);
        tier.clear();
        assert_eq!(tier.query_bytes(&c), Some(0));
        assert_eq!(tier.query_slot(&c, b"k"), None);
        assert_eq!(tier.tracked().count(), 0);
    }
}
