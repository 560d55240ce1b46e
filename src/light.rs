//! The light tier: layers of 4-bit counters packed two per byte.
//!
//! The nibble addressing follows the 4-bit count-min row of TinyLFU: slot `i`
//! lives in byte `i / 2` at shift `(i & 1) * 4`.
use crate::hash::Probes;
use crate::{Outcome, MAX_LAYERS};
use alloc::fmt::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

/// Saturation marker of a 4-bit counter.
pub(crate) const LIGHT_SATURATED: u32 = 15;
/// Largest count the light tier accounts for.
pub(crate) const LIGHT_CAPACITY: u32 = 14;

/// Position of one 4-bit counter: byte index and bit shift.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Nibble {
    idx: usize,
    shift: u32,
}

impl Nibble {
    #[inline]
    fn new(slot: usize) -> Self {
        Self {
            idx: slot / 2,
            shift: ((slot & 1) * 4) as u32,
        }
    }
}

pub(crate) struct NibbleRow(Vec<u8>);

impl NibbleRow {
    pub(crate) fn new(bytes: usize) -> Self {
        Self(vec![0; bytes])
    }

    /// number of 4-bit counters in the row
    #[inline]
    pub(crate) fn slots(&self) -> usize {
        self.0.len() * 2
    }

    #[inline]
    pub(crate) fn get(&self, n: Nibble) -> u32 {
        ((self.0[n.idx] >> n.shift) & 0x0f) as u32
    }

    #[inline]
    pub(crate) fn set(&mut self, n: Nibble, v: u32) {
        let b = &mut self.0[n.idx];
        *b = (*b & !(0x0f << n.shift)) | (((v as u8) & 0x0f) << n.shift);
    }

    pub(crate) fn clear(&mut self) {
        self.0.iter_mut().for_each(|v| *v = 0)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl Debug for NibbleRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let mut s = String::new();
        for i in 0..self.slots() {
            s.push_str(&format(format_args!("{:02} ", self.get(Nibble::new(i)))));
        }
        write!(f, "{}", s)
    }
}

pub(crate) struct LightTier {
    rows: Vec<NibbleRow>,
}

impl LightTier {
    pub(crate) fn new(layers: usize, counters: usize) -> Self {
        let bytes = (counters + 1) / 2;
        Self {
            rows: (0..layers).map(|_| NibbleRow::new(bytes)).collect(),
        }
    }

    #[inline]
    pub(crate) fn layers(&self) -> usize {
        self.rows.len()
    }

    fn locate(&self, probes: &Probes) -> [Nibble; MAX_LAYERS] {
        let mut nibbles = [Nibble::default(); MAX_LAYERS];
        self.rows.iter().enumerate().for_each(|(layer, row)| {
            nibbles[layer] = Nibble::new(probes.get(layer) as usize % row.slots());
        });
        nibbles
    }

    fn min(&self, nibbles: &[Nibble]) -> u32 {
        self.rows
            .iter()
            .zip(nibbles)
            .map(|(row, &n)| row.get(n))
            .min()
            .unwrap_or(LIGHT_SATURATED)
    }

    /// Conservative update of the probed nibbles: each one is raised to at
    /// most `min + count` and never lowered.
    ///
    /// On saturation every probed nibble is set to 15 and the count the light
    /// tier could not hold is returned as overflow.
    pub(crate) fn insert(&mut self, probes: &Probes, count: u32) -> Outcome {
        let nibbles = self.locate(probes);
        let nibbles = &nibbles[..self.rows.len()];
        let min = self.min(nibbles);
        let candidate = min.saturating_add(count);

        if candidate < LIGHT_SATURATED {
            self.rows.iter_mut().zip(nibbles).for_each(|(row, &n)| {
                let v = row.get(n);
                row.set(n, (v + count).min(candidate).max(v));
            });
            return Outcome::Absorbed(candidate);
        }

        self.rows
            .iter_mut()
            .zip(nibbles)
            .for_each(|(row, &n)| row.set(n, LIGHT_SATURATED));
        Outcome::Overflow(count - LIGHT_CAPACITY.saturating_sub(min))
    }

    /// Returns the estimate if the light tier resolves the key.
    pub(crate) fn query(&self, probes: &Probes) -> Option<u32> {
        let nibbles = self.locate(probes);
        let min = self.min(&nibbles[..self.rows.len()]);
        if min < LIGHT_SATURATED {
            Some(min)
        } else {
            None
        }
    }

    pub(crate) fn clear(&mut self) {
        self.rows.iter_mut().for_each(|row| row.clear())
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.rows.iter().map(NibbleRow::len).sum()
    }
}

impl Debug for LightTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.rows.iter()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn probes(values: &[u32]) -> Probes {
        let values = values.to_vec();
        Probes::new(&move |_: &[u8], seed: u32| values[seed as usize], b"", 2)
    }

    #[test]
    fn test_nibble_row() {
        let mut row = NibbleRow::new(4);
        assert_eq!(row.slots(), 8);

        row.set(Nibble::new(0), 1);
        assert_eq!(row.0[0], 0x01);
        assert_eq!(row.get(Nibble::new(0)), 1);
        assert_eq!(row.get(Nibble::new(1)), 0);

        row.set(Nibble::new(1), 15);
        assert_eq!(row.0[0], 0xf1);
        assert_eq!(row.get(Nibble::new(0)), 1);
        assert_eq!(row.get(Nibble::new(1)), 15);

        row.set(Nibble::new(0), 9);
        assert_eq!(row.0[0], 0xf9);

        row.clear();
        assert_eq!(row.0[0], 0);
    }

    #[test]
    fn test_odd_counters_round_up() {
        let tier = LightTier::new(1, 3);
        assert_eq!(tier.rows[0].slots(), 4);
        assert_eq!(tier.size_bytes(), 2);
    }

    #[test]
    fn test_conservative_update() {
        let mut tier = LightTier::new(2, 8);
        // layer 0 hits slot 1, layer 1 hits slot 2
        let p = probes(&[1, 2]);
        tier.rows[1].set(Nibble::new(2), 4);

        assert_eq!(tier.insert(&p, 3), Outcome::Absorbed(3));
        assert_eq!(tier.rows[0].get(Nibble::new(1)), 3);
        // already above the new minimum, so untouched
        assert_eq!(tier.rows[1].get(Nibble::new(2)), 4);
        assert_eq!(tier.query(&p), Some(3));

        assert_eq!(tier.insert(&p, 2), Outcome::Absorbed(5));
        assert_eq!(tier.rows[0].get(Nibble::new(1)), 5);
        assert_eq!(tier.rows[1].get(Nibble::new(2)), 5);
    }

    #[test]
    fn test_saturation_forwarding() {
        let mut tier = LightTier::new(2, 8);
        let p = probes(&[0, 5]);

        assert_eq!(tier.insert(&p, 10), Outcome::Absorbed(10));
        // 10 + 7 crosses the boundary, 4 more fit below 14
        assert_eq!(tier.insert(&p, 7), Outcome::Overflow(3));
        assert_eq!(tier.rows[0].get(Nibble::new(0)), 15);
        assert_eq!(tier.rows[1].get(Nibble::new(5)), 15);
        assert_eq!(tier.query(&p), None);

        // once saturated, the whole count moves on
        assert_eq!(tier.insert(&p, 2), Outcome::Overflow(2));
    }

    #[test]
    fn test_exact_boundary() {
        let mut tier = LightTier::new(2, 8);
        let p = probes(&[3, 3]);
        assert_eq!(tier.insert(&p, 14), Outcome::Absorbed(14));
        assert_eq!(tier.query(&p), Some(14));
        assert_eq!(tier.insert(&p, 1), Outcome::Overflow(1));
    }
}
