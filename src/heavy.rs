//! The heavy array: 32-bit counters absorbing everything the middle tier
//! cannot hold.
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

pub(crate) struct HeavyArray(Vec<u32>);

impl HeavyArray {
    pub(crate) fn new(counters: usize) -> Self {
        Self(vec![0; counters])
    }

    #[inline]
    fn index(&self, hash: u32) -> usize {
        hash as usize % self.0.len()
    }

    /// Adds `count` to the counter selected by `hash` and returns its new value.
    pub(crate) fn add(&mut self, hash: u32, count: u32) -> u32 {
        let idx = self.index(hash);
        let v = self.0[idx].saturating_add(count);
        self.0[idx] = v;
        v
    }

    pub(crate) fn get(&self, hash: u32) -> u32 {
        self.0[self.index(hash)]
    }

    pub(crate) fn clear(&mut self) {
        self.0.iter_mut().for_each(|v| *v = 0)
    }

    pub(crate) fn size_bytes(&self) -> usize {
        self.0.len() * core::mem::size_of::<u32>()
    }
}

impl Debug for HeavyArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::HeavyArray;

    #[test]
    fn test_heavy_array() {
        let mut h = HeavyArray::new(4);
        assert_eq!(h.add(1, 10), 10);
        // 5 % 4 == 1 collides with the previous counter
        assert_eq!(h.add(5, 3), 13);
        assert_eq!(h.get(1), 13);
        assert_eq!(h.get(2), 0);

        assert_eq!(h.add(2, u32::MAX), u32::MAX);
        assert_eq!(h.add(2, 1), u32::MAX);

        h.clear();
        assert_eq!(h.get(1), 0);
        assert_eq!(h.size_bytes(), 16);
    }
}
