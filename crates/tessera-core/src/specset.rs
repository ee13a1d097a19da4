//! A compact set of global species indices.
//!
//! Dependency analysis works in terms of "which species does this process
//! read" and "which species does that firing write"; both are sets over the
//! global species index space, and the only operations the builder needs
//! are insertion, membership, union, and intersection tests. A bitset keeps
//! those O(words) with no allocation for models up to 128 species.

use smallvec::SmallVec;

use crate::id::SpecId;

const WORD_BITS: usize = 64;

/// A growable bitset over global species indices.
///
/// Two inline words cover 128 species without heap allocation; larger
/// models spill transparently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecSet {
    words: SmallVec<[u64; 2]>,
}

impl SpecSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a species to the set.
    pub fn insert(&mut self, spec: SpecId) {
        let word = spec.0 as usize / WORD_BITS;
        let bit = spec.0 as usize % WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << bit;
    }

    /// Whether the set contains a species.
    pub fn contains(&self, spec: SpecId) -> bool {
        let word = spec.0 as usize / WORD_BITS;
        let bit = spec.0 as usize % WORD_BITS;
        self.words.get(word).is_some_and(|w| w & (1u64 << bit) != 0)
    }

    /// Add every species of `other` to this set.
    pub fn union_with(&mut self, other: &SpecSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst |= src;
        }
    }

    /// Whether the two sets share at least one species.
    pub fn intersects(&self, other: &SpecSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of species in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_set_contains_nothing() {
        let s = SpecSet::new();
        assert!(s.is_empty());
        assert_eq!(s.len(), 0);
        assert!(!s.contains(SpecId(0)));
        assert!(!s.contains(SpecId(200)));
    }

    #[test]
    fn insert_then_contains() {
        let mut s = SpecSet::new();
        s.insert(SpecId(3));
        s.insert(SpecId(64));
        s.insert(SpecId(130));
        assert!(s.contains(SpecId(3)));
        assert!(s.contains(SpecId(64)));
        assert!(s.contains(SpecId(130)));
        assert!(!s.contains(SpecId(4)));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut s = SpecSet::new();
        s.insert(SpecId(17));
        s.insert(SpecId(17));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn disjoint_sets_do_not_intersect() {
        let mut a = SpecSet::new();
        let mut b = SpecSet::new();
        a.insert(SpecId(1));
        b.insert(SpecId(2));
        assert!(!a.intersects(&b));
        b.insert(SpecId(1));
        assert!(a.intersects(&b));
    }

    #[test]
    fn intersects_across_word_lengths() {
        let mut a = SpecSet::new();
        let mut b = SpecSet::new();
        a.insert(SpecId(0));
        b.insert(SpecId(300));
        assert!(!a.intersects(&b));
        assert!(!b.intersects(&a));
        a.insert(SpecId(300));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    proptest! {
        #[test]
        fn union_contains_both_operands(xs in prop::collection::vec(0u32..256, 0..20),
                                        ys in prop::collection::vec(0u32..256, 0..20)) {
            let mut a = SpecSet::new();
            let mut b = SpecSet::new();
            for &x in &xs { a.insert(SpecId(x)); }
            for &y in &ys { b.insert(SpecId(y)); }
            let mut u = a.clone();
            u.union_with(&b);
            for &x in &xs { prop_assert!(u.contains(SpecId(x))); }
            for &y in &ys { prop_assert!(u.contains(SpecId(y))); }
        }

        #[test]
        fn intersects_is_symmetric(xs in prop::collection::vec(0u32..256, 0..20),
                                   ys in prop::collection::vec(0u32..256, 0..20)) {
            let mut a = SpecSet::new();
            let mut b = SpecSet::new();
            for &x in &xs { a.insert(SpecId(x)); }
            for &y in &ys { b.insert(SpecId(y)); }
            prop_assert_eq!(a.intersects(&b), b.intersects(&a));
        }

        #[test]
        fn intersects_iff_common_element(xs in prop::collection::vec(0u32..256, 0..20),
                                         ys in prop::collection::vec(0u32..256, 0..20)) {
            let mut a = SpecSet::new();
            let mut b = SpecSet::new();
            for &x in &xs { a.insert(SpecId(x)); }
            for &y in &ys { b.insert(SpecId(y)); }
            let common = xs.iter().any(|x| ys.contains(x));
            prop_assert_eq!(a.intersects(&b), common);
        }
    }
}
