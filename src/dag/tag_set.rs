// src/dag/tag_set.rs

//! Fixed-width bitset over system tags.

use std::fmt;

use crate::registry::Tag;

/// Maximum number of distinct system tags a registry hands out.
pub const MAX_NODES: usize = 256;

const WORDS: usize = MAX_NODES / 64;

/// Set of system tags, one bit per tag.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TagSet {
    words: [u64; WORDS],
}

impl TagSet {
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    pub fn insert(&mut self, tag: Tag) {
        let (word, bit) = Self::locate(tag);
        self.words[word] |= bit;
    }

    pub fn remove(&mut self, tag: Tag) {
        let (word, bit) = Self::locate(tag);
        self.words[word] &= !bit;
    }

    pub fn contains(&self, tag: Tag) -> bool {
        let (word, bit) = Self::locate(tag);
        self.words[word] & bit != 0
    }

    pub fn clear(&mut self) {
        self.words = [0; WORDS];
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn union_with(&mut self, other: &TagSet) {
        for (a, b) in self.words.iter_mut().zip(other.words.iter()) {
            *a |= *b;
        }
    }

    pub fn intersection(&self, other: &TagSet) -> TagSet {
        let mut out = *self;
        for (a, b) in out.words.iter_mut().zip(other.words.iter()) {
            *a &= *b;
        }
        out
    }

    pub fn intersects(&self, other: &TagSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// `true` if every tag in `other` is also in `self`.
    pub fn is_superset(&self, other: &TagSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Tags in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        (0..MAX_NODES)
            .filter(move |i| self.words[i / 64] & (1u64 << (i % 64)) != 0)
            .map(Tag::from_index)
    }

    fn locate(tag: Tag) -> (usize, u64) {
        let i = tag.index();
        (i / 64, 1u64 << (i % 64))
    }
}

impl fmt::Debug for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|t| t.index())).finish()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(i: usize) -> Tag {
        Tag::from_index(i)
    }

    #[test]
    fn insert_remove_contains_across_words() {
        let mut set = TagSet::new();
        set.insert(t(0));
        set.insert(t(63));
        set.insert(t(64));
        set.insert(t(255));
        assert!(set.contains(t(63)) && set.contains(t(64)));
        assert_eq!(set.len(), 4);

        set.remove(t(64));
        assert!(!set.contains(t(64)));
        assert_eq!(set.iter().map(|t| t.index()).collect::<Vec<_>>(), vec![0, 63, 255]);
    }

    #[test]
    fn superset_and_intersection() {
        let deps: TagSet = [t(1), t(70)].into_iter().collect();
        let mut done: TagSet = [t(1)].into_iter().collect();
        assert!(!done.is_superset(&deps));

        done.insert(t(70));
        done.insert(t(3));
        assert!(done.is_superset(&deps));
        assert!(done.intersects(&deps));
        assert_eq!(done.intersection(&deps), deps);
        assert!(TagSet::new().is_superset(&TagSet::new()));
    }
}
