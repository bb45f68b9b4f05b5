use std::fmt::Debug;
use std::ops::Index;
use smallvec::{SmallVec, smallvec};
use crate::LV;

/// A `Frontier` is a set of local versions naming the changes with no children at some point in
/// time. With a single writer this will always just be the last change we've seen.
///
/// The start of time is named with an empty list.
///
/// A frontier must always remain sorted (in numerical order).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Frontier(pub SmallVec<[LV; 2]>);

pub type FrontierRef<'a> = &'a [LV];

impl AsRef<[LV]> for Frontier {
    fn as_ref(&self) -> &[LV] {
        self.0.as_slice()
    }
}

impl Default for Frontier {
    fn default() -> Self {
        Self::root()
    }
}

impl Index<usize> for Frontier {
    type Output = LV;

    fn index(&self, index: usize) -> &Self::Output {
        self.0.index(index)
    }
}

pub(crate) fn frontier_is_sorted(f: FrontierRef) -> bool {
    f.windows(2).all(|w| w[0] < w[1])
}

pub(crate) fn debug_assert_frontier_sorted(frontier: FrontierRef) {
    debug_assert!(frontier_is_sorted(frontier));
}

impl IntoIterator for Frontier {
    type Item = LV;
    type IntoIter = <SmallVec<[LV; 2]> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<LV> for Frontier {
    fn from_iter<T: IntoIterator<Item=LV>>(iter: T) -> Self {
        let mut arr: SmallVec<[LV; 2]> = iter.into_iter().collect();
        arr.sort_unstable();
        arr.dedup();
        Self(arr)
    }
}

impl Frontier {
    pub fn root() -> Self {
        Self(smallvec![])
    }

    pub fn new_1(v: LV) -> Self {
        Self(smallvec![v])
    }

    pub fn from_sorted(data: &[LV]) -> Self {
        debug_assert_frontier_sorted(data);
        Self(data.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<LV> {
        self.0.iter()
    }

    pub fn contains(&self, v: LV) -> bool {
        self.0.binary_search(&v).is_ok()
    }

    /// Advance the frontier by a single new change whose parents are `parents`.
    ///
    /// Every parent must already be known, and `v` must not be.
    pub fn advance_by_known_run(&mut self, parents: &[LV], v: LV) {
        if parents.len() == 1 && self.0.len() == 1 && parents[0] == self.0[0] {
            // Short circuit the common case where time is just advancing linearly.
            self.0[0] = v;
        } else if self.0.as_slice() == parents {
            self.replace_with_1(v);
        } else {
            debug_assert!(!self.0.contains(&v));
            debug_assert_frontier_sorted(self.0.as_slice());

            // Parents which aren't in the frontier are already dominated by something else in it.
            self.0.retain(|o| !parents.contains(o));
            self.insert(v);
        }
    }

    fn insert(&mut self, new_item: LV) {
        // In order to maintain the order of items in the frontier, we want to insert the new item
        // in the appropriate place.
        if let Err(new_idx) = self.0.binary_search(&new_item) {
            self.0.insert(new_idx, new_item);
        }
        debug_assert_frontier_sorted(self.0.as_slice());
    }

    pub fn replace_with_1(&mut self, new_val: LV) {
        self.0 = smallvec![new_val];
    }
}
