// Copyright (c) 2024 The Quic-Frames Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::cmp;
use std::ops::RangeInclusive;

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::collections::Bound::Included;
use std::collections::Bound::Unbounded;

/// An ordered set of disjoint inclusive u64 ranges.
///
/// Iteration yields the ranges in ascending order. Overlapping and
/// adjacent ranges are merged on insertion.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    /// Maps the first value of each range to its inclusive last value.
    set: BTreeMap<u64, u64>,
}

impl RangeSet {
    /// Create a new empty `RangeSet`.
    pub fn new() -> Self {
        RangeSet::default()
    }

    /// Insert `range` into the set.
    ///
    /// An inverted range (start greater than end) is ignored.
    pub fn insert(&mut self, range: RangeInclusive<u64>) {
        let (mut start, mut end) = range.into_inner();
        if start > end {
            return;
        }

        if let Some(r) = self.prev_to(start) {
            if *r.end() >= end {
                // Fully covered by a preceding existing range, do nothing.
                return;
            } else if r.end().saturating_add(1) >= start {
                // The new range overlaps or touches the preceding existing
                // range, merge them into a single range.
                self.set.remove(r.start());
                start = *r.start();
            }
        }

        while let Some(r) = self.next_to(start) {
            // No overlap between the new range and the following existing
            // range, stop.
            if *r.start() > end.saturating_add(1) {
                break;
            }

            self.set.remove(r.start());
            end = cmp::max(*r.end(), end);
        }

        self.set.insert(start, end);
    }

    /// Return true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Return the minimum value in the set.
    pub fn min(&self) -> Option<u64> {
        self.iter().next().map(|r| *r.start())
    }

    /// Return the maximum value in the set.
    pub fn max(&self) -> Option<u64> {
        self.iter().next_back().map(|r| *r.end())
    }

    /// Return the number of ranges in the set.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Check if the element exists or not.
    pub fn contains(&self, elem: u64) -> bool {
        match self.prev_to(elem) {
            Some(r) => *r.end() >= elem,
            None => false,
        }
    }

    /// Peek at the smallest range in the set.
    pub fn peek_min(&self) -> Option<RangeInclusive<u64>> {
        let (&start, &end) = self.set.iter().next()?;
        Some(start..=end)
    }

    /// Pop the smallest range in the set.
    pub fn pop_min(&mut self) -> Option<RangeInclusive<u64>> {
        let result = self.peek_min()?;
        self.set.remove(result.start());
        Some(result)
    }

    /// Return an iterator over the ranges in the set.
    pub fn iter(&self) -> Iter {
        Iter {
            set: self.set.iter(),
        }
    }

    /// Flatten the ranges in the set into an iterator over the contained
    /// values.
    pub fn flatten(&self) -> Flatten {
        Flatten {
            set: self.set.iter(),
            next: 0,
            end: 0,
        }
    }

    /// Find the closest range to `elem` that begins at or before it.
    fn prev_to(&self, elem: u64) -> Option<RangeInclusive<u64>> {
        self.set
            .range((Unbounded, Included(elem)))
            .map(|(&s, &e)| s..=e)
            .next_back()
    }

    /// Find the closest range to `elem` that begins at or after it.
    fn next_to(&self, elem: u64) -> Option<RangeInclusive<u64>> {
        self.set
            .range((Included(elem), Unbounded))
            .map(|(&s, &e)| s..=e)
            .next()
    }
}

impl PartialEq<RangeInclusive<u64>> for RangeSet {
    // True if and only if the `RangeSet` contains a single range and that
    // range is equal to the given range.
    fn eq(&self, other: &RangeInclusive<u64>) -> bool {
        self.len() == 1 && self.peek_min().unwrap() == *other
    }
}

impl std::fmt::Debug for RangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ranges: Vec<RangeInclusive<u64>> = self.iter().collect();
        write!(f, "{ranges:?}")
    }
}

pub struct Iter<'a> {
    set: btree_map::Iter<'a, u64, u64>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<RangeInclusive<u64>> {
        let (&start, &end) = self.set.next()?;
        Some(start..=end)
    }
}

impl<'a> DoubleEndedIterator for Iter<'a> {
    fn next_back(&mut self) -> Option<RangeInclusive<u64>> {
        let (&start, &end) = self.set.next_back()?;
        Some(start..=end)
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {
    fn len(&self) -> usize {
        self.set.len()
    }
}

pub struct Flatten<'a> {
    set: btree_map::Iter<'a, u64, u64>,
    next: u64,
    end: u64,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next == self.end {
            let (&start, &end) = self.set.next()?;

            self.next = start;
            // Values are bounded by 2^62-1, the exclusive end cannot wrap.
            self.end = end + 1;
        }

        let next = self.next;
        self.next += 1;

        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_distinct() {
        let mut r = RangeSet::new();
        assert_eq!(r.len(), 0);
        assert!(r.is_empty());
        assert_eq!(r.min(), None);
        assert_eq!(r.max(), None);

        r.insert(200..=299);
        r.insert(400..=499);
        r.insert(20..=29);
        assert_eq!(r.len(), 3);
        assert_eq!(r.min(), Some(20));
        assert_eq!(r.max(), Some(499));
        assert_eq!(
            r.iter().collect::<Vec<_>>(),
            vec![20..=29, 200..=299, 400..=499]
        );
    }

    #[test]
    fn insert_overlapping() {
        let mut r = RangeSet::new();

        r.insert(10..=20);
        r.insert(15..=25);
        assert_eq!(r.len(), 1);
        assert_eq!(r.peek_min(), Some(10..=25));

        // Touching ranges are merged as well.
        r.insert(26..=30);
        assert_eq!(r.len(), 1);
        assert_eq!(r.peek_min(), Some(10..=30));

        // A range covering existing ranges swallows them.
        r.insert(40..=50);
        r.insert(0..=100);
        assert_eq!(r.len(), 1);
        assert_eq!(r.peek_min(), Some(0..=100));

        // Fully covered insertions change nothing.
        r.insert(5..=7);
        assert_eq!(r, 0..=100);
    }

    #[test]
    fn insert_inverted_range() {
        let mut r = RangeSet::new();
        r.insert(13..=10);
        assert_eq!(r.len(), 0);
        assert_eq!(r.iter().next(), None);

        r.insert(7..=10);
        r.insert(13..=10);
        assert_eq!(r, 7..=10);
    }

    #[test]
    fn insert_single_values() {
        let mut r = RangeSet::new();
        r.insert(9..=9);
        r.insert(5..=5);
        r.insert(7..=7);
        assert_eq!(r.len(), 3);
        assert_eq!(r.flatten().collect::<Vec<u64>>(), vec![5, 7, 9]);

        // Fill the gaps, everything collapses to one range.
        r.insert(6..=6);
        r.insert(8..=8);
        assert_eq!(r, 5..=9);
    }

    #[test]
    fn contains() {
        let mut r = RangeSet::new();
        r.insert(5..=7);
        r.insert(10..=12);

        assert!(!r.contains(4));
        assert!(r.contains(5));
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert!(r.contains(10));
        assert!(!r.contains(13));
    }

    #[test]
    fn pop_min() {
        let mut r = RangeSet::new();
        r.insert(8..=10);
        r.insert(5..=5);

        assert_eq!(r.pop_min(), Some(5..=5));
        assert_eq!(r.pop_min(), Some(8..=10));
        assert_eq!(r.pop_min(), None);
        assert!(r.is_empty());
    }

    #[test]
    fn flatten() {
        let mut r = RangeSet::new();
        r.insert(7..=10);
        r.insert(0..=1);
        assert_eq!(r.flatten().collect::<Vec<u64>>(), vec![0, 1, 7, 8, 9, 10]);
    }

    #[test]
    fn iter_back() {
        let mut r = RangeSet::new();
        r.insert(5..=5);
        r.insert(8..=10);
        r.insert(21..=29);

        let mut it = r.iter();
        assert_eq!(it.len(), 3);
        assert_eq!(it.next_back(), Some(21..=29));
        assert_eq!(it.next_back(), Some(8..=10));
        assert_eq!(it.next_back(), Some(5..=5));
        assert_eq!(it.next_back(), None);
    }

    #[test]
    fn debug_format() {
        let mut r = RangeSet::new();
        r.insert(5..=5);
        r.insert(8..=10);
        assert_eq!(format!("{r:?}"), "[5..=5, 8..=10]");
    }
}
