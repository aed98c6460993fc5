// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Disjoint dirty-rectangle sets.
//!
//! A [`Region`] holds a list of axis-aligned rectangles with no pairwise
//! interior overlap. Inserting a rectangle that overlaps existing members
//! replaces them with a single bounding union, repeated until the set is
//! disjoint again. Rectangles that only share an edge are kept separate, so a
//! row of adjacent damage rects is repainted as several tight rects rather
//! than one sprawling union.

use alloc::vec::Vec;

use kurbo::Rect;

use crate::geom::{is_degenerate, strictly_overlaps};

/// A set of non-overlapping dirty rectangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// An empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Adds a rectangle, merging it with any member it overlaps.
    ///
    /// Degenerate rectangles are ignored. Merging uses the bounding union, so
    /// the stored rect may cover area neither input covered; a union that
    /// newly overlaps another member is merged again until the set is
    /// disjoint.
    pub fn add_rect(&mut self, rect: Rect) {
        if is_degenerate(&rect) {
            return;
        }
        let mut merged = rect;
        loop {
            let overlap = self.rects.iter().position(|r| strictly_overlaps(r, &merged));
            match overlap {
                Some(i) => {
                    let other = self.rects.swap_remove(i);
                    merged = merged.union(other);
                }
                None => break,
            }
        }
        self.rects.push(merged);
    }

    /// Adds every rectangle of `other`.
    pub fn add_region(&mut self, other: &Region) {
        for r in &other.rects {
            self.add_rect(*r);
        }
    }

    /// Removes all rectangles.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// The rectangles of the region, in no particular order.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Returns `true` if the region covers no area.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of rectangles in the region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rects.len()
    }
}
