// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point hit-testing and occlusion queries.
//!
//! Hit-testing walks children back-to-front (descending z) and recurses, so
//! the topmost matching descendant wins; a container is only a hit itself
//! when none of its children claim the position. Inactive subtrees never
//! match, and a node must be sensitive to match itself (its children are
//! still probed either way, matching the paint side where an insensitive
//! container still shows its children).

use alloc::vec::Vec;

use kurbo::{Point, Rect};

use crate::geom::{contains_point, contains_rect, unrotate_point};

use super::id::{INVALID, NodeId};
use super::store::SceneGraph;

impl SceneGraph {
    /// Returns the topmost effectively active, sensitive node whose viewport
    /// contains `pos`, or `None`.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn element_by_pos(&self, pos: Point) -> Option<NodeId> {
        self.hit_descend(self.root, pos).map(|idx| NodeId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    /// The parent chain from the hit node (inclusive) to the root, innermost
    /// first. Empty when nothing is hit.
    #[must_use]
    pub fn hit_chain(&self, pos: Point) -> Vec<NodeId> {
        let mut chain = Vec::new();
        if let Some(hit) = self.element_by_pos(pos) {
            let mut cur = hit.idx;
            loop {
                chain.push(NodeId {
                    idx: cur,
                    generation: self.generation[cur as usize],
                });
                let p = self.parent[cur as usize];
                if p == INVALID {
                    break;
                }
                cur = p;
            }
        }
        chain
    }

    /// The parent chain from `id` (inclusive) to the root, innermost first.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn parent_chain(&self, id: NodeId) -> Vec<NodeId> {
        self.validate(id);
        let mut chain = Vec::new();
        let mut cur = id.idx;
        loop {
            chain.push(NodeId {
                idx: cur,
                generation: self.generation[cur as usize],
            });
            let p = self.parent[cur as usize];
            if p == INVALID {
                break;
            }
            cur = p;
        }
        chain
    }

    /// Reports whether the node at raw slot `idx` opaquely covers `rect`
    /// from a z key strictly above `below_z`.
    ///
    /// Used by the draw pass to skip content underneath fully-covered areas.
    /// Only opaque, unrotated, fully-visible leaves ever report `true`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len`.
    #[must_use]
    pub fn obscures_at(&self, idx: u32, rect: &Rect, below_z: i32) -> bool {
        assert!(idx < self.len, "slot index {idx} out of range");
        if !self.effective_active[idx as usize]
            || self.z[idx as usize] <= below_z
            || self.angle[idx as usize] != 0.0
            || !self.kind[idx as usize].is_opaque()
            || self.effective_opacity[idx as usize] < 1.0
        {
            return false;
        }
        contains_rect(&self.abs_viewport[idx as usize], rect)
    }

    fn hit_descend(&self, idx: u32, pos: Point) -> Option<u32> {
        if !self.effective_active[idx as usize] {
            return None;
        }
        // Children back-to-front.
        let mut child = self.last_child_idx(idx);
        while child != INVALID {
            if let Some(hit) = self.hit_descend(child, pos) {
                return Some(hit);
            }
            child = self.prev_sibling[child as usize];
        }
        if !self.flags[idx as usize].sensitive {
            return None;
        }
        let abs = self.abs_viewport[idx as usize];
        let local = unrotate_point(pos, self.angle[idx as usize], self.pivot_abs_at(idx));
        if contains_point(&abs, local) {
            Some(idx)
        } else {
            None
        }
    }
}
