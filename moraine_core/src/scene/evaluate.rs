// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame evaluation, change tracking, and dirty-region collection.
//!
//! Evaluation follows a drain-recompute pattern for each dirty channel:
//!
//! 1. **VIEWPORT** — Drain dirty indices in parent-before-child order. For
//!    each node, add its previously painted area to the pending damage,
//!    recompute `abs_viewport` as `parent_abs.translate(rel_viewport)` and
//!    `effective_active` as `parent_effective_active && flags.active`, then
//!    add the newly painted area. A node that moved therefore damages both
//!    its old and new rectangles in one frame.
//! 2. **OPACITY** — Drain dirty indices, recompute `effective_opacity` as
//!    `parent_effective * opacity`, damage the painted area.
//! 3. **CONTENT** — Drain dirty indices and damage each node's painted area
//!    (no recomputation; the pixels changed in place).
//! 4. **TOPOLOGY** — Drain and discard (the traversal order was already
//!    rebuilt at the start of evaluation if needed).
//!
//! The accumulated damage stays in the graph until
//! [`collect_dirty_region`](SceneGraph::collect_dirty_region) drains it, so
//! multiple evaluates between draws fold their damage together.
//!
//! [`FrameChanges`] uses raw slot indices (`u32`) rather than
//! [`NodeId`](super::NodeId) handles so that consumers can index directly
//! into the graph's arrays via the `*_at()` accessors without paying for
//! generation checks on every access.

use alloc::vec::Vec;

use kurbo::Rect;

use crate::dirty;
use crate::geom::{intersection, offset_by};
use crate::region::Region;

use super::id::INVALID;
use super::store::SceneGraph;

/// The set of changes produced by a single [`SceneGraph::evaluate`] call.
///
/// Each field contains the raw slot indices of nodes that changed in the
/// corresponding category.
#[derive(Clone, Debug, Default)]
pub struct FrameChanges {
    /// Nodes whose absolute viewport was recomputed.
    pub viewports: Vec<u32>,
    /// Nodes whose effective opacity was recomputed.
    pub opacities: Vec<u32>,
    /// Nodes whose pixel content changed in place.
    pub content: Vec<u32>,
    /// Nodes that became effectively active this evaluate.
    pub activated: Vec<u32>,
    /// Nodes that stopped being effectively active this evaluate.
    pub deactivated: Vec<u32>,
    /// Nodes created since the last evaluate.
    pub added: Vec<u32>,
    /// Nodes destroyed since the last evaluate.
    pub removed: Vec<u32>,
    /// Whether the tree topology changed (traversal order was rebuilt).
    pub topology_changed: bool,
}

impl FrameChanges {
    /// Clears all change lists.
    pub fn clear(&mut self) {
        self.viewports.clear();
        self.opacities.clear();
        self.content.clear();
        self.activated.clear();
        self.deactivated.clear();
        self.added.clear();
        self.removed.clear();
        self.topology_changed = false;
    }
}

impl SceneGraph {
    /// Evaluates the scene tree, recomputing dirty properties, folding the
    /// changed screen area into the pending damage, and returning the set of
    /// changes.
    pub fn evaluate(&mut self) -> FrameChanges {
        let mut changes = FrameChanges::default();
        self.evaluate_into(&mut changes);
        changes
    }

    /// Like [`evaluate`](Self::evaluate), but reuses a caller-provided buffer
    /// to avoid allocation.
    pub fn evaluate_into(&mut self, changes: &mut FrameChanges) {
        changes.clear();

        if self.traversal_dirty {
            self.rebuild_traversal_order();
            changes.topology_changed = true;
            self.traversal_dirty = false;
        }

        // Drain VIEWPORT — recompute absolute viewports and effective active
        // state, parent before child.
        let dirty_viewports: Vec<u32> = self
            .dirty
            .drain(dirty::VIEWPORT)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_viewports {
            if self.free_list.contains(&idx) {
                continue;
            }
            let parent_idx = self.parent[idx as usize];
            let (parent_abs, parent_active) = if parent_idx != INVALID {
                (
                    self.abs_viewport[parent_idx as usize],
                    self.effective_active[parent_idx as usize],
                )
            } else {
                // Only the root renders without a parent; detached subtrees
                // compute but stay inactive.
                (Rect::ZERO, idx == self.root)
            };

            // The screen still shows the old rectangle.
            if self.effective_active[idx as usize] {
                let old = self.paint_bounds_at(idx);
                self.pending_damage.add_rect(old);
            }

            self.abs_viewport[idx as usize] =
                offset_by(&self.rel_viewport[idx as usize], &parent_abs);
            let new_active = parent_active && self.flags[idx as usize].active;
            let old_active = self.effective_active[idx as usize];
            if new_active != old_active {
                if new_active {
                    changes.activated.push(idx);
                } else {
                    changes.deactivated.push(idx);
                }
                self.effective_active[idx as usize] = new_active;
            }
            if new_active {
                let new = self.paint_bounds_at(idx);
                self.pending_damage.add_rect(new);
            }
        }
        changes.viewports = dirty_viewports;

        // Drain OPACITY.
        let dirty_opacities: Vec<u32> = self
            .dirty
            .drain(dirty::OPACITY)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_opacities {
            if self.free_list.contains(&idx) {
                continue;
            }
            let parent_idx = self.parent[idx as usize];
            let parent_opacity = if parent_idx != INVALID {
                self.effective_opacity[parent_idx as usize]
            } else {
                1.0
            };
            self.effective_opacity[idx as usize] = parent_opacity * self.opacity[idx as usize];
            if self.effective_active[idx as usize] {
                let bounds = self.paint_bounds_at(idx);
                self.pending_damage.add_rect(bounds);
            }
        }
        changes.opacities = dirty_opacities;

        // Drain CONTENT — pixels changed in place, damage the painted area.
        let dirty_content: Vec<u32> = self
            .dirty
            .drain(dirty::CONTENT)
            .deterministic()
            .run()
            .collect();
        for &idx in &dirty_content {
            if self.free_list.contains(&idx) {
                continue;
            }
            if self.effective_active[idx as usize] {
                let bounds = self.paint_bounds_at(idx);
                self.pending_damage.add_rect(bounds);
            }
        }
        changes.content = dirty_content;

        // Drain TOPOLOGY (just consume, changes are structural).
        let _: Vec<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();

        core::mem::swap(&mut self.pending_added, &mut changes.added);
        core::mem::swap(&mut self.pending_removed, &mut changes.removed);
    }

    /// Drains the pending damage accumulated since the last collection,
    /// clipped to the display bounds.
    ///
    /// With `force_full` the whole display is returned instead (first frame
    /// after attach or resize); the pending damage is consumed either way.
    pub fn collect_dirty_region(&mut self, force_full: bool) -> Region {
        let screen = Rect::new(0.0, 0.0, self.size.0, self.size.1);
        let pending = core::mem::take(&mut self.pending_damage);
        let mut region = Region::new();
        if force_full {
            region.add_rect(screen);
            return region;
        }
        // Members of a disjoint set stay disjoint after clipping.
        for r in pending.rects() {
            if let Some(clipped) = intersection(r, &screen) {
                region.add_rect(clipped);
            }
        }
        region
    }

    /// Returns the current traversal order (depth-first pre-order, children
    /// in ascending z).
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn traversal_order(&self) -> &[u32] {
        &self.traversal_order
    }

    /// Rebuilds the depth-first pre-order traversal from the root, then any
    /// detached subtrees.
    fn rebuild_traversal_order(&mut self) {
        self.traversal_order.clear();
        self.dfs_collect(self.root);
        for idx in 0..self.len {
            if idx != self.root
                && self.parent[idx as usize] == INVALID
                && !self.free_list.contains(&idx)
            {
                self.dfs_collect(idx);
            }
        }
    }

    fn dfs_collect(&mut self, idx: u32) {
        self.traversal_order.push(idx);
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.dfs_collect(child);
            child = self.next_sibling[child as usize];
        }
    }
}
