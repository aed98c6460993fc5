// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation, topology, and property
//! management.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use kurbo::{Point, Rect};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::backend::SurfaceHandle;
use crate::dirty;
use crate::error::SceneError;
use crate::geom::rotated_bounds;
use crate::region::Region;

use super::id::{INVALID, NodeId};
use super::kind::{NodeKind, ZTieBreak};
use super::traverse::{Children, ChildrenRev};

/// Per-node boolean flags.
///
/// Clearing [`active`](Self::active) drops the node and its whole subtree out
/// of rendering and hit-testing. Clearing [`sensitive`](Self::sensitive)
/// keeps the node visible but makes pointer events pass through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    /// Whether the node (and its subtree) participates in render and input.
    pub active: bool,
    /// Whether the node receives pointer events.
    pub sensitive: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            active: true,
            sensitive: true,
        }
    }
}

/// Struct-of-arrays storage for the whole scene tree.
///
/// Nodes are addressed by [`NodeId`] handles. Each node occupies a slot in
/// parallel arrays; destroyed nodes are recycled via a free list, and
/// generation counters prevent stale handle access. The graph always holds a
/// root [`NodeKind::Group`] sized to the display, created by
/// [`new`](Self::new); other nodes start detached and join the tree via
/// [`append_child`](Self::append_child).
#[derive(Debug)]
pub struct SceneGraph {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Local properties (set by callers) --
    pub(crate) kind: Vec<NodeKind>,
    pub(crate) name: Vec<String>,
    pub(crate) rel_viewport: Vec<Rect>,
    pub(crate) z: Vec<i32>,
    pub(crate) opacity: Vec<f64>,
    pub(crate) angle: Vec<f64>,
    pub(crate) pivot: Vec<Option<Point>>,
    pub(crate) flags: Vec<NodeFlags>,
    pub(crate) crop: Vec<bool>,

    // -- Computed properties (written by evaluate) --
    pub(crate) abs_viewport: Vec<Rect>,
    pub(crate) effective_opacity: Vec<f64>,
    pub(crate) effective_active: Vec<bool>,

    // -- Damage --
    pub(crate) pending_damage: Region,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Traversal cache --
    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_dirty: bool,

    // -- Lifecycle tracking --
    pub(crate) pending_added: Vec<u32>,
    pub(crate) pending_removed: Vec<u32>,

    // -- Identity --
    pub(crate) names: BTreeMap<String, u32>,
    pub(crate) root: u32,
    pub(crate) size: (f64, f64),
}

impl SceneGraph {
    /// Creates a scene graph with a root group covering `width` x `height`.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        let mut graph = Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            kind: Vec::new(),
            name: Vec::new(),
            rel_viewport: Vec::new(),
            z: Vec::new(),
            opacity: Vec::new(),
            angle: Vec::new(),
            pivot: Vec::new(),
            flags: Vec::new(),
            crop: Vec::new(),
            abs_viewport: Vec::new(),
            effective_opacity: Vec::new(),
            effective_active: Vec::new(),
            pending_damage: Region::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_dirty: true,
            pending_added: Vec::new(),
            pending_removed: Vec::new(),
            names: BTreeMap::new(),
            root: 0,
            size: (width, height),
        };
        let root = graph.create_node(NodeKind::Group);
        graph.root = root.idx;
        graph.rel_viewport[root.idx as usize] = Rect::new(0.0, 0.0, width, height);
        graph.dirty.mark_with(root.idx, dirty::VIEWPORT, &EagerPolicy);
        graph
    }

    /// Display size the root covers, as `(width, height)`.
    #[must_use]
    pub const fn size(&self) -> (f64, f64) {
        self.size
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId {
            idx: self.root,
            generation: self.generation[self.root as usize],
        }
    }

    // -- Allocation API --

    /// Creates a detached node of the given kind and returns its handle.
    ///
    /// The node starts with a zero-area viewport at the parent origin, z of
    /// zero, full opacity, no rotation, no name, and the default flags. It
    /// does not render or hit-test until attached under the root.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            self.generation[idx as usize] += 1;
            self.parent[idx as usize] = INVALID;
            self.first_child[idx as usize] = INVALID;
            self.next_sibling[idx as usize] = INVALID;
            self.prev_sibling[idx as usize] = INVALID;
            self.kind[idx as usize] = kind;
            self.name[idx as usize] = String::new();
            self.rel_viewport[idx as usize] = Rect::ZERO;
            self.z[idx as usize] = 0;
            self.opacity[idx as usize] = 1.0;
            self.angle[idx as usize] = 0.0;
            self.pivot[idx as usize] = None;
            self.flags[idx as usize] = NodeFlags::default();
            self.crop[idx as usize] = false;
            self.abs_viewport[idx as usize] = Rect::ZERO;
            self.effective_opacity[idx as usize] = 1.0;
            self.effective_active[idx as usize] = false;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.kind.push(kind);
            self.name.push(String::new());
            self.rel_viewport.push(Rect::ZERO);
            self.z.push(0);
            self.opacity.push(1.0);
            self.angle.push(0.0);
            self.pivot.push(None);
            self.flags.push(NodeFlags::default());
            self.crop.push(false);
            self.abs_viewport.push(Rect::ZERO);
            self.effective_opacity.push(1.0);
            self.effective_active.push(false);
            self.generation.push(0);
            idx
        };

        self.traversal_dirty = true;
        self.pending_added.push(idx);
        self.dirty.mark(idx, dirty::TOPOLOGY);

        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a node and its entire subtree, freeing the slots for reuse.
    ///
    /// If attached, the subtree is detached first: its last visible area is
    /// added to the pending damage and its names are unregistered. Capture
    /// and handler tables holding the destroyed handles observe the staleness
    /// through [`is_alive`](Self::is_alive).
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or refers to the root.
    pub fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let idx = id.idx;
        assert!(idx != self.root, "cannot destroy the root node");

        if self.parent[idx as usize] != INVALID {
            self.detach(idx, false);
        }

        let subtree = self.subtree_indices(idx);
        for &i in &subtree {
            self.dirty.remove_key(i);
            self.generation[i as usize] += 1;
            if !self.name[i as usize].is_empty() {
                self.names.remove(&self.name[i as usize]);
            }
            self.parent[i as usize] = INVALID;
            self.first_child[i as usize] = INVALID;
            self.next_sibling[i as usize] = INVALID;
            self.prev_sibling[i as usize] = INVALID;
            self.effective_active[i as usize] = false;
            self.free_list.push(i);
            self.pending_removed.push(i);
        }

        self.traversal_dirty = true;
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    // -- Topology API --

    /// Attaches `child` into `parent`'s z-sorted child list.
    ///
    /// The insertion point is the first existing sibling whose z exceeds the
    /// child's; equal-z placement follows the container kind's
    /// [`z_tie_break`](NodeKind::z_tie_break). If `parent` is reachable from
    /// the root, every name in the attached subtree is registered.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateId`] (without attaching) if a name in
    /// the subtree is already registered.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, `parent` is not a container kind, or
    /// `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.kind[p as usize].is_container(),
            "node kind cannot have children"
        );
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );

        if self.is_rooted(p) {
            self.register_subtree_names(c)?;
        }

        let before = self.z_insertion_point(p, self.z[c as usize]);
        self.link_child(p, c, before);

        // Child depends on parent for inherited channels.
        let _ = self.dirty.add_dependency(c, p, dirty::VIEWPORT);
        let _ = self.dirty.add_dependency(c, p, dirty::OPACITY);

        self.mark_subtree_inherited_dirty(c);
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
        Ok(())
    }

    /// Detaches `child` from its parent, keeping the subtree alive.
    ///
    /// The subtree's last visible area becomes pending damage and its names
    /// are unregistered; it can be re-attached later.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, the node has no parent, or it is the
    /// root.
    pub fn remove_child(&mut self, child: NodeId) {
        self.validate(child);
        let c = child.idx;
        assert!(c != self.root, "cannot detach the root node");
        assert!(self.parent[c as usize] != INVALID, "node has no parent");
        self.detach(c, true);
    }

    /// Returns the `i`-th child of `parent` in z order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or `i` is out of range.
    #[must_use]
    pub fn child(&self, parent: NodeId, i: usize) -> NodeId {
        self.validate(parent);
        let mut cur = self.first_child[parent.idx as usize];
        let mut remaining = i;
        while cur != INVALID {
            if remaining == 0 {
                return NodeId {
                    idx: cur,
                    generation: self.generation[cur as usize],
                };
            }
            remaining -= 1;
            cur = self.next_sibling[cur as usize];
        }
        panic!(
            "child index {i} out of range (container has {} children)",
            self.child_count(parent)
        );
    }

    /// Number of direct children of `parent`.
    #[must_use]
    pub fn child_count(&self, parent: NodeId) -> usize {
        self.validate(parent);
        let mut n = 0;
        let mut cur = self.first_child[parent.idx as usize];
        while cur != INVALID {
            n += 1;
            cur = self.next_sibling[cur as usize];
        }
        n
    }

    /// Returns the parent of a node, if attached.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        if p == INVALID {
            None
        } else {
            Some(NodeId {
                idx: p,
                generation: self.generation[p as usize],
            })
        }
    }

    /// Iterates the direct children of a node in ascending z order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Iterates the direct children of a node in descending z order.
    #[must_use]
    pub fn children_rev(&self, id: NodeId) -> ChildrenRev<'_> {
        self.validate(id);
        ChildrenRev::new(self, self.last_child_idx(id.idx))
    }

    // -- Identity API --

    /// Renames a node. An empty name makes it unaddressable.
    ///
    /// If the node is reachable from the root, the registry is updated
    /// immediately; otherwise the name registers on attach.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateId`] (leaving the node unchanged) if
    /// the node is rooted and the name is already registered to another node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn set_name(&mut self, id: NodeId, name: &str) -> Result<(), SceneError> {
        self.validate(id);
        let i = id.idx;
        let rooted = self.is_rooted(i);
        if rooted
            && !name.is_empty()
            && self.names.get(name).is_some_and(|&owner| owner != i)
        {
            return Err(SceneError::DuplicateId(name.to_string()));
        }
        if rooted && !self.name[i as usize].is_empty() {
            self.names.remove(&self.name[i as usize]);
        }
        self.name[i as usize] = name.to_string();
        if rooted && !name.is_empty() {
            self.names.insert(name.to_string(), i);
        }
        Ok(())
    }

    /// Looks up a rooted node by name.
    #[must_use]
    pub fn element_by_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).map(|&idx| NodeId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the kind of a node, including its surface binding.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.validate(id);
        self.kind[id.idx as usize]
    }

    /// Returns the name of a node (empty if unaddressable).
    #[must_use]
    pub fn name(&self, id: NodeId) -> &str {
        self.validate(id);
        &self.name[id.idx as usize]
    }

    /// Returns the viewport of a node in parent coordinates.
    #[must_use]
    pub fn rel_viewport(&self, id: NodeId) -> Rect {
        self.validate(id);
        self.rel_viewport[id.idx as usize]
    }

    /// Returns the computed viewport of a node in screen coordinates.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn abs_viewport(&self, id: NodeId) -> Rect {
        self.validate(id);
        self.abs_viewport[id.idx as usize]
    }

    /// Returns the z-order key of a node.
    #[must_use]
    pub fn z(&self, id: NodeId) -> i32 {
        self.validate(id);
        self.z[id.idx as usize]
    }

    /// Returns the local opacity of a node.
    #[must_use]
    pub fn opacity(&self, id: NodeId) -> f64 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Returns the computed effective opacity of a node.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn effective_opacity(&self, id: NodeId) -> f64 {
        self.validate(id);
        self.effective_opacity[id.idx as usize]
    }

    /// Returns whether the node is active and reachable through active
    /// ancestors from the root.
    ///
    /// Only valid after [`evaluate`](Self::evaluate) has been called.
    #[must_use]
    pub fn effective_active(&self, id: NodeId) -> bool {
        self.validate(id);
        self.effective_active[id.idx as usize]
    }

    /// Returns the flags of a node.
    #[must_use]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the rotation of a node in radians.
    #[must_use]
    pub fn angle(&self, id: NodeId) -> f64 {
        self.validate(id);
        self.angle[id.idx as usize]
    }

    /// Returns the rotation pivot in node-local coordinates, if overridden.
    #[must_use]
    pub fn pivot(&self, id: NodeId) -> Option<Point> {
        self.validate(id);
        self.pivot[id.idx as usize]
    }

    /// Returns whether a container crops its children to its viewport.
    #[must_use]
    pub fn crop(&self, id: NodeId) -> bool {
        self.validate(id);
        self.crop[id.idx as usize]
    }

    // -- Mutation API (auto-marks dirty) --

    /// Updates the viewport of a node in parent coordinates.
    ///
    /// Pass `None` for any component to keep its current value. A negative
    /// width or height collapses to zero area. Both the old and the new
    /// visible area of the subtree become dirty on the next evaluate.
    pub fn set_viewport(
        &mut self,
        id: NodeId,
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    ) {
        self.validate(id);
        let i = id.idx;
        let r = self.rel_viewport[i as usize];
        let x = x.unwrap_or(r.x0);
        let y = y.unwrap_or(r.y0);
        let w = width.unwrap_or(r.width()).max(0.0);
        let h = height.unwrap_or(r.height()).max(0.0);
        self.rel_viewport[i as usize] = Rect::new(x, y, x + w, y + h);
        self.dirty.mark_with(i, dirty::VIEWPORT, &EagerPolicy);
    }

    /// Updates the z-order key of a node, re-slotting it among its siblings.
    pub fn set_z(&mut self, id: NodeId, z: i32) {
        self.validate(id);
        let i = id.idx;
        if self.z[i as usize] == z {
            return;
        }
        self.z[i as usize] = z;
        let p = self.parent[i as usize];
        if p != INVALID {
            self.unlink_from_parent(i);
            let before = self.z_insertion_point(p, z);
            self.link_child(p, i, before);
            self.traversal_dirty = true;
            self.dirty.mark(p, dirty::TOPOLOGY);
            // Stacking changed under the same rectangle.
            self.dirty.mark(i, dirty::CONTENT);
        }
    }

    /// Updates the local opacity of a node, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        self.validate(id);
        self.opacity[id.idx as usize] = opacity.clamp(0.0, 1.0);
        self.dirty.mark_with(id.idx, dirty::OPACITY, &EagerPolicy);
    }

    /// Sets whether the node participates in render and input.
    pub fn set_active(&mut self, id: NodeId, active: bool) {
        self.validate(id);
        self.flags[id.idx as usize].active = active;
        // Routed through VIEWPORT so one drain recomputes both.
        self.dirty.mark_with(id.idx, dirty::VIEWPORT, &EagerPolicy);
    }

    /// Sets whether the node receives pointer events. Purely an input
    /// property; nothing is repainted.
    pub fn set_sensitive(&mut self, id: NodeId, sensitive: bool) {
        self.validate(id);
        self.flags[id.idx as usize].sensitive = sensitive;
    }

    /// Updates the rotation of a node in radians.
    pub fn set_angle(&mut self, id: NodeId, angle: f64) {
        self.validate(id);
        let i = id.idx;
        if self.effective_active[i as usize] {
            // The area painted under the old angle must be cleared.
            let old = self.paint_bounds_at(i);
            self.pending_damage.add_rect(old);
        }
        self.angle[i as usize] = angle;
        self.dirty.mark(i, dirty::CONTENT);
    }

    /// Overrides the rotation pivot in node-local coordinates, or restores
    /// the default (viewport center) with `None`.
    pub fn set_pivot(&mut self, id: NodeId, pivot: Option<Point>) {
        self.validate(id);
        let i = id.idx;
        if self.effective_active[i as usize] {
            let old = self.paint_bounds_at(i);
            self.pending_damage.add_rect(old);
        }
        self.pivot[i as usize] = pivot;
        self.dirty.mark(i, dirty::CONTENT);
    }

    /// Sets whether a container crops its children to its viewport.
    ///
    /// # Panics
    ///
    /// Panics if the node is not a container kind.
    pub fn set_crop(&mut self, id: NodeId, crop: bool) {
        self.validate(id);
        let i = id.idx;
        assert!(
            self.kind[i as usize].is_container(),
            "only containers can crop"
        );
        // Children may extend beyond the container, so the whole subtree's
        // painted area changes when the crop toggles.
        self.damage_subtree(i);
        self.crop[i as usize] = crop;
        self.dirty.mark(i, dirty::CONTENT);
    }

    /// Binds a backend surface to a leaf node.
    ///
    /// # Panics
    ///
    /// Panics if the node is a container kind.
    pub fn set_surface(&mut self, id: NodeId, surface: SurfaceHandle) {
        self.validate(id);
        let i = id.idx;
        match &mut self.kind[i as usize] {
            NodeKind::Group | NodeKind::Overlay => panic!("node kind has no surface"),
            NodeKind::Image { surface: s, .. }
            | NodeKind::Video { surface: s }
            | NodeKind::Words { surface: s } => *s = Some(surface),
        }
        self.dirty.mark(i, dirty::CONTENT);
    }

    /// Requests a repaint of the node's current visible area.
    ///
    /// Called when the node's pixels changed without any property mutation,
    /// e.g. after a decoder wrote a new video frame.
    pub fn invalidate(&mut self, id: NodeId) {
        self.validate(id);
        self.dirty.mark(id.idx, dirty::CONTENT);
    }

    // -- Raw-index accessors for render passes --
    //
    // These accept raw slot indices (as found in `FrameChanges` or
    // `traversal_order()`) rather than `NodeId` handles, skipping generation
    // validation.

    /// Returns the computed screen viewport at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn abs_viewport_at(&self, idx: u32) -> Rect {
        self.check_slot(idx);
        self.abs_viewport[idx as usize]
    }

    /// Returns the computed effective opacity at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn effective_opacity_at(&self, idx: u32) -> f64 {
        self.check_slot(idx);
        self.effective_opacity[idx as usize]
    }

    /// Returns whether the node at raw slot `idx` is effectively active.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn effective_active_at(&self, idx: u32) -> bool {
        self.check_slot(idx);
        self.effective_active[idx as usize]
    }

    /// Returns the kind at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn kind_at(&self, idx: u32) -> NodeKind {
        self.check_slot(idx);
        self.kind[idx as usize]
    }

    /// Returns the z key at raw slot `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn z_at(&self, idx: u32) -> i32 {
        self.check_slot(idx);
        self.z[idx as usize]
    }

    /// Returns the rotation at raw slot `idx`, in radians.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn angle_at(&self, idx: u32) -> f64 {
        self.check_slot(idx);
        self.angle[idx as usize]
    }

    /// Returns the rotation pivot at raw slot `idx`, in screen coordinates.
    ///
    /// Defaults to the viewport center when no pivot is set.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn pivot_abs_at(&self, idx: u32) -> Point {
        self.check_slot(idx);
        let abs = self.abs_viewport[idx as usize];
        match self.pivot[idx as usize] {
            Some(p) => Point::new(abs.x0 + p.x, abs.y0 + p.y),
            None => abs.center(),
        }
    }

    /// Returns whether the container at raw slot `idx` crops its children.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn crop_at(&self, idx: u32) -> bool {
        self.check_slot(idx);
        self.crop[idx as usize]
    }

    /// Returns the first child slot of raw slot `idx`, or [`INVALID`].
    ///
    /// Together with [`next_sibling_at`](Self::next_sibling_at) this walks a
    /// container's children in ascending z order.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn first_child_at(&self, idx: u32) -> u32 {
        self.check_slot(idx);
        self.first_child[idx as usize]
    }

    /// Returns the next sibling slot of raw slot `idx`, or [`INVALID`].
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len`.
    #[must_use]
    pub fn next_sibling_at(&self, idx: u32) -> u32 {
        self.check_slot(idx);
        self.next_sibling[idx as usize]
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    fn check_slot(&self, idx: u32) {
        assert!(
            idx < self.len,
            "slot index {idx} out of range (len {})",
            self.len
        );
    }

    /// Whether slot `idx` is reachable from the root through parent links.
    pub(crate) fn is_rooted(&self, idx: u32) -> bool {
        let mut cur = idx;
        loop {
            if cur == self.root {
                return true;
            }
            cur = self.parent[cur as usize];
            if cur == INVALID {
                return false;
            }
        }
    }

    /// The painted screen bounds of slot `idx` as of the last evaluate,
    /// accounting for rotation.
    pub(crate) fn paint_bounds_at(&self, idx: u32) -> Rect {
        let abs = self.abs_viewport[idx as usize];
        rotated_bounds(&abs, self.angle[idx as usize], self.pivot_abs_at(idx))
    }

    /// Last child of slot `idx`, or [`INVALID`] if childless.
    pub(crate) fn last_child_idx(&self, idx: u32) -> u32 {
        let mut cur = self.first_child[idx as usize];
        if cur == INVALID {
            return INVALID;
        }
        while self.next_sibling[cur as usize] != INVALID {
            cur = self.next_sibling[cur as usize];
        }
        cur
    }

    /// Depth-first pre-order slot indices of the subtree rooted at `idx`.
    pub(crate) fn subtree_indices(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        self.collect_subtree(idx, &mut out);
        out
    }

    fn collect_subtree(&self, idx: u32, out: &mut Vec<u32>) {
        out.push(idx);
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.collect_subtree(child, out);
            child = self.next_sibling[child as usize];
        }
    }

    /// Returns the sibling to insert a z-`z` child before, or [`INVALID`] to
    /// append at the end.
    fn z_insertion_point(&self, p: u32, z: i32) -> u32 {
        let tie = self.kind[p as usize].z_tie_break();
        let mut cur = self.first_child[p as usize];
        while cur != INVALID {
            let other = self.z[cur as usize];
            if z < other || (z == other && tie == ZTieBreak::Before) {
                return cur;
            }
            cur = self.next_sibling[cur as usize];
        }
        INVALID
    }

    /// Links `c` under `p`, before sibling `before` (or at the end).
    fn link_child(&mut self, p: u32, c: u32, before: u32) {
        self.parent[c as usize] = p;
        if before == INVALID {
            self.next_sibling[c as usize] = INVALID;
            let last = self.last_child_idx(p);
            if last == INVALID {
                self.first_child[p as usize] = c;
                self.prev_sibling[c as usize] = INVALID;
            } else {
                self.next_sibling[last as usize] = c;
                self.prev_sibling[c as usize] = last;
            }
        } else {
            self.next_sibling[c as usize] = before;
            self.prev_sibling[c as usize] = self.prev_sibling[before as usize];
            if self.prev_sibling[before as usize] != INVALID {
                self.next_sibling[self.prev_sibling[before as usize] as usize] = c;
            } else {
                self.first_child[p as usize] = c;
            }
            self.prev_sibling[before as usize] = c;
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty
    /// state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Detaches slot `c` from its parent: damages and unregisters the
    /// subtree, unlinks, and drops dependency edges. `remark` additionally
    /// re-marks inherited channels so a kept-alive subtree recomputes as
    /// detached.
    fn detach(&mut self, c: u32, remark: bool) {
        let p = self.parent[c as usize];
        if self.is_rooted(p) {
            self.damage_subtree(c);
            self.unregister_subtree_names(c);
        }
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::VIEWPORT);
        self.dirty.remove_dependency(c, p, dirty::OPACITY);
        if remark {
            self.mark_subtree_inherited_dirty(c);
        }
        self.traversal_dirty = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Adds the painted area of every effectively active node in the subtree
    /// to the pending damage.
    fn damage_subtree(&mut self, idx: u32) {
        for i in self.subtree_indices(idx) {
            if self.effective_active[i as usize] {
                let bounds = self.paint_bounds_at(i);
                self.pending_damage.add_rect(bounds);
            }
        }
    }

    /// Pre-checks and registers every name in the subtree rooted at `start`.
    ///
    /// Checks the whole subtree (including duplicates within it) before
    /// inserting anything, so a rejected attach leaves the registry intact.
    fn register_subtree_names(&mut self, start: u32) -> Result<(), SceneError> {
        let subtree = self.subtree_indices(start);
        let mut seen: Vec<&str> = Vec::new();
        for &i in &subtree {
            let name = self.name[i as usize].as_str();
            if name.is_empty() {
                continue;
            }
            if self.names.contains_key(name) || seen.contains(&name) {
                return Err(SceneError::DuplicateId(name.to_string()));
            }
            seen.push(name);
        }
        for &i in &subtree {
            let name = &self.name[i as usize];
            if !name.is_empty() {
                self.names.insert(name.clone(), i);
            }
        }
        Ok(())
    }

    fn unregister_subtree_names(&mut self, start: u32) {
        for i in self.subtree_indices(start) {
            if !self.name[i as usize].is_empty() {
                self.names.remove(&self.name[i as usize]);
            }
        }
    }

    /// Marks the subtree rooted at `idx` dirty for inherited channels.
    fn mark_subtree_inherited_dirty(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::VIEWPORT, &EagerPolicy);
        self.dirty.mark_with(idx, dirty::OPACITY, &EagerPolicy);
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    fn graph() -> SceneGraph {
        SceneGraph::new(640.0, 480.0)
    }

    #[test]
    fn create_and_destroy() {
        let mut g = graph();
        let id = g.create_node(NodeKind::Group);
        assert!(g.is_alive(id));
        g.destroy_node(id);
        assert!(!g.is_alive(id));
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut g = graph();
        let id1 = g.create_node(NodeKind::Group);
        g.destroy_node(id1);
        let id2 = g.create_node(NodeKind::Group);
        assert!(!g.is_alive(id1));
        assert!(g.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn destroyed_handle_panics_on_getter() {
        let mut g = graph();
        let id = g.create_node(NodeKind::Group);
        g.destroy_node(id);
        let _ = g.rel_viewport(id);
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn destroyed_handle_panics_on_append() {
        let mut g = graph();
        let root = g.root();
        let id = g.create_node(NodeKind::Group);
        g.destroy_node(id);
        let _ = g.append_child(root, id);
    }

    #[test]
    #[should_panic(expected = "cannot destroy the root node")]
    fn destroying_root_panics() {
        let mut g = graph();
        let root = g.root();
        g.destroy_node(root);
    }

    #[test]
    fn destroy_takes_subtree_along() {
        let mut g = graph();
        let root = g.root();
        let outer = g.create_node(NodeKind::Group);
        let inner = g.create_node(NodeKind::Image {
            surface: None,
            opaque: false,
        });
        g.append_child(root, outer).unwrap();
        g.append_child(outer, inner).unwrap();

        g.destroy_node(outer);
        assert!(!g.is_alive(outer));
        assert!(!g.is_alive(inner));
        assert_eq!(g.child_count(root), 0);
    }

    #[test]
    fn children_are_sorted_by_z() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        let b = g.create_node(NodeKind::Group);
        let c = g.create_node(NodeKind::Group);
        g.set_z(a, 0);
        g.set_z(b, 5);
        g.set_z(c, 2);
        g.append_child(root, a).unwrap();
        g.append_child(root, b).unwrap();
        g.append_child(root, c).unwrap();

        assert_eq!(g.z(g.child(root, 0)), 0);
        assert_eq!(g.z(g.child(root, 1)), 2);
        assert_eq!(g.z(g.child(root, 2)), 5);
    }

    #[test]
    fn equal_z_appends_after_in_groups() {
        let mut g = graph();
        let root = g.root();
        let first = g.create_node(NodeKind::Group);
        let second = g.create_node(NodeKind::Group);
        g.append_child(root, first).unwrap();
        g.append_child(root, second).unwrap();

        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![first, second]);
    }

    #[test]
    fn equal_z_inserts_before_in_overlays() {
        let mut g = graph();
        let root = g.root();
        let overlay = g.create_node(NodeKind::Overlay);
        g.append_child(root, overlay).unwrap();

        let first = g.create_node(NodeKind::Group);
        let second = g.create_node(NodeKind::Group);
        g.append_child(overlay, first).unwrap();
        g.append_child(overlay, second).unwrap();

        let kids: Vec<_> = g.children(overlay).collect();
        assert_eq!(kids, vec![second, first]);
    }

    #[test]
    fn set_z_reslots_the_child() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        let b = g.create_node(NodeKind::Group);
        g.set_z(a, 1);
        g.set_z(b, 2);
        g.append_child(root, a).unwrap();
        g.append_child(root, b).unwrap();

        g.set_z(a, 3);
        let kids: Vec<_> = g.children(root).collect();
        assert_eq!(kids, vec![b, a]);
    }

    #[test]
    #[should_panic(expected = "child index 2 out of range")]
    fn child_index_out_of_range_panics() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        g.append_child(root, a).unwrap();
        let _ = g.child(root, 2);
    }

    #[test]
    #[should_panic(expected = "node kind cannot have children")]
    fn leaf_cannot_take_children() {
        let mut g = graph();
        let img = g.create_node(NodeKind::Image {
            surface: None,
            opaque: false,
        });
        let other = g.create_node(NodeKind::Group);
        let _ = g.append_child(img, other);
    }

    #[test]
    fn duplicate_name_on_attach_is_rejected() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        g.append_child(root, a).unwrap();
        g.set_name(a, "hero").unwrap();

        let b = g.create_node(NodeKind::Group);
        g.set_name(b, "hero").unwrap();
        assert_eq!(
            g.append_child(root, b),
            Err(SceneError::DuplicateId("hero".into()))
        );
        assert_eq!(g.parent(b), None, "failed attach leaves the node detached");
    }

    #[test]
    fn detach_unregisters_names() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        g.append_child(root, a).unwrap();
        g.set_name(a, "panel").unwrap();
        assert_eq!(g.element_by_id("panel"), Some(a));

        g.remove_child(a);
        assert_eq!(g.element_by_id("panel"), None);

        // Re-attach registers again.
        g.append_child(root, a).unwrap();
        assert_eq!(g.element_by_id("panel"), Some(a));
    }

    #[test]
    fn set_name_on_rooted_node_checks_duplicates() {
        let mut g = graph();
        let root = g.root();
        let a = g.create_node(NodeKind::Group);
        let b = g.create_node(NodeKind::Group);
        g.append_child(root, a).unwrap();
        g.append_child(root, b).unwrap();
        g.set_name(a, "logo").unwrap();

        assert_eq!(
            g.set_name(b, "logo"),
            Err(SceneError::DuplicateId("logo".into()))
        );
        assert_eq!(g.name(b), "");
        // Renaming a to itself is fine.
        g.set_name(a, "logo").unwrap();
    }

    #[test]
    fn set_viewport_keeps_unspecified_components() {
        let mut g = graph();
        let a = g.create_node(NodeKind::Group);
        g.set_viewport(a, Some(10.0), Some(20.0), Some(30.0), Some(40.0));
        g.set_viewport(a, None, Some(25.0), None, None);
        assert_eq!(g.rel_viewport(a), Rect::new(10.0, 25.0, 40.0, 65.0));
    }

    #[test]
    fn negative_size_collapses_to_zero_area() {
        let mut g = graph();
        let a = g.create_node(NodeKind::Group);
        g.set_viewport(a, Some(10.0), Some(10.0), Some(-5.0), Some(8.0));
        let r = g.rel_viewport(a);
        assert_eq!(r.width(), 0.0);
        assert_eq!(r.height(), 8.0);
    }

    #[test]
    fn opacity_is_clamped() {
        let mut g = graph();
        let a = g.create_node(NodeKind::Group);
        g.set_opacity(a, 1.5);
        assert_eq!(g.opacity(a), 1.0);
        g.set_opacity(a, -0.5);
        assert_eq!(g.opacity(a), 0.0);
    }

    #[test]
    fn surface_binding() {
        let mut g = graph();
        let v = g.create_node(NodeKind::Video { surface: None });
        g.set_surface(v, SurfaceHandle(7));
        assert_eq!(g.kind(v).surface(), Some(SurfaceHandle(7)));
    }

    #[test]
    #[should_panic(expected = "node kind has no surface")]
    fn surface_on_container_panics() {
        let mut g = graph();
        let grp = g.create_node(NodeKind::Group);
        g.set_surface(grp, SurfaceHandle(1));
    }
}
