// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene tree data model.
//!
//! A *node* is one element of the presentation tree. Each node has:
//!
//! - An identity ([`NodeId`]) — a generational handle that becomes stale when
//!   the node is destroyed, plus an optional string name resolvable through
//!   [`element_by_id`](SceneGraph::element_by_id) while attached.
//! - A kind ([`NodeKind`]) — container ([`Group`](NodeKind::Group),
//!   [`Overlay`](NodeKind::Overlay)) or surface-presenting leaf (image,
//!   video, words).
//! - Topology — parent, first-child, and sibling links; siblings are kept
//!   sorted by ascending z at all times.
//! - **Local properties** set by the caller:
//!   [`viewport`](SceneGraph::set_viewport) (in parent coordinates),
//!   [`z`](SceneGraph::set_z), [`opacity`](SceneGraph::set_opacity),
//!   [`angle`](SceneGraph::set_angle), and the active/sensitive
//!   [`flags`](SceneGraph::flags).
//! - **Computed properties** produced by [`evaluate`](SceneGraph::evaluate):
//!   `abs_viewport` (parent's absolute viewport translated by the relative
//!   one), `effective_opacity` (product of ancestor opacities), and
//!   `effective_active` (conjunction of ancestor active flags and root
//!   reachability).
//!
//! Nodes are stored in struct-of-arrays layout with index-based handles for
//! cache-friendly traversal.
//!
//! # Dirty tracking and damage
//!
//! Property mutations mark the corresponding dirty channel (see
//! [`dirty`](crate::dirty)). Evaluation drains the channels, recomputes the
//! derived properties, and records the changed screen area so that
//! [`collect_dirty_region`](SceneGraph::collect_dirty_region) can hand the
//! draw pass the exact rectangles to repaint. A node that moves damages both
//! its old and new rectangle; one that detaches or deactivates damages its
//! last visible area.

mod evaluate;
mod hittest;
mod id;
mod kind;
mod store;
mod traverse;

pub use evaluate::FrameChanges;
pub use id::{INVALID, NodeId};
pub use kind::{NodeKind, ZTieBreak};
pub use store::{NodeFlags, SceneGraph};
pub use traverse::{Children, ChildrenRev};
