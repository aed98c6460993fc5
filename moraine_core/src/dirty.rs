// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Moraine uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! propagate invalidation through the scene tree. Each channel is an
//! independent category of change.
//!
//! # Propagation semantics
//!
//! - **Propagating** — [`VIEWPORT`] and [`OPACITY`] use
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and have dependency edges
//!   from child to parent, so marking a parent automatically marks every
//!   descendant. Absolute viewports and effective opacities are inherited;
//!   active-flag changes are routed through [`VIEWPORT`] so one drain pass
//!   recomputes absolute position and `effective_active` together.
//!
//! - **Local-only** — [`CONTENT`] uses the default policy. Only the marked
//!   node shows up in the drain output, since pixel content is a per-node
//!   property.
//!
//! - **Structural** — [`TOPOLOGY`] is marked on add/remove/reorder of
//!   children. It triggers a traversal-order rebuild during evaluation but
//!   does not propagate.
//!
//! # Consumption
//!
//! Callers never query dirty state directly. Each
//! [`SceneGraph::evaluate`](crate::scene::SceneGraph::evaluate) call drains
//! all channels, recomputes derived state, and folds the damaged screen area
//! into the pending dirty [`Region`](crate::region::Region) that the next
//! collect pass drains.

use understory_dirty::Channel;

/// Relative viewport or active flag changed — requires absolute viewport and
/// effective active recomputation for descendants.
pub const VIEWPORT: Channel = Channel::new(0);

/// Opacity changed — requires effective opacity recomputation for descendants.
pub const OPACITY: Channel = Channel::new(1);

/// Pixel content changed — no propagation needed.
pub const CONTENT: Channel = Channel::new(2);

/// Tree topology or z-order changed — triggers traversal order rebuild.
pub const TOPOLOGY: Channel = Channel::new(3);

/// Number of channels a scene's tracker is configured with.
pub const CHANNEL_COUNT: usize = 4;
