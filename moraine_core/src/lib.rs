// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene tree, dirty regions, and frame pacing for the moraine presentation
//! engine.
//!
//! `moraine_core` provides the data structures at the heart of a declarative
//! multimedia player: a tree of visual nodes with z-ordering and viewport
//! inheritance, dirty-rectangle accumulation for incremental repaint, and the
//! traits a display backend implements. It is `no_std` compatible (with
//! `alloc`) and uses array-based struct-of-arrays storage with generational
//! index handles.
//!
//! # Architecture
//!
//! One frame is a strict sequence of passes over the scene:
//!
//! ```text
//!   input events ──► mutations (set_viewport, set_z, ...)
//!                        │ mark dirty channels + old rects
//!                        ▼
//!   SceneGraph::evaluate() ──► FrameChanges (abs viewports, opacities)
//!                        │
//!                        ▼
//!   SceneGraph::collect_dirty_region() ──► Region (screen rects to repaint)
//!                        │
//!                        ▼
//!   draw pass (moraine_render) ──► DisplayBackend::blit/present
//! ```
//!
//! **[`scene`]** — Struct-of-arrays node tree with generational handles.
//! Local properties (viewport, z, opacity, flags) are set by the caller;
//! absolute viewports and effective opacities are computed by evaluation.
//!
//! **[`region`]** — Disjoint dirty-rectangle sets with merge-on-insert.
//!
//! **[`dirty`]** — Multi-channel dirty tracking via `understory_dirty`.
//! VIEWPORT and OPACITY propagate to descendants; CONTENT is local-only;
//! TOPOLOGY triggers a traversal rebuild.
//!
//! **[`backend`]** — The [`DisplayBackend`](backend::DisplayBackend) and
//! [`VideoDecoder`](backend::VideoDecoder) traits the platform implements.
//!
//! **[`pacing`]** — Target-rate frame pacing with smoothed frame-cost
//! estimation.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-frame
//!   damage-rect events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod backend;
pub mod dirty;
pub mod error;
pub mod geom;
pub mod pacing;
pub mod region;
pub mod scene;
pub mod time;
pub mod trace;
