// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event dispatch and cursor routing for the moraine presentation engine.
//!
//! This crate turns raw input into scene-directed deliveries. It has two
//! halves:
//!
//! - [`dispatch`] collects events from pluggable [`EventSource`]s into a
//!   priority queue keyed by `(timestamp, arrival order)`, then hands each
//!   event to a chain of [`EventSink`]s. A sink that returns `true` consumes
//!   the event.
//! - [`routing`] is the cursor half. A [`CursorRouter`] hit-tests each cursor
//!   event against a [`SceneGraph`], synthesizes over/out transitions when the
//!   node under a cursor changes, honors per-cursor captures, and bubbles the
//!   event from the innermost hit node toward the root until a handler claims
//!   it.
//!
//! Events carry host timestamps ([`moraine_core::time::HostTime`]), so two
//! sources reporting out of order still dispatch in timestamp order within a
//! frame.
//!
//! [`EventSource`]: dispatch::EventSource
//! [`EventSink`]: dispatch::EventSink
//! [`CursorRouter`]: routing::CursorRouter
//! [`SceneGraph`]: moraine_core::scene::SceneGraph

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![no_std]

extern crate alloc;

pub mod dispatch;
pub mod event;
pub mod routing;
