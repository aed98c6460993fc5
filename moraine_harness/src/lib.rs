// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles for the moraine engine.
//!
//! Everything here is deterministic and allocation-only, so tests can run a
//! full player loop without a display, a decoder library, or a real clock:
//!
//! - [`RecordingBackend`] implements
//!   [`DisplayBackend`](moraine_core::backend::DisplayBackend) and logs every
//!   call as a [`BackendOp`] for assertions.
//! - [`FakeClock`] implements [`Clock`](moraine_core::time::Clock) and only
//!   moves when told to.
//! - [`ScriptedSource`] feeds pre-planned event batches, one batch per poll.
//! - [`ScriptedDecoder`] replays a fixed sequence of decode outcomes.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![no_std]

extern crate alloc;

mod backend;
mod clock;
mod script;

pub use backend::{BackendOp, RecordingBackend, SharedBackend};
pub use clock::FakeClock;
pub use script::{ScriptedDecoder, ScriptedSource};
