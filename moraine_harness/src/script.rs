// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use moraine_core::backend::{DecodeOutcome, SurfaceHandle, VideoDecoder};
use moraine_core::error::BackendError;
use moraine_input::dispatch::EventSource;
use moraine_input::event::Event;

/// An [`EventSource`] that replays pre-planned batches, one per poll.
///
/// Each call to `poll_events` returns the next batch, so a test scripts one
/// batch per player frame. An exhausted source returns empty batches.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    batches: VecDeque<Vec<Event>>,
}

impl ScriptedSource {
    /// Creates a source with no batches.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch to be returned by the next unclaimed poll.
    pub fn push_batch(&mut self, batch: Vec<Event>) {
        self.batches.push_back(batch);
    }

    /// Builder-style [`push_batch`](Self::push_batch).
    #[must_use]
    pub fn with_batch(mut self, batch: Vec<Event>) -> Self {
        self.push_batch(batch);
        self
    }
}

impl EventSource for ScriptedSource {
    fn poll_events(&mut self) -> Vec<Event> {
        self.batches.pop_front().unwrap_or_default()
    }
}

/// A [`VideoDecoder`] that replays a fixed sequence of outcomes.
///
/// Each poll pops the next outcome; an exhausted script reports
/// [`DecodeOutcome::EndOfStream`]. Seek targets and closure are recorded for
/// assertions.
#[derive(Debug)]
pub struct ScriptedDecoder {
    outcomes: VecDeque<DecodeOutcome>,
    fps: f64,
    /// Media times passed to `seek`, in order.
    pub seeks: Vec<u64>,
    /// Whether `close` has been called.
    pub closed: bool,
    /// Media times passed to `render_to_surface`, in order.
    pub polls: Vec<u64>,
}

impl ScriptedDecoder {
    /// Creates a decoder that yields the given outcomes in order.
    #[must_use]
    pub fn new(fps: f64, outcomes: impl IntoIterator<Item = DecodeOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            fps,
            seeks: Vec::new(),
            closed: false,
            polls: Vec::new(),
        }
    }
}

impl VideoDecoder for ScriptedDecoder {
    fn render_to_surface(
        &mut self,
        surface: SurfaceHandle,
        media_time_nanos: u64,
    ) -> Result<DecodeOutcome, BackendError> {
        _ = surface;
        self.polls.push(media_time_nanos);
        Ok(self
            .outcomes
            .pop_front()
            .unwrap_or(DecodeOutcome::EndOfStream))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, media_time_nanos: u64) {
        self.seeks.push(media_time_nanos);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
