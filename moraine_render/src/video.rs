// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decoder sessions behind video nodes.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::fmt;

use moraine_core::backend::{DecodeOutcome, DisplayBackend, VideoDecoder};
use moraine_core::error::BackendError;
use moraine_core::scene::{NodeId, NodeKind, SceneGraph};
use moraine_core::time::{HostTime, Timebase};

struct VideoSession {
    decoder: Box<dyn VideoDecoder>,
    /// Host time of media position zero.
    start: HostTime,
    finished: bool,
}

/// Open decoder sessions, keyed by the video node they feed.
///
/// The render pass polls every session once per frame. A decoder that has a
/// new frame due writes it to the node's surface; the registry then tells the
/// backend the surface changed and invalidates the node so its screen area
/// repaints. At end of stream the last frame stays on the surface and the
/// decoder is no longer polled.
///
/// Sessions whose node has been destroyed are closed and dropped on the next
/// poll.
pub struct VideoRegistry {
    sessions: BTreeMap<NodeId, VideoSession>,
    timebase: Timebase,
}

impl fmt::Debug for VideoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoRegistry")
            .field("sessions", &self.sessions.len())
            .field("timebase", &self.timebase)
            .finish()
    }
}

impl VideoRegistry {
    /// Creates an empty registry for clocks running on `timebase`.
    #[must_use]
    pub fn new(timebase: Timebase) -> Self {
        Self {
            sessions: BTreeMap::new(),
            timebase,
        }
    }

    /// Opens a decoder session feeding `node`.
    ///
    /// Allocates a surface matching the node's viewport, binds it to the
    /// node, and starts the media clock at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::SurfaceCreation`] if the surface could not be
    /// allocated; the node is left without a session.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a video node or already has a session.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "viewport sizes are small positive pixel counts"
    )]
    pub fn attach(
        &mut self,
        scene: &mut SceneGraph,
        backend: &mut dyn DisplayBackend,
        node: NodeId,
        decoder: Box<dyn VideoDecoder>,
        now: HostTime,
    ) -> Result<(), BackendError> {
        assert!(
            matches!(scene.kind(node), NodeKind::Video { .. }),
            "decoder sessions require a video node"
        );
        assert!(
            !self.sessions.contains_key(&node),
            "node already has a decoder session"
        );
        let rect = scene.rel_viewport(node);
        let surface =
            backend.create_surface(rect.width().max(1.0) as u32, rect.height().max(1.0) as u32)?;
        scene.set_surface(node, surface);
        self.sessions.insert(
            node,
            VideoSession {
                decoder,
                start: now,
                finished: false,
            },
        );
        Ok(())
    }

    /// Closes the session feeding `node`, if any.
    ///
    /// The node keeps its surface with whatever frame was last decoded.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(mut session) = self.sessions.remove(&node) {
            session.decoder.close();
        }
    }

    /// Repositions the stream feeding `node` and resumes polling it.
    pub fn seek(&mut self, node: NodeId, media_time_nanos: u64, now: HostTime) {
        if let Some(session) = self.sessions.get_mut(&node) {
            session.decoder.seek(media_time_nanos);
            let offset = self.timebase.nanos_to_ticks(media_time_nanos);
            session.start = HostTime(now.ticks().saturating_sub(offset));
            session.finished = false;
        }
    }

    /// Whether the stream feeding `node` has reached its end.
    #[must_use]
    pub fn is_finished(&self, node: NodeId) -> bool {
        self.sessions.get(&node).is_some_and(|s| s.finished)
    }

    /// Number of open sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Polls every open session once.
    ///
    /// Sessions whose node is gone are closed and dropped. A session that
    /// produced a frame marks its surface changed and invalidates the node.
    ///
    /// # Errors
    ///
    /// Returns the first decoder error; remaining sessions are not polled
    /// this frame.
    pub fn advance(
        &mut self,
        scene: &mut SceneGraph,
        backend: &mut dyn DisplayBackend,
        now: HostTime,
    ) -> Result<(), BackendError> {
        let dead: alloc::vec::Vec<NodeId> = self
            .sessions
            .keys()
            .copied()
            .filter(|&n| !scene.is_alive(n))
            .collect();
        for node in dead {
            self.detach(node);
        }
        let timebase = self.timebase;
        for (&node, session) in &mut self.sessions {
            if session.finished {
                continue;
            }
            let Some(surface) = scene.kind(node).surface() else {
                continue;
            };
            let media_nanos = now.saturating_duration_since(session.start).to_nanos(timebase);
            match session.decoder.render_to_surface(surface, media_nanos)? {
                DecodeOutcome::Frame => {
                    backend.surface_changed(surface);
                    scene.invalidate(node);
                }
                DecodeOutcome::NoFrameYet => {}
                DecodeOutcome::EndOfStream => {
                    session.finished = true;
                }
            }
        }
        Ok(())
    }
}
