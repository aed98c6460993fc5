// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The frame loop and embedding facade of the moraine presentation engine.
//!
//! [`Player`] owns the scene, the input plumbing, the render pass, and the
//! platform backend, and exposes one entry point: [`Player::do_frame`]. Each
//! call runs exactly one tick:
//!
//! 1. **Dispatch** — drain queued input events through the cursor router and
//!    the control sink, in timestamp order. Handlers mutate the scene here.
//! 2. **Prepare** — advance open video sessions and evaluate the scene.
//! 3. **Collect** — gather the dirty screen region.
//! 4. **Draw** — repaint exactly the dirty rectangles, back to front.
//! 5. **Present** — flip the repainted region to the screen.
//!
//! The returned [`FrameOutcome`] tells the host whether anything was
//! presented, how long to sleep before the next tick, and whether the player
//! is still running. A quit event from the host, a press of Escape, or a
//! call to [`Player::stop`] ends the run after the current tick completes.
//!
//! The player never spins a loop itself; the host calls `do_frame` from
//! whatever loop the platform demands.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![no_std]

extern crate alloc;

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use kurbo::Point;
use moraine_core::backend::{DisplayBackend, VideoDecoder};
use moraine_core::error::BackendError;
use moraine_core::pacing::{FramePacer, PacerConfig};
use moraine_core::scene::{NodeId, SceneGraph};
use moraine_core::time::{Clock, Duration, Timebase};
use moraine_core::trace::{
    FrameBeginEvent, FrameEndEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer,
};
use moraine_input::dispatch::{EventDispatcher, EventSink, EventSource};
use moraine_input::event::{CursorEvent, CursorId, Event, EventType, KeyEvent, SourceMask};
use moraine_input::routing::{CaptureError, CursorRouter};
use moraine_render::pass::RenderPass;
use moraine_render::video::VideoRegistry;

/// The keycode the built-in control sink treats as "stop".
pub const ESCAPE_KEYCODE: u32 = 27;

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameOutcome {
    /// `false` once the player has been asked to stop.
    pub running: bool,
    /// Whether anything reached the screen this tick.
    pub presented: bool,
    /// How long the host should sleep before the next tick.
    pub wait: Duration,
}

/// Feeds cursor and key events to the router. Always consumes cursor
/// events; key events pass through when no handler claims them.
struct RouterSink {
    router: Rc<RefCell<CursorRouter>>,
}

impl EventSink<SceneGraph> for RouterSink {
    fn handle_event(&mut self, scene: &mut SceneGraph, event: &Event) -> bool {
        match event {
            Event::Cursor(e) => {
                self.router.borrow_mut().handle_cursor_event(scene, e);
                true
            }
            Event::Key(e) => self.router.borrow_mut().handle_key_event(scene, e),
            Event::Quit { .. } => false,
        }
    }
}

/// Stops the player on a quit event or an unclaimed Escape press.
struct ControlSink {
    stopping: Rc<Cell<bool>>,
}

impl EventSink<SceneGraph> for ControlSink {
    fn handle_event(&mut self, _scene: &mut SceneGraph, event: &Event) -> bool {
        match event {
            Event::Quit { .. } => {
                self.stopping.set(true);
                true
            }
            Event::Key(k)
                if k.event_type == EventType::KeyDown && k.keycode == ESCAPE_KEYCODE =>
            {
                self.stopping.set(true);
                true
            }
            _ => false,
        }
    }
}

/// The engine facade: scene, input, videos, and the frame loop in one place.
pub struct Player {
    scene: SceneGraph,
    backend: Box<dyn DisplayBackend>,
    clock: Box<dyn Clock>,
    timebase: Timebase,
    dispatcher: EventDispatcher<SceneGraph>,
    router: Rc<RefCell<CursorRouter>>,
    pass: RenderPass,
    videos: VideoRegistry,
    pacer: FramePacer,
    stopping: Rc<Cell<bool>>,
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("scene", &self.scene)
            .field("timebase", &self.timebase)
            .field("dispatcher", &self.dispatcher)
            .field("pass", &self.pass)
            .field("videos", &self.videos)
            .field("stopping", &self.stopping.get())
            .finish_non_exhaustive()
    }
}

impl Player {
    /// Default target framerate, in frames per second.
    pub const DEFAULT_FRAMERATE: u32 = 60;

    /// Creates a player over a backend and a clock.
    ///
    /// The scene is sized to the backend's output and starts as an empty
    /// root container. `timebase` converts the clock's ticks to wall time.
    #[must_use]
    pub fn new(backend: Box<dyn DisplayBackend>, clock: Box<dyn Clock>, timebase: Timebase) -> Self {
        let (width, height) = backend.size();
        let router = Rc::new(RefCell::new(CursorRouter::new()));
        let stopping = Rc::new(Cell::new(false));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(RouterSink {
            router: router.clone(),
        }));
        dispatcher.add_sink(Box::new(ControlSink {
            stopping: stopping.clone(),
        }));
        Self {
            scene: SceneGraph::new(width, height),
            backend,
            clock,
            timebase,
            dispatcher,
            router,
            pass: RenderPass::new(),
            videos: VideoRegistry::new(timebase),
            pacer: FramePacer::new(PacerConfig {
                frame_period: Duration::per_frame(Self::DEFAULT_FRAMERATE, timebase),
                ema_alpha: 0.2,
            }),
            stopping,
        }
    }

    /// The scene graph, for reads.
    #[must_use]
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// The scene graph, for edits between ticks.
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// The root node of the scene.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.scene.root()
    }

    /// Looks a node up by its registered name.
    #[must_use]
    pub fn element_by_id(&self, name: &str) -> Option<NodeId> {
        self.scene.element_by_id(name)
    }

    /// The innermost sensitive node under a screen position.
    #[must_use]
    pub fn element_by_pos(&self, pos: Point) -> Option<NodeId> {
        self.scene.element_by_pos(pos)
    }

    /// Changes the target framerate. Frame cost statistics reset.
    ///
    /// # Panics
    ///
    /// Panics if `fps` is zero.
    pub fn set_framerate(&mut self, fps: u32) {
        self.pacer = FramePacer::new(PacerConfig {
            frame_period: Duration::per_frame(fps, self.timebase),
            ema_alpha: 0.2,
        });
    }

    /// Smoothed cost of recent ticks, in clock ticks.
    #[must_use]
    pub fn mean_frame_cost(&self) -> Duration {
        self.pacer.mean_frame_cost()
    }

    /// Number of ticks that overran the target period so far.
    #[must_use]
    pub fn frames_late(&self) -> u64 {
        self.pacer.frames_late()
    }

    /// Registers an input source, polled once per tick.
    pub fn add_event_source(&mut self, source: Box<dyn EventSource>) {
        self.dispatcher.add_source(source);
    }

    /// Queues a synthetic event for the next tick.
    pub fn inject_event(&mut self, event: Event) {
        self.dispatcher.add_event(event);
    }

    /// Registers a cursor event handler on a node.
    pub fn set_event_handler(
        &mut self,
        node: NodeId,
        event_type: EventType,
        mask: SourceMask,
        callback: impl FnMut(&mut SceneGraph, &CursorEvent) -> bool + 'static,
    ) {
        self.router
            .borrow_mut()
            .set_event_handler(node, event_type, mask, callback);
    }

    /// Removes all handlers for `event_type` on `node`.
    pub fn clear_event_handlers(&mut self, node: NodeId, event_type: EventType) {
        self.router.borrow_mut().clear_event_handlers(node, event_type);
    }

    /// Registers a keyboard handler. A handler that returns `true` consumes
    /// the event, including the Escape press that would otherwise stop the
    /// player.
    pub fn add_key_handler(
        &mut self,
        callback: impl FnMut(&mut SceneGraph, &KeyEvent) -> bool + 'static,
    ) {
        self.router.borrow_mut().add_key_handler(callback);
    }

    /// Directs all events for `cursor_id` to `node` until released.
    ///
    /// # Errors
    ///
    /// Fails if another live node already holds the capture.
    pub fn set_event_capture(
        &mut self,
        node: NodeId,
        cursor_id: CursorId,
    ) -> Result<(), CaptureError> {
        self.router
            .borrow_mut()
            .set_event_capture(&self.scene, node, cursor_id)
    }

    /// Releases the capture for `cursor_id`.
    ///
    /// # Errors
    ///
    /// Fails if the cursor has no live capture.
    pub fn release_event_capture(&mut self, cursor_id: CursorId) -> Result<(), CaptureError> {
        self.router
            .borrow_mut()
            .release_event_capture(&self.scene, cursor_id)
    }

    /// Opens a decoder session feeding a video node, starting playback now.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::SurfaceCreation`] if the node's surface could
    /// not be allocated.
    pub fn open_video(
        &mut self,
        node: NodeId,
        decoder: Box<dyn VideoDecoder>,
    ) -> Result<(), BackendError> {
        let now = self.clock.now();
        self.videos
            .attach(&mut self.scene, self.backend.as_mut(), node, decoder, now)
    }

    /// Closes the decoder session feeding `node`, keeping its last frame.
    pub fn close_video(&mut self, node: NodeId) {
        self.videos.detach(node);
    }

    /// Seeks the stream feeding `node` to a media time in nanoseconds.
    pub fn seek_video(&mut self, node: NodeId, media_time_nanos: u64) {
        let now = self.clock.now();
        self.videos.seek(node, media_time_nanos, now);
    }

    /// Whether the stream feeding `node` has played to its end.
    #[must_use]
    pub fn video_finished(&self, node: NodeId) -> bool {
        self.videos.is_finished(node)
    }

    /// Makes the next tick repaint the whole display.
    pub fn invalidate_all(&mut self) {
        self.pass.invalidate_all();
    }

    /// Asks the player to stop. The current tick still completes.
    pub fn stop(&mut self) {
        self.stopping.set(true);
    }

    /// Whether the player has been asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stopping.get()
    }

    /// Runs one tick: dispatch, evaluate, repaint, present.
    ///
    /// # Errors
    ///
    /// Propagates the first backend or decoder error; the tick is abandoned
    /// and the player is left running for the host to decide recovery.
    pub fn do_frame(&mut self, tracer: &mut Tracer<'_>) -> Result<FrameOutcome, BackendError> {
        let frame_index = self.pass.frame_index();
        let now = self.clock.now();
        self.pacer.begin_frame(now);
        tracer.frame_begin(&FrameBeginEvent { frame_index, now });

        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Dispatch,
            timestamp: self.clock.now(),
        });
        self.dispatcher.dispatch(&mut self.scene);
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Dispatch,
            timestamp: self.clock.now(),
        });

        let outcome = self.pass.render_frame(
            &mut self.scene,
            self.backend.as_mut(),
            &mut self.videos,
            self.clock.as_mut(),
            tracer,
        )?;

        let end = self.clock.now();
        let wait = self.pacer.frame_wait(end);
        tracer.frame_end(&FrameEndEvent {
            frame_index,
            now: end,
            presented: outcome.presented,
            dirty_rects: outcome.dirty_rects,
        });

        Ok(FrameOutcome {
            running: !self.stopping.get(),
            presented: outcome.presented,
            wait,
        })
    }

    /// [`do_frame`](Self::do_frame) without tracing.
    ///
    /// # Errors
    ///
    /// See [`do_frame`](Self::do_frame).
    pub fn tick(&mut self) -> Result<FrameOutcome, BackendError> {
        self.do_frame(&mut Tracer::none())
    }
}
