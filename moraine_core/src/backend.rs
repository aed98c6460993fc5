// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for platform integrations.
//!
//! Moraine splits platform-specific work into *backend* crates. Each backend
//! provides:
//!
//! - **Display** — Implements [`DisplayBackend`] over a native drawing API
//!   (a framebuffer, a windowing system surface). The draw pass calls it once
//!   per dirty rectangle per frame.
//!
//! - **Decoding** — Implements [`VideoDecoder`] per open media stream. The
//!   render pass polls each decoder once per frame and uploads new frames to
//!   the node's surface.
//!
//! - **Time** — A [`Clock`](crate::time::Clock) over the platform's
//!   monotonic counter, plus a `timebase()` free function.
//!
//! - **Input** — An event source feeding the dispatcher (see
//!   `moraine_input`); the mechanism is platform-specific and not abstracted
//!   here.
//!
//! # Crate boundaries
//!
//! `moraine_core` owns the scene model and this contract module. Backend
//! crates depend on it and provide platform glue; `moraine_player` wires the
//! pieces into a frame loop.

use kurbo::Rect;

use crate::error::BackendError;
use crate::region::Region;

/// Opaque handle to a backend-owned pixel surface.
///
/// Handles are minted by [`DisplayBackend::create_surface`] and stay valid
/// until the backend is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceHandle(pub u64);

/// How a blit combines source pixels with the destination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlendMode {
    /// Standard alpha compositing.
    #[default]
    SourceOver,
    /// Multiply source and destination.
    Multiply,
    /// Inverse multiply.
    Screen,
}

/// Result of asking a decoder for the frame due at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A new frame was written to the surface.
    Frame,
    /// The current frame is still the one due; nothing was written.
    NoFrameYet,
    /// The stream is exhausted. The last frame stays on the surface.
    EndOfStream,
}

/// The drawing surface the compositor renders into.
///
/// All coordinates are in screen space. Calls arrive in a fixed per-frame
/// shape: for each dirty rect, one `push_clip_rect`, a `clear`, any number of
/// nested clip pushes and `blit`s in paint order, matching pops, then a
/// single `present` with the frame's whole dirty region.
pub trait DisplayBackend {
    /// Width and height of the output in pixels.
    fn size(&self) -> (f64, f64);

    /// Allocates a pixel surface of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::SurfaceCreation`] if the backend is out of
    /// surface memory.
    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle, BackendError>;

    /// Notifies the backend that a surface's pixels were rewritten outside
    /// its control (decoder upload, text re-raster).
    fn surface_changed(&mut self, surface: SurfaceHandle);

    /// Pushes a clip rectangle, intersecting it with the current clip.
    ///
    /// Returns `false` if the resulting clip is empty, in which case the
    /// caller skips the subtree and must still pop. `crop` distinguishes a
    /// node's own crop from the per-rect scissor for backends that care.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Fatal`] if the backend lost its output; the
    /// frame is abandoned.
    fn push_clip_rect(&mut self, rect: Rect, crop: bool) -> Result<bool, BackendError>;

    /// Pops the most recent clip rectangle.
    fn pop_clip_rect(&mut self);

    /// Fills a rectangle with the background color.
    fn clear(&mut self, rect: Rect);

    /// Draws a surface into `dest` with the given opacity, rotation about
    /// `pivot` (in radians, screen coordinates), and blend mode.
    fn blit(
        &mut self,
        surface: SurfaceHandle,
        dest: Rect,
        opacity: f64,
        angle: f64,
        pivot: kurbo::Point,
        blend: BlendMode,
    );

    /// Flips the repainted region to the screen.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Fatal`] if presentation failed; the frame is
    /// abandoned and the region is not retried.
    fn present(&mut self, region: &Region) -> Result<(), BackendError>;
}

/// A decoder feeding one media stream to one surface.
pub trait VideoDecoder {
    /// Writes the frame due at `media_time_nanos` to `surface`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Fatal`] if the stream is corrupt beyond
    /// recovery.
    fn render_to_surface(
        &mut self,
        surface: SurfaceHandle,
        media_time_nanos: u64,
    ) -> Result<DecodeOutcome, BackendError>;

    /// Native framerate of the stream, in frames per second.
    fn fps(&self) -> f64;

    /// Repositions the stream to `media_time_nanos`.
    fn seek(&mut self, media_time_nanos: u64);

    /// Releases decoder resources. Called once before the session is dropped.
    fn close(&mut self);
}
