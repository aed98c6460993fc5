// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use kurbo::{Point, Rect};
use moraine_core::backend::{BlendMode, DisplayBackend, SurfaceHandle};
use moraine_core::error::BackendError;
use moraine_core::region::Region;

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq)]
pub enum BackendOp {
    /// A surface was allocated.
    CreateSurface {
        /// The handle that was minted.
        surface: SurfaceHandle,
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// A surface was marked changed.
    SurfaceChanged(SurfaceHandle),
    /// A clip rectangle was pushed.
    PushClip {
        /// The clip rectangle.
        rect: Rect,
        /// Whether this was a node crop rather than a dirty-rect scissor.
        crop: bool,
    },
    /// The most recent clip was popped.
    PopClip,
    /// A rectangle was cleared to the background color.
    Clear(Rect),
    /// A surface was drawn.
    Blit {
        /// Source surface.
        surface: SurfaceHandle,
        /// Destination rectangle in screen coordinates.
        dest: Rect,
        /// Effective opacity of the draw.
        opacity: f64,
        /// Rotation in radians.
        angle: f64,
        /// Blend mode of the draw.
        blend: BlendMode,
    },
    /// The frame was presented.
    Present {
        /// Number of rectangles in the presented region.
        rects: usize,
    },
}

/// A [`DisplayBackend`] that records every call instead of drawing.
///
/// Failure injection: [`fail_next_present`](Self::fail_next_present) and
/// [`fail_surface_creation`](Self::fail_surface_creation) make the next
/// matching call return an error, then reset.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    size: (f64, f64),
    ops: Vec<BackendOp>,
    next_surface: u64,
    clip_depth: usize,
    fail_present: bool,
    fail_surface: bool,
}

impl RecordingBackend {
    /// Creates a backend reporting the given output size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }

    /// The recorded calls so far.
    #[must_use]
    pub fn ops(&self) -> &[BackendOp] {
        &self.ops
    }

    /// Takes and clears the recorded calls.
    pub fn take_ops(&mut self) -> Vec<BackendOp> {
        core::mem::take(&mut self.ops)
    }

    /// Makes the next `present` call fail with [`BackendError::Fatal`].
    pub fn fail_next_present(&mut self) {
        self.fail_present = true;
    }

    /// Makes the next `create_surface` call fail.
    pub fn fail_surface_creation(&mut self) {
        self.fail_surface = true;
    }

    /// Current clip stack depth. Zero between frames if pushes and pops
    /// were balanced.
    #[must_use]
    pub fn clip_depth(&self) -> usize {
        self.clip_depth
    }

    /// The blits recorded so far, in draw order.
    #[must_use]
    pub fn blits(&self) -> Vec<SurfaceHandle> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                BackendOp::Blit { surface, .. } => Some(*surface),
                _ => None,
            })
            .collect()
    }

    /// Whether any recorded call presented something.
    #[must_use]
    pub fn presented(&self) -> bool {
        self.ops
            .iter()
            .any(|op| matches!(op, BackendOp::Present { .. }))
    }
}

impl DisplayBackend for RecordingBackend {
    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle, BackendError> {
        if self.fail_surface {
            self.fail_surface = false;
            return Err(BackendError::SurfaceCreation);
        }
        let surface = SurfaceHandle(self.next_surface);
        self.next_surface += 1;
        self.ops.push(BackendOp::CreateSurface {
            surface,
            width,
            height,
        });
        Ok(surface)
    }

    fn surface_changed(&mut self, surface: SurfaceHandle) {
        self.ops.push(BackendOp::SurfaceChanged(surface));
    }

    fn push_clip_rect(&mut self, rect: Rect, crop: bool) -> Result<bool, BackendError> {
        self.clip_depth += 1;
        self.ops.push(BackendOp::PushClip { rect, crop });
        Ok(rect.width() > 0.0 && rect.height() > 0.0)
    }

    fn pop_clip_rect(&mut self) {
        assert!(self.clip_depth > 0, "pop without matching push");
        self.clip_depth -= 1;
        self.ops.push(BackendOp::PopClip);
    }

    fn clear(&mut self, rect: Rect) {
        self.ops.push(BackendOp::Clear(rect));
    }

    fn blit(
        &mut self,
        surface: SurfaceHandle,
        dest: Rect,
        opacity: f64,
        angle: f64,
        pivot: Point,
        blend: BlendMode,
    ) {
        _ = pivot;
        self.ops.push(BackendOp::Blit {
            surface,
            dest,
            opacity,
            angle,
            blend,
        });
    }

    fn present(&mut self, region: &Region) -> Result<(), BackendError> {
        if self.fail_present {
            self.fail_present = false;
            return Err(BackendError::Fatal(String::from("injected present failure")));
        }
        self.ops.push(BackendOp::Present {
            rects: region.len(),
        });
        Ok(())
    }
}

/// A clone-able handle over one shared [`RecordingBackend`].
///
/// Lets a test box one clone into a player and keep another for assertions.
#[derive(Clone, Debug, Default)]
pub struct SharedBackend(Rc<RefCell<RecordingBackend>>);

impl SharedBackend {
    /// Creates a shared backend reporting the given output size.
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self(Rc::new(RefCell::new(RecordingBackend::new(width, height))))
    }

    /// A copy of the recorded calls so far.
    #[must_use]
    pub fn ops(&self) -> Vec<BackendOp> {
        self.0.borrow().ops().to_vec()
    }

    /// Takes and clears the recorded calls.
    pub fn take_ops(&self) -> Vec<BackendOp> {
        self.0.borrow_mut().take_ops()
    }

    /// The blits recorded so far, in draw order.
    #[must_use]
    pub fn blits(&self) -> Vec<SurfaceHandle> {
        self.0.borrow().blits()
    }

    /// Whether any recorded call presented something.
    #[must_use]
    pub fn presented(&self) -> bool {
        self.0.borrow().presented()
    }

    /// Makes the next `present` call fail.
    pub fn fail_next_present(&self) {
        self.0.borrow_mut().fail_next_present();
    }

    /// Current clip stack depth.
    #[must_use]
    pub fn clip_depth(&self) -> usize {
        self.0.borrow().clip_depth()
    }
}

impl DisplayBackend for SharedBackend {
    fn size(&self) -> (f64, f64) {
        self.0.borrow().size()
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<SurfaceHandle, BackendError> {
        self.0.borrow_mut().create_surface(width, height)
    }

    fn surface_changed(&mut self, surface: SurfaceHandle) {
        self.0.borrow_mut().surface_changed(surface);
    }

    fn push_clip_rect(&mut self, rect: Rect, crop: bool) -> Result<bool, BackendError> {
        self.0.borrow_mut().push_clip_rect(rect, crop)
    }

    fn pop_clip_rect(&mut self) {
        self.0.borrow_mut().pop_clip_rect();
    }

    fn clear(&mut self, rect: Rect) {
        self.0.borrow_mut().clear(rect);
    }

    fn blit(
        &mut self,
        surface: SurfaceHandle,
        dest: Rect,
        opacity: f64,
        angle: f64,
        pivot: Point,
        blend: BlendMode,
    ) {
        self.0
            .borrow_mut()
            .blit(surface, dest, opacity, angle, pivot, blend);
    }

    fn present(&mut self, region: &Region) -> Result<(), BackendError> {
        self.0.borrow_mut().present(region)
    }
}
