// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame compositing pass.

use kurbo::Rect;
use moraine_core::backend::{BlendMode, DisplayBackend};
use moraine_core::error::BackendError;
use moraine_core::geom;
use moraine_core::scene::{INVALID, SceneGraph};
use moraine_core::time::Clock;
use moraine_core::trace::{PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

use crate::video::VideoRegistry;

/// Nodes at or below this effective opacity draw nothing.
const MIN_VISIBLE_OPACITY: f64 = 0.01;

/// What a completed frame did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Whether anything reached the screen.
    pub presented: bool,
    /// Number of dirty rectangles repainted.
    pub dirty_rects: usize,
}

/// Drives one frame of evaluation, repaint, and presentation.
///
/// The pass is damage-driven: only the screen rectangles the scene reported
/// dirty are repainted, back-to-front, with each rect scissored through the
/// backend's clip stack. The first frame after construction (or after
/// [`invalidate_all`](Self::invalidate_all)) repaints the whole display.
///
/// A backend error abandons the frame. The damage consumed by the failed
/// frame is not requeued; callers that recover the backend should call
/// [`invalidate_all`](Self::invalidate_all).
#[derive(Debug)]
pub struct RenderPass {
    frame_index: u64,
    force_full: bool,
}

impl Default for RenderPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass {
    /// Creates a pass whose first frame repaints everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            force_full: true,
        }
    }

    /// Index of the next frame to render.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Makes the next frame repaint the whole display.
    pub fn invalidate_all(&mut self) {
        self.force_full = true;
    }

    /// Renders one frame.
    ///
    /// Phases, in order: advance video sessions and evaluate the scene,
    /// collect the dirty region, repaint each dirty rect, present. A frame
    /// whose dirty region is empty skips the last two phases and presents
    /// nothing.
    ///
    /// # Errors
    ///
    /// Propagates the first backend or decoder error; the frame is
    /// abandoned.
    pub fn render_frame(
        &mut self,
        scene: &mut SceneGraph,
        backend: &mut dyn DisplayBackend,
        videos: &mut VideoRegistry,
        clock: &mut dyn Clock,
        tracer: &mut Tracer<'_>,
    ) -> Result<RenderOutcome, BackendError> {
        let frame = self.frame_index;
        self.frame_index += 1;

        phase_begin(tracer, clock, frame, PhaseKind::Prepare);
        videos.advance(scene, backend, clock.now())?;
        scene.evaluate();
        phase_end(tracer, clock, frame, PhaseKind::Prepare);

        phase_begin(tracer, clock, frame, PhaseKind::Collect);
        let force_full = core::mem::take(&mut self.force_full);
        let region = scene.collect_dirty_region(force_full);
        phase_end(tracer, clock, frame, PhaseKind::Collect);

        #[cfg(feature = "trace-rich")]
        {
            use moraine_core::trace::DamageRect;
            let rects: alloc::vec::Vec<DamageRect> = region
                .rects()
                .iter()
                .map(|r| DamageRect {
                    x: r.x0,
                    y: r.y0,
                    width: r.width(),
                    height: r.height(),
                })
                .collect();
            tracer.damage_rects(frame, &rects);
        }

        if region.is_empty() {
            return Ok(RenderOutcome {
                presented: false,
                dirty_rects: 0,
            });
        }

        phase_begin(tracer, clock, frame, PhaseKind::Draw);
        for rect in region.rects() {
            draw_rect(scene, backend, *rect)?;
        }
        phase_end(tracer, clock, frame, PhaseKind::Draw);

        phase_begin(tracer, clock, frame, PhaseKind::Present);
        backend.present(&region)?;
        phase_end(tracer, clock, frame, PhaseKind::Present);

        Ok(RenderOutcome {
            presented: true,
            dirty_rects: region.len(),
        })
    }
}

fn phase_begin(tracer: &mut Tracer<'_>, clock: &mut dyn Clock, frame_index: u64, phase: PhaseKind) {
    tracer.phase_begin(&PhaseBeginEvent {
        frame_index,
        phase,
        timestamp: clock.now(),
    });
}

fn phase_end(tracer: &mut Tracer<'_>, clock: &mut dyn Clock, frame_index: u64, phase: PhaseKind) {
    tracer.phase_end(&PhaseEndEvent {
        frame_index,
        phase,
        timestamp: clock.now(),
    });
}

/// Repaints one dirty rectangle: scissor, background, then the tree.
fn draw_rect(
    scene: &SceneGraph,
    backend: &mut dyn DisplayBackend,
    rect: Rect,
) -> Result<(), BackendError> {
    let live = backend.push_clip_rect(rect, false)?;
    if live {
        backend.clear(rect);
        draw_node(scene, backend, scene.root().index(), &rect)?;
    }
    backend.pop_clip_rect();
    Ok(())
}

fn draw_node(
    scene: &SceneGraph,
    backend: &mut dyn DisplayBackend,
    idx: u32,
    rect: &Rect,
) -> Result<(), BackendError> {
    let kind = scene.kind_at(idx);
    if kind.is_container() {
        if scene.crop_at(idx) {
            let live = backend.push_clip_rect(scene.abs_viewport_at(idx), true)?;
            let result = if live {
                draw_children(scene, backend, idx, rect)
            } else {
                Ok(())
            };
            backend.pop_clip_rect();
            result
        } else {
            draw_children(scene, backend, idx, rect)
        }
    } else {
        if let Some(surface) = kind.surface() {
            backend.blit(
                surface,
                scene.abs_viewport_at(idx),
                scene.effective_opacity_at(idx),
                scene.angle_at(idx),
                scene.pivot_abs_at(idx),
                BlendMode::SourceOver,
            );
        }
        Ok(())
    }
}

/// Draws a container's children in ascending z order.
fn draw_children(
    scene: &SceneGraph,
    backend: &mut dyn DisplayBackend,
    parent: u32,
    rect: &Rect,
) -> Result<(), BackendError> {
    let mut child = scene.first_child_at(parent);
    while child != INVALID {
        if should_draw(scene, child, rect) {
            draw_node(scene, backend, child, rect)?;
        }
        child = scene.next_sibling_at(child);
    }
    Ok(())
}

/// Whether the node at `idx` can contribute pixels inside `rect`.
fn should_draw(scene: &SceneGraph, idx: u32, rect: &Rect) -> bool {
    if !scene.effective_active_at(idx) || scene.effective_opacity_at(idx) <= MIN_VISIBLE_OPACITY {
        return false;
    }
    // A container without crop may paint children outside its own viewport,
    // so only bounded nodes are culled against the dirty rect.
    let bounded = !scene.kind_at(idx).is_container() || scene.crop_at(idx);
    let area = if bounded {
        let bounds = geom::rotated_bounds(
            &scene.abs_viewport_at(idx),
            scene.angle_at(idx),
            scene.pivot_abs_at(idx),
        );
        match geom::intersection(&bounds, rect) {
            Some(area) => area,
            None => return false,
        }
    } else {
        *rect
    };
    // Skip content fully covered by an opaque sibling above it.
    let below_z = scene.z_at(idx);
    let mut sib = scene.next_sibling_at(idx);
    while sib != INVALID {
        if scene.obscures_at(sib, &area, below_z) {
            return false;
        }
        sib = scene.next_sibling_at(sib);
    }
    true
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec;

    use moraine_core::backend::{DecodeOutcome, SurfaceHandle};
    use moraine_core::scene::{NodeId, NodeKind};
    use moraine_core::time::Timebase;
    use moraine_harness::{BackendOp, FakeClock, RecordingBackend, ScriptedDecoder};

    use super::*;

    fn image(scene: &mut SceneGraph, surface: u64, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let node = scene.create_node(NodeKind::Image {
            surface: Some(SurfaceHandle(surface)),
            opaque: false,
        });
        scene.set_viewport(node, Some(x), Some(y), Some(w), Some(h));
        scene.append_child(scene.root(), node).unwrap();
        node
    }

    fn render(
        pass: &mut RenderPass,
        scene: &mut SceneGraph,
        backend: &mut RecordingBackend,
        videos: &mut VideoRegistry,
    ) -> RenderOutcome {
        let mut clock = FakeClock::new();
        pass.render_frame(scene, backend, videos, &mut clock, &mut Tracer::none())
            .unwrap()
    }

    #[test]
    fn first_frame_paints_the_whole_display() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        image(&mut scene, 1, 10.0, 10.0, 50.0, 50.0);
        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();

        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(outcome.presented);
        assert_eq!(outcome.dirty_rects, 1);
        let ops = backend.ops();
        assert_eq!(
            ops[0],
            BackendOp::PushClip {
                rect: Rect::new(0.0, 0.0, 200.0, 100.0),
                crop: false,
            }
        );
        assert_eq!(ops[1], BackendOp::Clear(Rect::new(0.0, 0.0, 200.0, 100.0)));
        assert!(matches!(
            ops[2],
            BackendOp::Blit {
                surface: SurfaceHandle(1),
                ..
            }
        ));
        assert_eq!(ops[3], BackendOp::PopClip);
        assert_eq!(ops[4], BackendOp::Present { rects: 1 });
        assert_eq!(backend.clip_depth(), 0);
    }

    #[test]
    fn idle_frames_present_nothing() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        image(&mut scene, 1, 10.0, 10.0, 50.0, 50.0);
        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();

        render(&mut pass, &mut scene, &mut backend, &mut videos);
        backend.take_ops();
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(!outcome.presented);
        assert!(backend.ops().is_empty());
    }

    #[test]
    fn moving_a_node_repaints_old_and_new_areas() {
        let mut scene = SceneGraph::new(400.0, 400.0);
        let node = image(&mut scene, 1, 10.0, 10.0, 50.0, 50.0);
        let mut backend = RecordingBackend::new(400.0, 400.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();
        render(&mut pass, &mut scene, &mut backend, &mut videos);
        backend.take_ops();

        scene.set_viewport(node, Some(300.0), Some(300.0), None, None);
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(outcome.presented);
        assert_eq!(outcome.dirty_rects, 2, "old and new areas are disjoint");
        let clears: alloc::vec::Vec<Rect> = backend
            .ops()
            .iter()
            .filter_map(|op| match op {
                BackendOp::Clear(r) => Some(*r),
                _ => None,
            })
            .collect();
        assert!(clears.contains(&Rect::new(10.0, 10.0, 60.0, 60.0)));
        assert!(clears.contains(&Rect::new(300.0, 300.0, 350.0, 350.0)));
        // Only the new position is blitted.
        assert_eq!(backend.blits(), vec![SurfaceHandle(1)]);
    }

    #[test]
    fn nearly_transparent_nodes_are_skipped() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        let node = image(&mut scene, 1, 10.0, 10.0, 50.0, 50.0);
        scene.set_opacity(node, 0.005);
        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();

        render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(backend.blits().is_empty());
    }

    #[test]
    fn opaque_cover_skips_content_below() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        let below = image(&mut scene, 1, 20.0, 20.0, 40.0, 40.0);
        let cover = scene.create_node(NodeKind::Image {
            surface: Some(SurfaceHandle(2)),
            opaque: true,
        });
        scene.set_viewport(cover, Some(10.0), Some(10.0), Some(60.0), Some(60.0));
        scene.set_z(cover, 1);
        scene.append_child(scene.root(), cover).unwrap();
        _ = below;

        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();
        render(&mut pass, &mut scene, &mut backend, &mut videos);
        // The cover fully contains the lower image, so only the cover blits.
        assert_eq!(backend.blits(), vec![SurfaceHandle(2)]);
    }

    #[test]
    fn translucent_cover_does_not_skip_content_below() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        image(&mut scene, 1, 20.0, 20.0, 40.0, 40.0);
        let cover = scene.create_node(NodeKind::Image {
            surface: Some(SurfaceHandle(2)),
            opaque: true,
        });
        scene.set_viewport(cover, Some(10.0), Some(10.0), Some(60.0), Some(60.0));
        scene.set_z(cover, 1);
        scene.set_opacity(cover, 0.5);
        scene.append_child(scene.root(), cover).unwrap();

        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();
        render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert_eq!(backend.blits(), vec![SurfaceHandle(1), SurfaceHandle(2)]);
    }

    #[test]
    fn cropping_containers_push_a_clip() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        let group = scene.create_node(NodeKind::Group);
        scene.set_viewport(group, Some(10.0), Some(10.0), Some(50.0), Some(50.0));
        scene.set_crop(group, true);
        scene.append_child(scene.root(), group).unwrap();
        let child = scene.create_node(NodeKind::Image {
            surface: Some(SurfaceHandle(1)),
            opaque: false,
        });
        scene.set_viewport(child, Some(0.0), Some(0.0), Some(100.0), Some(100.0));
        scene.append_child(group, child).unwrap();

        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();
        render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(backend.ops().contains(&BackendOp::PushClip {
            rect: Rect::new(10.0, 10.0, 60.0, 60.0),
            crop: true,
        }));
        assert_eq!(backend.clip_depth(), 0);
    }

    #[test]
    fn present_failure_abandons_the_frame() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        image(&mut scene, 1, 10.0, 10.0, 50.0, 50.0);
        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();
        let mut clock = FakeClock::new();

        backend.fail_next_present();
        let err = pass
            .render_frame(
                &mut scene,
                &mut backend,
                &mut videos,
                &mut clock,
                &mut Tracer::none(),
            )
            .unwrap_err();
        assert!(matches!(err, BackendError::Fatal(_)));

        // The consumed damage is gone; the next frame is idle.
        backend.take_ops();
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(!outcome.presented);

        // Recovery is explicit.
        pass.invalidate_all();
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(outcome.presented);
    }

    #[test]
    fn video_frames_invalidate_their_node() {
        let mut scene = SceneGraph::new(200.0, 100.0);
        let node = scene.create_node(NodeKind::Video { surface: None });
        scene.set_viewport(node, Some(10.0), Some(10.0), Some(80.0), Some(60.0));
        scene.append_child(scene.root(), node).unwrap();

        let mut backend = RecordingBackend::new(200.0, 100.0);
        let mut videos = VideoRegistry::new(Timebase::NANOS);
        let mut pass = RenderPass::new();

        let decoder = ScriptedDecoder::new(
            25.0,
            vec![
                DecodeOutcome::Frame,
                DecodeOutcome::NoFrameYet,
                DecodeOutcome::Frame,
                DecodeOutcome::EndOfStream,
            ],
        );
        videos
            .attach(
                &mut scene,
                &mut backend,
                node,
                Box::new(decoder),
                moraine_core::time::HostTime(0),
            )
            .unwrap();
        let surface = scene.kind(node).surface().unwrap();

        // First frame paints everything, including the first video frame.
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(outcome.presented);
        assert!(backend.ops().contains(&BackendOp::SurfaceChanged(surface)));

        // NoFrameYet leaves the screen untouched.
        backend.take_ops();
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(!outcome.presented);

        // A new media frame repaints exactly the video's area.
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(outcome.presented);
        assert_eq!(outcome.dirty_rects, 1);

        // End of stream holds the last frame and goes idle.
        backend.take_ops();
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(!outcome.presented);
        assert!(videos.is_finished(node));
        let outcome = render(&mut pass, &mut scene, &mut backend, &mut videos);
        assert!(!outcome.presented);
    }
}
