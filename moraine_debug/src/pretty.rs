// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output and scene dumps.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are converted to microseconds using a [`Timebase`].
//!
//! [`write_scene_tree`] dumps a scene graph as an indented tree, one node
//! per line, for interactive debugging.

use std::io::{self, Write};

use moraine_core::scene::{NodeId, NodeKind, SceneGraph};
use moraine_core::time::Timebase;
use moraine_core::trace::{
    DamageRect, FrameBeginEvent, FrameEndEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(io::stderr()),
            timebase,
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "trace timestamps are far below the f64 mantissa limit"
    )]
    fn ticks_to_us(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_nanos(ticks) as f64 / 1000.0
    }

    fn host_us(&self, t: moraine_core::time::HostTime) -> f64 {
        self.ticks_to_us(t.ticks())
    }
}

fn phase_name(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Dispatch => "dispatch",
        PhaseKind::Prepare => "prepare",
        PhaseKind::Collect => "collect",
        PhaseKind::Draw => "draw",
        PhaseKind::Present => "present",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[frame:begin] frame={} now={:.1}µs",
            e.frame_index,
            self.host_us(e.now),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            phase_name(e.phase),
            self.host_us(e.timestamp),
        );
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        let presented = if e.presented { "yes" } else { "no" };
        let _ = writeln!(
            self.writer,
            "[frame:end] frame={} now={:.1}µs presented={presented} rects={}",
            e.frame_index,
            self.host_us(e.now),
            e.dirty_rects,
        );
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        let _ = writeln!(
            self.writer,
            "[damage] frame={frame_index} rects={}",
            rects.len(),
        );
    }
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Group => "Group",
        NodeKind::Overlay => "Overlay",
        NodeKind::Image { .. } => "Image",
        NodeKind::Video { .. } => "Video",
        NodeKind::Words { .. } => "Words",
    }
}

/// Writes the scene as an indented tree, one node per line.
///
/// Each line shows the node's kind, handle, name, relative viewport, z key,
/// opacity, and flags, for example:
///
/// ```text
/// Group NodeId(0@gen0) rect=(0,0 640x480) z=0 opacity=1.00
///   Image NodeId(1@gen0) "hero" rect=(10,10 50x50) z=5 opacity=0.80 inactive
/// ```
///
/// # Errors
///
/// Propagates write failures from `writer`.
pub fn write_scene_tree(scene: &SceneGraph, writer: &mut dyn Write) -> io::Result<()> {
    write_subtree(scene, scene.root(), 0, writer)
}

fn write_subtree(
    scene: &SceneGraph,
    node: NodeId,
    depth: usize,
    writer: &mut dyn Write,
) -> io::Result<()> {
    let rect = scene.rel_viewport(node);
    let flags = scene.flags(node);
    write!(writer, "{:indent$}", "", indent = depth * 2)?;
    write!(writer, "{} {node:?}", kind_name(scene.kind(node)))?;
    if !scene.name(node).is_empty() {
        write!(writer, " {:?}", scene.name(node))?;
    }
    write!(
        writer,
        " rect=({},{} {}x{}) z={} opacity={:.2}",
        rect.x0,
        rect.y0,
        rect.width(),
        rect.height(),
        scene.z(node),
        scene.opacity(node),
    )?;
    if !flags.active {
        write!(writer, " inactive")?;
    }
    if !flags.sensitive {
        write!(writer, " insensitive")?;
    }
    writeln!(writer)?;
    for child in scene.children(node) {
        write_subtree(scene, child, depth + 1, writer)?;
    }
    Ok(())
}
