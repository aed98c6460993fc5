// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Rich events ([`on_damage_rects`](TraceSink::on_damage_rects)) store only
//! the count.

use moraine_core::time::HostTime;
use moraine_core::trace::{
    DamageRect, FrameBeginEvent, FrameEndEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_BEGIN: u8 = 1;
const TAG_PHASE_BEGIN: u8 = 2;
const TAG_PHASE_END: u8 = 3;
const TAG_FRAME_END: u8 = 4;
const TAG_DAMAGE_RECTS_COUNT: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Dispatch => 0,
            PhaseKind::Prepare => 1,
            PhaseKind::Collect => 2,
            PhaseKind::Draw => 3,
            PhaseKind::Present => 4,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_begin(&mut self, e: &FrameBeginEvent) {
        self.write_u8(TAG_FRAME_BEGIN);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_frame_end(&mut self, e: &FrameEndEvent) {
        self.write_u8(TAG_FRAME_END);
        self.write_u64(e.frame_index);
        self.write_u64(e.now.ticks());
        self.write_u8(u8::from(e.presented));
        #[expect(
            clippy::cast_possible_truncation,
            reason = "dirty rect count capped at u32::MAX for recording"
        )]
        self.write_u32(e.dirty_rects.min(u32::MAX as usize) as u32);
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.write_u8(TAG_DAMAGE_RECTS_COUNT);
        self.write_u64(frame_index);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "damage rect count capped at u32::MAX for recording"
        )]
        self.write_u32(rects.len().min(u32::MAX as usize) as u32);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameBeginEvent`].
    FrameBegin(FrameBeginEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`FrameEndEvent`].
    FrameEnd(FrameEndEvent),
    /// Damage-rect count for a frame.
    DamageRectsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of damage rects.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Dispatch,
            1 => PhaseKind::Prepare,
            2 => PhaseKind::Collect,
            3 => PhaseKind::Draw,
            _ => PhaseKind::Present,
        })
    }

    fn decode_frame_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameBegin(FrameBeginEvent {
            frame_index: self.read_u64()?,
            now: HostTime(self.read_u64()?),
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_frame_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameEnd(FrameEndEvent {
            frame_index: self.read_u64()?,
            now: HostTime(self.read_u64()?),
            presented: self.read_u8()? != 0,
            dirty_rects: self.read_u32()? as usize,
        }))
    }

    fn decode_damage_rects_count(&mut self) -> Option<RecordedEvent> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some(RecordedEvent::DamageRectsCount { frame_index, count })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_BEGIN => self.decode_frame_begin(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_FRAME_END => self.decode_frame_end(),
            TAG_DAMAGE_RECTS_COUNT => self.decode_damage_rects_count(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_frame_events() {
        let mut rec = RecorderSink::new();
        rec.on_frame_begin(&FrameBeginEvent {
            frame_index: 7,
            now: HostTime(1_000_000),
        });
        rec.on_frame_end(&FrameEndEvent {
            frame_index: 7,
            now: HostTime(1_004_000),
            presented: true,
            dirty_rects: 3,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::FrameBegin(e) => {
                assert_eq!(e.frame_index, 7);
                assert_eq!(e.now, HostTime(1_000_000));
            }
            other => panic!("expected FrameBegin, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::FrameEnd(e) => {
                assert_eq!(e.frame_index, 7);
                assert!(e.presented);
                assert_eq!(e.dirty_rects, 3);
            }
            other => panic!("expected FrameEnd, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_phase_events() {
        let mut rec = RecorderSink::new();
        let begin = PhaseBeginEvent {
            frame_index: 5,
            phase: PhaseKind::Draw,
            timestamp: HostTime(2000),
        };
        let end = PhaseEndEvent {
            frame_index: 5,
            phase: PhaseKind::Draw,
            timestamp: HostTime(3000),
        };
        rec.on_phase_begin(&begin);
        rec.on_phase_end(&end);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::PhaseBegin(e) => {
                assert_eq!(e.frame_index, 5);
                assert_eq!(e.phase, PhaseKind::Draw);
                assert_eq!(e.timestamp, HostTime(2000));
            }
            other => panic!("expected PhaseBegin, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::PhaseEnd(e) => {
                assert_eq!(e.phase, PhaseKind::Draw);
                assert_eq!(e.timestamp, HostTime(3000));
            }
            other => panic!("expected PhaseEnd, got {other:?}"),
        }
    }

    #[test]
    fn damage_rects_store_only_the_count() {
        let mut rec = RecorderSink::new();
        let rects = vec![
            DamageRect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            DamageRect {
                x: 50.0,
                y: 50.0,
                width: 5.0,
                height: 5.0,
            },
        ];
        rec.on_damage_rects(42, &rects);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::DamageRectsCount { frame_index, count } => {
                assert_eq!(*frame_index, 42);
                assert_eq!(*count, 2);
            }
            other => panic!("expected DamageRectsCount, got {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn truncated_record_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_frame_begin(&FrameBeginEvent {
            frame_index: 1,
            now: HostTime(10),
        });
        let bytes = rec.into_bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert!(events.is_empty());
    }
}
