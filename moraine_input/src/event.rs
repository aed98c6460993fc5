// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event types flowing through the dispatcher.

use core::ops::BitOr;

use kurbo::Point;
use moraine_core::scene::NodeId;
use moraine_core::time::HostTime;

/// Identifies one cursor among possibly many concurrent ones.
///
/// Touch and tracker contacts get non-negative ids from their source. The
/// mouse is the single persistent cursor and always uses [`MOUSE_CURSOR_ID`].
pub type CursorId = i32;

/// The cursor id of the mouse pointer.
pub const MOUSE_CURSOR_ID: CursorId = -1;

/// What kind of device produced a cursor event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// A mouse pointer.
    Mouse,
    /// A touch contact on a touch surface.
    Touch,
    /// A tracked object (marker, fiducial) on a tracking surface.
    Track,
}

impl Source {
    /// Whether a cursor from this source keeps existing after its button or
    /// contact is released.
    ///
    /// The mouse pointer persists between clicks. A touch or tracked contact
    /// ceases to exist on up, so its up event is also its last.
    #[must_use]
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Mouse)
    }

    const fn bit(self) -> u8 {
        match self {
            Self::Mouse => 1,
            Self::Touch => 2,
            Self::Track => 4,
        }
    }
}

/// A set of [`Source`]s, used to filter which devices a handler listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceMask(u8);

impl SourceMask {
    /// The empty set.
    pub const NONE: Self = Self(0);
    /// Mouse events only.
    pub const MOUSE: Self = Self(Source::Mouse.bit());
    /// Touch events only.
    pub const TOUCH: Self = Self(Source::Touch.bit());
    /// Tracker events only.
    pub const TRACK: Self = Self(Source::Track.bit());
    /// All sources.
    pub const ALL: Self = Self(
        Source::Mouse.bit() | Source::Touch.bit() | Source::Track.bit(),
    );

    /// Whether `source` is in this set.
    #[must_use]
    pub const fn contains(self, source: Source) -> bool {
        self.0 & source.bit() != 0
    }
}

impl BitOr for SourceMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The kind of an event, used both for tagging and for handler registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventType {
    /// A cursor moved without changing button state.
    CursorMotion,
    /// A button or contact went down.
    CursorDown,
    /// A button or contact was released.
    CursorUp,
    /// A cursor entered a node's hit chain. Synthesized by the router.
    CursorOver,
    /// A cursor left a node's hit chain. Synthesized by the router.
    CursorOut,
    /// A key was pressed.
    KeyDown,
    /// A key was released.
    KeyUp,
    /// The host asked the player to shut down.
    Quit,
}

/// A positional event from a mouse, touch, or tracker source.
#[derive(Clone, Debug, PartialEq)]
pub struct CursorEvent {
    /// What happened.
    pub event_type: EventType,
    /// Which cursor this event belongs to.
    pub cursor_id: CursorId,
    /// Position in screen coordinates.
    pub pos: Point,
    /// The producing device kind.
    pub source: Source,
    /// Host timestamp of the event.
    pub when: HostTime,
    /// The node this delivery is addressed to. `None` until the router tags
    /// a clone per delivery target.
    pub node: Option<NodeId>,
}

impl CursorEvent {
    /// A clone of this event addressed to `node`.
    #[must_use]
    pub fn for_node(&self, node: NodeId) -> Self {
        let mut e = self.clone();
        e.node = Some(node);
        e
    }

    /// A clone of this event with a different type, addressed to `node`.
    ///
    /// Used for synthesized over/out transitions.
    #[must_use]
    pub fn retyped_for(&self, event_type: EventType, node: NodeId) -> Self {
        let mut e = self.for_node(node);
        e.event_type = event_type;
        e
    }
}

/// A keyboard event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// Either [`EventType::KeyDown`] or [`EventType::KeyUp`].
    pub event_type: EventType,
    /// Platform keycode.
    pub keycode: u32,
    /// Host timestamp of the event.
    pub when: HostTime,
}

/// Any event the dispatcher can queue.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A positional event.
    Cursor(CursorEvent),
    /// A keyboard event.
    Key(KeyEvent),
    /// A shutdown request from the host.
    Quit {
        /// Host timestamp of the request.
        when: HostTime,
    },
}

impl Event {
    /// The host timestamp this event arrived with.
    #[must_use]
    pub fn when(&self) -> HostTime {
        match self {
            Self::Cursor(e) => e.when,
            Self::Key(e) => e.when,
            Self::Quit { when } => *when,
        }
    }
}
