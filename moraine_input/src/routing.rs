// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cursor-to-scene routing with capture and over/out synthesis.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use moraine_core::scene::{NodeId, SceneGraph};

use crate::event::{CursorEvent, CursorId, EventType, KeyEvent, SourceMask};

/// A cursor event handler.
///
/// Gets the scene (mutably, so handlers can edit the tree mid-delivery) and a
/// clone of the event tagged with the node it was delivered to. Returning
/// `true` stops the event from bubbling further.
pub type HandlerFn = dyn FnMut(&mut SceneGraph, &CursorEvent) -> bool;

/// A keyboard event handler. Returning `true` consumes the key event.
pub type KeyHandlerFn = dyn FnMut(&mut SceneGraph, &KeyEvent) -> bool;

/// Why a capture request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureError {
    /// The cursor is already captured by a live node.
    AlreadyCaptured {
        /// The cursor whose capture was requested.
        cursor_id: CursorId,
    },
    /// The cursor has no live capture to release.
    NotCaptured {
        /// The cursor whose release was requested.
        cursor_id: CursorId,
    },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyCaptured { cursor_id } => {
                write!(f, "cursor {cursor_id} is already captured")
            }
            Self::NotCaptured { cursor_id } => {
                write!(f, "cursor {cursor_id} is not captured")
            }
        }
    }
}

impl core::error::Error for CaptureError {}

struct HandlerEntry {
    mask: SourceMask,
    callback: Rc<RefCell<HandlerFn>>,
}

/// Which nodes a cursor was last over, innermost first.
#[derive(Default)]
struct CursorState {
    over_chain: Vec<NodeId>,
}

/// Routes cursor events into a scene graph.
///
/// Per event the router hit-tests the scene, synthesizes
/// [`EventType::CursorOver`] and [`EventType::CursorOut`] transitions against
/// the chain the cursor was over last time, then bubbles the event itself
/// from the innermost hit node to the root until a handler returns `true`.
///
/// A capture redirects everything for one cursor to the capturing node and
/// its ancestors, and narrows over/out synthesis to the capturing node alone.
/// Captures whose node has been destroyed expire silently.
pub struct CursorRouter {
    handlers: BTreeMap<(NodeId, EventType), Vec<HandlerEntry>>,
    key_handlers: Vec<Rc<RefCell<KeyHandlerFn>>>,
    cursor_states: BTreeMap<CursorId, CursorState>,
    captures: BTreeMap<CursorId, NodeId>,
}

impl fmt::Debug for CursorRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorRouter")
            .field("handlers", &self.handlers.len())
            .field("key_handlers", &self.key_handlers.len())
            .field("cursors", &self.cursor_states.len())
            .field("captures", &self.captures)
            .finish()
    }
}

impl Default for CursorRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorRouter {
    /// Creates a router with no handlers and no cursor state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
            key_handlers: Vec::new(),
            cursor_states: BTreeMap::new(),
            captures: BTreeMap::new(),
        }
    }

    /// Registers a handler for `event_type` on `node`.
    ///
    /// Only events whose source is in `mask` reach the handler. Multiple
    /// handlers on the same node and type run in registration order.
    pub fn set_event_handler(
        &mut self,
        node: NodeId,
        event_type: EventType,
        mask: SourceMask,
        callback: impl FnMut(&mut SceneGraph, &CursorEvent) -> bool + 'static,
    ) {
        self.handlers
            .entry((node, event_type))
            .or_default()
            .push(HandlerEntry {
                mask,
                callback: Rc::new(RefCell::new(callback)),
            });
    }

    /// Removes all handlers for `event_type` on `node`.
    pub fn clear_event_handlers(&mut self, node: NodeId, event_type: EventType) {
        self.handlers.remove(&(node, event_type));
    }

    /// Registers a keyboard handler. Handlers run in registration order
    /// until one consumes the event.
    pub fn add_key_handler(
        &mut self,
        callback: impl FnMut(&mut SceneGraph, &KeyEvent) -> bool + 'static,
    ) {
        self.key_handlers.push(Rc::new(RefCell::new(callback)));
    }

    /// Directs all events for `cursor_id` to `node` until released.
    ///
    /// Fails if another live node already holds the capture. A capture whose
    /// node has since been destroyed does not block a new one.
    pub fn set_event_capture(
        &mut self,
        scene: &SceneGraph,
        node: NodeId,
        cursor_id: CursorId,
    ) -> Result<(), CaptureError> {
        if let Some(&holder) = self.captures.get(&cursor_id)
            && scene.is_alive(holder)
        {
            return Err(CaptureError::AlreadyCaptured { cursor_id });
        }
        self.captures.insert(cursor_id, node);
        Ok(())
    }

    /// Releases the capture for `cursor_id`.
    ///
    /// Fails if the cursor has no capture, or only an expired one.
    pub fn release_event_capture(
        &mut self,
        scene: &SceneGraph,
        cursor_id: CursorId,
    ) -> Result<(), CaptureError> {
        match self.captures.remove(&cursor_id) {
            Some(holder) if scene.is_alive(holder) => Ok(()),
            _ => Err(CaptureError::NotCaptured { cursor_id }),
        }
    }

    /// The live capture holder for `cursor_id`, expiring a stale one.
    fn live_capture(&mut self, scene: &SceneGraph, cursor_id: CursorId) -> Option<NodeId> {
        let holder = *self.captures.get(&cursor_id)?;
        if scene.is_alive(holder) {
            Some(holder)
        } else {
            self.captures.remove(&cursor_id);
            None
        }
    }

    /// Routes one cursor event.
    ///
    /// Delivery order: out transitions, over transitions, then the event
    /// itself bubbling innermost to outermost. For a non-persistent source,
    /// an up event additionally ends the cursor: every node still under it
    /// receives an out transition and the per-cursor state is dropped.
    pub fn handle_cursor_event(&mut self, scene: &mut SceneGraph, event: &CursorEvent) {
        let hit_chain = scene.hit_chain(event.pos);
        let capture = self.live_capture(scene, event.cursor_id);

        // The set of nodes the cursor counts as being over. A capture
        // narrows it to the holder, so only the holder sees over/out.
        let over_chain: Vec<NodeId> = match capture {
            Some(holder) => hit_chain
                .iter()
                .copied()
                .filter(|&n| n == holder)
                .collect(),
            None => hit_chain.clone(),
        };
        let prev_chain = self
            .cursor_states
            .get(&event.cursor_id)
            .map_or_else(Vec::new, |s| s.over_chain.clone());

        for &node in prev_chain.iter().filter(|n| !over_chain.contains(n)) {
            if scene.is_alive(node) {
                self.deliver_to_node(scene, &event.retyped_for(EventType::CursorOut, node));
            }
        }
        for &node in over_chain.iter().filter(|n| !prev_chain.contains(n)) {
            self.deliver_to_node(scene, &event.retyped_for(EventType::CursorOver, node));
        }

        let dest_chain = match capture {
            Some(holder) => scene.parent_chain(holder),
            None => hit_chain,
        };
        for &node in &dest_chain {
            if self.deliver_to_node(scene, &event.for_node(node)) {
                break;
            }
        }

        if event.event_type == EventType::CursorUp && !event.source.is_persistent() {
            for &node in &over_chain {
                if scene.is_alive(node) {
                    self.deliver_to_node(scene, &event.retyped_for(EventType::CursorOut, node));
                }
            }
            self.cursor_states.remove(&event.cursor_id);
            self.captures.remove(&event.cursor_id);
        } else {
            self.cursor_states
                .entry(event.cursor_id)
                .or_default()
                .over_chain = over_chain;
        }
    }

    /// Runs the handlers registered for the event's type on one node.
    ///
    /// Works over a snapshot of the handler list, so a callback may
    /// mutate the scene freely. Returns whether any handler claimed the
    /// event.
    fn deliver_to_node(&mut self, scene: &mut SceneGraph, event: &CursorEvent) -> bool {
        let node = event.node.unwrap_or_else(|| scene.root());
        let snapshot: Vec<(SourceMask, Rc<RefCell<HandlerFn>>)> = self
            .handlers
            .get(&(node, event.event_type))
            .map_or_else(Vec::new, |entries| {
                entries
                    .iter()
                    .map(|e| (e.mask, e.callback.clone()))
                    .collect()
            });
        let mut claimed = false;
        for (mask, callback) in snapshot {
            if mask.contains(event.source) && (callback.borrow_mut())(scene, event) {
                claimed = true;
                break;
            }
        }
        claimed
    }

    /// Routes one keyboard event. Returns whether a handler consumed it.
    pub fn handle_key_event(&mut self, scene: &mut SceneGraph, event: &KeyEvent) -> bool {
        let snapshot: Vec<Rc<RefCell<KeyHandlerFn>>> = self.key_handlers.clone();
        for callback in snapshot {
            if (callback.borrow_mut())(scene, event) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use kurbo::Point;
    use moraine_core::scene::NodeKind;
    use moraine_core::time::HostTime;

    use super::*;
    use crate::event::{MOUSE_CURSOR_ID, Source};

    type Log = Rc<RefCell<Vec<String>>>;

    fn log_handler(log: &Log, tag: &str) -> impl FnMut(&mut SceneGraph, &CursorEvent) -> bool {
        let log = log.clone();
        let tag = String::from(tag);
        move |_, _| {
            log.borrow_mut().push(tag.clone());
            false
        }
    }

    fn cursor(
        event_type: EventType,
        cursor_id: CursorId,
        x: f64,
        y: f64,
        source: Source,
    ) -> CursorEvent {
        CursorEvent {
            event_type,
            cursor_id,
            pos: Point::new(x, y),
            source,
            when: HostTime(0),
            node: None,
        }
    }

    fn mouse_motion(x: f64, y: f64) -> CursorEvent {
        cursor(EventType::CursorMotion, MOUSE_CURSOR_ID, x, y, Source::Mouse)
    }

    /// A 200x200 scene with two sibling 50x50 images, `a` at (10, 10) and
    /// `b` at (100, 10).
    fn two_siblings() -> (SceneGraph, NodeId, NodeId) {
        let mut scene = SceneGraph::new(200.0, 200.0);
        let a = scene.create_node(NodeKind::Image {
            surface: None,
            opaque: false,
        });
        let b = scene.create_node(NodeKind::Image {
            surface: None,
            opaque: false,
        });
        scene.set_viewport(a, Some(10.0), Some(10.0), Some(50.0), Some(50.0));
        scene.set_viewport(b, Some(100.0), Some(10.0), Some(50.0), Some(50.0));
        scene.append_child(scene.root(), a).unwrap();
        scene.append_child(scene.root(), b).unwrap();
        scene.evaluate();
        (scene, a, b)
    }

    #[test]
    fn bubbles_innermost_first_until_claimed() {
        let (mut scene, a, _) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorDown, SourceMask::ALL, log_handler(&log, "a"));
        router.set_event_handler(
            scene.root(),
            EventType::CursorDown,
            SourceMask::ALL,
            log_handler(&log, "root"),
        );
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, MOUSE_CURSOR_ID, 20.0, 20.0, Source::Mouse),
        );
        assert_eq!(*log.borrow(), vec!["a", "root"]);

        log.borrow_mut().clear();
        router.clear_event_handlers(a, EventType::CursorDown);
        router.set_event_handler(a, EventType::CursorDown, SourceMask::ALL, {
            let log = log.clone();
            move |_, _| {
                log.borrow_mut().push(String::from("a-claims"));
                true
            }
        });
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, MOUSE_CURSOR_ID, 20.0, 20.0, Source::Mouse),
        );
        assert_eq!(*log.borrow(), vec!["a-claims"]);
    }

    #[test]
    fn over_and_out_pair_up_as_the_cursor_moves() {
        let (mut scene, a, b) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorOver, SourceMask::ALL, log_handler(&log, "over-a"));
        router.set_event_handler(a, EventType::CursorOut, SourceMask::ALL, log_handler(&log, "out-a"));
        router.set_event_handler(b, EventType::CursorOver, SourceMask::ALL, log_handler(&log, "over-b"));
        router.set_event_handler(b, EventType::CursorOut, SourceMask::ALL, log_handler(&log, "out-b"));

        router.handle_cursor_event(&mut scene, &mouse_motion(20.0, 20.0));
        assert_eq!(*log.borrow(), vec!["over-a"]);

        // Straight from a to b: one out, one over, in that order.
        log.borrow_mut().clear();
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert_eq!(*log.borrow(), vec!["out-a", "over-b"]);

        // Moving within b synthesizes nothing.
        log.borrow_mut().clear();
        router.handle_cursor_event(&mut scene, &mouse_motion(130.0, 30.0));
        assert!(log.borrow().is_empty());

        // Leaving for empty background leaves b.
        log.borrow_mut().clear();
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 150.0));
        assert_eq!(*log.borrow(), vec!["out-b"]);
    }

    #[test]
    fn capture_redirects_to_the_holder_chain() {
        let (mut scene, a, b) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorMotion, SourceMask::ALL, log_handler(&log, "a"));
        router.set_event_handler(b, EventType::CursorMotion, SourceMask::ALL, log_handler(&log, "b"));
        router.set_event_capture(&scene, a, MOUSE_CURSOR_ID).unwrap();

        // Cursor is physically over b, but a holds the capture.
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert_eq!(*log.borrow(), vec!["a"]);

        log.borrow_mut().clear();
        router.release_event_capture(&scene, MOUSE_CURSOR_ID).unwrap();
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn capture_is_exclusive_per_cursor() {
        let (scene, a, b) = two_siblings();
        let mut router = CursorRouter::new();
        router.set_event_capture(&scene, a, 1).unwrap();
        assert_eq!(
            router.set_event_capture(&scene, b, 1),
            Err(CaptureError::AlreadyCaptured { cursor_id: 1 })
        );
        // A different cursor is unaffected.
        router.set_event_capture(&scene, b, 2).unwrap();
        router.release_event_capture(&scene, 1).unwrap();
        assert_eq!(
            router.release_event_capture(&scene, 1),
            Err(CaptureError::NotCaptured { cursor_id: 1 })
        );
        router.set_event_capture(&scene, b, 1).unwrap();
    }

    #[test]
    fn destroying_the_holder_expires_the_capture() {
        let (mut scene, a, b) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(b, EventType::CursorMotion, SourceMask::ALL, log_handler(&log, "b"));
        router.set_event_capture(&scene, a, MOUSE_CURSOR_ID).unwrap();
        scene.destroy_node(a);

        // The stale capture no longer blocks a new one.
        router.set_event_capture(&scene, b, MOUSE_CURSOR_ID).unwrap();
        router.release_event_capture(&scene, MOUSE_CURSOR_ID).unwrap();

        // And routing falls back to hit-testing.
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert_eq!(*log.borrow(), vec!["b"]);
    }

    #[test]
    fn during_capture_only_the_holder_sees_over_out() {
        let (mut scene, a, b) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorOver, SourceMask::ALL, log_handler(&log, "over-a"));
        router.set_event_handler(a, EventType::CursorOut, SourceMask::ALL, log_handler(&log, "out-a"));
        router.set_event_handler(b, EventType::CursorOver, SourceMask::ALL, log_handler(&log, "over-b"));
        router.set_event_capture(&scene, a, MOUSE_CURSOR_ID).unwrap();

        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert!(log.borrow().is_empty(), "b must not see over while a captures");

        router.handle_cursor_event(&mut scene, &mouse_motion(20.0, 20.0));
        assert_eq!(*log.borrow(), vec!["over-a"]);

        log.borrow_mut().clear();
        router.handle_cursor_event(&mut scene, &mouse_motion(120.0, 20.0));
        assert_eq!(*log.borrow(), vec!["out-a"]);
    }

    #[test]
    fn touch_up_ends_the_cursor() {
        let (mut scene, a, _) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorOver, SourceMask::ALL, log_handler(&log, "over"));
        router.set_event_handler(a, EventType::CursorOut, SourceMask::ALL, log_handler(&log, "out"));

        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, 7, 20.0, 20.0, Source::Touch),
        );
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorUp, 7, 20.0, 20.0, Source::Touch),
        );
        assert_eq!(*log.borrow(), vec!["over", "out"]);

        // A new contact with the same id starts from a clean slate.
        log.borrow_mut().clear();
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, 7, 20.0, 20.0, Source::Touch),
        );
        assert_eq!(*log.borrow(), vec!["over"]);
    }

    #[test]
    fn touch_up_releases_the_capture() {
        let (mut scene, a, b) = two_siblings();
        let mut router = CursorRouter::new();
        router.set_event_capture(&scene, a, 7).unwrap();
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorUp, 7, 20.0, 20.0, Source::Touch),
        );
        assert_eq!(
            router.release_event_capture(&scene, 7),
            Err(CaptureError::NotCaptured { cursor_id: 7 })
        );
        router.set_event_capture(&scene, b, 7).unwrap();
    }

    #[test]
    fn source_masks_filter_deliveries() {
        let (mut scene, a, _) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.set_event_handler(
            a,
            EventType::CursorDown,
            SourceMask::MOUSE,
            log_handler(&log, "mouse-only"),
        );
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, 7, 20.0, 20.0, Source::Touch),
        );
        assert!(log.borrow().is_empty());
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, MOUSE_CURSOR_ID, 20.0, 20.0, Source::Mouse),
        );
        assert_eq!(*log.borrow(), vec!["mouse-only"]);
    }

    #[test]
    fn handlers_can_mutate_the_scene() {
        let (mut scene, a, b) = two_siblings();
        let mut router = CursorRouter::new();
        router.set_event_handler(a, EventType::CursorDown, SourceMask::ALL, move |scene, _| {
            scene.set_active(b, false);
            true
        });
        router.handle_cursor_event(
            &mut scene,
            &cursor(EventType::CursorDown, MOUSE_CURSOR_ID, 20.0, 20.0, Source::Mouse),
        );
        scene.evaluate();
        assert!(!scene.effective_active(b));
    }

    #[test]
    fn key_handlers_run_until_consumed() {
        let (mut scene, _, _) = two_siblings();
        let log: Log = Rc::default();
        let mut router = CursorRouter::new();
        router.add_key_handler({
            let log = log.clone();
            move |_, event: &KeyEvent| {
                if event.keycode == 27 {
                    log.borrow_mut().push(String::from("escape"));
                    return true;
                }
                false
            }
        });
        router.add_key_handler({
            let log = log.clone();
            move |_, _: &KeyEvent| {
                log.borrow_mut().push(String::from("fallback"));
                false
            }
        });
        let escape = KeyEvent {
            event_type: EventType::KeyDown,
            keycode: 27,
            when: HostTime(0),
        };
        assert!(router.handle_key_event(&mut scene, &escape));
        let other = KeyEvent {
            event_type: EventType::KeyDown,
            keycode: 65,
            when: HostTime(1),
        };
        assert!(!router.handle_key_event(&mut scene, &other));
        assert_eq!(*log.borrow(), vec!["escape", "fallback"]);
    }
}
