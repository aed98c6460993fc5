// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame event queue and sink chain.

use alloc::boxed::Box;
use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::fmt;

use crate::event::Event;

/// Produces zero or more events when polled at the top of a frame.
///
/// Sources wrap platform event pumps, test scripts, or synthetic generators.
pub trait EventSource {
    /// Drains all events that arrived since the last poll.
    fn poll_events(&mut self) -> Vec<Event>;
}

/// Consumes events handed out by the dispatcher.
///
/// Sinks are tried in registration order. Returning `true` consumes the
/// event; later sinks never see it.
pub trait EventSink<Ctx> {
    /// Handles one event. Returns whether the event was consumed.
    fn handle_event(&mut self, ctx: &mut Ctx, event: &Event) -> bool;
}

/// An event with its queue ordering key.
///
/// Events dispatch in timestamp order. Ties break by arrival: the sequence
/// counter makes the ordering total and keeps equal-timestamp events FIFO.
struct QueuedEvent {
    when: u64,
    seq: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        (self.when, self.seq) == (other.when, other.seq)
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.when, self.seq).cmp(&(other.when, other.seq))
    }
}

/// Collects events from sources and delivers them to sinks once per frame.
///
/// `Ctx` is whatever mutable state the sinks operate on. The player passes
/// its [`SceneGraph`] so handlers can mutate the scene during delivery.
///
/// [`SceneGraph`]: moraine_core::scene::SceneGraph
pub struct EventDispatcher<Ctx> {
    sources: Vec<Box<dyn EventSource>>,
    sinks: Vec<Box<dyn EventSink<Ctx>>>,
    queue: BinaryHeap<Reverse<QueuedEvent>>,
    seq: u64,
}

impl<Ctx> fmt::Debug for EventDispatcher<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("sources", &self.sources.len())
            .field("sinks", &self.sinks.len())
            .field("queued", &self.queue.len())
            .field("seq", &self.seq)
            .finish()
    }
}

impl<Ctx> Default for EventDispatcher<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> EventDispatcher<Ctx> {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            sinks: Vec::new(),
            queue: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Registers an event source. Sources are polled in registration order.
    pub fn add_source(&mut self, source: Box<dyn EventSource>) {
        self.sources.push(source);
    }

    /// Registers an event sink. Sinks are tried in registration order.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink<Ctx>>) {
        self.sinks.push(sink);
    }

    /// Queues a single event directly, bypassing the sources.
    ///
    /// Used for synthetic events. The event still dispatches in timestamp
    /// order relative to everything else queued this frame.
    pub fn add_event(&mut self, event: Event) {
        let when = event.when().ticks();
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Reverse(QueuedEvent { when, seq, event }));
    }

    /// Polls all sources, then drains the queue through the sink chain.
    ///
    /// Each event goes to sinks in order until one consumes it. Unconsumed
    /// events are dropped.
    pub fn dispatch(&mut self, ctx: &mut Ctx) {
        for source in &mut self.sources {
            for event in source.poll_events() {
                let when = event.when().ticks();
                let seq = self.seq;
                self.seq += 1;
                self.queue.push(Reverse(QueuedEvent { when, seq, event }));
            }
        }
        while let Some(Reverse(queued)) = self.queue.pop() {
            for sink in &mut self.sinks {
                if sink.handle_event(ctx, &queued.event) {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use moraine_core::time::HostTime;

    use super::*;
    use crate::event::{Event, EventType, KeyEvent};

    fn key(keycode: u32, when: u64) -> Event {
        Event::Key(KeyEvent {
            event_type: EventType::KeyDown,
            keycode,
            when: HostTime(when),
        })
    }

    struct ScriptSource(Vec<Event>);

    impl EventSource for ScriptSource {
        fn poll_events(&mut self) -> Vec<Event> {
            core::mem::take(&mut self.0)
        }
    }

    struct Recorder;

    impl EventSink<Vec<u32>> for Recorder {
        fn handle_event(&mut self, ctx: &mut Vec<u32>, event: &Event) -> bool {
            if let Event::Key(k) = event {
                ctx.push(k.keycode);
            }
            true
        }
    }

    #[test]
    fn events_dispatch_in_timestamp_order() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_source(Box::new(ScriptSource(vec![
            key(3, 30),
            key(1, 10),
            key(2, 20),
        ])));
        dispatcher.add_sink(Box::new(Recorder));
        let mut seen = Vec::new();
        dispatcher.dispatch(&mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_source(Box::new(ScriptSource(vec![
            key(1, 10),
            key(2, 10),
            key(3, 10),
        ])));
        dispatcher.add_sink(Box::new(Recorder));
        let mut seen = Vec::new();
        dispatcher.dispatch(&mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn injected_events_interleave_by_timestamp() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_source(Box::new(ScriptSource(vec![key(1, 10), key(3, 30)])));
        dispatcher.add_sink(Box::new(Recorder));
        dispatcher.add_event(key(2, 20));
        let mut seen = Vec::new();
        dispatcher.dispatch(&mut seen);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    struct Claiming(u32);

    impl EventSink<Vec<u32>> for Claiming {
        fn handle_event(&mut self, ctx: &mut Vec<u32>, event: &Event) -> bool {
            if let Event::Key(k) = event
                && k.keycode == self.0
            {
                ctx.push(self.0 * 100);
                return true;
            }
            false
        }
    }

    #[test]
    fn a_consuming_sink_shadows_later_sinks() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_source(Box::new(ScriptSource(vec![key(1, 10), key(2, 20)])));
        dispatcher.add_sink(Box::new(Claiming(1)));
        dispatcher.add_sink(Box::new(Recorder));
        let mut seen = Vec::new();
        dispatcher.dispatch(&mut seen);
        assert_eq!(seen, vec![100, 2]);
    }
}
