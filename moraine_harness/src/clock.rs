// Copyright 2026 the Moraine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use core::cell::Cell;

use moraine_core::time::{Clock, Duration, HostTime};

/// A [`Clock`] that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// the player and keep another to advance between ticks.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    now: Rc<Cell<HostTime>>,
}

impl FakeClock {
    /// Creates a clock starting at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at the given time.
    #[must_use]
    pub fn starting_at(now: HostTime) -> Self {
        let clock = Self::new();
        clock.now.set(now);
        clock
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, now: HostTime) {
        self.now.set(now);
    }
}

impl Clock for FakeClock {
    fn now(&mut self) -> HostTime {
        self.now.get()
    }
}
