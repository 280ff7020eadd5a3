/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */
use bitflags::bitflags;

bitflags! {
    #[derive(Default, Debug, Clone, Copy, Eq, PartialEq)]
    struct Units: u32 {
        const TRACES = 1;
        const INSTRUCTIONS = 2;
    }
}

/// The set of code units a tool wants to instrument. Units that are not
/// subscribed to never reach the tool's analysis callbacks.
#[derive(Default, Clone, Copy, Eq, PartialEq)]
pub struct Subscription {
    units: Units,
}

impl Subscription {
    /// Don't instrument anything.
    pub fn none() -> Self {
        Subscription {
            units: Units::empty(),
        }
    }

    /// Instrument both traces and instructions.
    pub fn all() -> Self {
        Subscription {
            units: Units::all(),
        }
    }

    /// Enable `Tool::instrument_trace`.
    #[inline]
    pub fn traces(&mut self) -> &mut Self {
        self.units.insert(Units::TRACES);
        self
    }

    /// Enable `Tool::instrument_instruction`.
    #[inline]
    pub fn instructions(&mut self) -> &mut Self {
        self.units.insert(Units::INSTRUCTIONS);
        self
    }

    /// Returns true if we're subscribed to traces.
    #[inline]
    pub fn has_traces(&self) -> bool {
        self.units.contains(Units::TRACES)
    }

    /// Returns true if we're subscribed to instructions.
    #[inline]
    pub fn has_instructions(&self) -> bool {
        self.units.contains(Units::INSTRUCTIONS)
    }
}

impl core::ops::BitOr for Subscription {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self::Output {
        self |= rhs;
        self
    }
}

impl core::ops::BitOrAssign for Subscription {
    fn bitor_assign(&mut self, rhs: Self) {
        self.units |= rhs.units;
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("traces", &self.has_traces())
            .field("instructions", &self.has_instructions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let none = Subscription::none();
        assert!(!none.has_traces());
        assert!(!none.has_instructions());

        let all = Subscription::all();
        assert!(all.has_traces());
        assert!(all.has_instructions());
        assert_eq!(Subscription::default(), none);
    }

    #[test]
    fn compose() {
        let mut a = Subscription::none();
        a.traces();
        let mut b = Subscription::none();
        b.instructions();

        assert!(!a.has_instructions());
        assert_eq!(a | b, Subscription::all());
    }
}
