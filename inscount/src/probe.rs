/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Runtime probes.

use crate::tool::Tool;
use crate::Tid;

/// Arguments the host passes to a probe when it fires.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ProbeArgs {
    /// Address of the instruction (or block) the probe is attached to.
    pub ip: u64,
    /// Effective address of the requested memory operand, if the call asked
    /// for one with [`InsertCall::memory_operand`](crate::InsertCall::memory_operand).
    pub memory_ea: Option<u64>,
}

/// What a probe can see while it runs: the state of the guest thread that
/// reached it and a shared reference to the global state.
pub struct ProbeContext<'a, T: Tool> {
    tid: Tid,
    args: ProbeArgs,
    thread_state: &'a mut T::ThreadState,
    global_state: &'a T::GlobalState,
}

impl<'a, T: Tool> ProbeContext<'a, T> {
    /// Creates the context for one probe invocation. Only hosts need this.
    #[inline]
    pub fn new(
        tid: Tid,
        args: ProbeArgs,
        thread_state: &'a mut T::ThreadState,
        global_state: &'a T::GlobalState,
    ) -> Self {
        Self {
            tid,
            args,
            thread_state,
            global_state,
        }
    }

    /// The guest thread that reached the probe.
    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    /// Arguments of this invocation.
    #[inline]
    pub fn args(&self) -> &ProbeArgs {
        &self.args
    }

    /// The state of the current guest thread.
    #[inline]
    pub fn thread_state_mut(&mut self) -> &mut T::ThreadState {
        self.thread_state
    }

    /// The global state. Any mutation through this reference races with
    /// every other guest thread and must be atomic.
    #[inline]
    pub fn global_state(&self) -> &T::GlobalState {
        self.global_state
    }
}

/// A runtime analysis routine.
///
/// A probe is a small `Copy` value chosen at analysis time, typically an enum
/// carrying any per-unit constant (like the instruction count of a block).
/// The host fires it every time guest control reaches the point it was
/// inserted at, potentially billions of times, from any guest thread. It
/// cannot reach the tool's analysis state.
pub trait Probe<T: Tool>: Copy + Send + Sync + 'static {
    /// Runs the probe.
    fn fire(&self, ctx: &mut ProbeContext<'_, T>);
}

/// A probe that does nothing.
impl<T: Tool> Probe<T> for () {
    #[inline]
    fn fire(&self, _ctx: &mut ProbeContext<'_, T>) {}
}
