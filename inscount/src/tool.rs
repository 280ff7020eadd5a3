/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The API that an instrumentation tool (client) should implement.
//!
//! Tools consist of two portions: the global state, of which there is one
//! instance for the whole guest, and the tool itself, which holds
//! analysis-time state and is a factory for per-thread state.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::calls::InstructionCalls;
use crate::calls::TraceCalls;
use crate::code::Instruction;
use crate::code::Trace;
use crate::error::Error;
use crate::probe::Probe;
use crate::ExitStatus;
use crate::Subscription;
use crate::Tid;

/// The global half of a complete tool.
///
/// One global instance of this type will exist at runtime (singleton). It is
/// shared by every guest thread and must manage its own synchronization.
pub trait GlobalTool: Send + Sync + Default + 'static {
    /// The message to send to the global tool.
    type Request: Send;

    /// The result of sending the message.
    type Response: Send;

    /// Static, read-only configuration data that is available everywhere the
    /// tool runs code.
    type Config: Serialize + DeserializeOwned + Send + Sync + Clone + Default + 'static;

    /// Initialize the tool, allocating the global state.
    fn init_global_state(_cfg: &Self::Config) -> Self {
        Default::default()
    }

    /// Receive an upcall on the global state object. It receives a shared
    /// reference to the global state, which must manage its own
    /// synchronization.
    fn receive_rpc(&self, from: Tid, message: Self::Request) -> Self::Response;
}

impl GlobalTool for () {
    type Request = ();
    type Response = ();
    type Config = ();

    fn receive_rpc(&self, _from: Tid, _message: ()) {}
}

/// A trait that every instrumentation *tool* must implement.
///
/// The type that a `Tool` is implemented for holds the *analysis-time* state.
/// The host calls [`Tool::instrument_trace`] and
/// [`Tool::instrument_instruction`] with exclusive access, one code unit at a
/// time, whenever it discovers (or rediscovers after invalidation) a piece of
/// guest code. What runs at guest runtime is only ever the [`Tool::Probe`]
/// values inserted by those callbacks.
///
/// # Example
///
/// A tool that counts executed instructions per thread:
/// ```
/// use inscount::*;
///
/// #[derive(Debug, Default)]
/// struct Icount;
///
/// #[derive(Debug, Clone, Copy)]
/// struct Bump;
///
/// impl Probe<Icount> for Bump {
///     fn fire(&self, ctx: &mut ProbeContext<'_, Icount>) {
///         *ctx.thread_state_mut() += 1;
///     }
/// }
///
/// impl Tool for Icount {
///     type GlobalState = ();
///     type ThreadState = u64;
///     type Probe = Bump;
///
///     fn instrument_instruction<G: GlobalRPC<()>>(
///         &mut self,
///         _ins: &Instruction,
///         calls: &mut InstructionCalls<Bump>,
///         _global_state: &G,
///     ) {
///         calls.insert(InsertCall::new(Bump).before());
///     }
/// }
/// ```
pub trait Tool: Send + Default + 'static {
    /// The type of the global half that goes along with this tool.
    type GlobalState: GlobalTool;

    /// Tool-state specific to each guest thread. Probes mutate it without
    /// synchronization, so this is where hot counters belong.
    type ThreadState: Default + Send + 'static;

    /// The runtime routine inserted into guest code.
    type Probe: Probe<Self>;

    /// Initializes the analysis-time state before any code is instrumented.
    fn new(_cfg: &<Self::GlobalState as GlobalTool>::Config) -> Self {
        Default::default()
    }

    /// Code units the tool instruments. This is only called *once*. By
    /// default, both traces and instructions are instrumented.
    fn subscriptions(_cfg: &<Self::GlobalState as GlobalTool>::Config) -> Subscription {
        Subscription::all()
    }

    /// Allocates the state of a new guest thread. Runs before the thread
    /// executes its first instruction.
    fn init_thread_state(&self, _tid: Tid) -> Self::ThreadState {
        Default::default()
    }

    /// Called once for every trace the host builds, before any of its blocks
    /// execute. A trace that was invalidated is presented again when it is
    /// rebuilt, and the calls of the previous version stop firing.
    fn instrument_trace<G: GlobalRPC<Self::GlobalState>>(
        &mut self,
        _trace: &Trace,
        _calls: &mut TraceCalls<Self::Probe>,
        _global_state: &G,
    ) {
    }

    /// Called once for every instruction of every trace the host builds.
    fn instrument_instruction<G: GlobalRPC<Self::GlobalState>>(
        &mut self,
        _ins: &Instruction,
        _calls: &mut InstructionCalls<Self::Probe>,
        _global_state: &G,
    ) {
    }

    /// Called when a thread has exited. That means there will be no more
    /// probes firing on this thread.
    ///
    /// Serves as a "destructor" for the thread state, and thus takes it by
    /// move. The host runs every thread's exit before the final exit hook.
    fn on_exit_thread<G: GlobalRPC<Self::GlobalState>>(
        &self,
        _tid: Tid,
        _global_state: &G,
        _thread_state: Self::ThreadState,
        _exit_status: ExitStatus,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// A "noop" tool that doesn't do anything.
impl Tool for () {
    type GlobalState = ();
    type ThreadState = ();
    type Probe = ();

    fn subscriptions(_cfg: &()) -> Subscription {
        Subscription::none()
    }
}

/// A handle to send messages to the global state.
pub trait GlobalRPC<G: GlobalTool>: Sync {
    /// Send a message to the global state and return its response.
    fn send_rpc(&self, message: G::Request) -> G::Response;

    /// Return the read-only tool configuration.
    fn config(&self) -> &G::Config;
}
