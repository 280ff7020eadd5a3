/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The code cache: instrumented versions of guest traces.

use std::sync::Arc;

use inscount::GlobalRPC;
use inscount::IPoint;
use inscount::InsertCall;
use inscount::InstructionCalls;
use inscount::Subscription;
use inscount::Tool;
use inscount::Trace;
use inscount::TraceCalls;
use parking_lot::RwLock;

/// Calls of one instruction, split by insertion point.
#[derive(Debug)]
pub(crate) struct CompiledInstruction<P> {
    pub before: Vec<InsertCall<P>>,
    pub after: Vec<InsertCall<P>>,
}

/// Calls of one block, split by insertion point.
#[derive(Debug)]
pub(crate) struct CompiledBlock<P> {
    pub before: Vec<InsertCall<P>>,
    pub after: Vec<InsertCall<P>>,
    pub instructions: Vec<CompiledInstruction<P>>,
}

/// One instrumented version of a trace.
#[derive(Debug)]
pub(crate) struct CompiledTrace<P> {
    pub version: u64,
    pub blocks: Vec<CompiledBlock<P>>,
}

impl<P> CompiledTrace<P> {
    /// Total number of inserted calls.
    pub fn num_calls(&self) -> usize {
        self.blocks
            .iter()
            .map(|bbl| {
                bbl.before.len()
                    + bbl.after.len()
                    + bbl
                        .instructions
                        .iter()
                        .map(|ins| ins.before.len() + ins.after.len())
                        .sum::<usize>()
            })
            .sum()
    }
}

fn split<P>(calls: Vec<InsertCall<P>>) -> (Vec<InsertCall<P>>, Vec<InsertCall<P>>) {
    calls
        .into_iter()
        .partition(|call| call.point() == IPoint::Before)
}

/// Runs the tool's analysis callbacks over `trace`. The caller must hold the
/// analysis lock.
pub(crate) fn instrument<T, G>(
    tool: &mut T,
    trace: &Trace,
    subscriptions: &Subscription,
    global_state: &G,
    version: u64,
) -> CompiledTrace<T::Probe>
where
    T: Tool,
    G: GlobalRPC<T::GlobalState>,
{
    let mut trace_calls = TraceCalls::new(trace.blocks().len());
    if subscriptions.has_traces() {
        tool.instrument_trace(trace, &mut trace_calls, global_state);
    }

    let blocks = trace
        .blocks()
        .iter()
        .zip(trace_calls.into_blocks())
        .map(|(bbl, calls)| {
            let (before, after) = split(calls);
            let instructions = bbl
                .instructions()
                .iter()
                .map(|ins| {
                    let mut calls = InstructionCalls::new(ins);
                    if subscriptions.has_instructions() {
                        tool.instrument_instruction(ins, &mut calls, global_state);
                    }
                    let (before, after) = split(calls.into_calls());
                    CompiledInstruction { before, after }
                })
                .collect();
            CompiledBlock {
                before,
                after,
                instructions,
            }
        })
        .collect();

    CompiledTrace { version, blocks }
}

#[derive(Debug)]
struct Slot<P> {
    current: Option<Arc<CompiledTrace<P>>>,
    versions: u64,
}

/// Holds at most one live instrumented version per trace. Threads executing
/// an old version keep their `Arc` until the block they are in finishes;
/// every later execution sees the current version only.
#[derive(Debug)]
pub(crate) struct CodeCache<P> {
    slots: RwLock<Vec<Slot<P>>>,
}

impl<P> CodeCache<P> {
    pub fn new(num_traces: usize) -> Self {
        Self {
            slots: RwLock::new(
                (0..num_traces)
                    .map(|_| Slot {
                        current: None,
                        versions: 0,
                    })
                    .collect(),
            ),
        }
    }

    /// Returns the live version of `trace`, if any.
    #[inline]
    pub fn lookup(&self, trace: usize) -> Option<Arc<CompiledTrace<P>>> {
        self.slots.read()[trace].current.clone()
    }

    /// The version number the next instrumentation of `trace` gets.
    pub fn next_version(&self, trace: usize) -> u64 {
        self.slots.read()[trace].versions + 1
    }

    /// Makes `compiled` the live version of `trace`.
    pub fn install(&self, trace: usize, compiled: CompiledTrace<P>) -> Arc<CompiledTrace<P>> {
        let compiled = Arc::new(compiled);
        let mut slots = self.slots.write();
        let slot = &mut slots[trace];
        slot.versions = compiled.version;
        slot.current = Some(compiled.clone());
        compiled
    }

    /// Drops the live version of `trace`. Returns false if it was not
    /// instrumented.
    pub fn invalidate(&self, trace: usize) -> bool {
        self.slots.write()[trace].current.take().is_some()
    }
}
