/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::HashSet;

use inscount::Error;
use inscount::ExitStatus;
use inscount::GlobalRPC;
use inscount::InsertCall;
use inscount::Instruction;
use inscount::InstructionCalls;
use inscount::Probe;
use inscount::ProbeContext;
use inscount::Tid;
use inscount::Tool;
use inscount::Trace;
use inscount::TraceCalls;
use tracing::debug;

use crate::counters::CounterMsg;
use crate::counters::Counters;
use crate::counters::ThreadCounts;

/// The runtime half of the tool. Each variant maps to one counter update.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum CountProbe {
    /// Fires before a block, carrying its static instruction count.
    BlockInstructions(u32),
    /// Fires before every instruction.
    InstructionVisit,
    /// Fires before an instruction, once per read operand, unless predicated
    /// off.
    MemoryRead,
    /// Fires before an instruction, once per written operand, unless
    /// predicated off.
    MemoryWrite,
}

impl Probe<InsCount> for CountProbe {
    #[inline]
    fn fire(&self, ctx: &mut ProbeContext<'_, InsCount>) {
        let addr = ctx.args().memory_ea.unwrap_or_default();
        let counts = ctx.thread_state_mut();
        match *self {
            CountProbe::BlockInstructions(c) => counts.count_block_instructions(c),
            CountProbe::InstructionVisit => counts.count_instruction_visit(),
            CountProbe::MemoryRead => counts.count_memory_read(addr),
            CountProbe::MemoryWrite => counts.count_memory_write(addr),
        }
    }
}

/// The analysis half of the tool.
#[derive(Debug, Default)]
pub struct InsCount {
    /// Addresses of blocks already counted. A block that the host
    /// re-instruments after invalidation is not counted again.
    seen_blocks: HashSet<u64>,
}

impl Tool for InsCount {
    type GlobalState = Counters;
    type ThreadState = ThreadCounts;
    type Probe = CountProbe;

    fn instrument_trace<G: GlobalRPC<Counters>>(
        &mut self,
        trace: &Trace,
        calls: &mut TraceCalls<CountProbe>,
        global_state: &G,
    ) {
        let mut discovered = 0;
        for (i, bbl) in trace.blocks().iter().enumerate() {
            if self.seen_blocks.insert(bbl.address) {
                discovered += 1;
            } else {
                debug!("block {:#x} instrumented again", bbl.address);
            }

            // Insert a call before every block, passing the number of
            // instructions.
            calls.insert(
                i,
                InsertCall::new(CountProbe::BlockInstructions(bbl.num_instructions())).before(),
            );
        }

        if discovered > 0 {
            global_state.send_rpc(CounterMsg::BlocksDiscovered(discovered));
        }
    }

    fn instrument_instruction<G: GlobalRPC<Counters>>(
        &mut self,
        ins: &Instruction,
        calls: &mut InstructionCalls<CountProbe>,
        _global_state: &G,
    ) {
        for op in 0..ins.memory_operand_count() {
            if ins.memory_operand_is_read(op) {
                calls.insert(
                    InsertCall::new(CountProbe::MemoryRead)
                        .before()
                        .predicated()
                        .memory_operand(op),
                );
            }

            // Not `else`: an operand can be both read and written.
            if ins.memory_operand_is_written(op) {
                calls.insert(
                    InsertCall::new(CountProbe::MemoryWrite)
                        .before()
                        .predicated()
                        .memory_operand(op),
                );
            }
        }

        calls.insert(InsertCall::new(CountProbe::InstructionVisit).before());
    }

    fn on_exit_thread<G: GlobalRPC<Counters>>(
        &self,
        tid: Tid,
        global_state: &G,
        counts: ThreadCounts,
        _exit_status: ExitStatus,
    ) -> Result<(), Error> {
        debug!("[tid {}] exit: {:?}", tid, counts);
        global_state.send_rpc(CounterMsg::ThreadExited(counts));
        Ok(())
    }
}
