/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Guest thread execution.

use bitvec::slice::BitSlice;
use inscount::BasicBlock;
use inscount::ExitStatus;
use inscount::InsertCall;
use inscount::Instruction;
use inscount::Probe;
use inscount::ProbeArgs;
use inscount::ProbeContext;
use inscount::Tid;
use inscount::Tool;

use crate::cache::CompiledBlock;
use crate::engine::Shared;
use crate::error::Error;
use crate::image::Op;

/// Where probes of the current thread fire.
struct Runner<'a, T: Tool> {
    tid: Tid,
    thread_state: T::ThreadState,
    global_state: &'a T::GlobalState,
    block_executions: u64,
    probes_fired: u64,
}

impl<T: Tool> Runner<'_, T> {
    #[inline]
    fn fire(
        &mut self,
        calls: &[InsertCall<T::Probe>],
        ip: u64,
        ins: Option<&Instruction>,
        executes: bool,
    ) {
        for call in calls {
            if call.is_predicated() && !executes {
                continue;
            }

            let memory_ea = call
                .memory_operand_index()
                .and_then(|i| ins?.memory_operands.get(i))
                .map(|op| op.address);
            let mut ctx = ProbeContext::<T>::new(
                self.tid,
                ProbeArgs { ip, memory_ea },
                &mut self.thread_state,
                self.global_state,
            );
            call.probe().fire(&mut ctx);
            self.probes_fired += 1;
        }
    }

    /// Executes one block. Calls inserted before an instruction fire before
    /// its effects, calls inserted after it fire once it has retired.
    fn execute(
        &mut self,
        bbl: &BasicBlock,
        compiled: &CompiledBlock<T::Probe>,
        predicated_off: Option<&BitSlice>,
    ) {
        self.block_executions += 1;
        self.fire(&compiled.before, bbl.address, None, true);

        for (i, (ins, calls)) in bbl
            .instructions()
            .iter()
            .zip(&compiled.instructions)
            .enumerate()
        {
            let executes = predicated_off.map_or(true, |mask| !mask[i]);
            self.fire(&calls.before, ins.address, Some(ins), executes);
            self.fire(&calls.after, ins.address, Some(ins), executes);
        }

        let last = bbl.instructions().last().map_or(bbl.address, |ins| ins.address);
        self.fire(&compiled.after, last, None, true);
    }
}

/// Runs the script of guest thread `index` to completion, then retires its
/// thread state.
pub(crate) fn run_guest_thread<T: Tool>(
    shared: &Shared<T>,
    index: usize,
    tid: Tid,
    status: ExitStatus,
) -> Result<(), Error> {
    let thread_state = shared.tool.lock().init_thread_state(tid);
    tracing::debug!("[tid {}] thread start", tid);

    let mut runner = Runner::<T> {
        tid,
        thread_state,
        global_state: &*shared.global_state,
        block_executions: 0,
        probes_fired: 0,
    };

    for op in &shared.program.threads[index] {
        match op {
            Op::Run {
                at,
                predicated_off,
                repeat,
            } => {
                let bbl = &shared.program.traces[at.trace].blocks()[at.block];
                for _ in 0..*repeat {
                    // Look the trace up on every execution: another thread may
                    // have invalidated it in the meantime.
                    let compiled = shared.compiled(at.trace, tid);
                    runner.execute(
                        bbl,
                        &compiled.blocks[at.block],
                        predicated_off.as_deref(),
                    );
                }
            }
            Op::Invalidate { trace } => shared.invalidate(*trace, tid),
        }
    }

    let Runner {
        thread_state,
        block_executions,
        probes_fired,
        ..
    } = runner;

    shared.stats.thread_exited(block_executions, probes_fired);
    tracing::debug!(
        "[tid {}] thread exit: {} block executions, {} probes fired",
        tid,
        block_executions,
        probes_fired
    );

    shared
        .tool
        .lock()
        .on_exit_thread(tid, &shared.global_ref(tid), thread_state, status)?;
    Ok(())
}
