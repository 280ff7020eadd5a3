/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Tests for parallelism and concurrency

use std::collections::HashSet;

use inscount::ExitStatus;
use inscount::GlobalRPC;
use inscount::GlobalTool;
use inscount::InsertCall;
use inscount::Probe;
use inscount::ProbeContext;
use inscount::Tid;
use inscount::Tool;
use inscount::Trace;
use inscount::TraceCalls;
use inscount_engine::testing::check_image;
use inscount_engine::testing::test_image_with_config;
use inscount_engine::BlockSpec;
use inscount_engine::InstructionSpec;
use inscount_tests::loop_image;
use inscount_tool::Config;
use inscount_tool::InsCount;
use parking_lot::Mutex;

const THREADS: usize = 8;
const ITERATIONS: u64 = 10_000;

fn body() -> BlockSpec {
    BlockSpec::new(vec![
        InstructionSpec::new(0x4000).read(0x10),
        InstructionSpec::new(0x4004).write(0x18),
        InstructionSpec::new(0x4008).read(0x20).write(0x20),
    ])
}

#[test]
fn no_lost_updates() {
    let image = loop_image(body(), ITERATIONS, THREADS);
    let (status, counters, stats) = test_image_with_config::<InsCount>(
        image,
        Config {
            instruction_visits: true,
        },
    )
    .unwrap();
    assert!(status.success());

    let threads = THREADS as u64;
    let counts = counters.stats();
    assert_eq!(counts.basic_blocks, 3);
    assert_eq!(counts.total_instructions, threads * (2 + 3 * ITERATIONS + 1));
    assert_eq!(counts.instruction_visits, Some(counts.total_instructions));
    assert_eq!(counts.memory_reads, threads * 2 * ITERATIONS);
    assert_eq!(counts.memory_writes, threads * 2 * ITERATIONS);
    assert_eq!(counters.exited_threads(), threads);

    // Every trace is instrumented exactly once, however many threads race
    // to it.
    assert_eq!(stats.traces_instrumented, 3);
    assert_eq!(stats.block_executions, threads * (ITERATIONS + 2));
}

/// Records which threads fired probes and which thread states were retired.
#[derive(Debug, Default)]
struct Seen {
    fired: Mutex<HashSet<Tid>>,
    exited: Mutex<Vec<(Tid, u64)>>,
}

impl GlobalTool for Seen {
    type Request = (Tid, u64);
    type Response = ();
    type Config = ();

    fn receive_rpc(&self, _from: Tid, (tid, hits): (Tid, u64)) {
        self.exited.lock().push((tid, hits));
    }
}

#[derive(Debug, Default)]
struct PerThread;

#[derive(Debug, Clone, Copy)]
struct Hit;

impl Probe<PerThread> for Hit {
    fn fire(&self, ctx: &mut ProbeContext<'_, PerThread>) {
        *ctx.thread_state_mut() += 1;
        ctx.global_state().fired.lock().insert(ctx.tid());
    }
}

impl Tool for PerThread {
    type GlobalState = Seen;
    type ThreadState = u64;
    type Probe = Hit;

    fn instrument_trace<G: GlobalRPC<Seen>>(
        &mut self,
        trace: &Trace,
        calls: &mut TraceCalls<Hit>,
        _global_state: &G,
    ) {
        for i in 0..trace.blocks().len() {
            calls.insert(i, InsertCall::new(Hit).after());
        }
    }

    fn on_exit_thread<G: GlobalRPC<Seen>>(
        &self,
        tid: Tid,
        global_state: &G,
        hits: u64,
        _exit_status: ExitStatus,
    ) -> Result<(), inscount::Error> {
        global_state.send_rpc((tid, hits));
        Ok(())
    }
}

#[test]
fn thread_states_are_private() {
    let seen = check_image::<PerThread>(loop_image(body(), 100, THREADS));

    let mut exited = seen.exited.into_inner();
    exited.sort();
    let expected: Vec<_> = (1..=THREADS as u32)
        .map(|tid| (Tid::from_raw(tid), 102))
        .collect();
    assert_eq!(exited, expected);
    assert_eq!(seen.fired.into_inner().len(), THREADS);
}
