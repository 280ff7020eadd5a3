/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Counters.
//!
//! Probes only ever touch the [`ThreadCounts`] of the guest thread that
//! reached them, so the hot path is a plain add with no sharing. When a
//! thread exits, its counts are merged into the global [`Counters`]. All
//! counters are `u64` and saturate instead of wrapping.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use inscount::GlobalTool;
use inscount::Tid;
use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;

/// Counts of a single guest thread.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct ThreadCounts {
    /// Sum of static instruction counts of executed blocks (`inscount1`).
    pub total_instructions: u64,
    /// Instrumented instructions reached (`inscount0`).
    pub instruction_visits: u64,
    /// Executed memory-read operands.
    pub memory_reads: u64,
    /// Executed memory-write operands.
    pub memory_writes: u64,
}

impl ThreadCounts {
    /// Adds a block's static instruction count.
    #[inline]
    pub fn count_block_instructions(&mut self, count: u32) {
        self.total_instructions = self.total_instructions.saturating_add(u64::from(count));
    }

    /// Counts one instruction visit.
    #[inline]
    pub fn count_instruction_visit(&mut self) {
        self.instruction_visits = self.instruction_visits.saturating_add(1);
    }

    /// Counts one memory read. The address is not aggregated.
    #[inline]
    pub fn count_memory_read(&mut self, _addr: u64) {
        self.memory_reads = self.memory_reads.saturating_add(1);
    }

    /// Counts one memory write. The address is not aggregated.
    #[inline]
    pub fn count_memory_write(&mut self, _addr: u64) {
        self.memory_writes = self.memory_writes.saturating_add(1);
    }
}

/// A message to the global counters.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CounterMsg {
    /// Static blocks seen for the first time by the instrumentor.
    BlocksDiscovered(u64),
    /// The final counts of an exited thread.
    ThreadExited(ThreadCounts),
}

/// Process-wide counters.
#[derive(Debug, Default)]
pub struct Counters {
    report_instruction_visits: bool,
    basic_blocks: AtomicU64,
    total_instructions: AtomicU64,
    instruction_visits: AtomicU64,
    memory_reads: AtomicU64,
    memory_writes: AtomicU64,
    exited_threads: AtomicU64,
}

fn add(counter: &AtomicU64, n: u64) {
    // The closure never returns `None`, so this cannot fail.
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
        Some(v.saturating_add(n))
    });
}

impl Counters {
    /// Snapshot of the current values.
    pub fn stats(&self) -> Stats {
        Stats {
            basic_blocks: self.basic_blocks.load(Ordering::SeqCst),
            memory_reads: self.memory_reads.load(Ordering::SeqCst),
            memory_writes: self.memory_writes.load(Ordering::SeqCst),
            total_instructions: self.total_instructions.load(Ordering::SeqCst),
            instruction_visits: self
                .report_instruction_visits
                .then(|| self.instruction_visits.load(Ordering::SeqCst)),
        }
    }

    /// Number of guest threads whose counts have been merged.
    pub fn exited_threads(&self) -> u64 {
        self.exited_threads.load(Ordering::SeqCst)
    }

    /// Visits are counted even when they are not reported.
    pub fn instruction_visits(&self) -> u64 {
        self.instruction_visits.load(Ordering::SeqCst)
    }
}

impl GlobalTool for Counters {
    type Request = CounterMsg;
    type Response = ();
    type Config = Config;

    fn init_global_state(cfg: &Config) -> Self {
        Counters {
            report_instruction_visits: cfg.instruction_visits,
            ..Default::default()
        }
    }

    fn receive_rpc(&self, from: Tid, msg: CounterMsg) {
        match msg {
            CounterMsg::BlocksDiscovered(n) => add(&self.basic_blocks, n),
            CounterMsg::ThreadExited(counts) => {
                tracing::debug!("[tid {}] merging {:?}", from, counts);
                add(&self.total_instructions, counts.total_instructions);
                add(&self.instruction_visits, counts.instruction_visits);
                add(&self.memory_reads, counts.memory_reads);
                add(&self.memory_writes, counts.memory_writes);
                add(&self.exited_threads, 1);
            }
        }
    }
}

/// Final values of the counters, as reported.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Static basic blocks discovered.
    pub basic_blocks: u64,
    /// Executed memory-read operands.
    pub memory_reads: u64,
    /// Executed memory-write operands.
    pub memory_writes: u64,
    /// Executed instructions, summed per block execution.
    pub total_instructions: u64,
    /// Instruction visits, if they are reported.
    pub instruction_visits: Option<u64>,
}
