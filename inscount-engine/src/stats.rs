/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// What the engine did during a run.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct EngineStats {
    /// Trace versions built, including re-instrumentation after invalidation.
    pub traces_instrumented: u64,
    /// Calls inserted over all trace versions.
    pub calls_inserted: u64,
    /// Invalidations that dropped a live trace version.
    pub invalidations: u64,
    /// Dynamic basic block executions.
    pub block_executions: u64,
    /// Probe invocations.
    pub probes_fired: u64,
}

/// Shared counters behind [`EngineStats`]. Guest threads accumulate their
/// execution counts locally and add them once on exit.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    traces_instrumented: AtomicU64,
    calls_inserted: AtomicU64,
    invalidations: AtomicU64,
    block_executions: AtomicU64,
    probes_fired: AtomicU64,
}

impl StatsCounters {
    pub fn instrumented(&self, calls: usize) {
        self.traces_instrumented.fetch_add(1, Ordering::Relaxed);
        self.calls_inserted
            .fetch_add(calls as u64, Ordering::Relaxed);
    }

    pub fn invalidated(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn thread_exited(&self, block_executions: u64, probes_fired: u64) {
        self.block_executions
            .fetch_add(block_executions, Ordering::Relaxed);
        self.probes_fired.fetch_add(probes_fired, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            traces_instrumented: self.traces_instrumented.load(Ordering::Relaxed),
            calls_inserted: self.calls_inserted.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            block_executions: self.block_executions.load(Ordering::Relaxed),
            probes_fired: self.probes_fired.load(Ordering::Relaxed),
        }
    }
}
