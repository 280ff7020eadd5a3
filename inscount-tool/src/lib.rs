/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! A tool that counts basic blocks, executed instructions and memory
//! accesses of a guest, and writes a benchmark report when the guest exits.
//!
//! Analysis-time work happens in [`InsCount`]: every block gets one call
//! carrying its static instruction count, and every instruction gets one
//! predicated call per memory access plus an unconditional visit call. The
//! inserted [`CountProbe`]s bump plain per-thread counters ([`ThreadCounts`]),
//! which are merged into the global [`Counters`] when each guest thread
//! exits. The [`Reporter`] then writes the final [`Stats`].

mod config;
mod counters;
mod inputs;
mod report;
mod tool;

pub use config::Config;
pub use counters::CounterMsg;
pub use counters::Counters;
pub use counters::Stats;
pub use counters::ThreadCounts;
pub use inputs::InputEcho;
pub use report::timestamp;
pub use report::Report;
pub use report::Reporter;
pub use report::DEFAULT_OUTPUT;
pub use tool::CountProbe;
pub use tool::InsCount;
