/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Interfaces between an instrumentation host and a counting tool.
//!
//! A tool is split in two halves that never mix:
//!
//!  * The *analysis* half ([`Tool::instrument_trace`] and
//!    [`Tool::instrument_instruction`]) runs once per code unit when the host
//!    discovers it. It is serialized by the host and may do arbitrary work,
//!    such as deciding which calls to insert.
//!  * The *runtime* half ([`Probe::fire`]) runs every time guest control
//!    reaches an inserted call. It only sees the current thread's state and a
//!    shared reference to the global state, and must stay cheap.
//!
//! Global state is reached through [`GlobalTool::receive_rpc`], which lets a
//! tool merge thread-local results without sharing mutable state on the hot
//! path.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod calls;
mod code;
mod error;
mod exit_status;
mod probe;
mod subscription;
mod tool;

pub use calls::*;
pub use code::*;
pub use error::*;
pub use exit_status::*;
pub use probe::*;
pub use subscription::*;
pub use tool::*;

/// The identifier of a guest thread.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tid(u32);

impl Tid {
    /// Creates a thread ID from its raw value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl core::fmt::Display for Tid {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
