/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Reference instrumentation host.
//!
//! The engine runs a [`GuestImage`] under a [`Tool`](inscount::Tool):
//!
//! * Traces are instrumented lazily, the first time any guest thread reaches
//!   one of their blocks. Instrumentation is serialized by a single analysis
//!   lock, and each trace is presented to the tool exactly once per live
//!   version.
//! * Invalidating a trace drops its instrumented version from the code cache.
//!   The next execution instruments it again, and only the new version's
//!   probes fire from then on.
//! * Every guest thread runs on its own blocking task and owns its thread
//!   state; probes fire inline on that thread.
//! * When a thread's script is done, `Tool::on_exit_thread` retires its state.
//!   Once all threads are gone, the exit hook registered with
//!   [`EngineBuilder::on_fini`] runs exactly once.
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod cache;
mod engine;
mod error;
mod image;
mod stats;
pub mod testing;
mod thread;

pub use engine::Engine;
pub use engine::EngineBuilder;
pub use engine::FiniFn;
pub use error::Error;
pub use image::Access;
pub use image::BlockSpec;
pub use image::GuestImage;
pub use image::ImageError;
pub use image::InstructionSpec;
pub use image::OperandSpec;
pub use image::Step;
pub use image::ThreadSpec;
pub use image::TraceSpec;
pub use stats::EngineStats;
