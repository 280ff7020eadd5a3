/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use inscount::Tid;
use thiserror::Error;

use crate::image::ImageError;

/// An engine error.
#[derive(Error, Debug)]
pub enum Error {
    /// The guest image could not be loaded.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// An error raised by the tool, including its exit hook.
    #[error(transparent)]
    External(#[from] inscount::Error),

    /// A guest thread's task died without finishing its script.
    #[error("guest thread {0} did not run to completion")]
    GuestThread(Tid),

    /// The exit hook panicked.
    #[error("exit hook did not run to completion")]
    ExitHook,
}
