/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use serde::Deserialize;
use serde::Serialize;

/// Describes the result of a guest after it has exited.
///
/// This is similar to `std::process::ExitStatus`, but is easier to match
/// against and provides `raise_or_exit` to propagate the guest's status as
/// the status of the tool.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ExitStatus {
    /// Guest exited with an exit code.
    Exited(i32),
}

impl ExitStatus {
    /// A successful exit status.
    pub const SUCCESS: Self = ExitStatus::Exited(0);

    /// Was termination successful? Success is defined as a zero exit status.
    pub fn success(&self) -> bool {
        self == &Self::SUCCESS
    }

    /// Returns the exit code of the guest.
    pub fn code(&self) -> i32 {
        let ExitStatus::Exited(code) = *self;
        code
    }

    /// Exits the current process with the same status.
    pub fn raise_or_exit(self) -> ! {
        std::process::exit(self.code())
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for ExitStatus {
    fn from(code: i32) -> Self {
        ExitStatus::Exited(code)
    }
}
