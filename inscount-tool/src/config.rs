/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use serde::Deserialize;
use serde::Serialize;

/// Static configuration of the counting tool.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Also report how many instrumented instructions were visited. This
    /// counter is always maintained; it is only left out of the report by
    /// default.
    pub instruction_visits: bool,
}
