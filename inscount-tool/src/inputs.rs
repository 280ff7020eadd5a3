/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt;

/// The benchmark command line, recorded for the report. There is no limit on
/// the number of arguments.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct InputEcho(Vec<String>);

impl InputEcho {
    /// Records `program` followed by its arguments.
    pub fn from_command<'a, I>(command: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        command.into_iter().map(String::from).collect()
    }

    /// Appends one argument.
    pub fn push<S: Into<String>>(&mut self, arg: S) {
        self.0.push(arg.into())
    }

    /// Number of recorded arguments, including the program.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded arguments, in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for InputEcho {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        InputEcho(iter.into_iter().map(Into::into).collect())
    }
}

/// Every argument is followed by a single space, including the last one.
impl fmt::Display for InputEcho {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for arg in &self.0 {
            write!(f, "{} ", arg)?;
        }
        Ok(())
    }
}
