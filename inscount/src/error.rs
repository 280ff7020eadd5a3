/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Error handling.

use thiserror::Error;

/// A general error.
#[derive(Error, Debug)]
pub enum Error {
    /// A generic error that may be produced by the tool.
    #[error(transparent)]
    Tool(#[from] anyhow::Error),

    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Extracts the I/O error. If this is not an `Error::Io`, then returns
    /// `Err(Error)`. This is useful for reporting file errors separately while
    /// propagating everything else.
    pub fn into_io(self) -> Result<std::io::Error, Self> {
        if let Self::Io(err) = self {
            Ok(err)
        } else {
            Err(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_io() {
        let err = Error::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.into_io().unwrap().kind(), std::io::ErrorKind::NotFound);

        let err = Error::from(anyhow::anyhow!("tool failure"));
        assert_eq!(err.into_io().unwrap_err().to_string(), "tool failure");
    }
}
