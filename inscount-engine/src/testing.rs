/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Utilities that support constructing tests for tools.

use futures::Future;
use inscount::ExitStatus;
use inscount::GlobalTool;
use inscount::Tool;

use crate::EngineBuilder;
use crate::EngineStats;
use crate::Error;
use crate::GuestImage;

/// Configure tokio and tracing in the way that we like, and run the future.
pub fn run_tokio_test<F: Future>(fut: F) -> F::Output {
    let collector = tracing_subscriber::fmt()
        .with_env_filter("inscount=debug,inscount_engine=debug")
        .with_test_writer()
        .finish();

    // Here we ignore errors, because tests may be running in parallel, and we
    // don't care who "wins".
    tracing::subscriber::set_global_default(collector).unwrap_or(());
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .worker_threads(2)
        .build()
        .unwrap();
    rt.block_on(fut)
}

/// Runs a guest image and returns its exit status, global state and engine
/// statistics.
pub fn test_image_with_config<T>(
    image: GuestImage,
    config: <T::GlobalState as GlobalTool>::Config,
) -> Result<(ExitStatus, T::GlobalState, EngineStats), Error>
where
    T: Tool + 'static,
{
    run_tokio_test(async move {
        let engine = EngineBuilder::<T>::new(image)
            .config(config)
            .spawn()
            .await?;
        engine.wait_with_stats().await
    })
}

/// Runs a guest image and returns its exit status and global state.
pub fn test_image<T>(image: GuestImage) -> Result<(ExitStatus, T::GlobalState), Error>
where
    T: Tool + 'static,
{
    let (status, state, _) = test_image_with_config::<T>(image, Default::default())?;
    Ok((status, state))
}

/// Runs a guest image and returns its global state. Also checks that the
/// guest exit code is 0.
pub fn check_image_with_config<T>(
    image: GuestImage,
    config: <T::GlobalState as GlobalTool>::Config,
) -> T::GlobalState
where
    T: Tool + 'static,
{
    let (status, state, _) = test_image_with_config::<T>(image, config).unwrap();

    if !status.success() {
        panic!("Got exit status {:?}", status);
    }

    state
}

/// Runs a guest image and returns its global state. Also checks that the
/// guest exit code is 0.
pub fn check_image<T>(image: GuestImage) -> T::GlobalState
where
    T: Tool + 'static,
{
    check_image_with_config::<T>(image, Default::default())
}
