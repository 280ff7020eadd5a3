/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! `Engine` type, plus ways to spawn it and retrieve its output.

use std::sync::Arc;

use futures::future;
use futures::future::BoxFuture;
use futures::FutureExt;
use inscount::ExitStatus;
use inscount::GlobalRPC;
use inscount::GlobalTool;
use inscount::Subscription;
use inscount::Tid;
use inscount::Tool;
use parking_lot::Mutex;

use crate::cache;
use crate::cache::CodeCache;
use crate::cache::CompiledTrace;
use crate::error::Error;
use crate::image::GuestImage;
use crate::image::Program;
use crate::stats::EngineStats;
use crate::stats::StatsCounters;
use crate::thread;

/// The exit hook: runs once, after every guest thread has exited.
pub type FiniFn<G> = Box<dyn FnOnce(ExitStatus, &G) -> Result<(), inscount::Error> + Send>;

/// A handle on the global state that tags every message with the sending
/// thread.
pub(crate) struct GlobalRef<'a, G: GlobalTool> {
    pub tid: Tid,
    pub global_state: &'a G,
    pub config: &'a G::Config,
}

impl<G: GlobalTool> GlobalRPC<G> for GlobalRef<'_, G> {
    fn send_rpc(&self, message: G::Request) -> G::Response {
        self.global_state.receive_rpc(self.tid, message)
    }

    fn config(&self) -> &G::Config {
        self.config
    }
}

/// Everything guest threads share.
pub(crate) struct Shared<T: Tool> {
    pub program: Program,
    pub config: <T::GlobalState as GlobalTool>::Config,
    pub global_state: Arc<T::GlobalState>,
    /// The analysis lock. Whoever holds it may instrument code.
    pub tool: Mutex<T>,
    pub cache: CodeCache<T::Probe>,
    pub subscriptions: Subscription,
    pub stats: StatsCounters,
}

impl<T: Tool> Shared<T> {
    pub fn global_ref(&self, tid: Tid) -> GlobalRef<'_, T::GlobalState> {
        GlobalRef {
            tid,
            global_state: &self.global_state,
            config: &self.config,
        }
    }

    /// Returns the live instrumented version of `trace`, instrumenting it
    /// first if needed. `tid` is the thread whose execution reached it.
    pub fn compiled(&self, trace: usize, tid: Tid) -> Arc<CompiledTrace<T::Probe>> {
        if let Some(compiled) = self.cache.lookup(trace) {
            return compiled;
        }

        let mut tool = self.tool.lock();

        // Another thread may have instrumented it while we were waiting.
        if let Some(compiled) = self.cache.lookup(trace) {
            return compiled;
        }

        let code = &self.program.traces[trace];
        let version = self.cache.next_version(trace);
        let compiled = cache::instrument(
            &mut *tool,
            code,
            &self.subscriptions,
            &self.global_ref(tid),
            version,
        );
        let calls = compiled.num_calls();
        self.stats.instrumented(calls);

        tracing::debug!(
            "[tid {}] instrumented trace {:#x} (version {}, {} blocks, {} calls)",
            tid,
            code.address(),
            version,
            code.blocks().len(),
            calls,
        );

        self.cache.install(trace, compiled)
    }

    pub fn invalidate(&self, trace: usize, tid: Tid) {
        // Take the analysis lock so invalidation never interleaves with an
        // instrumentation of the same trace.
        let _tool = self.tool.lock();
        if self.cache.invalidate(trace) {
            self.stats.invalidated();
            tracing::debug!(
                "[tid {}] invalidated trace {:#x}",
                tid,
                self.program.traces[trace].address()
            );
        }
    }
}

/// Represents a running guest.
pub struct Engine<G> {
    /// Name of the guest image.
    name: String,

    /// Number of guest threads.
    threads: usize,

    // Future driving the guest threads to completion.
    runner: BoxFuture<'static, Result<(ExitStatus, EngineStats), Error>>,

    // A reference to the global state.
    gref: Arc<G>,
}

impl<G> Engine<G> {
    /// Returns the name of the guest image.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of guest threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Waits for the guest to exit and returns its exit status and global
    /// state.
    pub async fn wait(self) -> Result<(ExitStatus, G), Error> {
        let (status, global_state, _) = self.wait_with_stats().await?;
        Ok((status, global_state))
    }

    /// Like [`Engine::wait`], but also returns what the engine did.
    pub async fn wait_with_stats(self) -> Result<(ExitStatus, G, EngineStats), Error> {
        let (status, stats) = self.runner.await?;

        let g = Arc::try_unwrap(self.gref).unwrap_or_else(|_| {
            panic!("inscount internal invariant broken. Arc::try_unwrap on global state failed.")
        });

        Ok((status, g, stats))
    }
}

/// A builder for spawning an engine.
pub struct EngineBuilder<T: Tool + 'static> {
    /// The guest to run.
    image: GuestImage,

    /// The global state static config.
    config: Option<<T::GlobalState as GlobalTool>::Config>,

    /// The exit hook.
    fini: Option<FiniFn<T::GlobalState>>,
}

impl<T: Tool + 'static> EngineBuilder<T> {
    /// Creates the builder with the given guest image.
    pub fn new(image: GuestImage) -> Self {
        Self {
            image,
            config: None,
            fini: None,
        }
    }

    /// Sets the static configuration that will be made available to the tool.
    pub fn config(mut self, config: <T::GlobalState as GlobalTool>::Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers a function to run exactly once when the guest has
    /// terminated. It receives the guest's exit status and the final global
    /// state, after every thread's state has been retired. An error from the
    /// hook becomes the error of [`Engine::wait`].
    pub fn on_fini<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ExitStatus, &T::GlobalState) -> Result<(), inscount::Error> + Send + 'static,
    {
        self.fini = Some(Box::new(f));
        self
    }

    /// Validates the image and starts every guest thread.
    pub async fn spawn(self) -> Result<Engine<T::GlobalState>, Error> {
        let program = Program::load(self.image)?;
        let config = self.config.unwrap_or_default();

        // This engine is CENTRALIZED: all of the tool's state lives here in a
        // single address space.
        let global_state = <T::GlobalState as GlobalTool>::init_global_state(&config);
        let subscriptions = T::subscriptions(&config);
        let tool = T::new(&config);
        let gref = Arc::new(global_state);

        let name = program.name.clone();
        let threads = program.threads.len();
        let status = ExitStatus::from(program.exit_code);

        tracing::info!(
            "starting guest {:?}: {} traces, {} threads, {:?}",
            name,
            program.traces.len(),
            threads,
            subscriptions,
        );

        let cache = CodeCache::new(program.traces.len());
        let shared = Arc::new(Shared {
            program,
            config,
            global_state: gref.clone(),
            tool: Mutex::new(tool),
            cache,
            subscriptions,
            stats: StatsCounters::default(),
        });

        let handles: Vec<_> = (0..threads)
            .map(|index| {
                let shared = shared.clone();
                let tid = Tid::from_raw(index as u32 + 1);
                let handle = tokio::task::spawn_blocking(move || {
                    thread::run_guest_thread(&shared, index, tid, status)
                });
                handle.map(move |joined| joined.unwrap_or_else(|_| Err(Error::GuestThread(tid))))
            })
            .collect();

        let fini = self.fini;
        let runner = async move {
            let results = future::join_all(handles).await;
            for result in results {
                result.map_err(|err| {
                    tracing::error!("guest failed, skipping the exit hook: {}", err);
                    err
                })?;
            }

            let stats = shared.stats.snapshot();
            tracing::debug!("guest exited with {:?}: {:?}", status, stats);

            // Every thread has exited; nothing can fire anymore. The hook may
            // block (e.g., writing a report), so it gets its own thread.
            if let Some(fini) = fini {
                let hook = tokio::task::spawn_blocking(move || fini(status, &shared.global_state));
                let result = match hook.await {
                    Ok(result) => result.map_err(Error::from),
                    Err(_) => Err(Error::ExitHook),
                };
                result.map_err(|err| {
                    tracing::error!("exit hook failed: {}", err);
                    err
                })?;
            }

            Ok((status, stats))
        }
        .boxed();

        Ok(Engine {
            name,
            threads,
            runner,
            gref,
        })
    }
}
