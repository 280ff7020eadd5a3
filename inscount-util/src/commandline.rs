/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Common support for building the CLI interface to each tool. Each tool is a
//! standalone executable, and thus needs its own CLI.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

// Arguments that are shared by most tools, including which guest to run.
// Using Clap, this is designed to be set from CLI args, or to be extended by
// the tool to form CLI args.
#[allow(missing_docs)]
#[derive(Debug, Clone, Parser)]
pub struct CommonToolArguments {
    /// Direct logging to a file.  This can also be set with the RUST_LOG_FILE environment
    /// variable, but the CLI flag takes precedence.
    #[clap(long = "log-file", value_name = "PATH", env = "RUST_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Path of the guest image to run.
    #[clap(value_name = "PROGRAM")]
    pub program: String,

    /// Arguments of the benchmark, recorded along with the program. Use `--`
    /// before the first one if it starts with a hyphen.
    #[clap(value_name = "ARGS", trailing_var_arg = true)]
    pub program_args: Vec<String>,
}

impl CommonToolArguments {
    /// Create a new configuration to run the given program.
    pub fn new<S: Into<String>>(prog: S) -> CommonToolArguments {
        CommonToolArguments {
            log_file: None,
            program: prog.into(),
            program_args: Vec::new(),
        }
    }

    /// Add an argument, similar to Command::arg.
    pub fn arg<S: Into<String>>(&mut self, s: S) -> &mut CommonToolArguments {
        self.program_args.push(s.into());
        self
    }

    /// The benchmark command line: the program followed by its arguments.
    pub fn command_line(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str())
            .chain(self.program_args.iter().map(String::as_str))
    }

    /// Installs the global tracing subscriber. Logs go to the log file if one
    /// was given, and to stderr otherwise. The returned guard must be kept
    /// alive until exit so buffered file logs are flushed.
    pub fn init_tracing(&self) -> Option<WorkerGuard> {
        self.log_file
            .as_ref()
            .and_then(|lf| {
                let parent = lf.parent()?;
                let filename = available_log_name(parent, lf.file_name()?.to_os_string())?;

                let file_writer = tracing_appender::rolling::never(parent, &filename);
                let (file_writer, guard) = tracing_appender::non_blocking(file_writer);

                eprintln!(" [inscount] Logging to file at {:?}", parent.join(&filename));
                set_subscriber_with_writer(file_writer);
                Some(guard)
            })
            .or_else(|| {
                set_subscriber_with_writer(io::stderr);
                None
            })
    }
}

/// Installs a fmt subscriber writing to `writer` as the global default.
/// Returns false, with a warning, if one was already installed.
fn set_subscriber_with_writer<T>(writer: T) -> bool
where
    T: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .finish();

    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => true,
        Err(err) => {
            eprintln!(" [inscount] WARNING: logging is not set up: {}", err);
            false
        }
    }
}

/// Picks a log file name in `parent` that does not exist yet, appending a
/// timestamp to `orig_filename` if needed.
fn available_log_name(parent: &Path, orig_filename: OsString) -> Option<OsString> {
    let mut filename = orig_filename.clone();

    for _ in 0..100 {
        if parent.join(&filename).exists() {
            filename = orig_filename.clone();
            filename.push(format!("{}", Local::now().format(".%Y%m%d.%H%M%S.%f")));
        } else {
            return Some(filename);
        }
    }

    eprintln!(" [inscount] WARNING: could not open log file, falling back to stderr");
    None
}
