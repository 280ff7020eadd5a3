/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Runs a guest under the counting tool and writes the benchmark report.

use std::path::PathBuf;

use anyhow::Context;
use chrono::Local;
use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use inscount_engine::EngineBuilder;
use inscount_engine::GuestImage;
use inscount_tool::Config;
use inscount_tool::InputEcho;
use inscount_tool::InsCount;
use inscount_tool::Report;
use inscount_tool::Reporter;
use inscount_tool::DEFAULT_OUTPUT;
use inscount_util::CommonToolArguments;

const ABOUT: &str = "Performs basic benchmarking for input programs";

/// Performs basic benchmarking for input programs.
#[derive(Debug, Parser)]
#[clap(name = "inscount")]
struct Opts {
    /// Where to write the report.
    #[clap(short = 'o', value_name = "PATH", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Also report how many instrumented instructions were visited.
    #[clap(long)]
    instruction_visits: bool,

    #[clap(flatten)]
    common: CommonToolArguments,
}

impl Opts {
    fn parse_or_usage() -> Self {
        match Opts::try_parse() {
            Ok(opts) => opts,
            Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                err.exit()
            }
            Err(err) => {
                eprintln!("{}", ABOUT);
                eprintln!("{}", err.render());
                eprintln!("{}", Opts::command().render_help());
                std::process::exit(-1)
            }
        }
    }

    fn config(&self) -> Config {
        Config {
            instruction_visits: self.instruction_visits,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Opts::parse_or_usage();
    let log_guard = opts.common.init_tracing();

    // A bad image must not clobber the report of a previous run.
    let image = GuestImage::from_path(&opts.common.program)?;
    image.validate()?;
    let reporter = Reporter::create(&opts.output)
        .with_context(|| format!("cannot create report file {}", opts.output.display()))?;
    let benchmark = InputEcho::from_command(opts.common.command_line());

    let engine = EngineBuilder::<InsCount>::new(image)
        .config(opts.config())
        .on_fini(move |_status, counters| {
            let report = Report::new(&Local::now(), benchmark, counters.stats());
            tracing::debug!("{} threads merged: {:?}", counters.exited_threads(), report.stats());
            reporter.finish(&report).map_err(|err| {
                tracing::error!("cannot write report: {}", err);
                inscount::Error::from(err)
            })
        })
        .spawn()
        .await?;

    let (status, _counters) = engine.wait().await?;
    drop(log_guard); // Flush logs before exiting.
    status.raise_or_exit()
}
