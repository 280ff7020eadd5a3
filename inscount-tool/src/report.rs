/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The benchmark report.

use std::fmt;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::TimeZone;

use crate::counters::Stats;
use crate::inputs::InputEcho;

/// Where the report goes when no `-o` is given.
pub const DEFAULT_OUTPUT: &str = "inscount.out";

/// Formats `time` like `Tue Mar  5 09:07:02 2024`.
pub fn timestamp<Tz>(time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    time.format("%a %b %e %T %Y").to_string()
}

/// Everything the report shows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Report {
    time: String,
    benchmark: InputEcho,
    stats: Stats,
}

impl Report {
    /// Creates a report taken at `time`.
    pub fn new<Tz>(time: &DateTime<Tz>, benchmark: InputEcho, stats: Stats) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Report {
            time: timestamp(time),
            benchmark,
            stats,
        }
    }

    /// The counters this report shows.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "// Benchmark Characteristics")?;
        writeln!(f, "// Time: {}", self.time)?;
        writeln!(f, "// Benchmark: {}", self.benchmark)?;
        writeln!(f)?;
        writeln!(f, "// Program Stats")?;
        writeln!(f, "Basic Blocks: {}", self.stats.basic_blocks)?;
        writeln!(f, "Memory Reads: {}", self.stats.memory_reads)?;
        writeln!(f, "Memory Writes: {}", self.stats.memory_writes)?;
        writeln!(f, "Total Instructions: {}", self.stats.total_instructions)?;
        if let Some(visits) = self.stats.instruction_visits {
            writeln!(f, "Instruction Visits: {}", visits)?;
        }
        Ok(())
    }
}

/// The report file. It is created when the tool starts, so a bad path fails
/// before the guest runs, and written exactly once when the guest exits.
#[derive(Debug)]
pub struct Reporter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Reporter {
    /// Creates (or truncates) the report file.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let out = BufWriter::new(File::create(&path)?);
        Ok(Reporter { path, out })
    }

    /// Path of the report file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `report` and closes the file.
    pub fn finish(mut self, report: &Report) -> io::Result<()> {
        write!(self.out, "{}", report)?;
        let file = self.out.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()?;
        tracing::info!("report written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;
    use chrono::Utc;

    use super::*;

    fn stats() -> Stats {
        Stats {
            basic_blocks: 3,
            memory_reads: 1,
            memory_writes: 1,
            total_instructions: 6,
            instruction_visits: None,
        }
    }

    fn time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 9, 7, 2).unwrap()
    }

    #[test]
    fn time_format() {
        assert_eq!(timestamp(&time()), "Tue Mar  5 09:07:02 2024");

        let later = Utc.with_ymd_and_hms(2023, 11, 17, 23, 59, 59).unwrap();
        assert_eq!(timestamp(&later), "Fri Nov 17 23:59:59 2023");

        // Local time of the given offset, not UTC.
        let offset = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            timestamp(&time().with_timezone(&offset)),
            "Tue Mar  5 10:07:02 2024"
        );
    }

    #[test]
    fn format() {
        let report = Report::new(
            &time(),
            InputEcho::from_command(["./bench", "-n", "3"]),
            stats(),
        );

        assert_eq!(
            report.to_string(),
            "// Benchmark Characteristics\n\
             // Time: Tue Mar  5 09:07:02 2024\n\
             // Benchmark: ./bench -n 3 \n\
             \n\
             // Program Stats\n\
             Basic Blocks: 3\n\
             Memory Reads: 1\n\
             Memory Writes: 1\n\
             Total Instructions: 6\n"
        );
    }

    #[test]
    fn instruction_visits_line() {
        let report = Report::new(
            &time(),
            InputEcho::from_command(["./bench"]),
            Stats {
                instruction_visits: Some(6),
                ..stats()
            },
        );

        let text = report.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[8], "Total Instructions: 6");
        assert_eq!(lines[9], "Instruction Visits: 6");
    }

    #[test]
    fn writes_once_and_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inscount.out");

        let reporter = Reporter::create(&path).unwrap();
        assert_eq!(reporter.path(), path);
        // Created up front, empty until the guest exits.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        let report = Report::new(&time(), InputEcho::from_command(["./bench"]), stats());
        reporter.finish(&report).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), report.to_string());
    }

    #[test]
    fn truncates_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "stale contents that are longer than the report\n".repeat(20))
            .unwrap();

        let report = Report::new(&time(), InputEcho::default(), stats());
        Reporter::create(file.path())
            .unwrap()
            .finish(&report)
            .unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("// Benchmark Characteristics\n"));
        assert!(text.contains("// Benchmark: \n"));
        assert!(!text.contains("stale"));
    }

    #[test]
    fn bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Reporter::create(dir.path().join("missing").join("inscount.out")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
