use std::io::{self, Write};

use serde::Serialize;

use crate::fetch::FetchReport;
use crate::tabulate::ProcessSummary;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Console,
    Json,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

/// Injected observer for per-item progress, so the pipelines stay free of
/// console side effects and testable without capturing stdout.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Prints each event as it happens, one line per item, to stderr.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        eprintln!("{}", event.message);
    }
}

/// Silent during the run; prints a machine-readable summary at the end.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(report: &FetchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_process(summary: &ProcessSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
