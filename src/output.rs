use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CleanResult, ProgressEvent, ProgressSink, RunReport};
use crate::plan::FetchTask;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_plan(tasks: &[FetchTask]) -> io::Result<()> {
        Self::print_json(&tasks)
    }

    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_clean(result: &CleanResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
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

/// Forwards progress to the `tracing` subscriber.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::info!(latency_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None if event.message.starts_with("phase=Error") => {
                tracing::warn!("{}", event.message)
            }
            None if event.message.starts_with("phase=Resolve") => {
                tracing::debug!("{}", event.message)
            }
            None => tracing::info!("{}", event.message),
        }
    }
}
