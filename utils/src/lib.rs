#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod fs;

use std::process::Output;

/// A subprocess that exited unsuccessfully.
#[derive(thiserror::Error)]
#[error("command {command} failed with exit code {:?}", .output.status.code())]
pub struct CommandError {
    pub command: String,
    pub output: Output,
}

impl std::fmt::Debug for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandError")
            .field("command", &self.command)
            .field("status", &self.output.status)
            .field("stdout", &String::from_utf8_lossy(&self.output.stdout))
            .field("stderr", &String::from_utf8_lossy(&self.output.stderr))
            .finish()
    }
}

impl CommandError {
    pub fn new(command: &impl std::fmt::Debug, output: Output) -> Self {
        Self {
            command: format!("{command:?}"),
            output,
        }
    }

    #[must_use]
    pub fn stdout(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output.stdout)
    }

    #[must_use]
    pub fn stderr(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output.stderr)
    }

    /// Convert into a report that carries the captured output as sections.
    pub fn into_eyre(self) -> color_eyre::Report {
        use color_eyre::{Section, SectionExt};
        let stdout = self.stdout().trim().to_string();
        let stderr = self.stderr().trim().to_string();
        color_eyre::Report::from(self)
            .with_section(move || stdout.header("stdout:"))
            .with_section(move || stderr.header("stderr:"))
    }
}

/// Split results into successes and failures, keeping their order.
pub fn partition_results<T, E, I>(results: I) -> (Vec<T>, Vec<E>)
where
    I: IntoIterator<Item = Result<T, E>>,
{
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for result in results {
        match result {
            Ok(value) => succeeded.push(value),
            Err(err) => failed.push(err),
        }
    }
    (succeeded, failed)
}
