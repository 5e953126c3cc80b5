#![allow(clippy::missing_errors_doc)]

pub mod options;
pub mod parser;
pub mod sim;
pub mod stats;

pub use stats::{CycleStats, LogStats};

use std::path::PathBuf;

/// Environment variable pointing directly at the simulator executable.
pub const SCALE_BIN_ENV: &str = "SCALE_BIN";
/// Environment variable pointing at the checkout containing the `scale` executable.
pub const ROOT_ENV: &str = "CADOSys_ROOT";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Fs(#[from] utils::fs::Error),

    #[error("neither SCALE_BIN nor CADOSys_ROOT is set")]
    NotLocated,

    #[error("simulator executable {0:?} not found")]
    MissingExecutable(PathBuf),

    #[error("input {0:?} not found")]
    MissingInput(PathBuf),

    #[error("simulation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error(transparent)]
    Command(#[from] utils::CommandError),
}

impl Error {
    pub fn into_eyre(self) -> color_eyre::Report {
        use color_eyre::{eyre, Help};
        match self {
            Error::Command(err) => err.into_eyre(),
            err @ (Error::NotLocated | Error::MissingExecutable(_)) => eyre::Report::from(err)
                .with_suggestion(|| {
                    format!("point {SCALE_BIN_ENV} at the simulator or {ROOT_ENV} at its checkout")
                }),
            err => err.into(),
        }
    }
}

/// Locate the simulator executable.
///
/// `SCALE_BIN` takes precedence over `$CADOSys_ROOT/scale`.
pub fn locate() -> Result<PathBuf, Error> {
    if let Some(bin) = std::env::var_os(SCALE_BIN_ENV) {
        return Ok(PathBuf::from(bin));
    }
    let root = std::env::var_os(ROOT_ENV).ok_or(Error::NotLocated)?;
    Ok(PathBuf::from(root).join("scale"))
}
