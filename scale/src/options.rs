use clap::Parser;
use color_eyre::eyre;
use std::path::PathBuf;
use std::time::Duration;

pub fn parse_duration_string(duration: &str) -> eyre::Result<Duration> {
    let res = duration_string::DurationString::from_string(duration.into())
        .map_err(|_| eyre::eyre!("invalid duration string {}", duration))?;
    Ok(res.into())
}

#[derive(Parser, Debug)]
pub struct Options {
    #[clap(help = "topology csv with per-layer dataflow")]
    pub topology: PathBuf,

    #[clap(help = "simulator config file")]
    pub config: PathBuf,

    #[clap(long = "scale", help = "simulator executable (default: located from env)")]
    pub scale_bin: Option<PathBuf>,

    #[clap(long = "log-file", help = "write simulation output to log file")]
    pub log_file: Option<PathBuf>,

    #[clap(long = "stats-file", help = "write parsed cycle stats as json")]
    pub stats_file: Option<PathBuf>,

    #[clap(
        long = "timeout",
        help = "timeout",
        value_parser = parse_duration_string,
    )]
    pub timeout: Option<Duration>,
}

impl Options {
    /// Log file path, defaulting to the topology path with a `.log` extension.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.topology.with_extension("log"))
    }
}

#[derive(Parser, Debug)]
pub struct ParseOptions {
    #[clap(help = "simulator log file")]
    pub log_file: PathBuf,

    #[clap(long = "strict", help = "fail on malformed counter lines")]
    pub strict: bool,

    #[clap(long = "per-layer", help = "print per-layer cycles")]
    pub per_layer: bool,
}
