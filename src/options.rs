use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use scale::options::parse_duration_string;

/// Inputs of a single planning point.
#[derive(Parser, Debug, Clone)]
pub struct Inputs {
    #[clap(short = 'i', long = "input", help = "workload topology csv")]
    pub workload: PathBuf,

    #[clap(short = 's', long = "shape", help = "operand shape csv of the workload")]
    pub shape: PathBuf,

    #[clap(short = 'c', long = "cfg", help = "simulator config")]
    pub config: PathBuf,

    #[clap(long = "num-pe", help = "PE count written to the tables", default_value = "1")]
    pub num_pe: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct Select {
    #[clap(flatten)]
    pub inputs: Inputs,

    #[clap(long = "json", help = "print decisions as json")]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Plan {
    #[clap(flatten)]
    pub inputs: Inputs,

    #[clap(short = 'o', long = "output-cado", help = "cache-aware topology output")]
    pub cado: PathBuf,

    #[clap(short = 'p', long = "output-comp", help = "compute-optimal topology output")]
    pub comp: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct Experiment {
    #[clap(short = 'e', long = "experiment", help = "experiment yaml (default: built-in)")]
    pub experiment: Option<PathBuf>,

    #[clap(long = "root", help = "base directory of relative paths (default: cwd)")]
    pub root: Option<PathBuf>,

    #[clap(long = "fail-fast", help = "stop at the first failing point")]
    pub fail_fast: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct BruteForce {
    #[clap(flatten)]
    pub inputs: Inputs,

    #[clap(short = 'o', long = "out-dir", help = "output directory")]
    pub out_dir: PathBuf,

    #[clap(long = "prefix", help = "file name prefix", default_value = "")]
    pub prefix: String,
}

#[derive(Parser, Debug, Clone)]
pub struct GenerateConfigs {
    #[clap(short = 'c', long = "base", help = "base simulator config")]
    pub base: PathBuf,

    #[clap(short = 'w', long = "workload", help = "workload name used in run names")]
    pub workload: String,

    #[clap(short = 'o', long = "out-dir", help = "output directory")]
    pub out_dir: PathBuf,

    #[clap(long = "sweeps", help = "sweeps yaml (default: built-in)")]
    pub sweeps: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct Simulate {
    #[clap(short = 'i', long = "input", help = "directory of topology csv files")]
    pub topologies: PathBuf,

    #[clap(short = 'c', long = "cfg", help = "simulator config")]
    pub config: PathBuf,

    #[clap(short = 'o', long = "out-dir", help = "log output directory")]
    pub out_dir: PathBuf,

    #[clap(long = "scale", help = "simulator executable (default: located from env)")]
    pub scale_bin: Option<PathBuf>,

    #[clap(
        long = "timeout",
        help = "timeout per simulation",
        value_parser = parse_duration_string,
    )]
    pub timeout: Option<Duration>,

    #[clap(short = 'j', long = "concurrency", help = "concurrent simulations")]
    pub concurrency: Option<usize>,

    #[clap(short = 'f', long = "force", help = "re-run existing logs")]
    pub force: bool,

    #[clap(long = "fail-fast", help = "fail fast")]
    pub fail_fast: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Best {
    #[clap(help = "log files or glob patterns")]
    pub logs: Vec<String>,

    #[clap(long = "contains", help = "only consider file names containing this")]
    pub contains: Option<String>,

    #[clap(long = "strict", help = "fail on malformed counter lines")]
    pub strict: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Report {
    #[clap(short = 'i', long = "input", help = "directory with one log directory per workload")]
    pub input: PathBuf,

    #[clap(short = 'o', long = "output", help = "output file prefix", default_value = "cado")]
    pub output: PathBuf,

    #[clap(long = "reports", help = "report parameters yaml (default: built-in)")]
    pub reports: Option<PathBuf>,

    #[clap(long = "no-plots", help = "only write csv tables")]
    pub no_plots: bool,

    #[clap(long = "strict", help = "fail on malformed counter lines")]
    pub strict: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Replicate {
    #[clap(short = 'c', long = "copy", help = "workload to copy from", default_value = "resnet18")]
    pub source: String,

    #[clap(long = "root", help = "directory of workload directories (default: cwd)")]
    pub root: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub enum Command {
    /// Print the dataflow decisions of every layer.
    Select(Select),
    /// Write the COMP and CADO topologies of a workload.
    Plan(Plan),
    /// Plan every point of an experiment.
    Experiment(Experiment),
    /// Write a topology for every dataflow assignment of the conv layers.
    BruteForce(BruteForce),
    /// Generate simulator configs for the configured sweeps.
    GenerateConfigs(GenerateConfigs),
    /// Simulate every topology of a directory.
    Simulate(Simulate),
    /// Find the log with the fewest total cycles.
    Best(Best),
    /// Write speedup reports and plots.
    Report(Report),
    /// Copy run scripts of one workload to all others.
    Replicate(Replicate),
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Select(_) => "select",
                Self::Plan(_) => "plan",
                Self::Experiment(_) => "experiment",
                Self::BruteForce(_) => "brute-force",
                Self::GenerateConfigs(_) => "generate-configs",
                Self::Simulate(_) => "simulate",
                Self::Best(_) => "best",
                Self::Report(_) => "report",
                Self::Replicate(_) => "replicate",
            }
        )
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(about = "dataflow selection and experiment tooling for systolic arrays")]
pub struct Options {
    #[clap(long = "no-progress", help = "hide progress bar")]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Command,
}
