//! Concurrent simulator runs over a directory of topologies.

use color_eyre::eyre::{self, WrapErr};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Job {
    pub topology: PathBuf,
    pub log: PathBuf,
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = self
            .topology
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        write!(f, "{name}")
    }
}

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("simulation skipped")]
    Skipped,
    #[error("simulation canceled")]
    Canceled,
    #[error(transparent)]
    Failed(#[from] eyre::Report),
}

#[derive(Debug, Clone)]
pub struct Options {
    pub scale_bin: PathBuf,
    pub config: PathBuf,
    pub timeout: Option<Duration>,
    pub concurrency: usize,
    pub force: bool,
    pub fail_fast: bool,
}

/// One job per topology in `topologies`, logging to the same name in `out_dir`.
pub fn jobs(topologies: &Path, out_dir: &Path) -> eyre::Result<Vec<Job>> {
    let topologies = utils::fs::files_with_extension(topologies, "csv")?;
    let jobs = topologies
        .into_iter()
        .filter_map(|topology| {
            let name = topology.file_stem()?.to_os_string();
            let log = out_dir.join(name).with_extension("log");
            Some(Job { topology, log })
        })
        .collect();
    Ok(jobs)
}

/// Simulate a single topology and write the simulator output to its log.
pub async fn run_job(job: &Job, options: &Options) -> Result<Duration, RunError> {
    if !options.force && job.log.is_file() {
        return Err(RunError::Skipped);
    }
    let (output, duration) =
        scale::sim::simulate(&options.scale_bin, &job.topology, &options.config, options.timeout)
            .await
            .map_err(scale::Error::into_eyre)?;

    if let Some(parent) = job.log.parent() {
        utils::fs::create_dirs(parent).map_err(eyre::Report::from)?;
    }
    std::fs::write(&job.log, &output.stdout)
        .wrap_err_with(|| format!("failed to write log {}", job.log.display()))?;
    Ok(duration)
}

/// Run all `jobs` with bounded concurrency.
///
/// With `fail_fast`, jobs that have not started when one fails are canceled.
pub async fn run_all(
    jobs: Vec<Job>,
    options: &Options,
    bar: &ProgressBar,
) -> Vec<(Job, Result<Duration, RunError>)> {
    let should_exit = Arc::new(AtomicBool::new(false));
    stream::iter(jobs)
        .map(|job| {
            let should_exit = should_exit.clone();
            async move {
                if should_exit.load(Ordering::Relaxed) {
                    return (job, Err(RunError::Canceled));
                }
                bar.set_message(job.to_string());
                let res = run_job(&job, options).await;
                bar.inc(1);
                if options.fail_fast && matches!(res, Err(RunError::Failed(_))) {
                    should_exit.store(true, Ordering::Relaxed);
                }
                (job, res)
            }
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::{jobs, run_all, Options, RunError};
    use color_eyre::eyre;
    use similar_asserts as diff;
    use std::path::PathBuf;

    #[test]
    fn test_jobs_per_topology() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["alexnet_osws.csv", "alexnet_wsws.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "")?;
        }
        let out = dir.path().join("output");
        let jobs = jobs(dir.path(), &out)?;
        let logs: Vec<_> = jobs.iter().map(|job| job.log.clone()).collect();
        diff::assert_eq!(
            have: logs,
            want: vec![out.join("alexnet_osws.log"), out.join("alexnet_wsws.log")]
        );
        diff::assert_eq!(have: jobs[0].to_string(), want: "alexnet_osws");
        Ok(())
    }

    #[tokio::test]
    async fn test_existing_logs_are_skipped() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("a.csv"), "")?;
        std::fs::write(dir.path().join("a.log"), "done")?;
        let jobs = jobs(dir.path(), dir.path())?;

        let options = Options {
            scale_bin: PathBuf::from("/definitely/not/a/scale"),
            config: dir.path().join("scale.cfg"),
            timeout: None,
            concurrency: 2,
            force: false,
            fail_fast: false,
        };
        let bar = indicatif::ProgressBar::hidden();
        let results = run_all(jobs.clone(), &options, &bar).await;
        assert!(matches!(results[0].1, Err(RunError::Skipped)));

        let forced = Options { force: true, ..options };
        let results = run_all(jobs, &forced, &bar).await;
        assert!(matches!(results[0].1, Err(RunError::Failed(_))));
        Ok(())
    }
}
