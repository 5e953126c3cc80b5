use super::Error;
use async_process::Command;
use std::path::Path;
use std::time::{Duration, Instant};

fn canonical_input(path: &Path) -> Result<std::path::PathBuf, Error> {
    path.canonicalize()
        .map_err(|_| Error::MissingInput(path.to_path_buf()))
}

/// Build the simulator invocation for a topology and a config file.
pub fn command(scale_bin: &Path, topology: &Path, config: &Path) -> Result<Command, Error> {
    let scale_bin = scale_bin
        .canonicalize()
        .map_err(|_| Error::MissingExecutable(scale_bin.to_path_buf()))?;
    let topology = canonical_input(topology)?;
    let config = canonical_input(config)?;

    let mut cmd = Command::new(scale_bin);
    cmd.arg(topology).arg(config);
    cmd.kill_on_drop(true);
    Ok(cmd)
}

/// Simulate a topology with the given config.
///
/// Returns the captured output and the wall time of the run.
pub async fn simulate(
    scale_bin: impl AsRef<Path>,
    topology: impl AsRef<Path>,
    config: impl AsRef<Path>,
    timeout: Option<Duration>,
) -> Result<(async_process::Output, Duration), Error> {
    let mut cmd = command(scale_bin.as_ref(), topology.as_ref(), config.as_ref())?;
    log::debug!("command: {:?}", &cmd);

    let start = Instant::now();
    let result = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(timeout))?,
        None => cmd.output().await,
    };
    let result = result?;
    let dur = start.elapsed();

    if !result.status.success() {
        return Err(Error::Command(utils::CommandError::new(&cmd, result)));
    }
    Ok((result, dur))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    #[test]
    fn missing_executable_is_reported() {
        let err = super::command(
            Path::new("/definitely/not/a/scale"),
            Path::new("topology.csv"),
            Path::new("scale.cfg"),
        )
        .err();
        assert!(matches!(err, Some(super::Error::MissingExecutable(_))));
    }
}
