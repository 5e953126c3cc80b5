use color_eyre::eyre::{self, WrapErr};
use std::path::{Path, PathBuf};

/// Workload directories directly below `root`, sorted by name.
pub fn workload_dirs(root: &Path) -> eyre::Result<Vec<String>> {
    let entries = std::fs::read_dir(root)
        .wrap_err_with(|| format!("failed to read directory {}", root.display()))?;
    let mut workloads = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "__pycache__" {
            continue;
        }
        workloads.push(name);
    }
    workloads.sort();
    Ok(workloads)
}

/// Copy the run scripts of workload `source` into every other workload directory.
///
/// Every occurrence of the source name in the script and its file name is
/// replaced with the target workload. Returns the written scripts; an unknown
/// source workload writes nothing.
pub fn replicate(root: &Path, source: &str) -> eyre::Result<Vec<PathBuf>> {
    let workloads = workload_dirs(root)?;
    if !workloads.iter().any(|workload| workload == source) {
        log::warn!("no workload directory {source} in {}", root.display());
        return Ok(Vec::new());
    }

    let scripts = utils::fs::files_with_extension(root.join(source), "sh")?;
    let mut written = Vec::new();
    for script in &scripts {
        let content = std::fs::read_to_string(script)
            .wrap_err_with(|| format!("failed to read {}", script.display()))?;
        let relative = script.strip_prefix(root)?.to_string_lossy().to_string();

        for target in workloads.iter().filter(|workload| *workload != source) {
            let dest = root.join(relative.replace(source, target));
            std::fs::write(&dest, content.replace(source, target))
                .wrap_err_with(|| format!("failed to write {}", dest.display()))?;
            utils::fs::set_executable(&dest)?;
            log::info!("{} -> {}", script.display(), dest.display());
            written.push(dest);
        }
    }
    Ok(written)
}
