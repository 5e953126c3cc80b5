//! Speedup reports over simulator logs.
//!
//! Logs are named `{workload}_{llc}_{pe}_{batch}_{variant}.log` and live in
//! one directory per workload. Every report compares the `cado` variant of a
//! point against its `comp` baseline.

use color_eyre::eyre::{self, WrapErr};
use indexmap::IndexMap;
use scale::LogStats;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const BASELINE: &str = "comp";
pub const CADO: &str = "cado";
pub const GEO_MEAN: &str = "GEO-MEAN";

/// A point of the log index, ordered by PE count, batch, workload, LLC and variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogKey {
    pub num_pe: u64,
    pub num_batch: u64,
    pub workload: String,
    pub llc: u64,
    pub variant: String,
}

impl LogKey {
    /// Parse a log file name, ignoring names that do not have five parts.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".log")?;
        let parts: Vec<&str> = stem.split('_').collect();
        let [workload, llc, num_pe, num_batch, variant] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            workload: (*workload).to_string(),
            llc: llc.parse().ok()?,
            num_pe: num_pe.parse().ok()?,
            num_batch: num_batch.parse().ok()?,
            variant: (*variant).to_string(),
        })
    }
}

/// Simulator logs by point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogIndex {
    pub logs: BTreeMap<LogKey, PathBuf>,
}

impl LogIndex {
    /// Index the logs of every workload directory below `root`.
    pub fn from_dir(root: &Path, workloads: &[String]) -> eyre::Result<Self> {
        let mut index = Self::default();
        for workload in workloads {
            let dir = root.join(workload);
            if !dir.is_dir() {
                log::warn!("no log directory for {workload} at {}", dir.display());
                continue;
            }
            for path in utils::fs::files_with_extension(&dir, "log")? {
                index.insert(path);
            }
        }
        Ok(index)
    }

    /// Add a log, returning false if its name does not describe a point.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        let key = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(LogKey::from_file_name);
        match key {
            Some(key) => {
                self.logs.insert(key, path);
                true
            }
            None => {
                log::debug!("ignoring {}", path.display());
                false
            }
        }
    }

    #[must_use]
    pub fn get(&self, point: &Point, workload: &str, variant: &str) -> Option<&Path> {
        let key = LogKey {
            num_pe: point.num_pe,
            num_batch: point.num_batch,
            workload: workload.to_string(),
            llc: point.llc,
            variant: variant.to_string(),
        };
        self.logs.get(&key).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

/// Hardware point shared by the workloads of a report group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub llc: u64,
    pub num_pe: u64,
    pub num_batch: u64,
}

/// Label of a report group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    /// LLC size in KB, or the associativity exponent for small values.
    Llc(u64),
    Batch(u64),
    Pe(u64),
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Llc(llc) if *llc > 128 => write!(f, "{llc}KB LLC"),
            Self::Llc(assoc) => match u32::try_from(*assoc).ok().and_then(|a| 2u64.checked_pow(a)) {
                Some(ways) => write!(f, "{ways}-Way LLC"),
                None => write!(f, "2^{assoc}-Way LLC"),
            },
            Self::Batch(batch) => write!(f, "batch_size = {batch}"),
            Self::Pe(pe) => write!(f, "{pe}x{pe} PEs"),
        }
    }
}

/// Speedup of `cado` over `comp`, or `None` if the cado run has no cycles.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn speedup(comp: &LogStats, cado: &LogStats) -> Option<f64> {
    let cado = cado.total_cycles();
    if cado == 0 {
        return None;
    }
    Some(comp.total_cycles() as f64 / cado as f64)
}

/// Geometric mean, `NaN` for no values.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn geo_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    (log_sum / values.len() as f64).exp()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub group: String,
    pub label: String,
    pub value: f64,
}

/// Rows of a report table, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub rows: Vec<Row>,
}

impl Report {
    pub fn push(&mut self, group: impl ToString, label: impl ToString, value: f64) {
        self.rows.push(Row {
            group: group.to_string(),
            label: label.to_string(),
            value,
        });
    }

    /// Rows grouped by their group label, in first appearance order.
    #[must_use]
    pub fn groups(&self) -> IndexMap<&str, Vec<(&str, f64)>> {
        let mut groups: IndexMap<&str, Vec<(&str, f64)>> = IndexMap::new();
        for row in &self.rows {
            groups
                .entry(row.group.as_str())
                .or_default()
                .push((row.label.as_str(), row.value));
        }
        groups
    }

    pub fn write_csv(&self, writer: impl std::io::Write) -> eyre::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["group", "", "Speedups"])?;
        for row in &self.rows {
            csv_writer.write_record([&row.group, &row.label, &row.value.to_string()])?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn write_csv_to_path(&self, path: &Path) -> eyre::Result<()> {
        let writer = utils::fs::open_writable(path)?;
        self.write_csv(writer)
            .wrap_err_with(|| format!("failed to write report {}", path.display()))
    }
}

/// Parses logs on demand and remembers the result.
#[derive(Debug, Default)]
pub struct StatsCache {
    options: scale::parser::Options,
    stats: std::collections::HashMap<PathBuf, LogStats>,
}

impl StatsCache {
    #[must_use]
    pub fn new(options: scale::parser::Options) -> Self {
        Self {
            options,
            stats: std::collections::HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &Path) -> eyre::Result<&LogStats> {
        if !self.stats.contains_key(path) {
            let stats = scale::parser::parse(path, &self.options)
                .wrap_err_with(|| format!("failed to parse log {}", path.display()))?;
            self.stats.insert(path.to_path_buf(), stats);
        }
        self.stats
            .get(path)
            .ok_or_else(|| eyre::eyre!("missing stats for {}", path.display()))
    }
}

/// Speedups of every workload per group, each group closed by its geo-mean.
///
/// Returns the report and the geo-mean of every group. Workloads missing a
/// log are skipped.
pub fn group_report(
    index: &LogIndex,
    cache: &mut StatsCache,
    workloads: &[String],
    groups: &[(Group, Point)],
) -> eyre::Result<(Report, Vec<f64>)> {
    let mut report = Report::default();
    let mut geo_means = Vec::with_capacity(groups.len());
    for (group, point) in groups {
        let mut speedups = Vec::new();
        for workload in workloads {
            let (Some(comp), Some(cado)) = (
                index.get(point, workload, BASELINE),
                index.get(point, workload, CADO),
            ) else {
                log::warn!("{group}: missing {BASELINE} or {CADO} log of {workload} at {point:?}");
                continue;
            };
            let comp = cache.get(comp)?.clone();
            let cado = cache.get(cado)?;
            let value = match speedup(&comp, cado) {
                Some(value) => {
                    speedups.push(value);
                    value
                }
                None => 1.0,
            };
            log::debug!(
                "{group} {workload}: {} -> {} cycles ({value:.3}x)",
                comp.total_cycles(),
                cado.total_cycles()
            );
            report.push(group, workload, value);
        }
        let mean = geo_mean(&speedups);
        report.push(group, GEO_MEAN, mean);
        geo_means.push(mean);
    }
    Ok((report, geo_means))
}

/// Which configuration a summary varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scaling {
    Batch,
    Pe,
}

/// Summary of geo-means per LLC size across configurations.
///
/// `results` maps a batch size or PE count to the geo-mean per LLC size.
#[must_use]
pub fn summary(results: &IndexMap<u64, IndexMap<u64, f64>>, scaling: Scaling) -> Report {
    let mut by_llc: IndexMap<u64, Vec<(u64, f64)>> = IndexMap::new();
    for (&config, per_llc) in results {
        for (&llc, &value) in per_llc {
            by_llc.entry(llc).or_default().push((config, value));
        }
    }

    let mut report = Report::default();
    for (llc, values) in by_llc {
        let group = match scaling {
            Scaling::Batch => format!("{llc}KB LLC"),
            Scaling::Pe => format!("{llc} * n KB LLC"),
        };
        for &(config, value) in &values {
            let label = match scaling {
                Scaling::Batch => format!("BatchSize={config}"),
                Scaling::Pe => format!("{config}X{config} PEs"),
            };
            report.push(&group, label, value);
        }
        let means: Vec<f64> = values.iter().map(|(_, value)| *value).collect();
        report.push(&group, GEO_MEAN, geo_mean(&means));
    }
    report
}

/// The geo-mean row of every group, as one group with a bar per original group.
#[must_use]
pub fn geo_mean_report(report: &Report) -> Report {
    let mut summary = Report::default();
    for row in report.rows.iter().filter(|row| row.label == GEO_MEAN) {
        summary.push(GEO_MEAN, &row.group, row.value);
    }
    summary
}

/// Parameters of the full set of reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reports {
    pub workloads: Vec<String>,
    /// LLC sizes of the batch scaling reports.
    pub llc: Vec<u64>,
    pub batches: Vec<u64>,
    /// LLC sizes of the PE scaling reports.
    pub pe_llc: Vec<u64>,
    pub pes: Vec<u64>,
    /// Associativity exponents of the sensitivity report.
    pub assoc: Vec<u64>,
    /// LLC size of the detailed batch and PE reports.
    pub focus_llc: u64,
}

impl Default for Reports {
    fn default() -> Self {
        Self {
            workloads: ["alexnet", "resnet18", "resnet50", "mobilenetv2", "dlrm", "transformer"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            llc: vec![256, 512, 1024, 2048],
            batches: vec![1, 2, 4, 8],
            pe_llc: vec![256, 512, 1024],
            pes: vec![1, 2, 4, 8],
            assoc: vec![1, 2, 3, 4],
            focus_llc: 1024,
        }
    }
}

fn llc_groups(llcs: &[u64], num_pe: u64, num_batch: u64) -> Vec<(Group, Point)> {
    llcs.iter()
        .map(|&llc| {
            let point = Point {
                llc,
                num_pe,
                num_batch,
            };
            (Group::Llc(llc), point)
        })
        .collect()
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(suffix);
    PathBuf::from(path)
}

/// Write every report as CSV next to `prefix`, returning the written paths.
pub fn write_reports(
    index: &LogIndex,
    cache: &mut StatsCache,
    reports: &Reports,
    prefix: &Path,
) -> eyre::Result<Vec<(PathBuf, Report)>> {
    let workloads = &reports.workloads;
    let mut written = Vec::new();
    let mut emit = |suffix: String, report: Report| -> eyre::Result<()> {
        let path = with_suffix(prefix, &suffix);
        report.write_csv_to_path(&path)?;
        log::info!("wrote {}", path.display());
        written.push((path, report));
        Ok(())
    };

    let mut by_batch = IndexMap::new();
    for &batch in &reports.batches {
        let (report, means) =
            group_report(index, cache, workloads, &llc_groups(&reports.llc, 1, batch))?;
        emit(format!("_1_{batch}.csv"), report)?;
        by_batch.insert(batch, reports.llc.iter().copied().zip(means).collect());
    }
    emit("_batch.csv".to_string(), summary(&by_batch, Scaling::Batch))?;

    let mut by_pe = IndexMap::new();
    for &pe in &reports.pes {
        let (report, means) =
            group_report(index, cache, workloads, &llc_groups(&reports.pe_llc, pe, 1))?;
        emit(format!("_{pe}_1.csv"), report)?;
        by_pe.insert(pe, reports.pe_llc.iter().copied().zip(means).collect());
    }
    emit("_pe.csv".to_string(), summary(&by_pe, Scaling::Pe))?;

    let (report, _) = group_report(index, cache, workloads, &llc_groups(&reports.assoc, 1, 1))?;
    emit("_assoc_1_1.csv".to_string(), report)?;

    let llc = reports.focus_llc;
    let batch_groups: Vec<_> = reports
        .batches
        .iter()
        .map(|&batch| {
            let point = Point {
                llc,
                num_pe: 1,
                num_batch: batch,
            };
            (Group::Batch(batch), point)
        })
        .collect();
    let (report, _) = group_report(index, cache, workloads, &batch_groups)?;
    emit(format!("_batch_{llc}_1.csv"), report)?;

    let pe_groups: Vec<_> = reports
        .pes
        .iter()
        .map(|&pe| {
            let point = Point {
                llc,
                num_pe: pe,
                num_batch: 1,
            };
            (Group::Pe(pe), point)
        })
        .collect();
    let (report, _) = group_report(index, cache, workloads, &pe_groups)?;
    emit(format!("_pe_{llc}_1.csv"), report)?;

    Ok(written)
}

/// The log with the fewest total cycles, the first one on ties.
pub fn best_run<'a>(
    logs: impl IntoIterator<Item = &'a Path>,
    cache: &mut StatsCache,
) -> eyre::Result<Option<(&'a Path, LogStats)>> {
    let mut best: Option<(&Path, LogStats)> = None;
    for path in logs {
        let stats = cache.get(path)?;
        let better = best
            .as_ref()
            .map_or(true, |(_, b)| stats.total_cycles() < b.total_cycles());
        if better {
            best = Some((path, stats.clone()));
        }
    }
    Ok(best)
}
