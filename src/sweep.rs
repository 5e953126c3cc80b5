//! Simulator configuration sweeps.
//!
//! A sweep derives one configuration per point of its parameter grid from a
//! base configuration, and names each run after its parameters.

use crate::config::{ScaleConfig, ARCHITECTURE, GENERAL, LLC};
use crate::dataflow::Dataflow;
use color_eyre::eyre::{self, WrapErr};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SweepKind {
    /// Single PE, one run per LLC setting and dataflow.
    Dataflow,
    /// Array, bandwidth, SRAM and LLC scaled with the number of PEs.
    Scaled,
    /// Fixed 1MB LLC with varying associativity.
    Assoc,
    /// Like `Scaled`, with the alternative tensor memory order.
    MemoryOrder,
}

/// LLC variant of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LlcSettingRepr", into = "LlcSettingRepr")]
pub enum LlcSetting {
    /// Size in KB, or the associativity exponent for `SweepKind::Assoc`.
    Size(u64),
    IdealLlcRealMem,
    IdealLlcIdealMem,
    NoLlc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LlcSettingRepr {
    Size(u64),
    Name(String),
}

impl TryFrom<LlcSettingRepr> for LlcSetting {
    type Error = String;

    fn try_from(repr: LlcSettingRepr) -> Result<Self, Self::Error> {
        match repr {
            LlcSettingRepr::Size(size) => Ok(Self::Size(size)),
            LlcSettingRepr::Name(name) => name.parse(),
        }
    }
}

impl From<LlcSetting> for LlcSettingRepr {
    fn from(setting: LlcSetting) -> Self {
        match setting {
            LlcSetting::Size(size) => Self::Size(size),
            other => Self::Name(other.to_string()),
        }
    }
}

impl std::str::FromStr for LlcSetting {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "idealLLC+realMem" => Ok(Self::IdealLlcRealMem),
            "idealLLC+idealMem" => Ok(Self::IdealLlcIdealMem),
            "noLLC" => Ok(Self::NoLlc),
            size => size
                .parse()
                .map(Self::Size)
                .map_err(|_| format!("invalid llc setting {size:?}")),
        }
    }
}

impl std::fmt::Display for LlcSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Size(size) => write!(f, "{size}"),
            Self::IdealLlcRealMem => write!(f, "idealLLC+realMem"),
            Self::IdealLlcIdealMem => write!(f, "idealLLC+idealMem"),
            Self::NoLlc => write!(f, "noLLC"),
        }
    }
}

fn default_one() -> Vec<u64> {
    vec![1]
}

fn default_dataflows() -> Vec<Dataflow> {
    vec![Dataflow::WeightStationary]
}

/// A grid of runs of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweep {
    pub kind: SweepKind,
    pub llc: Vec<LlcSetting>,
    #[serde(default = "default_one")]
    pub num_pe: Vec<u64>,
    #[serde(default = "default_one")]
    pub num_batch: Vec<u64>,
    #[serde(default = "default_dataflows")]
    pub dataflow: Vec<Dataflow>,
}

/// A generated simulator configuration.
#[derive(Debug, Clone)]
pub struct Run {
    pub name: String,
    pub config: ScaleConfig,
}

fn sizes(llc: &[u64]) -> Vec<LlcSetting> {
    llc.iter().copied().map(LlcSetting::Size).collect()
}

/// The sweeps used for the paper experiments.
#[must_use]
pub fn default_sweeps() -> Vec<Sweep> {
    let llc = [256, 512, 1024, 2048, 4096];
    let mut single = sizes(&[256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536]);
    single.extend([
        LlcSetting::IdealLlcRealMem,
        LlcSetting::IdealLlcIdealMem,
        LlcSetting::NoLlc,
    ]);
    vec![
        Sweep {
            kind: SweepKind::Dataflow,
            llc: single,
            num_pe: vec![1],
            num_batch: vec![1],
            dataflow: vec![
                Dataflow::InputStationary,
                Dataflow::OutputStationary,
                Dataflow::WeightStationary,
            ],
        },
        Sweep {
            kind: SweepKind::Scaled,
            llc: sizes(&llc),
            num_pe: vec![1],
            num_batch: vec![1, 2, 4, 8, 16, 32],
            dataflow: default_dataflows(),
        },
        Sweep {
            kind: SweepKind::Scaled,
            llc: sizes(&llc),
            num_pe: vec![1, 2, 4, 8],
            num_batch: vec![1],
            dataflow: default_dataflows(),
        },
        Sweep {
            kind: SweepKind::Assoc,
            llc: sizes(&[1, 2, 3, 4]),
            num_pe: vec![1],
            num_batch: vec![1],
            dataflow: default_dataflows(),
        },
        Sweep {
            kind: SweepKind::MemoryOrder,
            llc: sizes(&llc),
            num_pe: vec![1],
            num_batch: vec![1],
            dataflow: default_dataflows(),
        },
    ]
}

/// Read a list of sweeps from a YAML file.
pub fn load_sweeps(path: impl AsRef<Path>) -> eyre::Result<Vec<Sweep>> {
    let path = path.as_ref();
    let reader = utils::fs::open_readable(path)?;
    let sweeps = serde_yaml::from_reader(reader)
        .wrap_err_with(|| format!("failed to parse sweeps {}", path.display()))?;
    Ok(sweeps)
}

fn scale_array(config: &mut ScaleConfig, num_pe: u64) -> eyre::Result<()> {
    for key in ["ArrayHeight", "ArrayWidth", "Bandwidth"] {
        config.scale(ARCHITECTURE, key, num_pe)?;
    }
    for key in ["IfmapSramSzkB", "FilterSramSzkB", "OfmapSramSzkB"] {
        config.scale(ARCHITECTURE, key, num_pe * num_pe)?;
    }
    Ok(())
}

impl Sweep {
    #[must_use]
    pub fn num_runs(&self) -> usize {
        match self.kind {
            SweepKind::Dataflow => self.llc.len() * self.dataflow.len(),
            _ => self.llc.len() * self.num_pe.len() * self.num_batch.len() * self.dataflow.len(),
        }
    }

    fn run(
        &self,
        workload: &str,
        base: &ScaleConfig,
        llc: LlcSetting,
        num_pe: u64,
        num_batch: u64,
        dataflow: Dataflow,
    ) -> eyre::Result<Run> {
        let mut config = base.clone();
        let df = dataflow.tag();

        let name = match self.kind {
            SweepKind::Dataflow => {
                let name = match llc {
                    LlcSetting::Size(size) => {
                        config.set(LLC, "SizekB", size.to_string());
                        format!("{workload}_c{llc}_{df}")
                    }
                    LlcSetting::IdealLlcRealMem => {
                        config.set(LLC, "AlwaysHit", "1");
                        format!("{workload}_c{llc}_{df}")
                    }
                    LlcSetting::IdealLlcIdealMem => {
                        config.set(LLC, "Bypassing", "1");
                        format!("{workload}_c{llc}_{df}")
                    }
                    LlcSetting::NoLlc => {
                        config.set(LLC, "HitLatency", "40");
                        format!("{workload}_{llc}_{df}")
                    }
                };
                config.set(ARCHITECTURE, "BatchSize", "1");
                config.set(ARCHITECTURE, "Unified", "1");
                name
            }
            SweepKind::Scaled | SweepKind::MemoryOrder => {
                let LlcSetting::Size(size) = llc else {
                    eyre::bail!("{} sweep needs a numeric llc size, got {llc}", self.kind);
                };
                scale_array(&mut config, num_pe)?;
                config.set(LLC, "SizekB", (size * num_pe).to_string());
                config.set(ARCHITECTURE, "BatchSize", (num_batch * num_pe).to_string());
                config.set(ARCHITECTURE, "Unified", "0");
                if self.kind == SweepKind::MemoryOrder {
                    config.set(ARCHITECTURE, "TensorMainOrder", "0");
                    format!("{workload}_c{llc}_{num_pe}_{num_batch}_lm")
                } else {
                    format!("{workload}_c{llc}_{num_pe}_{num_batch}_{df}")
                }
            }
            SweepKind::Assoc => {
                let LlcSetting::Size(assoc) = llc else {
                    eyre::bail!("assoc sweep needs a numeric associativity, got {llc}");
                };
                let partitions = u32::try_from(assoc)
                    .ok()
                    .and_then(|assoc| 2u64.checked_pow(assoc))
                    .ok_or_else(|| eyre::eyre!("associativity {assoc} is too large"))?;
                config.set(LLC, "SizekB", "1024");
                config.set(LLC, "Assoc", assoc.to_string());
                config.set(LLC, "Partition", partitions.to_string());
                config.set(ARCHITECTURE, "BatchSize", num_batch.to_string());
                config.set(ARCHITECTURE, "Unified", "0");
                format!("{workload}_c{llc}_{num_pe}_{num_batch}_{df}")
            }
        };

        config.set(ARCHITECTURE, "Dataflow", df);
        config.set(GENERAL, "run_name", name.clone());
        Ok(Run { name, config })
    }

    /// All runs of this sweep for `workload`, derived from `base`.
    pub fn runs(&self, workload: &str, base: &ScaleConfig) -> eyre::Result<Vec<Run>> {
        let (num_pe, num_batch) = match self.kind {
            SweepKind::Dataflow => (vec![1], vec![1]),
            _ => (self.num_pe.clone(), self.num_batch.clone()),
        };
        itertools::iproduct!(&num_pe, &num_batch, &self.llc, &self.dataflow)
            .map(|(&pe, &batch, &llc, &dataflow)| {
                self.run(workload, base, llc, pe, batch, dataflow)
                    .wrap_err_with(|| format!("{} sweep: llc={llc} pe={pe} batch={batch}", self.kind))
            })
            .collect()
    }
}

/// Runs of all `sweeps`, keyed by run name.
///
/// A run that appears in several sweeps is generated once.
pub fn expand(
    sweeps: &[Sweep],
    workload: &str,
    base: &ScaleConfig,
) -> eyre::Result<IndexMap<String, Run>> {
    let mut runs = IndexMap::new();
    for sweep in sweeps {
        for run in sweep.runs(workload, base)? {
            runs.insert(run.name.clone(), run);
        }
    }
    Ok(runs)
}

/// Write `{run_name}.cfg` for every run of `sweeps` into `out_dir`.
pub fn generate(
    sweeps: &[Sweep],
    workload: &str,
    base: &ScaleConfig,
    out_dir: &Path,
) -> eyre::Result<Vec<PathBuf>> {
    utils::fs::create_dirs(out_dir)?;
    let runs = expand(sweeps, workload, base)?;
    log::info!(
        "generating {} configs for {} into {}",
        runs.len(),
        workload,
        out_dir.display()
    );
    runs.values()
        .map(|run| {
            let path = out_dir.join(format!("{}.cfg", run.name));
            run.config.write_to_path(&path)?;
            log::debug!("wrote {}", path.display());
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{default_sweeps, expand, LlcSetting, Sweep, SweepKind};
    use crate::config::{tests::CONFIG, ScaleConfig};
    use crate::dataflow::Dataflow;
    use color_eyre::eyre;
    use similar_asserts as diff;

    fn base() -> eyre::Result<ScaleConfig> {
        CONFIG.parse()
    }

    #[test]
    fn test_default_sweeps() -> eyre::Result<()> {
        let sweeps = default_sweeps();
        let counts: Vec<_> = sweeps.iter().map(Sweep::num_runs).collect();
        diff::assert_eq!(have: counts, want: vec![36, 30, 20, 4, 5]);

        // the single batch runs of the first scaled sweep repeat in the second
        let runs = expand(&sweeps, "alexnet", &base()?)?;
        diff::assert_eq!(have: runs.len(), want: 90);
        assert!(runs.contains_key("alexnet_noLLC_ws"));
        assert!(runs.contains_key("alexnet_cidealLLC+realMem_is"));
        assert!(runs.contains_key("alexnet_c4_1_1_ws"));
        assert!(runs.contains_key("alexnet_c4096_1_1_lm"));
        Ok(())
    }

    #[test]
    fn test_dataflow_sweep() -> eyre::Result<()> {
        let sweep = Sweep {
            kind: SweepKind::Dataflow,
            llc: vec![LlcSetting::Size(512), LlcSetting::IdealLlcIdealMem, LlcSetting::NoLlc],
            num_pe: vec![4],
            num_batch: vec![8],
            dataflow: vec![Dataflow::InputStationary],
        };
        let runs = sweep.runs("resnet18", &base()?)?;
        let names: Vec<_> = runs.iter().map(|run| run.name.as_str()).collect();
        diff::assert_eq!(
            have: names,
            want: vec!["resnet18_c512_is", "resnet18_cidealLLC+idealMem_is", "resnet18_noLLC_is"]
        );

        let sized = &runs[0].config;
        diff::assert_eq!(have: sized.get("llc", "SizekB"), want: Some("512"));
        diff::assert_eq!(have: sized.get("architecture_presets", "Dataflow"), want: Some("is"));
        diff::assert_eq!(have: sized.get("architecture_presets", "BatchSize"), want: Some("1"));
        diff::assert_eq!(have: sized.get("architecture_presets", "Unified"), want: Some("1"));
        diff::assert_eq!(have: sized.get("general", "run_name"), want: Some("resnet18_c512_is"));

        diff::assert_eq!(have: runs[1].config.get("llc", "Bypassing"), want: Some("1"));
        diff::assert_eq!(have: runs[1].config.get("llc", "SizekB"), want: Some("256"));
        diff::assert_eq!(have: runs[2].config.get("llc", "HitLatency"), want: Some("40"));
        Ok(())
    }

    #[test]
    fn test_scaled_sweep() -> eyre::Result<()> {
        let sweep = Sweep {
            kind: SweepKind::Scaled,
            llc: vec![LlcSetting::Size(512)],
            num_pe: vec![4],
            num_batch: vec![2],
            dataflow: vec![Dataflow::WeightStationary],
        };
        let runs = sweep.runs("alexnet", &base()?)?;
        diff::assert_eq!(have: runs.len(), want: 1);
        let run = &runs[0];
        diff::assert_eq!(have: run.name.as_str(), want: "alexnet_c512_4_2_ws");

        let get = |key| run.config.get("architecture_presets", key);
        diff::assert_eq!(have: get("ArrayHeight"), want: Some("32"));
        diff::assert_eq!(have: get("ArrayWidth"), want: Some("32"));
        diff::assert_eq!(have: get("Bandwidth"), want: Some("40"));
        diff::assert_eq!(have: get("IfmapSramSzkB"), want: Some("1024"));
        diff::assert_eq!(have: get("OfmapSramSzkB"), want: Some("512"));
        diff::assert_eq!(have: get("BatchSize"), want: Some("8"));
        diff::assert_eq!(have: get("Unified"), want: Some("0"));
        diff::assert_eq!(have: get("TensorMainOrder"), want: None);
        diff::assert_eq!(have: run.config.get("llc", "SizekB"), want: Some("2048"));
        Ok(())
    }

    #[test]
    fn test_assoc_and_memory_order_sweeps() -> eyre::Result<()> {
        let assoc = Sweep {
            kind: SweepKind::Assoc,
            llc: vec![LlcSetting::Size(3)],
            num_pe: vec![1],
            num_batch: vec![1],
            dataflow: vec![Dataflow::WeightStationary],
        };
        let runs = assoc.runs("dlrm", &base()?)?;
        let config = &runs[0].config;
        diff::assert_eq!(have: runs[0].name.as_str(), want: "dlrm_c3_1_1_ws");
        diff::assert_eq!(have: config.get("llc", "SizekB"), want: Some("1024"));
        diff::assert_eq!(have: config.get("llc", "Assoc"), want: Some("3"));
        diff::assert_eq!(have: config.get("llc", "Partition"), want: Some("8"));

        let order = Sweep {
            kind: SweepKind::MemoryOrder,
            ..assoc
        };
        let runs = order.runs("dlrm", &base()?)?;
        diff::assert_eq!(have: runs[0].name.as_str(), want: "dlrm_c3_1_1_lm");
        diff::assert_eq!(
            have: runs[0].config.get("architecture_presets", "TensorMainOrder"),
            want: Some("0")
        );
        Ok(())
    }

    #[test]
    fn test_named_llc_needs_dataflow_sweep() -> eyre::Result<()> {
        let sweep = Sweep {
            kind: SweepKind::Scaled,
            llc: vec![LlcSetting::NoLlc],
            num_pe: vec![1],
            num_batch: vec![1],
            dataflow: vec![Dataflow::WeightStationary],
        };
        assert!(sweep.runs("alexnet", &base()?).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_sweeps_yaml() -> eyre::Result<()> {
        let yaml = r"
- kind: dataflow
  llc: [256, noLLC]
  dataflow: [os, ws]
- kind: memory_order
  llc: [1024]
  num_pe: [2]
";
        let sweeps: Vec<Sweep> = serde_yaml::from_str(yaml)?;
        diff::assert_eq!(
            have: sweeps,
            want: vec![
                Sweep {
                    kind: SweepKind::Dataflow,
                    llc: vec![LlcSetting::Size(256), LlcSetting::NoLlc],
                    num_pe: vec![1],
                    num_batch: vec![1],
                    dataflow: vec![Dataflow::OutputStationary, Dataflow::WeightStationary],
                },
                Sweep {
                    kind: SweepKind::MemoryOrder,
                    llc: vec![LlcSetting::Size(1024)],
                    num_pe: vec![2],
                    num_batch: vec![1],
                    dataflow: vec![Dataflow::WeightStationary],
                },
            ]
        );
        Ok(())
    }
}
