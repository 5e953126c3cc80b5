//! Batch generation of COMP and CADO topologies over workloads and hardware points.

use crate::config::ScaleConfig;
use crate::decision::{self, LayerDecision, Table};
use crate::template::{Template, Values};
use crate::topology::{ShapeTable, Workload};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hardware points, expanded as a cartesian product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    pub llc: Vec<u64>,
    #[serde(default = "default_one")]
    pub num_pe: Vec<u64>,
    #[serde(default = "default_one")]
    pub num_batch: Vec<u64>,
}

fn default_one() -> Vec<u64> {
    vec![1]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paths {
    pub workload: Template,
    pub shape: Template,
    pub config: Template,
    pub cado: Template,
    pub comp: Template,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            workload: "topologies/conv_nets/test_{{workload}}.csv".into(),
            shape: "run_scripts/{{workload}}/{{workload}}_c256_ws_shape.csv".into(),
            config: "configs/{{workload}}/{{workload}}_c{{llc}}_{{num_pe}}_{{num_batch}}_ws.cfg"
                .into(),
            cado: "topologies/cado/{{workload}}_{{llc}}_{{num_pe}}_{{num_batch}}_cado.csv".into(),
            comp: "topologies/cado/{{workload}}_{{llc}}_{{num_pe}}_{{num_batch}}_comp.csv".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub workloads: Vec<String>,
    pub matrices: Vec<Matrix>,
    #[serde(default)]
    pub paths: Paths,
}

impl Default for Experiment {
    fn default() -> Self {
        let capacities = vec![256, 512, 1024, 2048];
        Self {
            workloads: ["alexnet", "resnet18", "resnet50", "mobilenetv2", "dlrm", "transformer"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            matrices: vec![
                Matrix {
                    llc: capacities.clone(),
                    num_pe: vec![1],
                    num_batch: vec![1, 2, 4, 8, 16, 32],
                },
                Matrix {
                    llc: capacities,
                    num_pe: vec![1, 2, 4, 8],
                    num_batch: vec![1],
                },
                Matrix {
                    llc: vec![1, 2, 3, 4],
                    num_pe: vec![1],
                    num_batch: vec![1],
                },
            ],
            paths: Paths::default(),
        }
    }
}

/// Input and output files of one experiment point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub values: Values,
    pub workload: PathBuf,
    pub shape: PathBuf,
    pub config: PathBuf,
    pub cado: PathBuf,
    pub comp: PathBuf,
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Values {
            workload,
            llc,
            num_pe,
            num_batch,
        } = &self.values;
        write!(f, "{workload}@llc={llc},pe={num_pe},batch={num_batch}")
    }
}

impl Experiment {
    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let reader = utils::fs::open_readable(path)?;
        let experiment = serde_yaml::from_reader(reader)
            .wrap_err_with(|| format!("failed to parse experiment {}", path.display()))?;
        Ok(experiment)
    }

    /// All points, ordered by PE count, batch size, workload and LLC.
    pub fn points(&self) -> impl Iterator<Item = Values> + '_ {
        self.matrices.iter().flat_map(move |matrix| {
            itertools::iproduct!(&matrix.num_pe, &matrix.num_batch, &self.workloads, &matrix.llc)
                .map(|(&num_pe, &num_batch, workload, &llc)| Values {
                    workload: workload.clone(),
                    llc,
                    num_pe,
                    num_batch,
                })
        })
    }

    /// Render the paths of every point, relative to `root`.
    pub fn jobs(&self, root: &Path) -> eyre::Result<Vec<Job>> {
        self.points()
            .map(|values| {
                let render = |tmpl: &Template| {
                    tmpl.render_path(root, &values)
                        .wrap_err_with(|| format!("failed to render path template {tmpl}"))
                };
                Ok(Job {
                    workload: render(&self.paths.workload)?,
                    shape: render(&self.paths.shape)?,
                    config: render(&self.paths.config)?,
                    cado: render(&self.paths.cado)?,
                    comp: render(&self.paths.comp)?,
                    values,
                })
            })
            .collect()
    }
}

/// Plan one point and write its COMP and CADO tables.
pub fn run_job(job: &Job) -> eyre::Result<Vec<LayerDecision>> {
    let workload = Workload::from_path(&job.workload)?;
    let shapes = ShapeTable::from_path(&job.shape)?;
    let hw = ScaleConfig::from_path(&job.config)?
        .hardware_params()
        .wrap_err_with(|| format!("invalid config {}", job.config.display()))?;

    let decisions = decision::plan(&workload, &shapes, &hw);
    for (table, path) in [(Table::Comp, &job.comp), (Table::Cado, &job.cado)] {
        decision::write_table_to_path(path, &workload, &decisions, job.values.num_pe, table)?;
    }
    log::info!(
        "{}: {} layers, {} changed by cache awareness",
        job,
        decisions.len(),
        decisions.iter().filter(|d| d.primary != d.cache_aware).count()
    );
    Ok(decisions)
}
