use crate::dataflow::{self, Dataflow, HardwareParams, LayerShape};
use crate::topology::{ShapeTable, Workload, WorkloadLayer, DATAFLOW, INFO_KEYS, LAYER_NAME};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Dataflow decisions of a single layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerDecision {
    pub layer: String,
    /// Compute-optimal dataflow.
    pub primary: Dataflow,
    /// Runner-up of the compute-optimal ranking, if the layer has a shape.
    pub secondary: Option<Dataflow>,
    /// Cache-aware dataflow.
    pub cache_aware: Dataflow,
}

/// Which decision a topology table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Table {
    Comp,
    Cado,
}

impl LayerDecision {
    #[must_use]
    pub fn dataflow(&self, table: Table) -> Dataflow {
        match table {
            Table::Comp => self.primary,
            Table::Cado => self.cache_aware,
        }
    }
}

/// Decide the dataflows of a layer.
///
/// Layers without a shape are not GEMM-like and stay output stationary.
#[must_use]
pub fn decide(layer: &str, shape: Option<&LayerShape>, hw: &HardwareParams) -> LayerDecision {
    let Some(shape) = shape else {
        log::debug!("{layer}: no shape, keeping os");
        return LayerDecision {
            layer: layer.to_string(),
            primary: Dataflow::OutputStationary,
            secondary: None,
            cache_aware: Dataflow::OutputStationary,
        };
    };
    let (primary, secondary) =
        dataflow::select_compute_optimal(shape, hw.array_height, hw.array_width, hw.batch_size);
    let cache_aware = dataflow::select_cache_aware(shape, hw, primary, secondary, primary);
    log::debug!("{layer}: comp={primary} second={secondary} cado={cache_aware}");
    LayerDecision {
        layer: layer.to_string(),
        primary,
        secondary: Some(secondary),
        cache_aware,
    }
}

/// Decide every layer of `workload`, in workload order.
#[must_use]
pub fn plan(workload: &Workload, shapes: &ShapeTable, hw: &HardwareParams) -> Vec<LayerDecision> {
    let layers: Vec<&str> = workload.layers.keys().map(String::as_str).collect();
    let decide_layer = |layer: &&str| decide(layer, shapes.get(layer), hw);

    #[cfg(feature = "parallel")]
    let decisions = {
        use rayon::prelude::*;
        layers.par_iter().map(decide_layer).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let decisions = layers.iter().map(decide_layer).collect();

    decisions
}

/// Header of a topology table with a dataflow column.
#[must_use]
pub fn table_header() -> Vec<&'static str> {
    std::iter::once(LAYER_NAME)
        .chain(INFO_KEYS)
        .chain(std::iter::once(DATAFLOW))
        .collect()
}

fn table_row(layer: &WorkloadLayer, num_pe: u64, dataflow: Dataflow) -> Vec<String> {
    let mut row = vec![layer.name.clone()];
    row.extend(layer.info_fields(num_pe));
    row.push(dataflow.tag().to_string());
    row
}

/// Write the workload as a topology table, with the dataflow of every layer
/// chosen by `dataflow`.
pub fn write_table_with<W, F>(
    writer: W,
    workload: &Workload,
    num_pe: u64,
    mut dataflow: F,
) -> eyre::Result<()>
where
    W: std::io::Write,
    F: FnMut(&WorkloadLayer) -> Dataflow,
{
    let mut csv_writer = csv::WriterBuilder::new().flexible(false).from_writer(writer);
    csv_writer.write_record(table_header())?;
    for layer in workload.iter() {
        csv_writer.write_record(table_row(layer, num_pe, dataflow(layer)))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the COMP or CADO table of a plan.
pub fn write_table(
    writer: impl std::io::Write,
    workload: &Workload,
    decisions: &[LayerDecision],
    num_pe: u64,
    table: Table,
) -> eyre::Result<()> {
    let by_layer: std::collections::HashMap<&str, &LayerDecision> = decisions
        .iter()
        .map(|decision| (decision.layer.as_str(), decision))
        .collect();
    write_table_with(writer, workload, num_pe, |layer| {
        by_layer
            .get(layer.name.as_str())
            .map_or(Dataflow::OutputStationary, |decision| decision.dataflow(table))
    })
}

pub fn write_table_to_path(
    path: &Path,
    workload: &Workload,
    decisions: &[LayerDecision],
    num_pe: u64,
    table: Table,
) -> eyre::Result<()> {
    let writer = utils::fs::open_writable(path)?;
    write_table(writer, workload, decisions, num_pe, table)
        .wrap_err_with(|| format!("failed to write {table} table {}", path.display()))
}
