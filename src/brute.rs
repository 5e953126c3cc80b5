//! Exhaustive enumeration of dataflow assignments over the convolution layers.

use crate::dataflow::{Dataflow, HardwareParams};
use crate::decision::{self, write_table_with};
use crate::topology::{ShapeTable, Workload};
use color_eyre::eyre::{self, WrapErr};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Digit order of an assignment index.
pub const DIGITS: [Dataflow; 3] = [
    Dataflow::OutputStationary,
    Dataflow::WeightStationary,
    Dataflow::InputStationary,
];

/// Number of assignments over `num_layers` layers.
pub fn num_assignments(num_layers: usize) -> eyre::Result<u64> {
    u32::try_from(num_layers)
        .ok()
        .and_then(|n| 3u64.checked_pow(n))
        .ok_or_else(|| eyre::eyre!("3^{num_layers} assignments do not fit into u64"))
}

/// Dataflows of assignment `index`, least significant digit first.
#[must_use]
pub fn assignment(num_layers: usize, mut index: u64) -> Vec<Dataflow> {
    let mut dataflows = Vec::with_capacity(num_layers);
    for _ in 0..num_layers {
        #[allow(clippy::cast_possible_truncation)]
        dataflows.push(DIGITS[(index % 3) as usize]);
        index /= 3;
    }
    dataflows
}

#[must_use]
pub fn file_name(prefix: &str, dataflows: &[Dataflow]) -> String {
    let tags: String = dataflows.iter().map(|df| df.tag()).collect();
    format!("{prefix}{tags}.csv")
}

/// Write one topology per assignment of the convolution layers into `out_dir`.
///
/// Layers that are not enumerated keep their compute-optimal dataflow.
pub fn generate(
    workload: &Workload,
    shapes: &ShapeTable,
    hw: &HardwareParams,
    num_pe: u64,
    out_dir: &Path,
    prefix: &str,
) -> eyre::Result<Vec<PathBuf>> {
    let candidates: Vec<&str> = shapes.conv_layers().collect();
    let total = num_assignments(candidates.len())?;
    log::info!(
        "enumerating {} assignments of {} conv layers",
        total,
        candidates.len()
    );

    let computed: HashMap<String, Dataflow> = decision::plan(workload, shapes, hw)
        .into_iter()
        .map(|decision| (decision.layer, decision.primary))
        .collect();

    utils::fs::create_dirs(out_dir)?;
    let mut written = Vec::new();
    for index in 0..total {
        let dataflows = assignment(candidates.len(), index);
        let overrides: HashMap<&str, Dataflow> =
            candidates.iter().copied().zip(dataflows.iter().copied()).collect();

        let path = out_dir.join(file_name(prefix, &dataflows));
        let writer = utils::fs::open_writable(&path)?;
        write_table_with(writer, workload, num_pe, |layer| {
            overrides
                .get(layer.name.as_str())
                .or_else(|| computed.get(&layer.name))
                .copied()
                .unwrap_or(Dataflow::OutputStationary)
        })
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::{assignment, file_name, generate, num_assignments};
    use crate::dataflow::{Dataflow, HardwareParams};
    use crate::topology::{
        tests::{SHAPES, WORKLOAD},
        ShapeTable, Workload,
    };
    use color_eyre::eyre;
    use similar_asserts as diff;

    #[test]
    fn test_assignment_digits() {
        use Dataflow::{InputStationary as Is, OutputStationary as Os, WeightStationary as Ws};
        diff::assert_eq!(have: assignment(2, 0), want: vec![Os, Os]);
        diff::assert_eq!(have: assignment(2, 1), want: vec![Ws, Os]);
        diff::assert_eq!(have: assignment(2, 5), want: vec![Is, Ws]);
        diff::assert_eq!(have: assignment(2, 8), want: vec![Is, Is]);
        diff::assert_eq!(have: file_name("alexnet_512_1_1_", &assignment(2, 5)), want: "alexnet_512_1_1_isws.csv");
    }

    #[test]
    fn test_num_assignments_overflow() -> eyre::Result<()> {
        diff::assert_eq!(have: num_assignments(0)?, want: 1);
        diff::assert_eq!(have: num_assignments(3)?, want: 27);
        diff::assert_eq!(have: num_assignments(40)?, want: 12_157_665_459_056_928_801);
        assert!(num_assignments(41).is_err());
        Ok(())
    }

    #[test]
    fn test_generate_overrides_conv_layers() -> eyre::Result<()> {
        let workload = Workload::from_reader(WORKLOAD.as_bytes())?;
        let shapes = ShapeTable::from_reader(SHAPES.as_bytes())?;
        let hw = HardwareParams {
            array_height: 8,
            array_width: 8,
            cache_capacity_bytes: 256 * 1024,
            cache_assoc: 8,
            word_size_bytes: 1,
            batch_size: 1,
        };
        let dir = tempfile::tempdir()?;
        let written = generate(&workload, &shapes, &hw, 1, dir.path(), "alexnet_")?;
        diff::assert_eq!(have: written.len(), want: 9);

        let isws = std::fs::read_to_string(dir.path().join("alexnet_isws.csv"))?;
        let dataflows: Vec<_> = isws
            .lines()
            .skip(1)
            .map(|line| line.rsplit(',').next().unwrap_or_default().to_string())
            .collect();
        diff::assert_eq!(have: dataflows[0].as_str(), want: "is");
        diff::assert_eq!(have: dataflows[1].as_str(), want: "os");
        diff::assert_eq!(have: dataflows[2].as_str(), want: "ws");
        Ok(())
    }
}
