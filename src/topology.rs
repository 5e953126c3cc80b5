use crate::dataflow::LayerShape;
use color_eyre::eyre::{self, WrapErr};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const LAYER_NAME: &str = "Layer name";

/// Columns of a workload topology, in file order, after the layer name.
pub const INFO_KEYS: [&str; 12] = [
    "Layer Type",
    "IFMAP Height",
    "IFMAP Width",
    "Filter Height",
    "Filter Width",
    "Channels",
    "Num Filter",
    "Stride Height",
    "Stride Width",
    "IFMAP Source",
    "Filter Source",
    "PE",
];

pub const DATAFLOW: &str = "Dataflow";

/// One layer of a workload topology.
///
/// Columns are kept as read so tables written from a workload reproduce them.
/// Numeric columns may be empty for layers that are not convolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadLayer {
    #[serde(rename = "Layer name")]
    pub name: String,
    #[serde(rename = "Layer Type", default)]
    pub kind: String,
    #[serde(rename = "IFMAP Height", default)]
    pub ifmap_height: String,
    #[serde(rename = "IFMAP Width", default)]
    pub ifmap_width: String,
    #[serde(rename = "Filter Height", default)]
    pub filter_height: String,
    #[serde(rename = "Filter Width", default)]
    pub filter_width: String,
    #[serde(rename = "Channels", default)]
    pub channels: String,
    #[serde(rename = "Num Filter", default)]
    pub num_filters: String,
    #[serde(rename = "Stride Height", default)]
    pub stride_height: String,
    #[serde(rename = "Stride Width", default)]
    pub stride_width: String,
    #[serde(rename = "IFMAP Source", default)]
    pub ifmap_source: String,
    #[serde(rename = "Filter Source", default)]
    pub filter_source: String,
    #[serde(rename = "PE", default)]
    pub num_pe: String,
}

impl WorkloadLayer {
    /// Columns of this layer in `INFO_KEYS` order, with the PE count replaced.
    #[must_use]
    pub fn info_fields(&self, num_pe: u64) -> Vec<String> {
        vec![
            self.kind.clone(),
            self.ifmap_height.clone(),
            self.ifmap_width.clone(),
            self.filter_height.clone(),
            self.filter_width.clone(),
            self.channels.clone(),
            self.num_filters.clone(),
            self.stride_height.clone(),
            self.stride_width.clone(),
            self.ifmap_source.clone(),
            self.filter_source.clone(),
            num_pe.to_string(),
        ]
    }
}

fn csv_reader<R: std::io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

/// Read rows keyed by their layer name.
///
/// A repeated name replaces the earlier row but keeps its position.
fn read_keyed<R, T>(reader: R, key: impl Fn(&T) -> String) -> eyre::Result<IndexMap<String, T>>
where
    R: std::io::Read,
    T: serde::de::DeserializeOwned,
{
    let mut rows = IndexMap::new();
    for (idx, row) in csv_reader(reader).deserialize::<T>().enumerate() {
        let row = row.wrap_err_with(|| format!("invalid row {}", idx + 1))?;
        let name = key(&row);
        if rows.insert(name.clone(), row).is_some() {
            log::warn!("duplicate layer {name:?} replaces earlier row");
        }
    }
    Ok(rows)
}

/// Layers of a workload, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workload {
    pub layers: IndexMap<String, WorkloadLayer>,
}

impl Workload {
    pub fn from_reader(reader: impl std::io::Read) -> eyre::Result<Self> {
        let layers = read_keyed(reader, |layer: &WorkloadLayer| layer.name.clone())?;
        Ok(Self { layers })
    }

    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let reader = utils::fs::open_readable(path)?;
        Self::from_reader(reader)
            .wrap_err_with(|| format!("failed to read workload {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkloadLayer> {
        self.layers.values()
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ShapeRow {
    #[serde(rename = "Layer name")]
    name: String,
    ifmap_op_mat_H: u64,
    ifmap_op_mat_W: u64,
    filter_op_mat_W: u64,
}

/// Operand matrix shapes keyed by layer name.
///
/// Only GEMM-like layers have an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeTable {
    pub shapes: IndexMap<String, LayerShape>,
}

impl ShapeTable {
    pub fn from_reader(reader: impl std::io::Read) -> eyre::Result<Self> {
        let rows = read_keyed(reader, |row: &ShapeRow| row.name.clone())?;
        let shapes = rows
            .into_iter()
            .map(|(name, row)| {
                let shape = LayerShape {
                    ifmap_rows: row.ifmap_op_mat_H,
                    ifmap_cols: row.ifmap_op_mat_W,
                    filter_cols: row.filter_op_mat_W,
                };
                (name, shape)
            })
            .collect();
        Ok(Self { shapes })
    }

    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let reader = utils::fs::open_readable(path)?;
        Self::from_reader(reader)
            .wrap_err_with(|| format!("failed to read shapes {}", path.display()))
    }

    #[must_use]
    pub fn get(&self, layer: &str) -> Option<&LayerShape> {
        self.shapes.get(layer)
    }

    /// Layers whose name marks them as convolutions.
    pub fn conv_layers(&self) -> impl Iterator<Item = &str> {
        self.shapes
            .keys()
            .map(String::as_str)
            .filter(|name| name.contains("Conv"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{ShapeTable, Workload};
    use crate::dataflow::LayerShape;
    use color_eyre::eyre;
    use similar_asserts as diff;

    pub const WORKLOAD: &str = "\
Layer name, Layer Type, IFMAP Height, IFMAP Width, Filter Height, Filter Width, Channels, Num Filter, Stride Height, Stride Width, IFMAP Source, Filter Source, PE,
Conv1, Conv, 224, 224, 11, 11, 3, 96, 4, 4, 0, 0, 1,
Pool1, Pool, 55, 55, 3, 3, 96, , 2, 2, 1, 0, 1,
Conv2, Conv, 27, 27, 5, 5, 96, 256, 1, 1, 1, 0, 1,
FC1, FC, 1, 1, 1, 1, 9216, 4096, 1, 1, 1, 0, 1,
";

    pub const SHAPES: &str = "\
Layer name,ifmap_op_mat_H,ifmap_op_mat_W,filter_op_mat_H,filter_op_mat_W,ofmap_op_mat_H,ofmap_op_mat_W
Conv1,3025,363,363,96,3025,96
Conv2,729,2400,2400,256,729,256
FC1,1,9216,9216,4096,1,4096
";

    #[test]
    fn test_read_workload() -> eyre::Result<()> {
        let workload = Workload::from_reader(WORKLOAD.as_bytes())?;
        let names: Vec<_> = workload.layers.keys().cloned().collect();
        diff::assert_eq!(have: names, want: vec!["Conv1", "Pool1", "Conv2", "FC1"]);

        let pool = &workload.layers["Pool1"];
        diff::assert_eq!(have: pool.kind.as_str(), want: "Pool");
        diff::assert_eq!(have: pool.num_filters.as_str(), want: "");
        diff::assert_eq!(
            have: pool.info_fields(4),
            want: vec!["Pool", "55", "55", "3", "3", "96", "", "2", "2", "1", "0", "4"]
        );
        Ok(())
    }

    #[test]
    fn test_read_shapes() -> eyre::Result<()> {
        let shapes = ShapeTable::from_reader(SHAPES.as_bytes())?;
        diff::assert_eq!(
            have: shapes.get("Conv2"),
            want: Some(&LayerShape {
                ifmap_rows: 729,
                ifmap_cols: 2400,
                filter_cols: 256,
            })
        );
        diff::assert_eq!(have: shapes.get("Pool1"), want: None);
        diff::assert_eq!(have: shapes.conv_layers().collect::<Vec<_>>(), want: vec!["Conv1", "Conv2"]);
        Ok(())
    }

    #[test]
    fn test_duplicate_layer_keeps_position() -> eyre::Result<()> {
        let shapes = ShapeTable::from_reader(
            "Layer name,ifmap_op_mat_H,ifmap_op_mat_W,filter_op_mat_W\nA,1,1,1\nB,2,2,2\nA,3,3,3\n"
                .as_bytes(),
        )?;
        let names: Vec<_> = shapes.shapes.keys().cloned().collect();
        diff::assert_eq!(have: names, want: vec!["A", "B"]);
        diff::assert_eq!(have: shapes.get("A").map(|s| s.ifmap_rows), want: Some(3));
        Ok(())
    }

    #[test]
    fn test_missing_shape_column_is_an_error() {
        let res = ShapeTable::from_reader("Layer name,ifmap_op_mat_H\nA,1\n".as_bytes());
        assert!(res.is_err());
    }
}
