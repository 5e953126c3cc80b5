//! Per-layer dataflow selection for a systolic array.
//!
//! Two passes decide the dataflow of a layer: a compute-optimal ranking of
//! the three variants by the number of array passes, and a cache-aware
//! re-validation of that ranking against the usable LLC capacity.

use serde::{Deserialize, Serialize};

/// Which operand stays resident in the PE array.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::Display,
    strum::IntoStaticStr,
)]
pub enum Dataflow {
    #[serde(rename = "ws")]
    #[strum(serialize = "ws")]
    WeightStationary,
    #[serde(rename = "is")]
    #[strum(serialize = "is")]
    InputStationary,
    #[serde(rename = "os")]
    #[strum(serialize = "os")]
    OutputStationary,
}

impl Dataflow {
    /// Short tag used in topology files and run names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.into()
    }
}

/// Operand matrix dimensions of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerShape {
    pub ifmap_rows: u64,
    pub ifmap_cols: u64,
    pub filter_cols: u64,
}

/// GEMM dimensions `M x K` times `K x N` after batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operands {
    pub m: u64,
    pub k: u64,
    pub n: u64,
}

impl LayerShape {
    #[must_use]
    pub fn operands(&self, batch_size: u64) -> Operands {
        Operands {
            m: self.ifmap_rows.saturating_mul(batch_size),
            k: self.ifmap_cols,
            n: self.filter_cols,
        }
    }
}

/// Hardware parameters of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareParams {
    pub array_height: u64,
    pub array_width: u64,
    pub cache_capacity_bytes: u64,
    pub cache_assoc: u64,
    pub word_size_bytes: u64,
    pub batch_size: u64,
}

impl HardwareParams {
    /// LLC capacity in words, with one way reserved for conflict misses.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn usable_capacity(&self) -> f64 {
        let capacity = self.cache_capacity_bytes as f64;
        let assoc = self.cache_assoc as f64;
        capacity * (assoc - 1.0) / assoc / self.word_size_bytes as f64
    }
}

/// Folding of one dataflow variant over the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Folding {
    pub row: u64,
    pub col: u64,
    pub temporal: u64,
}

impl Folding {
    #[must_use]
    pub fn ops(&self) -> u64 {
        self.row.saturating_mul(self.col).saturating_mul(self.temporal)
    }
}

/// Stationary rows, stationary columns and temporal extent of `dataflow`.
#[must_use]
pub fn mapping(dataflow: Dataflow, operands: &Operands) -> (u64, u64, u64) {
    let Operands { m, k, n } = *operands;
    match dataflow {
        Dataflow::InputStationary => (k, m, n),
        Dataflow::WeightStationary => (k, n, m),
        Dataflow::OutputStationary => (m, n, k),
    }
}

/// Fold `dataflow` over an `array_height x array_width` array.
///
/// The temporal fold is `T + H - 1` and not `ceil(T / H)`.
///
/// # Panics
///
/// If either array dimension is zero.
#[must_use]
pub fn folding(
    dataflow: Dataflow,
    operands: &Operands,
    array_height: u64,
    array_width: u64,
) -> Folding {
    let (rows, cols, temporal) = mapping(dataflow, operands);
    Folding {
        row: rows.div_ceil(array_height),
        col: cols.div_ceil(array_width),
        temporal: temporal.saturating_add(array_height - 1),
    }
}

/// Number of array operations of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ranking {
    pub ws: u64,
    pub is: u64,
    pub os: u64,
}

impl Ranking {
    #[must_use]
    pub fn new(operands: &Operands, array_height: u64, array_width: u64) -> Self {
        let ops = |dataflow| folding(dataflow, operands, array_height, array_width).ops();
        Self {
            ws: ops(Dataflow::WeightStationary),
            is: ops(Dataflow::InputStationary),
            os: ops(Dataflow::OutputStationary),
        }
    }

    #[must_use]
    pub fn ops(&self, dataflow: Dataflow) -> u64 {
        match dataflow {
            Dataflow::WeightStationary => self.ws,
            Dataflow::InputStationary => self.is,
            Dataflow::OutputStationary => self.os,
        }
    }

    /// Variant with the fewest operations.
    ///
    /// Ties go to weight stationary, then output stationary.
    #[must_use]
    pub fn primary(&self) -> Dataflow {
        let Self { ws, is, os } = *self;
        if ws <= is && ws <= os {
            Dataflow::WeightStationary
        } else if os <= is && os <= ws {
            Dataflow::OutputStationary
        } else {
            Dataflow::InputStationary
        }
    }

    /// Variant lying between the other two, falling back to input stationary.
    #[must_use]
    pub fn secondary(&self) -> Dataflow {
        let Self { ws, is, os } = *self;
        let between = |x: u64, a: u64, b: u64| (x <= a && x >= b) || (x <= b && x >= a);
        if between(ws, is, os) {
            Dataflow::WeightStationary
        } else if between(os, is, ws) {
            Dataflow::OutputStationary
        } else {
            Dataflow::InputStationary
        }
    }
}

/// Compute-optimal primary and runner-up dataflow of a layer.
#[must_use]
pub fn select_compute_optimal(
    shape: &LayerShape,
    array_height: u64,
    array_width: u64,
    batch_size: u64,
) -> (Dataflow, Dataflow) {
    let ranking = Ranking::new(&shape.operands(batch_size), array_height, array_width);
    (ranking.primary(), ranking.secondary())
}

/// Words a dataflow keeps resident when its whole streamed operand fits.
#[must_use]
pub fn resident_footprint(dataflow: Dataflow, operands: &Operands, array_height: u64) -> u64 {
    let Operands { m, k, n } = *operands;
    match dataflow {
        Dataflow::WeightStationary => n.saturating_add(array_height).saturating_mul(m),
        Dataflow::InputStationary => k.saturating_add(array_height).saturating_mul(n),
        Dataflow::OutputStationary => n.saturating_add(array_height).saturating_mul(k),
    }
}

/// Words needed to double-buffer the streamed operand of a dataflow.
#[must_use]
pub fn double_buffer_footprint(
    dataflow: Dataflow,
    operands: &Operands,
    array_height: u64,
    array_width: u64,
) -> u64 {
    let Operands { m, k, n } = *operands;
    let streamed = match dataflow {
        Dataflow::WeightStationary => m,
        Dataflow::InputStationary => n,
        Dataflow::OutputStationary => k,
    };
    streamed
        .saturating_mul(2)
        .saturating_mul(array_height)
        .saturating_add(array_height.saturating_mul(array_width))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precondition {
    Primary(Dataflow),
    Secondary(Dataflow),
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rung {
    precondition: Precondition,
    footprint: u64,
    choice: Dataflow,
}

const LADDER_ORDER: [Dataflow; 3] = [
    Dataflow::WeightStationary,
    Dataflow::InputStationary,
    Dataflow::OutputStationary,
];

fn ladder(operands: &Operands, hw: &HardwareParams) -> Vec<Rung> {
    let h = hw.array_height;
    let w = hw.array_width;
    let rungs = |precondition: fn(Dataflow) -> Precondition, footprint: &dyn Fn(Dataflow) -> u64| {
        LADDER_ORDER
            .into_iter()
            .map(|choice| Rung {
                precondition: precondition(choice),
                footprint: footprint(choice),
                choice,
            })
            .collect::<Vec<_>>()
    };
    let resident = |df| resident_footprint(df, operands, h);
    let double_buffered = |df| double_buffer_footprint(df, operands, h, w);

    [
        rungs(Precondition::Primary, &resident),
        rungs(|_| Precondition::Any, &resident),
        rungs(Precondition::Primary, &double_buffered),
        rungs(Precondition::Secondary, &double_buffered),
    ]
    .concat()
}

/// First dataflow of the cache-aware ladder whose working set fits the LLC.
///
/// Returns `None` if no rung fits.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cache_aware_candidate(
    shape: &LayerShape,
    hw: &HardwareParams,
    primary: Dataflow,
    secondary: Dataflow,
) -> Option<Dataflow> {
    let operands = shape.operands(hw.batch_size);
    let capacity = hw.usable_capacity();
    ladder(&operands, hw)
        .into_iter()
        .find(|rung| {
            let applies = match rung.precondition {
                Precondition::Primary(df) => df == primary,
                Precondition::Secondary(df) => df == secondary,
                Precondition::Any => true,
            };
            applies && rung.footprint as f64 <= capacity
        })
        .map(|rung| rung.choice)
}

/// Re-validate the compute-optimal choice against the LLC capacity.
///
/// If nothing fits, the `current` choice of the layer is kept.
#[must_use]
pub fn select_cache_aware(
    shape: &LayerShape,
    hw: &HardwareParams,
    primary: Dataflow,
    secondary: Dataflow,
    current: Dataflow,
) -> Dataflow {
    cache_aware_candidate(shape, hw, primary, secondary).unwrap_or(current)
}
