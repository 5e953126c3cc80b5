use serde::{Deserialize, Serialize};

/// Cycle counts of one layer (or a whole run).
///
/// `compute` excludes the cycles spent stalled.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleStats {
    pub compute: u64,
    pub stall: u64,
}

impl CycleStats {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.compute + self.stall
    }
}

impl std::ops::AddAssign for CycleStats {
    fn add_assign(&mut self, other: Self) {
        self.compute += other.compute;
        self.stall += other.stall;
    }
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} cycles ({} compute, {} stall)",
            self.total(),
            self.compute,
            self.stall
        )
    }
}

/// Statistics of a single simulator run.
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    pub per_layer: Vec<CycleStats>,
    pub overall: CycleStats,
}

impl LogStats {
    #[must_use]
    pub fn num_layers(&self) -> usize {
        self.per_layer.len()
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.overall.total()
    }
}
