#![allow(
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod batch;
pub mod brute;
pub mod config;
pub mod dataflow;
pub mod decision;
pub mod experiment;
pub mod plot;
pub mod replicate;
pub mod results;
pub mod sweep;
pub mod template;
pub mod topology;

pub use config::ScaleConfig;
pub use dataflow::{Dataflow, HardwareParams, LayerShape};
pub use decision::LayerDecision;
pub use topology::{ShapeTable, Workload};
