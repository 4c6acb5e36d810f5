//! Trellis Engine — analysis session, worker-pool fan-out, serialized
//! merge, and incremental updates

pub mod engine;
pub mod report;
pub mod updater;


pub use engine::{Engine, EngineConfig};
pub use report::AnalysisReport;
