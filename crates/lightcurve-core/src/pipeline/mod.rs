pub mod batch;
pub mod config;
mod orchestrator;
pub mod types;

pub use batch::{batch_name, process_batch, process_directory};
pub use orchestrator::{discover_batches, run_batches};
pub use types::{
    BatchFailure, BatchReport, BatchResult, LightCurve, NoOpReporter, PhotometrySample,
    PipelineStage, ProgressReporter, StarRecord,
};
