pub mod extraction;
pub mod sinks;
pub mod staging; // Per-run temporary files
pub mod report;
pub mod orchestrator; // Intake → archive → extract → route → notify → automate

pub use orchestrator::{IntakePipeline, PipelineError, RunFailure, RunReport, UploadRequest, UploadedFile};
