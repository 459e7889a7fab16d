pub mod engine;
pub mod report_pipeline;

pub use crate::domain::ports::{DocumentStore, ReportPipeline, Storage};
pub use crate::utils::error::Result;
pub use engine::ReportEngine;
pub use report_pipeline::{OutputSettings, VesselReportPipeline, WeeklyReportPipeline};
