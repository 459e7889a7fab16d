//! Report generation: filter → aggregate → render.

pub mod filter;
pub mod render;
pub mod vessel_report;
pub mod weekly_report;
pub mod xlsx;

pub use filter::{DateRange, PortSelection, ReportFilter};
pub use render::ReportFormat;
pub use vessel_report::VesselReport;
pub use weekly_report::WeeklyReport;
