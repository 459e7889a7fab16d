pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod report;
pub mod services;
pub mod utils;

pub use adapters::{json_store::JsonFileStore, storage::LocalStorage, AnyStorage, AnyStore};
pub use config::{lambda::LambdaConfig, PortalConfig};
pub use core::{OutputSettings, ReportEngine, VesselReportPipeline, WeeklyReportPipeline};
pub use domain::ports::{DocumentStore, Mailer, ReportPipeline, Storage};
pub use utils::error::{PortalError, Result};
