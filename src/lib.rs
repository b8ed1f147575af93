pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::http::{router, serve, AppState};
pub use config::AppConfig;
pub use core::{RefreshEngine, TariffService};
pub use domain::model::{CodeTable, TariffRequest, TariffResponse};
pub use utils::error::{Result, ServiceError};
