pub mod collections;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod telemetry;

pub use crate::config::AppConfig;
pub use errors::{AppError, AppResult, ErrorCode};
pub use gateway::{Direction, Document, Filter, Gateway, OrderBy, Subscription};
