pub mod app;
pub mod config;
pub mod login_handlers;
pub mod metrics;
pub mod resource_handlers;

pub use app::{build_router, AppState};
