pub mod ai;
pub mod app;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod errors;
pub mod favorites;
pub mod handlers;
pub mod metrics;
pub mod mock;
pub mod models;
pub mod ranking;
pub mod state;
pub mod storage;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
