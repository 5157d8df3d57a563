pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};
pub use services::MatchPipeline;
pub use state::AppState;
