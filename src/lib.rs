pub mod api;
pub mod auth;
pub mod backup;
pub mod config;
pub mod cron;
pub mod database;
pub mod email;
pub mod error;
pub mod integrity;
pub mod state;

pub use error::AppError;
