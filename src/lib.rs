pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod poll;
pub mod profile;
pub mod query;
pub mod routes;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
