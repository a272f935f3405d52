pub mod clock;
pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use error::FinancingError;
pub use startup::{AppState, Application};
