pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use error::{Result, SwitchboardError};
