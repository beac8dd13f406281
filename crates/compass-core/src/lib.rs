pub mod config;
pub mod error;
pub mod types;

pub use config::CompassConfig;
pub use error::{CompassError, Result};
pub use types::*;
