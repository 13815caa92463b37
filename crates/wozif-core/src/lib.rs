pub mod config;
pub mod error;
pub mod prompt;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{Result, WozifError};
pub use types::*;
