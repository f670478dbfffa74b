pub mod config;
pub mod types;

pub use config::{StrideConfig, parse_duration};
pub use types::*;
