pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{LocalStorage, TomlConfig};

pub use crate::core::{flow::FlowEngine, pipeline::BaselinePipeline};
pub use utils::error::{FlowError, Result};
