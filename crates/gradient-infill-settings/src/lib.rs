//! Gradient Infill Settings Crate
//!
//! Handles job configuration files: loading, saving and validation of the
//! gradient settings, reinforcement targets and rewrite options.

pub mod config;
pub mod error;

pub use config::{JobConfig, TargetSpec};
pub use error::{SettingsError, SettingsResult};
