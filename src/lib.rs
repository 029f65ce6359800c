//! # Gradient Infill
//!
//! A G-Code post-processor that locally increases extrusion around
//! user-chosen reinforcement points of a sliced part.
//!
//! ## Architecture
//!
//! Gradient Infill is organized as a workspace with multiple crates:
//!
//! 1. **gradient-infill-core** - Geometry, reinforcement targets, flow model, errors
//! 2. **gradient-infill-gcode** - G-Code parsing, printer state, flow rewriting, serialization
//! 3. **gradient-infill-settings** - Job configuration files (JSON/TOML) and validation
//! 4. **gradient-infill** - Command-line binary that integrates all crates
//!
//! ## Features
//!
//! - **Lossless Rewriting**: Only E values change; line count, order, comments and
//!   line endings are preserved
//! - **Stepped Gradients**: Flow falls off from `max_flow` to `min_flow` in discrete rings
//! - **Target Shapes**: Spheres or vertical columns spanning a range of layers
//! - **Extrusion Modes**: Absolute (M82) and relative (M83) E, G92 resets

pub use gradient_infill_core::{
    flow_multiplier, ConfigError, GcodeError, GradientConfig, InfluenceShape, Point3D,
    ReinforcementModel, ReinforcementTarget, BASELINE_FLOW,
};

pub use gradient_infill_gcode::{
    postprocess, postprocess_checked, postprocess_with_options, postprocess_with_report,
    AbsoluteCarry, Command, CommandProcessor, FlowRewriter, GcodeLine, GcodeParser,
    GradientPostprocessor, PostprocessOutput, PrinterState, ProcessorPipeline, RewriteOptions,
    RewriteReport, SamplePoint,
};

pub use gradient_infill_settings::{JobConfig, SettingsError, SettingsResult, TargetSpec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Output format of log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per record
    Json,
}

/// Run a job over a G-Code text
///
/// Validates the job, rewrites the program and returns it with the report.
pub fn run_job(job: &JobConfig, gcode: &str) -> SettingsResult<PostprocessOutput> {
    job.validate()?;
    let postprocessor = GradientPostprocessor::new(job.model(), job.options.clone());
    Ok(postprocessor.run(gcode))
}

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr (stdout may carry G-Code)
/// - RUST_LOG environment variable support, `info` by default
/// - Text or JSON records
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()?,
    }

    Ok(())
}
