//! # Gradient Infill G-Code
//!
//! Line-oriented G-Code post-processing for gradient reinforcement.
//! Parses a sliced program, scales the extrusion of moves that pass near
//! reinforcement targets and writes the program back with every other byte
//! untouched.
//!
//! ## Pipeline
//!
//! ```text
//! text ──► GcodeParser ──► ProcessorPipeline (FlowRewriter) ──► serialize ──► text
//!                                 │
//!                           PrinterState
//! ```
//!
//! The output always has exactly as many lines as the input, in the same
//! order. Only the E value of a move line can change.

pub mod command;
pub mod parser;
pub mod pipeline;
pub mod rewriter;
pub mod serializer;
pub mod state;

use std::sync::Arc;

use gradient_infill_core::{ConfigError, GradientConfig, ReinforcementModel, ReinforcementTarget};
use serde::{Deserialize, Serialize};

pub use command::{
    format_number, Command, ExtrusionRewrite, FeatureMarker, GcodeLine, LineEnding, ModeChange,
    ModeKind, Motion, MoveCommand, SetPosition,
};
pub use parser::{GcodeParser, ParsedProgram};
pub use pipeline::{CommandProcessor, ProcessorHandle, ProcessorPipeline, RewriteReport};
pub use rewriter::{AbsoluteCarry, FlowRewriter, RewriteOptions, SamplePoint, MAX_E_PRECISION};
pub use serializer::serialize;
pub use state::{ExtrusionMode, PositioningMode, PrinterState};

/// Rewritten program plus the counters gathered while producing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostprocessOutput {
    /// Output G-Code text
    pub gcode: String,
    /// Line and extrusion counters
    pub report: RewriteReport,
}

/// Parser and processor pipeline for one reinforcement job
#[derive(Clone)]
pub struct GradientPostprocessor {
    parser: GcodeParser,
    pipeline: ProcessorPipeline,
}

impl GradientPostprocessor {
    /// Create a post-processor that reinforces around `model`
    pub fn new(model: ReinforcementModel, options: RewriteOptions) -> Self {
        let mut pipeline = ProcessorPipeline::new();
        pipeline.register(Arc::new(FlowRewriter::new(model, options)));
        Self {
            parser: GcodeParser::new(),
            pipeline,
        }
    }

    /// Processor pipeline in use
    pub fn pipeline(&self) -> &ProcessorPipeline {
        &self.pipeline
    }

    /// Rewrite a program and report what changed
    pub fn run(&self, gcode: &str) -> PostprocessOutput {
        let program = self.parser.parse(gcode);
        let degraded = program.diagnostics.len();
        if degraded > 0 {
            tracing::warn!("{} command line(s) kept verbatim after parse errors", degraded);
        }

        let mut state = PrinterState::new();
        let (lines, mut report) = self.pipeline.process_lines(program.lines, &mut state);
        report.degraded_lines = degraded;

        tracing::info!(
            "Processed {} lines: {} of {} extrusion moves reinforced, extrusion x{:.3}",
            report.lines,
            report.reinforced_moves,
            report.extrusion_moves,
            report.extrusion_ratio()
        );

        PostprocessOutput {
            gcode: serialize(&lines),
            report,
        }
    }
}

/// Rewrite `gcode` so extrusion is scaled near the given targets
///
/// Lines are matched one-to-one with the input. Moves outside every target,
/// travel moves, retractions and all non-move lines are emitted unchanged.
///
/// # Example
/// ```
/// use gradient_infill_core::{GradientConfig, Point3D, ReinforcementTarget};
/// use gradient_infill_gcode::postprocess;
///
/// let target = ReinforcementTarget::new(Point3D::new(10.0, 10.0, 1.0), 20.0, 0.0);
/// let out = postprocess("G1 X10 Y10 Z1 E5 F1200", &GradientConfig::flat(200.0), &[target]);
/// assert_eq!(out, "G1 X10 Y10 Z1 E10 F1200");
/// ```
pub fn postprocess(
    gcode: &str,
    config: &GradientConfig,
    targets: &[ReinforcementTarget],
) -> String {
    postprocess_with_options(gcode, config, targets, &RewriteOptions::default())
}

/// [`postprocess`] with explicit rewrite options
pub fn postprocess_with_options(
    gcode: &str,
    config: &GradientConfig,
    targets: &[ReinforcementTarget],
    options: &RewriteOptions,
) -> String {
    let model = ReinforcementModel::new(targets.to_vec(), *config);
    if model.is_noop() {
        tracing::debug!("No reinforcement targets, passing program through");
        return gcode.to_string();
    }
    GradientPostprocessor::new(model, options.clone()).run(gcode).gcode
}

/// [`postprocess_with_options`] that also returns the rewrite counters
pub fn postprocess_with_report(
    gcode: &str,
    config: &GradientConfig,
    targets: &[ReinforcementTarget],
    options: &RewriteOptions,
) -> PostprocessOutput {
    let model = ReinforcementModel::new(targets.to_vec(), *config);
    GradientPostprocessor::new(model, options.clone()).run(gcode)
}

/// [`postprocess`] that rejects invalid settings or targets first
pub fn postprocess_checked(
    gcode: &str,
    config: &GradientConfig,
    targets: &[ReinforcementTarget],
) -> Result<String, ConfigError> {
    let model = ReinforcementModel::new(targets.to_vec(), *config);
    model.validate()?;
    Ok(postprocess(gcode, config, targets))
}
