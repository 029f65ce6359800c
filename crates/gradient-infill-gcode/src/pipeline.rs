//! G-Code processor pipeline

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::command::{Command, GcodeLine};
use crate::state::PrinterState;

/// Trait for G-Code command processors
///
/// Processors transform one command at a time. Each input line maps to exactly
/// one output line, so a processor receives a command by value and must hand
/// one back: it may modify fields of the command but cannot drop or split it.
pub trait CommandProcessor: Send + Sync {
    /// Get the name/identifier of this processor
    fn name(&self) -> &str;

    /// Get a description of what this processor does
    fn description(&self) -> &str;

    /// Process a single command
    ///
    /// `state` reflects everything emitted before this command.
    fn process(&self, command: Command, state: &PrinterState) -> Command;

    /// Check if this processor is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Arc-wrapped processor for thread-safe sharing
pub type ProcessorHandle = Arc<dyn CommandProcessor>;

/// Counters collected while a program runs through the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteReport {
    /// Total number of lines
    pub lines: usize,
    /// G0/G1/G2/G3 lines
    pub moves: usize,
    /// Moves that fed filament forward
    pub extrusion_moves: usize,
    /// Moves whose E value was rewritten
    pub reinforced_moves: usize,
    /// Recognized commands kept verbatim because they could not be parsed
    pub degraded_lines: usize,
    /// Filament fed by the input program (sum of positive E deltas)
    pub input_extrusion: f64,
    /// Filament fed by the output program (sum of positive E deltas)
    pub output_extrusion: f64,
}

impl RewriteReport {
    /// Ratio of output to input extrusion, 1.0 for an empty program
    pub fn extrusion_ratio(&self) -> f64 {
        if self.input_extrusion > 0.0 {
            self.output_extrusion / self.input_extrusion
        } else {
            1.0
        }
    }

    fn record(&mut self, command: &Command, before: &PrinterState, after: &PrinterState) {
        self.lines += 1;

        let Command::Move(mv) = command else {
            return;
        };
        self.moves += 1;
        if mv.e.is_none() {
            return;
        }

        let input_delta = after.input_e - before.input_e;
        let output_delta = after.output_e - before.output_e;
        if input_delta > 0.0 {
            self.extrusion_moves += 1;
            self.input_extrusion += input_delta;
        }
        if output_delta > 0.0 {
            self.output_extrusion += output_delta;
        }
        if command.is_rewritten() {
            self.reinforced_moves += 1;
        }
    }
}

/// G-Code command processor pipeline
///
/// Applies registered processors in order to every line and threads the
/// printer state through the pass.
///
/// # Example
/// ```ignore
/// let mut pipeline = ProcessorPipeline::new();
/// pipeline.register(Arc::new(FlowRewriter::new(model, RewriteOptions::default())));
///
/// let (lines, report) = pipeline.process_lines(program.lines, &mut PrinterState::new());
/// ```
#[derive(Clone, Default)]
pub struct ProcessorPipeline {
    processors: Vec<ProcessorHandle>,
}

impl ProcessorPipeline {
    /// Create a new empty processor pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor in the pipeline
    ///
    /// Processors are applied in the order they are registered.
    pub fn register(&mut self, processor: ProcessorHandle) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Register multiple processors at once
    pub fn register_all(&mut self, processors: Vec<ProcessorHandle>) -> &mut Self {
        self.processors.extend(processors);
        self
    }

    /// Get the number of registered processors
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Get a reference to a processor by name
    pub fn get_processor_by_name(&self, name: &str) -> Option<&ProcessorHandle> {
        self.processors.iter().find(|p| p.name() == name)
    }

    /// List all registered processors
    pub fn list_processors(&self) -> Vec<(&str, &str, bool)> {
        self.processors
            .iter()
            .map(|p| (p.name(), p.description(), p.is_enabled()))
            .collect()
    }

    /// Run one command through every enabled processor
    pub fn process_command(&self, command: Command, state: &PrinterState) -> Command {
        self.processors
            .iter()
            .filter(|p| p.is_enabled())
            .fold(command, |command, processor| {
                processor.process(command, state)
            })
    }

    /// Run a whole program through the pipeline
    ///
    /// Returns the processed lines (same count and order as the input) and
    /// the counters gathered on the way.
    pub fn process_lines(
        &self,
        lines: Vec<GcodeLine>,
        state: &mut PrinterState,
    ) -> (Vec<GcodeLine>, RewriteReport) {
        let mut report = RewriteReport::default();
        let mut output = Vec::with_capacity(lines.len());

        for line in lines {
            let command = self.process_command(line.command, state);

            let before = state.clone();
            state.apply(&command);
            report.record(&command, &before, state);

            if command.is_rewritten() {
                tracing::trace!("line {}: {}", line.number, command);
            }

            output.push(GcodeLine { command, ..line });
        }

        (output, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GcodeParser;

    /// Doubles every E word regardless of mode
    struct Doubler;

    impl CommandProcessor for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn description(&self) -> &str {
            "Doubles E values"
        }

        fn process(&self, command: Command, _state: &PrinterState) -> Command {
            match command {
                Command::Move(mut mv) => {
                    if let Some(e) = mv.e {
                        mv.set_extrusion(e * 2.0, 5);
                    }
                    Command::Move(mv)
                }
                other => other,
            }
        }
    }

    struct Disabled;

    impl CommandProcessor for Disabled {
        fn name(&self) -> &str {
            "disabled"
        }

        fn description(&self) -> &str {
            "Never runs"
        }

        fn process(&self, _command: Command, _state: &PrinterState) -> Command {
            Command::Opaque("should not appear".to_string())
        }

        fn is_enabled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_pipeline_registration() {
        let mut pipeline = ProcessorPipeline::new();
        pipeline.register(Arc::new(Doubler)).register(Arc::new(Disabled));

        assert_eq!(pipeline.processor_count(), 2);
        assert!(pipeline.get_processor_by_name("doubler").is_some());
        assert!(pipeline.get_processor_by_name("missing").is_none());
        assert_eq!(
            pipeline.list_processors(),
            vec![
                ("doubler", "Doubles E values", true),
                ("disabled", "Never runs", false)
            ]
        );
    }

    #[test]
    fn test_process_lines_keeps_line_count_and_reports() {
        let mut pipeline = ProcessorPipeline::new();
        pipeline.register_all(vec![
            Arc::new(Doubler) as ProcessorHandle,
            Arc::new(Disabled) as ProcessorHandle,
        ]);

        let program = GcodeParser::new().parse("M83\n; note\nG1 X1 E1\nG0 X5\nG1 X1 E2 ; more");
        let mut state = PrinterState::new();
        let (lines, report) = pipeline.process_lines(program.lines, &mut state);

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2].command.text(), "G1 X1 E2");
        assert_eq!(lines[4].command.text(), "G1 X1 E4 ; more");

        assert_eq!(report.lines, 5);
        assert_eq!(report.moves, 3);
        assert_eq!(report.extrusion_moves, 2);
        assert_eq!(report.reinforced_moves, 2);
        assert_eq!(report.input_extrusion, 3.0);
        assert_eq!(report.output_extrusion, 6.0);
        assert_eq!(report.extrusion_ratio(), 2.0);
        assert_eq!(state.output_e, 6.0);
    }

    #[test]
    fn test_empty_report_ratio() {
        assert_eq!(RewriteReport::default().extrusion_ratio(), 1.0);
    }
}
