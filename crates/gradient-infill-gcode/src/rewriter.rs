//! Flow rewriter
//!
//! Rescales the extrusion of printing moves by the multiplier the
//! reinforcement model reports for the move's sample point. Only the E value
//! of a move line is ever replaced; motion and every other word stay as they
//! were.
//!
//! Extrusion delta of a move:
//! - relative E (M83): the E word itself
//! - absolute E (M82): the E word minus the previous cumulative E
//!
//! Moves without E, or with a delta `<= 0` (travel, retraction), keep their
//! original flow.

use gradient_infill_core::{Point3D, ReinforcementModel, BASELINE_FLOW};
use serde::{Deserialize, Serialize};

use crate::command::{Command, MoveCommand};
use crate::pipeline::CommandProcessor;
use crate::state::PrinterState;

/// Which point of a move is checked against the targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePoint {
    /// Position after the move
    #[default]
    Endpoint,
    /// Halfway between the start and end of the move
    Midpoint,
}

/// How absolute E values after a rewritten move are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsoluteCarry {
    /// Later E words are left untouched; the delta of a move is measured from
    /// the cumulative E actually emitted before it
    #[default]
    Anchor,
    /// Every later E word is shifted by the extra filament added so far, so
    /// each move keeps its own delta. G92 resets the shift.
    Shift,
}

/// Highest number of decimals written for rewritten E values
pub const MAX_E_PRECISION: u32 = 10;

fn default_precision() -> u32 {
    5
}

/// Tuning knobs of the flow rewriter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteOptions {
    /// Point of a move that is tested against the targets
    pub sample_point: SamplePoint,
    /// Only reinforce moves inside these `;TYPE:` features (all moves if `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    /// Treatment of absolute E values after a rewritten move
    pub absolute_carry: AbsoluteCarry,
    /// Stop reinforcing once relative positioning (G91) is seen
    pub halt_on_relative_positioning: bool,
    /// Decimal places of rewritten E values, capped at [`MAX_E_PRECISION`]
    #[serde(default = "default_precision")]
    pub e_precision: u32,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            sample_point: SamplePoint::Endpoint,
            features: None,
            absolute_carry: AbsoluteCarry::Anchor,
            halt_on_relative_positioning: false,
            e_precision: default_precision(),
        }
    }
}

impl RewriteOptions {
    /// Restrict reinforcement to the given features
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a move in `feature` may be reinforced
    pub fn allows_feature(&self, feature: Option<&str>) -> bool {
        match (&self.features, feature) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(allowed), Some(name)) => allowed.iter().any(|f| f.eq_ignore_ascii_case(name)),
        }
    }
}

/// Rescales extrusion around reinforcement targets
#[derive(Debug, Clone)]
pub struct FlowRewriter {
    model: ReinforcementModel,
    options: RewriteOptions,
}

impl FlowRewriter {
    /// Create a rewriter for a target model
    pub fn new(model: ReinforcementModel, options: RewriteOptions) -> Self {
        Self { model, options }
    }

    /// Reinforcement model in use
    pub fn model(&self) -> &ReinforcementModel {
        &self.model
    }

    /// Options in use
    pub fn options(&self) -> &RewriteOptions {
        &self.options
    }

    fn precision(&self) -> u32 {
        self.options.e_precision.min(MAX_E_PRECISION)
    }

    fn may_reinforce(&self, state: &PrinterState) -> bool {
        if self.options.halt_on_relative_positioning && state.relative_positioning_seen {
            return false;
        }
        self.options.allows_feature(state.feature.as_deref())
    }

    fn sample_point(&self, state: &PrinterState, mv: &MoveCommand) -> Point3D {
        let end = state.resolve_position(mv);
        match self.options.sample_point {
            SamplePoint::Endpoint => end,
            SamplePoint::Midpoint => state.position.midpoint(&end),
        }
    }

    /// Extrusion delta of a move with E word `e`
    fn extrusion_delta(&self, state: &PrinterState, e: f64) -> f64 {
        if state.is_relative_extrusion() {
            return e;
        }
        match self.options.absolute_carry {
            AbsoluteCarry::Anchor => e - state.output_e,
            AbsoluteCarry::Shift => e - state.input_e,
        }
    }

    fn rewrite_move(&self, mut mv: MoveCommand, state: &PrinterState) -> MoveCommand {
        let Some(e) = mv.e else {
            return mv;
        };

        let delta = self.extrusion_delta(state, e);
        let multiplier = if delta > 0.0 && self.may_reinforce(state) {
            self.model.multiplier_at(&self.sample_point(state, &mv))
        } else {
            BASELINE_FLOW
        };

        let shifting = !state.is_relative_extrusion()
            && self.options.absolute_carry == AbsoluteCarry::Shift
            && state.extrusion_offset() != 0.0;
        if multiplier == BASELINE_FLOW && !shifting {
            return mv;
        }

        let scaled = delta * multiplier / 100.0;
        let new_e = if state.is_relative_extrusion() {
            scaled
        } else {
            state.output_e + scaled
        };

        // Below output precision the original text is kept
        let precision = self.precision();
        let tolerance = 0.5 * 10f64.powi(-(precision as i32));
        if (new_e - e).abs() >= tolerance {
            mv.set_extrusion(new_e, precision);
        }
        mv
    }
}

impl CommandProcessor for FlowRewriter {
    fn name(&self) -> &str {
        "flow_rewriter"
    }

    fn description(&self) -> &str {
        "Scales extrusion of moves near reinforcement targets"
    }

    fn process(&self, command: Command, state: &PrinterState) -> Command {
        match command {
            Command::Move(mv) => Command::Move(self.rewrite_move(mv, state)),
            other => other,
        }
    }

    fn is_enabled(&self) -> bool {
        !self.model.is_noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GcodeParser;
    use gradient_infill_core::{GradientConfig, ReinforcementTarget};

    fn rewriter(targets: Vec<ReinforcementTarget>, config: GradientConfig) -> FlowRewriter {
        FlowRewriter::new(ReinforcementModel::new(targets, config), RewriteOptions::default())
    }

    fn parse_move(line: &str) -> Command {
        GcodeParser::new().parse_line(1, line).unwrap()
    }

    #[test]
    fn test_scenario_flat_doubling() {
        let target = ReinforcementTarget::new(Point3D::new(10.0, 10.0, 1.0), 20.0, 0.0);
        let rw = rewriter(vec![target], GradientConfig::flat(200.0));
        let out = rw.process(parse_move("G1 X10 Y10 Z1 E5 F1200"), &PrinterState::new());
        assert_eq!(out.text(), "G1 X10 Y10 Z1 E10 F1200");
    }

    #[test]
    fn test_scenario_flat_center_550() {
        let target = ReinforcementTarget::new(Point3D::new(10.0, 10.0, 1.0), 1.0, 0.0);
        let config = GradientConfig {
            min_flow: 100.0,
            gradient_discretization: 4,
            ..GradientConfig::flat(550.0)
        };
        let rw = rewriter(vec![target], config);
        let out = rw.process(parse_move("G1 X10 Y10 Z1 E5 F1200"), &PrinterState::new());
        assert_eq!(out.text(), "G1 X10 Y10 Z1 E27.5 F1200");
    }

    #[test]
    fn test_travel_and_retraction_untouched() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 50.0, 0.0);
        let rw = rewriter(vec![target], GradientConfig::flat(300.0));
        let state = PrinterState {
            output_e: 10.0,
            input_e: 10.0,
            ..PrinterState::new()
        };

        for line in ["G0 X1 Y1", "G1 X2 Y2 E9.2", "G1 E10"] {
            let out = rw.process(parse_move(line), &state);
            assert_eq!(out.text(), line);
            assert!(!out.is_rewritten());
        }
    }

    #[test]
    fn test_absolute_anchor_measures_from_emitted_e() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 5.0, 0.0);
        let rw = rewriter(vec![target], GradientConfig::flat(200.0));
        // Previous move was reinforced: input reached 5, output 8
        let state = PrinterState {
            position: Point3D::new(1.0, 0.0, 0.0),
            input_e: 5.0,
            output_e: 8.0,
            ..PrinterState::new()
        };
        let out = rw.process(parse_move("G1 X2 E10"), &state);
        // delta = 10 - 8 = 2, doubled = 4
        assert_eq!(out.text(), "G1 X2 E12");

        // Outside the target the E word is kept as is
        let out = rw.process(parse_move("G1 X20 E12"), &state);
        assert_eq!(out.text(), "G1 X20 E12");
    }

    #[test]
    fn test_absolute_shift_preserves_later_deltas() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 5.0, 0.0);
        let options = RewriteOptions {
            absolute_carry: AbsoluteCarry::Shift,
            ..RewriteOptions::default()
        };
        let rw = FlowRewriter::new(
            ReinforcementModel::new(vec![target], GradientConfig::flat(200.0)),
            options,
        );
        let state = PrinterState {
            position: Point3D::new(1.0, 0.0, 0.0),
            input_e: 5.0,
            output_e: 8.0,
            ..PrinterState::new()
        };

        // Outside: delta 1 kept, shifted by the 3mm already added
        let out = rw.process(parse_move("G1 X20 E6"), &state);
        assert_eq!(out.text(), "G1 X20 E9");

        // Retraction is shifted too
        let out = rw.process(parse_move("G1 E4.2"), &state);
        assert_eq!(out.text(), "G1 E7.2");

        // Inside: delta 1 doubled on top of the emitted 8
        let out = rw.process(parse_move("G1 X0 E6"), &state);
        assert_eq!(out.text(), "G1 X0 E10");
    }

    #[test]
    fn test_relative_extrusion_scales_word() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.2), 10.0, 0.0);
        let rw = rewriter(vec![target], GradientConfig::flat(150.0));
        let state = PrinterState {
            extrusion_mode: crate::state::ExtrusionMode::Relative,
            position: Point3D::new(0.0, 0.0, 0.2),
            ..PrinterState::new()
        };
        let out = rw.process(parse_move("G1 X1 Y1 E0.04 ; infill"), &state);
        assert_eq!(out.text(), "G1 X1 Y1 E0.06 ; infill");
    }

    #[test]
    fn test_feature_filter() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 10.0, 0.0);
        let rw = FlowRewriter::new(
            ReinforcementModel::new(vec![target], GradientConfig::flat(200.0)),
            RewriteOptions::default().with_features(["FILL"]),
        );
        let mut state = PrinterState::new();
        state.extrusion_mode = crate::state::ExtrusionMode::Relative;

        state.feature = Some("WALL-OUTER".to_string());
        assert_eq!(rw.process(parse_move("G1 X1 E1"), &state).text(), "G1 X1 E1");

        state.feature = Some("fill".to_string());
        assert_eq!(rw.process(parse_move("G1 X1 E1"), &state).text(), "G1 X1 E2");

        state.feature = None;
        assert_eq!(rw.process(parse_move("G1 X1 E1"), &state).text(), "G1 X1 E1");
    }

    #[test]
    fn test_halt_on_relative_positioning() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 10.0, 0.0);
        let rw = FlowRewriter::new(
            ReinforcementModel::new(vec![target], GradientConfig::flat(200.0)),
            RewriteOptions {
                halt_on_relative_positioning: true,
                ..RewriteOptions::default()
            },
        );
        let state = PrinterState {
            extrusion_mode: crate::state::ExtrusionMode::Relative,
            relative_positioning_seen: true,
            ..PrinterState::new()
        };
        assert_eq!(rw.process(parse_move("G1 X1 E1"), &state).text(), "G1 X1 E1");
    }

    #[test]
    fn test_midpoint_sampling() {
        // Endpoint is outside the target, midpoint is inside
        let target = ReinforcementTarget::new(Point3D::new(5.0, 0.0, 0.0), 2.0, 0.0);
        let state = PrinterState {
            extrusion_mode: crate::state::ExtrusionMode::Relative,
            ..PrinterState::new()
        };
        let endpoint = rewriter(vec![target], GradientConfig::flat(200.0));
        assert_eq!(
            endpoint.process(parse_move("G1 X10 E1"), &state).text(),
            "G1 X10 E1"
        );

        let midpoint = FlowRewriter::new(
            ReinforcementModel::new(vec![target], GradientConfig::flat(200.0)),
            RewriteOptions {
                sample_point: SamplePoint::Midpoint,
                ..RewriteOptions::default()
            },
        );
        assert_eq!(
            midpoint.process(parse_move("G1 X10 E1"), &state).text(),
            "G1 X10 E2"
        );
    }

    #[test]
    fn test_disabled_without_targets() {
        let rw = rewriter(vec![], GradientConfig::default());
        assert!(!rw.is_enabled());
    }

    #[test]
    fn test_precision_is_capped() {
        let target = ReinforcementTarget::new(Point3D::new(0.0, 0.0, 0.0), 10.0, 0.0);
        let rw = FlowRewriter::new(
            ReinforcementModel::new(vec![target], GradientConfig::flat(100.0 / 3.0 * 10.0)),
            RewriteOptions {
                e_precision: u32::MAX,
                ..RewriteOptions::default()
            },
        );
        let state = PrinterState {
            extrusion_mode: crate::state::ExtrusionMode::Relative,
            ..PrinterState::new()
        };
        let out = rw.process(parse_move("G1 X1 E0.1"), &state);
        assert_eq!(out.text(), "G1 X1 E0.3333333333");
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let options: RewriteOptions = serde_json::from_str(r#"{"features": ["FILL"]}"#).unwrap();
        assert_eq!(options.e_precision, 5);
        assert_eq!(options.absolute_carry, AbsoluteCarry::Anchor);
        assert!(options.allows_feature(Some("FILL")));
        assert!(!options.allows_feature(Some("SKIN")));
    }
}
