//! Printer state tracked across one post-processing pass
//!
//! G-Code lines may omit any axis, meaning "unchanged". The state object
//! carries position, cumulative extrusion and the active modes from line to
//! line. It lives on the stack of a single pass and is never shared.

use gradient_infill_core::Point3D;
use serde::{Deserialize, Serialize};

use crate::command::{Command, ModeKind, MoveCommand, SetPosition};

/// How E values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrusionMode {
    /// E is a cumulative filament position (M82)
    #[default]
    Absolute,
    /// E is the amount for this move alone (M83)
    Relative,
}

/// How X/Y/Z values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositioningMode {
    /// Coordinates are absolute (G90)
    #[default]
    Absolute,
    /// Coordinates are offsets from the current position (G91)
    Relative,
}

/// Position, extrusion and modal state of the virtual printer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrinterState {
    /// Current tool position
    pub position: Point3D,
    /// Cumulative E as written in the input program
    pub input_e: f64,
    /// Cumulative E as written to the output program
    pub output_e: f64,
    /// Active extrusion mode
    pub extrusion_mode: ExtrusionMode,
    /// Active positioning mode
    pub positioning_mode: PositioningMode,
    /// Feature announced by the last `;TYPE:` marker
    pub feature: Option<String>,
    /// Whether a G91 has been seen at any point
    pub relative_positioning_seen: bool,
}

impl PrinterState {
    /// Create a state at the origin in absolute modes
    pub fn new() -> Self {
        Self::default()
    }

    /// Position the tool will be at after `mv`
    pub fn resolve_position(&self, mv: &MoveCommand) -> Point3D {
        let resolve = |current: f64, word: Option<f64>| match (word, self.positioning_mode) {
            (Some(value), PositioningMode::Absolute) => value,
            (Some(offset), PositioningMode::Relative) => current + offset,
            (None, _) => current,
        };
        Point3D::new(
            resolve(self.position.x, mv.x),
            resolve(self.position.y, mv.y),
            resolve(self.position.z, mv.z),
        )
    }

    /// Whether E words are currently relative
    pub fn is_relative_extrusion(&self) -> bool {
        self.extrusion_mode == ExtrusionMode::Relative
    }

    /// Difference between output and input cumulative extrusion
    pub fn extrusion_offset(&self) -> f64 {
        self.output_e - self.input_e
    }

    /// Advance the state past an emitted command
    ///
    /// Must be called with the command as written to the output, so that a
    /// rewritten E value becomes the new cumulative extrusion.
    pub fn apply(&mut self, command: &Command) {
        match command {
            Command::Move(mv) => self.apply_move(mv),
            Command::ModeChange(change) => self.apply_mode(change.mode),
            Command::SetPosition(set) => self.apply_set_position(set),
            Command::Feature(marker) => self.feature = Some(marker.name.clone()),
            Command::Opaque(_) => {}
        }
    }

    fn apply_move(&mut self, mv: &MoveCommand) {
        self.position = self.resolve_position(mv);

        let (Some(input), Some(output)) = (mv.e, mv.effective_e()) else {
            return;
        };
        match self.extrusion_mode {
            ExtrusionMode::Absolute => {
                self.input_e = input;
                self.output_e = output;
            }
            ExtrusionMode::Relative => {
                self.input_e += input;
                self.output_e += output;
            }
        }
    }

    // G90/G91 switch every axis including E; M82/M83 only override E.
    fn apply_mode(&mut self, mode: ModeKind) {
        match mode {
            ModeKind::AbsoluteExtrusion => self.extrusion_mode = ExtrusionMode::Absolute,
            ModeKind::RelativeExtrusion => self.extrusion_mode = ExtrusionMode::Relative,
            ModeKind::AbsolutePositioning => {
                self.positioning_mode = PositioningMode::Absolute;
                self.extrusion_mode = ExtrusionMode::Absolute;
            }
            ModeKind::RelativePositioning => {
                self.positioning_mode = PositioningMode::Relative;
                self.extrusion_mode = ExtrusionMode::Relative;
                self.relative_positioning_seen = true;
            }
        }
    }

    fn apply_set_position(&mut self, set: &SetPosition) {
        if set.is_reset_all() {
            self.position = Point3D::default();
            self.input_e = 0.0;
            self.output_e = 0.0;
            return;
        }
        if let Some(x) = set.x {
            self.position.x = x;
        }
        if let Some(y) = set.y {
            self.position.y = y;
        }
        if let Some(z) = set.z {
            self.position.z = z;
        }
        if let Some(e) = set.e {
            self.input_e = e;
            self.output_e = e;
        }
    }
}
