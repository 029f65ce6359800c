//! G-Code command types
//!
//! Every input line becomes exactly one [`GcodeLine`]. The line keeps its raw
//! text next to whatever was parsed from it, so serialization can reproduce the
//! original bytes for everything the rewriter did not touch.

use std::borrow::Cow;
use std::ops::Range;

/// Line terminator found after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    /// Last line of a text without trailing newline
    #[default]
    None,
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl LineEnding {
    /// Terminator text
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Motion word of a move command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// G0 - rapid positioning
    Rapid,
    /// G1 - linear move
    Linear,
    /// G2 - clockwise arc
    ArcCw,
    /// G3 - counter-clockwise arc
    ArcCcw,
}

impl Motion {
    /// Motion for a G number, if it is one
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Rapid),
            1 => Some(Self::Linear),
            2 => Some(Self::ArcCw),
            3 => Some(Self::ArcCcw),
            _ => None,
        }
    }

    /// Whether this is an arc move
    pub fn is_arc(&self) -> bool {
        matches!(self, Self::ArcCw | Self::ArcCcw)
    }
}

/// Replacement extrusion value for a move
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrusionRewrite {
    /// Value as written to the output (already rounded)
    pub value: f64,
    /// Formatted number replacing the original E value
    pub text: String,
}

/// A G0/G1/G2/G3 line
///
/// Axis fields are `None` when the word is absent from the line, which is
/// different from "present with the same value as before".
#[derive(Debug, Clone, PartialEq)]
pub struct MoveCommand {
    /// Original line text without terminator
    pub raw: String,
    /// Motion word
    pub motion: Motion,
    /// X word
    pub x: Option<f64>,
    /// Y word
    pub y: Option<f64>,
    /// Z word
    pub z: Option<f64>,
    /// E word
    pub e: Option<f64>,
    /// F word
    pub f: Option<f64>,
    /// Byte range of the E value inside `raw`
    pub e_span: Option<Range<usize>>,
    /// Extrusion value written instead of `e`
    pub rewrite: Option<ExtrusionRewrite>,
}

impl MoveCommand {
    /// Whether the line carries an E word
    pub fn has_extrusion(&self) -> bool {
        self.e.is_some()
    }

    /// E value as it will be emitted
    pub fn effective_e(&self) -> Option<f64> {
        self.rewrite.as_ref().map(|r| r.value).or(self.e)
    }

    /// Replace the E value, formatted with `precision` decimal places
    ///
    /// Does nothing on a line without an E word.
    pub fn set_extrusion(&mut self, value: f64, precision: u32) {
        if self.e_span.is_none() {
            return;
        }
        let text = format_number(value, precision);
        let value = text.parse().unwrap_or(value);
        self.rewrite = Some(ExtrusionRewrite { value, text });
    }

    /// Output text of this move
    pub fn text(&self) -> Cow<'_, str> {
        match (&self.rewrite, &self.e_span) {
            (Some(rewrite), Some(span)) => {
                let mut out = String::with_capacity(self.raw.len() + rewrite.text.len());
                out.push_str(&self.raw[..span.start]);
                out.push_str(&rewrite.text);
                out.push_str(&self.raw[span.end..]);
                Cow::Owned(out)
            }
            _ => Cow::Borrowed(&self.raw),
        }
    }
}

/// Modal commands that change how coordinates or E values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// M82 - absolute E
    AbsoluteExtrusion,
    /// M83 - relative E
    RelativeExtrusion,
    /// G90 - absolute positioning (all axes, including E)
    AbsolutePositioning,
    /// G91 - relative positioning (all axes, including E)
    RelativePositioning,
}

/// An M82/M83/G90/G91 line
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    /// Original line text without terminator
    pub raw: String,
    /// Mode selected by the line
    pub mode: ModeKind,
}

/// A G92 line
///
/// G92 without any axis word resets every axis to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SetPosition {
    /// Original line text without terminator
    pub raw: String,
    /// X word
    pub x: Option<f64>,
    /// Y word
    pub y: Option<f64>,
    /// Z word
    pub z: Option<f64>,
    /// E word
    pub e: Option<f64>,
}

impl SetPosition {
    /// Whether the line names no axis at all
    pub fn is_reset_all(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.e.is_none()
    }
}

/// A `;TYPE:<name>` comment announcing the feature printed next
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMarker {
    /// Original line text without terminator
    pub raw: String,
    /// Feature name, e.g. `FILL` or `WALL-INNER`
    pub name: String,
}

/// A parsed G-Code line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// G0/G1/G2/G3
    Move(MoveCommand),
    /// M82/M83/G90/G91
    ModeChange(ModeChange),
    /// G92
    SetPosition(SetPosition),
    /// `;TYPE:` comment
    Feature(FeatureMarker),
    /// Anything else, kept verbatim
    Opaque(String),
}

impl Command {
    /// Output text of this command, without terminator
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Move(mv) => mv.text(),
            Self::ModeChange(mode) => Cow::Borrowed(&mode.raw),
            Self::SetPosition(set) => Cow::Borrowed(&set.raw),
            Self::Feature(marker) => Cow::Borrowed(&marker.raw),
            Self::Opaque(raw) => Cow::Borrowed(raw),
        }
    }

    /// Original line text, ignoring any rewrite
    pub fn raw(&self) -> &str {
        match self {
            Self::Move(mv) => &mv.raw,
            Self::ModeChange(mode) => &mode.raw,
            Self::SetPosition(set) => &set.raw,
            Self::Feature(marker) => &marker.raw,
            Self::Opaque(raw) => raw,
        }
    }

    /// Move payload, if this is a move
    pub fn as_move(&self) -> Option<&MoveCommand> {
        match self {
            Self::Move(mv) => Some(mv),
            _ => None,
        }
    }

    /// Whether the output differs from the input
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Move(mv) if mv.rewrite.is_some())
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// One input line: its command and the terminator that followed it
#[derive(Debug, Clone, PartialEq)]
pub struct GcodeLine {
    /// 1-based line number
    pub number: usize,
    /// Parsed command
    pub command: Command,
    /// Terminator after the line
    pub ending: LineEnding,
}

/// Format a number with at most `precision` decimals, trailing zeros trimmed
pub fn format_number(value: f64, precision: u32) -> String {
    let mut text = format!("{:.*}", precision as usize, value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}
