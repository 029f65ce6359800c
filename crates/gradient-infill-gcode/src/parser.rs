//! G-Code line parser
//!
//! Turns raw text into one [`GcodeLine`] per input line. Only the commands the
//! flow rewriter needs are interpreted (moves, mode changes, G92 and feature
//! markers); everything else is carried as [`Command::Opaque`].
//!
//! Parsing never fails. A recognized command with a malformed word degrades to
//! `Opaque` and the problem is recorded as a [`GcodeError`] diagnostic.

use std::ops::Range;
use std::sync::OnceLock;

use gradient_infill_core::GcodeError;
use regex::Regex;

use crate::command::{
    Command, FeatureMarker, GcodeLine, LineEnding, ModeChange, ModeKind, Motion, MoveCommand,
    SetPosition,
};

/// Result of parsing a whole program
#[derive(Debug, Clone, Default)]
pub struct ParsedProgram {
    /// One entry per input line, in order
    pub lines: Vec<GcodeLine>,
    /// Lines that looked like commands but had to be kept verbatim
    pub diagnostics: Vec<GcodeError>,
}

impl ParsedProgram {
    /// Number of lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the program has no lines
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Command head recognized at the start of a line
#[derive(Debug, Clone, Copy, PartialEq)]
enum Head {
    Motion(Motion),
    Mode(ModeKind),
    SetPosition,
}

/// A single address word (letter plus number text)
#[derive(Debug, Clone)]
struct Word<'a> {
    letter: char,
    value: &'a str,
    span: Range<usize>,
}

/// G-Code parser
#[derive(Debug, Clone, Default)]
pub struct GcodeParser;

impl GcodeParser {
    /// Create a new G-Code parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a complete G-Code text
    pub fn parse(&self, text: &str) -> ParsedProgram {
        let mut program = ParsedProgram::default();

        for (index, (line, ending)) in split_lines(text).enumerate() {
            let number = index + 1;
            let command = match self.parse_line(number, line) {
                Ok(command) => command,
                Err(error) => {
                    tracing::debug!("Keeping line {} verbatim: {}", number, error);
                    program.diagnostics.push(error);
                    Command::Opaque(line.to_string())
                }
            };
            program.lines.push(GcodeLine {
                number,
                command,
                ending,
            });
        }

        program
    }

    /// Parse one line (without terminator)
    ///
    /// Lines that are not commands of interest are returned as `Opaque`.
    /// An error means the line is a move, mode change or G92 that could not
    /// be understood.
    pub fn parse_line(&self, line_number: usize, line: &str) -> Result<Command, GcodeError> {
        if let Some(name) = feature_name(line) {
            return Ok(Command::Feature(FeatureMarker {
                raw: line.to_string(),
                name,
            }));
        }

        let Some(head) = command_head(line) else {
            return Ok(Command::Opaque(line.to_string()));
        };

        match head {
            Head::Mode(mode) => Ok(Command::ModeChange(ModeChange {
                raw: line.to_string(),
                mode,
            })),
            Head::Motion(motion) => {
                let words = scan_words(line_number, line)?;
                let axes = Axes::collect(line_number, &words)?;
                Ok(Command::Move(MoveCommand {
                    raw: line.to_string(),
                    motion,
                    x: axes.x,
                    y: axes.y,
                    z: axes.z,
                    e: axes.e,
                    f: axes.f,
                    e_span: axes.e_span,
                    rewrite: None,
                }))
            }
            Head::SetPosition => {
                let words = scan_words(line_number, line)?;
                let axes = Axes::collect(line_number, &words)?;
                Ok(Command::SetPosition(SetPosition {
                    raw: line.to_string(),
                    x: axes.x,
                    y: axes.y,
                    z: axes.z,
                    e: axes.e,
                }))
            }
        }
    }
}

/// Split text into lines, keeping track of each terminator
fn split_lines(text: &str) -> impl Iterator<Item = (&str, LineEnding)> {
    text.split_inclusive('\n').map(|chunk| {
        if let Some(line) = chunk.strip_suffix("\r\n") {
            (line, LineEnding::CrLf)
        } else if let Some(line) = chunk.strip_suffix('\n') {
            (line, LineEnding::Lf)
        } else {
            (chunk, LineEnding::None)
        }
    })
}

fn feature_name(line: &str) -> Option<String> {
    static FEATURE_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = FEATURE_REGEX
        .get_or_init(|| Regex::new(r"^\s*;\s*TYPE:\s*(.*?)\s*$").expect("invalid regex pattern"));
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .filter(|name| !name.is_empty())
}

fn command_head(line: &str) -> Option<Head> {
    static HEAD_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = HEAD_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:[Nn]\d+\s*)?([GgMm])(\d+)(\.\d+)?").expect("invalid regex pattern")
    });

    let caps = regex.captures(line)?;
    if caps.get(3).is_some() {
        return None;
    }
    let letter = caps.get(1)?.as_str().to_ascii_uppercase();
    let code: u32 = caps.get(2)?.as_str().parse().ok()?;

    match (letter.as_str(), code) {
        ("G", 0..=3) => Motion::from_code(code).map(Head::Motion),
        ("G", 90) => Some(Head::Mode(ModeKind::AbsolutePositioning)),
        ("G", 91) => Some(Head::Mode(ModeKind::RelativePositioning)),
        ("G", 92) => Some(Head::SetPosition),
        ("M", 82) => Some(Head::Mode(ModeKind::AbsoluteExtrusion)),
        ("M", 83) => Some(Head::Mode(ModeKind::RelativeExtrusion)),
        _ => None,
    }
}

/// Split the code part of a line (before any `;`) into address words
fn scan_words(line_number: usize, line: &str) -> Result<Vec<Word<'_>>, GcodeError> {
    let code = line.split(';').next().unwrap_or("");

    if code.contains('(') {
        return Err(GcodeError::Unsupported {
            line_number,
            reason: "parenthesis comment inside command".to_string(),
        });
    }
    if code.contains('*') {
        return Err(GcodeError::Unsupported {
            line_number,
            reason: "line carries a checksum".to_string(),
        });
    }

    let bytes = code.as_bytes();
    let mut words = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if !byte.is_ascii_alphabetic() {
            let found = code[i..].chars().next().unwrap_or('?');
            return Err(GcodeError::InvalidSyntax {
                line_number,
                reason: format!("unexpected character '{}'", found),
            });
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && matches!(bytes[end], b'0'..=b'9' | b'.' | b'+' | b'-') {
            end += 1;
        }
        words.push(Word {
            letter: byte.to_ascii_uppercase() as char,
            value: &code[start..end],
            span: start..end,
        });
        i = end;
    }

    Ok(words)
}

/// Axis words of a move or G92 line
#[derive(Debug, Default)]
struct Axes {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    e: Option<f64>,
    f: Option<f64>,
    e_span: Option<Range<usize>>,
}

impl Axes {
    fn collect(line_number: usize, words: &[Word<'_>]) -> Result<Self, GcodeError> {
        let mut axes = Axes::default();

        for word in words {
            let slot = match word.letter {
                'X' => &mut axes.x,
                'Y' => &mut axes.y,
                'Z' => &mut axes.z,
                'E' => &mut axes.e,
                'F' => &mut axes.f,
                _ => continue,
            };
            if slot.is_some() {
                return Err(GcodeError::DuplicateParameter {
                    line_number,
                    param: word.letter,
                });
            }
            let value = parse_value(line_number, word)?;
            *slot = Some(value);
            if word.letter == 'E' {
                axes.e_span = Some(word.span.clone());
            }
        }

        Ok(axes)
    }
}

fn parse_value(line_number: usize, word: &Word<'_>) -> Result<f64, GcodeError> {
    match word.value.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(GcodeError::InvalidParameter {
            line_number,
            param: word.letter,
            reason: format!("not a number: '{}'", word.value),
        }),
    }
}
