//! G-Code serialization

use crate::command::GcodeLine;

/// Join processed lines back into program text
///
/// Each line is written with the terminator it was read with, so untouched
/// lines come out byte-for-byte identical.
pub fn serialize(lines: &[GcodeLine]) -> String {
    let capacity = lines
        .iter()
        .map(|line| line.command.raw().len() + 2)
        .sum();
    let mut out = String::with_capacity(capacity);
    for line in lines {
        out.push_str(&line.command.text());
        out.push_str(line.ending.as_str());
    }
    out
}
