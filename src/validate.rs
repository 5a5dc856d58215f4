//! Validation of text produced by rules.
//!
//! The patched file is never parsed as a whole. Instead, every fragment a
//! rule inserts is scanned for string spans (`'...'`, `"..."`, `` `...` ``)
//! that contain a raw line break. That is the defect earlier hand-written
//! repair passes kept introducing: a `.join('\n')` written out with a real
//! newline between the quotes.
//!
//! # Hard Rules (Never Violate)
//!
//! 1. **No raw line breaks in strings**: a raw `\n` or `\r` between the
//!    delimiters of any string span is an error, including template literals.
//! 2. **Report, don't repair**: a malformed fragment is rejected. Only an
//!    explicit rule may rewrite text.

use thiserror::Error;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(
        "raw line break inside {delimiter}-delimited string at line {}, column {}: {}",
        .location.line, .location.column, .location.context
    )]
    StringLineBreak {
        delimiter: char,
        location: ErrorLocation,
    },

    #[error(
        "unterminated {delimiter}-delimited string starting at line {}, column {}",
        .location.line, .location.column
    )]
    UnterminatedString {
        delimiter: char,
        location: ErrorLocation,
    },
}

impl ValidationError {
    pub fn location(&self) -> &ErrorLocation {
        match self {
            ValidationError::StringLineBreak { location, .. }
            | ValidationError::UnterminatedString { location, .. } => location,
        }
    }
}

/// Location of a problem in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorLocation {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
}

impl ErrorLocation {
    fn at(text: &str, byte_start: usize, byte_end: usize) -> Self {
        let before = &text[..byte_start];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;

        // Up to 20 bytes either side, widened to char boundaries
        let mut context_start = byte_start.saturating_sub(20);
        while !text.is_char_boundary(context_start) {
            context_start -= 1;
        }
        let mut context_end = (byte_end + 20).min(text.len());
        while !text.is_char_boundary(context_end) {
            context_end += 1;
        }
        let context = text[context_start..context_end]
            .replace('\r', "\\r")
            .replace('\n', "\\n");

        Self {
            byte_start,
            byte_end,
            line,
            column,
            context,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    /// Outside any string. `interpolation` marks the body of a `${...}`.
    Code { braces: usize, interpolation: bool },
    Quoted { delimiter: char, start: usize },
    Template { start: usize },
    LineComment,
    BlockComment,
}

/// Check that no string span in `text` contains a raw line break.
///
/// The lexer knows about backslash escapes, `${...}` nesting inside template
/// literals, and `//` / `/* */` comments in code position. It does not know
/// about regex literals or apostrophes in JSX text; rules inserting such text
/// should opt out of the check.
pub fn check_fragment(text: &str) -> Result<(), ValidationError> {
    let mut stack = vec![Mode::Code {
        braces: 0,
        interpolation: false,
    }];
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let top = match stack.last() {
            Some(mode) => *mode,
            None => break,
        };
        let next = chars.peek().map(|&(_, n)| n);

        match top {
            Mode::Code {
                braces,
                interpolation,
            } => match c {
                '\'' | '"' => stack.push(Mode::Quoted {
                    delimiter: c,
                    start: i,
                }),
                '`' => stack.push(Mode::Template { start: i }),
                '/' if next == Some('/') => {
                    chars.next();
                    stack.push(Mode::LineComment);
                }
                '/' if next == Some('*') => {
                    chars.next();
                    stack.push(Mode::BlockComment);
                }
                '{' => set_braces(&mut stack, braces + 1),
                '}' if braces > 0 => set_braces(&mut stack, braces - 1),
                '}' if interpolation => {
                    stack.pop();
                }
                _ => {}
            },
            Mode::Quoted { delimiter, .. } => match c {
                '\\' => {
                    chars.next();
                }
                '\n' | '\r' => {
                    return Err(ValidationError::StringLineBreak {
                        delimiter,
                        location: ErrorLocation::at(text, i, i + 1),
                    });
                }
                c if c == delimiter => {
                    stack.pop();
                }
                _ => {}
            },
            Mode::Template { .. } => match c {
                '\\' => {
                    chars.next();
                }
                '`' => {
                    stack.pop();
                }
                '$' if next == Some('{') => {
                    chars.next();
                    stack.push(Mode::Code {
                        braces: 0,
                        interpolation: true,
                    });
                }
                '\n' | '\r' => {
                    return Err(ValidationError::StringLineBreak {
                        delimiter: '`',
                        location: ErrorLocation::at(text, i, i + 1),
                    });
                }
                _ => {}
            },
            Mode::LineComment => {
                if c == '\n' {
                    stack.pop();
                }
            }
            Mode::BlockComment => {
                if c == '*' && next == Some('/') {
                    chars.next();
                    stack.pop();
                }
            }
        }
    }

    let open = stack.iter().rev().find_map(|mode| match *mode {
        Mode::Quoted { delimiter, start } => Some((delimiter, start)),
        Mode::Template { start } => Some(('`', start)),
        _ => None,
    });
    if let Some((delimiter, start)) = open {
        return Err(ValidationError::UnterminatedString {
            delimiter,
            location: ErrorLocation::at(text, start, start + 1),
        });
    }

    Ok(())
}

fn set_braces(stack: &mut [Mode], value: usize) {
    if let Some(Mode::Code { braces, .. }) = stack.last_mut() {
        *braces = value;
    }
}

/// Find `.join(` calls whose separator string is not closed on the same line.
///
/// Advisory check run after patching. Each returned location points at the
/// opening quote of the separator.
pub fn find_broken_joins(document: &str) -> Vec<ErrorLocation> {
    const NEEDLE: &str = ".join(";

    let mut found = Vec::new();
    let mut line_offset = 0;

    for line in document.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);

        for (pos, _) in body.match_indices(NEEDLE) {
            let quote_at = pos + NEEDLE.len();
            let Some(delimiter) = body[quote_at..].chars().next() else {
                continue;
            };
            if !matches!(delimiter, '\'' | '"' | '`') {
                continue;
            }
            if !closes_on_line(&body[quote_at + 1..], delimiter) {
                let start = line_offset + quote_at;
                found.push(ErrorLocation::at(document, start, start + 1));
            }
        }

        line_offset += line.len();
    }

    found
}

fn closes_on_line(rest: &str, delimiter: char) -> bool {
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == delimiter {
            return true;
        }
    }
    false
}
