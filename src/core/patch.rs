//! Patch Engine
//!
//! Applies content-change events to a document's text. Columns and delete
//! lengths are measured in UTF-16 code units, matching the LSP default
//! position encoding.

use thiserror::Error;

/// A zero-based line/column coordinate inside a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// An edit replacing a span of the current text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeEdit {
    pub start: TextPosition,
    /// End of the replaced span as reported by the client. Only consulted
    /// when `deleted_length` is absent.
    pub end: Option<TextPosition>,
    pub replacement: String,
    /// Number of UTF-16 units to remove at `start`. Wins over `end`.
    pub deleted_length: Option<usize>,
}

/// One content change sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    FullReplace { text: String },
    RangeEdit(RangeEdit),
}

impl ChangeEvent {
    pub fn full(text: impl Into<String>) -> Self {
        ChangeEvent::FullReplace { text: text.into() }
    }

    /// Range edit carrying an explicit delete length and no end position
    pub fn splice(
        start: TextPosition,
        deleted_length: usize,
        replacement: impl Into<String>,
    ) -> Self {
        ChangeEvent::RangeEdit(RangeEdit {
            start,
            end: None,
            replacement: replacement.into(),
            deleted_length: Some(deleted_length),
        })
    }
}

/// Reasons a range edit cannot be applied to a text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("line {line} is past the end of the document ({line_count} lines)")]
    LineOutOfBounds { line: usize, line_count: usize },

    #[error("column {column} is past the end of line {line} ({line_length} units)")]
    ColumnOutOfBounds {
        line: usize,
        column: usize,
        line_length: usize,
    },

    #[error("cannot delete {requested} units, only {available} remain")]
    DeleteSpanOutOfBounds { requested: usize, available: usize },

    #[error("offset at line {line} splits a surrogate pair")]
    SplitsCharacter { line: usize },

    #[error("range end {end:?} precedes start {start:?}")]
    EndBeforeStart {
        start: TextPosition,
        end: TextPosition,
    },
}

/// Apply one change event to `text`, producing the new text
pub fn apply(text: &str, change: &ChangeEvent) -> Result<String, PatchError> {
    match change {
        ChangeEvent::FullReplace { text } => Ok(text.clone()),
        ChangeEvent::RangeEdit(edit) => apply_range(text, edit),
    }
}

/// Apply a batch in order, each change seeing the output of the previous one
pub fn apply_all<'a, I>(text: &str, changes: I) -> Result<String, (usize, PatchError)>
where
    I: IntoIterator<Item = &'a ChangeEvent>,
{
    let mut current = text.to_string();
    for (index, change) in changes.into_iter().enumerate() {
        current = apply(&current, change).map_err(|e| (index, e))?;
    }
    Ok(current)
}

fn apply_range(text: &str, edit: &RangeEdit) -> Result<String, PatchError> {
    let start = byte_offset(text, edit.start)?;

    let deleted = match (edit.deleted_length, edit.end) {
        (Some(length), _) => length,
        (None, Some(end)) => {
            if end < edit.start {
                return Err(PatchError::EndBeforeStart {
                    start: edit.start,
                    end,
                });
            }
            let end = byte_offset(text, end)?;
            utf16_len(&text[start..end])
        }
        (None, None) => 0,
    };

    let end = skip_units(text, start, deleted, edit.start.line)?;

    let mut patched = String::with_capacity(text.len() - (end - start) + edit.replacement.len());
    patched.push_str(&text[..start]);
    patched.push_str(&edit.replacement);
    patched.push_str(&text[end..]);
    Ok(patched)
}

/// Byte offset of `position`, walking whole lines and then UTF-16 units
/// within the target line. The column may not run into the line terminator.
fn byte_offset(text: &str, position: TextPosition) -> Result<usize, PatchError> {
    let line_start = line_start(text, position.line)?;
    let rest = &text[line_start..];

    let mut units = 0;
    for (offset, ch) in rest.char_indices() {
        if units == position.column {
            return Ok(line_start + offset);
        }
        if ch == '\n' || ch == '\r' {
            break;
        }
        units += ch.len_utf16();
        if units > position.column {
            return Err(PatchError::SplitsCharacter {
                line: position.line,
            });
        }
    }

    if units == position.column {
        // last line, column at end of text
        return Ok(text.len());
    }

    Err(PatchError::ColumnOutOfBounds {
        line: position.line,
        column: position.column,
        line_length: units,
    })
}

/// Byte offset at which zero-based `line` begins
fn line_start(text: &str, line: usize) -> Result<usize, PatchError> {
    let bytes = text.as_bytes();
    let mut current = 0;
    let mut index = 0;

    while current < line {
        match bytes[index..].iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(pos) => {
                index += pos;
                if bytes[index] == b'\r' && bytes.get(index + 1) == Some(&b'\n') {
                    index += 2;
                } else {
                    index += 1;
                }
                current += 1;
            }
            None => {
                return Err(PatchError::LineOutOfBounds {
                    line,
                    line_count: current + 1,
                });
            }
        }
    }

    Ok(index)
}

/// Advance `count` UTF-16 units from byte offset `start`, crossing line
/// terminators freely.
fn skip_units(text: &str, start: usize, count: usize, line: usize) -> Result<usize, PatchError> {
    let mut units = 0;
    for (offset, ch) in text[start..].char_indices() {
        if units == count {
            return Ok(start + offset);
        }
        units += ch.len_utf16();
        if units > count {
            return Err(PatchError::SplitsCharacter { line });
        }
    }

    if units == count {
        Ok(text.len())
    } else {
        Err(PatchError::DeleteSpanOutOfBounds {
            requested: count,
            available: units,
        })
    }
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}
