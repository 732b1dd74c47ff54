use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// A word-aligned slice of the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Words separated by single spaces, never ending mid-word.
    pub text: String,
    /// Byte offset just past each word of `text`, in order. Holds only
    /// `start` when the chunk has no words.
    pub word_end_offsets: Vec<u64>,
    pub start: u64,
    pub at_eof: bool,
}

impl Chunk {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn word_count(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.word_end_offsets.len()
        }
    }

    pub fn end_offset(&self) -> u64 {
        self.word_end_offsets.last().copied().unwrap_or(self.start)
    }

    /// Resolves an index (negative counts from the end) into
    /// `word_end_offsets`, clamped to the valid range.
    pub fn offset_at(&self, index: isize) -> u64 {
        let len = self.word_end_offsets.len() as isize;
        if len == 0 {
            return self.start;
        }
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 {
            return self.start;
        }
        self.word_end_offsets[resolved.min(len - 1) as usize]
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Decodes one character, returning it with its encoded length. Malformed
/// sequences decode to U+FFFD covering the bytes consumed.
fn decode_next<R: BufRead>(reader: &mut R) -> io::Result<Option<(char, usize)>> {
    let lead = {
        let buf = reader.fill_buf()?;
        let Some(&lead) = buf.first() else {
            return Ok(None);
        };
        lead
    };
    reader.consume(1);

    let width = utf8_width(lead);
    if width == 0 {
        return Ok(Some((char::REPLACEMENT_CHARACTER, 1)));
    }

    let mut bytes = [lead, 0, 0, 0];
    let mut have = 1usize;
    while have < width {
        let buf = reader.fill_buf()?;
        match buf.first() {
            Some(&b) if (0x80..=0xBF).contains(&b) => {
                bytes[have] = b;
                have += 1;
                reader.consume(1);
            }
            _ => break,
        }
    }

    let ch = std::str::from_utf8(&bytes[..have])
        .ok()
        .and_then(|s| s.chars().next())
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Ok(Some((ch, have)))
}

fn is_format_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
    )
}

fn normalize_char(ch: char) -> char {
    if ch == char::REPLACEMENT_CHARACTER
        || ch.is_control()
        || (ch.is_whitespace() && ch != ' ')
        || is_format_char(ch)
    {
        ' '
    } else {
        ch
    }
}

/// Reads roughly `approx_chars` characters starting at byte `position`.
///
/// Non-printable characters become spaces and whitespace runs collapse to a
/// single separator. The chunk backtracks to the last completed word when the
/// budget runs out mid-word; a single token longer than the whole budget is
/// emitted whole.
pub fn read_chunk(path: &Path, position: u64, approx_chars: usize) -> Result<Chunk> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(position))
        .with_context(|| format!("failed to seek {} to {position}", path.display()))?;
    read_chunk_from(&mut reader, position, approx_chars)
        .with_context(|| format!("failed to read chunk from {}", path.display()))
}

fn read_chunk_from<R: BufRead>(
    reader: &mut R,
    position: u64,
    approx_chars: usize,
) -> io::Result<Chunk> {
    let limit = approx_chars.max(1);
    let mut text = String::new();
    let mut offsets = Vec::new();
    let mut pos = position;
    let mut valid_chars = 0usize;
    let mut last_boundary: Option<usize> = None;
    let mut previous_was_space = true;
    let mut in_word = false;
    let mut forcing = false;
    let mut at_eof = false;

    loop {
        let Some((raw, len)) = decode_next(reader)? else {
            if in_word {
                offsets.push(pos);
            }
            at_eof = true;
            break;
        };
        let ch = normalize_char(raw);
        let is_space = ch == ' ';

        if valid_chars >= limit && !forcing {
            if is_space && in_word {
                // Word ends exactly at the budget.
                offsets.push(pos);
                break;
            }
            if !in_word {
                break;
            }
            if let Some(boundary) = last_boundary {
                text.truncate(boundary);
                break;
            }
            forcing = true;
        }

        if is_space {
            if in_word {
                offsets.push(pos);
                in_word = false;
                if forcing {
                    break;
                }
            }
            if !previous_was_space {
                last_boundary = Some(text.len());
                text.push(' ');
                valid_chars += 1;
            }
            previous_was_space = true;
        } else {
            text.push(ch);
            valid_chars += 1;
            in_word = true;
            previous_was_space = false;
        }
        pos += len as u64;
    }

    if text.ends_with(' ') {
        text.pop();
    }
    if offsets.is_empty() {
        offsets.push(position);
    }

    Ok(Chunk {
        text,
        word_end_offsets: offsets,
        start: position,
        at_eof,
    })
}
