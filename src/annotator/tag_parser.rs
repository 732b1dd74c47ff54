use crate::annotator::category::Category;
use crate::annotator::segment::Segment;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name>` with the raw marker text.
    Open { name: &'a str, raw: &'a str },
    /// `</name>` with the raw marker text.
    Close { name: &'a str, raw: &'a str },
    Text(&'a str),
}

fn is_tag_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Matches `<name>` or `</name>` at the start of `input`, returning the
/// closing flag, the name and the marker length in bytes.
fn match_marker(input: &str) -> Option<(bool, &str, usize)> {
    let rest = input.strip_prefix('<')?;
    let (closing, body) = match rest.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, rest),
    };
    let name_len = body
        .char_indices()
        .find(|(_, ch)| !is_tag_name_char(*ch))
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    if name_len == 0 || !body[name_len..].starts_with('>') {
        return None;
    }
    let prefix = if closing { 2 } else { 1 };
    Some((closing, &body[..name_len], prefix + name_len + 1))
}

/// Splits model output into tag markers and the text runs between them.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut text_start = 0usize;
    let mut cursor = 0usize;

    while let Some(found) = input[cursor..].find('<') {
        let at = cursor + found;
        match match_marker(&input[at..]) {
            Some((closing, name, len)) => {
                if at > text_start {
                    tokens.push(Token::Text(&input[text_start..at]));
                }
                let raw = &input[at..at + len];
                tokens.push(if closing {
                    Token::Close { name, raw }
                } else {
                    Token::Open { name, raw }
                });
                cursor = at + len;
                text_start = cursor;
            }
            None => cursor = at + 1,
        }
    }
    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    tokens
}

#[derive(Default)]
struct ParseState {
    segments: Vec<Segment>,
    words: Vec<String>,
    pending: String,
    open: Option<Category>,
}

impl ParseState {
    fn flush_text(&mut self) {
        self.words
            .extend(self.pending.split_whitespace().map(str::to_string));
        self.pending.clear();
    }

    fn emit(&mut self, category: Option<Category>) {
        let words = std::mem::take(&mut self.words);
        if !words.is_empty() {
            self.segments.push(Segment::new(category, words));
        }
    }
}

/// Converts tagged model output into ordered segments.
///
/// Only category tags open a segment and only while no tag is open; the
/// first opened tag holds until its own close. Every other marker stays in
/// the text as literal characters.
pub fn parse(text: &str) -> Vec<Segment> {
    let mut state = ParseState::default();

    for token in tokenize(text) {
        match token {
            Token::Text(run) => state.pending.push_str(run),
            Token::Open { name, raw } => match (state.open, Category::from_code(name)) {
                (None, Some(category)) => {
                    state.flush_text();
                    state.emit(None);
                    state.open = Some(category);
                }
                _ => state.pending.push_str(raw),
            },
            Token::Close { name, raw } => match state.open {
                Some(open) if open.code() == name => {
                    state.flush_text();
                    state.emit(Some(open));
                    state.open = None;
                }
                _ => state.pending.push_str(raw),
            },
        }
    }

    state.flush_text();
    let trailing = state.open;
    state.emit(trailing);
    state.segments
}

fn is_closing_punctuation(word: &str) -> bool {
    !word.is_empty()
        && word.chars().all(|ch| {
            matches!(
                ch,
                ',' | '.' | '!' | '?' | ';' | ':' | '"' | '\'' | ')' | ']' | '}' | '»' | '…'
                    | '\\' | '/' | '“'
            )
        })
}

fn is_opening_punctuation(word: &str) -> bool {
    !word.is_empty()
        && word.chars().all(|ch| {
            matches!(
                ch,
                '"' | '\'' | '(' | '[' | '{' | '\\' | '/' | '«' | '„'
            )
        })
}

/// Joins segment words with single spaces, gluing punctuation that a tag
/// boundary split off its neighbour.
pub fn reconstruct(segments: &[Segment]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut prev_category: Option<Option<Category>> = None;

    for segment in segments {
        let Some((first, rest)) = segment.words.split_first() else {
            continue;
        };

        let glue = match (prev_category, out.last()) {
            (Some(prev), Some(last)) if prev != segment.category => {
                is_closing_punctuation(first) ^ is_opening_punctuation(last)
            }
            _ => false,
        };
        match out.last_mut() {
            Some(last) if glue => last.push_str(first),
            _ => out.push(first.clone()),
        }
        out.extend(rest.iter().cloned());
        prev_category = Some(segment.category);
    }

    out.join(" ")
}

fn reasoning_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid reasoning regex"))
}

/// Removes `<think>...</think>` blocks some models prepend to the answer.
pub fn strip_reasoning(text: &str) -> String {
    reasoning_pattern().replace_all(text, "").into_owned()
}
