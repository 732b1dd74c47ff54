use crate::annotator::category::Category;
use crate::annotator::segment::{Segment, merge_null_category_sections};

const CASE_NUMBER_KEYWORDS: [&str; 15] = [
    "čj.", "j.", "zn.", "č.j.", "sp.zn.", "zn", "čj", ".", "j.:", "zn.:", "značka:", "číslo:",
    "jednací:", "spisu:", "značkou",
];

const MIN_PHONE_DIGITS: usize = 9;

fn starts_uppercase(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn starts_uppercase_or_digit(word: &str) -> bool {
    word.chars()
        .next()
        .is_some_and(|ch| ch.is_uppercase() || ch.is_ascii_digit())
}

fn is_digits(word: &str, len: usize) -> bool {
    word.chars().count() == len && word.chars().all(|ch| ch.is_ascii_digit())
}

fn digit_count(words: &[String]) -> usize {
    words
        .iter()
        .flat_map(|w| w.chars())
        .filter(char::is_ascii_digit)
        .count()
}

fn has_digit_run(word: &str) -> bool {
    word.as_bytes()
        .windows(2)
        .any(|pair| pair[0].is_ascii_digit() && pair[1].is_ascii_digit())
}

/// Index of the first `NNN NN` pair.
fn find_zipcode_pair(words: &[String]) -> Option<usize> {
    words
        .windows(2)
        .position(|pair| is_digits(&pair[0], 3) && is_digits(&pair[1], 2))
}

fn push_plain(out: &mut Vec<Segment>, words: &[String]) {
    if !words.is_empty() {
        out.push(Segment::new(None, words.to_vec()));
    }
}

/// Keeps the single word at `index` under `category`; neighbours become plain.
fn split_around(category: Category, words: &[String], index: usize) -> Vec<Segment> {
    let mut out = Vec::new();
    push_plain(&mut out, &words[..index]);
    out.push(Segment::new(Some(category), vec![words[index].clone()]));
    push_plain(&mut out, &words[index + 1..]);
    out
}

fn plain(words: &[String]) -> Vec<Segment> {
    vec![Segment::new(None, words.to_vec())]
}

fn filter_case_number(words: &[String]) -> Vec<Segment> {
    let has_two_digits = words.iter().any(|w| has_digit_run(w));
    let has_slash = words.iter().any(|w| w.contains('/'));
    if !(has_two_digits && has_slash) {
        return plain(words);
    }

    let keyword = words
        .iter()
        .position(|w| CASE_NUMBER_KEYWORDS.contains(&w.to_lowercase().as_str()));
    match keyword {
        Some(index) => {
            let mut out = plain(&words[..=index]);
            let remainder = &words[index + 1..];
            if !remainder.is_empty() {
                out.extend(filter_case_number(remainder));
            }
            out
        }
        None => vec![Segment::new(Some(Category::CaseNumber), words.to_vec())],
    }
}

fn filter_zipcode(words: &[String]) -> Vec<Segment> {
    let Some(index) = find_zipcode_pair(words) else {
        return plain(words);
    };
    let mut out = Vec::new();
    push_plain(&mut out, &words[..index]);
    out.push(Segment::new(
        Some(Category::Zipcode),
        words[index..index + 2].to_vec(),
    ));
    push_plain(&mut out, &words[index + 2..]);
    out
}

fn filter_phone(words: &[String]) -> Vec<Segment> {
    if digit_count(words) < MIN_PHONE_DIGITS {
        return plain(words);
    }

    let before = words
        .iter()
        .take_while(|w| w.chars().any(char::is_alphabetic))
        .count();
    let number = words[before..]
        .iter()
        .take_while(|w| w.chars().any(|ch| !ch.is_alphabetic()))
        .count();
    let (prefix, rest) = words.split_at(before);
    let (middle, suffix) = rest.split_at(number);

    let mut out = Vec::new();
    push_plain(&mut out, prefix);
    if !middle.is_empty() {
        let category = (digit_count(middle) >= MIN_PHONE_DIGITS).then_some(Category::Phone);
        out.push(Segment::new(category, middle.to_vec()));
    }
    push_plain(&mut out, suffix);
    out
}

fn filter_location(words: &[String]) -> Vec<Segment> {
    let plausible = words
        .iter()
        .any(|w| starts_uppercase(w) || w.chars().any(|ch| ch.is_ascii_digit()));
    if !plausible {
        return plain(words);
    }

    let Some(index) = find_zipcode_pair(words) else {
        return vec![Segment::new(Some(Category::Location), words.to_vec())];
    };
    let mut out = Vec::new();
    let before = &words[..index];
    if !before.is_empty() {
        out.extend(filter_location(before));
    }
    out.push(Segment::new(
        Some(Category::Zipcode),
        words[index..index + 2].to_vec(),
    ));
    let after = &words[index + 2..];
    if !after.is_empty() {
        out.extend(filter_location(after));
    }
    out
}

fn filter_segment(segment: Segment) -> Vec<Segment> {
    let Some(category) = segment.category else {
        return vec![segment];
    };
    let words = &segment.words;

    match category {
        c if c.is_omitted() => plain(words),
        Category::CaseNumber => filter_case_number(words),
        Category::Zipcode => filter_zipcode(words),
        Category::Email => match words.iter().position(|w| w.contains('@')) {
            Some(index) => split_around(category, words, index),
            None => plain(words),
        },
        Category::Web => match words.iter().position(|w| w.contains('.')) {
            Some(index) => split_around(category, words, index),
            None => plain(words),
        },
        Category::Phone => filter_phone(words),
        Category::Location => filter_location(words),
        Category::Institution | Category::Company => {
            if words.iter().any(|w| starts_uppercase_or_digit(w)) {
                vec![segment]
            } else {
                plain(words)
            }
        }
        Category::PersonalName => {
            if words.iter().any(|w| starts_uppercase(w)) {
                vec![segment]
            } else {
                plain(words)
            }
        }
        _ => vec![segment],
    }
}

/// Applies the per-category validation and splitting rules.
pub fn filter_categories(segments: Vec<Segment>) -> Vec<Segment> {
    segments.into_iter().flat_map(filter_segment).collect()
}

/// Full cleanup: category rules, then null-run merging.
pub fn clean(segments: Vec<Segment>) -> Vec<Segment> {
    merge_null_category_sections(filter_categories(segments))
}
