use crate::annotator::category::Category;
use crate::annotator::segment::Segment;

pub const DEFAULT_WORD_OVERLAP_TOL: usize = 4;

/// Result of withholding a chunk's provisional tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailTrim {
    pub segments: Vec<Segment>,
    /// Words removed from the segment sequence.
    pub removed_words: usize,
    /// Source words the cursor must move back over.
    pub rewind_words: usize,
}

impl TailTrim {
    /// Negative index into the chunk's word-end offsets where the next chunk
    /// should start.
    pub fn reverse_index(&self) -> isize {
        -(self.rewind_words as isize + 1)
    }
}

fn unsafe_tail_len(categories: &[Option<Category>], tolerance: usize) -> usize {
    let full_len = categories.len();
    let last = categories[0];
    match last {
        Some(_) => (1..full_len)
            .find(|&i| categories[i] != last)
            .unwrap_or(full_len),
        None => (1..tolerance.min(full_len))
            .find(|&i| categories[i].is_some())
            .unwrap_or(tolerance),
    }
}

fn drop_tail_words(mut segments: Vec<Segment>, mut count: usize) -> Vec<Segment> {
    while count > 0 {
        let Some(last) = segments.last_mut() else {
            break;
        };
        if last.words.len() <= count {
            count -= last.words.len();
            segments.pop();
            continue;
        }
        let keep = last.words.len() - count;
        last.words.truncate(keep);
        count = 0;
    }
    segments
}

/// Trims the words at the end of a chunk whose category may still change once
/// the following text is seen, and reports how far the cursor must rewind.
///
/// A tagged tail is withheld as a whole run; a plain tail is withheld up to the
/// nearest tagged word within `tolerance`. The rewind only covers trailing
/// words that match the source text exactly, and never the whole chunk.
pub fn correct_and_reverse_index(
    segments: Vec<Segment>,
    original_text: &str,
    tolerance: usize,
) -> TailTrim {
    let tolerance = tolerance.max(1);
    let original_words = original_text.split_whitespace().collect::<Vec<_>>();

    // Collected back to front: index 0 is the last word.
    let mut tail_words: Vec<&str> = Vec::new();
    let mut tail_categories: Vec<Option<Category>> = Vec::new();
    for segment in segments.iter().rev() {
        for word in segment.words.iter().rev() {
            tail_words.push(word);
            tail_categories.push(segment.category);
        }
        if tail_words.len() >= tolerance {
            break;
        }
    }

    if tail_words.is_empty() {
        return TailTrim {
            segments,
            removed_words: 0,
            rewind_words: 0,
        };
    }

    let word_index = unsafe_tail_len(&tail_categories, tolerance)
        .min(original_words.len().saturating_sub(1));

    let rewind_words = tail_words
        .iter()
        .take(word_index)
        .zip(original_words.iter().rev().take(word_index))
        .take_while(|(model, source)| model == source)
        .count();

    let removed_words = if tail_categories[0].is_some() {
        word_index
    } else {
        rewind_words
    };

    TailTrim {
        segments: drop_tail_words(segments, removed_words),
        removed_words,
        rewind_words,
    }
}
