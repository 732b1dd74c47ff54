use crate::annotator::category::Category;
use serde::{Deserialize, Serialize};

/// A maximal run of words sharing one category label (`None` = plain text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub words: Vec<String>,
    pub category: Option<Category>,
}

impl Segment {
    pub fn new(category: Option<Category>, words: Vec<String>) -> Self {
        Self { words, category }
    }

    pub fn plain<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(None, words.into_iter().map(Into::into).collect())
    }

    pub fn tagged<I, S>(category: Category, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Some(category), words.into_iter().map(Into::into).collect())
    }

    pub fn is_plain(&self) -> bool {
        self.category.is_none()
    }

    pub fn joined(&self) -> String {
        self.words.join(" ")
    }
}

/// Coalesces every run of consecutive uncategorised segments into one and
/// drops segments left without words.
pub fn merge_null_category_sections(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.words.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.is_plain() && segment.is_plain() => {
                last.words.extend(segment.words);
            }
            _ => merged.push(segment),
        }
    }
    merged
}

pub fn word_count(segments: &[Segment]) -> usize {
    segments.iter().map(|s| s.words.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::{Segment, merge_null_category_sections, word_count};
    use crate::annotator::category::Category;

    #[test]
    fn merges_runs_of_plain_segments_only() {
        let merged = merge_null_category_sections(vec![
            Segment::plain(["a"]),
            Segment::plain(["b", "c"]),
            Segment::tagged(Category::PersonalName, ["Jan"]),
            Segment::plain(["d"]),
            Segment::plain(["e"]),
        ]);
        assert_eq!(
            merged,
            vec![
                Segment::plain(["a", "b", "c"]),
                Segment::tagged(Category::PersonalName, ["Jan"]),
                Segment::plain(["d", "e"]),
            ]
        );
    }

    #[test]
    fn never_merges_adjacent_tagged_segments() {
        let input = vec![
            Segment::tagged(Category::PersonalName, ["Jan"]),
            Segment::tagged(Category::PersonalName, ["Novák"]),
        ];
        assert_eq!(merge_null_category_sections(input.clone()), input);
    }

    #[test]
    fn drops_empty_segments() {
        let merged = merge_null_category_sections(vec![
            Segment::plain(["a"]),
            Segment::tagged(Category::Email, Vec::<String>::new()),
            Segment::plain(["b"]),
        ]);
        assert_eq!(merged, vec![Segment::plain(["a", "b"])]);
    }

    #[test]
    fn no_adjacent_plain_segments_after_merge() {
        let merged = merge_null_category_sections(vec![
            Segment::plain(["x"]),
            Segment::plain(["y"]),
            Segment::tagged(Category::Web, ["a.cz"]),
            Segment::plain(["z"]),
            Segment::plain(["w"]),
            Segment::plain(["v"]),
        ]);
        assert!(
            merged
                .windows(2)
                .all(|pair| !(pair[0].is_plain() && pair[1].is_plain()))
        );
        assert_eq!(word_count(&merged), 6);
    }

    #[test]
    fn json_shape_matches_output_log() {
        let raw = serde_json::to_string(&Segment::plain(["a"])).expect("serialize");
        assert_eq!(raw, r#"{"words":["a"],"category":null}"#);
    }
}
