//! Case-insensitive item filtering with bold-markdown highlighting.

use serde::{Deserialize, Serialize};

use crate::models::item::Item;

const MARK: &str = "**";

/// An item that matched a listing filter, with every matching span of its
/// name and description wrapped in `**`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMatch {
    pub item: Item,
    pub highlighted_name: String,
    pub highlighted_description: Option<String>,
}

/// Byte ranges of every non-overlapping case-insensitive occurrence of
/// `needle` in `haystack`.
pub fn find_spans(haystack: &str, needle: &str) -> Vec<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return Vec::new();
    }

    let chars: Vec<(usize, char)> = haystack.char_indices().collect();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match match_at(&chars, i, &needle) {
            Some(end) => {
                let start_byte = chars[i].0;
                let end_byte = chars.get(end).map_or(haystack.len(), |(b, _)| *b);
                spans.push((start_byte, end_byte));
                i = end;
            }
            None => i += 1,
        }
    }
    spans
}

/// Index one past the last haystack char of a match starting at `start`.
fn match_at(chars: &[(usize, char)], start: usize, needle: &[char]) -> Option<usize> {
    let mut n = 0;
    let mut j = start;
    while n < needle.len() {
        let (_, c) = chars.get(j)?;
        for lower in c.to_lowercase() {
            if needle.get(n) != Some(&lower) {
                return None;
            }
            n += 1;
        }
        j += 1;
    }
    Some(j)
}

/// Wrap every match of `needle` in `text`; `None` when nothing matches.
pub fn highlight(text: &str, needle: &str) -> Option<String> {
    let spans = find_spans(text, needle);
    if spans.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(text.len() + spans.len() * MARK.len() * 2);
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&text[cursor..start]);
        out.push_str(MARK);
        out.push_str(&text[start..end]);
        out.push_str(MARK);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

/// Match an item against a filter on its name or description.
pub fn match_item(item: &Item, filter: &str) -> Option<ItemMatch> {
    let name = highlight(&item.name, filter);
    let description = item
        .description
        .as_deref()
        .and_then(|d| highlight(d, filter));

    if name.is_none() && description.is_none() {
        return None;
    }

    Some(ItemMatch {
        highlighted_name: name.unwrap_or_else(|| item.name.clone()),
        highlighted_description: description.or_else(|| item.description.clone()),
        item: item.clone(),
    })
}
