//! Keyword tag extraction from free-text captions.

use std::collections::HashSet;

/// Words too generic to be useful as tags.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were",
];

/// Maximum number of tags derived from a caption.
pub const MAX_TAGS: usize = 10;

/// Derive a small keyword set from a free-text caption.
///
/// Lowercases, strips commas and periods, splits on whitespace, drops short
/// tokens (under 3 characters) and stop words, deduplicates keeping the first
/// occurrence, and caps the result at [`MAX_TAGS`]. Empty input yields an
/// empty output.
pub fn extract_tags(text: &str) -> Vec<String> {
    let normalized = text.to_lowercase().replace([',', '.'], " ");
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for word in normalized.split_whitespace() {
        if word.len() < 3 || STOP_WORDS.contains(&word) {
            continue;
        }
        if seen.insert(word.to_string()) {
            tags.push(word.to_string());
            if tags.len() == MAX_TAGS {
                break;
            }
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_stop_words_and_short_tokens() {
        let tags = extract_tags("A cat and a dog are playing.");
        assert!(tags.contains(&"cat".to_string()));
        assert!(tags.contains(&"dog".to_string()));
        assert!(tags.contains(&"playing".to_string()));
        assert!(!tags.contains(&"a".to_string()));
        assert!(!tags.contains(&"and".to_string()));
        assert!(!tags.contains(&"are".to_string()));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(extract_tags("").is_empty());
        assert!(extract_tags("   ").is_empty());
    }

    #[test]
    fn test_deduplicates_keeping_first_occurrence() {
        let tags = extract_tags("sunset over water, golden sunset");
        assert_eq!(
            tags,
            vec!["sunset".to_string(), "over".to_string(), "water".to_string(), "golden".to_string()]
        );
    }

    #[test]
    fn test_caps_at_ten_tags() {
        let caption = "alpha bravo charlie delta echo foxtrot golf hotel india juliett kilo lima";
        assert_eq!(extract_tags(caption).len(), MAX_TAGS);
    }

    #[test]
    fn test_strips_punctuation() {
        let tags = extract_tags("mountains, lakes. forests");
        assert_eq!(tags, vec!["mountains", "lakes", "forests"]);
    }
}
