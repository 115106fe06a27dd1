//! Lexical helpers: keyword extraction and text normalization for matching

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;

/// Keywords kept per entry
pub const MAX_KEYWORDS: usize = 10;

/// Words of this many characters or fewer never become keywords
pub const MIN_KEYWORD_CHARS: usize = 3;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]+").expect("valid regex"));

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into",
        "is", "it", "its", "itself", "just", "me", "more", "most", "my", "myself", "no", "nor",
        "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "ourselves", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there",
        "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
        "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
        "why", "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
        "user", "assistant",
    ]
    .into_iter()
    .collect()
});

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Top [`MAX_KEYWORDS`] terms of `content` by in-document frequency.
///
/// Lowercases, strips punctuation, splits on whitespace, and drops stopwords and
/// words of [`MIN_KEYWORD_CHARS`] characters or fewer. Ties keep first-occurrence
/// order.
pub fn extract_keywords(content: &str) -> Vec<String> {
    let lowered = content.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");

    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, word) in stripped.split_whitespace().enumerate() {
        if word.chars().count() <= MIN_KEYWORD_CHARS || is_stopword(word) {
            continue;
        }
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));

    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Lowercased text with every run of non-word characters collapsed to one space
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    NON_WORD.replace_all(&lowered, " ").trim().to_string()
}

/// Normalized text padded with a space on both sides so that word-level matches
/// reduce to substring checks on `" term "`
pub fn search_text(text: &str) -> String {
    format!(" {} ", normalize(text))
}

/// Distinct non-stopword terms of a query, in order of appearance
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    normalize(query)
        .split_whitespace()
        .filter(|term| !is_stopword(term))
        .filter(|term| seen.insert(term.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_ranked_by_frequency() {
        let keywords =
            extract_keywords("Rust rust RUST! Tokio is great, tokio tasks. Serde helps serde.");
        assert_eq!(keywords[0], "rust");
        assert_eq!(keywords[1], "tokio");
        assert_eq!(keywords[2], "serde");
    }

    #[test]
    fn test_keywords_drop_short_and_stopwords() {
        let keywords = extract_keywords("I am the one who can fly over these very tall mountains");
        assert_eq!(keywords, vec!["tall", "mountains"]);
    }

    #[test]
    fn test_keywords_strip_punctuation_inside_words() {
        let keywords = extract_keywords("Don't-stop believing");
        assert_eq!(keywords, vec!["dontstop", "believing"]);
    }

    #[test]
    fn test_keywords_capped() {
        let text = (0..20)
            .map(|i| format!("keyword{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let keywords = extract_keywords(&text);
        assert_eq!(keywords.len(), MAX_KEYWORDS);
        assert_eq!(keywords[0], "keyword00");
    }

    #[test]
    fn test_normalize_and_search_text() {
        assert_eq!(normalize("  Hello,   World!! "), "hello world");
        assert_eq!(search_text("Hiking; in Colorado."), " hiking in colorado ");
    }

    #[test]
    fn test_query_terms() {
        assert_eq!(
            query_terms("Where do I go hiking? Hiking in Colorado"),
            vec!["go", "hiking", "colorado"]
        );
        assert!(query_terms("the and of").is_empty());
    }
}
