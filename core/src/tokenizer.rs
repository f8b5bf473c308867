use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

const BASE: &[&str] = &["the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by"];

const VERB_FORMS: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should",
];

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^A-Za-z0-9_\s]").expect("valid regex");
    static ref BASE_STOPWORDS: HashSet<&'static str> = BASE.iter().copied().collect();
    static ref EXTENDED_STOPWORDS: HashSet<&'static str> = BASE.iter().chain(VERB_FORMS).copied().collect();
}

/// Shortest token kept in the index.
pub const MIN_TOKEN_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopWords {
    /// Function words only; used for jobs and for every query.
    Base,
    /// Function words plus auxiliary verbs; used for candidate profiles.
    Extended,
    Custom(HashSet<String>),
}

impl StopWords {
    pub fn contains(&self, token: &str) -> bool {
        match self {
            StopWords::Base => BASE_STOPWORDS.contains(token),
            StopWords::Extended => EXTENDED_STOPWORDS.contains(token),
            StopWords::Custom(words) => words.contains(token),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: StopWords,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(StopWords::Base)
    }
}

impl Tokenizer {
    pub fn new(stop_words: StopWords) -> Self {
        Self { stop_words }
    }

    pub fn stop_words(&self) -> &StopWords {
        &self.stop_words
    }

    /// Lowercase, blank out non-word characters, split on whitespace, then
    /// drop short tokens and stop words. Order follows the input.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_ascii_lowercase();
        let cleaned = NON_WORD.replace_all(&lowered, " ");
        cleaned
            .split_whitespace()
            .filter(|token| token.len() >= MIN_TOKEN_LEN && !self.stop_words.contains(token))
            .map(str::to_string)
            .collect()
    }
}

/// Tokenize with the base stop-word set.
pub fn tokenize(text: &str) -> Vec<String> {
    Tokenizer::default().tokenize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_case() {
        assert_eq!(tokenize("Senior C++/Rust-Engineer!"), vec!["senior", "rust", "engineer"]);
    }

    #[test]
    fn keeps_underscores_and_digits() {
        assert_eq!(tokenize("node_js ES2015 x"), vec!["node_js", "es2015"]);
    }

    #[test]
    fn non_ascii_is_a_word_boundary() {
        assert_eq!(tokenize("café naïve"), vec!["caf", "na", "ve"]);
    }

    #[test]
    fn extended_set_drops_verb_forms() {
        let text = "she has been leading teams";
        assert_eq!(tokenize(text), vec!["she", "has", "been", "leading", "teams"]);
        let extended = Tokenizer::new(StopWords::Extended);
        assert_eq!(extended.tokenize(text), vec!["she", "leading", "teams"]);
    }

    #[test]
    fn custom_stop_words() {
        let words = ["remote".to_string()].into_iter().collect();
        let t = Tokenizer::new(StopWords::Custom(words));
        assert_eq!(t.tokenize("remote the job"), vec!["the", "job"]);
    }
}
