use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Tokeniser and stop-word filter applied to candidate terms before they
/// become entities.
#[derive(Clone, Debug)]
pub struct TermParser {
    stop_words: HashSet<String>,
    min_length: usize,
}

impl Default for TermParser {
    fn default() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().map(|word| (*word).to_owned()).collect(),
            min_length: 2,
        }
    }
}

impl TermParser {
    pub fn with_stop_words<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parser = Self::default();
        parser.add_stop_words(extra);
        parser
    }

    pub fn add_stop_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words
            .extend(words.into_iter().map(|word| word.as_ref().trim().to_lowercase()));
    }

    /// Splits `text` into lower-cased alphanumeric tokens. Apostrophes inside
    /// a word are kept; every other non-alphanumeric character separates.
    pub fn parse_string(&self, text: &str) -> Vec<String> {
        text.split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
            .map(|token| token.trim_matches('\''))
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    pub fn is_stop_word(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.chars().count() < self.min_length
            || term.chars().all(|ch| ch.is_ascii_digit())
            || self.stop_words.contains(&term)
    }

    /// Tokens of `text` that are not stop words.
    pub fn content_terms(&self, text: &str) -> Vec<String> {
        self.parse_string(text)
            .into_iter()
            .filter(|term| !self.is_stop_word(term))
            .collect()
    }

    /// Occurrence counts of the content terms of `text`.
    pub fn term_frequencies(&self, text: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for term in self.content_terms(text) {
            *counts.entry(term).or_insert(0) += 1;
        }
        counts
    }

    /// The most frequent content term present in both texts, counting
    /// occurrences across both. Ties go to the alphabetically first term.
    pub fn most_frequent_common_term(&self, left: &str, right: &str) -> Option<String> {
        let left = self.term_frequencies(left);
        let right = self.term_frequencies(right);
        left.iter()
            .filter_map(|(term, count)| right.get(term).map(|other| (term, count + other)))
            .fold(None, |best: Option<(&String, usize)>, (term, count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((term, count)),
            })
            .map(|(term, _)| term.clone())
    }
}
