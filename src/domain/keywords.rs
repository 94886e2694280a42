// src/domain/keywords.rs

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub const DEFAULT_MIN_LENGTH: usize = 4;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "be", "been", "have", "has", "do", "does", "did", "will",
    "would", "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
    "i", "you", "he", "she", "it", "we", "they", "all", "each", "every", "both", "such", "no",
    "not", "only", "very", "too", "than", "if", "just", "about",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

/// Lowercased word tokens of at least `min_length` characters, minus stop
/// words and purely numeric tokens. Words are runs of alphanumerics or `_`.
pub fn extract_keywords(text: &str, min_length: usize) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .filter(|w| w.chars().count() >= min_length)
        .filter(|w| !stop_words().contains(w))
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .map(str::to_string)
        .collect()
}

/// Token counts summed over every input string, in first-encountered order.
pub fn keyword_frequency<I, S>(texts: I) -> Vec<KeywordCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<KeywordCount> = Vec::new();

    for text in texts {
        for keyword in extract_keywords(text.as_ref(), DEFAULT_MIN_LENGTH) {
            match index.get(&keyword) {
                Some(&i) => counts[i].count += 1,
                None => {
                    index.insert(keyword.clone(), counts.len());
                    counts.push(KeywordCount { keyword, count: 1 });
                }
            }
        }
    }

    counts
}

/// Top `limit` keywords by descending count. Equal counts keep the order in
/// which the keyword was first seen.
pub fn top_keywords<I, S>(texts: I, limit: usize) -> Vec<KeywordCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ranked: Vec<(usize, KeywordCount)> =
        keyword_frequency(texts).into_iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| b.count.cmp(&a.count).then(ia.cmp(ib)));
    ranked.into_iter().take(limit).map(|(_, kc)| kc).collect()
}
