//! RAKE-style keyphrase extraction.
//!
//! Candidate phrases are runs of content words between stop words and
//! pure-numeric tokens. Each content word scores
//! `(co-occurrence degree + frequency) / frequency` within the candidate
//! set; a phrase scores the sum of its words. Identical phrases are
//! deduplicated and phrases of two characters or fewer are discarded.

use std::collections::HashMap;

/// Common English stop words used as phrase delimiters.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "don't", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he",
    "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "isn't", "it",
    "it's", "its", "just", "me", "more", "most", "my", "no", "nor", "not", "now", "of", "off",
    "on", "once", "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.binary_search(&token).is_ok()
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

/// Lowercase tokens, splitting on anything that is not alphanumeric or an
/// apostrophe. Sentence punctuation therefore also delimits phrases.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split tokens into candidate phrases at stop words and numeric tokens.
fn candidate_phrases(tokens: &[String]) -> Vec<Vec<String>> {
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for token in tokens {
        if is_stop_word(token) || is_numeric(token) {
            if !current.is_empty() {
                phrases.push(std::mem::take(&mut current));
            }
        } else {
            current.push(token.clone());
        }
    }
    if !current.is_empty() {
        phrases.push(current);
    }
    phrases
}

/// Extract the top `max_keywords` keyphrases from `text`, best first.
pub fn extract(text: &str, max_keywords: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let phrases = candidate_phrases(&tokens);
    if phrases.is_empty() {
        return Vec::new();
    }

    // Word frequency and co-occurrence degree over the candidate set.
    let mut freq: HashMap<&str, f64> = HashMap::new();
    let mut degree: HashMap<&str, f64> = HashMap::new();
    for phrase in &phrases {
        let co_occurring = (phrase.len() - 1) as f64;
        for word in phrase {
            *freq.entry(word).or_insert(0.0) += 1.0;
            *degree.entry(word).or_insert(0.0) += co_occurring;
        }
    }

    let word_score = |word: &str| -> f64 {
        let f = freq.get(word).copied().unwrap_or(1.0);
        let d = degree.get(word).copied().unwrap_or(0.0);
        (d + f) / f
    };

    // Score phrases, deduplicating identical surface forms.
    let mut seen: HashMap<String, f64> = HashMap::new();
    let mut ordered: Vec<String> = Vec::new();
    for phrase in &phrases {
        let surface = phrase.join(" ");
        if surface.len() <= 2 {
            continue;
        }
        let score: f64 = phrase.iter().map(|w| word_score(w)).sum();
        if !seen.contains_key(&surface) {
            ordered.push(surface.clone());
        }
        seen.insert(surface, score);
    }

    ordered.sort_by(|a, b| {
        seen[b]
            .partial_cmp(&seen[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ordered.truncate(max_keywords);
    ordered
}
