//! Text normalization: lowercase, strip non-word runs, tokenize, drop stop-words.
//!
//! The steps and their order are fixed and must not drift: callers depend on
//! `normalize` being idempotent on already-normalized text.

/// Fixed, built-in English stop-word list. Not discovered at runtime.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she", "should",
    "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them", "themselves",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "you", "your", "yours", "yourself", "yourselves",
];

/// Lowercases, strips non-word runs, tokenizes on space, and drops stop-words.
///
/// Result order is the input order; positions in the returned vector are the
/// token positions used by `InvertedIndex::add_document`.
pub fn normalize(text: &str) -> Vec<String> {
    let folded = text.to_lowercase();
    let spaced = replace_non_word_runs(&folded);

    spaced
        .split(' ')
        .filter(|tok| !tok.is_empty())
        .filter(|tok| !is_stop_word(tok))
        .map(|tok| tok.to_string())
        .collect()
}

fn replace_non_word_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;

    for ch in text.chars() {
        if is_word_char(ch) {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push(' ');
            in_run = true;
        }
    }

    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}
