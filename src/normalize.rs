//! Text normalization and keyword extraction.
//!
//! [`normalize`] turns raw document text (possibly HTML-laden, oddly
//! spaced, full-width, etc.) into the canonical form everything downstream
//! chunks, hashes, and scores. [`extract_keywords`] tokenizes normalized
//! text into a ranked keyword list for lexical similarity.
//!
//! Both are pure functions over their input plus the static tables below;
//! no configuration, no I/O.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

/// Tokens shorter than this are dropped during keyword extraction.
const MIN_TOKEN_LEN: usize = 2;

/// Punctuation retained by the normalization alphabet. Everything that is
/// not alphanumeric, whitespace, or listed here is stripped. `<` and `>`
/// are allowed so decoded `&lt;`/`&gt;` entities survive (literal tags are
/// already gone by the time the filter runs).
const ALLOWED_PUNCT: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '\'', '"', '-', '/', '@', '+', '#', '&', '%', '_',
    '<', '>',
];

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "for", "from", "had",
        "has", "have", "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "me",
        "my", "no", "not", "of", "on", "or", "our", "she", "so", "that", "the", "their", "them",
        "then", "there", "these", "they", "this", "to", "was", "we", "were", "what", "when",
        "which", "who", "will", "with", "would", "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Known multi-token compound terms, merged via exact adjacent-pair lookup.
/// Keys are `(first, second)` after stopword removal; values are the merged
/// single token.
static COMPOUND_TERMS: LazyLock<HashMap<(&'static str, &'static str), &'static str>> =
    LazyLock::new(|| {
        [
            (("machine", "learning"), "machine-learning"),
            (("deep", "learning"), "deep-learning"),
            (("data", "science"), "data-science"),
            (("data", "engineering"), "data-engineering"),
            (("software", "engineering"), "software-engineering"),
            (("open", "source"), "open-source"),
            (("project", "management"), "project-management"),
            (("product", "management"), "product-management"),
            (("full", "stack"), "full-stack"),
            (("front", "end"), "front-end"),
            (("back", "end"), "back-end"),
            (("cover", "letter"), "cover-letter"),
            (("version", "control"), "version-control"),
            (("unit", "testing"), "unit-testing"),
            (("natural", "language"), "natural-language"),
            (("computer", "vision"), "computer-vision"),
        ]
        .into_iter()
        .collect()
    });

/// Normalize raw document text.
///
/// Applies, in order: Unicode NFKC normalization, HTML tag stripping with
/// entity decoding, removal of characters outside the allowed alphabet,
/// and whitespace collapsing.
pub fn normalize(raw_text: &str) -> String {
    let nfkc: String = raw_text.nfkc().collect();
    let stripped = strip_html(&nfkc);
    let filtered: String = stripped
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCT.contains(&c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&filtered)
}

/// Strip HTML tags and decode the common entities.
///
/// Anything between `<` and the matching `>` is dropped; an unterminated
/// tag swallows the rest of the input (consistent with treating the text
/// as malformed markup rather than prose).
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                for inner in chars.by_ref() {
                    if inner == '>' {
                        break;
                    }
                }
                // Tags act as token boundaries.
                out.push(' ');
            }
            '&' => {
                let mut entity = String::new();
                let mut terminated = false;
                while let Some(&next) = chars.peek() {
                    if next == ';' {
                        chars.next();
                        terminated = true;
                        break;
                    }
                    if next.is_whitespace() || next == '&' || next == '<' || entity.len() >= 8 {
                        break;
                    }
                    entity.push(next);
                    chars.next();
                }
                if terminated {
                    match decode_entity(&entity) {
                        Some(decoded) => out.push(decoded),
                        None => {
                            out.push('&');
                            out.push_str(&entity);
                            out.push(';');
                        }
                    }
                } else {
                    out.push('&');
                    out.push_str(&entity);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "#39" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Split normalized text into lowercase candidate tokens.
///
/// Naive whitespace tokenization with punctuation trimmed from token
/// edges; tokens shorter than [`MIN_TOKEN_LEN`] characters are dropped.
fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect()
}

/// Tokenize, drop stopwords, and merge known compound terms.
fn content_tokens(text: &str) -> Vec<String> {
    let tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(t.as_str()))
        .collect();

    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if i + 1 < tokens.len() {
            let pair = (tokens[i].as_str(), tokens[i + 1].as_str());
            if let Some(compound) = COMPOUND_TERMS.get(&pair) {
                merged.push(compound.to_string());
                i += 2;
                continue;
            }
        }
        merged.push(tokens[i].clone());
        i += 1;
    }
    merged
}

/// The full keyword set of a text (no ranking, no cap).
///
/// Used for set-based (Jaccard) similarity.
pub fn keyword_set(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

/// Extract the top `max_keywords` tokens by frequency.
///
/// Ties are broken by first appearance in the text, so the result is
/// deterministic for a given input.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let tokens = content_tokens(text);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        *counts.entry(token).or_insert(0) += 1;
        first_seen.entry(token).or_insert(pos);
    }

    let mut ranked: Vec<&str> = counts.keys().copied().collect();
    ranked.sort_by(|a, b| {
        counts[b]
            .cmp(&counts[a])
            .then(first_seen[a].cmp(&first_seen[b]))
    });

    ranked
        .into_iter()
        .take(max_keywords)
        .map(|t| t.to_string())
        .collect()
}
