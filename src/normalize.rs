//! Title canonicalization for comparison.
//!
//! Titles are reduced to lower-case word tokens with leading articles,
//! subtitles and punctuation removed, so that edition variants such as
//! "The Hobbit: An Unexpected Journey" and "Hobbit, The" compare equal.

use once_cell::sync::Lazy;
use regex::Regex;

/// A single leading article followed by whitespace
static LEADING_ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:the|a|an)\s+").expect("valid leading article regex"));

/// Catalog-style inverted article at the end of the main title ("hobbit, the")
static TRAILING_ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*(?:the|a|an)\s*$").expect("valid trailing article regex"));

/// Anything that is neither a word character nor whitespace
static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"));

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Normalize a title for comparison.
///
/// Steps (order matters):
/// 1. Lower-case
/// 2. Strip one leading `the`/`a`/`an`
/// 3. Drop the subtitle from the first `:` or `;`
/// 4. Strip a trailing inverted article (`", the"`)
/// 5. Remove non-word characters
/// 6. Collapse whitespace and trim
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let without_article = LEADING_ARTICLE_RE.replace(&lowered, "");

    let main_title = match without_article.find([':', ';']) {
        Some(pos) => &without_article[..pos],
        None => &without_article[..],
    };
    let main_title = TRAILING_ARTICLE_RE.replace(main_title, "");

    let stripped = NON_WORD_RE.replace_all(&main_title, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Bucketing key for author strings: trimmed and case-folded, nothing more.
pub fn author_key(authors: &str) -> String {
    authors.trim().to_lowercase()
}
