//! Token-overlap similarity between normalized titles.

use std::collections::HashSet;

/// Split a string on whitespace into its set of unique tokens.
pub fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

/// Calculate the Jaccard index between two token sets.
pub fn jaccard_similarity(tokens_a: &HashSet<&str>, tokens_b: &HashSet<&str>) -> f64 {
    let intersection = tokens_a.intersection(tokens_b).count();
    let union = tokens_a.len() + tokens_b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Symmetric similarity in `[0, 1]` between two normalized strings.
///
/// Identical strings score 1.0 (including two empty strings); an empty
/// string against a non-empty one scores 0.0. Everything else is the
/// Jaccard index of the whitespace token sets, so word order and
/// repeated words do not matter.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    jaccard_similarity(&token_set(a), &token_set(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_title;

    #[test]
    fn test_identical() {
        assert_eq!(similarity("dune", "dune"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_empty_against_non_empty() {
        assert_eq!(similarity("", "dune"), 0.0);
        assert_eq!(similarity("dune", ""), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {hobbit} vs {hobbit, there} = 1/2
        assert!((similarity("hobbit", "hobbit there") - 0.5).abs() < 1e-9);
        // {lord, of, the, rings} vs {the, lord, of, rings} = 4/4
        assert_eq!(similarity("lord of the rings", "the lord of rings"), 1.0);
    }

    #[test]
    fn test_duplicate_tokens_collapse() {
        assert_eq!(similarity("new new york", "new york"), 1.0);
    }

    #[test]
    fn test_disjoint() {
        assert_eq!(similarity("dune", "emma"), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("foundation and empire", "second foundation"),
            ("a b c", "c d"),
            ("", "x"),
            ("war and peace", "peace"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_self_similarity_after_normalization() {
        let titles = [
            "",
            "The Hobbit",
            "Frankenstein; or, The Modern Prometheus",
            "  !!  ",
            "Les Misérables",
        ];
        for title in titles {
            let normalized = normalize_title(title);
            assert_eq!(similarity(&normalized, &normalized), 1.0);
        }
    }

    #[test]
    fn test_jaccard_similarity_empty_sets() {
        let empty = HashSet::new();
        assert_eq!(jaccard_similarity(&empty, &empty), 0.0);
    }
}
