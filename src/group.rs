//! Duplicate grouping strategies.
//!
//! Title-based strategies use a single greedy pass: each unclaimed record
//! in input order becomes an anchor, claims every later unclaimed record
//! whose normalized title scores at or above the threshold, and is emitted
//! as a group when it gathered at least one other member. A record's group
//! therefore depends on its position in the input.
//!
//! The identifier strategy groups by shared identifier token and does not
//! enforce exclusivity: a record can appear under several tokens.

use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::identifiers::IdentifierSet;
use crate::models::{DuplicateGroup, Record, Strategy, TargetParams};
use crate::normalize::{author_key, normalize_title};
use crate::similarity::similarity;

pub const REASON_SIMILAR_TITLES: &str = "similar titles";
pub const REASON_SAME_AUTHOR: &str = "same author with similar titles";

pub fn identifier_reason(token: &str) -> String {
    format!("matching identifier: {}", token)
}

/// A full-scan grouping algorithm.
///
/// Implementations must return groups of at least two members, in
/// discovery order, and never more than `max_groups` of them.
pub trait GroupingStrategy {
    fn strategy(&self) -> Strategy;

    fn group(&self, records: &[Record], max_groups: usize) -> Vec<DuplicateGroup>;
}

/// Greedy grouping over normalized-title similarity
#[derive(Debug, Clone, Copy)]
pub struct TitleGrouping {
    pub threshold: f64,
}

/// Greedy title grouping inside exact author buckets
#[derive(Debug, Clone, Copy)]
pub struct AuthorTitleGrouping {
    pub threshold: f64,
}

/// One group per identifier token shared by two or more records
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentifierGrouping;

/// Build the grouping implementation for a strategy.
pub fn grouping_for(strategy: Strategy, threshold: f64) -> Box<dyn GroupingStrategy + Send + Sync> {
    match strategy {
        Strategy::Title => Box::new(TitleGrouping { threshold }),
        Strategy::AuthorTitle => Box::new(AuthorTitleGrouping { threshold }),
        Strategy::Identifier => Box::new(IdentifierGrouping),
    }
}

impl GroupingStrategy for TitleGrouping {
    fn strategy(&self) -> Strategy {
        Strategy::Title
    }

    fn group(&self, records: &[Record], max_groups: usize) -> Vec<DuplicateGroup> {
        let titles = normalized_titles(records);
        let indices: Vec<usize> = (0..records.len()).collect();

        let mut claimed = HashSet::new();
        let mut groups = Vec::new();

        claim_groups(
            &ClaimScope {
                records,
                titles: &titles,
                threshold: self.threshold,
                strategy: Strategy::Title,
                reason: REASON_SIMILAR_TITLES,
                max_groups,
            },
            &indices,
            &mut claimed,
            &mut groups,
        );

        debug!(records = records.len(), groups = groups.len(), "title grouping finished");
        groups
    }
}

impl GroupingStrategy for AuthorTitleGrouping {
    fn strategy(&self) -> Strategy {
        Strategy::AuthorTitle
    }

    fn group(&self, records: &[Record], max_groups: usize) -> Vec<DuplicateGroup> {
        let titles = normalized_titles(records);
        let author_keys: Vec<String> = records.par_iter().map(|r| author_key(&r.authors)).collect();
        let buckets = bucket_in_order(author_keys.iter().map(String::as_str));

        let scope = ClaimScope {
            records,
            titles: &titles,
            threshold: self.threshold,
            strategy: Strategy::AuthorTitle,
            reason: REASON_SAME_AUTHOR,
            max_groups,
        };

        let mut claimed = HashSet::new();
        let mut groups = Vec::new();

        for (_, members) in &buckets {
            if groups.len() >= max_groups {
                break;
            }
            if members.len() < 2 {
                continue;
            }
            claim_groups(&scope, members, &mut claimed, &mut groups);
        }

        debug!(
            records = records.len(),
            buckets = buckets.len(),
            groups = groups.len(),
            "author/title grouping finished"
        );
        groups
    }
}

impl GroupingStrategy for IdentifierGrouping {
    fn strategy(&self) -> Strategy {
        Strategy::Identifier
    }

    fn group(&self, records: &[Record], max_groups: usize) -> Vec<DuplicateGroup> {
        let identifier_sets: Vec<IdentifierSet> = records
            .par_iter()
            .map(|r| IdentifierSet::parse(r.identifiers.as_deref()))
            .collect();

        let tokens = identifier_sets
            .iter()
            .enumerate()
            .flat_map(|(idx, set)| set.iter().map(move |token| (token, idx)));
        let index = index_in_order(tokens);

        let groups: Vec<DuplicateGroup> = index
            .iter()
            .filter(|(_, members)| members.len() >= 2)
            .take(max_groups)
            .map(|(token, members)| DuplicateGroup {
                strategy: Strategy::Identifier,
                reason: identifier_reason(token),
                members: members.iter().map(|&i| records[i].clone()).collect(),
            })
            .collect();

        debug!(
            records = records.len(),
            tokens = index.len(),
            groups = groups.len(),
            "identifier grouping finished"
        );
        groups
    }
}

/// Shared inputs of one greedy claiming pass
struct ClaimScope<'a> {
    records: &'a [Record],
    titles: &'a [String],
    threshold: f64,
    strategy: Strategy,
    reason: &'a str,
    max_groups: usize,
}

/// Greedy claim-and-group over `indices` (positions into `scope.records`,
/// in input order). Appends to `groups` until it holds `max_groups`.
fn claim_groups(
    scope: &ClaimScope<'_>,
    indices: &[usize],
    claimed: &mut HashSet<u64>,
    groups: &mut Vec<DuplicateGroup>,
) {
    for (pos, &anchor_idx) in indices.iter().enumerate() {
        if groups.len() >= scope.max_groups {
            return;
        }

        let anchor = &scope.records[anchor_idx];
        if !claimed.insert(anchor.id) {
            continue;
        }

        let mut members = vec![anchor.clone()];
        for &candidate_idx in &indices[pos + 1..] {
            let candidate = &scope.records[candidate_idx];
            if claimed.contains(&candidate.id) {
                continue;
            }
            let score = similarity(&scope.titles[anchor_idx], &scope.titles[candidate_idx]);
            if score >= scope.threshold {
                claimed.insert(candidate.id);
                members.push(candidate.clone());
            }
        }

        if members.len() >= 2 {
            groups.push(DuplicateGroup {
                strategy: scope.strategy,
                reason: scope.reason.to_string(),
                members,
            });
        }
    }
}

/// Normalized titles aligned with `records`
fn normalized_titles(records: &[Record]) -> Vec<String> {
    records.par_iter().map(|r| normalize_title(&r.title)).collect()
}

/// Group positions by key, keeping keys in first-seen order.
fn bucket_in_order<'k>(keys: impl Iterator<Item = &'k str>) -> Vec<(&'k str, Vec<usize>)> {
    index_in_order(keys.enumerate().map(|(idx, key)| (key, idx)))
}

/// Build a key -> positions mapping that iterates in insertion order.
fn index_in_order<'k>(entries: impl Iterator<Item = (&'k str, usize)>) -> Vec<(&'k str, Vec<usize>)> {
    let mut slots: HashMap<&'k str, usize> = HashMap::new();
    let mut ordered: Vec<(&'k str, Vec<usize>)> = Vec::new();

    for (key, idx) in entries {
        match slots.get(key) {
            Some(&slot) => ordered[slot].1.push(idx),
            None => {
                slots.insert(key, ordered.len());
                ordered.push((key, vec![idx]));
            }
        }
    }

    ordered
}

/// Records similar to `focal` under `params`, in input order.
///
/// The focal record itself (matched by id) is never part of the result.
pub fn match_target(focal: &Record, records: &[Record], params: &TargetParams) -> Vec<Record> {
    let others = records.iter().filter(|r| r.id != focal.id);

    let matches: Vec<Record> = match params.strategy {
        Strategy::Title => title_matches(focal, others, params.threshold, false),
        Strategy::AuthorTitle => title_matches(focal, others, params.threshold, true),
        Strategy::Identifier => {
            let focal_ids = IdentifierSet::parse(focal.identifiers.as_deref());
            if focal_ids.is_empty() {
                debug!(focal = focal.id, "focal record has no identifiers, using title fallback");
                title_matches(focal, others, params.threshold, params.same_author)
            } else {
                others
                    .filter(|r| IdentifierSet::parse(r.identifiers.as_deref()).intersects(&focal_ids))
                    .cloned()
                    .collect()
            }
        }
    };

    debug!(
        focal = focal.id,
        strategy = %params.strategy,
        matches = matches.len(),
        "targeted match finished"
    );
    matches
}

fn title_matches<'a>(
    focal: &Record,
    others: impl Iterator<Item = &'a Record>,
    threshold: f64,
    same_author: bool,
) -> Vec<Record> {
    let focal_title = normalize_title(&focal.title);
    let focal_author = author_key(&focal.authors);

    others
        .filter(|r| !same_author || author_key(&r.authors) == focal_author)
        .filter(|r| similarity(&focal_title, &normalize_title(&r.title)) >= threshold)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tolkien_set() -> Vec<Record> {
        vec![
            Record::new(1, "The Hobbit", "J.R.R. Tolkien"),
            Record::new(2, "Hobbit, The", "J.R.R. Tolkien"),
            Record::new(3, "Dune", "Frank Herbert"),
        ]
    }

    #[test]
    fn test_title_grouping_pairs_hobbits() {
        let groups = TitleGrouping { threshold: 0.8 }.group(&tolkien_set(), 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
        assert_eq!(groups[0].reason, REASON_SIMILAR_TITLES);
        assert_eq!(groups[0].strategy, Strategy::Title);
    }

    #[test]
    fn test_author_title_grouping_pairs_hobbits() {
        let groups = AuthorTitleGrouping { threshold: 0.8 }.group(&tolkien_set(), 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
        assert_eq!(groups[0].reason, REASON_SAME_AUTHOR);
    }

    #[test]
    fn test_author_title_requires_same_author() {
        let records = vec![
            Record::new(1, "Collected Poems", "Sylvia Plath"),
            Record::new(2, "Collected Poems", "Philip Larkin"),
            Record::new(3, "collected poems", "  SYLVIA PLATH "),
        ];
        let groups = AuthorTitleGrouping { threshold: 1.0 }.group(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 3]);

        let groups = TitleGrouping { threshold: 1.0 }.group(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_greedy_claim_is_order_dependent() {
        // b bridges a and c; whichever comes first anchors the group
        let a = Record::new(1, "red fish", "x");
        let b = Record::new(2, "red fish blue fish", "x");
        let c = Record::new(3, "blue fish", "x");

        let groups = TitleGrouping { threshold: 0.5 }.group(&[a.clone(), b.clone(), c.clone()], 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);

        let groups = TitleGrouping { threshold: 0.5 }.group(&[b, a, c], 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![2, 1, 3]);
    }

    #[test]
    fn test_title_groups_are_exclusive() {
        let records: Vec<Record> = (1..=9)
            .map(|id| Record::new(id, format!("saga volume {}", id % 3), "anon"))
            .collect();
        let groups = TitleGrouping { threshold: 0.3 }.group(&records, 100);

        let mut seen = HashSet::new();
        for group in &groups {
            assert!(group.len() >= 2);
            for id in group.member_ids() {
                assert!(seen.insert(id), "record {} appears in two groups", id);
            }
        }
    }

    #[test]
    fn test_max_groups_caps_output() {
        let records = vec![
            Record::new(1, "Emma", "Austen"),
            Record::new(2, "Emma", "Austen"),
            Record::new(3, "Persuasion", "Austen"),
            Record::new(4, "Persuasion", "Austen"),
            Record::new(5, "Dracula", "Stoker"),
            Record::new(6, "Dracula", "Stoker"),
        ];
        let groups = TitleGrouping { threshold: 1.0 }.group(&records, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
        assert_eq!(groups[1].member_ids(), vec![3, 4]);

        let groups = AuthorTitleGrouping { threshold: 1.0 }.group(&records, 1);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
    }

    #[test]
    fn test_threshold_zero_matches_everything() {
        let records = vec![
            Record::new(1, "Dune", "a"),
            Record::new(2, "Emma", "b"),
            Record::new(3, "Ulysses", "c"),
        ];
        let groups = TitleGrouping { threshold: 0.0 }.group(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn test_threshold_one_requires_equal_titles() {
        let records = vec![
            Record::new(1, "The Hobbit", "a"),
            Record::new(2, "Hobbit: There and Back Again", "b"),
            Record::new(3, "Hobbit Tales", "c"),
        ];
        let groups = TitleGrouping { threshold: 1.0 }.group(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
    }

    #[test]
    fn test_identifier_grouping() {
        let records = vec![
            Record::new(5, "Fellowship", "Tolkien").with_identifiers("isbn:123"),
            Record::new(6, "Fellowship of the Ring", "Tolkien")
                .with_identifiers("ISBN:123, asin:999"),
        ];
        let groups = IdentifierGrouping.group(&records, 10);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids(), vec![5, 6]);
        assert_eq!(groups[0].reason, "matching identifier: isbn:123");
    }

    #[test]
    fn test_identifier_groups_may_overlap() {
        let records = vec![
            Record::new(1, "A", "x").with_identifiers("isbn:1, asin:a"),
            Record::new(2, "B", "y").with_identifiers("isbn:1"),
            Record::new(3, "C", "z").with_identifiers("asin:a"),
            Record::new(4, "D", "w"),
        ];
        let groups = IdentifierGrouping.group(&records, 10);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].reason, identifier_reason("isbn:1"));
        assert_eq!(groups[0].member_ids(), vec![1, 2]);
        assert_eq!(groups[1].reason, identifier_reason("asin:a"));
        assert_eq!(groups[1].member_ids(), vec![1, 3]);

        let capped = IdentifierGrouping.group(&records, 1);
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].reason, identifier_reason("isbn:1"));
    }

    #[test]
    fn test_empty_input() {
        for strategy in [Strategy::Title, Strategy::AuthorTitle, Strategy::Identifier] {
            assert!(grouping_for(strategy, 0.5).group(&[], 10).is_empty());
        }
    }

    #[test]
    fn test_grouping_for_dispatch() {
        assert_eq!(grouping_for(Strategy::Title, 0.5).strategy(), Strategy::Title);
        assert_eq!(grouping_for(Strategy::AuthorTitle, 0.5).strategy(), Strategy::AuthorTitle);
        assert_eq!(grouping_for(Strategy::Identifier, 0.5).strategy(), Strategy::Identifier);
    }

    #[test]
    fn test_index_in_order_keeps_first_seen_order() {
        let index = index_in_order(vec![("b", 0), ("a", 1), ("b", 2)].into_iter());
        assert_eq!(index, vec![("b", vec![0, 2]), ("a", vec![1])]);
    }

    #[test]
    fn test_match_target_title() {
        let records = tolkien_set();
        let params = TargetParams {
            threshold: 0.8,
            ..Default::default()
        };
        let matches = match_target(&records[0], &records, &params);
        assert_eq!(matches.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_match_target_author_title() {
        let records = vec![
            Record::new(1, "Poems", "Plath"),
            Record::new(2, "Poems", "Larkin"),
            Record::new(3, "Poems", "plath"),
        ];
        let params = TargetParams {
            strategy: Strategy::AuthorTitle,
            threshold: 1.0,
            same_author: false,
        };
        let matches = match_target(&records[0], &records, &params);
        assert_eq!(matches.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_match_target_identifier() {
        let records = vec![
            Record::new(1, "Dune", "Herbert").with_identifiers("isbn:1, asin:x"),
            Record::new(2, "Completely Different", "Someone").with_identifiers("ASIN:X"),
            Record::new(3, "Dune", "Herbert"),
        ];
        let params = TargetParams {
            strategy: Strategy::Identifier,
            threshold: 1.0,
            same_author: false,
        };
        let matches = match_target(&records[0], &records, &params);
        assert_eq!(matches.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_match_target_identifier_fallback() {
        let records = vec![
            Record::new(1, "Dune", "Herbert"),
            Record::new(2, "Dune", "Someone Else"),
            Record::new(3, "Dune: Deluxe Edition", "Herbert").with_identifiers("isbn:9"),
        ];
        let mut params = TargetParams {
            strategy: Strategy::Identifier,
            threshold: 1.0,
            same_author: false,
        };
        let matches = match_target(&records[0], &records, &params);
        assert_eq!(matches.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);

        params.same_author = true;
        let matches = match_target(&records[0], &records, &params);
        assert_eq!(matches.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);
    }
}
