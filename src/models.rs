//! Data structures for the duplicate detection pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Invalid caller-supplied parameters. Raised before any grouping work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("Threshold must be within 0.0..=1.0, got {0}")]
    InvalidThreshold(f64),
    #[error("max_groups must be at least 1")]
    InvalidMaxGroups,
    #[error("Unknown strategy: {0} (expected title, author_title or identifier)")]
    UnknownStrategy(String),
}

/// A single book entry as supplied by a record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub title: String,
    pub authors: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<String>,
}

impl Record {
    pub fn new(id: u64, title: impl Into<String>, authors: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            authors: authors.into(),
            identifiers: None,
            formats: None,
        }
    }

    pub fn with_identifiers(mut self, identifiers: impl Into<String>) -> Self {
        self.identifiers = Some(identifiers.into());
        self
    }

    pub fn with_formats(mut self, formats: impl Into<String>) -> Self {
        self.formats = Some(formats.into());
        self
    }

    /// Format entries for display. Never used for matching.
    pub fn format_list(&self) -> Vec<&str> {
        self.formats
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// Grouping strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Greedy grouping on normalized-title similarity
    #[default]
    Title,
    /// Title grouping scoped to exact (case-folded) author strings
    AuthorTitle,
    /// Records sharing at least one external identifier
    Identifier,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Title => "title",
            Strategy::AuthorTitle => "author_title",
            Strategy::Identifier => "identifier",
        }
    }

    /// Whether the similarity threshold takes part in full-scan grouping.
    pub fn uses_threshold(&self) -> bool {
        !matches!(self, Strategy::Identifier)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "title" => Ok(Strategy::Title),
            "author_title" | "author-title" => Ok(Strategy::AuthorTitle),
            "identifier" | "identifiers" => Ok(Strategy::Identifier),
            _ => Err(ParamError::UnknownStrategy(s.to_string())),
        }
    }
}

/// One candidate set of records describing the same book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub strategy: Strategy,
    pub reason: String,
    pub members: Vec<Record>,
}

impl DuplicateGroup {
    pub fn member_ids(&self) -> Vec<u64> {
        self.members.iter().map(|r| r.id).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Full-scan parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    pub strategy: Strategy,
    pub threshold: f64,
    pub max_groups: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            strategy: Strategy::Title,
            threshold: 0.8,
            max_groups: 50,
        }
    }
}

impl ScanParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_threshold(self.threshold)?;
        if self.max_groups == 0 {
            return Err(ParamError::InvalidMaxGroups);
        }
        Ok(())
    }
}

/// Targeted-mode parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetParams {
    pub strategy: Strategy,
    pub threshold: f64,
    /// Restrict the identifier strategy's title fallback to the focal author
    pub same_author: bool,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            strategy: Strategy::Title,
            threshold: 0.8,
            same_author: false,
        }
    }
}

impl TargetParams {
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_threshold(self.threshold)
    }
}

fn validate_threshold(threshold: f64) -> Result<(), ParamError> {
    // NaN fails the range check
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ParamError::InvalidThreshold(threshold))
    }
}

/// Outcome of a targeted lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetedMatch {
    FocalNotFound { id: u64 },
    Found { focal: Record, matches: Vec<Record> },
}

impl TargetedMatch {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TargetedMatch::FocalNotFound { .. })
    }

    pub fn matches(&self) -> &[Record] {
        match self {
            TargetedMatch::FocalNotFound { .. } => &[],
            TargetedMatch::Found { matches, .. } => matches,
        }
    }
}

/// Full-scan result with the parameters that produced it
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanReport {
    pub version: String,
    pub parameters: ScanParams,
    pub record_count: usize,
    pub group_count: usize,
    pub groups: Vec<DuplicateGroup>,
}

/// Targeted lookup result
#[derive(Debug, Serialize, Deserialize)]
pub struct TargetReport {
    pub version: String,
    pub parameters: TargetParams,
    pub record_count: usize,
    pub result: TargetedMatch,
}

/// Counts describing a record source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_books: u64,
    pub total_authors: u64,
    pub books_with_identifiers: u64,
    pub total_identifiers: u64,
    pub total_formats: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("title".parse::<Strategy>().unwrap(), Strategy::Title);
        assert_eq!("Author_Title".parse::<Strategy>().unwrap(), Strategy::AuthorTitle);
        assert_eq!("author-title".parse::<Strategy>().unwrap(), Strategy::AuthorTitle);
        assert_eq!("identifier".parse::<Strategy>().unwrap(), Strategy::Identifier);
        assert_eq!(
            "isbn".parse::<Strategy>(),
            Err(ParamError::UnknownStrategy("isbn".to_string()))
        );
    }

    #[test]
    fn test_strategy_display_roundtrips_through_from_str() {
        for strategy in [Strategy::Title, Strategy::AuthorTitle, Strategy::Identifier] {
            assert_eq!(strategy.to_string().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_scan_params_validation() {
        assert!(ScanParams::default().validate().is_ok());

        let params = ScanParams {
            threshold: 1.5,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ParamError::InvalidThreshold(1.5)));

        let params = ScanParams {
            threshold: -0.1,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ScanParams {
            threshold: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ScanParams {
            max_groups: 0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ParamError::InvalidMaxGroups));
    }

    #[test]
    fn test_threshold_bounds_are_inclusive() {
        for threshold in [0.0, 1.0] {
            let params = TargetParams {
                threshold,
                ..Default::default()
            };
            assert!(params.validate().is_ok());
        }
    }

    #[test]
    fn test_format_list() {
        let record = Record::new(1, "Dune", "Frank Herbert")
            .with_formats("Frank Herbert/Dune (1)/Dune.epub, , Frank Herbert/Dune (1)/Dune.pdf");
        assert_eq!(
            record.format_list(),
            vec!["Frank Herbert/Dune (1)/Dune.epub", "Frank Herbert/Dune (1)/Dune.pdf"]
        );
        assert!(Record::new(2, "Emma", "Jane Austen").format_list().is_empty());
    }

    #[test]
    fn test_targeted_match_serializes_outcome_tag() {
        let json = serde_json::to_string(&TargetedMatch::FocalNotFound { id: 7 }).unwrap();
        assert_eq!(json, r#"{"outcome":"focal_not_found","id":7}"#);
    }
}
