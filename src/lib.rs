//! Bookdup Duplicate Book Detection Library
//!
//! Finds groups of library records that likely describe the same book
//! despite differing metadata: typos, edition variants, subtitles, or
//! re-tagged identifiers.
//!
//! # Example
//!
//! ```
//! use bookdup::prelude::*;
//!
//! let records = vec![
//!     Record::new(1, "The Hobbit", "J.R.R. Tolkien"),
//!     Record::new(2, "Hobbit, The", "J.R.R. Tolkien"),
//!     Record::new(3, "Dune", "Frank Herbert"),
//! ];
//!
//! let groups = find_duplicates(&records, &ScanParams::default()).unwrap();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].member_ids(), vec![1, 2]);
//! ```
//!
//! # Library Scan Example
//!
//! ```no_run
//! use bookdup::prelude::*;
//! use std::path::Path;
//!
//! let library = CalibreLibrary::open(Path::new("/books/Calibre Library")).unwrap();
//! let params = ScanParams {
//!     strategy: Strategy::Identifier,
//!     ..Default::default()
//! };
//!
//! let report = scan_library(&library, &params, true).unwrap();
//! for group in &report.groups {
//!     println!("{}: {:?}", group.reason, group.member_ids());
//! }
//! ```

pub mod config;
pub mod db;
pub mod group;
pub mod identifiers;
pub mod models;
pub mod normalize;
pub mod output;
pub mod scan;
pub mod similarity;
pub mod source;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{load_config, load_from_path, ConfigError, ConfigFile};
    pub use crate::db::{
        load_library_stats, load_record, load_records, load_records_from_excel,
        resolve_metadata_db, DbError,
    };
    pub use crate::group::{
        grouping_for, match_target, AuthorTitleGrouping, GroupingStrategy, IdentifierGrouping,
        TitleGrouping,
    };
    pub use crate::identifiers::{parse_identifiers, IdentifierSet};
    pub use crate::models::{
        DuplicateGroup, LibraryStats, ParamError, Record, ScanParams, ScanReport, Strategy,
        TargetParams, TargetReport, TargetedMatch,
    };
    pub use crate::normalize::{author_key, normalize_title};
    pub use crate::output::{
        format_group, format_record, print_groups, print_summary, print_target_report,
        render_markdown, render_target_markdown, write_csv, write_groups, write_json,
        write_json_file, write_summary, write_target_csv, write_target_json,
        write_target_report, OutputError,
    };
    pub use crate::scan::{
        check_library, find_duplicates, find_duplicates_of, scan_library, ScanError,
    };
    pub use crate::similarity::{jaccard_similarity, similarity, token_set};
    pub use crate::source::{
        check_record_ids, open_source, CalibreLibrary, InMemorySource, JsonCatalog, RecordSource,
        SourceError, SpreadsheetCatalog,
    };
}

// Re-export commonly used types at the crate root
pub use models::{DuplicateGroup, Record, ScanParams, Strategy, TargetParams, TargetedMatch};
pub use scan::{find_duplicates, find_duplicates_of};
