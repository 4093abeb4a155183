//! Dataset cleaners
//!
//! Both cleaners default to a dry run and only delete with an explicit flag.

pub mod integrity;
pub mod similarity;

pub use integrity::{check_file_integrity, IntegrityCleaner, IntegrityIssue, IntegrityReport};
pub use similarity::{SimilarityCleaner, SimilarityReport, THRESHOLD};

/// Maximum number of itemized entries in a printed report
pub const REPORT_LIMIT: usize = 10;
