//! # Score Analysis - knowledge-point breakdown of exam scores
//!
//! Reads a per-question score export and a question to knowledge-point map,
//! and produces per-student totals by knowledge point, a printable
//! per-student sheet and per-class score distributions in one workbook.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │ score.xls   │────▶│   Parser    │────▶│  Aggregate  │────▶│ Layout       │
//! │ point.xlsx  │     │ (normalize) │     │ (join, sum) │     │ Distribution │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬───────┘
//!                                                                   ▼
//!                                                        score_analysis.xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use score_analysis::{run_analysis, AnalysisConfig, AnalysisPaths};
//!
//! fn main() {
//!     let config = AnalysisConfig::from_env().unwrap();
//!     let analysis = run_analysis(&AnalysisPaths::default(), &config).unwrap();
//!     println!("{} classes", analysis.distribution.classes.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types and data gap warnings
//! - [`config`] - Run configuration with environment overrides
//! - [`models`] - Score table, point map, point score table
//! - [`parser`] - Workbook/CSV reading and header normalization
//! - [`validation`] - Schema checks on the normalized tables
//! - [`transform`] - Aggregation, report layout, distribution, pipeline
//! - [`writer`] - Workbook and JSON output
//! - [`logs`] - Run log

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Logging
pub mod logs;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Analysis
pub mod transform;

// Output
pub mod writer;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, DataGapWarning, InputError, PipelineError, PipelineResult, ReportError,
    SchemaError, WriteError,
};

// =============================================================================
// Re-exports - Config and models
// =============================================================================

pub use config::{AnalysisConfig, LayoutOptions};

pub use models::{
    Category, CategoryKind, IdentityHeaders, PointMap, PointScoreTable, ScoreTable, StudentIdentity,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{normalize_point_sheet, normalize_score_sheet, read_sheet, RawSheet, ScoreSheet};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use transform::{
    aggregate, build_point_template, compute_distribution, format_student_report, paginate,
    ClassDistribution, DistributionCell, ProvenanceIndex, ReportGrid,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    analyze, analyze_files, build_template, load_point_map, load_score_table, run_analysis,
    Analysis, AnalysisPaths,
};
