//! Error types for the score analysis pipeline.
//!
//! This module defines the error hierarchy of a batch run:
//!
//! - [`InputError`] - a source file is absent, unreadable or empty
//! - [`SchemaError`] - a required identity/join column is absent or ambiguous
//! - [`ReportError`] - the student report layout cannot be produced
//! - [`WriteError`] - the output workbook or JSON dump could not be written
//! - [`ConfigError`] - an environment override could not be parsed
//! - [`PipelineError`] - top-level orchestration error wrapping all of the above
//!
//! [`DataGapWarning`] is not an error: it is collected during a run and
//! reported, and the affected value degrades to zero or blank.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading one of the two source tables.
#[derive(Debug, Error)]
pub enum InputError {
    /// File does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extension is not a known spreadsheet or CSV format.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    /// Workbook has no sheets at all.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// Invalid CSV content.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    /// Table has no data rows.
    #[error("The {0} table is empty")]
    EmptyTable(String),

    /// Not enough rows to hold the header block.
    #[error("The {table} table has {found} rows, at least {required} are needed")]
    TooFewRows {
        table: String,
        found: usize,
        required: usize,
    },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors about the shape of a table: missing or ambiguous columns.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Required identity column is absent.
    #[error("Column '{column}' not found in the {table} table")]
    MissingColumn { table: String, column: String },

    /// Two columns carry the same name after normalization.
    #[error("Column '{column}' appears more than once in the {table} table")]
    DuplicateColumn { table: String, column: String },

    /// Two students share an exam number.
    #[error("Exam number '{0}' appears more than once")]
    DuplicateExamNumber(String),

    /// A student row has no exam number.
    #[error("Student '{0}' has no exam number")]
    BlankExamNumber(String),

    /// Two point map rows describe the same question.
    #[error("Question '{0}' appears more than once in the point map")]
    DuplicateQuestion(String),

    /// A header cell between two named columns is blank.
    #[error("Blank header at column {index} of the {table} table")]
    EmptyHeader { table: String, index: usize },

    /// Point map has no category columns.
    #[error("Point map has no knowledge-point columns")]
    EmptyPointMap,

    /// Score table has no question columns.
    #[error("Score table has no question columns")]
    NoQuestions,

    /// Point map selects questions, none of which exist in the score table.
    #[error("Point map selects {selected} questions but none of them match a score column")]
    PointMapMismatch { selected: usize },
}

// =============================================================================
// Report Errors
// =============================================================================

/// Errors while laying out the printable student report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Layout parameters cannot describe a grid.
    #[error("Invalid report layout: {0}")]
    InvalidLayout(String),

    /// More categories than the block can hold.
    #[error("{points} knowledge points do not fit in a block of {capacity} cells")]
    Overflow { points: usize, capacity: usize },
}

// =============================================================================
// Write Errors
// =============================================================================

/// Errors at the output boundary.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Workbook construction or save failed.
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors while loading configuration overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable holds a value of the wrong type.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error of a batch run.
///
/// Every variant is fatal: the run stops and no workbook is written.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

// =============================================================================
// Data Gap Warnings
// =============================================================================

/// Non-fatal data gaps found during a run.
///
/// The run continues; the affected value is scored as zero or left blank.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataGapWarning {
    /// A question mapped to a category has no score column.
    #[error("Question '{question}' of '{category}' is not in the score table")]
    MissingQuestion { category: String, question: String },

    /// Every question of a category is missing from the score table.
    #[error("No question of '{category}' matches a score column, the category scores zero")]
    UnresolvedCategory { category: String },

    /// A listed class has no students, its cells are left blank.
    #[error("Class '{class}' has no students")]
    EmptyClass { class: String },

    /// A score cell holds text that is not a number.
    #[error("Score '{value}' of student {exam_number} for '{question}' is not a number")]
    UnparsedScore {
        exam_number: String,
        question: String,
        value: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for schema checks.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for report layout.
pub type ReportResult<T> = Result<T, ReportError>;

/// Result type for output operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let input_err = InputError::EmptyTable("score".into());
        let pipeline_err: PipelineError = input_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let schema_err = SchemaError::MissingColumn {
            table: "score".into(),
            column: "考号".into(),
        };
        let pipeline_err: PipelineError = schema_err.into();
        assert!(pipeline_err.to_string().contains("考号"));
    }

    #[test]
    fn test_warning_format() {
        let warning = DataGapWarning::MissingQuestion {
            category: "听力".into(),
            question: "21".into(),
        };
        let msg = warning.to_string();
        assert!(msg.contains("听力"));
        assert!(msg.contains("'21'"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = DataGapWarning::EmptyClass { class: "3班".into() };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "emptyClass");
        assert_eq!(json["class"], "3班");
    }
}
