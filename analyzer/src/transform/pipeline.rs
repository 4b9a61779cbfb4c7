//! High-level pipeline API for a score analysis run.
//!
//! This module combines all steps: reading both source sheets, normalizing
//! and validating them, aggregating by knowledge point, laying out the
//! student report and computing the class distribution.
//!
//! # Example
//!
//! ```rust,ignore
//! use score_analysis::{run_analysis, AnalysisConfig, AnalysisPaths};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analysis = run_analysis(&AnalysisPaths::default(), &AnalysisConfig::default())?;
//!     println!("Analyzed {} students", analysis.point_scores.len());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::aggregate::aggregate;
use super::distribution::{compute_distribution, ClassDistribution, ProvenanceIndex};
use super::layout::{format_student_report, ReportGrid};
use super::template::build_point_template;
use crate::config::AnalysisConfig;
use crate::error::{DataGapWarning, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning, LogEntry, LOG_BROADCASTER};
use crate::models::{PointMap, PointScoreTable, ScoreTable};
use crate::parser::{normalize_point_sheet, normalize_score_sheet, read_sheet, ScoreSheet};
use crate::validation::{validate_point_map, validate_score_table};
use crate::writer::{write_analysis_workbook, write_json, write_point_template};

/// Where a run reads and writes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPaths {
    /// Score export.
    pub score: PathBuf,
    /// Point map workbook.
    pub point: PathBuf,
    /// Analysis workbook.
    pub output: PathBuf,
    /// Optional JSON dump of the whole analysis.
    pub json: Option<PathBuf>,
}

impl Default for AnalysisPaths {
    fn default() -> Self {
        Self {
            score: PathBuf::from("./score.xls"),
            point: PathBuf::from("./point.xlsx"),
            output: PathBuf::from("./score_analysis.xlsx"),
            json: None,
        }
    }
}

/// Result of a complete analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Normalized score table
    pub score_table: ScoreTable,

    /// Point map as read
    pub point_map: PointMap,

    /// Per-student totals by category
    pub point_scores: PointScoreTable,

    /// Printable student sheet
    pub report: ReportGrid,

    /// Class shares per score and category
    pub distribution: ClassDistribution,

    /// Names behind every class share
    pub provenance: ProvenanceIndex,

    /// Non-fatal data gaps, in the order they were found
    pub warnings: Vec<DataGapWarning>,
}

/// JSON dump of a run: the analysis plus the run log.
#[derive(Debug, Serialize)]
pub struct AnalysisDump<'a> {
    #[serde(flatten)]
    pub analysis: &'a Analysis,
    pub log: Vec<LogEntry>,
}

/// Run the three stages on already-normalized tables.
///
/// Pure: reads nothing from disk and logs nothing.
pub fn analyze(
    score_table: ScoreTable,
    point_map: PointMap,
    config: &AnalysisConfig,
) -> PipelineResult<Analysis> {
    validate_score_table(&score_table)?;
    validate_point_map(&point_map)?;

    let aggregation = aggregate(&point_map, &score_table)?;
    let report = format_student_report(&aggregation.table, &config.layout)?;
    let statistics = compute_distribution(&aggregation.table, &config.class_order);

    let mut warnings = aggregation.warnings;
    warnings.extend(statistics.warnings);

    Ok(Analysis {
        score_table,
        point_map,
        point_scores: aggregation.table,
        report,
        distribution: statistics.distribution,
        provenance: statistics.provenance,
        warnings,
    })
}

/// Read and normalize the score export.
pub fn load_score_table(path: &Path, config: &AnalysisConfig) -> PipelineResult<ScoreSheet> {
    log_info(format!("📖 Reading score table {}...", path.display()));
    let raw = read_sheet(path)?;
    let sheet = normalize_score_sheet(&raw, config)?;
    log_success(format!(
        "Read {} students, {} questions",
        sheet.table.len(),
        sheet.table.questions.len()
    ));
    Ok(sheet)
}

/// Read and normalize the point map.
pub fn load_point_map(path: &Path, config: &AnalysisConfig) -> PipelineResult<PointMap> {
    log_info(format!("📖 Reading point map {}...", path.display()));
    let raw = read_sheet(path)?;
    let map = normalize_point_sheet(&raw, config)?;
    log_success(format!(
        "Read {} questions, {} categories",
        map.rows.len(),
        map.categories.len()
    ));
    Ok(map)
}

/// Read both inputs and analyze them.
pub fn analyze_files(
    score_path: &Path,
    point_path: &Path,
    config: &AnalysisConfig,
) -> PipelineResult<Analysis> {
    let ScoreSheet { table, warnings: read_warnings } = load_score_table(score_path, config)?;
    let point_map = load_point_map(point_path, config)?;

    log_info("🔄 Aggregating scores by knowledge point...");
    let mut analysis = analyze(table, point_map, config)?;
    log_success(format!(
        "{} students x {} categories",
        analysis.point_scores.len(),
        analysis.point_scores.categories.len()
    ));
    log_success(format!(
        "Student report: {} rows",
        analysis.report.rows.len()
    ));
    log_success(format!(
        "Class distribution: {} classes, {} rows",
        analysis.distribution.classes.len(),
        analysis.distribution.rows.len()
    ));

    let mut warnings = read_warnings;
    warnings.append(&mut analysis.warnings);
    analysis.warnings = warnings;

    report_warnings(&analysis.warnings);
    Ok(analysis)
}

/// Full run: analyze, then write the workbook and the optional JSON dump.
///
/// Nothing is written when any stage fails.
pub fn run_analysis(paths: &AnalysisPaths, config: &AnalysisConfig) -> PipelineResult<Analysis> {
    let analysis = analyze_files(&paths.score, &paths.point, config)?;

    log_info(format!("💾 Writing {}...", paths.output.display()));
    write_analysis_workbook(&analysis, &paths.output)?;
    log_success(format!("Saved {}", paths.output.display()));

    if let Some(json) = &paths.json {
        let dump = AnalysisDump {
            analysis: &analysis,
            log: LOG_BROADCASTER.journal(),
        };
        write_json(&dump, json)?;
        log_success(format!("Saved {}", json.display()));
    }

    Ok(analysis)
}

/// Generate the editable point map from the score export.
pub fn build_template(
    score_path: &Path,
    output_path: &Path,
    config: &AnalysisConfig,
) -> PipelineResult<PointMap> {
    let ScoreSheet { table, warnings } = load_score_table(score_path, config)?;
    report_warnings(&warnings);

    log_info("🧩 Building point map template...");
    let map = build_point_template(&table, config)?;

    write_point_template(&map, output_path)?;
    log_success(format!(
        "Point map template with {} questions saved to {}",
        map.rows.len(),
        output_path.display()
    ));
    Ok(map)
}

fn report_warnings(warnings: &[DataGapWarning]) {
    if warnings.is_empty() {
        return;
    }
    log_warning(format!("{} data gaps found", warnings.len()));
    for warning in warnings {
        log_info_indent(warning.to_string(), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Category, CategoryKind, IdentityHeaders, PointMapRow, StudentIdentity, StudentScores,
    };

    fn inputs() -> (ScoreTable, PointMap) {
        let scores = ScoreTable::new(
            IdentityHeaders::default(),
            vec!["1".into(), "2".into(), "3".into()],
            vec![
                StudentScores {
                    identity: StudentIdentity::new("1001", "甲", "1班"),
                    scores: vec![Some(2.0), Some(1.0), Some(3.0)],
                },
                StudentScores {
                    identity: StudentIdentity::new("1002", "乙", "2班"),
                    scores: vec![Some(1.0), None, Some(2.5)],
                },
            ],
        );
        let map = PointMap::new(
            " ",
            vec![
                Category::new("全卷", CategoryKind::WholePaper),
                Category::knowledge_point("听力"),
                Category::knowledge_point("作文"),
            ],
            vec![
                PointMapRow { question: "1".into(), members: vec![true, true, false] },
                PointMapRow { question: "2".into(), members: vec![true, true, false] },
                PointMapRow { question: "3".into(), members: vec![true, false, true] },
                PointMapRow { question: "4".into(), members: vec![false, false, true] },
            ],
        );
        (scores, map)
    }

    #[test]
    fn test_default_paths() {
        let paths = AnalysisPaths::default();
        assert_eq!(paths.score, PathBuf::from("./score.xls"));
        assert_eq!(paths.output, PathBuf::from("./score_analysis.xlsx"));
        assert!(paths.json.is_none());
    }

    #[test]
    fn test_analyze_runs_every_stage() {
        let (scores, map) = inputs();
        let analysis = analyze(scores, map, &AnalysisConfig::default()).unwrap();

        assert_eq!(analysis.point_scores.rows[0].values, vec![6.0, 3.0, 3.0]);
        assert_eq!(analysis.point_scores.rows[1].values, vec![3.5, 1.0, 2.5]);
        assert_eq!(analysis.report.rows.len(), 8);
        assert_eq!(analysis.distribution.classes, vec!["1班", "2班"]);
        assert_eq!(
            analysis.warnings,
            vec![DataGapWarning::MissingQuestion { category: "作文".into(), question: "4".into() }]
        );
    }

    #[test]
    fn test_reruns_are_identical() {
        let (scores, map) = inputs();
        let first = analyze(scores.clone(), map.clone(), &AnalysisConfig::default()).unwrap();
        let second = analyze(scores, map, &AnalysisConfig::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_schema_errors_stop_the_run() {
        let (mut scores, map) = inputs();
        scores.rows[1].identity.exam_number = "1001".into();
        let err = analyze(scores, map, &AnalysisConfig::default()).unwrap_err();
        assert!(err.to_string().contains("1001"));
    }
}
