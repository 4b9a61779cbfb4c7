//! Run configuration.
//!
//! Defaults match the exports of the school's marking system. Every field can
//! be overridden from the environment (a `.env` file is loaded first), and the
//! CLI applies its own flags on top.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `SCORE_ANALYSIS_EXAM_COLUMN` | `identity.exam_number` |
//! | `SCORE_ANALYSIS_NAME_COLUMN` | `identity.name` |
//! | `SCORE_ANALYSIS_CLASS_COLUMN` | `identity.class` |
//! | `SCORE_ANALYSIS_TITLE_ROWS` | `score_sheet.title_rows` |
//! | `SCORE_ANALYSIS_GROUP_SIZE` | `layout.group_size` |
//! | `SCORE_ANALYSIS_ROW_WIDTH` | `layout.row_width` |
//! | `SCORE_ANALYSIS_CLASS_ORDER` | `class_order` (comma separated) |

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::IdentityHeaders;

/// Reserved category names of the point map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReservedCategories {
    pub whole_paper: String,
    pub paper_one: String,
    pub paper_two: String,
}

impl Default for ReservedCategories {
    fn default() -> Self {
        Self {
            whole_paper: "全卷".to_string(),
            paper_one: "1卷".to_string(),
            paper_two: "2卷".to_string(),
        }
    }
}

/// How the raw score sheet is laid out and cleaned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSheetOptions {
    /// Rows above the sparse header row (export titles).
    pub title_rows: usize,
    /// Leading cells of the sparse header row copied over the question header.
    pub sparse_header_width: usize,
    /// Columns whose header contains this marker are dropped.
    pub answer_marker: String,
    /// Student-ID column, dropped.
    pub student_id_column: String,
    /// Headers are cut at the first occurrence of this marker.
    pub header_cut_marker: String,
}

impl Default for ScoreSheetOptions {
    fn default() -> Self {
        Self {
            title_rows: 0,
            sparse_header_width: 4,
            answer_marker: "答案".to_string(),
            student_id_column: "学号".to_string(),
            header_cut_marker: "（".to_string(),
        }
    }
}

/// Student report grid dimensions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    /// Rows per student block.
    pub group_size: usize,
    /// Columns of the grid, including the label column.
    pub row_width: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            group_size: 4,
            row_width: 10,
        }
    }
}

/// Seed values for a generated point map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateOptions {
    /// Header of the question column.
    pub question_header: String,
    /// Knowledge-point categories following the reserved ones.
    pub categories: Vec<String>,
    /// Category pre-marked for the listening block.
    pub listening_category: String,
    /// First question row of the listening block (zero based).
    pub listening_first_row: usize,
    /// Last question row of the listening block (inclusive).
    pub listening_last_row: usize,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            question_header: "题型/题号".to_string(),
            categories: [
                "听力", "语法填空", "选词填空", "完型填空", "阅读", "六选四", "概要", "翻译", "作文",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            listening_category: "听力".to_string(),
            listening_first_row: 3,
            listening_last_row: 22,
        }
    }
}

/// Complete configuration of an analysis run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    pub identity: IdentityHeaders,
    pub score_sheet: ScoreSheetOptions,
    pub reserved: ReservedCategories,
    pub layout: LayoutOptions,
    pub template: TemplateOptions,
    /// Fixed class column order for the distribution table; classes seen in
    /// the data but not listed are appended in order of first appearance.
    #[serde(default)]
    pub class_order: Vec<String>,
}

impl AnalysisConfig {
    /// Build the configuration from defaults and `SCORE_ANALYSIS_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(v) = env_string("SCORE_ANALYSIS_EXAM_COLUMN") {
            config.identity.exam_number = v;
        }
        if let Some(v) = env_string("SCORE_ANALYSIS_NAME_COLUMN") {
            config.identity.name = v;
        }
        if let Some(v) = env_string("SCORE_ANALYSIS_CLASS_COLUMN") {
            config.identity.class = v;
        }
        if let Some(v) = env_parsed("SCORE_ANALYSIS_TITLE_ROWS")? {
            config.score_sheet.title_rows = v;
        }
        if let Some(v) = env_parsed("SCORE_ANALYSIS_GROUP_SIZE")? {
            config.layout.group_size = v;
        }
        if let Some(v) = env_parsed("SCORE_ANALYSIS_ROW_WIDTH")? {
            config.layout.row_width = v;
        }
        if let Some(v) = env_string("SCORE_ANALYSIS_CLASS_ORDER") {
            config.class_order = split_list(&v);
        }

        Ok(config)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(None),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', '，'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.identity.exam_number, "考号");
        assert_eq!(config.identity.class, "行政班级");
        assert_eq!(config.layout.group_size, 4);
        assert_eq!(config.layout.row_width, 10);
        assert_eq!(config.score_sheet.title_rows, 0);
        assert_eq!(config.template.categories.len(), 9);
        assert!(config.class_order.is_empty());
    }

    #[test]
    fn test_split_list_accepts_both_commas() {
        assert_eq!(split_list("1班, 2班，3班,,"), vec!["1班", "2班", "3班"]);
    }

    #[test]
    fn test_config_json_roundtrip_keeps_layout() {
        let mut config = AnalysisConfig::default();
        config.layout.row_width = 6;
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.layout.row_width, 6);
    }
}
