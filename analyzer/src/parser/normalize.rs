//! Header normalization of the two source sheets.
//!
//! The score export carries a sparse header row whose leading cells label the
//! identity block, followed by the per-question header row:
//!
//! ```text
//! ┌──────┬──────┬──────┬────────┬──────────┬──────────┬─────┐
//! │ 学号 │ 考号 │ 姓名 │ 行政班级 │          │          │     │  sparse header
//! ├──────┼──────┼──────┼────────┼──────────┼──────────┼─────┤
//! │      │      │      │        │ 1（2分） │ 1答案    │ ... │  question header
//! ├──────┼──────┼──────┼────────┼──────────┼──────────┼─────┤
//! │ 0101 │ 1001 │ 张三 │ 1班    │ 2        │ A        │ ... │  data
//! └──────┴──────┴──────┴────────┴──────────┴──────────┴─────┘
//! ```
//!
//! Answer-key columns and the student-ID column are dropped, headers are cut
//! at the first `（`, and rows are sorted by exam number.

use std::cmp::Ordering;

use crate::config::AnalysisConfig;
use crate::error::{DataGapWarning, InputError, PipelineResult, SchemaError};
use crate::models::{
    Category, CategoryKind, PointMap, PointMapRow, ScoreTable, StudentIdentity, StudentScores,
};

use super::RawSheet;

/// Header label given to the question column of a point map.
pub const POINT_QUESTION_HEADER: &str = " ";

/// A normalized score table plus the cells that could not be read.
#[derive(Debug, Clone)]
pub struct ScoreSheet {
    pub table: ScoreTable,
    pub warnings: Vec<DataGapWarning>,
}

/// Turn the raw score export into a [`ScoreTable`].
pub fn normalize_score_sheet(
    sheet: &RawSheet,
    config: &AnalysisConfig,
) -> PipelineResult<ScoreSheet> {
    let options = &config.score_sheet;
    let sparse_row = options.title_rows;
    let header_row = sparse_row + 1;
    let data_start = header_row + 1;

    if sheet.height() <= data_start {
        return Err(InputError::TooFewRows {
            table: "score".to_string(),
            found: sheet.height(),
            required: data_start + 1,
        }
        .into());
    }

    // Effective header: sparse labels over the identity block, then questions
    let mut columns: Vec<(usize, String)> = Vec::new();
    for col in 0..sheet.width() {
        let sparse = sheet.cell(sparse_row, col);
        let label = if col < options.sparse_header_width && !sparse.is_empty() {
            sparse.label()
        } else {
            sheet.cell(header_row, col).label()
        };

        if label.is_empty()
            || label.contains(&options.answer_marker)
            || label == options.student_id_column
        {
            continue;
        }

        let name = cut_header(&label, &options.header_cut_marker);
        if columns.iter().any(|(_, existing)| *existing == name) {
            return Err(SchemaError::DuplicateColumn {
                table: "score".to_string(),
                column: name,
            }
            .into());
        }
        columns.push((col, name));
    }

    let find = |column: &str| -> Result<usize, SchemaError> {
        columns
            .iter()
            .find(|(_, name)| name == column)
            .map(|(col, _)| *col)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: "score".to_string(),
                column: column.to_string(),
            })
    };
    let exam_col = find(&config.identity.exam_number)?;
    let name_col = find(&config.identity.name)?;
    let class_col = find(&config.identity.class)?;

    let questions: Vec<(usize, String)> = columns
        .iter()
        .filter(|(col, _)| *col != exam_col && *col != name_col && *col != class_col)
        .cloned()
        .collect();

    let mut warnings = Vec::new();
    let mut rows = Vec::new();

    for row in data_start..sheet.height() {
        if columns.iter().all(|(col, _)| sheet.cell(row, *col).is_empty()) {
            continue;
        }

        let identity = StudentIdentity::new(
            sheet.cell(row, exam_col).label(),
            sheet.cell(row, name_col).label(),
            sheet.cell(row, class_col).label(),
        );

        let scores = questions
            .iter()
            .map(|(col, question)| match sheet.cell(row, *col).number() {
                Ok(value) => value,
                Err(text) => {
                    warnings.push(DataGapWarning::UnparsedScore {
                        exam_number: identity.exam_number.clone(),
                        question: question.clone(),
                        value: text,
                    });
                    None
                }
            })
            .collect();

        rows.push(StudentScores { identity, scores });
    }

    if rows.is_empty() {
        return Err(InputError::EmptyTable("score".to_string()).into());
    }

    rows.sort_by_cached_key(|row| ExamKey::new(&row.identity.exam_number));

    let table = ScoreTable::new(
        config.identity.clone(),
        questions.into_iter().map(|(_, name)| name).collect(),
        rows,
    );

    Ok(ScoreSheet { table, warnings })
}

/// Turn the raw point map sheet into a [`PointMap`].
///
/// The first column identifies the question; every other named column is a
/// category whose cells are `1` for members.
pub fn normalize_point_sheet(
    sheet: &RawSheet,
    config: &AnalysisConfig,
) -> PipelineResult<PointMap> {
    if sheet.height() == 0 {
        return Err(InputError::EmptyTable("point".to_string()).into());
    }

    let header_width = (0..sheet.width())
        .rev()
        .find(|&col| !sheet.cell(0, col).is_empty())
        .map(|col| col + 1)
        .unwrap_or(0);

    let mut categories = Vec::new();
    for col in 1..header_width {
        let name = sheet.cell(0, col).label();
        if name.is_empty() {
            return Err(SchemaError::EmptyHeader {
                table: "point".to_string(),
                index: col,
            }
            .into());
        }
        let kind = category_kind(&name, config);
        categories.push(Category::new(name, kind));
    }

    if categories.is_empty() {
        return Err(SchemaError::EmptyPointMap.into());
    }

    let rows: Vec<PointMapRow> = (1..sheet.height())
        .filter_map(|row| {
            let question = sheet.cell(row, 0).label();
            if question.is_empty() {
                return None;
            }
            let members = (1..header_width)
                .map(|col| is_indicator_set(sheet, row, col))
                .collect();
            Some(PointMapRow { question, members })
        })
        .collect();

    if rows.is_empty() {
        return Err(InputError::EmptyTable("point".to_string()).into());
    }

    Ok(PointMap::new(POINT_QUESTION_HEADER, categories, rows))
}

/// Classify a category name against the reserved names.
pub fn category_kind(name: &str, config: &AnalysisConfig) -> CategoryKind {
    let reserved = &config.reserved;
    if name == reserved.whole_paper {
        CategoryKind::WholePaper
    } else if name == reserved.paper_one {
        CategoryKind::PaperOne
    } else if name == reserved.paper_two {
        CategoryKind::PaperTwo
    } else {
        CategoryKind::KnowledgePoint
    }
}

fn is_indicator_set(sheet: &RawSheet, row: usize, col: usize) -> bool {
    matches!(sheet.cell(row, col).number(), Ok(Some(v)) if v == 1.0)
}

/// Cut a header at the first occurrence of `marker`.
pub fn cut_header(label: &str, marker: &str) -> String {
    if marker.is_empty() {
        return label.trim().to_string();
    }
    match label.find(marker) {
        Some(idx) => label[..idx].trim().to_string(),
        None => label.trim().to_string(),
    }
}

/// Sort key of an exam number: numbers in numeric order, then text, then blanks.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamKey {
    Number(f64),
    Text(String),
    Blank,
}

impl ExamKey {
    pub fn new(exam_number: &str) -> Self {
        let trimmed = exam_number.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if !value.is_nan() => Self::Number(value),
            _ => Self::Text(trimmed.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Text(_) => 1,
            Self::Blank => 2,
        }
    }
}

impl Eq for ExamKey {}

impl Ord for ExamKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ExamKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exam number order, see [`ExamKey`].
pub fn compare_exam_numbers(a: &str, b: &str) -> Ordering {
    ExamKey::new(a).cmp(&ExamKey::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_csv_str;

    fn score_csv() -> &'static str {
        "学号,考号,姓名,行政班级,,,\n\
         ,,,,1（2分）,1答案,2（3分）\n\
         s2,1002,李四,1班,1,B,3\n\
         s1,1001,张三,2班,2,A,\n\
         s3,999,王五,1班,缺考,C,2\n"
    }

    #[test]
    fn test_normalize_score_sheet() {
        let sheet = parse_csv_str(score_csv(), ',', "score").unwrap();
        let result = normalize_score_sheet(&sheet, &AnalysisConfig::default()).unwrap();
        let table = result.table;

        assert_eq!(table.questions, vec!["1", "2"]);
        let exam_numbers: Vec<&str> =
            table.rows.iter().map(|r| r.identity.exam_number.as_str()).collect();
        assert_eq!(exam_numbers, vec!["999", "1001", "1002"]);

        // Blank stays missing, never zero
        assert_eq!(table.rows[1].scores, vec![Some(2.0), None]);
        assert_eq!(table.rows[1].identity.class, "2班");
    }

    #[test]
    fn test_unparsed_score_is_reported() {
        let sheet = parse_csv_str(score_csv(), ',', "score").unwrap();
        let result = normalize_score_sheet(&sheet, &AnalysisConfig::default()).unwrap();

        assert_eq!(result.table.rows[0].scores, vec![None, Some(2.0)]);
        assert_eq!(
            result.warnings,
            vec![DataGapWarning::UnparsedScore {
                exam_number: "999".into(),
                question: "1".into(),
                value: "缺考".into(),
            }]
        );
    }

    #[test]
    fn test_title_rows_are_skipped() {
        let csv = format!("高三英语期中考试\n{}", score_csv());
        let sheet = parse_csv_str(&csv, ',', "score").unwrap();
        let mut config = AnalysisConfig::default();
        config.score_sheet.title_rows = 1;

        let table = normalize_score_sheet(&sheet, &config).unwrap().table;
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_missing_class_column() {
        let csv = "学号,考号,姓名,班,\n,,,,1\n1,1001,张三,1班,2\n";
        let sheet = parse_csv_str(csv, ',', "score").unwrap();
        let err = normalize_score_sheet(&sheet, &AnalysisConfig::default()).unwrap_err();
        assert!(err.to_string().contains("行政班级"));
    }

    #[test]
    fn test_too_few_rows() {
        let sheet = parse_csv_str("考号,姓名\n", ',', "score").unwrap();
        let err = normalize_score_sheet(&sheet, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::Input(InputError::TooFewRows { .. })
        ));
    }

    #[test]
    fn test_normalize_point_sheet() {
        let csv = "题型/题号,全卷,1卷,2卷,听力,作文\n1,1,1,,1,\n2,1,,1,,1\n,,,,,\n";
        let sheet = parse_csv_str(csv, ',', "point").unwrap();
        let map = normalize_point_sheet(&sheet, &AnalysisConfig::default()).unwrap();

        assert_eq!(map.question_header, " ");
        assert_eq!(map.categories.len(), 5);
        assert_eq!(map.categories[0].kind, CategoryKind::WholePaper);
        assert_eq!(map.categories[2].kind, CategoryKind::PaperTwo);
        assert_eq!(map.categories[3].kind, CategoryKind::KnowledgePoint);
        assert_eq!(map.rows.len(), 2);
        assert_eq!(map.questions_in(4), vec!["2"]);
    }

    #[test]
    fn test_point_sheet_zero_is_not_member() {
        let csv = "q,听力\n1,0\n2,1.0\n3,\n";
        let sheet = parse_csv_str(csv, ',', "point").unwrap();
        let map = normalize_point_sheet(&sheet, &AnalysisConfig::default()).unwrap();
        assert_eq!(map.questions_in(0), vec!["2"]);
    }

    #[test]
    fn test_point_sheet_blank_header_between_categories() {
        let csv = "q,听力,,作文\n1,1,,1\n";
        let sheet = parse_csv_str(csv, ',', "point").unwrap();
        let err = normalize_point_sheet(&sheet, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::Schema(SchemaError::EmptyHeader { index: 2, .. })
        ));
    }

    #[test]
    fn test_cut_header() {
        assert_eq!(cut_header("21（1.5分）", "（"), "21");
        assert_eq!(cut_header("作文", "（"), "作文");
    }

    #[test]
    fn test_compare_exam_numbers() {
        assert_eq!(compare_exam_numbers("999", "1001"), Ordering::Less);
        assert_eq!(compare_exam_numbers("A2", "A10"), Ordering::Greater);
        assert_eq!(compare_exam_numbers("", "1"), Ordering::Greater);
        assert_eq!(compare_exam_numbers("10", "1a"), Ordering::Less);
        assert_eq!(compare_exam_numbers("1a", "2"), Ordering::Greater);
    }

    #[test]
    fn test_mixed_exam_numbers_sort_without_cycles() {
        let mut csv = String::from("学号,考号,姓名,行政班级,\n,,,,1\n");
        let exam_numbers = (0..40).map(|i| match i % 4 {
            0 => format!("{}", 40 - i),
            1 => format!("{}a", i),
            2 => String::new(),
            _ => format!("{}", i * 7),
        });
        for (i, exam_number) in exam_numbers.enumerate() {
            csv.push_str(&format!("s{i},{exam_number},学生{i},1班,1\n"));
        }

        let sheet = parse_csv_str(&csv, ',', "score").unwrap();
        let table = normalize_score_sheet(&sheet, &AnalysisConfig::default()).unwrap().table;
        assert_eq!(table.len(), 40);

        let keys: Vec<ExamKey> = table
            .rows
            .iter()
            .map(|r| ExamKey::new(&r.identity.exam_number))
            .collect();
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));

        let first_text = keys.iter().position(|k| matches!(k, ExamKey::Text(_))).unwrap();
        let first_blank = keys.iter().position(|k| *k == ExamKey::Blank).unwrap();
        assert!(keys[..first_text].iter().all(|k| matches!(k, ExamKey::Number(_))));
        assert!(keys[first_blank..].iter().all(|k| *k == ExamKey::Blank));
        assert_eq!(table.rows[0].identity.exam_number, "4");
    }
}
