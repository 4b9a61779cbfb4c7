//! Workbook and JSON output.
//!
//! The analysis workbook is built in memory and saved once:
//!
//! | Sheet | Content | Header | Frozen | Centered |
//! |-------|---------|--------|--------|----------|
//! | `分数表` | normalized score table | yes | yes | yes |
//! | `考点划分表` | point map | yes | yes | yes |
//! | `考点分数表` | point score table | yes | yes | yes |
//! | `学生得分清单表` | student report grid | no | no | yes |
//! | `班级得分率表` | class distribution | yes | yes | no |

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rust_xlsxwriter::{Format, FormatAlign, Note, Workbook, Worksheet};
use serde::Serialize;

use crate::error::WriteResult;
use crate::models::{PointMap, PointScoreTable, ScoreTable};
use crate::transform::distribution::{Bucket, ClassDistribution, DistributionCell, ProvenanceIndex};
use crate::transform::layout::ReportGrid;
use crate::transform::pipeline::Analysis;

pub const SCORE_SHEET: &str = "分数表";
pub const POINT_SHEET: &str = "考点划分表";
pub const POINT_SCORE_SHEET: &str = "考点分数表";
pub const REPORT_SHEET: &str = "学生得分清单表";
pub const DISTRIBUTION_SHEET: &str = "班级得分率表";

/// Header of the category column of the distribution sheet.
pub const CATEGORY_HEADER: &str = "题号";
/// Header of the bucket column of the distribution sheet.
pub const BUCKET_HEADER: &str = "得分";
/// Header of the overall column of the distribution sheet.
pub const TOTAL_HEADER: &str = "合计";
/// Bucket label of the mean row.
pub const MEAN_LABEL: &str = "均分";
/// Author of the provenance notes.
pub const NOTE_AUTHOR: &str = "sys";

/// Cell formats shared by every sheet.
struct Formats {
    plain: Format,
    center: Format,
    percent: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            plain: Format::new(),
            center: Format::new()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            percent: Format::new().set_num_format("0%"),
        }
    }
}

// =============================================================================
// Analysis workbook
// =============================================================================

/// Write the five analysis sheets to `path`.
pub fn write_analysis_workbook(analysis: &Analysis, path: &Path) -> WriteResult<()> {
    let mut workbook = build_analysis_workbook(analysis)?;
    workbook.save(path)?;
    Ok(())
}

/// Build the analysis workbook without saving it.
pub fn build_analysis_workbook(analysis: &Analysis) -> WriteResult<Workbook> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet().set_name(SCORE_SHEET)?;
    write_score_sheet(sheet, &analysis.score_table, &formats.center)?;
    sheet.set_freeze_panes(1, 0)?;

    let sheet = workbook.add_worksheet().set_name(POINT_SHEET)?;
    write_point_sheet(sheet, &analysis.point_map, &formats.center)?;
    sheet.set_freeze_panes(1, 0)?;

    let sheet = workbook.add_worksheet().set_name(POINT_SCORE_SHEET)?;
    write_point_score_sheet(sheet, &analysis.point_scores, &formats.center)?;
    sheet.set_freeze_panes(1, 0)?;

    let sheet = workbook.add_worksheet().set_name(REPORT_SHEET)?;
    write_report_sheet(sheet, &analysis.report, &formats.center)?;

    let sheet = workbook.add_worksheet().set_name(DISTRIBUTION_SHEET)?;
    write_distribution_sheet(sheet, &analysis.distribution, &analysis.provenance, &formats)?;
    sheet.set_freeze_panes(1, 0)?;

    Ok(workbook)
}

fn write_header(sheet: &mut Worksheet, labels: &[&str], format: &Format) -> WriteResult<()> {
    for (col, label) in labels.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *label, format)?;
    }
    Ok(())
}

fn write_optional_number(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
    format: &Format,
) -> WriteResult<()> {
    match value {
        Some(v) => sheet.write_number_with_format(row, col, v, format)?,
        None => sheet.write_blank(row, col, format)?,
    };
    Ok(())
}

fn write_score_sheet(
    sheet: &mut Worksheet,
    table: &ScoreTable,
    format: &Format,
) -> WriteResult<()> {
    let mut header: Vec<&str> = table.identity_headers.labels().to_vec();
    header.extend(table.questions.iter().map(String::as_str));
    write_header(sheet, &header, format)?;

    for (idx, student) in table.rows.iter().enumerate() {
        let row = idx as u32 + 1;
        let identity = &student.identity;
        for (col, value) in [&identity.exam_number, &identity.name, &identity.class]
            .iter()
            .enumerate()
        {
            sheet.write_string_with_format(row, col as u16, value.as_str(), format)?;
        }
        for (offset, score) in student.scores.iter().enumerate() {
            write_optional_number(sheet, row, (offset + 3) as u16, *score, format)?;
        }
    }
    Ok(())
}

fn write_point_sheet(sheet: &mut Worksheet, map: &PointMap, format: &Format) -> WriteResult<()> {
    let mut header: Vec<&str> = vec![map.question_header.as_str()];
    header.extend(map.categories.iter().map(|c| c.name.as_str()));
    write_header(sheet, &header, format)?;

    for (idx, entry) in map.rows.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string_with_format(row, 0, &entry.question, format)?;
        for (offset, member) in entry.members.iter().enumerate() {
            let value = if *member { Some(1.0) } else { None };
            write_optional_number(sheet, row, (offset + 1) as u16, value, format)?;
        }
    }
    Ok(())
}

fn write_point_score_sheet(
    sheet: &mut Worksheet,
    table: &PointScoreTable,
    format: &Format,
) -> WriteResult<()> {
    let mut header: Vec<&str> = table.identity_headers.labels().to_vec();
    header.extend(table.categories.iter().map(|c| c.name.as_str()));
    write_header(sheet, &header, format)?;

    for (idx, student) in table.rows.iter().enumerate() {
        let row = idx as u32 + 1;
        let identity = &student.identity;
        for (col, value) in [&identity.exam_number, &identity.name, &identity.class]
            .iter()
            .enumerate()
        {
            sheet.write_string_with_format(row, col as u16, value.as_str(), format)?;
        }
        for (offset, value) in student.values.iter().enumerate() {
            sheet.write_number_with_format(row, (offset + 3) as u16, *value, format)?;
        }
    }
    Ok(())
}

fn write_report_sheet(
    sheet: &mut Worksheet,
    grid: &ReportGrid,
    format: &Format,
) -> WriteResult<()> {
    for (row, cells) in grid.rows.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            match cell {
                Some(text) => sheet.write_string_with_format(row as u32, col as u16, text, format)?,
                None => sheet.write_blank(row as u32, col as u16, format)?,
            };
        }
    }
    Ok(())
}

fn write_distribution_sheet(
    sheet: &mut Worksheet,
    distribution: &ClassDistribution,
    provenance: &ProvenanceIndex,
    formats: &Formats,
) -> WriteResult<()> {
    let mut header: Vec<&str> = vec![CATEGORY_HEADER, BUCKET_HEADER];
    header.extend(distribution.classes.iter().map(String::as_str));
    header.push(TOTAL_HEADER);
    write_header(sheet, &header, &formats.plain)?;

    let total_col = (distribution.classes.len() + 2) as u16;

    for (idx, entry) in distribution.rows.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, &entry.category)?;

        let score = match entry.bucket {
            Bucket::Score(score) => {
                sheet.write_number(row, 1, score)?;
                Some(score)
            }
            Bucket::Mean => {
                sheet.write_string(row, 1, MEAN_LABEL)?;
                None
            }
        };

        for (offset, (cell, class)) in entry.classes.iter().zip(&distribution.classes).enumerate() {
            let col = (offset + 2) as u16;
            write_distribution_cell(sheet, row, col, cell, formats)?;

            if let (Some(score), DistributionCell::Share(_)) = (score, cell) {
                let names = provenance.names(&entry.category, score, class);
                let note = Note::new(names.join(", ")).set_author(NOTE_AUTHOR);
                sheet.insert_note(row, col, &note)?;
            }
        }

        write_distribution_cell(sheet, row, total_col, &entry.overall, formats)?;
    }
    Ok(())
}

fn write_distribution_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &DistributionCell,
    formats: &Formats,
) -> WriteResult<()> {
    match cell {
        DistributionCell::Share(share) => {
            sheet.write_number_with_format(row, col, *share, &formats.percent)?;
        }
        DistributionCell::Mean(mean) => {
            sheet.write_number(row, col, *mean)?;
        }
        DistributionCell::Blank | DistributionCell::Undefined => {}
    }
    Ok(())
}

// =============================================================================
// Point template
// =============================================================================

/// Write a point map as a single-sheet workbook, the editable template.
pub fn write_point_template(map: &PointMap, path: &Path) -> WriteResult<()> {
    let format = Formats::new().center;
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet().set_name(POINT_SHEET)?;
    write_point_sheet(sheet, map, &format)?;
    sheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    Ok(())
}

// =============================================================================
// JSON
// =============================================================================

/// Pretty-print any serializable value to `path`.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> WriteResult<()> {
    let file = File::create(path)?;
    write_json_to(value, BufWriter::new(file))
}

/// Pretty-print to `writer` and flush it.
pub fn write_json_to<T: Serialize, W: Write>(value: &T, mut writer: W) -> WriteResult<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::{
        Category, CategoryKind, IdentityHeaders, PointMapRow, StudentIdentity, StudentScores,
    };
    use crate::transform::pipeline::analyze;
    use calamine::{open_workbook_auto, Data, Reader};

    fn analysis() -> Analysis {
        let scores = ScoreTable::new(
            IdentityHeaders::default(),
            vec!["1".into(), "2".into()],
            vec![
                StudentScores {
                    identity: StudentIdentity::new("1001", "甲", "A"),
                    scores: vec![Some(5.0), Some(3.0)],
                },
                StudentScores {
                    identity: StudentIdentity::new("1002", "乙", "A"),
                    scores: vec![Some(4.0), Some(4.0)],
                },
                StudentScores {
                    identity: StudentIdentity::new("1003", "丙", "B"),
                    scores: vec![Some(2.0), Some(1.0)],
                },
            ],
        );
        let map = PointMap::new(
            " ",
            vec![Category::new("全卷", CategoryKind::WholePaper)],
            vec![
                PointMapRow { question: "1".into(), members: vec![true] },
                PointMapRow { question: "2".into(), members: vec![true] },
            ],
        );
        analyze(scores, map, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_workbook_has_the_five_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_analysis_workbook(&analysis(), &path).unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec![SCORE_SHEET, POINT_SHEET, POINT_SCORE_SHEET, REPORT_SHEET, DISTRIBUTION_SHEET]
        );
    }

    #[test]
    fn test_distribution_sheet_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_analysis_workbook(&analysis(), &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(DISTRIBUTION_SHEET).unwrap();

        assert_eq!(range.get_value((0, 0)), Some(&Data::String("题号".into())));
        assert_eq!(range.get_value((0, 2)), Some(&Data::String("A".into())));
        assert_eq!(range.get_value((0, 4)), Some(&Data::String("合计".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(8.0)));
        assert_eq!(range.get_value((1, 2)), Some(&Data::Float(1.0)));
        assert_eq!(range.get_value((3, 1)), Some(&Data::String("均分".into())));
        assert_eq!(range.get_value((3, 4)), Some(&Data::Float(6.3)));
    }

    #[test]
    fn test_report_sheet_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_analysis_workbook(&analysis(), &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(REPORT_SHEET).unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("A".into())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("甲".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("8/6.3".into())));
    }

    #[test]
    fn test_point_template_round_trips_through_the_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.xlsx");
        let map = analysis().point_map;
        write_point_template(&map, &path).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(POINT_SHEET).unwrap();
        assert_eq!(range.get_value((0, 1)), Some(&Data::String("全卷".into())));
        assert_eq!(range.get_value((2, 1)), Some(&Data::Float(1.0)));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.json");
        write_json(&analysis(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["pointScores"]["rows"][0]["values"][0], 8.0);
        assert!(json["provenance"].is_array());
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_json_reports_buffered_write_failure() {
        // Small enough to stay buffered until the final flush
        let err = write_json_to(&vec![1, 2, 3], BufWriter::new(FullDisk)).unwrap_err();
        assert!(matches!(err, crate::error::WriteError::Io(_)));
    }
}
