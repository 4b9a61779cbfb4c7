//! Printable per-student score sheet.
//!
//! Each student gets a fixed block of `group_size` rows of `row_width` cells.
//! The first column labels the block (class, then name); the remaining cells
//! hold category names and `score/mean` pairs, wrapped onto the next pair of
//! rows when they do not fit:
//!
//! ```text
//! ┌──────┬──────┬──────┬─────┬──────┐
//! │ 1班  │ 全卷 │ 1卷  │ ... │ 听力 │   names 1..w-1
//! │ 张三 │ 98/87.5 │ 60/55.1 │ ... │ 18/16.2 │   scores 1..w-1
//! │      │ 阅读 │ 作文 │     │      │   names w..
//! │      │ 30/28.4 │ 20/17.9 │     │      │   scores w..
//! └──────┴──────┴──────┴─────┴──────┘
//! ```
//!
//! Blocks are always `group_size` rows tall, even when the wrap rows are
//! blank, so the sheet keeps a fixed stride for printing.

use serde::Serialize;

use crate::config::LayoutOptions;
use crate::error::{ReportError, ReportResult};
use crate::models::{format_score, round_to_tenth, PointScoreTable};

/// One grid row; `None` is a blank cell.
pub type GridRow = Vec<Option<String>>;

/// The laid-out report: `stride` rows per student, `width` cells per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportGrid {
    pub width: usize,
    pub stride: usize,
    pub rows: Vec<GridRow>,
}

impl ReportGrid {
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|c| c.as_deref())
    }

    /// Number of student blocks.
    pub fn students(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.rows.len() / self.stride
        }
    }
}

/// Content of one block before layout.
#[derive(Debug, Clone, Copy)]
pub struct BlockContent<'a> {
    /// First cell of the name row.
    pub header: &'a str,
    /// First cell of the value row.
    pub label: &'a str,
    pub names: &'a [String],
    pub values: &'a [String],
}

/// Check that the layout describes at least one name/value row pair.
pub fn validate_layout(options: &LayoutOptions) -> ReportResult<()> {
    if options.group_size < 2 || options.group_size % 2 != 0 {
        return Err(ReportError::InvalidLayout(format!(
            "group size must be an even number of at least 2, got {}",
            options.group_size
        )));
    }
    if options.row_width < 2 {
        return Err(ReportError::InvalidLayout(format!(
            "row width must be at least 2, got {}",
            options.row_width
        )));
    }
    Ok(())
}

/// Name/value cells available in one block.
pub fn block_capacity(options: &LayoutOptions) -> usize {
    (options.group_size / 2) * options.row_width.saturating_sub(1)
}

/// Lay out one block: names and values are wrapped every `row_width - 1`
/// cells onto the next row pair, starting at column 1.
pub fn paginate(block: BlockContent<'_>, options: &LayoutOptions) -> ReportResult<Vec<GridRow>> {
    validate_layout(options)?;

    if block.names.len() != block.values.len() {
        return Err(ReportError::InvalidLayout(format!(
            "{} names for {} values",
            block.names.len(),
            block.values.len()
        )));
    }

    let capacity = block_capacity(options);
    if block.names.len() > capacity {
        return Err(ReportError::Overflow {
            points: block.names.len(),
            capacity,
        });
    }

    let per_row = options.row_width - 1;
    let mut rows: Vec<GridRow> = vec![vec![None; options.row_width]; options.group_size];
    rows[0][0] = Some(block.header.to_string());
    rows[1][0] = Some(block.label.to_string());

    let chunks = block.names.chunks(per_row).zip(block.values.chunks(per_row));
    for (pair, (names, values)) in chunks.enumerate() {
        let top = pair * 2;
        for (offset, name) in names.iter().enumerate() {
            rows[top][offset + 1] = Some(name.clone());
        }
        for (offset, value) in values.iter().enumerate() {
            rows[top + 1][offset + 1] = Some(value.clone());
        }
    }

    Ok(rows)
}

/// Build the printable sheet from the point score table.
///
/// Means are taken once per category over all students.
pub fn format_student_report(
    table: &PointScoreTable,
    options: &LayoutOptions,
) -> ReportResult<ReportGrid> {
    validate_layout(options)?;

    let capacity = block_capacity(options);
    if table.categories.len() > capacity {
        return Err(ReportError::Overflow {
            points: table.categories.len(),
            capacity,
        });
    }

    let names: Vec<String> = table.categories.iter().map(|c| c.name.clone()).collect();
    let means: Vec<f64> = (0..names.len())
        .map(|idx| round_to_tenth(table.mean(idx).unwrap_or(0.0)))
        .collect();

    let mut rows = Vec::with_capacity(table.len() * options.group_size);
    for student in &table.rows {
        let values: Vec<String> = student
            .values
            .iter()
            .zip(&means)
            .map(|(value, mean)| format!("{}/{:.1}", format_score(*value), mean))
            .collect();

        let block = BlockContent {
            header: &student.identity.class,
            label: &student.identity.name,
            names: &names,
            values: &values,
        };
        rows.extend(paginate(block, options)?);
    }

    Ok(ReportGrid {
        width: options.row_width,
        stride: options.group_size,
        rows,
    })
}
