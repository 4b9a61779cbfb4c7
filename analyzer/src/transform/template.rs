//! Initial point map generated from a score table.
//!
//! Every question of the score table becomes a row. The first three rows are
//! marked on the whole-paper / paper-one / paper-two diagonal and the
//! listening block is pre-marked; the rest is filled in by hand.

use crate::config::AnalysisConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::models::{Category, CategoryKind, PointMap, PointMapRow, ScoreTable};

/// Build the starting point map for `table`.
pub fn build_point_template(table: &ScoreTable, config: &AnalysisConfig) -> SchemaResult<PointMap> {
    if table.questions.is_empty() {
        return Err(SchemaError::NoQuestions);
    }

    let template = &config.template;
    let reserved = &config.reserved;

    let mut categories = vec![
        Category::new(reserved.whole_paper.clone(), CategoryKind::WholePaper),
        Category::new(reserved.paper_one.clone(), CategoryKind::PaperOne),
        Category::new(reserved.paper_two.clone(), CategoryKind::PaperTwo),
    ];
    categories.extend(template.categories.iter().cloned().map(Category::knowledge_point));

    let listening = categories
        .iter()
        .position(|c| c.name == template.listening_category);
    let last_listening_row = template.listening_last_row.min(table.questions.len() - 1);

    let rows = table
        .questions
        .iter()
        .enumerate()
        .map(|(row, question)| {
            let mut members = vec![false; categories.len()];
            // Row 0 -> 全卷, row 1 -> 1卷, row 2 -> 2卷
            if row < 3 {
                members[row] = true;
            }
            if let Some(col) = listening {
                if (template.listening_first_row..=last_listening_row).contains(&row) {
                    members[col] = true;
                }
            }
            PointMapRow {
                question: question.clone(),
                members,
            }
        })
        .collect();

    Ok(PointMap::new(template.question_header.clone(), categories, rows))
}
