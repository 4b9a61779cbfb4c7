//! Schema checks on the normalized tables.
//!
//! These run once, after normalization and before any aggregation, so a bad
//! input aborts the run before a single sum is computed.

use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{PointMap, ScoreTable};

/// Exam numbers must be unique and present; at least one question column.
pub fn validate_score_table(table: &ScoreTable) -> SchemaResult<()> {
    if table.questions.is_empty() {
        return Err(SchemaError::NoQuestions);
    }

    let mut seen = HashSet::new();
    for row in &table.rows {
        let exam_number = row.identity.exam_number.as_str();
        if exam_number.is_empty() {
            return Err(SchemaError::BlankExamNumber(row.identity.name.clone()));
        }
        if !seen.insert(exam_number) {
            return Err(SchemaError::DuplicateExamNumber(exam_number.to_string()));
        }
    }

    Ok(())
}

/// Category names and question identifiers must be unique.
pub fn validate_point_map(map: &PointMap) -> SchemaResult<()> {
    if map.categories.is_empty() {
        return Err(SchemaError::EmptyPointMap);
    }

    let mut categories = HashSet::new();
    for category in &map.categories {
        if !categories.insert(category.name.as_str()) {
            return Err(SchemaError::DuplicateColumn {
                table: "point".to_string(),
                column: category.name.clone(),
            });
        }
    }

    let mut questions = HashSet::new();
    for row in &map.rows {
        if !questions.insert(row.question.as_str()) {
            return Err(SchemaError::DuplicateQuestion(row.question.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, IdentityHeaders, PointMapRow, StudentIdentity, StudentScores};

    fn table(exam_numbers: &[&str]) -> ScoreTable {
        ScoreTable::new(
            IdentityHeaders::default(),
            vec!["1".into()],
            exam_numbers
                .iter()
                .map(|n| StudentScores {
                    identity: StudentIdentity::new(*n, "张三", "1班"),
                    scores: vec![Some(1.0)],
                })
                .collect(),
        )
    }

    #[test]
    fn test_valid_score_table() {
        assert!(validate_score_table(&table(&["1001", "1002"])).is_ok());
    }

    #[test]
    fn test_duplicate_exam_number() {
        let err = validate_score_table(&table(&["1001", "1001"])).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateExamNumber(n) if n == "1001"));
    }

    #[test]
    fn test_blank_exam_number() {
        let err = validate_score_table(&table(&["1001", ""])).unwrap_err();
        assert!(matches!(err, SchemaError::BlankExamNumber(name) if name == "张三"));
    }

    #[test]
    fn test_no_questions() {
        let mut t = table(&["1001"]);
        t.questions.clear();
        assert!(matches!(validate_score_table(&t), Err(SchemaError::NoQuestions)));
    }

    #[test]
    fn test_duplicate_question_in_point_map() {
        let map = PointMap::new(
            " ",
            vec![Category::knowledge_point("听力")],
            vec![
                PointMapRow { question: "1".into(), members: vec![true] },
                PointMapRow { question: "1".into(), members: vec![false] },
            ],
        );
        assert!(matches!(
            validate_point_map(&map),
            Err(SchemaError::DuplicateQuestion(q)) if q == "1"
        ));
    }

    #[test]
    fn test_duplicate_category_in_point_map() {
        let map = PointMap::new(
            " ",
            vec![Category::knowledge_point("听力"), Category::knowledge_point("听力")],
            vec![],
        );
        assert!(matches!(
            validate_point_map(&map),
            Err(SchemaError::DuplicateColumn { .. })
        ));
    }
}
