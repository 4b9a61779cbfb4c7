//! Knowledge-point score aggregation.
//!
//! Joins the point map with the score table by question name and sums, per
//! student, the scores of every question in each category.
//!
//! ```text
//! Point map                     Score table                Point scores
//! ┌────┬──────┬──────┐          ┌──────┬───┬───┬───┐       ┌──────┬──────┬──────┐
//! │    │ 全卷 │ 听力 │          │ 考号 │ 1 │ 2 │ 3 │       │ 考号 │ 全卷 │ 听力 │
//! │ 1  │  1   │  1   │    ⋈     │ 1001 │ 2 │ 1 │ - │   →   │ 1001 │  3   │  2   │
//! │ 2  │  1   │      │          │ 1002 │ 1 │ 2 │ 4 │       │ 1002 │  7   │  1   │
//! │ 3  │  1   │      │          └──────┴───┴───┴───┘       └──────┴──────┴──────┘
//! └────┴──────┴──────┘
//! ```
//!
//! A blank score contributes zero once aggregated. A question that is not in
//! a category contributes nothing.

use crate::error::{DataGapWarning, SchemaError, SchemaResult};
use crate::models::{Category, PointMap, PointScoreRow, PointScoreTable, ScoreTable};

/// Score columns resolved for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryColumns {
    pub category: Category,
    /// Indices into [`ScoreTable::questions`].
    pub columns: Vec<usize>,
    /// Questions selected by the map but absent from the score table.
    pub missing: Vec<String>,
}

/// Category to score-column index, built once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    pub categories: Vec<CategoryColumns>,
}

impl JoinPlan {
    /// Resolve every category's question set against the score table schema.
    ///
    /// Fails when the map selects questions and not a single one of them
    /// exists in the score table: the two inputs do not describe the same
    /// exam.
    pub fn resolve(map: &PointMap, scores: &ScoreTable) -> SchemaResult<Self> {
        let mut selected = 0usize;
        let mut resolved = 0usize;

        let categories: Vec<CategoryColumns> = map
            .categories
            .iter()
            .enumerate()
            .map(|(idx, category)| {
                let mut columns = Vec::new();
                let mut missing = Vec::new();
                for question in map.questions_in(idx) {
                    selected += 1;
                    match scores.question_index(question) {
                        Some(col) => {
                            resolved += 1;
                            columns.push(col);
                        }
                        None => missing.push(question.to_string()),
                    }
                }
                CategoryColumns {
                    category: category.clone(),
                    columns,
                    missing,
                }
            })
            .collect();

        if selected > 0 && resolved == 0 {
            return Err(SchemaError::PointMapMismatch { selected });
        }

        Ok(Self { categories })
    }

    /// Data gaps found while resolving.
    pub fn warnings(&self) -> Vec<DataGapWarning> {
        let mut warnings = Vec::new();
        for entry in &self.categories {
            for question in &entry.missing {
                warnings.push(DataGapWarning::MissingQuestion {
                    category: entry.category.name.clone(),
                    question: question.clone(),
                });
            }
            if entry.columns.is_empty() && !entry.missing.is_empty() {
                warnings.push(DataGapWarning::UnresolvedCategory {
                    category: entry.category.name.clone(),
                });
            }
        }
        warnings
    }

    /// Apply the plan: one total per category for every student.
    pub fn apply(&self, scores: &ScoreTable) -> PointScoreTable {
        let rows = scores
            .rows
            .iter()
            .map(|student| PointScoreRow {
                identity: student.identity.clone(),
                values: self
                    .categories
                    .iter()
                    .map(|entry| {
                        entry
                            .columns
                            .iter()
                            .map(|&col| {
                                student.scores.get(col).copied().flatten().unwrap_or(0.0)
                            })
                            .sum::<f64>()
                    })
                    .collect(),
            })
            .collect();

        PointScoreTable {
            identity_headers: scores.identity_headers.clone(),
            categories: self.categories.iter().map(|e| e.category.clone()).collect(),
            rows,
        }
    }
}

/// Result of the aggregation stage.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub table: PointScoreTable,
    pub warnings: Vec<DataGapWarning>,
}

/// Sum each student's scores within every category of the point map.
pub fn aggregate(map: &PointMap, scores: &ScoreTable) -> SchemaResult<Aggregation> {
    let plan = JoinPlan::resolve(map, scores)?;
    Ok(Aggregation {
        table: plan.apply(scores),
        warnings: plan.warnings(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryKind, IdentityHeaders, PointMapRow, StudentIdentity, StudentScores};

    fn student(exam: &str, class: &str, scores: &[Option<f64>]) -> StudentScores {
        StudentScores {
            identity: StudentIdentity::new(exam, format!("学生{}", exam), class),
            scores: scores.to_vec(),
        }
    }

    fn score_table() -> ScoreTable {
        ScoreTable::new(
            IdentityHeaders::default(),
            vec!["1".into(), "2".into(), "3".into(), "4".into()],
            vec![
                student("1001", "1班", &[Some(2.0), Some(1.0), None, Some(5.0)]),
                student("1002", "1班", &[Some(1.0), Some(2.0), Some(4.0), Some(0.5)]),
                student("1003", "2班", &[None, None, None, None]),
            ],
        )
    }

    fn row(question: &str, members: &[u8]) -> PointMapRow {
        PointMapRow {
            question: question.into(),
            members: members.iter().map(|m| *m == 1).collect(),
        }
    }

    /// 全卷 = 1..4, 1卷 = 1..2, 2卷 = 3..4, 听力 = 1,3, 作文 = none
    fn point_map() -> PointMap {
        PointMap::new(
            " ",
            vec![
                Category::new("全卷", CategoryKind::WholePaper),
                Category::new("1卷", CategoryKind::PaperOne),
                Category::new("2卷", CategoryKind::PaperTwo),
                Category::knowledge_point("听力"),
                Category::knowledge_point("作文"),
            ],
            vec![
                row("1", &[1, 1, 0, 1, 0]),
                row("2", &[1, 1, 0, 0, 0]),
                row("3", &[1, 0, 1, 1, 0]),
                row("4", &[1, 0, 1, 0, 0]),
            ],
        )
    }

    #[test]
    fn test_sums_exactly_the_indicated_questions() {
        let scores = score_table();
        let map = point_map();
        let result = aggregate(&map, &scores).unwrap();

        for (student, totals) in scores.rows.iter().zip(&result.table.rows) {
            for (idx, _) in map.categories.iter().enumerate() {
                let expected: f64 = map
                    .questions_in(idx)
                    .iter()
                    .filter_map(|q| scores.question_index(q))
                    .map(|col| student.scores[col].unwrap_or(0.0))
                    .sum();
                assert_eq!(totals.values[idx], expected);
            }
        }
        assert_eq!(result.table.rows[0].values, vec![8.0, 3.0, 5.0, 2.0, 0.0]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_paper_halves_add_up_to_whole_paper() {
        let map = point_map();
        let result = aggregate(&map, &score_table()).unwrap();
        let whole = map.position_of(CategoryKind::WholePaper).unwrap();
        let one = map.position_of(CategoryKind::PaperOne).unwrap();
        let two = map.position_of(CategoryKind::PaperTwo).unwrap();

        for row in &result.table.rows {
            assert_eq!(row.values[one] + row.values[two], row.values[whole]);
        }
    }

    #[test]
    fn test_missing_scores_count_as_zero() {
        let result = aggregate(&point_map(), &score_table()).unwrap();
        assert_eq!(result.table.rows[2].values, vec![0.0; 5]);
    }

    #[test]
    fn test_identity_and_order_are_preserved() {
        let scores = score_table();
        let result = aggregate(&point_map(), &scores).unwrap();
        let identities: Vec<_> = result.table.rows.iter().map(|r| &r.identity).collect();
        let expected: Vec<_> = scores.rows.iter().map(|r| &r.identity).collect();
        assert_eq!(identities, expected);
        assert_eq!(result.table.categories.len(), 5);
    }

    #[test]
    fn test_unknown_question_is_ignored_with_warning() {
        let mut map = point_map();
        map.rows.push(row("99", &[0, 0, 0, 1, 1]));
        let result = aggregate(&map, &score_table()).unwrap();

        assert_eq!(result.table.rows[0].values[3], 2.0);
        assert_eq!(result.table.rows[0].values[4], 0.0);
        assert_eq!(
            result.warnings,
            vec![
                DataGapWarning::MissingQuestion { category: "听力".into(), question: "99".into() },
                DataGapWarning::MissingQuestion { category: "作文".into(), question: "99".into() },
                DataGapWarning::UnresolvedCategory { category: "作文".into() },
            ]
        );
    }

    #[test]
    fn test_map_for_another_exam_fails() {
        let map = PointMap::new(
            " ",
            vec![Category::knowledge_point("听力")],
            vec![row("A1", &[1]), row("A2", &[1])],
        );
        let err = aggregate(&map, &score_table()).unwrap_err();
        assert!(matches!(err, SchemaError::PointMapMismatch { selected: 2 }));
    }

    #[test]
    fn test_empty_selection_is_all_zero() {
        let map = PointMap::new(" ", vec![Category::knowledge_point("翻译")], vec![row("1", &[0])]);
        let result = aggregate(&map, &score_table()).unwrap();
        assert!(result.table.rows.iter().all(|r| r.values == vec![0.0]));
        assert!(result.warnings.is_empty());
    }
}
