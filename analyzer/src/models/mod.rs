//! Domain models for the score analysis pipeline.
//!
//! This module contains the tables passed between the pipeline stages:
//!
//! - [`ScoreTable`] - normalized per-question scores, one row per student
//! - [`PointMap`] - question to knowledge-point membership
//! - [`PointScoreTable`] - per-student totals by knowledge point
//!
//! Every table is built once and never mutated afterwards; each stage reads
//! its inputs by reference and returns a new table.

use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Header labels of the three identity columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityHeaders {
    pub exam_number: String,
    pub name: String,
    pub class: String,
}

impl IdentityHeaders {
    /// Labels in output order: exam number, name, class.
    pub fn labels(&self) -> [&str; 3] {
        [&self.exam_number, &self.name, &self.class]
    }
}

impl Default for IdentityHeaders {
    fn default() -> Self {
        Self {
            exam_number: "考号".to_string(),
            name: "姓名".to_string(),
            class: "行政班级".to_string(),
        }
    }
}

/// Identity values of one student, carried verbatim through every table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub exam_number: String,
    pub name: String,
    pub class: String,
}

impl StudentIdentity {
    pub fn new(
        exam_number: impl Into<String>,
        name: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            exam_number: exam_number.into(),
            name: name.into(),
            class: class.into(),
        }
    }
}

// =============================================================================
// Score Table
// =============================================================================

/// One student's raw scores, aligned with [`ScoreTable::questions`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentScores {
    pub identity: StudentIdentity,
    /// `None` when the cell was blank.
    pub scores: Vec<Option<f64>>,
}

/// Normalized score table, sorted by exam number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreTable {
    pub identity_headers: IdentityHeaders,
    pub questions: Vec<String>,
    pub rows: Vec<StudentScores>,
}

impl ScoreTable {
    pub fn new(
        identity_headers: IdentityHeaders,
        questions: Vec<String>,
        rows: Vec<StudentScores>,
    ) -> Self {
        Self {
            identity_headers,
            questions,
            rows,
        }
    }

    /// Column index of a question by name.
    pub fn question_index(&self, question: &str) -> Option<usize> {
        self.questions.iter().position(|q| q == question)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Point Map
// =============================================================================

/// What a point map category denotes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CategoryKind {
    /// The whole exam.
    WholePaper,
    /// First half of the exam.
    PaperOne,
    /// Second half of the exam.
    PaperTwo,
    /// A knowledge point (listening, cloze, writing, ...).
    KnowledgePoint,
}

impl CategoryKind {
    pub fn is_reserved(&self) -> bool {
        !matches!(self, CategoryKind::KnowledgePoint)
    }
}

/// A named category column of the point map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub name: String,
    pub kind: CategoryKind,
}

impl Category {
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn knowledge_point(name: impl Into<String>) -> Self {
        Self::new(name, CategoryKind::KnowledgePoint)
    }
}

/// Membership of one question in every category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointMapRow {
    pub question: String,
    /// Aligned with [`PointMap::categories`].
    pub members: Vec<bool>,
}

/// Question to knowledge-point mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointMap {
    pub question_header: String,
    pub categories: Vec<Category>,
    pub rows: Vec<PointMapRow>,
}

impl PointMap {
    pub fn new(
        question_header: impl Into<String>,
        categories: Vec<Category>,
        rows: Vec<PointMapRow>,
    ) -> Self {
        Self {
            question_header: question_header.into(),
            categories,
            rows,
        }
    }

    /// Questions whose indicator is set for the category at `category`.
    pub fn questions_in(&self, category: usize) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|row| row.members.get(category).copied().unwrap_or(false))
            .map(|row| row.question.as_str())
            .collect()
    }

    /// Position of the first category of the given kind.
    pub fn position_of(&self, kind: CategoryKind) -> Option<usize> {
        self.categories.iter().position(|c| c.kind == kind)
    }
}

// =============================================================================
// Point Score Table
// =============================================================================

/// One student's totals, aligned with [`PointScoreTable::categories`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointScoreRow {
    pub identity: StudentIdentity,
    pub values: Vec<f64>,
}

/// Per-student totals by category, in score table order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointScoreTable {
    pub identity_headers: IdentityHeaders,
    pub categories: Vec<Category>,
    pub rows: Vec<PointScoreRow>,
}

impl PointScoreTable {
    /// Values of one category column, in row order.
    pub fn column(&self, category: usize) -> impl Iterator<Item = f64> + '_ {
        self.rows
            .iter()
            .filter_map(move |row| row.values.get(category).copied())
    }

    /// Mean over all students, `None` for an empty table.
    pub fn mean(&self, category: usize) -> Option<f64> {
        mean(self.column(category))
    }

    /// Distinct classes in order of first appearance.
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = Vec::new();
        for row in &self.rows {
            if !classes.contains(&row.identity.class) {
                classes.push(row.identity.class.clone());
            }
        }
        classes
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Numeric helpers
// =============================================================================

/// Arithmetic mean, `None` when there are no values.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Round to one decimal place, ties to even.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Format a score for display: integers without decimals.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
