//! Class score distribution.
//!
//! For every category and every distinct score, the share of each class (and
//! of the whole cohort) that reached exactly that score, followed by a mean
//! row. The names behind every cell are kept in a [`ProvenanceIndex`].

use std::collections::{BTreeMap, HashMap};

use serde::{Serialize, Serializer};

use crate::error::DataGapWarning;
use crate::models::{mean, round_to_tenth, PointScoreTable};

// =============================================================================
// Cells and rows
// =============================================================================

/// One cell of the distribution table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DistributionCell {
    /// Fraction of the class at this score, in `(0, 1]`.
    Share(f64),
    /// Mean of the class, rounded to one decimal.
    Mean(f64),
    /// Nobody in the class reached this score.
    Blank,
    /// The class has no members.
    Undefined,
}

impl DistributionCell {
    pub fn value(&self) -> Option<f64> {
        match self {
            DistributionCell::Share(v) | DistributionCell::Mean(v) => Some(*v),
            DistributionCell::Blank | DistributionCell::Undefined => None,
        }
    }
}

/// What a distribution row counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Bucket {
    Score(f64),
    Mean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDistributionRow {
    pub category: String,
    pub bucket: Bucket,
    /// Aligned with [`ClassDistribution::classes`].
    pub classes: Vec<DistributionCell>,
    pub overall: DistributionCell,
}

/// Distribution rows for every category, in point map order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDistribution {
    pub classes: Vec<String>,
    pub class_sizes: Vec<usize>,
    pub rows: Vec<ClassDistributionRow>,
}

impl ClassDistribution {
    /// Rows of one category, score rows first and the mean row last.
    pub fn rows_for<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a ClassDistributionRow> + 'a {
        self.rows.iter().filter(move |row| row.category == category)
    }

    pub fn total_students(&self) -> usize {
        self.class_sizes.iter().sum()
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Bit pattern of a score, usable as an ordered map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScoreKey(u64);

impl ScoreKey {
    pub fn new(score: f64) -> Self {
        // -0.0 and 0.0 are the same score
        let score = if score == 0.0 { 0.0 } else { score };
        Self(score.to_bits())
    }

    pub fn score(&self) -> f64 {
        f64::from_bits(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProvenanceKey {
    pub category: String,
    pub score: ScoreKey,
    pub class: String,
}

/// Student names behind every `(category, score, class)` cell, in table order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvenanceIndex {
    entries: BTreeMap<ProvenanceKey, Vec<String>>,
}

#[derive(Serialize)]
struct ProvenanceEntry<'a> {
    category: &'a str,
    score: f64,
    class: &'a str,
    names: &'a [String],
}

impl ProvenanceIndex {
    fn push(&mut self, category: &str, score: f64, class: &str, name: &str) {
        let key = ProvenanceKey {
            category: category.to_string(),
            score: ScoreKey::new(score),
            class: class.to_string(),
        };
        self.entries.entry(key).or_default().push(name.to_string());
    }

    /// Names of the students of `class` with `score` in `category`.
    pub fn names(&self, category: &str, score: f64, class: &str) -> &[String] {
        let key = ProvenanceKey {
            category: category.to_string(),
            score: ScoreKey::new(score),
            class: class.to_string(),
        };
        self.entries.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ProvenanceIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter().map(|(key, names)| ProvenanceEntry {
            category: &key.category,
            score: key.score.score(),
            class: &key.class,
            names,
        }))
    }
}

// =============================================================================
// Computation
// =============================================================================

/// Output of the statistics stage.
#[derive(Debug, Clone)]
pub struct ClassStatistics {
    pub distribution: ClassDistribution,
    pub provenance: ProvenanceIndex,
    pub warnings: Vec<DataGapWarning>,
}

/// Classes listed in `class_order` first, then the rest by first appearance.
pub fn resolve_class_order(table: &PointScoreTable, class_order: &[String]) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for class in class_order.iter().cloned().chain(table.classes()) {
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    classes
}

/// Per category, the share of each class at every distinct score plus a
/// mean row.
pub fn compute_distribution(table: &PointScoreTable, class_order: &[String]) -> ClassStatistics {
    let classes = resolve_class_order(table, class_order);
    let class_index: HashMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(idx, class)| (class.as_str(), idx))
        .collect();

    let mut class_sizes = vec![0usize; classes.len()];
    let mut members: Vec<usize> = Vec::with_capacity(table.len());
    for row in &table.rows {
        let idx = class_index[row.identity.class.as_str()];
        class_sizes[idx] += 1;
        members.push(idx);
    }

    let warnings = classes
        .iter()
        .zip(&class_sizes)
        .filter(|(_, size)| **size == 0)
        .map(|(class, _)| DataGapWarning::EmptyClass { class: class.clone() })
        .collect();

    let total = table.len();
    let mut rows = Vec::new();
    let mut provenance = ProvenanceIndex::default();

    for (cat_idx, category) in table.categories.iter().enumerate() {
        let column: Vec<f64> = table.column(cat_idx).collect();

        for (row, value) in table.rows.iter().zip(&column) {
            provenance.push(&category.name, *value, &row.identity.class, &row.identity.name);
        }

        let mut scores = column.clone();
        scores.sort_by(|a, b| b.total_cmp(a));
        scores.dedup_by(|a, b| ScoreKey::new(*a) == ScoreKey::new(*b));

        for score in scores {
            let mut counts = vec![0usize; classes.len()];
            for (value, class) in column.iter().zip(&members) {
                if ScoreKey::new(*value) == ScoreKey::new(score) {
                    counts[*class] += 1;
                }
            }
            let hits: usize = counts.iter().sum();

            let cells = counts
                .iter()
                .zip(&class_sizes)
                .map(|(count, size)| match (*count, *size) {
                    (_, 0) => DistributionCell::Undefined,
                    (0, _) => DistributionCell::Blank,
                    (count, size) => DistributionCell::Share(count as f64 / size as f64),
                })
                .collect();

            rows.push(ClassDistributionRow {
                category: category.name.clone(),
                bucket: Bucket::Score(score),
                classes: cells,
                overall: DistributionCell::Share(hits as f64 / total as f64),
            });
        }

        let class_means = (0..classes.len())
            .map(|class| {
                let values = column
                    .iter()
                    .zip(&members)
                    .filter(|(_, member)| **member == class)
                    .map(|(value, _)| *value);
                mean(values).map_or(DistributionCell::Undefined, |m| {
                    DistributionCell::Mean(round_to_tenth(m))
                })
            })
            .collect();
        let overall = mean(column.iter().copied())
            .map_or(DistributionCell::Undefined, |m| DistributionCell::Mean(round_to_tenth(m)));

        rows.push(ClassDistributionRow {
            category: category.name.clone(),
            bucket: Bucket::Mean,
            classes: class_means,
            overall,
        });
    }

    ClassStatistics {
        distribution: ClassDistribution {
            classes,
            class_sizes,
            rows,
        },
        provenance,
        warnings,
    }
}
