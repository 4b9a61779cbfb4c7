//! Analysis stages.
//!
//! - Aggregate: per-student totals by knowledge point
//! - Layout: printable per-student score sheet
//! - Distribution: class shares per score, with provenance
//! - Template: initial point map from a score table
//! - Pipeline: the stages wired together

pub mod aggregate;
pub mod distribution;
pub mod layout;
pub mod pipeline;
pub mod template;

pub use aggregate::{aggregate, Aggregation, JoinPlan};
pub use distribution::{
    compute_distribution, ClassDistribution, ClassStatistics, DistributionCell, ProvenanceIndex,
};
pub use layout::{format_student_report, paginate, ReportGrid};
pub use pipeline::*;
pub use template::build_point_template;
