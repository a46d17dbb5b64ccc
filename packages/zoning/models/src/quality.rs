//! Contained per-record errors collected into a quality report.
//!
//! Geometry failures, unparseable table cells, join misses and
//! constraint conflicts never abort a run. Each one is recorded here and
//! written out as the command's quality report.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Pipeline stage that raised an issue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Loading plots, layers and tables.
    Ingest,
    /// Geometry overlay resolution.
    Overlay,
    /// Regulation table normalization.
    Normalize,
    /// Regulation linking.
    Link,
    /// GFA computation.
    Engine,
}

/// Category of a contained error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
    /// Invalid or unrepairable polygon.
    Geometry,
    /// Unparseable or out-of-range table value.
    DataQuality,
    /// A zone or use type without a matching regulation.
    JoinMiss,
    /// Constraint candidates that disagree beyond tolerance.
    Conflict,
}

/// One row of the quality report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    /// Affected entity (plot id, zone id, table row reference).
    pub entity: String,
    /// Stage that raised the issue.
    pub stage: Stage,
    /// Issue category.
    pub kind: IssueKind,
    /// Human-readable detail.
    pub message: String,
}

/// Ordered collection of [`QualityIssue`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    issues: Vec<QualityIssue>,
}

impl QualityReport {
    /// Creates an empty report.
    #[must_use]
    pub const fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Records an issue and mirrors it to the log as a warning.
    pub fn record(
        &mut self,
        entity: impl Into<String>,
        stage: Stage,
        kind: IssueKind,
        message: impl Into<String>,
    ) {
        let issue = QualityIssue {
            entity: entity.into(),
            stage,
            kind,
            message: message.into(),
        };
        log::warn!(
            "[{}/{}] {}: {}",
            issue.stage,
            issue.kind,
            issue.entity,
            issue.message
        );
        self.issues.push(issue);
    }

    /// Appends every issue of `other`.
    pub fn merge(&mut self, other: Self) {
        self.issues.extend(other.issues);
    }

    /// Issues in insertion order.
    #[must_use]
    pub fn issues(&self) -> &[QualityIssue] {
        &self.issues
    }

    /// Number of issues of a given kind.
    #[must_use]
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Total number of issues.
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether no issue was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}
