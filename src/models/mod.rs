// splice-eval Data Models
// Shared types for sampling, decision records and accuracy reports

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============ Categories ============

/// Dataset category token such as `ani`, `arc` or `cha`. Always lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(token: &str) -> Self {
        Self(token.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Category::new(value)
    }
}

/// Ordered (source, destination) category pair of a tampered image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryPair {
    pub source: Category,
    pub destination: Category,
}

impl CategoryPair {
    pub fn new(source: Category, destination: Category) -> Self {
        Self { source, destination }
    }

    pub fn contains(&self, category: &Category) -> bool {
        &self.source == category || &self.destination == category
    }

    /// Every ordered pair over `categories`, source-major.
    pub fn grid(categories: &[Category]) -> Vec<CategoryPair> {
        categories
            .iter()
            .flat_map(|src| {
                categories
                    .iter()
                    .map(move |dst| CategoryPair::new(src.clone(), dst.clone()))
            })
            .collect()
    }
}

impl fmt::Display for CategoryPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.destination)
    }
}

/// Category information recovered from a dataset file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameRecord {
    Authentic(Category),
    Tampered(CategoryPair),
}

impl FilenameRecord {
    /// Grouping key for per-category statistics.
    pub fn group_key(&self) -> String {
        match self {
            FilenameRecord::Authentic(category) => category.to_string(),
            FilenameRecord::Tampered(pair) => pair.to_string(),
        }
    }

    pub fn involves(&self, category: &Category) -> bool {
        match self {
            FilenameRecord::Authentic(c) => c == category,
            FilenameRecord::Tampered(pair) => pair.contains(category),
        }
    }
}

// ============ Decisions ============

/// The class a pool of images is expected to be labeled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Authentic,
    Spliced,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Authentic => "authentic",
            Verdict::Spliced => "spliced",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized model decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionLabel {
    Authentic,
    Spliced,
    Unrecognized,
}

impl DecisionLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionLabel::Authentic => "authentic",
            DecisionLabel::Spliced => "spliced",
            DecisionLabel::Unrecognized => "unrecognized",
        }
    }

    pub fn verdict(self) -> Option<Verdict> {
        match self {
            DecisionLabel::Authentic => Some(Verdict::Authentic),
            DecisionLabel::Spliced => Some(Verdict::Spliced),
            DecisionLabel::Unrecognized => None,
        }
    }
}

/// One row of the decision table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub filename: String,
    #[serde(rename = "LLM-decision")]
    pub decision: String,
}

impl DecisionRecord {
    pub fn new(filename: impl Into<String>, decision: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            decision: decision.into(),
        }
    }
}

// ============ Accuracy ============

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyStats {
    pub total: usize,
    pub match_count: usize,
    pub mismatch_count: usize,
    pub unrecognized_count: usize,
    /// `match / (match + mismatch)`, 0.0 when nothing was labeled.
    pub accuracy_ratio: f64,
}

/// How per-group statistics are partitioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    /// One group per parsed key (`ani`, or `ani-arc` for tampered names).
    Category,
    /// One group per listed category; a tampered record joins both its
    /// source and destination groups.
    Membership(Vec<Category>),
}

impl Grouping {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grouping::Category => "category",
            Grouping::Membership(_) => "membership",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub expected: Verdict,
    pub grouping: String,
    pub overall: AccuracyStats,
    pub by_group: BTreeMap<String, AccuracyStats>,
    pub unmatched_filenames: usize,
}

// ============ Classification Runs ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
    pub output: String,
}
