// Aggregation Logic
// Aggregates decision records into overall and per-group accuracy

use crate::models::{
    AccuracyStats, DecisionLabel, DecisionRecord, EvaluationReport, Grouping, Verdict,
};
use crate::services::filename_patterns::extract_category;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Bucket for file names that match neither dataset pattern.
pub const UNMATCHED_GROUP: &str = "unmatched";

/// Trim, lower-case and match exactly. Anything else (free-text explanations,
/// `ERROR:` markers) is `Unrecognized`.
pub fn normalize_label(raw: &str) -> DecisionLabel {
    match raw.trim().to_lowercase().as_str() {
        "authentic" => DecisionLabel::Authentic,
        "spliced" => DecisionLabel::Spliced,
        _ => DecisionLabel::Unrecognized,
    }
}

/// Accuracy of a pool against the label every row in it should carry.
pub fn compute_accuracy<'a, I>(records: I, expected: Verdict) -> AccuracyStats
where
    I: IntoIterator<Item = &'a DecisionRecord>,
{
    let mut stats = AccuracyStats::default();
    for record in records {
        stats.total += 1;
        match normalize_label(&record.decision).verdict() {
            Some(v) if v == expected => stats.match_count += 1,
            Some(_) => stats.mismatch_count += 1,
            None => stats.unrecognized_count += 1,
        }
    }

    let labeled = stats.match_count + stats.mismatch_count;
    stats.accuracy_ratio = if labeled > 0 {
        stats.match_count as f64 / labeled as f64
    } else {
        0.0
    };
    stats
}

/// Group names a record belongs to. Unparseable names go to `UNMATCHED_GROUP`.
fn groups_for(filename: &str, grouping: &Grouping) -> Vec<String> {
    let parsed = match extract_category(filename) {
        Some(parsed) => parsed,
        None => return vec![UNMATCHED_GROUP.to_string()],
    };

    match grouping {
        Grouping::Category => vec![parsed.group_key()],
        Grouping::Membership(categories) => {
            // overlapping membership is kept: src and dst groups both count the record
            let groups: Vec<String> = categories
                .iter()
                .filter(|c| parsed.involves(c))
                .map(|c| c.to_string())
                .collect();
            if groups.is_empty() {
                vec![UNMATCHED_GROUP.to_string()]
            } else {
                groups
            }
        }
    }
}

/// Per-group accuracy. Groups with no records are absent from the map.
pub fn compute_by_category(
    records: &[DecisionRecord],
    expected: Verdict,
    grouping: &Grouping,
) -> BTreeMap<String, AccuracyStats> {
    let mut partitions: BTreeMap<String, Vec<&DecisionRecord>> = BTreeMap::new();
    for record in records {
        for group in groups_for(&record.filename, grouping) {
            partitions.entry(group).or_default().push(record);
        }
    }

    partitions
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(group, rows)| (group, compute_accuracy(rows, expected)))
        .collect()
}

pub fn build_report(
    records: &[DecisionRecord],
    expected: Verdict,
    grouping: &Grouping,
) -> EvaluationReport {
    let unmatched_filenames = records
        .iter()
        .filter(|r| extract_category(&r.filename).is_none())
        .count();

    EvaluationReport {
        expected,
        grouping: grouping.as_str().to_string(),
        overall: compute_accuracy(records, expected),
        by_group: compute_by_category(records, expected, grouping),
        unmatched_filenames,
    }
}

fn percent(ratio: f64) -> f64 {
    (ratio * 10000.0).round() / 100.0
}

/// Plain-text table of a report.
pub fn render_report(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let o = &report.overall;

    let _ = writeln!(
        out,
        "Expected = {}, Total = {}, Match = {}, Mismatch = {}, Unrecognized = {}, Accuracy = {:.2}%",
        report.expected,
        o.total,
        o.match_count,
        o.mismatch_count,
        o.unrecognized_count,
        percent(o.accuracy_ratio)
    );
    if report.unmatched_filenames > 0 {
        let _ = writeln!(out, "Unmatched file names = {}", report.unmatched_filenames);
    }
    let _ = writeln!(out);

    let width = report
        .by_group
        .keys()
        .map(|k| k.len())
        .max()
        .unwrap_or(0)
        .max("group".len());

    let _ = writeln!(
        out,
        "{:<width$}  {:>6}  {:>6}  {:>9}  {:>13}  {:>9}",
        "group", "total", "match", "mismatch", "unrecognized", "accuracy",
        width = width
    );
    for (group, s) in &report.by_group {
        let _ = writeln!(
            out,
            "{:<width$}  {:>6}  {:>6}  {:>9}  {:>13}  {:>8.2}%",
            group,
            s.total,
            s.match_count,
            s.mismatch_count,
            s.unrecognized_count,
            percent(s.accuracy_ratio),
            width = width
        );
    }
    out
}
