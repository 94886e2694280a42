// src/export/report.rs
use chrono::{DateTime, Local};

use crate::domain::stats::{StatsSummary, Tally, URGENT_DAYS};

const TOP_ORGANIZATIONS: usize = 10;

/// Plain-text statistics report with a fixed section layout.
pub fn stats_report(stats: &StatsSummary, generated: DateTime<Local>) -> String {
    let mut lines: Vec<String> = vec![
        "TENDER MANAGEMENT STATISTICS".into(),
        format!("Generated: {}", generated.format("%Y-%m-%d %H:%M:%S")),
        format!("Mode: {}", stats.mode.label()),
        String::new(),
        "SUMMARY".into(),
        format!("Total Tenders: {}", stats.total_tenders),
        format!("Relevant Tenders: {}", stats.relevant_tenders),
        format!("Urgent Tenders (≤{URGENT_DAYS} days): {}", stats.urgent_tenders),
        format!("Average Days Left: {}", stats.avg_days_left),
        String::new(),
        "TOP ORGANIZATIONS".into(),
    ];

    let orgs = stats.organization_counts.ranked();
    lines.extend(orgs.iter().take(TOP_ORGANIZATIONS).map(|(k, n)| format!("{k}: {n}")));

    lines.push(String::new());
    lines.push("PROCUREMENT TYPES".into());
    push_tally(&mut lines, &stats.type_counts);

    lines.push(String::new());
    lines.push("SOURCES".into());
    push_tally(&mut lines, &stats.source_counts);

    lines.push(String::new());
    lines.push("PROVINCES".into());
    lines.extend(
        stats
            .province_counts
            .ranked()
            .iter()
            .map(|(k, n)| format!("{k}: {n}")),
    );

    lines.push(String::new());
    lines.push("TOP KEYWORDS".into());
    lines.extend(
        stats
            .keyword_counts
            .iter()
            .map(|kc| format!("{}: {}", kc.keyword, kc.count)),
    );

    lines.join("\n").trim().to_string()
}

fn push_tally(lines: &mut Vec<String>, tally: &Tally) {
    lines.extend(tally.entries().iter().map(|(k, n)| format!("{k}: {n}")));
}
