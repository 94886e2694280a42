// src/domain/stats.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::keywords::{top_keywords, KeywordCount};
use crate::domain::tender::{Source, Tender};

pub const URGENT_DAYS: i64 = 5;
pub const TOP_KEYWORD_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    All,
    #[serde(alias = "relevant")]
    RelevantOnly,
}

impl ViewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(ViewMode::All),
            "relevant" | "relevant_only" => Some(ViewMode::RelevantOnly),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::All => "All Tenders",
            ViewMode::RelevantOnly => "Relevant Tenders Only",
        }
    }
}

/// Urgency classification of a record's days left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DaysLeftBucket {
    #[serde(rename = "0 days")]
    Zero,
    #[serde(rename = "1-5 days")]
    OneToFive,
    #[serde(rename = "6-15 days")]
    SixToFifteen,
    #[serde(rename = "16-30 days")]
    SixteenToThirty,
    #[serde(rename = "30+ days")]
    OverThirty,
    Unknown,
}

impl DaysLeftBucket {
    pub fn of(days_left: Option<i64>) -> Self {
        match days_left {
            None => DaysLeftBucket::Unknown,
            Some(d) if d <= 0 => DaysLeftBucket::Zero,
            Some(d) if d <= 5 => DaysLeftBucket::OneToFive,
            Some(d) if d <= 15 => DaysLeftBucket::SixToFifteen,
            Some(d) if d <= 30 => DaysLeftBucket::SixteenToThirty,
            Some(_) => DaysLeftBucket::OverThirty,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DaysLeftBucket::Zero => "0 days",
            DaysLeftBucket::OneToFive => "1-5 days",
            DaysLeftBucket::SixToFifteen => "6-15 days",
            DaysLeftBucket::SixteenToThirty => "16-30 days",
            DaysLeftBucket::OverThirty => "30+ days",
            DaysLeftBucket::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DaysLeftBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Counts per category value, kept in first-encountered order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    index: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl Tally {
    pub fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.index.get(key).map(|&i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// Descending by count; equal counts stay in first-encountered order.
    pub fn ranked(&self) -> Vec<(String, usize)> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }
}

// Serializes as a map, entries in first-encountered order.
impl Serialize for Tally {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = s.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramCell {
    pub bucket: DaysLeftBucket,
    pub source: Source,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub mode: ViewMode,
    pub total_tenders: usize,
    pub relevant_tenders: usize,
    pub urgent_tenders: usize,
    pub avg_days_left: i64,
    pub organization_counts: Tally,
    pub type_counts: Tally,
    pub source_counts: Tally,
    pub province_counts: Tally,
    pub keyword_counts: Vec<KeywordCount>,
    pub days_left_distribution: Vec<HistogramCell>,
}

impl StatsSummary {
    pub fn relevant_percentage(&self) -> i64 {
        percentage(self.relevant_tenders, self.total_tenders)
    }

    pub fn urgent_percentage(&self) -> i64 {
        percentage(self.urgent_tenders, self.total_tenders)
    }

    /// Histogram totals per bucket, in fixed bucket order.
    pub fn bucket_totals(&self) -> Vec<(DaysLeftBucket, usize)> {
        [
            DaysLeftBucket::Zero,
            DaysLeftBucket::OneToFive,
            DaysLeftBucket::SixToFifteen,
            DaysLeftBucket::SixteenToThirty,
            DaysLeftBucket::OverThirty,
            DaysLeftBucket::Unknown,
        ]
        .into_iter()
        .map(|b| {
            let n = self
                .days_left_distribution
                .iter()
                .filter(|c| c.bucket == b)
                .map(|c| c.count)
                .sum();
            (b, n)
        })
        .collect()
    }
}

fn percentage(part: usize, total: usize) -> i64 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as i64
}

/// Summary over `records`, optionally narrowed to the relevant subset first.
pub fn summarize(records: &[Tender], mode: ViewMode) -> StatsSummary {
    let viewed: Vec<&Tender> = records
        .iter()
        .filter(|t| mode == ViewMode::All || t.marked_relevant)
        .collect();

    let relevant_tenders = viewed.iter().filter(|t| t.marked_relevant).count();
    let urgent_tenders = viewed
        .iter()
        .filter(|t| matches!(t.days_left, Some(d) if d <= URGENT_DAYS))
        .count();

    let known: Vec<i64> = viewed.iter().filter_map(|t| t.days_left).collect();
    let avg_days_left = if known.is_empty() {
        0
    } else {
        (known.iter().sum::<i64>() as f64 / known.len() as f64).round() as i64
    };

    let mut organization_counts = Tally::default();
    let mut type_counts = Tally::default();
    let mut source_counts = Tally::default();
    let mut province_counts = Tally::default();
    for t in &viewed {
        organization_counts.add(&t.organization);
        type_counts.add(t.procurement_type.as_str());
        source_counts.add(t.source.as_str());
        if let Some(p) = t.province {
            province_counts.add(p.as_str());
        }
    }

    let keyword_counts = top_keywords(viewed.iter().map(|t| t.title.as_str()), TOP_KEYWORD_LIMIT);

    StatsSummary {
        mode,
        total_tenders: viewed.len(),
        relevant_tenders,
        urgent_tenders,
        avg_days_left,
        organization_counts,
        type_counts,
        source_counts,
        province_counts,
        keyword_counts,
        days_left_distribution: days_left_histogram(&viewed),
    }
}

/// Cross-tabulates bucket by source. Buckets appear in first-encountered
/// order, sources likewise within each bucket.
fn days_left_histogram(viewed: &[&Tender]) -> Vec<HistogramCell> {
    let mut buckets: Vec<(DaysLeftBucket, Vec<(Source, usize)>)> = Vec::new();

    for t in viewed {
        let bucket = DaysLeftBucket::of(t.days_left);
        let slot = match buckets.iter().position(|(b, _)| *b == bucket) {
            Some(i) => i,
            None => {
                buckets.push((bucket, Vec::new()));
                buckets.len() - 1
            }
        };
        let sources = &mut buckets[slot].1;
        match sources.iter_mut().find(|(s, _)| *s == t.source) {
            Some((_, n)) => *n += 1,
            None => sources.push((t.source, 1)),
        }
    }

    buckets
        .into_iter()
        .flat_map(|(bucket, sources)| {
            sources
                .into_iter()
                .map(move |(source, count)| HistogramCell { bucket, source, count })
        })
        .collect()
}
