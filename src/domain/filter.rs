// src/domain/filter.rs

//! One declarative filter, compiled into a clause list that is evaluated
//! either in memory ([`CompiledFilter::matches`]) or by the store
//! ([`CompiledFilter::to_sql`]). Both read the same clauses, so a rule is added
//! once and translated twice, next to each other.
//!
//! Null `days_left` / `deadline` never satisfy a range clause. SQL gets this
//! for free from NULL comparison semantics; the in-memory side spells it out.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::domain::tender::{ProcurementType, Province, Source, Tender, DAYS_LEFT_SQL};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenderFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub organization: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub procurement_type: Vec<ProcurementType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub province: Vec<Province>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_left_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
}

impl TenderFilter {
    pub fn is_empty(&self) -> bool {
        self.compile(false, Utc::now()).clauses.is_empty()
    }

    /// Reads `key=value` pairs as sent by the listing page. Set-valued keys
    /// may repeat or carry comma-separated values.
    pub fn from_query_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut f = TenderFilter::default();

        for (key, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let items = || value.split(',').map(str::trim).filter(|s| !s.is_empty());

            match key.as_str() {
                "keyword" => f.keyword = Some(value.to_string()),
                "organization" => f.organization.extend(items().map(str::to_string)),
                "procurement_type" => {
                    for v in items() {
                        f.procurement_type.push(v.parse().map_err(|e| format!("{e}"))?);
                    }
                }
                "province" => {
                    for v in items() {
                        f.province.push(v.parse().map_err(|e| format!("{e}"))?);
                    }
                }
                "source" => {
                    for v in items() {
                        f.source.push(v.parse().map_err(|e| format!("{e}"))?);
                    }
                }
                "days_left_min" => f.days_left_min = Some(parse_int(key, value)?),
                "days_left_max" => f.days_left_max = Some(parse_int(key, value)?),
                "date_from" => f.date_from = Some(parse_date(key, value)?),
                "date_to" => f.date_to = Some(parse_date(key, value)?),
                _ => {}
            }
        }

        Ok(f)
    }

    /// Compile against a point in time. `now` only feeds the store-side
    /// days-left expression; in memory each record already carries its value.
    pub fn compile(&self, relevant_only: bool, now: DateTime<Utc>) -> CompiledFilter {
        let mut clauses = Vec::new();

        if let Some(k) = self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            clauses.push(Clause::Keyword(k.to_ascii_lowercase()));
        }
        if !self.organization.is_empty() {
            clauses.push(Clause::Organization(self.organization.clone()));
        }
        if !self.procurement_type.is_empty() {
            clauses.push(Clause::ProcurementType(self.procurement_type.clone()));
        }
        if !self.province.is_empty() {
            clauses.push(Clause::Province(self.province.clone()));
        }
        if !self.source.is_empty() {
            clauses.push(Clause::Source(self.source.clone()));
        }
        if self.days_left_min.is_some() || self.days_left_max.is_some() {
            clauses.push(Clause::DaysLeft {
                min: self.days_left_min,
                max: self.days_left_max,
            });
        }
        if self.date_from.is_some() || self.date_to.is_some() {
            clauses.push(Clause::Deadline {
                from_ms: self.date_from.map(start_of_day_ms),
                until_ms: self
                    .date_to
                    .and_then(|d| d.succ_opt())
                    .map(start_of_day_ms),
            });
        }
        if relevant_only {
            clauses.push(Clause::Relevant(true));
        }

        CompiledFilter {
            now_ms: now.timestamp_millis(),
            clauses,
        }
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, String> {
    value
        .parse()
        .map_err(|_| format!("{key} must be an integer, got '{value}'"))
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{key} must be YYYY-MM-DD, got '{value}'"))
}

fn start_of_day_ms(d: NaiveDate) -> i64 {
    d.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// ASCII-lowercased needle, matched against title, ifb_no, organization.
    Keyword(String),
    Organization(Vec<String>),
    ProcurementType(Vec<ProcurementType>),
    Province(Vec<Province>),
    Source(Vec<Source>),
    /// Inclusive bounds.
    DaysLeft { min: Option<i64>, max: Option<i64> },
    /// Unix millis; `from_ms` inclusive, `until_ms` exclusive.
    Deadline { from_ms: Option<i64>, until_ms: Option<i64> },
    Relevant(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    now_ms: i64,
    clauses: Vec<Clause>,
}

/// A SQL `WHERE` body plus its parameters. `params[0]` is always `now`
/// (bound as `?1`); clause parameters follow from `?2`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

impl CompiledFilter {
    pub fn matches(&self, t: &Tender) -> bool {
        self.clauses.iter().all(|c| clause_matches(c, t))
    }

    pub fn apply<'a>(&self, records: &'a [Tender]) -> Vec<&'a Tender> {
        records.iter().filter(|t| self.matches(t)).collect()
    }

    pub fn to_sql(&self) -> SqlFilter {
        let mut params: Vec<Value> = vec![Value::Integer(self.now_ms)];
        let mut parts: Vec<String> = Vec::new();

        for clause in &self.clauses {
            match clause {
                Clause::Keyword(needle) => {
                    let n = bind(&mut params, Value::Text(needle.clone()));
                    parts.push(format!(
                        "(instr(lower(title), ?{n}) > 0 OR instr(lower(ifb_no), ?{n}) > 0 OR instr(lower(organization), ?{n}) > 0)"
                    ));
                }
                Clause::Organization(values) => {
                    parts.push(in_list(&mut params, "organization", values.iter().cloned()));
                }
                Clause::ProcurementType(values) => {
                    let texts = values.iter().map(|v| v.as_str().to_string());
                    parts.push(in_list(&mut params, "procurement_type", texts));
                }
                Clause::Province(values) => {
                    let texts = values.iter().map(|v| v.as_str().to_string());
                    parts.push(in_list(&mut params, "province", texts));
                }
                Clause::Source(values) => {
                    let texts = values.iter().map(|v| v.as_str().to_string());
                    parts.push(in_list(&mut params, "source", texts));
                }
                Clause::DaysLeft { min, max } => {
                    // Guarantees a NULL days_left drops out even with no bound value.
                    parts.push("deadline IS NOT NULL".to_string());
                    if let Some(min) = min {
                        let n = bind(&mut params, Value::Integer(*min));
                        parts.push(format!("{DAYS_LEFT_SQL} >= ?{n}"));
                    }
                    if let Some(max) = max {
                        let n = bind(&mut params, Value::Integer(*max));
                        parts.push(format!("{DAYS_LEFT_SQL} <= ?{n}"));
                    }
                }
                Clause::Deadline { from_ms, until_ms } => {
                    parts.push("deadline IS NOT NULL".to_string());
                    if let Some(from) = from_ms {
                        let n = bind(&mut params, Value::Integer(*from));
                        parts.push(format!("deadline >= ?{n}"));
                    }
                    if let Some(until) = until_ms {
                        let n = bind(&mut params, Value::Integer(*until));
                        parts.push(format!("deadline < ?{n}"));
                    }
                }
                Clause::Relevant(flag) => {
                    let n = bind(&mut params, Value::Integer(*flag as i64));
                    parts.push(format!("marked_relevant = ?{n}"));
                }
            }
        }

        let clause = if parts.is_empty() {
            "1 = 1".to_string()
        } else {
            parts.join(" AND ")
        };

        SqlFilter { clause, params }
    }
}

fn bind(params: &mut Vec<Value>, v: Value) -> usize {
    params.push(v);
    params.len()
}

fn in_list(params: &mut Vec<Value>, column: &str, values: impl Iterator<Item = String>) -> String {
    let placeholders: Vec<String> = values
        .map(|v| format!("?{}", bind(params, Value::Text(v))))
        .collect();
    format!("{column} IN ({})", placeholders.join(", "))
}

fn clause_matches(clause: &Clause, t: &Tender) -> bool {
    match clause {
        Clause::Keyword(needle) => [&t.title, &t.ifb_no, &t.organization]
            .iter()
            .any(|field| field.to_ascii_lowercase().contains(needle.as_str())),
        Clause::Organization(values) => values.iter().any(|v| *v == t.organization),
        Clause::ProcurementType(values) => values.contains(&t.procurement_type),
        Clause::Province(values) => t.province.is_some_and(|p| values.contains(&p)),
        Clause::Source(values) => values.contains(&t.source),
        Clause::DaysLeft { min, max } => match t.days_left {
            None => false,
            Some(d) => min.map_or(true, |m| d >= m) && max.map_or(true, |m| d <= m),
        },
        Clause::Deadline { from_ms, until_ms } => match t.deadline {
            None => false,
            Some(dl) => {
                let ms = dl.timestamp_millis();
                from_ms.map_or(true, |f| ms >= f) && until_ms.map_or(true, |u| ms < u)
            }
        },
        Clause::Relevant(flag) => t.marked_relevant == *flag,
    }
}
