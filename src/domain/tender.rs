// src/domain/tender.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A procurement notice as held by the store and the in-memory collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tender {
    pub id: String,
    pub ifb_no: String,
    pub title: String,
    pub organization: String,
    pub deadline: Option<DateTime<Utc>>,
    pub procurement_type: ProcurementType,
    pub notice_date: Option<DateTime<Utc>>,
    pub province: Option<Province>,
    pub source: Source,
    pub days_left: Option<i64>,
    pub scraped_date: NaiveDate,
    pub marked_relevant: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything a caller supplies on insert. The store assigns the id and the
/// bookkeeping timestamps; `days_left` is derived from `deadline` on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTender {
    pub ifb_no: String,
    pub title: String,
    pub organization: String,
    pub deadline: Option<DateTime<Utc>>,
    pub procurement_type: ProcurementType,
    pub notice_date: Option<DateTime<Utc>>,
    pub province: Option<Province>,
    pub source: Source,
    pub scraped_date: NaiveDate,
    #[serde(default)]
    pub marked_relevant: bool,
}

/// Partial update. `None` leaves a field untouched; for `province` and
/// `deadline` the inner `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TenderPatch {
    pub marked_relevant: Option<bool>,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub procurement_type: Option<ProcurementType>,
    #[serde(default, with = "double_option")]
    pub province: Option<Option<Province>>,
    #[serde(default, with = "double_option")]
    pub deadline: Option<Option<DateTime<Utc>>>,
}

impl TenderPatch {
    pub fn relevance(marked: bool) -> Self {
        TenderPatch {
            marked_relevant: Some(marked),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TenderPatch::default()
    }

    /// Apply to an in-memory record. Returns true when any field changed.
    pub fn apply_to(&self, t: &mut Tender, now: DateTime<Utc>) -> bool {
        let before = t.clone();
        if let Some(v) = self.marked_relevant {
            t.marked_relevant = v;
        }
        if let Some(v) = &self.title {
            t.title = v.clone();
        }
        if let Some(v) = &self.organization {
            t.organization = v.clone();
        }
        if let Some(v) = self.procurement_type {
            t.procurement_type = v;
        }
        if let Some(v) = self.province {
            t.province = v;
        }
        if let Some(v) = self.deadline {
            t.deadline = v;
            t.days_left = days_left(v, now);
        }
        *t != before
    }
}

// Distinguishes an absent key from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

/// `max(0, ceil((deadline - now) / 1 day))`, or `None` without a deadline.
pub fn days_left(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    let deadline = deadline?;
    let diff = deadline.timestamp_millis() - now.timestamp_millis();
    if diff <= 0 {
        return Some(0);
    }
    Some((diff + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY)
}

/// SQL expression equivalent to [`days_left`]. `now` (unix millis) is always bound as `?1`.
pub const DAYS_LEFT_SQL: &str =
    "(CASE WHEN deadline IS NULL THEN NULL ELSE MAX(0, (deadline - ?1 + 86399999) / 86400000) END)";

/// Drop sub-millisecond precision so in-memory values match what the store returns.
pub fn truncate_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

#[derive(Debug, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcurementType {
    #[serde(rename = "works ncb")]
    WorksNcb,
    #[serde(rename = "goods ncb")]
    GoodsNcb,
    #[serde(rename = "services ncb")]
    ServicesNcb,
    #[serde(rename = "works")]
    Works,
    #[serde(rename = "goods")]
    Goods,
    #[serde(rename = "services")]
    Services,
}

impl ProcurementType {
    pub const ALL: [ProcurementType; 6] = [
        ProcurementType::WorksNcb,
        ProcurementType::GoodsNcb,
        ProcurementType::ServicesNcb,
        ProcurementType::Works,
        ProcurementType::Goods,
        ProcurementType::Services,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcurementType::WorksNcb => "works ncb",
            ProcurementType::GoodsNcb => "goods ncb",
            ProcurementType::ServicesNcb => "services ncb",
            ProcurementType::Works => "works",
            ProcurementType::Goods => "goods",
            ProcurementType::Services => "services",
        }
    }

    /// Lenient mapping for listing text such as `"Works (NCB)"` or
    /// `"Consultancy Services"`.
    pub fn from_listing_text(raw: &str) -> Option<Self> {
        let text: String = raw
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        let words: Vec<&str> = text.split_whitespace().collect();
        let ncb = words.contains(&"ncb");
        let has = |stem: &str| words.iter().any(|w| w.starts_with(stem));

        let base = if has("work") {
            ProcurementType::Works
        } else if has("good") {
            ProcurementType::Goods
        } else if has("servic") || has("consult") {
            ProcurementType::Services
        } else {
            return None;
        };

        Some(match (base, ncb) {
            (ProcurementType::Works, true) => ProcurementType::WorksNcb,
            (ProcurementType::Goods, true) => ProcurementType::GoodsNcb,
            (ProcurementType::Services, true) => ProcurementType::ServicesNcb,
            (other, _) => other,
        })
    }
}

impl FromStr for ProcurementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProcurementType::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownVariant {
                kind: "procurement type",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for ProcurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Province {
    Bagmati,
    Gandaki,
    Lumbini,
    #[serde(rename = "Province 1")]
    Province1,
    #[serde(rename = "Province 2")]
    Province2,
}

pub const PROVINCE_NOT_SPECIFIED: &str = "Not specified";

impl Province {
    pub const ALL: [Province; 5] = [
        Province::Bagmati,
        Province::Gandaki,
        Province::Lumbini,
        Province::Province1,
        Province::Province2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Province::Bagmati => "Bagmati",
            Province::Gandaki => "Gandaki",
            Province::Lumbini => "Lumbini",
            Province::Province1 => "Province 1",
            Province::Province2 => "Province 2",
        }
    }

    /// Form/listing input: blank or "Not specified" means no province.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, UnknownVariant> {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case(PROVINCE_NOT_SPECIFIED) {
            return Ok(None);
        }
        t.parse().map(Some)
    }
}

impl FromStr for Province {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Province::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVariant {
                kind: "province",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    Manual,
    Bolpatra,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Manual, Source::Bolpatra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Manual => "Manual",
            Source::Bolpatra => "Bolpatra",
        }
    }
}

impl FromStr for Source {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Source::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownVariant {
                kind: "source",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
