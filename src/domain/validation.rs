// src/domain/validation.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::domain::tender::{NewTender, ProcurementType, Province, Source};

/// Per-field messages for a rejected form. Keys are form field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "please fix the errors in the form ({})", fields.join(", "))
    }
}

/// Manual-entry form as submitted. Everything is raw text; dates accept
/// RFC 3339, `YYYY-MM-DDTHH:MM` or a bare `YYYY-MM-DD` (UTC midnight).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenderForm {
    pub ifb_no: String,
    pub title: String,
    pub organization: String,
    pub deadline: String,
    pub procurement_type: String,
    pub notice_date: String,
    pub province: String,
    pub source: String,
}

impl Default for TenderForm {
    fn default() -> Self {
        TenderForm {
            ifb_no: String::new(),
            title: String::new(),
            organization: String::new(),
            deadline: String::new(),
            procurement_type: ProcurementType::WorksNcb.as_str().to_string(),
            notice_date: String::new(),
            province: String::new(),
            source: Source::Manual.as_str().to_string(),
        }
    }
}

/// Check a form against the required fields and the live IFB numbers.
/// Nothing here touches the store; callers pass the IFB set they hold.
pub fn validate_new_tender(
    form: &TenderForm,
    existing_ifbs: &HashSet<String>,
    today: NaiveDate,
) -> Result<NewTender, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let ifb_no = form.ifb_no.trim();
    if ifb_no.is_empty() {
        errors.add("ifb_no", "IFB No is required");
    } else if existing_ifbs.contains(ifb_no) {
        errors.add("ifb_no", "This IFB No already exists in the database");
    }

    let title = form.title.trim();
    if title.is_empty() {
        errors.add("title", "Title is required");
    }

    let organization = form.organization.trim();
    if organization.is_empty() {
        errors.add("organization", "Organization is required");
    }

    let deadline = required_instant(&mut errors, "deadline", "Deadline", &form.deadline);
    let notice_date = required_instant(&mut errors, "notice_date", "Notice date", &form.notice_date);

    let procurement_type = match form.procurement_type.parse::<ProcurementType>() {
        Ok(p) => Some(p),
        Err(e) => {
            errors.add("procurement_type", e.to_string());
            None
        }
    };

    let province = match Province::parse_optional(&form.province) {
        Ok(p) => p,
        Err(e) => {
            errors.add("province", e.to_string());
            None
        }
    };

    let source = if form.source.trim().is_empty() {
        Some(Source::Manual)
    } else {
        match form.source.parse::<Source>() {
            Ok(s) => Some(s),
            Err(e) => {
                errors.add("source", e.to_string());
                None
            }
        }
    };

    match (deadline, notice_date, procurement_type, source) {
        (Some(deadline), Some(notice_date), Some(procurement_type), Some(source))
            if errors.is_empty() =>
        {
            Ok(NewTender {
                ifb_no: ifb_no.to_string(),
                title: title.to_string(),
                organization: organization.to_string(),
                deadline: Some(deadline),
                procurement_type,
                notice_date: Some(notice_date),
                province,
                source,
                scraped_date: today,
                marked_relevant: false,
            })
        }
        _ => Err(errors),
    }
}

fn required_instant(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    raw: &str,
) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.add(field, format!("{label} is required"));
        return None;
    }
    match parse_instant(raw) {
        Some(dt) => Some(dt),
        None => {
            errors.add(field, format!("{label} must be a valid date"));
            None
        }
    }
}

pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn valid_form() -> TenderForm {
        TenderForm {
            ifb_no: "  IFB/77  ".into(),
            title: "Ward office building design".into(),
            organization: "Ward 5 Office".into(),
            deadline: "2025-03-20".into(),
            notice_date: "2025-02-28T10:30".into(),
            province: "Not specified".into(),
            ..Default::default()
        }
    }

    #[test]
    fn valid_form_becomes_manual_new_tender() {
        let t = validate_new_tender(&valid_form(), &HashSet::new(), today()).unwrap();
        assert_eq!(t.ifb_no, "IFB/77");
        assert_eq!(t.source, Source::Manual);
        assert_eq!(t.procurement_type, ProcurementType::WorksNcb);
        assert_eq!(t.province, None);
        assert_eq!(t.scraped_date, today());
        assert!(!t.marked_relevant);
        assert_eq!(
            t.deadline.unwrap().to_rfc3339(),
            "2025-03-20T00:00:00+00:00"
        );
    }

    #[test]
    fn missing_fields_are_reported_per_field() {
        let errors = validate_new_tender(&TenderForm::default(), &HashSet::new(), today())
            .unwrap_err();
        assert_eq!(errors.get("ifb_no"), Some("IFB No is required"));
        assert_eq!(errors.get("title"), Some("Title is required"));
        assert_eq!(errors.get("organization"), Some("Organization is required"));
        assert_eq!(errors.get("deadline"), Some("Deadline is required"));
        assert_eq!(errors.get("notice_date"), Some("Notice date is required"));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn duplicate_ifb_is_rejected() {
        let existing: HashSet<String> = ["IFB/77".to_string()].into_iter().collect();
        let errors = validate_new_tender(&valid_form(), &existing, today()).unwrap_err();
        assert_eq!(
            errors.get("ifb_no"),
            Some("This IFB No already exists in the database")
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn garbage_dates_and_enums_are_rejected() {
        let form = TenderForm {
            deadline: "next week".into(),
            procurement_type: "consulting".into(),
            province: "Atlantis".into(),
            ..valid_form()
        };
        let errors = validate_new_tender(&form, &HashSet::new(), today()).unwrap_err();
        assert_eq!(errors.get("deadline"), Some("Deadline must be a valid date"));
        assert!(errors.get("procurement_type").is_some());
        assert!(errors.get("province").is_some());
    }

    #[test]
    fn errors_serialize_as_a_flat_map() {
        let mut e = ValidationErrors::default();
        e.add("title", "Title is required");
        assert_eq!(
            serde_json::to_string(&e).unwrap(),
            r#"{"title":"Title is required"}"#
        );
    }
}
