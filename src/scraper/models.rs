use chrono::NaiveDate;
use serde::Serialize;

// Bolpatra bid table, `table#dashBoardBidResult tbody tr`:
//  0 SI no.
//  1 IFB / RFP / EOI no.
//  2 project title
//  3 public entity
//  4 procurement type
//  5 status
//  6 notice published date
//  7 last submission date
//  8 days left ("27 days", "Expired")
pub const CELL_COUNT: usize = 9;
pub const IFB_NO: usize = 1;
pub const TITLE: usize = 2;
pub const PUBLIC_ENTITY: usize = 3;
pub const PROCUREMENT_TYPE: usize = 4;
pub const STATUS: usize = 5;
pub const NOTICE_DATE: usize = 6;
pub const SUBMISSION_DATE: usize = 7;
pub const DAYS_LEFT: usize = 8;

/// Days-left column as listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListedDaysLeft {
    Days(i64),
    Expired,
    Unknown,
}

/// One parsed row of the bid table. Dates are normalized when they match a
/// known format; the raw text is kept for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapedRow {
    pub ifb_no: String,
    pub title: String,
    pub organization: String,
    pub procurement_type: String,
    pub status: String,
    pub notice_date_raw: String,
    pub notice_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    pub days_left: ListedDaysLeft,
}
