use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Display format for dates in the table and the dialog.
pub const DISPLAY_DATE_FORMAT: &str = "%d.%m.%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub result: String,
    pub company: String,
    pub job_title: String,
    pub job_title_pdf: String,
    pub location: String,
    pub web: String,
    pub person: String,
    pub phone: String,
    pub email: String,
    pub request_sent_date: Option<NaiveDate>,
    pub answer_date: Option<NaiveDate>,
    pub conversation: String,
}

impl Position {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// Fields an extractor managed to find on a job posting page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialPosition {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub location: Option<String>,
    pub person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl PartialPosition {
    /// Fill every field still missing here from `other`.
    pub fn merge(mut self, other: PartialPosition) -> Self {
        self.company = self.company.or(other.company);
        self.job_title = self.job_title.or(other.job_title);
        self.location = self.location.or(other.location);
        self.person = self.person.or(other.person);
        self.phone = self.phone.or(other.phone);
        self.email = self.email.or(other.email);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.company.is_some()
            && self.job_title.is_some()
            && self.location.is_some()
            && self.person.is_some()
            && self.phone.is_some()
            && self.email.is_some()
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Accepts `dd.mm.yyyy` as typed in the dialog, or ISO `yyyy-mm-dd`.
/// Short years such as `6.5.24` are rejected rather than read as year 24.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DISPLAY_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(text, ISO_DATE_FORMAT))
        .ok()
        .filter(|date| date.year() >= 1000)
}
