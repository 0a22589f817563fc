// src/edinet/models.rs
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Business-year label, e.g. `2023` for the year ending 2024-03-31.
pub type FiscalYear = i32;

/// Derives the fiscal-year label from a period-end date.
///
/// March year-ends belong to the previous calendar year (the Japanese
/// April–March convention); every other month keeps its calendar year.
pub fn fiscal_year_for(period_end: NaiveDate) -> FiscalYear {
    if period_end.month() == 3 {
        period_end.year() - 1
    } else {
        period_end.year()
    }
}

/// Parses the leading `YYYY-MM-DD` of an EDINET date or timestamp field.
pub fn parse_edinet_date(value: &str) -> Option<NaiveDate> {
    let head = value.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Sub-type of a securities report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// 有価証券報告書
    Annual,
    /// 半期報告書
    HalfYear,
}

impl ReportKind {
    pub const fn label(&self) -> &'static str {
        match self {
            ReportKind::Annual => "有価証券報告書",
            ReportKind::HalfYear => "半期報告書",
        }
    }

    /// Leading three characters of `docTypeCode` for this kind.
    pub const fn doc_type_prefix(&self) -> &'static str {
        match self {
            ReportKind::Annual => "030",
            ReportKind::HalfYear => "043",
        }
    }
}

/// Securities code of a listed entity, as supplied by the caller.
///
/// EDINET reports codes in the 5-character form (`72030`) while callers
/// usually know the 4-character form (`7203`); [`SecurityCode::matches`]
/// bridges the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityCode(String);

impl SecurityCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First four characters, or the whole code when shorter.
    pub fn four_digit(&self) -> &str {
        prefix_chars(&self.0, 4)
    }

    /// Zero-padded on the left to five characters; longer codes are kept.
    pub fn five_digit(&self) -> String {
        zero_pad(&self.0, 5)
    }

    /// Compares an archive-supplied code against this one under every
    /// normalization the archive is known to use. Any single rule matching
    /// is enough.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        let four = self.four_digit();
        let five = self.five_digit();
        let candidate_padded = zero_pad(candidate, 5);
        let code_padded = zero_pad(&self.0, 5);

        candidate == four
            || candidate == five
            || candidate == self.0
            || candidate_padded == code_padded
            || candidate.starts_with(four)
            || prefix_chars(&candidate_padded, 4) == prefix_chars(&code_padded, 4)
            || (candidate.chars().count() == 5 && prefix_chars(candidate, 4) == four)
    }
}

impl FromStr for SecurityCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("security code must not be empty".to_string());
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid security code: {trimmed}"));
        }
        Ok(SecurityCode(trimmed.to_ascii_uppercase()))
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn zero_pad(s: &str, width: usize) -> String {
    format!("{:0>width$}", s, width = width)
}

/// One record of an EDINET `documents.json` day-query.
/// Example: https://api.edinet-fsa.go.jp/api/v2/documents.json?date=2024-06-18&type=2
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingCandidate {
    #[serde(rename = "docID")]
    pub doc_id: Option<String>,
    pub sec_code: Option<String>,
    pub edinet_code: Option<String>,
    pub filer_name: Option<String>,
    /// Legal basis: 010 = domestic company, 020 = foreign company.
    pub ordinance_code: Option<String>,
    pub doc_type_code: Option<String>,
    pub doc_description: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub submit_date_time: Option<String>,
    pub xbrl_flag: Option<String>,
    pub pdf_flag: Option<String>,
}

impl FilingCandidate {
    pub fn period_end_date(&self) -> Option<NaiveDate> {
        self.period_end.as_deref().and_then(parse_edinet_date)
    }

    pub fn has_xbrl(&self) -> bool {
        flag_set(self.xbrl_flag.as_deref())
    }

    pub fn has_pdf(&self) -> bool {
        flag_set(self.pdf_flag.as_deref())
    }
}

// Flags are "1"/"0"; a missing flag is treated as "maybe present" so the
// download is still attempted.
fn flag_set(flag: Option<&str>) -> bool {
    !matches!(flag.map(str::trim), Some("0"))
}

/// Envelope of a day-query response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListResponse {
    pub metadata: Option<ResponseMetadata>,
    pub results: Option<Vec<FilingCandidate>>,
    /// Present only on error bodies, e.g. `{"statusCode": 401, "message": ...}`.
    pub status_code: Option<serde_json::Value>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMetadata {
    pub status: Option<String>,
    pub message: Option<String>,
    pub resultset: Option<ResultSet>,
}

#[derive(Debug, Deserialize)]
pub struct ResultSet {
    pub count: Option<u64>,
}

/// A filing that passed every locator filter for one fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedFiling {
    pub doc_id: String,
    pub sec_code: String,
    pub filer_name: Option<String>,
    pub fiscal_year: FiscalYear,
    pub report_kind: ReportKind,
    pub period_end: Option<NaiveDate>,
    pub submitted_at: Option<String>,
    pub has_xbrl: bool,
    pub has_pdf: bool,
}
