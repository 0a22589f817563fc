// src/edinet/locator.rs
//! Finds the securities report of one entity for each requested fiscal year.
use crate::edinet::client::FilingArchive;
use crate::edinet::models::{
    fiscal_year_for, AcceptedFiling, FilingCandidate, FiscalYear, ReportKind, SecurityCode,
};
use crate::edinet::schedule::{DisclosureHint, SearchSchedule};
use crate::utils::error::EdinetError;
use chrono::NaiveDate;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// 010 = domestic company, 020 = foreign company.
const ACCEPTED_ORDINANCE_CODES: [&str; 2] = ["010", "020"];
const AMENDMENT_MARKER: &str = "訂正";
const QUARTERLY_MARKER: &str = "四半期";
const ASCII_AMENDMENT_MARKERS: [&str; 2] = ["amendment", "correction"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocateMode {
    /// Stop the whole search once any year yields a filing.
    #[default]
    FirstMatch,
    /// Keep going until every requested year is filled or searched.
    CollectAll,
}

#[derive(Debug, Clone)]
pub struct LocatorOptions {
    /// Upper bound for queried dates.
    pub today: NaiveDate,
    pub mode: LocateMode,
}

/// Why a candidate was skipped. Only used for debug logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingDocId,
    LegalBasis(Option<String>),
    DocumentType(Option<String>),
    Amendment,
    NotListed,
    CodeMismatch(String),
    YearOutOfRange(FiscalYear),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingDocId => write!(f, "no docID"),
            Rejection::LegalBasis(code) => write!(f, "ordinanceCode {:?}", code),
            Rejection::DocumentType(code) => write!(f, "docTypeCode {:?}", code),
            Rejection::Amendment => write!(f, "amendment"),
            Rejection::NotListed => write!(f, "no secCode"),
            Rejection::CodeMismatch(code) => write!(f, "secCode {}", code),
            Rejection::YearOutOfRange(year) => write!(f, "fiscal year {}", year),
        }
    }
}

/// Document type from `docTypeCode`. The description is only consulted when
/// the code is missing or too short to carry a prefix; a usable code that
/// names another type rejects the candidate.
pub fn report_kind_of(candidate: &FilingCandidate) -> Option<ReportKind> {
    let code = candidate.doc_type_code.as_deref().map(str::trim).unwrap_or_default();
    if let Some(prefix) = code.get(..3) {
        return [ReportKind::Annual, ReportKind::HalfYear]
            .into_iter()
            .find(|kind| kind.doc_type_prefix() == prefix);
    }
    let description = candidate.doc_description.as_deref().unwrap_or_default();
    // 半期報告書 is a substring of 四半期報告書.
    if description.contains(QUARTERLY_MARKER) {
        return None;
    }
    [ReportKind::Annual, ReportKind::HalfYear]
        .into_iter()
        .find(|kind| description.contains(kind.label()))
}

pub fn is_amendment(description: &str) -> bool {
    if description.contains(AMENDMENT_MARKER) {
        return true;
    }
    let lower = description.to_ascii_lowercase();
    ASCII_AMENDMENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Maps a period end onto one of the requested years.
///
/// An exact match wins; otherwise the closest requested year within one year
/// is taken, preferring the larger year on a tie. Without a period end the
/// year being searched is used.
pub fn resolve_fiscal_year(
    period_end: Option<NaiveDate>,
    searching: FiscalYear,
    requested: &[FiscalYear],
) -> Result<FiscalYear, FiscalYear> {
    let Some(period_end) = period_end else {
        return Ok(searching);
    };
    let derived = fiscal_year_for(period_end);
    if requested.contains(&derived) {
        return Ok(derived);
    }
    requested
        .iter()
        .copied()
        .map(|year| (year, (i64::from(year) - i64::from(derived)).abs()))
        .filter(|(_, distance)| *distance <= 1)
        .min_by_key(|(year, distance)| (*distance, Reverse(*year)))
        .map(|(year, _)| year)
        .ok_or(derived)
}

/// Applies every filter, in order, to one day-query record.
pub fn evaluate(
    candidate: &FilingCandidate,
    code: &SecurityCode,
    searching: FiscalYear,
    requested: &[FiscalYear],
) -> Result<AcceptedFiling, Rejection> {
    let doc_id = candidate
        .doc_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(Rejection::MissingDocId)?;

    let ordinance = candidate.ordinance_code.as_deref().map(str::trim);
    if !ordinance.is_some_and(|c| ACCEPTED_ORDINANCE_CODES.contains(&c)) {
        return Err(Rejection::LegalBasis(candidate.ordinance_code.clone()));
    }

    let report_kind =
        report_kind_of(candidate).ok_or_else(|| Rejection::DocumentType(candidate.doc_type_code.clone()))?;

    if candidate.doc_description.as_deref().is_some_and(is_amendment) {
        return Err(Rejection::Amendment);
    }

    let sec_code = candidate
        .sec_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(Rejection::NotListed)?;
    if !code.matches(sec_code) {
        return Err(Rejection::CodeMismatch(sec_code.to_string()));
    }

    let period_end = candidate.period_end_date();
    let fiscal_year =
        resolve_fiscal_year(period_end, searching, requested).map_err(Rejection::YearOutOfRange)?;

    Ok(AcceptedFiling {
        doc_id: doc_id.to_string(),
        sec_code: sec_code.to_string(),
        filer_name: candidate.filer_name.clone(),
        fiscal_year,
        report_kind,
        period_end,
        submitted_at: candidate.submit_date_time.clone(),
        has_xbrl: candidate.has_xbrl(),
        has_pdf: candidate.has_pdf(),
    })
}

pub struct FilingLocator {
    archive: Arc<dyn FilingArchive>,
    options: LocatorOptions,
}

impl FilingLocator {
    pub fn new(archive: Arc<dyn FilingArchive>, options: LocatorOptions) -> Self {
        Self { archive, options }
    }

    /// Searches the archive year by year, most recent first.
    ///
    /// Archive errors that survive the gateway's retries abort the search.
    pub async fn locate(
        &self,
        code: &SecurityCode,
        fiscal_years: &[FiscalYear],
        hints: &BTreeMap<FiscalYear, DisclosureHint>,
    ) -> Result<BTreeMap<FiscalYear, AcceptedFiling>, EdinetError> {
        let mut years: Vec<FiscalYear> = fiscal_years.to_vec();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();

        let mut found: BTreeMap<FiscalYear, AcceptedFiling> = BTreeMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        'years: for &year in &years {
            if found.contains_key(&year) {
                continue;
            }
            let schedule = SearchSchedule::for_year(year, hints.get(&year), self.options.today);
            tracing::info!(
                "Searching EDINET for {} fiscal year {} ({})",
                code,
                year,
                if hints.contains_key(&year) { "hinted window" } else { "fallback dates" }
            );

            for date in schedule {
                let candidates = self.archive.list_documents(date).await?;
                tracing::debug!("{}: {} document(s)", date, candidates.len());

                for candidate in &candidates {
                    if let Some(doc_id) = candidate.doc_id.as_deref() {
                        if !seen.insert(doc_id.to_string()) {
                            continue;
                        }
                    }
                    match evaluate(candidate, code, year, &years) {
                        Ok(filing) => {
                            if found.contains_key(&filing.fiscal_year) {
                                tracing::debug!(
                                    "Ignoring {}: fiscal year {} already filled",
                                    filing.doc_id,
                                    filing.fiscal_year
                                );
                                continue;
                            }
                            tracing::info!(
                                "Found {} {} for fiscal year {} (submitted {})",
                                filing.report_kind.label(),
                                filing.doc_id,
                                filing.fiscal_year,
                                filing.submitted_at.as_deref().unwrap_or("unknown")
                            );
                            found.insert(filing.fiscal_year, filing);
                            if self.options.mode == LocateMode::FirstMatch {
                                break 'years;
                            }
                        }
                        Err(Rejection::CodeMismatch(_)) | Err(Rejection::NotListed) => {}
                        Err(reason) => {
                            if candidate.sec_code.as_deref().is_some_and(|c| code.matches(c)) {
                                tracing::debug!(
                                    "Skipping {}: {}",
                                    candidate.doc_id.as_deref().unwrap_or("?"),
                                    reason
                                );
                            }
                        }
                    }
                }

                if found.contains_key(&year) {
                    continue 'years;
                }
            }

            if !found.contains_key(&year) {
                tracing::warn!("No securities report found for {} fiscal year {}", code, year);
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edinet::client::DocumentKind;
    use crate::utils::error::GatewayError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn code(s: &str) -> SecurityCode {
        s.parse().unwrap()
    }

    fn annual(doc_id: &str, sec_code: &str, period_end: &str) -> FilingCandidate {
        FilingCandidate {
            doc_id: Some(doc_id.to_string()),
            sec_code: Some(sec_code.to_string()),
            filer_name: Some("トヨタ自動車株式会社".to_string()),
            ordinance_code: Some("010".to_string()),
            doc_type_code: Some("030001".to_string()),
            doc_description: Some("有価証券報告書－第120期".to_string()),
            period_end: Some(period_end.to_string()),
            submit_date_time: Some("2024-06-18 15:00".to_string()),
            xbrl_flag: Some("1".to_string()),
            pdf_flag: Some("1".to_string()),
            ..Default::default()
        }
    }

    /// Serves canned day-query results and records every queried date.
    #[derive(Default)]
    struct FakeArchive {
        days: HashMap<NaiveDate, Vec<FilingCandidate>>,
        failing_day: Option<NaiveDate>,
        queried: Mutex<Vec<NaiveDate>>,
    }

    impl FakeArchive {
        fn with_day(mut self, day: NaiveDate, docs: Vec<FilingCandidate>) -> Self {
            self.days.insert(day, docs);
            self
        }

        fn queried(&self) -> Vec<NaiveDate> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FilingArchive for FakeArchive {
        async fn list_documents(&self, date: NaiveDate) -> Result<Vec<FilingCandidate>, EdinetError> {
            self.queried.lock().unwrap().push(date);
            if self.failing_day == Some(date) {
                return Err(GatewayError::fatal("documents.json", "HTTP 500").into());
            }
            Ok(self.days.get(&date).cloned().unwrap_or_default())
        }

        async fn download(&self, _: &str, _: DocumentKind) -> Result<Option<Vec<u8>>, EdinetError> {
            Ok(None)
        }
    }

    fn locator(archive: Arc<FakeArchive>, today: NaiveDate, mode: LocateMode) -> FilingLocator {
        FilingLocator::new(archive, LocatorOptions { today, mode })
    }

    #[test]
    fn accepts_the_7203_example_candidate() {
        let candidate = annual("S100TR7I", "72030", "2024-03-31");
        let filing = evaluate(&candidate, &code("7203"), 2023, &[2023]).unwrap();
        assert_eq!(filing.doc_id, "S100TR7I");
        assert_eq!(filing.fiscal_year, 2023);
        assert_eq!(filing.report_kind, ReportKind::Annual);
    }

    #[test]
    fn filters_reject_in_order() {
        let c = code("7203");
        let mut candidate = annual("S1", "72030", "2024-03-31");
        candidate.ordinance_code = Some("030".to_string());
        assert!(matches!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::LegalBasis(_))));

        let mut candidate = annual("S1", "72030", "2024-03-31");
        candidate.doc_type_code = Some("120".to_string());
        candidate.doc_description = Some("臨時報告書".to_string());
        assert!(matches!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::DocumentType(_))));

        let mut candidate = annual("S1", "72030", "2024-03-31");
        candidate.doc_description = Some("訂正有価証券報告書－第120期".to_string());
        assert_eq!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::Amendment));

        let mut candidate = annual("S1", "72030", "2024-03-31");
        candidate.sec_code = None;
        assert_eq!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::NotListed));

        let candidate = annual("S1", "65010", "2024-03-31");
        assert!(matches!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::CodeMismatch(_))));

        let candidate = annual("S1", "72030", "2021-03-31");
        assert_eq!(evaluate(&candidate, &c, 2023, &[2023]), Err(Rejection::YearOutOfRange(2020)));
    }

    #[test]
    fn description_is_used_only_without_a_usable_code() {
        let mut candidate = annual("S1", "72030", "2024-09-30");
        candidate.doc_type_code = None;
        candidate.doc_description = Some("半期報告書－第121期(2024/04/01－2025/03/31)".to_string());
        assert_eq!(report_kind_of(&candidate), Some(ReportKind::HalfYear));

        candidate.doc_type_code = Some(" ".to_string());
        candidate.doc_description = Some("有価証券報告書－第120期".to_string());
        assert_eq!(report_kind_of(&candidate), Some(ReportKind::Annual));

        candidate.doc_type_code = Some("043000".to_string());
        candidate.doc_description = None;
        assert_eq!(report_kind_of(&candidate), Some(ReportKind::HalfYear));
    }

    #[test]
    fn other_type_codes_win_over_the_description() {
        let mut candidate = annual("S1", "72030", "2024-09-30");
        candidate.doc_type_code = Some("160".to_string());
        candidate.doc_description = Some("半期報告書－第121期(2024/04/01－2025/03/31)".to_string());
        assert_eq!(report_kind_of(&candidate), None);

        candidate.doc_type_code = Some("135".to_string());
        candidate.doc_description = Some("確認書（有価証券報告書）".to_string());
        assert_eq!(report_kind_of(&candidate), None);
    }

    #[test]
    fn quarterly_reports_are_rejected() {
        let mut candidate = annual("S100Q1", "77510", "2024-03-31");
        candidate.doc_type_code = Some("140".to_string());
        candidate.doc_description = Some("四半期報告書－第124期第1四半期(2024/01/01－2024/03/31)".to_string());
        assert!(matches!(
            evaluate(&candidate, &code("7751"), 2023, &[2023]),
            Err(Rejection::DocumentType(_))
        ));

        candidate.doc_type_code = None;
        assert_eq!(report_kind_of(&candidate), None);
    }

    #[test]
    fn ascii_amendment_markers() {
        assert!(is_amendment("Amendment to Annual Securities Report"));
        assert!(is_amendment("CORRECTION"));
        assert!(!is_amendment("有価証券報告書"));
    }

    #[test]
    fn year_remap_prefers_exact_then_closest_then_larger() {
        let march = |y| Some(date(y, 3, 31));
        assert_eq!(resolve_fiscal_year(march(2024), 2023, &[2023, 2022]), Ok(2023));
        assert_eq!(resolve_fiscal_year(march(2025), 2023, &[2023, 2022]), Ok(2023));
        assert_eq!(resolve_fiscal_year(march(2024), 2022, &[2024, 2022]), Ok(2024));
        assert_eq!(resolve_fiscal_year(march(2030), 2023, &[2023]), Err(2029));
        assert_eq!(resolve_fiscal_year(None, 2021, &[2023]), Ok(2021));
    }

    #[test]
    fn year_remap_handles_extreme_requested_years() {
        let period_end = Some(date(2024, 3, 31));
        assert_eq!(resolve_fiscal_year(period_end, i32::MAX, &[i32::MAX, i32::MIN]), Err(2023));
        assert_eq!(resolve_fiscal_year(period_end, i32::MIN, &[i32::MIN, 2024]), Ok(2024));
    }

    #[tokio::test]
    async fn hinted_search_finds_the_7203_filing() {
        let filing_day = date(2024, 6, 18);
        let archive = Arc::new(
            FakeArchive::default().with_day(filing_day, vec![annual("S100TR7I", "72030", "2024-03-31")]),
        );
        let hints = BTreeMap::from([(
            2023,
            DisclosureHint { disclosure_date: date(2024, 5, 8), period_end: date(2024, 3, 31) },
        )]);

        let found = locator(archive.clone(), date(2025, 1, 1), LocateMode::FirstMatch)
            .locate(&code("7203"), &[2023], &hints)
            .await
            .unwrap();

        assert_eq!(found.get(&2023).map(|f| f.doc_id.as_str()), Some("S100TR7I"));
        let queried = archive.queried();
        assert_eq!(queried.first(), Some(&date(2024, 5, 1)));
        assert_eq!(queried.last(), Some(&filing_day));
    }

    #[test]
    fn first_match_never_queries_the_older_year() {
        let archive = Arc::new(
            FakeArchive::default().with_day(date(2025, 6, 15), vec![annual("S2024", "72030", "2025-03-31")]),
        );
        let found = tokio_test::block_on(
            locator(archive.clone(), date(2026, 1, 1), LocateMode::FirstMatch).locate(
                &code("7203"),
                &[2023, 2024],
                &BTreeMap::new(),
            ),
        )
        .unwrap();

        assert_eq!(found.keys().copied().collect::<Vec<_>>(), vec![2024]);
        // 2023's fallback dates all fall in 2024.
        assert!(archive.queried().iter().all(|d| d.format("%Y").to_string() == "2025"));
    }

    #[test]
    fn collect_all_fills_every_year_and_ignores_duplicates() {
        let dup = annual("S2023", "72030", "2024-03-31");
        let archive = Arc::new(
            FakeArchive::default()
                .with_day(date(2025, 6, 15), vec![annual("S2024", "72030", "2025-03-31")])
                .with_day(date(2024, 6, 15), vec![dup.clone(), dup])
                .with_day(date(2024, 6, 30), vec![annual("S2023-late", "72030", "2024-03-31")]),
        );
        let found = tokio_test::block_on(
            locator(archive.clone(), date(2026, 1, 1), LocateMode::CollectAll).locate(
                &code("7203"),
                &[2023, 2024],
                &BTreeMap::new(),
            ),
        )
        .unwrap();

        assert_eq!(found.get(&2024).map(|f| f.doc_id.as_str()), Some("S2024"));
        assert_eq!(found.get(&2023).map(|f| f.doc_id.as_str()), Some("S2023"));
        assert!(!archive.queried().contains(&date(2024, 6, 30)));
    }

    #[test]
    fn never_queries_future_dates() {
        let today = date(2024, 5, 20);
        let archive = Arc::new(FakeArchive::default());
        let hints = BTreeMap::from([(
            2024,
            DisclosureHint { disclosure_date: date(2025, 5, 8), period_end: date(2025, 3, 31) },
        )]);
        let found = tokio_test::block_on(
            locator(archive.clone(), today, LocateMode::CollectAll).locate(&code("7203"), &[2024, 2023], &hints),
        )
        .unwrap();

        assert!(found.is_empty());
        let queried = archive.queried();
        assert!(!queried.is_empty());
        assert!(queried.iter().all(|d| *d <= today));
    }

    #[test]
    fn archive_failure_aborts_the_search() {
        let archive = Arc::new(FakeArchive { failing_day: Some(date(2024, 4, 15)), ..Default::default() });
        let result = tokio_test::block_on(
            locator(archive.clone(), date(2025, 1, 1), LocateMode::FirstMatch).locate(
                &code("7203"),
                &[2023],
                &BTreeMap::new(),
            ),
        );
        assert!(matches!(result, Err(EdinetError::Gateway(_))));
        assert_eq!(archive.queried().len(), 2);
    }
}
