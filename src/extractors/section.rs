// src/extractors/section.rs

// --- Imports ---
use crate::config::ExtractorConfig;
use crate::edinet::models::ReportKind;
use crate::edinet::retriever::FilingPackage;
use crate::utils::error::ExtractError;
use crate::utils::text::{normalize_whitespace, truncate_chars};
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

// --- Constants ---
// Tags whose presence identifies the report kind when filenames don't.
const ANNUAL_MARKER_TAG: &str = "OverviewOfCapitalExpendituresEtcTextBlock";
const HALF_YEAR_MARKER_TAG: &str = "BusinessResultsOfOperationsTextBlock";

// Auditor reports share tag names with the main document.
const SKIPPED_DIRS: [&str; 1] = ["AuditDoc"];

// Elements that break lines when flattened to text.
const BLOCK_ELEMENTS: [&str; 20] = [
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "blockquote", "dl", "dt", "dd", "hr", "pre",
];
// Elements whose contents never reach the summary.
const DROPPED_ELEMENTS: [&str; 5] = ["table", "script", "style", "head", "title"];

// --- Data Structures ---

/// The narrative sections pulled from a securities report, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    BusinessDescription,
    ManagementPolicy,
    BusinessRisks,
    ManagementAnalysis,
    MaterialContracts,
    CapitalInvestment,
}

impl SectionKey {
    pub const ALL: [SectionKey; 6] = [
        SectionKey::BusinessDescription,
        SectionKey::ManagementPolicy,
        SectionKey::BusinessRisks,
        SectionKey::ManagementAnalysis,
        SectionKey::MaterialContracts,
        SectionKey::CapitalInvestment,
    ];

    /// Local name of the `jpcrp_cor` taxonomy element.
    pub const fn tag(&self) -> &'static str {
        match self {
            SectionKey::BusinessDescription => "DescriptionOfBusinessTextBlock",
            SectionKey::ManagementPolicy => "BusinessPolicyBusinessEnvironmentIssuesToAddressEtcTextBlock",
            SectionKey::BusinessRisks => "BusinessRisksTextBlock",
            SectionKey::ManagementAnalysis => {
                "ManagementAnalysisOfFinancialPositionOperatingResultsAndCashFlowsTextBlock"
            }
            SectionKey::MaterialContracts => "CriticalContractsForOperationTextBlock",
            SectionKey::CapitalInvestment => "OverviewOfCapitalExpendituresEtcTextBlock",
        }
    }

    /// Heading used in the printed report.
    pub const fn label(&self) -> &'static str {
        match self {
            SectionKey::BusinessDescription => "事業の内容",
            SectionKey::ManagementPolicy => "経営方針、経営環境及び対処すべき課題等",
            SectionKey::BusinessRisks => "事業等のリスク",
            SectionKey::ManagementAnalysis => {
                "経営者による財政状態、経営成績及びキャッシュ・フローの状況の分析"
            }
            SectionKey::MaterialContracts => "経営上の重要な契約等",
            SectionKey::CapitalInvestment => "設備投資等の概要",
        }
    }

    /// Tags to try for this key, in preference order.
    pub fn tags_for(&self, kind: ReportKind) -> Vec<&'static str> {
        match (self, kind) {
            (SectionKey::ManagementAnalysis, ReportKind::HalfYear) => {
                vec![self.tag(), HALF_YEAR_MARKER_TAG]
            }
            _ => vec![self.tag()],
        }
    }
}

/// Which physical encoding a section set was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    InlineXbrl,
    InstanceDocument,
}

/// Extracted section texts keyed by [`SectionKey`]; iteration follows report order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionSet {
    sections: BTreeMap<SectionKey, String>,
    pub encoding: Option<Encoding>,
    pub report_kind: Option<ReportKind>,
}

impl SectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SectionKey, text: impl Into<String>) {
        self.sections.insert(key, text.into());
    }

    pub fn get(&self, key: SectionKey) -> Option<&str> {
        self.sections.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionKey, &str)> {
        self.sections.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn keys(&self) -> Vec<SectionKey> {
        self.sections.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// All sections joined in report order, each under a `【label】` header.
    pub fn concatenated(&self) -> String {
        self.iter()
            .map(|(key, text)| format!("【{}】\n{}", key.label(), text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// --- Encoding Parsers ---

/// One physical encoding of the structured package.
pub trait EncodingParser: Send + Sync {
    fn encoding(&self) -> Encoding;

    /// Files under `root` this parser understands, in a stable order.
    fn locate_files(&self, root: &Path) -> Vec<PathBuf>;

    /// Raw text per wanted tag local name. Tags not found are absent.
    fn collect(
        &self,
        files: &[PathBuf],
        wanted: &[&str],
    ) -> Result<HashMap<String, String>, ExtractError>;
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n))
}

/// Recursively lists files under `root` accepted by `keep`, skipping
/// auditor directories. Unreadable entries are ignored.
pub fn collect_files(root: &Path, keep: &dyn Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && keep(entry.path()))
        .map(DirEntry::into_path)
        .collect();
    found.sort();
    found
}

pub(crate) fn read_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path).map_err(|source| ExtractError::Io { path: path.display().to_string(), source })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Flattens an element to text: block elements become line breaks, tables
/// and scripts are dropped.
pub fn element_text(element: ElementRef) -> String {
    let mut out = String::new();
    push_element_text(element, &mut out);
    out
}

fn push_element_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if DROPPED_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push('\n');
            }
            push_element_text(child_element, out);
            if block {
                out.push('\n');
            }
        }
    }
}

/// Text of an HTML fragment, e.g. the escaped content of an instance fact.
pub fn fragment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element())
}

// --- Report Kind Detection ---

/// Report kind from EDINET file naming (`jpcrp030000-asr-001_...`).
pub fn kind_from_filenames(files: &[PathBuf]) -> Option<ReportKind> {
    files.iter().find_map(|path| {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.contains("-asr-") {
            Some(ReportKind::Annual)
        } else if name.contains("-ssr-") || name.contains("-q2r-") {
            Some(ReportKind::HalfYear)
        } else {
            None
        }
    })
}

fn kind_from_tags(found: &HashMap<String, String>) -> Option<ReportKind> {
    if found.contains_key(ANNUAL_MARKER_TAG) {
        Some(ReportKind::Annual)
    } else if found.contains_key(HALF_YEAR_MARKER_TAG) {
        Some(ReportKind::HalfYear)
    } else {
        None
    }
}

// --- Main Extractor ---

pub struct SectionExtractor {
    parsers: Vec<Box<dyn EncodingParser>>,
    config: ExtractorConfig,
}

impl SectionExtractor {
    /// Inline XBRL first, then the instance document.
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_parsers(
            vec![
                Box::new(super::inline::InlineXbrlParser),
                Box::new(super::instance::InstanceDocumentParser),
            ],
            config,
        )
    }

    pub fn with_parsers(parsers: Vec<Box<dyn EncodingParser>>, config: ExtractorConfig) -> Self {
        Self { parsers, config }
    }

    /// Reads the narrative sections from an unpacked package. Never fails:
    /// a missing or unreadable package yields an empty set.
    pub fn extract(&self, package: &FilingPackage) -> SectionSet {
        let Some(root) = package.structured_dir.as_deref() else {
            tracing::info!("No structured package for {}; no sections extracted", package.doc_id);
            return SectionSet::new();
        };

        let mut wanted: Vec<&str> = SectionKey::ALL.iter().map(|k| k.tag()).collect();
        wanted.push(HALF_YEAR_MARKER_TAG);

        for parser in &self.parsers {
            let files = parser.locate_files(root);
            if files.is_empty() {
                tracing::debug!("No {:?} files under {}", parser.encoding(), root.display());
                continue;
            }
            let found = match parser.collect(&files, &wanted) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("{:?} parsing failed for {}: {}", parser.encoding(), package.doc_id, e);
                    continue;
                }
            };

            let kind = kind_from_filenames(&files)
                .or_else(|| kind_from_tags(&found))
                .or(package.report_kind)
                .unwrap_or(ReportKind::Annual);

            let set = self.build_set(&found, kind, parser.encoding());
            if set.is_empty() {
                tracing::debug!("{:?} yielded no sections for {}", parser.encoding(), package.doc_id);
                continue;
            }
            tracing::info!(
                "Extracted {} section(s) from {} via {:?} ({})",
                set.len(),
                package.doc_id,
                parser.encoding(),
                kind.label()
            );
            return set;
        }

        tracing::warn!("No narrative sections found for {}", package.doc_id);
        SectionSet::new()
    }

    fn build_set(&self, found: &HashMap<String, String>, kind: ReportKind, encoding: Encoding) -> SectionSet {
        let mut set = SectionSet { encoding: Some(encoding), report_kind: Some(kind), ..SectionSet::default() };
        for key in SectionKey::ALL {
            let text = key
                .tags_for(kind)
                .into_iter()
                .filter_map(|tag| found.get(tag))
                .map(|raw| normalize_whitespace(raw))
                .find(|text| !text.is_empty());
            if let Some(text) = text {
                set.insert(key, truncate_chars(&text, self.config.max_section_chars));
            }
        }
        set
    }
}
