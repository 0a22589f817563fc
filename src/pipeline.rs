// src/pipeline.rs
//! Locate → retrieve → extract → summarize, one entity at a time.
use crate::config::AppConfig;
use crate::edinet::client::{EdinetClient, FilingArchive};
use crate::edinet::locator::{FilingLocator, LocateMode, LocatorOptions};
use crate::edinet::models::{AcceptedFiling, FiscalYear, SecurityCode};
use crate::edinet::retriever::{FilingPackage, FilingRetriever};
use crate::edinet::schedule::DisclosureHint;
use crate::extractors::section::{SectionExtractor, SectionKey};
use crate::storage::{FileSummaryCache, SummaryStore};
use crate::summarizer::{OllamaClient, Summarizer, SummaryOutcome, TextGenerator, UnavailableReason};
use crate::utils::error::{AppError, EdinetError};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub code: SecurityCode,
    pub fiscal_years: Vec<FiscalYear>,
    pub hints: BTreeMap<FiscalYear, DisclosureHint>,
    /// When false the summarizer is never contacted.
    pub summarize: bool,
}

/// Everything produced for one fiscal year.
#[derive(Debug, Clone, Serialize)]
pub struct FiscalYearReport {
    pub fiscal_year: FiscalYear,
    pub filing: AcceptedFiling,
    pub package: FilingPackage,
    pub sections: Vec<SectionKey>,
    pub summary: SummaryOutcome,
}

pub struct QualitativePipeline {
    locator: FilingLocator,
    retriever: FilingRetriever,
    extractor: SectionExtractor,
    summarizer: Summarizer,
}

impl QualitativePipeline {
    pub fn new(
        locator: FilingLocator,
        retriever: FilingRetriever,
        extractor: SectionExtractor,
        summarizer: Summarizer,
    ) -> Self {
        Self { locator, retriever, extractor, summarizer }
    }

    /// Wires the production components from configuration.
    pub fn from_config(config: &AppConfig, today: NaiveDate, mode: LocateMode) -> Result<Self, AppError> {
        let archive: Arc<dyn FilingArchive> = Arc::new(EdinetClient::new(&config.archive)?);
        let generator: Arc<dyn TextGenerator> = Arc::new(
            OllamaClient::new(&config.summarizer)
                .map_err(|e| AppError::Config(format!("cannot build text-generation client: {}", e)))?,
        );
        let store: Arc<dyn SummaryStore> = Arc::new(FileSummaryCache::new(&config.cache_dir)?);

        Ok(Self::new(
            FilingLocator::new(archive.clone(), LocatorOptions { today, mode }),
            FilingRetriever::new(archive, config.archive.work_dir.clone()),
            SectionExtractor::new(config.extractor.clone()),
            Summarizer::new(generator, store, config.summarizer.clone()),
        ))
    }

    /// Reports ordered most recent year first. Only locator failures abort;
    /// later stages degrade to empty sections or an unavailable summary.
    pub async fn run(&self, request: &PipelineRequest) -> Result<Vec<FiscalYearReport>, EdinetError> {
        let filings = self
            .locator
            .locate(&request.code, &request.fiscal_years, &request.hints)
            .await?;
        if filings.is_empty() {
            tracing::warn!("No filings located for {}", request.code);
        }

        let mut reports = Vec::with_capacity(filings.len());
        for (fiscal_year, filing) in filings.into_iter().rev() {
            tracing::info!("Processing {} for fiscal year {}", filing.doc_id, fiscal_year);
            let package = self.retriever.retrieve(&filing).await;
            let sections = self.extractor.extract(&package);
            let summary = if request.summarize {
                self.summarizer.summarize(&sections, &filing.doc_id).await
            } else {
                SummaryOutcome::Unavailable { reason: UnavailableReason::Disabled }
            };
            reports.push(FiscalYearReport {
                fiscal_year,
                sections: sections.keys(),
                filing,
                package,
                summary,
            });
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractorConfig, SummarizerConfig};
    use crate::edinet::client::DocumentKind;
    use crate::edinet::models::FilingCandidate;
    use crate::summarizer::GenerationRequest;
    use crate::utils::error::SummaryError;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HONBUN: &str = r#"<html><body>
<ix:nonNumeric name="jpcrp_cor:DescriptionOfBusinessTextBlock"><p>当社グループは自動車事業を営んでいます。</p></ix:nonNumeric>
<ix:nonNumeric name="jpcrp_cor:BusinessRisksTextBlock"><p>為替変動リスク。</p></ix:nonNumeric>
</body></html>"#;

    struct FakeArchive {
        filing_day: NaiveDate,
    }

    #[async_trait]
    impl FilingArchive for FakeArchive {
        async fn list_documents(&self, date: NaiveDate) -> Result<Vec<FilingCandidate>, EdinetError> {
            if date != self.filing_day {
                return Ok(Vec::new());
            }
            Ok(vec![FilingCandidate {
                doc_id: Some("S100TR7I".to_string()),
                sec_code: Some("72030".to_string()),
                ordinance_code: Some("010".to_string()),
                doc_type_code: Some("030001".to_string()),
                doc_description: Some("有価証券報告書－第120期".to_string()),
                period_end: Some("2024-03-31".to_string()),
                xbrl_flag: Some("1".to_string()),
                pdf_flag: Some("0".to_string()),
                ..Default::default()
            }])
        }

        async fn download(&self, _: &str, kind: DocumentKind) -> Result<Option<Vec<u8>>, EdinetError> {
            if kind == DocumentKind::Rendering {
                return Ok(None);
            }
            let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
            writer
                .start_file("XBRL/PublicDoc/0101010_honbun_jpcrp030000-asr-001.htm", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(HONBUN.as_bytes()).unwrap();
            Ok(Some(writer.finish().unwrap().into_inner()))
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        fn model(&self) -> &str {
            "fake-model"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn generate(&self, _: &GenerationRequest) -> Result<String, SummaryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("## 事業概要\n- 同社は自動車メーカーです。".to_string())
        }
    }

    fn pipeline(root: &std::path::Path, generator: Arc<CountingGenerator>) -> QualitativePipeline {
        let archive: Arc<dyn FilingArchive> = Arc::new(FakeArchive {
            filing_day: NaiveDate::from_ymd_opt(2024, 6, 18).unwrap(),
        });
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let store = Arc::new(FileSummaryCache::new(root.join("cache")).unwrap());
        QualitativePipeline::new(
            FilingLocator::new(archive.clone(), LocatorOptions { today, mode: LocateMode::FirstMatch }),
            FilingRetriever::new(archive, root.join("reports")),
            SectionExtractor::new(ExtractorConfig::default()),
            Summarizer::new(generator, store, SummarizerConfig::default()),
        )
    }

    fn request(summarize: bool) -> PipelineRequest {
        PipelineRequest {
            code: "7203".parse().unwrap(),
            fiscal_years: vec![2023],
            hints: BTreeMap::from([(
                2023,
                DisclosureHint {
                    disclosure_date: NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
                    period_end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                },
            )]),
            summarize,
        }
    }

    #[tokio::test]
    async fn end_to_end_for_one_year() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(CountingGenerator::default());
        let pipeline = pipeline(dir.path(), generator.clone());

        let reports = pipeline.run(&request(true)).await.unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.fiscal_year, 2023);
        assert_eq!(report.filing.doc_id, "S100TR7I");
        assert!(report.package.rendering.is_none());
        assert_eq!(report.sections, vec![SectionKey::BusinessDescription, SectionKey::BusinessRisks]);
        assert!(matches!(report.summary, SummaryOutcome::Summary { cached: false, .. }));

        let again = pipeline.run(&request(true)).await.unwrap();
        assert!(matches!(again[0].summary, SummaryOutcome::Summary { cached: true, .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_summary_skips_the_generator() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(CountingGenerator::default());
        let reports = pipeline(dir.path(), generator.clone()).run(&request(false)).await.unwrap();

        assert_eq!(
            reports[0].summary,
            SummaryOutcome::Unavailable { reason: UnavailableReason::Disabled }
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
