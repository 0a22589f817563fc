// src/edinet/retriever.rs
use crate::edinet::client::{DocumentKind, FilingArchive};
use crate::edinet::models::{AcceptedFiling, ReportKind};
use crate::utils::error::EdinetError;
use serde::Serialize;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

/// Local artifacts of one filing. Either path may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingPackage {
    pub doc_id: String,
    /// Downloaded PDF rendering.
    pub rendering: Option<PathBuf>,
    /// Directory the structured ZIP was unpacked into.
    pub structured_dir: Option<PathBuf>,
    /// Report kind recorded by the locator, used as an extraction hint.
    pub report_kind: Option<ReportKind>,
}

impl FilingPackage {
    pub fn empty(doc_id: impl Into<String>) -> Self {
        Self { doc_id: doc_id.into(), rendering: None, structured_dir: None, report_kind: None }
    }
}

/// Unpacks a ZIP payload into `dest`, returning the number of files written.
/// Entries whose names would land outside `dest` are skipped.
pub fn unpack_package(bytes: &[u8], dest: &Path, doc_id: &str) -> Result<usize, EdinetError> {
    let unpack_error = |reason: String| EdinetError::Unpack { doc_id: doc_id.to_string(), reason };

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| unpack_error(e.to_string()))?;
    fs::create_dir_all(dest)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| unpack_error(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe ZIP entry '{}' in {}", entry.name(), doc_id);
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out).map_err(|e| unpack_error(format!("{}: {}", out_path.display(), e)))?;
        written += 1;
    }

    if written == 0 {
        return Err(unpack_error("archive contains no files".to_string()));
    }
    Ok(written)
}

fn is_populated_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Downloads and unpacks filing artifacts into a working directory.
pub struct FilingRetriever {
    archive: Arc<dyn FilingArchive>,
    work_dir: PathBuf,
}

impl FilingRetriever {
    pub fn new(archive: Arc<dyn FilingArchive>, work_dir: impl Into<PathBuf>) -> Self {
        Self { archive, work_dir: work_dir.into() }
    }

    /// Fetches the PDF rendering and the structured package. Each half is
    /// best-effort: failures are logged and leave that path empty.
    pub async fn retrieve(&self, filing: &AcceptedFiling) -> FilingPackage {
        let mut package = FilingPackage::empty(filing.doc_id.clone());
        package.report_kind = Some(filing.report_kind);

        if let Err(e) = fs::create_dir_all(&self.work_dir) {
            tracing::error!("Cannot create work directory {}: {}", self.work_dir.display(), e);
            return package;
        }

        package.rendering = self.fetch_rendering(filing).await;
        package.structured_dir = self.fetch_structured(filing).await;
        package
    }

    async fn fetch_rendering(&self, filing: &AcceptedFiling) -> Option<PathBuf> {
        let path = self.work_dir.join(format!("{}.pdf", filing.doc_id));
        if path.is_file() {
            tracing::debug!("Reusing rendering {}", path.display());
            return Some(path);
        }
        if !filing.has_pdf {
            tracing::debug!("{} has no PDF rendering", filing.doc_id);
            return None;
        }

        match self.archive.download(&filing.doc_id, DocumentKind::Rendering).await {
            Ok(Some(bytes)) => match fs::write(&path, &bytes) {
                Ok(()) => {
                    tracing::info!("Saved rendering to {} ({} bytes)", path.display(), bytes.len());
                    Some(path)
                }
                Err(e) => {
                    tracing::warn!("Failed to write {}: {}", path.display(), e);
                    None
                }
            },
            Ok(None) => {
                tracing::warn!("No PDF rendering available for {}", filing.doc_id);
                None
            }
            Err(e) => {
                tracing::warn!("PDF download failed for {}: {}", filing.doc_id, e);
                None
            }
        }
    }

    async fn fetch_structured(&self, filing: &AcceptedFiling) -> Option<PathBuf> {
        let dir = self.work_dir.join(&filing.doc_id);
        if is_populated_dir(&dir) {
            tracing::debug!("Reusing unpacked package {}", dir.display());
            return Some(dir);
        }
        if !filing.has_xbrl {
            tracing::debug!("{} has no structured package", filing.doc_id);
            return None;
        }

        let bytes = match self.archive.download(&filing.doc_id, DocumentKind::StructuredPackage).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::warn!("No structured package available for {}", filing.doc_id);
                return None;
            }
            Err(e) => {
                tracing::warn!("Structured package download failed for {}: {}", filing.doc_id, e);
                return None;
            }
        };

        match unpack_package(&bytes, &dir, &filing.doc_id) {
            Ok(count) => {
                tracing::info!("Unpacked {} file(s) into {}", count, dir.display());
                Some(dir)
            }
            Err(e) => {
                tracing::error!("{}", e);
                if dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&dir) {
                        tracing::warn!("Could not remove partial directory {}: {}", dir.display(), cleanup);
                    }
                }
                None
            }
        }
    }
}
