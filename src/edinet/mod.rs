// src/edinet/mod.rs
pub mod client;
pub mod gateway;
pub mod locator;
pub mod models;
pub mod retriever;
pub mod schedule;

// Re-export key archive types for convenience
pub use client::{DocumentKind, EdinetClient, FilingArchive};
pub use locator::{FilingLocator, LocateMode, LocatorOptions};
pub use models::{AcceptedFiling, FilingCandidate, FiscalYear, ReportKind, SecurityCode};
pub use retriever::{FilingPackage, FilingRetriever};
pub use schedule::{DisclosureHint, SearchSchedule};
