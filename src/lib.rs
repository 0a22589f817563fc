// src/lib.rs
//! Qualitative digests of Japanese securities reports filed on EDINET.
//!
//! [`pipeline::QualitativePipeline`] chains the stages: the locator finds a
//! filing per fiscal year, the retriever downloads its PDF rendering and
//! structured package, the extractor pulls the narrative sections, and the
//! summarizer condenses them through a local LLM.
pub mod config;
pub mod edinet;
pub mod extractors;
pub mod pipeline;
pub mod storage;
pub mod summarizer;
pub mod utils;
