// src/extractors/instance.rs
//! Standalone XBRL instance: sections are facts whose content is escaped HTML.

use super::section::{collect_files, fragment_text, has_extension, read_file, Encoding, EncodingParser};
use crate::utils::error::ExtractError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// Linkbase and schema companions that never carry facts.
const LINKBASE_SUFFIXES: [&str; 6] = ["_lab", "_lab-en", "_pre", "_cal", "_def", "_gla"];

pub struct InstanceDocumentParser;

fn is_linkbase(path: &Path) -> bool {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    LINKBASE_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix)) || stem.starts_with("manifest")
}

fn node_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

impl EncodingParser for InstanceDocumentParser {
    fn encoding(&self) -> Encoding {
        Encoding::InstanceDocument
    }

    /// `.xbrl` instances; other `.xml` files only when there is none.
    fn locate_files(&self, root: &Path) -> Vec<PathBuf> {
        let instances = collect_files(root, &|p| has_extension(p, &["xbrl"]));
        if !instances.is_empty() {
            return instances;
        }
        collect_files(root, &|p| has_extension(p, &["xml"]) && !is_linkbase(p))
    }

    fn collect(
        &self,
        files: &[PathBuf],
        wanted: &[&str],
    ) -> Result<HashMap<String, String>, ExtractError> {
        let mut found: HashMap<String, String> = HashMap::new();

        for path in files {
            let content = read_file(path)?;
            let document = roxmltree::Document::parse(&content).map_err(|e| ExtractError::Xml {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

            for node in document.descendants().filter(|n| n.is_element()) {
                let tag = node.tag_name().name();
                if !wanted.contains(&tag) || found.contains_key(tag) {
                    continue;
                }
                let raw = node_text(node);
                let text = if raw.contains('<') { fragment_text(&raw) } else { raw };
                if !text.trim().is_empty() {
                    found.insert(tag.to_string(), text);
                }
            }
        }

        tracing::debug!("Instance documents yielded {} section(s)", found.len());
        Ok(found)
    }
}
