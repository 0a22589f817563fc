// src/extractors/inline.rs
//! Inline XBRL: sections are `ix:nonNumeric` blocks inside the XHTML body.

use super::section::{collect_files, element_text, has_extension, read_file, Encoding, EncodingParser};
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// The HTML parser keeps the `ix:` prefix in the (lowercased) element name,
// so namespaced selectors can't be used; filter on the name instead.
static NAMED_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[name]").expect("Failed to compile NAMED_SELECTOR"));

static ID_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[id]").expect("Failed to compile ID_SELECTOR"));

const PUBLIC_DOC_DIR: &str = "PublicDoc";

pub struct InlineXbrlParser;

fn is_ix_element(element: &ElementRef, suffix: &str) -> bool {
    element.value().name().ends_with(suffix)
}

fn local_part(qualified: &str) -> &str {
    qualified.rsplit(':').next().unwrap_or(qualified)
}

/// Text of a fact, following its `continuedAt` chain.
fn fact_text(fact: ElementRef, continuations: &HashMap<&str, ElementRef>) -> String {
    let mut text = element_text(fact);
    let mut visited = HashSet::new();
    let mut next = fact.value().attr("continuedat");
    while let Some(id) = next {
        if !visited.insert(id) {
            break;
        }
        let Some(continuation) = continuations.get(id) else {
            tracing::debug!("Missing ix:continuation '{}'", id);
            break;
        };
        text.push('\n');
        text.push_str(&element_text(*continuation));
        next = continuation.value().attr("continuedat");
    }
    text
}

impl EncodingParser for InlineXbrlParser {
    fn encoding(&self) -> Encoding {
        Encoding::InlineXbrl
    }

    fn locate_files(&self, root: &Path) -> Vec<PathBuf> {
        let html_files = collect_files(root, &|p| has_extension(p, &["htm", "html", "xhtml"]));
        let public: Vec<PathBuf> = html_files
            .iter()
            .filter(|p| p.components().any(|c| c.as_os_str() == PUBLIC_DOC_DIR))
            .cloned()
            .collect();
        if public.is_empty() {
            html_files
        } else {
            public
        }
    }

    fn collect(
        &self,
        files: &[PathBuf],
        wanted: &[&str],
    ) -> Result<HashMap<String, String>, ExtractError> {
        let mut found: HashMap<String, String> = HashMap::new();

        for path in files {
            let content = read_file(path)?;
            let document = Html::parse_document(&content);

            let continuations: HashMap<&str, ElementRef> = document
                .select(&ID_SELECTOR)
                .filter(|el| is_ix_element(el, "continuation"))
                .filter_map(|el| el.value().attr("id").map(|id| (id, el)))
                .collect();

            let mut hits = 0;
            for fact in document.select(&NAMED_SELECTOR) {
                if !is_ix_element(&fact, "nonnumeric") {
                    continue;
                }
                let Some(name) = fact.value().attr("name") else { continue };
                let tag = local_part(name);
                if !wanted.contains(&tag) || found.contains_key(tag) {
                    continue;
                }
                let text = fact_text(fact, &continuations);
                if !text.trim().is_empty() {
                    found.insert(tag.to_string(), text);
                    hits += 1;
                }
            }
            tracing::debug!("{}: {} inline section(s)", path.display(), hits);
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn follows_continuation_chain() {
        let doc = r#"<html><body>
<ix:nonNumeric name="jpcrp_cor:BusinessRisksTextBlock" continuedAt="c1"><p>前半</p></ix:nonNumeric>
<div><ix:continuation id="c1" continuedAt="c2"><p>中盤</p></ix:continuation></div>
<div><ix:continuation id="c2"><p>後半</p></ix:continuation></div>
</body></html>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("honbun.htm");
        fs::write(&path, doc).unwrap();

        let found = InlineXbrlParser.collect(&[path], &["BusinessRisksTextBlock"]).unwrap();
        let text = found.get("BusinessRisksTextBlock").unwrap();
        let order: Vec<usize> = ["前半", "中盤", "後半"].iter().map(|s| text.find(s).unwrap()).collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn prefers_public_doc_files() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["XBRL/PublicDoc/a.htm", "XBRL/Attachment/b.htm", "XBRL/PublicDoc/c.xbrl"] {
            let p = dir.path().join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, "<html/>").unwrap();
        }
        let files = InlineXbrlParser.locate_files(dir.path());
        assert_eq!(files, vec![dir.path().join("XBRL/PublicDoc/a.htm")]);
    }

    #[test]
    fn ignores_unwanted_and_numeric_facts() {
        let doc = r#"<html><body>
<ix:nonFraction name="jpcrp_cor:BusinessRisksTextBlock">1</ix:nonFraction>
<ix:nonNumeric name="jpcrp_cor:CompanyNameCoverPage">トヨタ</ix:nonNumeric>
</body></html>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("honbun.htm");
        fs::write(&path, doc).unwrap();
        let found = InlineXbrlParser.collect(&[path], &["BusinessRisksTextBlock"]).unwrap();
        assert!(found.is_empty());
    }
}
