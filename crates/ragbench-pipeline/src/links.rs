//! Dense renumbering of inline reference markers (`[n]`) across a batch of
//! documents presented together.
//!
//! The union of the batch's link maps, in document order, assigns every
//! referenced number a zero-based index by first appearance. Markers whose
//! number is in the union are rewritten to that index; the rest are stripped
//! together with the link description in front of them.

use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use ragbench_core::error::{Error, Result};
use ragbench_core::ports::Ports;
use ragbench_core::traits::Stage;
use ragbench_core::types::{Document, LinkMap};

/// Collapsible-section labels left behind by the crawler.
pub const DEFAULT_BOILERPLATE: [&str; 4] = ["Inhalt ausklappen", "Inhalt einklappen", "Alle Elemente ausklappen", "Alle Elemente einklappen"];

pub struct ContentLinkNormalizer {
    boilerplate: Vec<String>,
    marker: Regex,
    placeholder: Regex,
}

impl ContentLinkNormalizer {
    pub fn new() -> Result<Self> { Self::with_boilerplate(DEFAULT_BOILERPLATE) }

    pub fn with_boilerplate<I, S>(phrases: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            boilerplate: phrases.into_iter().map(Into::into).collect(),
            marker: compile(r"\[(\d+)\]")?,
            placeholder: compile(r"\[_(\d+)\]")?,
        })
    }

    pub fn normalize(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        let global = global_links(&documents);
        debug!(documents = documents.len(), links = global.len(), "normalizing links");
        documents.into_iter().map(|doc| self.rewrite(doc, &global)).collect()
    }

    fn rewrite(&self, mut doc: Document, global: &LinkMap) -> Result<Document> {
        let original = std::mem::take(&mut doc.content);
        let mut content = original.clone();
        let mut links = LinkMap::new();

        for caps in self.marker.captures_iter(&original) {
            let marker = &caps[0];
            let known = caps[1].parse::<u32>().ok().and_then(|n| global.get_full(&n));
            match known {
                Some((index, _, url)) => {
                    // Wrapped so a rewritten number is never taken for a later original one.
                    content = content.replace(marker, &format!("[_{index}]"));
                    links.insert(index as u32, url.clone());
                }
                None => content = clean_unlinked_references(&content, marker)?,
            }
        }

        for phrase in &self.boilerplate {
            content = content.replace(phrase.as_str(), "");
        }
        doc.content = self.placeholder.replace_all(&content, "[$1]").into_owned();
        links.sort_keys();
        doc.meta.links = links;
        Ok(doc)
    }
}

/// Union of the batch's link maps. A later URL for a known number replaces
/// the earlier one but keeps its position.
fn global_links(documents: &[Document]) -> LinkMap {
    let mut global = IndexMap::new();
    for doc in documents {
        for (number, url) in &doc.meta.links {
            global.insert(*number, url.clone());
        }
    }
    global
}

/// Remove `marker` along with the `![]` or `[text]` fragment that describes
/// it, then any bare occurrence that is left.
pub fn clean_unlinked_references(content: &str, marker: &str) -> Result<String> {
    let described = compile(&format!(r"(?:!\[\]|\[[^\[\]]+\]){}", regex::escape(marker)))?;
    Ok(described.replace_all(content, "").replace(marker, ""))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Operation(format!("invalid pattern {pattern}: {e}")))
}

impl Stage for ContentLinkNormalizer {
    fn run(&self, mut inputs: Ports) -> Result<Ports> {
        let documents = inputs.take_documents("documents")?.unwrap_or_default();
        Ok(Ports::new().with("documents", self.normalize(documents)?))
    }
}
