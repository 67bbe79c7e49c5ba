//! Reply text extraction strategies.
//!
//! A reply region is every element matching the site's reply selector; each
//! match is one message group.

use serde::Deserialize;
use tracing::debug;
use web2api_browser::PageDriver;
use web2api_config::ExtractorKind;

/// Text of a reply region from some group onward.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionSnapshot {
    /// Total number of groups currently in the region.
    pub groups: usize,
    /// Text of groups `from_group..`, joined by a blank line.
    pub text: String,
}

/// In-page helpers shared by the extraction scripts.
const HELPERS: &str = r#"
  const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'SVG']);
  const shallow = (el) => (el.innerText || '').trim();
  const deep = (root) => {
    const parts = [];
    const walk = (node) => {
      if (node.nodeType === Node.TEXT_NODE) { parts.push(node.textContent); return; }
      if (node.nodeType !== Node.ELEMENT_NODE) return;
      if (SKIP.has(node.tagName.toUpperCase())) return;
      for (const child of node.childNodes) walk(child);
    };
    walk(root);
    return parts.join('').replace(/[ \t]+\n/g, '\n').trim();
  };
  const reader = (mode) => (mode === 'deep' ? deep : shallow);
  function regionSnapshot(sel, from, mode) {
    const nodes = Array.from(document.querySelectorAll(sel));
    const read = reader(mode);
    const texts = nodes.slice(from).map(read).filter((t) => t.length > 0);
    return { groups: nodes.length, text: texts.join('\n\n') };
  }
  function lastGroupText(sel, mode) {
    const nodes = document.querySelectorAll(sel);
    if (nodes.length === 0) return null;
    return reader(mode)(nodes[nodes.length - 1]);
  }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shallow,
    Deep,
}

impl Mode {
    fn as_str(self) -> &'static str {
        match self {
            Mode::Shallow => "shallow",
            Mode::Deep => "deep",
        }
    }
}

/// Strategy-selected reader for reply regions.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    kind: ExtractorKind,
}

impl Extractor {
    pub fn new(kind: ExtractorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ExtractorKind {
        self.kind
    }

    fn modes(&self) -> &'static [Mode] {
        match self.kind {
            ExtractorKind::Shallow => &[Mode::Shallow],
            ExtractorKind::Deep => &[Mode::Deep],
            ExtractorKind::Hybrid => &[Mode::Shallow, Mode::Deep],
        }
    }

    /// Snapshot of the region from `from_group` onward; `None` if unreadable.
    pub async fn snapshot(
        &self,
        page: &dyn PageDriver,
        selector: &str,
        from_group: usize,
    ) -> Option<RegionSnapshot> {
        let mut last = None;
        for mode in self.modes() {
            let script = format!(
                "(() => {{{}\n  return regionSnapshot({}, {}, '{}');\n}})()",
                HELPERS,
                js_string(selector),
                from_group,
                mode.as_str()
            );
            let snapshot = match page.evaluate(&script).await {
                Ok(value) => serde_json::from_value::<RegionSnapshot>(value).ok(),
                Err(e) => {
                    debug!("Snapshot of '{}' failed: {}", selector, e);
                    None
                }
            };
            match snapshot {
                Some(s) if !s.text.is_empty() => return Some(s),
                Some(s) => last = Some(s),
                None => {}
            }
        }
        last
    }

    /// Text of the last message group; `None` if absent or unreadable.
    pub async fn extract(&self, page: &dyn PageDriver, selector: &str) -> Option<String> {
        for mode in self.modes() {
            let script = format!(
                "(() => {{{}\n  return lastGroupText({}, '{}');\n}})()",
                HELPERS,
                js_string(selector),
                mode.as_str()
            );
            match page.evaluate(&script).await {
                Ok(value) => {
                    if let Some(text) = value.as_str().filter(|t| !t.is_empty()) {
                        return Some(text.to_string());
                    }
                }
                Err(e) => debug!("Extract of '{}' failed: {}", selector, e),
            }
        }
        None
    }
}

/// Quote a Rust string as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string(r#"div[data-role="reply"]"#), r#""div[data-role=\"reply\"]""#);
    }

    #[tokio::test]
    async fn test_snapshot_reads_region() {
        let page = FakePage::new();
        page.push_snapshot(2, "Hello");

        let extractor = Extractor::new(ExtractorKind::Shallow);
        let snap = extractor.snapshot(&page, ".reply", 1).await.unwrap();
        assert_eq!(snap, RegionSnapshot { groups: 2, text: "Hello".into() });
        assert!(page.scripts().last().unwrap().contains("'shallow'"));
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_to_deep_on_empty() {
        let page = FakePage::new();
        page.push_snapshot(1, "");
        page.push_snapshot(1, "nested text");

        let extractor = Extractor::new(ExtractorKind::Hybrid);
        let snap = extractor.snapshot(&page, ".reply", 0).await.unwrap();
        assert_eq!(snap.text, "nested text");

        let scripts = page.scripts();
        assert!(scripts[0].contains("'shallow'"));
        assert!(scripts[1].contains("'deep'"));
    }

    #[tokio::test]
    async fn test_deep_only_uses_one_pass() {
        let page = FakePage::new();
        page.push_snapshot(1, "");

        let extractor = Extractor::new(ExtractorKind::Deep);
        let snap = extractor.snapshot(&page, ".reply", 0).await.unwrap();
        assert_eq!(snap.text, "");
        assert_eq!(page.scripts().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_failure_is_none() {
        let page = FakePage::new();
        page.push_snapshot_failure();

        let extractor = Extractor::new(ExtractorKind::Shallow);
        assert!(extractor.snapshot(&page, ".reply", 0).await.is_none());
    }

    #[tokio::test]
    async fn test_extract_last_group() {
        let page = FakePage::new();
        page.set_last_group(Some("Final answer"));

        let extractor = Extractor::new(ExtractorKind::Hybrid);
        assert_eq!(
            extractor.extract(&page, ".reply").await.as_deref(),
            Some("Final answer")
        );

        page.set_last_group(None);
        assert!(extractor.extract(&page, ".reply").await.is_none());
    }
}
