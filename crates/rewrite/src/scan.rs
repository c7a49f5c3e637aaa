//! Finding remote references in a document.

use crate::document::Document;
use crate::error::{ErrorKind, Result};
use crate::kind::ResourceKinds;
use scraper::Selector;
use url::Url;

/// A remote resource referenced from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Position among the elements matching [`Scanner::selector`].
    pub position: usize,
    pub tag: String,
    pub url: String,
    /// Attribute the URL was read from.
    pub attribute: String,
    /// Extension of the cached file.
    pub extension: String,
}

/// Finds elements that opted in to vendoring with the match attribute.
#[derive(Debug)]
pub struct Scanner {
    kinds: ResourceKinds,
    selector: Selector,
}

impl Scanner {
    /// Build a scanner for `kinds`, only matching elements carrying
    /// `match_attribute`.
    ///
    /// ```
    /// use vendr_rewrite::{Document, ResourceKinds, Scanner};
    ///
    /// let scanner = Scanner::new(ResourceKinds::default(), "data-remote-script").unwrap();
    /// let document = Document::parse(r#"<script data-remote-script src="https://cdn.example.com/a.js"></script>"#);
    /// let references = scanner.scan(&document);
    /// assert_eq!(references.len(), 1);
    /// assert_eq!(references[0].url, "https://cdn.example.com/a.js");
    /// ```
    pub fn new(kinds: ResourceKinds, match_attribute: &str) -> Result<Self> {
        if kinds.is_empty() {
            exn::bail!(ErrorKind::Selector("no resource kinds configured".to_string()));
        }
        if match_attribute.is_empty() {
            exn::bail!(ErrorKind::Selector("match attribute is empty".to_string()));
        }
        let css = kinds.iter().map(|(tag, _)| format!("{tag}[{match_attribute}]")).collect::<Vec<_>>().join(", ");
        let selector = Selector::parse(&css).map_err(|e| ErrorKind::Selector(format!("{css}: {e}")))?;
        Ok(Self { kinds, selector })
    }

    /// Selector matching every candidate element, remote or not.
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Remote references in document order.
    ///
    /// Candidates without the kind's attribute, or whose value isn't an
    /// absolute `http`/`https` URL, are skipped.
    pub fn scan(&self, document: &Document) -> Vec<Reference> {
        document
            .select(&self.selector)
            .enumerate()
            .filter_map(|(position, element)| {
                let tag = element.value().name();
                let kind = self.kinds.get(tag)?;
                let url = element.value().attr(&kind.attribute)?;
                if !is_remote(url) {
                    tracing::trace!(tag, url, "Skipping non-remote reference");
                    return None;
                }
                Some(Reference {
                    position,
                    tag: tag.to_string(),
                    url: url.to_string(),
                    attribute: kind.attribute.clone(),
                    extension: kind.extension.clone(),
                })
            })
            .collect()
    }
}

/// Whether `candidate` is an absolute `http` or `https` URL.
pub fn is_remote(candidate: &str) -> bool {
    Url::parse(candidate).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ResourceKind;
    use rstest::rstest;

    fn scanner() -> Scanner {
        Scanner::new(ResourceKinds::default(), "data-remote-script").unwrap()
    }

    #[rstest]
    #[case("https://cdn.example.com/a.js", true)]
    #[case("http://cdn.example.com/a.css?v=1", true)]
    #[case("HTTPS://CDN.EXAMPLE.COM/A.JS", true)]
    #[case("//cdn.example.com/a.js", false)]
    #[case("/assets/a.js", false)]
    #[case("./a.js", false)]
    #[case("data:text/javascript,alert(1)", false)]
    #[case("ftp://example.com/a.js", false)]
    #[case("file:///tmp/a.js", false)]
    #[case("https://", false)]
    #[case("", false)]
    fn test_is_remote(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(is_remote(candidate), expected);
    }

    #[test]
    fn test_scan_in_document_order() {
        let document = Document::parse(
            r#"<html><head>
            <link data-remote-script rel="stylesheet" href="https://cdn.example.com/a.css">
            <script data-remote-script src="https://cdn.example.com/a.js"></script>
            </head></html>"#,
        );
        let references = scanner().scan(&document);
        assert_eq!(
            references,
            vec![
                Reference {
                    position: 0,
                    tag: "link".to_string(),
                    url: "https://cdn.example.com/a.css".to_string(),
                    attribute: "href".to_string(),
                    extension: ".css".to_string(),
                },
                Reference {
                    position: 1,
                    tag: "script".to_string(),
                    url: "https://cdn.example.com/a.js".to_string(),
                    attribute: "src".to_string(),
                    extension: ".js".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_scan_skips_ineligible_elements() {
        let document = Document::parse(
            r#"<html><head>
            <script src="https://cdn.example.com/not-opted-in.js"></script>
            <script data-remote-script>inline()</script>
            <script data-remote-script src="/local.js"></script>
            <link data-remote-script href="data:text/css,body{}">
            <script data-remote-script src="https://cdn.example.com/kept.js"></script>
            </head></html>"#,
        );
        let references = scanner().scan(&document);
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].url, "https://cdn.example.com/kept.js");
        // Positions count every candidate, not just remote ones.
        assert_eq!(references[0].position, 3);
    }

    #[test]
    fn test_scan_custom_kind_and_attribute() {
        let kinds = ResourceKinds::empty().with_kind("img", ResourceKind::new("src", ".png"));
        let scanner = Scanner::new(kinds, "data-vendor").unwrap();
        let document = Document::parse(
            r#"<img data-vendor src="https://cdn.example.com/logo.png">
            <script data-vendor src="https://cdn.example.com/a.js"></script>"#,
        );
        let references = scanner.scan(&document);
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].extension, ".png");
    }

    #[rstest]
    #[case(ResourceKinds::empty(), "data-remote-script")]
    #[case(ResourceKinds::default(), "")]
    #[case(ResourceKinds::default(), "data remote")]
    fn test_invalid_scanner(#[case] kinds: ResourceKinds, #[case] match_attribute: &str) {
        let err = Scanner::new(kinds, match_attribute).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Selector(_)));
    }
}
