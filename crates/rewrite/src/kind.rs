//! Which elements can reference a remote resource.

use std::collections::BTreeMap;

/// How to vendor the resource referenced by one kind of element.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceKind {
    /// Attribute holding the remote URL.
    pub attribute: String,
    /// Extension given to cached files, including the leading dot.
    pub extension: String,
}

impl ResourceKind {
    pub fn new(attribute: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            // The HTML parser lowercases attribute names.
            attribute: attribute.into().to_ascii_lowercase(),
            extension: extension.into(),
        }
    }
}

/// Resource kinds keyed by tag name.
///
/// The default table vendors `<script src>` as `.js` and `<link href>` as
/// `.css`. More kinds can be added without touching the engine:
///
/// ```
/// use vendr_rewrite::{ResourceKind, ResourceKinds};
///
/// let kinds = ResourceKinds::default().with_kind("img", ResourceKind::new("src", ".png"));
/// assert_eq!(kinds.get("img").map(|kind| kind.extension.as_str()), Some(".png"));
/// assert!(kinds.get("script").is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKinds(BTreeMap<String, ResourceKind>);

impl ResourceKinds {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Add a kind, replacing any kind already registered for `tag`.
    pub fn with_kind(mut self, tag: impl AsRef<str>, kind: ResourceKind) -> Self {
        self.0.insert(tag.as_ref().to_ascii_lowercase(), kind);
        self
    }

    pub fn get(&self, tag: &str) -> Option<&ResourceKind> {
        self.0.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceKind)> {
        self.0.iter().map(|(tag, kind)| (tag.as_str(), kind))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ResourceKinds {
    fn default() -> Self {
        Self::empty()
            .with_kind("script", ResourceKind::new("src", ".js"))
            .with_kind("link", ResourceKind::new("href", ".css"))
    }
}

impl<T: AsRef<str>> FromIterator<(T, ResourceKind)> for ResourceKinds {
    fn from_iter<I: IntoIterator<Item = (T, ResourceKind)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |kinds, (tag, kind)| kinds.with_kind(tag, kind))
    }
}
