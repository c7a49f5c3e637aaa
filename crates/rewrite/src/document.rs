//! Parsed HTML documents that can have attributes rewritten in place.

use scraper::html::Select;
use scraper::{Html, Node, Selector};
use tendril::StrTendril;

/// A new value for one attribute of one element.
///
/// Elements are addressed by their position among the elements matching the
/// selector the edit is applied with, so the same selector must be used to
/// find them and to edit them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub position: usize,
    pub attribute: String,
    pub value: String,
}

#[derive(Debug)]
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// Elements matching `selector`, in document order.
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }

    /// Apply `edits` and return how many of them changed the document.
    ///
    /// Edits addressing an element that doesn't exist, or an attribute the
    /// element doesn't carry, are skipped. Attributes are never added.
    pub fn apply(&mut self, selector: &Selector, edits: &[Edit]) -> usize {
        let ids: Vec<_> = self.html.select(selector).map(|element| element.id()).collect();
        let mut applied = 0;
        for edit in edits {
            let Some(mut node) = ids.get(edit.position).and_then(|id| self.html.tree.get_mut(*id)) else {
                continue;
            };
            let Node::Element(element) = node.value() else {
                continue;
            };
            let Some((_, value)) = element.attrs.iter_mut().find(|(name, _)| &*name.local == edit.attribute) else {
                continue;
            };
            if **value != *edit.value {
                *value = StrTendril::from(edit.value.as_str());
                applied += 1;
            }
        }
        applied
    }

    pub fn serialize(&self) -> String {
        self.html.html()
    }
}
