//! Scraping of identity-broker login pages.
//!
//! Pages are parsed with html5ever into an `RcDom`. The DOM is not `Send`,
//! so it never outlives [`LoginPage::scrape`]; only plain data leaves this
//! module.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use url::Url;

/// Id of the region listing third-party identity providers.
pub const SOCIAL_PROVIDERS_ID: &str = "kc-social-providers";

/// Id of the username/password form.
pub const LOGIN_FORM_ID: &str = "kc-form-login";

/// A third-party login offered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProvider {
    pub href: Url,
    pub display_text: String,
}

/// Parsed HTML document.
pub struct HtmlDocument {
    dom: RcDom,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        Self { dom }
    }

    fn root(&self) -> &Handle {
        &self.dom.document
    }
}

/// Provider links inside the social providers region, with hrefs resolved
/// against `page_url`. No region or no anchors yields an empty list.
pub fn find_provider_links(document: &HtmlDocument, page_url: &Url) -> Vec<IdentityProvider> {
    let Some(region) = find_by_id(document.root(), SOCIAL_PROVIDERS_ID) else {
        return Vec::new();
    };

    collect_elements(&region, "a")
        .iter()
        .filter_map(|anchor| {
            let href = page_url.join(attribute(anchor, "href")?.trim()).ok()?;
            let display_text = display_text(anchor, &href);
            Some(IdentityProvider { href, display_text })
        })
        .collect()
}

/// The `action` attribute of the login form, as written in the page.
pub fn find_login_form_action(document: &HtmlDocument) -> Option<String> {
    let form = find_by_id(document.root(), LOGIN_FORM_ID)?;
    if element_name(&form).as_deref() != Some("form") {
        return None;
    }
    attribute(&form, "action").filter(|action| !action.trim().is_empty())
}

/// What the login flow needs from one broker page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPage {
    pub url: Url,
    pub providers: Vec<IdentityProvider>,
    /// Login form action resolved against `url`.
    pub form_action: Option<Url>,
}

impl LoginPage {
    pub fn scrape(html: &str, url: &Url) -> Self {
        let document = HtmlDocument::parse(html);
        let providers = find_provider_links(&document, url);
        let form_action = find_login_form_action(&document)
            .and_then(|action| url.join(action.trim()).ok());

        Self {
            url: url.clone(),
            providers,
            form_action,
        }
    }
}

fn display_text(anchor: &Handle, href: &Url) -> String {
    let child_text = anchor
        .children
        .borrow()
        .iter()
        .find(|child| matches!(child.data, NodeData::Element { .. }))
        .map(text_content)
        .filter(|text| !text.is_empty());

    child_text
        .or_else(|| Some(text_content(anchor)).filter(|text| !text.is_empty()))
        .or_else(|| attribute(anchor, "id").filter(|id| !id.is_empty()))
        .or_else(|| href.host_str().map(str::to_string))
        .unwrap_or_else(|| href.to_string())
}

fn element_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

fn attribute(handle: &Handle, attr_name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

/// Pre-order walk over the descendants of a node, `root` excluded.
///
/// Uses an explicit stack so page nesting depth never grows the call stack.
struct Descendants {
    stack: Vec<Handle>,
}

impl Descendants {
    fn of(root: &Handle) -> Self {
        let mut walk = Self { stack: Vec::new() };
        walk.push_children(root);
        walk
    }

    fn push_children(&mut self, handle: &Handle) {
        self.stack.extend(handle.children.borrow().iter().rev().cloned());
    }
}

impl Iterator for Descendants {
    type Item = Handle;

    fn next(&mut self) -> Option<Handle> {
        let handle = self.stack.pop()?;
        self.push_children(&handle);
        Some(handle)
    }
}

fn find_by_id(root: &Handle, id: &str) -> Option<Handle> {
    if attribute(root, "id").as_deref() == Some(id) {
        return Some(root.clone());
    }
    Descendants::of(root).find(|handle| attribute(handle, "id").as_deref() == Some(id))
}

fn collect_elements(root: &Handle, tag: &str) -> Vec<Handle> {
    Descendants::of(root)
        .filter(|handle| element_name(handle).as_deref() == Some(tag))
        .collect()
}

/// Text of all descendant text nodes with whitespace collapsed.
fn text_content(handle: &Handle) -> String {
    let mut words = Vec::new();
    for node in Descendants::of(handle) {
        if let NodeData::Text { contents } = &node.data {
            words.extend(contents.borrow().split_whitespace().map(str::to_string));
        }
    }
    words.join(" ")
}
