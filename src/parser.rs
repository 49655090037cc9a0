use chrono::{DateTime, Utc};
use roxmltree::{Document, Node, ParsingOptions};

use crate::datetime::parse_feed_datetime;

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// One normalized record extracted from a feed item, before persistence.
///
/// Invariant: `title` and `link` are non-empty; everything else defaults
/// to its absent/empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub categories: Vec<String>,
}

/// One way of extracting a logical field from an item or entry. Each
/// field resolves through an ordered slice of pulls; the first that
/// yields a value wins.
#[derive(Clone, Copy)]
enum Pull {
    /// Trimmed text of a direct child, matched by local name so both
    /// dialects resolve.
    Text(&'static str),
    /// Like `Text`, but only when the value reads as an absolute URL.
    UrlText(&'static str),
    /// Trimmed text of a namespaced direct child.
    NsText(&'static str, &'static str),
    /// Attribute of a namespaced direct child.
    NsAttr(&'static str, &'static str, &'static str),
    /// `href` attribute of an Atom-style `link` child.
    LinkHref,
    /// `url` of an `enclosure` child whose `type` marks an image.
    ImageEnclosure,
}

const TITLE: &[Pull] = &[Pull::Text("title")];
const LINK: &[Pull] = &[Pull::UrlText("link"), Pull::LinkHref];
const SUMMARY: &[Pull] = &[Pull::Text("description"), Pull::NsText(ATOM_NS, "summary")];
const PUBLISHED: &[Pull] = &[
    Pull::Text("pubDate"),
    Pull::NsText(ATOM_NS, "updated"),
    Pull::NsText(DC_NS, "date"),
];
const IMAGE: &[Pull] = &[
    Pull::NsAttr(MEDIA_NS, "content", "url"),
    Pull::ImageEnclosure,
];

impl Pull {
    fn apply(self, item: Node<'_, '_>) -> Option<String> {
        match self {
            Pull::Text(name) => child_text(item, name),
            Pull::UrlText(name) => child_text(item, name).filter(|t| is_absolute_url(t)),
            Pull::NsText(ns, name) => {
                let child = ns_child(item, ns, name)?;
                non_empty(child.text())
            }
            Pull::NsAttr(ns, name, attr) => {
                let child = ns_child(item, ns, name)?;
                non_empty(child.attribute(attr))
            }
            Pull::LinkHref => item
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "link")
                .find_map(|c| non_empty(c.attribute("href"))),
            Pull::ImageEnclosure => item
                .children()
                .filter(|c| c.is_element() && c.tag_name().name() == "enclosure")
                .find(|c| c.attribute("type").is_some_and(|t| t.starts_with("image")))
                .and_then(|c| non_empty(c.attribute("url"))),
        }
    }
}

fn pull_first(item: Node<'_, '_>, pulls: &[Pull]) -> Option<String> {
    pulls.iter().find_map(|pull| pull.apply(item))
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn child_text(item: Node<'_, '_>, name: &str) -> Option<String> {
    item.children()
        .filter(|c| c.is_element() && c.tag_name().name() == name)
        .find_map(|c| non_empty(c.text()))
}

fn ns_child<'a, 'd>(item: Node<'a, 'd>, ns: &str, name: &str) -> Option<Node<'a, 'd>> {
    item.children()
        .find(|c| c.is_element() && c.has_tag_name((ns, name)))
}

fn is_absolute_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Parse raw feed bytes into normalized entries, in document order.
///
/// Handles RSS 2.0 (`channel`/`item`) and Atom (`entry`) dialects.
/// Malformed XML is not an error: ingestion continues with zero entries
/// for that feed.
pub fn parse_feed(bytes: &[u8]) -> Vec<Entry> {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return Vec::new();
    };
    // Legacy feeds still ship doctype declarations.
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let Ok(doc) = Document::parse_with_options(text, options) else {
        return Vec::new();
    };
    let root = doc.root_element();

    // RSS 2.0 keeps items under <channel>; Atom puts entries at the root.
    let channel = root
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "channel");
    match channel {
        Some(channel) => channel
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "item")
            .filter_map(extract_entry)
            .collect(),
        None => root
            .children()
            .filter(|n| n.is_element() && n.has_tag_name((ATOM_NS, "entry")))
            .filter_map(extract_entry)
            .collect(),
    }
}

fn extract_entry(item: Node<'_, '_>) -> Option<Entry> {
    let title = pull_first(item, TITLE)?;
    let link = pull_first(item, LINK)?;
    let summary = pull_first(item, SUMMARY).unwrap_or_default();
    let published_at = parse_feed_datetime(pull_first(item, PUBLISHED).as_deref());
    let image_url = pull_first(item, IMAGE);
    let categories = item
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "category")
        .filter_map(|c| non_empty(c.text()))
        .collect();

    Some(Entry {
        title,
        link,
        summary,
        published_at,
        image_url,
        categories,
    })
}
