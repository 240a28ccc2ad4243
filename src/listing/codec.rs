//! listing::codec
//!
//! Extract, render, merge, insert into, and remove from the list region
//! of an HTML document.
//!
//! The codec works on text, not on a DOM. It locates the container by its
//! `id` marker and the entries inside it by their tag, and rewrites only
//! the bytes between the container's opening and closing tags. Everything
//! outside the region is emitted byte for byte.
//!
//! # Example
//!
//! ```
//! use std::collections::HashSet;
//! use logshelf::listing::{ListCodec, ListMarkers};
//!
//! let codec = ListCodec::new(ListMarkers::default()).unwrap();
//! let doc = r#"<ul id="log-list"><li data-path="a">A</li><li data-path="b">B</li></ul>"#;
//!
//! let merged = codec
//!     .merge(doc, &["b".to_string(), "a".to_string()], &HashSet::new())
//!     .unwrap();
//! let order: Vec<_> = codec
//!     .extract(&merged)
//!     .unwrap()
//!     .into_iter()
//!     .map(|e| e.identifier)
//!     .collect();
//! assert_eq!(order, ["b", "a"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use super::entry::{unescape_html, Entry};
use super::markers::ListMarkers;

/// Errors from list region operations.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("list region '{region_id}' not found in document")]
    RegionNotFound { region_id: String },

    #[error("invalid list markers: {0}")]
    InvalidMarkers(String),

    #[error("invalid markup pattern: {0}")]
    InvalidPattern(String),
}

/// The located list region of a document.
struct Region<'d> {
    open: &'d str,
    inner: &'d str,
    close: &'d str,
    span: Range<usize>,
}

/// One child element of the region.
struct Fragment<'d> {
    identifier: Option<String>,
    created_at: Option<DateTime<Utc>>,
    body: &'d str,
    markup: &'d str,
}

/// Text codec for the list region, built from a set of [`ListMarkers`].
#[derive(Debug, Clone)]
pub struct ListCodec {
    markers: ListMarkers,
    region: Regex,
    entry: Regex,
    identifier: Regex,
    date: Regex,
    link: Regex,
    scenario: Regex,
    tags: Regex,
    body_close: Regex,
}

impl ListCodec {
    /// Compile the patterns for `markers`.
    pub fn new(markers: ListMarkers) -> Result<Self, CodecError> {
        let container = regex::escape(&markers.container_tag);
        let entry = regex::escape(&markers.entry_tag);
        let region_id = regex::escape(&markers.region_id);

        let region = compile(&format!(
            r#"(?is)(<{container}\b[^>]*?\sid\s*=\s*["']{region_id}["'][^>]*>)(.*?)(</{container}\s*>)"#
        ))?;
        let entry_re = compile(&format!(r"(?is)(<{entry}\b[^>]*>)(.*?)</{entry}\s*>"))?;
        let identifier = attribute_pattern(&markers.entry_attr)?;
        let date = attribute_pattern(&markers.date_attr)?;

        Ok(Self {
            region,
            entry: entry_re,
            identifier,
            date,
            link: compile(r"(?is)<a\b[^>]*>(.*?)</a\s*>")?,
            scenario: compile(
                r#"(?is)<span\b[^>]*\sclass\s*=\s*["'][^"']*\btext-muted\b[^"']*["'][^>]*>(.*?)</span\s*>"#,
            )?,
            tags: compile(r"(?s)<[^>]*>")?,
            body_close: compile(r"(?i)</body\s*>")?,
            markers,
        })
    }

    /// The markers this codec was built from.
    pub fn markers(&self) -> &ListMarkers {
        &self.markers
    }

    /// Whether the document contains the list region.
    pub fn has_region(&self, document: &str) -> bool {
        self.region.is_match(document)
    }

    /// Entries of the region in document order.
    ///
    /// Children without an identifier are skipped. When an identifier
    /// repeats, the first occurrence wins.
    pub fn extract(&self, document: &str) -> Result<Vec<Entry>, CodecError> {
        let region = self.locate(document)?;
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for fragment in self.fragments(region.inner) {
            let Some(identifier) = fragment.identifier.clone() else {
                continue;
            };
            if !seen.insert(identifier.clone()) {
                continue;
            }
            entries.push(self.entry_from(identifier, &fragment));
        }

        Ok(entries)
    }

    /// Concatenate the markup of `entries` in order.
    pub fn render(&self, entries: &[Entry]) -> String {
        entries
            .iter()
            .map(|e| e.raw_markup.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rebuild the region to follow `order`, dropping `deletions`.
    ///
    /// Identifiers in `order` that have no entry get a stub fragment.
    /// Entries not named in `order` are dropped, as are children without
    /// an identifier. Text outside the region is unchanged.
    pub fn merge(
        &self,
        document: &str,
        order: &[String],
        deletions: &HashSet<String>,
    ) -> Result<String, CodecError> {
        let region = self.locate(document)?;

        let mut existing: HashMap<String, &str> = HashMap::new();
        for fragment in self.fragments(region.inner) {
            if let Some(identifier) = fragment.identifier {
                existing.entry(identifier).or_insert(fragment.markup);
            }
        }

        let mut seen = HashSet::new();
        let mut items: Vec<String> = Vec::with_capacity(order.len());
        for identifier in order {
            if deletions.contains(identifier) || !seen.insert(identifier.as_str()) {
                continue;
            }
            match existing.get(identifier) {
                Some(markup) => items.push((*markup).to_string()),
                None => items.push(Entry::stub(identifier, &self.markers).raw_markup),
            }
        }

        Ok(splice(document, &region, &items))
    }

    /// Add `entry`, replacing any entry with the same identifier.
    ///
    /// Identified entries end up sorted by creation time, newest first,
    /// with undated entries last in their original order. Children
    /// without an identifier are kept after them. If the document has no
    /// region, one is created before `</body>` (or at the end).
    pub fn insert(&self, document: &str, entry: &Entry) -> String {
        let Ok(region) = self.locate(document) else {
            return self.insert_region(document, entry);
        };

        let fragments = self.fragments(region.inner);
        let mut dated: Vec<(Option<DateTime<Utc>>, String)> = vec![(
            entry.created_at,
            entry.raw_markup.clone(),
        )];
        let mut unidentified = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(entry.identifier.as_str());

        for fragment in &fragments {
            match &fragment.identifier {
                Some(identifier) => {
                    if seen.insert(identifier.as_str()) {
                        dated.push((fragment.created_at, fragment.markup.to_string()));
                    }
                }
                None => unidentified.push(fragment.markup.to_string()),
            }
        }

        // Stable: equal timestamps keep insertion order, new entry first
        dated.sort_by(|a, b| b.0.cmp(&a.0));

        let items: Vec<String> = dated
            .into_iter()
            .map(|(_, markup)| markup)
            .chain(unidentified)
            .collect();
        splice(document, &region, &items)
    }

    /// Remove the entry for `identifier`.
    ///
    /// Returns `Ok(None)` when the region has no such entry.
    pub fn remove(&self, document: &str, identifier: &str) -> Result<Option<String>, CodecError> {
        let region = self.locate(document)?;
        let fragments = self.fragments(region.inner);

        if !fragments
            .iter()
            .any(|f| f.identifier.as_deref() == Some(identifier))
        {
            return Ok(None);
        }

        let items: Vec<String> = fragments
            .iter()
            .filter(|f| f.identifier.as_deref() != Some(identifier))
            .map(|f| f.markup.to_string())
            .collect();
        Ok(Some(splice(document, &region, &items)))
    }

    fn locate<'d>(&self, document: &'d str) -> Result<Region<'d>, CodecError> {
        let not_found = || CodecError::RegionNotFound {
            region_id: self.markers.region_id.clone(),
        };
        let caps = self.region.captures(document).ok_or_else(not_found)?;
        match (caps.get(0), caps.get(1), caps.get(2), caps.get(3)) {
            (Some(whole), Some(open), Some(inner), Some(close)) => Ok(Region {
                open: open.as_str(),
                inner: inner.as_str(),
                close: close.as_str(),
                span: whole.range(),
            }),
            _ => Err(not_found()),
        }
    }

    fn fragments<'d>(&self, inner: &'d str) -> Vec<Fragment<'d>> {
        self.entry
            .captures_iter(inner)
            .filter_map(|caps| {
                let markup = caps.get(0)?.as_str();
                let open_tag = caps.get(1)?.as_str();
                let body = caps.get(2)?.as_str();
                Some(Fragment {
                    identifier: attribute(&self.identifier, open_tag),
                    created_at: attribute(&self.date, open_tag)
                        .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
                        .map(|d| d.with_timezone(&Utc)),
                    body,
                    markup,
                })
            })
            .collect()
    }

    fn entry_from(&self, identifier: String, fragment: &Fragment<'_>) -> Entry {
        let display_label = self
            .link
            .captures(fragment.body)
            .and_then(|c| c.get(1))
            .map(|m| self.text_of(m.as_str()))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.text_of(fragment.body));
        let scenario_label = self
            .scenario
            .captures(fragment.body)
            .and_then(|c| c.get(1))
            .map(|m| self.text_of(m.as_str()))
            .unwrap_or_default();

        Entry {
            identifier,
            display_label,
            scenario_label,
            created_at: fragment.created_at,
            raw_markup: fragment.markup.to_string(),
        }
    }

    fn text_of(&self, markup: &str) -> String {
        unescape_html(self.tags.replace_all(markup, "").trim())
    }

    fn insert_region(&self, document: &str, entry: &Entry) -> String {
        let container = format!(
            "{}\n{}\n{}\n",
            self.markers.container_open(),
            entry.raw_markup,
            self.markers.container_close()
        );

        match self.body_close.find_iter(document).last() {
            Some(m) => {
                let mut out = String::with_capacity(document.len() + container.len());
                out.push_str(&document[..m.start()]);
                out.push_str(&container);
                out.push_str(&document[m.start()..]);
                out
            }
            None => {
                let mut out = document.to_string();
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&container);
                out
            }
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, CodecError> {
    Regex::new(pattern).map_err(|e| CodecError::InvalidMarkers(e.to_string()))
}

fn attribute_pattern(name: &str) -> Result<Regex, CodecError> {
    compile(&format!(
        r#"(?i)\s{}\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
        regex::escape(name)
    ))
}

fn attribute(pattern: &Regex, open_tag: &str) -> Option<String> {
    let caps = pattern.captures(open_tag)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| unescape_html(m.as_str()))
}

/// Replace the region's children with `items`.
fn splice(document: &str, region: &Region<'_>, items: &[String]) -> String {
    let mut out = String::with_capacity(document.len());
    out.push_str(&document[..region.span.start]);
    out.push_str(region.open);
    out.push('\n');
    for item in items {
        out.push_str(item);
        out.push('\n');
    }
    out.push_str(region.close);
    out.push_str(&document[region.span.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ContentPath;
    use chrono::TimeZone;

    const DOC: &str = r#"<html><head><title>Logs</title></head>
<body>
<h1>Logs</h1>
<ul id="log-list" class="list-group">
  <li data-path="a.html" data-date="2024-01-01T00:00:00.000Z"><a href="a.html">A</a></li>
  <li data-path="b.html"><span class="text-muted">Crypt</span><a href="b.html">B</a></li>
  <li data-path="c.html">C</li>
</ul>
<footer>bye</footer>
</body></html>"#;

    fn codec() -> ListCodec {
        ListCodec::new(ListMarkers::default()).unwrap()
    }

    fn ids(codec: &ListCodec, doc: &str) -> Vec<String> {
        codec
            .extract(doc)
            .unwrap()
            .into_iter()
            .map(|e| e.identifier)
            .collect()
    }

    fn order(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn outside(doc: &str) -> (String, String) {
        let start = doc.find("<ul").unwrap();
        let end = doc.rfind("</ul>").unwrap() + "</ul>".len();
        (doc[..start].to_string(), doc[end..].to_string())
    }

    #[test]
    fn extract_reads_fields() {
        let codec = codec();
        let entries = codec.extract(DOC).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].identifier, "a.html");
        assert_eq!(entries[0].display_label, "A");
        assert_eq!(
            entries[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(entries[1].scenario_label, "Crypt");
        assert_eq!(entries[1].display_label, "B");
        assert_eq!(entries[2].display_label, "C");
        assert_eq!(entries[2].created_at, None);
    }

    #[test]
    fn extract_first_duplicate_wins() {
        let doc = r#"<ul id="log-list"><li data-path="x">first</li><li data-path="x">second</li></ul>"#;
        let entries = codec().extract(doc).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].display_label, "first");
    }

    #[test]
    fn extract_skips_unidentified_children() {
        let doc = r#"<ul id="log-list"><li>note</li><li data-path="x">X</li></ul>"#;
        assert_eq!(ids(&codec(), doc), ["x"]);
    }

    #[test]
    fn extract_without_region_fails() {
        assert!(matches!(
            codec().extract("<html><body></body></html>"),
            Err(CodecError::RegionNotFound { .. })
        ));
    }

    #[test]
    fn region_id_must_match_exactly() {
        let doc = r#"<ul data-id="log-list"><li data-path="x">X</li></ul>"#;
        assert!(!codec().has_region(doc));
        let doc = r#"<ul class="a" id='log-list'><li data-path="x">X</li></ul>"#;
        assert!(codec().has_region(doc));
    }

    #[test]
    fn merge_reorders_and_preserves_outside() {
        let codec = codec();
        let merged = codec
            .merge(DOC, &order(&["c.html", "a.html", "b.html"]), &HashSet::new())
            .unwrap();
        assert_eq!(ids(&codec, &merged), ["c.html", "a.html", "b.html"]);
        assert_eq!(outside(&merged), outside(DOC));
    }

    #[test]
    fn merge_drops_deletions_and_unlisted() {
        let codec = codec();
        let deletions: HashSet<String> = ["b.html".to_string()].into();
        let merged = codec
            .merge(DOC, &order(&["b.html", "a.html"]), &deletions)
            .unwrap();
        assert_eq!(ids(&codec, &merged), ["a.html"]);
    }

    #[test]
    fn merge_stubs_unknown_identifiers() {
        let codec = codec();
        let merged = codec
            .merge(DOC, &order(&["new.html", "a.html"]), &HashSet::new())
            .unwrap();
        assert!(merged.contains(r#"<li data-path="new.html">new.html</li>"#));
        assert_eq!(ids(&codec, &merged), ["new.html", "a.html"]);
    }

    #[test]
    fn merge_keeps_markup_verbatim() {
        let codec = codec();
        let merged = codec
            .merge(DOC, &order(&["b.html"]), &HashSet::new())
            .unwrap();
        assert!(merged.contains(
            r#"<li data-path="b.html"><span class="text-muted">Crypt</span><a href="b.html">B</a></li>"#
        ));
    }

    #[test]
    fn merge_ignores_repeated_order_identifiers() {
        let codec = codec();
        let merged = codec
            .merge(DOC, &order(&["a.html", "a.html"]), &HashSet::new())
            .unwrap();
        assert_eq!(merged.matches(r#"data-path="a.html""#).count(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let codec = codec();
        let wanted = order(&["b.html", "c.html"]);
        let once = codec.merge(DOC, &wanted, &HashSet::new()).unwrap();
        let twice = codec.merge(&once, &wanted, &HashSet::new()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn insert_orders_by_date() {
        let codec = codec();
        let path = ContentPath::new("log/new.html").unwrap();
        let entry = Entry::for_log(
            &path,
            "log/new.html",
            "New",
            "",
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            codec.markers(),
        );
        let doc = codec.insert(DOC, &entry);
        assert_eq!(
            ids(&codec, &doc),
            ["log/new.html", "a.html", "b.html", "c.html"]
        );
        assert_eq!(outside(&doc), outside(DOC));
    }

    #[test]
    fn insert_replaces_same_identifier() {
        let codec = codec();
        let path = ContentPath::new("a.html").unwrap();
        let entry = Entry::for_log(
            &path,
            "a.html",
            "Replaced",
            "",
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            codec.markers(),
        );
        let doc = codec.insert(DOC, &entry);
        let entries = codec.extract(&doc).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].display_label, "Replaced");
    }

    #[test]
    fn insert_keeps_unidentified_children() {
        let codec = codec();
        let doc = r#"<ul id="log-list"><li>note</li></ul>"#;
        let entry = Entry::stub("x", codec.markers());
        let out = codec.insert(doc, &entry);
        assert!(out.contains("<li>note</li>"));
        assert_eq!(ids(&codec, &out), ["x"]);
    }

    #[test]
    fn insert_creates_region_before_body_close() {
        let codec = codec();
        let doc = "<html><body><p>hi</p></body></html>";
        let entry = Entry::stub("log/x.html", codec.markers());
        let out = codec.insert(doc, &entry);
        assert!(out.starts_with("<html><body><p>hi</p><ul id=\"log-list\""));
        assert!(out.ends_with("</ul>\n</body></html>"));
        assert_eq!(ids(&codec, &out), ["log/x.html"]);
    }

    #[test]
    fn insert_appends_region_without_body() {
        let codec = codec();
        let entry = Entry::stub("x", codec.markers());
        let out = codec.insert("", &entry);
        assert_eq!(ids(&codec, &out), ["x"]);
    }

    #[test]
    fn remove_drops_only_target() {
        let codec = codec();
        let out = codec.remove(DOC, "b.html").unwrap().unwrap();
        assert_eq!(ids(&codec, &out), ["a.html", "c.html"]);
        assert_eq!(outside(&out), outside(DOC));
    }

    #[test]
    fn remove_missing_entry_is_none() {
        assert!(codec().remove(DOC, "zzz.html").unwrap().is_none());
    }

    #[test]
    fn custom_markers() {
        let markers = ListMarkers {
            region_id: "sessions".to_string(),
            entry_attr: "data-id".to_string(),
            ..ListMarkers::default()
        };
        let codec = ListCodec::new(markers).unwrap();
        let doc = r#"<ul id="sessions"><li data-id="one">1</li><li data-path="two">2</li></ul>"#;
        assert_eq!(ids(&codec, doc), ["one"]);
    }

    #[test]
    fn render_joins_markup() {
        let codec = codec();
        let entries = vec![
            Entry::stub("a", codec.markers()),
            Entry::stub("b", codec.markers()),
        ];
        assert_eq!(
            codec.render(&entries),
            "<li data-path=\"a\">a</li>\n<li data-path=\"b\">b</li>"
        );
    }
}
