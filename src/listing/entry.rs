//! listing::entry
//!
//! One log item inside the list region.

use chrono::{DateTime, SecondsFormat, Utc};

use super::markers::ListMarkers;
use crate::core::types::ContentPath;

/// A single entry of the list region.
///
/// `raw_markup` is the exact fragment emitted when the entry is rendered;
/// the other fields are what could be read back out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Unique identifier (the content path of the log)
    pub identifier: String,
    /// Link text
    pub display_label: String,
    /// Muted label shown before the link
    pub scenario_label: String,
    /// Creation time, when the fragment carries one
    pub created_at: Option<DateTime<Utc>>,
    /// The fragment itself
    pub raw_markup: String,
}

impl Entry {
    /// Minimal fragment for an identifier with no existing markup.
    ///
    /// ```
    /// use logshelf::listing::{Entry, ListMarkers};
    ///
    /// let entry = Entry::stub("log/a.html", &ListMarkers::default());
    /// assert_eq!(entry.raw_markup, r#"<li data-path="log/a.html">log/a.html</li>"#);
    /// ```
    pub fn stub(identifier: &str, markers: &ListMarkers) -> Self {
        let escaped = escape_html(identifier);
        Self {
            identifier: identifier.to_string(),
            display_label: identifier.to_string(),
            scenario_label: String::new(),
            created_at: None,
            raw_markup: format!(
                r#"<{tag} {attr}="{escaped}">{escaped}</{tag}>"#,
                tag = markers.entry_tag,
                attr = markers.entry_attr,
            ),
        }
    }

    /// Full fragment for a freshly uploaded log.
    ///
    /// `href` is the link target relative to the host document.
    pub fn for_log(
        path: &ContentPath,
        href: &str,
        display_label: &str,
        scenario_label: &str,
        created_at: DateTime<Utc>,
        markers: &ListMarkers,
    ) -> Self {
        let path_attr = escape_html(path.as_str());
        let timestamp = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let raw_markup = format!(
            concat!(
                r#"<{tag} class="list-group-item d-flex justify-content-between align-items-center""#,
                "\n    {date_attr}=\"{timestamp}\"",
                "\n    {entry_attr}=\"{path}\"",
                "\n>",
                "\n  <span>",
                "\n    <span class=\"text-muted\">{scenario}</span>",
                "\n    <a href=\"{href}\" class=\"ms-2\">{label}</a>",
                "\n  </span>",
                "\n  <button type=\"button\" class=\"btn btn-sm btn-danger btn-delete\">Delete</button>",
                "\n</{tag}>"
            ),
            tag = markers.entry_tag,
            date_attr = markers.date_attr,
            entry_attr = markers.entry_attr,
            timestamp = timestamp,
            path = path_attr,
            href = escape_html(href),
            scenario = escape_html(scenario_label),
            label = escape_html(display_label),
        );

        Self {
            identifier: path.as_str().to_string(),
            display_label: display_label.to_string(),
            scenario_label: scenario_label.to_string(),
            created_at: Some(created_at),
            raw_markup,
        }
    }
}

/// Escape text for use in HTML content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`] for the entities it produces.
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
