//! listing::page
//!
//! Whole-document helpers around the list region: the default host
//! document, the loader bootstrap, log preparation, and the companion
//! assets published next to the host document.

use std::sync::LazyLock;

use regex::Regex;

use super::codec::CodecError;
use super::entry::escape_html;
use super::markers::ListMarkers;
use crate::core::types::{ContentPath, RepoRef};

/// Marker identifying an already bootstrapped host document.
const LOADER_MARKER: &str = "window.LOGSHELF_CONFIG";

/// Marker identifying an already prepared log.
const ROBOTS_META: &str = r#"<meta name="robots" content="noindex,nofollow">"#;

/// A static file published alongside the host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanionAsset {
    /// File name, relative to the host document's directory
    pub name: &'static str,
    /// File contents
    pub contents: &'static str,
}

/// Assets the host document and prepared logs load.
pub const COMPANION_ASSETS: &[CompanionAsset] = &[
    CompanionAsset {
        name: "norobot.js",
        contents: include_str!("../../assets/norobot.js"),
    },
    CompanionAsset {
        name: "loglist.js",
        contents: include_str!("../../assets/loglist.js"),
    },
];

impl CompanionAsset {
    /// Path of this asset next to `index`.
    pub fn path_beside(&self, index: &ContentPath) -> Option<ContentPath> {
        let dir = parent_dir(index.as_str());
        let path = if dir.is_empty() {
            self.name.to_string()
        } else {
            format!("{dir}/{}", self.name)
        };
        ContentPath::new(path).ok()
    }
}

/// The host document written by `initialize`.
pub fn default_document(markers: &ListMarkers) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  {ROBOTS_META}
  <title>Session Logs</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body class="container py-4">
  <h1 class="mb-4">Session Logs</h1>
  {open}
  {close}
  <script src="norobot.js"></script>
</body>
</html>
"#,
        open = markers.container_open(),
        close = markers.container_close(),
    )
}

/// Insert the client configuration and list script, once.
///
/// The bootstrap goes before the robots script when present, else before
/// `</body>`, else at the end. A document already carrying the bootstrap
/// is returned unchanged.
pub fn ensure_loader(
    document: &str,
    repo: &RepoRef,
    markers: &ListMarkers,
) -> Result<String, CodecError> {
    if document.contains(LOADER_MARKER) {
        return Ok(document.to_string());
    }

    let config = serde_json::json!({
        "owner": repo.owner,
        "repo": repo.name,
        "regionId": markers.region_id,
        "entryAttr": markers.entry_attr,
    });
    let snippet = format!(
        "<script>{LOADER_MARKER} = {config};</script>\n<script src=\"loglist.js\"></script>\n"
    );

    let at = match compiled(&ROBOTS_SCRIPT)?.find(document) {
        Some(m) => Some(m.start()),
        None => compiled(&BODY_CLOSE)?
            .find_iter(document)
            .last()
            .map(|m| m.start()),
    };
    Ok(splice_at(document, at, &snippet))
}

/// Inject the robots meta tag, font override, and robots script into a
/// log's `<head>`.
///
/// `asset_href` is the robots script location relative to the log. Logs
/// without `</head>` or already carrying the robots meta are unchanged.
/// The log is handled as bytes, so content in any ASCII-compatible
/// encoding is kept as is around the inserted tags.
pub fn prepare_log(html: &[u8], asset_href: &str) -> Result<Vec<u8>, CodecError> {
    if contains_bytes(html, ROBOTS_META.as_bytes()) {
        return Ok(html.to_vec());
    }
    let Some(at) = compiled(&HEAD_CLOSE)?.find(html).map(|m| m.start()) else {
        return Ok(html.to_vec());
    };

    let snippet = format!(
        "{ROBOTS_META}\n<style>body, body * {{ font-family: system-ui, sans-serif !important; }}</style>\n<script src=\"{}\"></script>\n",
        escape_html(asset_href)
    );
    let mut out = Vec::with_capacity(html.len() + snippet.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(snippet.as_bytes());
    out.extend_from_slice(&html[at..]);
    Ok(out)
}

/// Whether `html` has a `</head>` that [`prepare_log`] can insert before.
pub fn has_head_close(html: &[u8]) -> bool {
    html.windows(HEAD_CLOSE_TAG.len())
        .any(|w| w.eq_ignore_ascii_case(HEAD_CLOSE_TAG))
}

/// Relative URL from the document at `from` to the file at `to`.
///
/// ```
/// use logshelf::core::types::ContentPath;
/// use logshelf::listing::page::relative_href;
///
/// let index = ContentPath::new("docs/index.html").unwrap();
/// let log = ContentPath::new("docs/log/a.html").unwrap();
/// assert_eq!(relative_href(&index, &log), "log/a.html");
/// assert_eq!(relative_href(&log, &index), "../index.html");
/// ```
pub fn relative_href(from: &ContentPath, to: &ContentPath) -> String {
    let from_dirs: Vec<&str> = split_dirs(parent_dir(from.as_str()));
    let to_parts: Vec<&str> = to.as_str().split('/').collect();
    let (to_dirs, to_file) = to_parts.split_at(to_parts.len().saturating_sub(1));

    let common = from_dirs
        .iter()
        .zip(to_dirs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = std::iter::repeat("..")
        .take(from_dirs.len() - common)
        .collect();
    parts.extend_from_slice(&to_dirs[common..]);
    parts.extend_from_slice(to_file);
    parts.join("/")
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn split_dirs(dir: &str) -> Vec<&str> {
    if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    }
}

fn splice_at(document: &str, at: Option<usize>, snippet: &str) -> String {
    let mut out = String::with_capacity(document.len() + snippet.len());
    match at {
        Some(at) => {
            out.push_str(&document[..at]);
            out.push_str(snippet);
            out.push_str(&document[at..]);
        }
        None => {
            out.push_str(document);
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(snippet);
        }
    }
    out
}

const HEAD_CLOSE_TAG: &[u8] = b"</head";

static ROBOTS_SCRIPT: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\s+src\s*=\s*["'][^"']*norobot\.js["']\s*>\s*</script\s*>"#)
});
static BODY_CLOSE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)</body\s*>"));
static HEAD_CLOSE: LazyLock<Result<regex::bytes::Regex, regex::Error>> =
    LazyLock::new(|| regex::bytes::Regex::new(r"(?i)</head\s*>"));

fn compiled<R>(cell: &'static LazyLock<Result<R, regex::Error>>) -> Result<&'static R, CodecError> {
    LazyLock::force(cell)
        .as_ref()
        .map_err(|e| CodecError::InvalidPattern(e.to_string()))
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListCodec;

    fn repo() -> RepoRef {
        RepoRef::new("alice", "logs").unwrap()
    }

    #[test]
    fn default_document_has_empty_region() {
        let markers = ListMarkers::default();
        let doc = default_document(&markers);
        let codec = ListCodec::new(markers).unwrap();
        assert!(codec.extract(&doc).unwrap().is_empty());
        assert!(doc.contains(ROBOTS_META));
    }

    #[test]
    fn loader_goes_before_robots_script() {
        let markers = ListMarkers::default();
        let doc = ensure_loader(&default_document(&markers), &repo(), &markers).unwrap();
        let loader = doc.find(LOADER_MARKER).unwrap();
        let robots = doc.find(r#"<script src="norobot.js">"#).unwrap();
        assert!(loader < robots);
        assert!(doc.contains(r#""owner":"alice""#));
        assert!(doc.contains(r#"<script src="loglist.js"></script>"#));
    }

    #[test]
    fn loader_is_idempotent() {
        let markers = ListMarkers::default();
        let once = ensure_loader("<body></body>", &repo(), &markers).unwrap();
        let twice = ensure_loader(&once, &repo(), &markers).unwrap();
        assert_eq!(once, twice);
        assert!(once.ends_with("</body>"));
    }

    #[test]
    fn loader_appends_without_body() {
        let markers = ListMarkers::default();
        let doc = ensure_loader("<p>x</p>", &repo(), &markers).unwrap();
        assert!(doc.starts_with("<p>x</p>\n<script>"));
    }

    #[test]
    fn prepare_log_injects_into_head() {
        let html = b"<html><head><title>t</title></head><body></body></html>";
        let out = String::from_utf8(prepare_log(html, "../norobot.js").unwrap()).unwrap();
        assert!(out.contains(ROBOTS_META));
        assert!(out.contains(r#"<script src="../norobot.js"></script>"#));
        assert!(out.find(ROBOTS_META).unwrap() < out.find("</head>").unwrap());
        assert_eq!(
            prepare_log(out.as_bytes(), "../norobot.js").unwrap(),
            out.as_bytes()
        );
    }

    #[test]
    fn prepare_log_without_head_is_unchanged() {
        assert_eq!(prepare_log(b"plain text", "norobot.js").unwrap(), b"plain text");
        assert!(!has_head_close(b"plain text"));
        assert!(has_head_close(b"<HEAD></HEAD>"));
    }

    #[test]
    fn prepare_log_keeps_non_utf8_bytes() {
        // Shift_JIS title around an uppercase closing tag
        let mut html = b"<html><head><title>".to_vec();
        html.extend_from_slice(&[0x83, 0x8D, 0x83, 0x4F]);
        html.extend_from_slice(b"</title></HEAD><body>\x82\xA0</body></html>");

        let out = prepare_log(&html, "norobot.js").unwrap();
        let at = out
            .windows(ROBOTS_META.len())
            .position(|w| w == ROBOTS_META.as_bytes())
            .unwrap();
        assert_eq!(&out[..at], &html[..at]);
        assert!(out.ends_with(&html[at..]));
        assert_eq!(&out[at - 4..at], b"tle>");
        assert!(out
            .windows(4)
            .any(|w| w == [0x83, 0x8D, 0x83, 0x4F]));
    }

    #[test]
    fn builtin_patterns_compile() {
        assert!(compiled(&ROBOTS_SCRIPT).is_ok());
        assert!(compiled(&BODY_CLOSE).is_ok());
        assert!(compiled(&HEAD_CLOSE).is_ok());
    }

    #[test]
    fn relative_hrefs() {
        let root_index = ContentPath::index_html();
        let log = ContentPath::new("log/a.html").unwrap();
        assert_eq!(relative_href(&root_index, &log), "log/a.html");
        assert_eq!(relative_href(&log, &root_index), "../index.html");

        let asset = ContentPath::new("norobot.js").unwrap();
        assert_eq!(relative_href(&log, &asset), "../norobot.js");

        let deep = ContentPath::new("a/b/c.html").unwrap();
        let other = ContentPath::new("a/x/y.html").unwrap();
        assert_eq!(relative_href(&deep, &other), "../x/y.html");
    }

    #[test]
    fn assets_sit_beside_index() {
        let index = ContentPath::new("docs/index.html").unwrap();
        let paths: Vec<String> = COMPANION_ASSETS
            .iter()
            .filter_map(|a| a.path_beside(&index))
            .map(|p| p.to_string())
            .collect();
        assert_eq!(paths, ["docs/norobot.js", "docs/loglist.js"]);
        assert!(COMPANION_ASSETS.iter().all(|a| !a.contents.is_empty()));
    }
}
