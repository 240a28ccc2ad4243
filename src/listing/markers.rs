//! listing::markers
//!
//! Structural markers that locate the list region and its entries.
//!
//! The markers are a plain configuration value handed to
//! [`ListCodec::new`](super::ListCodec::new); nothing in the codec reads
//! global state.

/// Names of the tags and attributes that delimit the list region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMarkers {
    /// `id` attribute value of the container element
    pub region_id: String,
    /// Attribute holding each entry's identifier
    pub entry_attr: String,
    /// Attribute holding each entry's creation timestamp
    pub date_attr: String,
    /// Container element tag
    pub container_tag: String,
    /// Entry element tag
    pub entry_tag: String,
    /// `class` given to containers created from scratch
    pub container_class: String,
}

impl Default for ListMarkers {
    fn default() -> Self {
        Self {
            region_id: "log-list".to_string(),
            entry_attr: "data-path".to_string(),
            date_attr: "data-date".to_string(),
            container_tag: "ul".to_string(),
            entry_tag: "li".to_string(),
            container_class: "list-group".to_string(),
        }
    }
}

impl ListMarkers {
    /// Opening tag used when a container has to be created.
    pub fn container_open(&self) -> String {
        format!(
            r#"<{} id="{}" class="{}">"#,
            self.container_tag, self.region_id, self.container_class
        )
    }

    /// Closing tag of the container.
    pub fn container_close(&self) -> String {
        format!("</{}>", self.container_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markers() {
        let markers = ListMarkers::default();
        assert_eq!(markers.region_id, "log-list");
        assert_eq!(markers.entry_attr, "data-path");
        assert_eq!(
            markers.container_open(),
            r#"<ul id="log-list" class="list-group">"#
        );
        assert_eq!(markers.container_close(), "</ul>");
    }
}
