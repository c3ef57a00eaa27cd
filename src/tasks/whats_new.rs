//! Release notes task parameters

use crate::tasks::{Credentials, TaskParameters, is_set};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a `whats-new` task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsNewParameters {
    /// Endpoint receiving the notes
    #[serde(default)]
    pub url: String,

    /// Released version
    #[serde(default)]
    pub version: String,

    /// Release date; today when absent
    #[serde(default)]
    pub release_date: Option<String>,

    /// Note items
    #[serde(default)]
    pub items: Vec<String>,

    /// File with one note per non-empty line
    #[serde(default)]
    pub notes_file: Option<String>,

    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Basic or bearer credentials
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

crate::expand_fields!(WhatsNewParameters {
    url,
    version,
    release_date,
    items,
    notes_file,
    headers,
    credentials
});

impl TaskParameters for WhatsNewParameters {
    fn validate(&self) -> bool {
        !self.url.trim().is_empty()
            && !self.version.trim().is_empty()
            && (!self.items.is_empty() || is_set(self.notes_file.as_ref()))
    }

    fn invalid_reason(&self) -> String {
        "url, version and items or notesFile are required".to_string()
    }
}

/// Note items of a notes file
#[must_use]
pub fn parse_notes(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*']).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_notes() {
        let notes = "- Faster startup\n\n* New dashboard\nBug fixes\n";
        assert_eq!(
            parse_notes(notes),
            vec!["Faster startup", "New dashboard", "Bug fixes"]
        );
    }

    #[test]
    fn test_items_or_file_required() {
        let p = WhatsNewParameters {
            url: "http://notes".to_string(),
            version: "1.2.0".to_string(),
            ..WhatsNewParameters::default()
        };
        assert!(!p.validate());
    }
}
