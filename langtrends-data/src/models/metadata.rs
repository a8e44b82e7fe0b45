//! Curated language inclusion metadata

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of `languages-metadata.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageMetadata {
    pub include: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackoverflow_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Language name → metadata lookup table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguagesMetadata(BTreeMap<String, LanguageMetadata>);

impl LanguagesMetadata {
    pub fn new(entries: BTreeMap<String, LanguageMetadata>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<&LanguageMetadata> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, LanguageMetadata)> for LanguagesMetadata {
    fn from_iter<I: IntoIterator<Item = (String, LanguageMetadata)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_table() {
        let metadata: LanguagesMetadata = serde_json::from_str(
            r#"{
                "Emacs Lisp": {"include": true, "stackoverflowTag": "elisp", "url": "https://www.gnu.org/software/emacs/"},
                "HTML": {"include": false}
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.len(), 2);
        let elisp = metadata.get("Emacs Lisp").unwrap();
        assert!(elisp.include);
        assert_eq!(elisp.stackoverflow_tag.as_deref(), Some("elisp"));
        assert!(!metadata.get("HTML").unwrap().include);
        assert!(!metadata.contains("Rust"));
    }
}
