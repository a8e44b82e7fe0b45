//! Language records

use serde::{Deserialize, Serialize};

/// A tracked programming language
///
/// `id` is assigned once at first sight and never changes. `name` is the
/// repository provider's name for the language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub id: u32,
    pub name: String,
    /// Question-tag provider taxonomy name, when it differs from `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stackoverflow_tag: Option<String>,
}

impl Language {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            stackoverflow_tag: None,
        }
    }

    pub fn with_stackoverflow_tag(mut self, tag: impl Into<String>) -> Self {
        self.stackoverflow_tag = Some(tag.into());
        self
    }

    /// Tag to query the question-tag provider with
    pub fn stackoverflow_tag_or_name(&self) -> &str {
        self.stackoverflow_tag.as_deref().unwrap_or(&self.name)
    }
}
