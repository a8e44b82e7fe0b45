//! Reconciles the live language catalog with curated metadata
//!
//! Language ids are assigned once, at first sight, and never change afterwards.
//! Existing languages only ever have their Stack Overflow tag refreshed.

use crate::models::{Language, LanguagesMetadata};
use tracing::{debug, info};

/// Outcome of one catalog merge
#[derive(Debug, Clone, Default)]
pub struct CatalogMerge {
    /// Full updated language list, existing entries first in their original order
    pub languages: Vec<Language>,
    /// Number of languages appended by this merge
    pub added: usize,
    /// Live names with no metadata entry
    pub unmapped: Vec<String>,
}

/// Merge `live_names` into `existing`
///
/// Names are visited in live-catalog order. Once the working set holds `limit`
/// languages the merge stops. Names without metadata, or whose metadata
/// excludes them, are skipped.
pub fn merge_catalog(
    existing: Vec<Language>,
    live_names: &[String],
    metadata: &LanguagesMetadata,
    limit: Option<usize>,
) -> CatalogMerge {
    let mut languages = existing;
    let mut next_id = languages.iter().map(|l| l.id).max().unwrap_or(0) + 1;
    let mut added = 0;
    let mut unmapped = Vec::new();

    for name in live_names {
        if limit.is_some_and(|limit| languages.len() >= limit) {
            break;
        }

        let Some(entry) = metadata.get(name) else {
            info!(language = %name, "Language from GitHub not found in metadata: {}", name);
            unmapped.push(name.clone());
            continue;
        };

        if !entry.include {
            debug!(language = %name, "Language excluded by metadata");
            continue;
        }

        match languages.iter_mut().find(|l| &l.name == name) {
            Some(language) => {
                language.stackoverflow_tag = entry.stackoverflow_tag.clone();
            }
            None => {
                languages.push(Language {
                    id: next_id,
                    name: name.clone(),
                    stackoverflow_tag: entry.stackoverflow_tag.clone(),
                });
                next_id += 1;
                added += 1;
            }
        }
    }

    CatalogMerge {
        languages,
        added,
        unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LanguageMetadata;

    fn entry(include: bool, tag: Option<&str>) -> LanguageMetadata {
        LanguageMetadata {
            include,
            stackoverflow_tag: tag.map(str::to_string),
            ..Default::default()
        }
    }

    fn metadata() -> LanguagesMetadata {
        [
            ("C".to_string(), entry(true, None)),
            ("C#".to_string(), entry(true, None)),
            ("Emacs Lisp".to_string(), entry(true, Some("elisp"))),
            ("HTML".to_string(), entry(false, None)),
            ("Rust".to_string(), entry(true, None)),
        ]
        .into_iter()
        .collect()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_languages_get_sequential_ids() {
        let merge = merge_catalog(
            Vec::new(),
            &names(&["C", "HTML", "Emacs Lisp", "Rust"]),
            &metadata(),
            None,
        );

        let ids: Vec<(u32, &str)> = merge
            .languages
            .iter()
            .map(|l| (l.id, l.name.as_str()))
            .collect();
        assert_eq!(ids, vec![(1, "C"), (2, "Emacs Lisp"), (3, "Rust")]);
        assert_eq!(merge.added, 3);
        assert_eq!(merge.languages[1].stackoverflow_tag.as_deref(), Some("elisp"));
    }

    #[test]
    fn test_existing_language_only_updates_tag() {
        let existing = vec![
            Language::new(7, "Emacs Lisp").with_stackoverflow_tag("emacs"),
            Language::new(3, "C"),
        ];

        let merge = merge_catalog(existing, &names(&["C", "Emacs Lisp", "Rust"]), &metadata(), None);

        assert_eq!(merge.added, 1);
        assert_eq!(merge.languages[0].id, 7);
        assert_eq!(merge.languages[0].stackoverflow_tag.as_deref(), Some("elisp"));
        assert_eq!(merge.languages[1].id, 3);
        // Max existing id + 1, not position-based
        assert_eq!(merge.languages[2].id, 8);
    }

    #[test]
    fn test_unmapped_names_are_reported_not_fatal() {
        let merge = merge_catalog(Vec::new(), &names(&["Brainfuck", "C"]), &metadata(), None);

        assert_eq!(merge.unmapped, vec!["Brainfuck".to_string()]);
        assert_eq!(merge.languages.len(), 1);
    }

    #[test]
    fn test_limit_counts_the_working_set() {
        let existing = vec![Language::new(1, "C")];
        let merge = merge_catalog(
            existing,
            &names(&["C", "C#", "Emacs Lisp", "Rust"]),
            &metadata(),
            Some(2),
        );

        assert_eq!(merge.languages.len(), 2);
        assert_eq!(merge.languages[1].name, "C#");
    }

    #[test]
    fn test_rerun_keeps_ids_stable() {
        let live = names(&["Rust", "C", "C#", "Emacs Lisp"]);
        let first = merge_catalog(Vec::new(), &live, &metadata(), None);
        let second = merge_catalog(first.languages.clone(), &live, &metadata(), None);

        assert_eq!(second.added, 0);
        assert_eq!(first.languages, second.languages);
    }
}
