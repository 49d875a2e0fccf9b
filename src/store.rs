//! Storage seam between parsing and compilation.
//!
//! Compilers never talk to a database directly; they go through
//! [`TranslationStore`]. The crate ships [`MemoryStore`] for callers without
//! a backend and for tests.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
    language::{normalize_code, Language},
    types::{
        GenericTranslation, PluralRule, Resource, SourceEntity, SourceEntityCollection,
        SourceEntityId, StoredTranslation, StringSet, TranslationCollection,
    },
};

/// One translation row as a store hands it to a builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationRow {
    pub source_entity: SourceEntityId,
    pub rule: PluralRule,
    pub text: String,
}

/// Lookup interface the compile path depends on.
pub trait TranslationStore {
    /// Source entities of the resource in source-file order.
    fn source_entities(&self, resource: &Resource) -> Vec<SourceEntity>;

    /// Stored translations for (resource, language).
    ///
    /// `reviewed_only` keeps reviewed rows only; `rule` restricts to one
    /// plural rule (builders pass `Other` when not in pluralized mode).
    fn translations(
        &self,
        resource: &Resource,
        language: &Language,
        reviewed_only: bool,
        rule: Option<PluralRule>,
    ) -> Vec<TranslationRow>;

    /// Source strings for the given entity ids, fetched in one batch.
    ///
    /// Source strings are the source-language rows stored at ingest time.
    /// With `pluralized` unset only rule-`Other` rows come back; set, every
    /// rule of each entity does, so plural groups can be filled whole.
    fn source_strings(
        &self,
        resource: &Resource,
        ids: &[SourceEntityId],
        pluralized: bool,
    ) -> Vec<TranslationRow>;
}

/// Receives near-translations that must not be stored as real translations.
pub trait SuggestionSink {
    fn accept(&mut self, resource: &Resource, language: &Language, suggestion: &GenericTranslation);
}

/// A suggestion as [`MemoryStore`] records it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSuggestion {
    pub resource: String,
    pub language: String,
    pub suggestion: GenericTranslation,
}

/// In-memory implementation of the storage seam.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entities: HashMap<String, SourceEntityCollection>,
    translations: HashMap<(String, String), TranslationCollection>,
    suggestions: Vec<StoredSuggestion>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Registers the source strings of a resource.
    ///
    /// Each string also becomes a translation row under the resource's
    /// source language, which is what source-fill builders read back.
    /// Returns how many new entities were created.
    pub fn ingest_source(&mut self, resource: &Resource, stringset: &StringSet) -> usize {
        let entities = self.entities.entry(resource.slug.clone()).or_default();
        let before = entities.len();
        let key = (
            resource.slug.clone(),
            normalize_code(&resource.source_language),
        );
        let rows = self.translations.entry(key).or_default();
        for translation in stringset {
            let id = entities.insert_from(translation);
            rows.add(
                id,
                translation.rule,
                StoredTranslation {
                    text: translation.translation.clone(),
                    reviewed: true,
                },
            );
        }
        entities.len() - before
    }

    /// Stores translations for (resource, language), matching entities by
    /// hash. Strings with no matching entity, or whose pluralized flag
    /// disagrees with the entity's, are dropped; returns how many rows
    /// were stored. Empty strings are stored as-is (formats that treat
    /// them as untranslated drop them before this point).
    pub fn ingest_translations(
        &mut self,
        resource: &Resource,
        language: &Language,
        stringset: &StringSet,
        reviewed: bool,
    ) -> usize {
        let Some(entities) = self.entities.get(&resource.slug) else {
            return 0;
        };
        let key = (resource.slug.clone(), language.code.clone());
        let collection = self.translations.entry(key).or_default();
        let mut stored = 0;
        for translation in stringset {
            let Some(entity) = entities.get_by_hash(&translation.entity_hash()) else {
                continue;
            };
            if translation.pluralized != entity.pluralized {
                continue;
            }
            collection.add(
                entity.id,
                translation.rule,
                StoredTranslation {
                    text: translation.translation.clone(),
                    reviewed,
                },
            );
            stored += 1;
        }
        stored
    }

    /// The entity collection of a resource, when one was ingested.
    pub fn entities(&self, resource: &Resource) -> Option<&SourceEntityCollection> {
        self.entities.get(&resource.slug)
    }

    /// Suggestions recorded so far, in arrival order.
    pub fn suggestions(&self) -> &[StoredSuggestion] {
        &self.suggestions
    }
}

impl TranslationStore for MemoryStore {
    fn source_entities(&self, resource: &Resource) -> Vec<SourceEntity> {
        let Some(entities) = self.entities.get(&resource.slug) else {
            return Vec::new();
        };
        let mut rows: Vec<SourceEntity> = entities.iter().cloned().collect();
        rows.sort_by_key(|entity| entity.order);
        rows
    }

    fn translations(
        &self,
        resource: &Resource,
        language: &Language,
        reviewed_only: bool,
        rule: Option<PluralRule>,
    ) -> Vec<TranslationRow> {
        let key = (resource.slug.clone(), language.code.clone());
        let Some(collection) = self.translations.get(&key) else {
            return Vec::new();
        };
        collection
            .iter()
            .filter(|(_, row_rule, stored)| {
                (!reviewed_only || stored.reviewed) && rule.is_none_or(|wanted| *row_rule == wanted)
            })
            .map(|(id, row_rule, stored)| TranslationRow {
                source_entity: id,
                rule: row_rule,
                text: stored.text.clone(),
            })
            .collect()
    }

    fn source_strings(
        &self,
        resource: &Resource,
        ids: &[SourceEntityId],
        pluralized: bool,
    ) -> Vec<TranslationRow> {
        let key = (
            resource.slug.clone(),
            normalize_code(&resource.source_language),
        );
        let Some(collection) = self.translations.get(&key) else {
            return Vec::new();
        };
        let wanted: HashSet<SourceEntityId> = ids.iter().copied().collect();
        collection
            .iter()
            .filter(|(id, rule, _)| {
                wanted.contains(id) && (pluralized || *rule == PluralRule::Other)
            })
            .map(|(id, rule, stored)| TranslationRow {
                source_entity: id,
                rule,
                text: stored.text.clone(),
            })
            .collect()
    }
}

impl SuggestionSink for MemoryStore {
    fn accept(&mut self, resource: &Resource, language: &Language, suggestion: &GenericTranslation) {
        self.suggestions.push(StoredSuggestion {
            resource: resource.slug.clone(),
            language: language.code.clone(),
            suggestion: suggestion.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::builtin_catalog;
    use crate::language::LanguageCatalog;

    fn source_set(strings: &[&str]) -> StringSet {
        let mut set = StringSet::new();
        for s in strings {
            set.add(GenericTranslation::new(*s, *s));
        }
        set
    }

    #[test]
    fn test_ingest_source_is_idempotent() {
        let resource = Resource::new("app", "en");
        let mut store = MemoryStore::new();
        let set = source_set(&["Hello", "Goodbye"]);
        assert_eq!(store.ingest_source(&resource, &set), 2);
        assert_eq!(store.ingest_source(&resource, &set), 0);
        assert_eq!(store.source_entities(&resource).len(), 2);
    }

    #[test]
    fn test_ingest_translations_matches_by_hash() {
        let resource = Resource::new("app", "en");
        let fr = builtin_catalog().language_for("fr").unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source_set(&["Hello"]));

        let mut translations = StringSet::new();
        translations.add(GenericTranslation::new("Hello", "Bonjour"));
        translations.add(GenericTranslation::new("Never seen", "Jamais vu"));
        assert_eq!(
            store.ingest_translations(&resource, &fr, &translations, false),
            1
        );

        let rows = store.translations(&resource, &fr, false, Some(PluralRule::Other));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text, "Bonjour");
    }

    #[test]
    fn test_ingest_translations_rejects_pluralization_mismatch() {
        let resource = Resource::new("app", "en");
        let fr = builtin_catalog().language_for("fr").unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source_set(&["Hello"]));

        let mut translations = StringSet::new();
        let mut row = GenericTranslation::new("Hello", "Bonjour");
        row.pluralized = true;
        row.rule = PluralRule::One;
        translations.add(row);
        assert_eq!(
            store.ingest_translations(&resource, &fr, &translations, false),
            0
        );
    }

    #[test]
    fn test_reviewed_filter() {
        let resource = Resource::new("app", "en");
        let fr = builtin_catalog().language_for("fr").unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source_set(&["Hello", "Goodbye"]));

        let mut reviewed = StringSet::new();
        reviewed.add(GenericTranslation::new("Hello", "Bonjour"));
        store.ingest_translations(&resource, &fr, &reviewed, true);

        let mut unreviewed = StringSet::new();
        unreviewed.add(GenericTranslation::new("Goodbye", "Au revoir"));
        store.ingest_translations(&resource, &fr, &unreviewed, false);

        assert_eq!(store.translations(&resource, &fr, false, None).len(), 2);
        let reviewed_rows = store.translations(&resource, &fr, true, None);
        assert_eq!(reviewed_rows.len(), 1);
        assert_eq!(reviewed_rows[0].text, "Bonjour");
    }

    #[test]
    fn test_source_strings_batch() {
        let resource = Resource::new("app", "en");
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source_set(&["a", "b", "c"]));
        let ids: Vec<SourceEntityId> = store
            .source_entities(&resource)
            .iter()
            .map(|e| e.id)
            .collect();
        let rows = store.source_strings(&resource, &ids[..2], false);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.rule == PluralRule::Other));
    }

    #[test]
    fn test_source_strings_cover_plural_groups() {
        let resource = Resource::new("app", "en");
        let mut store = MemoryStore::new();
        let mut set = StringSet::new();
        let mut one = GenericTranslation::new("%d file", "%d file");
        one.pluralized = true;
        one.rule = PluralRule::One;
        let mut other = GenericTranslation::new("%d file", "%d files");
        other.pluralized = true;
        other.rule = PluralRule::Other;
        set.add(one);
        set.add(other);
        store.ingest_source(&resource, &set);

        let ids: Vec<SourceEntityId> = store
            .source_entities(&resource)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids.len(), 1);
        let rows = store.source_strings(&resource, &ids, true);
        assert_eq!(rows.len(), 2);
        let singular_only = store.source_strings(&resource, &ids, false);
        assert_eq!(singular_only.len(), 1);
        assert_eq!(singular_only[0].text, "%d files");
    }

    #[test]
    fn test_suggestion_sink_records() {
        let resource = Resource::new("app", "en");
        let fr = builtin_catalog().language_for("fr").unwrap();
        let mut store = MemoryStore::new();
        let mut fuzzy = GenericTranslation::new("Hello", "Salut");
        fuzzy.fuzzy = true;
        store.accept(&resource, &fr, &fuzzy);
        assert_eq!(store.suggestions().len(), 1);
        assert_eq!(store.suggestions()[0].language, "fr");
    }
}
