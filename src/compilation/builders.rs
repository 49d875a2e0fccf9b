//! Translation selection for compilation.
//!
//! A [`TranslationsBuilder`] decides which stored translations a compile
//! run sees, and in what shape. Selection policy is the [`BuilderKind`];
//! the `pluralized` switch changes the output from one string per entity
//! to one string per (entity, rule).

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    language::Language,
    store::TranslationStore,
    types::{PluralRule, Resource, SourceEntityId},
};

/// Marker appended to source-filled values by the marked builder kinds.
///
/// Formats that use marked source fill find it in `post_compile` and turn
/// the line into a comment; it never reaches the user.
pub const SOURCE_FILL_MARKER: &str = "_txss";

/// Selection policy of a [`TranslationsBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderKind {
    /// Every stored translation for the language.
    All,
    /// Reviewed translations only.
    Reviewed,
    /// All translations; untranslated entities fall back to their source
    /// string.
    SourceFill,
    /// Reviewed translations with the source fallback.
    ReviewedSourceFill,
    /// Source fallback with [`SOURCE_FILL_MARKER`] appended to each filled
    /// value.
    MarkedSourceFill,
    /// Reviewed selection with the marked source fallback.
    ReviewedMarkedSourceFill,
    /// No translations at all (skeleton output).
    Empty,
}

impl BuilderKind {
    fn reviewed_only(self) -> bool {
        matches!(
            self,
            BuilderKind::Reviewed
                | BuilderKind::ReviewedSourceFill
                | BuilderKind::ReviewedMarkedSourceFill
        )
    }

    fn fills_from_source(self) -> bool {
        matches!(
            self,
            BuilderKind::SourceFill
                | BuilderKind::ReviewedSourceFill
                | BuilderKind::MarkedSourceFill
                | BuilderKind::ReviewedMarkedSourceFill
        )
    }

    fn marks_filled(self) -> bool {
        matches!(
            self,
            BuilderKind::MarkedSourceFill | BuilderKind::ReviewedMarkedSourceFill
        )
    }
}

/// Builder output in the shape the compiler asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuiltTranslations {
    /// entity id -> text (rule `Other` only).
    Singular(HashMap<SourceEntityId, String>),
    /// entity id -> rule -> text.
    Pluralized(HashMap<SourceEntityId, BTreeMap<PluralRule, String>>),
}

impl BuiltTranslations {
    /// The text stored for (entity, rule), if any.
    ///
    /// The singular shape only answers for [`PluralRule::Other`], the
    /// sentinel rule every non-pluralized string lives under.
    pub fn form(&self, id: SourceEntityId, rule: PluralRule) -> Option<&str> {
        match self {
            BuiltTranslations::Singular(map) => {
                if rule == PluralRule::Other {
                    map.get(&id).map(String::as_str)
                } else {
                    None
                }
            }
            BuiltTranslations::Pluralized(map) => {
                map.get(&id).and_then(|forms| forms.get(&rule)).map(String::as_str)
            }
        }
    }

    /// Whether any form is stored for the entity.
    pub fn contains(&self, id: SourceEntityId) -> bool {
        match self {
            BuiltTranslations::Singular(map) => map.contains_key(&id),
            BuiltTranslations::Pluralized(map) => map.contains_key(&id),
        }
    }

    /// Number of entities with at least one form.
    pub fn len(&self) -> usize {
        match self {
            BuiltTranslations::Singular(map) => map.len(),
            BuiltTranslations::Pluralized(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fetches the translations to substitute into a template.
pub struct TranslationsBuilder<'a> {
    kind: BuilderKind,
    resource: &'a Resource,
    language: &'a Language,
    store: &'a dyn TranslationStore,
    pluralized: bool,
}

impl<'a> TranslationsBuilder<'a> {
    pub fn new(
        kind: BuilderKind,
        resource: &'a Resource,
        language: &'a Language,
        store: &'a dyn TranslationStore,
    ) -> Self {
        TranslationsBuilder {
            kind,
            resource,
            language,
            store,
            pluralized: false,
        }
    }

    /// Switches the output shape; plural compilers set this.
    pub fn set_pluralized(&mut self, pluralized: bool) {
        self.pluralized = pluralized;
    }

    pub fn kind(&self) -> BuilderKind {
        self.kind
    }

    /// Runs the selection.
    ///
    /// The source fallback fetches source strings in one batch, and only
    /// when at least one entity has no translation at all; a plural group
    /// with some forms translated is never partially filled.
    pub fn build(&self) -> BuiltTranslations {
        if self.kind == BuilderKind::Empty {
            return self.empty_shape();
        }

        let rule_filter = if self.pluralized {
            None
        } else {
            Some(PluralRule::Other)
        };
        let rows = self.store.translations(
            self.resource,
            self.language,
            self.kind.reviewed_only(),
            rule_filter,
        );

        let mut built = self.empty_shape();
        for row in rows {
            self.insert(&mut built, row.source_entity, row.rule, row.text);
        }

        if self.kind.fills_from_source() {
            self.fill_missing(&mut built);
        }
        built
    }

    fn empty_shape(&self) -> BuiltTranslations {
        if self.pluralized {
            BuiltTranslations::Pluralized(HashMap::new())
        } else {
            BuiltTranslations::Singular(HashMap::new())
        }
    }

    fn insert(
        &self,
        built: &mut BuiltTranslations,
        id: SourceEntityId,
        rule: PluralRule,
        text: String,
    ) {
        match built {
            BuiltTranslations::Singular(map) => {
                map.insert(id, text);
            }
            BuiltTranslations::Pluralized(map) => {
                map.entry(id).or_default().insert(rule, text);
            }
        }
    }

    fn fill_missing(&self, built: &mut BuiltTranslations) {
        let translated: HashSet<SourceEntityId> = match built {
            BuiltTranslations::Singular(map) => map.keys().copied().collect(),
            BuiltTranslations::Pluralized(map) => map.keys().copied().collect(),
        };
        let missing: Vec<SourceEntityId> = self
            .store
            .source_entities(self.resource)
            .iter()
            .map(|entity| entity.id)
            .filter(|id| !translated.contains(id))
            .collect();
        if missing.is_empty() {
            return;
        }
        for row in self
            .store
            .source_strings(self.resource, &missing, self.pluralized)
        {
            let text = if self.kind.marks_filled() {
                format!("{}{}", row.text, SOURCE_FILL_MARKER)
            } else {
                row.text
            };
            self.insert(built, row.source_entity, row.rule, text);
        }
    }
}
