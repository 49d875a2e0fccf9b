//! Core, format-agnostic types for trcodec.
//! Parsers decode into these; compilers read them back out of storage.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::tags;

/// Identifier a store assigns to a source entity.
pub type SourceEntityId = u64;

/// The gettext-style plural rule numbers, 0 through 5.
///
/// Rule 5 (`Other`) doubles as the sentinel rule carried by every
/// non-pluralized string.
#[derive(Ord, PartialOrd, Eq, PartialEq, Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[derive(Hash)]
pub enum PluralRule {
    Zero,
    One,
    Two,
    Few,
    Many,
    Other,
}

impl PluralRule {
    /// The wire number of the rule (0..=5).
    pub fn number(self) -> u8 {
        match self {
            PluralRule::Zero => 0,
            PluralRule::One => 1,
            PluralRule::Two => 2,
            PluralRule::Few => 3,
            PluralRule::Many => 4,
            PluralRule::Other => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            0 => Some(PluralRule::Zero),
            1 => Some(PluralRule::One),
            2 => Some(PluralRule::Two),
            3 => Some(PluralRule::Few),
            4 => Some(PluralRule::Many),
            5 => Some(PluralRule::Other),
            _ => None,
        }
    }
}

impl Default for PluralRule {
    fn default() -> Self {
        PluralRule::Other
    }
}

impl Display for PluralRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PluralRule::Zero => "zero",
            PluralRule::One => "one",
            PluralRule::Two => "two",
            PluralRule::Few => "few",
            PluralRule::Many => "many",
            PluralRule::Other => "other",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PluralRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ZERO" => Ok(PluralRule::Zero),
            "ONE" => Ok(PluralRule::One),
            "TWO" => Ok(PluralRule::Two),
            "FEW" => Ok(PluralRule::Few),
            "MANY" => Ok(PluralRule::Many),
            "OTHER" => Ok(PluralRule::Other),
            _ => Err(format!("Unknown plural rule: {}", s)),
        }
    }
}

/// Descriptor of the resource a file belongs to.
///
/// Carries no entries itself; parsed strings live in a [`StringSet`] and in
/// whatever store the caller attaches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resource {
    /// Stable identifier, unique among the caller's resources.
    pub slug: String,

    /// Human-readable name.
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(default)]
    pub name: String,

    /// Language code of the source files of this resource.
    pub source_language: String,
}

impl Resource {
    pub fn new(slug: impl Into<String>, source_language: impl Into<String>) -> Self {
        let slug = slug.into();
        Resource {
            name: slug.clone(),
            slug,
            source_language: source_language.into(),
        }
    }
}

/// One translatable string as a parser found it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenericTranslation {
    /// The source string this translation belongs to.
    pub source_entity: String,

    /// The translation text itself; for source files this equals the
    /// source string.
    pub translation: String,

    /// Disambiguation context, empty when the format has none.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub context: Vec<String>,

    /// Where the string occurs in the project, when the format records it.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub occurrences: Option<String>,

    /// Plural rule this text serves; `Other` for non-pluralized strings.
    #[serde(default)]
    pub rule: PluralRule,

    /// Whether this string belongs to a plural group.
    #[serde(default)]
    pub pluralized: bool,

    /// Marked as a near-translation by the format (PO fuzzy and friends).
    #[serde(default)]
    pub fuzzy: bool,

    /// Marked obsolete by the format.
    #[serde(default)]
    pub obsolete: bool,

    /// Developer comment attached to the string.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub comment: Option<String>,

    /// Position stamped by the [`StringSet`] that accepted this element.
    #[serde(default)]
    pub order: u64,
}

impl GenericTranslation {
    pub fn new(source_entity: impl Into<String>, translation: impl Into<String>) -> Self {
        GenericTranslation {
            source_entity: source_entity.into(),
            translation: translation.into(),
            context: Vec::new(),
            occurrences: None,
            rule: PluralRule::Other,
            pluralized: false,
            fuzzy: false,
            obsolete: false,
            comment: None,
            order: 0,
        }
    }

    /// The hash identifying (source string, context).
    pub fn entity_hash(&self) -> String {
        tags::entity_hash(&self.source_entity, &self.context)
    }

    /// The `_tr` template tag for this element's hash.
    ///
    /// Plural groups use positional `_pl_<n>` tags instead, numbered by
    /// each slot's position in the file, so handlers build those with
    /// [`tags::plural_tag`] while walking the group.
    pub fn template_tag(&self) -> String {
        tags::singular_tag(&self.entity_hash())
    }

    fn identity(&self) -> (String, Vec<String>, u8) {
        (
            self.source_entity.clone(),
            self.context.clone(),
            self.rule.number(),
        )
    }
}

impl Display for GenericTranslation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GenericTranslation {{ source_entity: {}, rule: {} }}",
            self.source_entity, self.rule
        )
    }
}

/// Ordered, deduplicating container of parsed strings.
///
/// The identity of an element is (source_entity, context, rule); adding a
/// second element with the same identity is a no-op. Accepted elements are
/// stamped with a strictly increasing `order`.
#[derive(Debug, Clone, Default)]
pub struct StringSet {
    strings: Vec<GenericTranslation>,
    seen: HashSet<(String, Vec<String>, u8)>,
    next_order: u64,
}

impl StringSet {
    pub fn new() -> Self {
        StringSet::default()
    }

    /// Adds an element unless its identity was already present.
    /// Returns whether the element was accepted.
    pub fn add(&mut self, mut translation: GenericTranslation) -> bool {
        let identity = translation.identity();
        if self.seen.contains(&identity) {
            return false;
        }
        translation.order = self.next_order;
        self.next_order += 1;
        self.seen.insert(identity);
        self.strings.push(translation);
        true
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Elements in insertion order.
    pub fn strings(&self) -> &[GenericTranslation] {
        &self.strings
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GenericTranslation> {
        self.strings.iter()
    }
}

impl IntoIterator for StringSet {
    type Item = GenericTranslation;
    type IntoIter = std::vec::IntoIter<GenericTranslation>;

    fn into_iter(self) -> Self::IntoIter {
        self.strings.into_iter()
    }
}

impl<'a> IntoIterator for &'a StringSet {
    type Item = &'a GenericTranslation;
    type IntoIter = std::slice::Iter<'a, GenericTranslation>;

    fn into_iter(self) -> Self::IntoIter {
        self.strings.iter()
    }
}

/// A stored source entity: the identity half of the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceEntity {
    pub id: SourceEntityId,
    pub string: String,
    pub context: Vec<String>,
    pub string_hash: String,
    pub pluralized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub occurrences: Option<String>,
    /// Position of the entity in its source file.
    pub order: u64,
}

/// Source entities keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct SourceEntityCollection {
    items: BTreeMap<SourceEntityId, SourceEntity>,
    by_hash: HashMap<String, SourceEntityId>,
    next_id: SourceEntityId,
}

impl SourceEntityCollection {
    pub fn new() -> Self {
        SourceEntityCollection::default()
    }

    /// Inserts a new entity built from a parsed string, assigning its id.
    /// An entity with the same hash keeps its first id and is returned.
    pub fn insert_from(&mut self, translation: &GenericTranslation) -> SourceEntityId {
        let hash = translation.entity_hash();
        if let Some(id) = self.by_hash.get(&hash) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_hash.insert(hash.clone(), id);
        self.items.insert(
            id,
            SourceEntity {
                id,
                string: translation.source_entity.clone(),
                context: translation.context.clone(),
                string_hash: hash,
                pluralized: translation.pluralized,
                comment: translation.comment.clone(),
                occurrences: translation.occurrences.clone(),
                order: translation.order,
            },
        );
        id
    }

    pub fn get(&self, id: SourceEntityId) -> Option<&SourceEntity> {
        self.items.get(&id)
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&SourceEntity> {
        self.by_hash.get(hash).and_then(|id| self.items.get(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceEntity> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceEntityId> + '_ {
        self.items.keys().copied()
    }
}

/// One stored translation string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredTranslation {
    pub text: String,
    pub reviewed: bool,
}

/// Translations keyed by (source entity id, plural rule).
#[derive(Debug, Clone, Default)]
pub struct TranslationCollection {
    items: BTreeMap<(SourceEntityId, u8), StoredTranslation>,
}

impl TranslationCollection {
    pub fn new() -> Self {
        TranslationCollection::default()
    }

    pub fn add(&mut self, id: SourceEntityId, rule: PluralRule, translation: StoredTranslation) {
        self.items.insert((id, rule.number()), translation);
    }

    pub fn get(&self, id: SourceEntityId, rule: PluralRule) -> Option<&StoredTranslation> {
        self.items.get(&(id, rule.number()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All stored (id, rule, translation) triples in key order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceEntityId, PluralRule, &StoredTranslation)> {
        self.items.iter().map(|((id, rule), translation)| {
            let rule = PluralRule::from_number(*rule).unwrap_or_default();
            (*id, rule, translation)
        })
    }

    /// Rules stored for one entity, ascending.
    pub fn rules_for(&self, id: SourceEntityId) -> Vec<PluralRule> {
        self.items
            .range((id, 0)..=(id, 5))
            .filter_map(|((_, rule), _)| PluralRule::from_number(*rule))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_rule_numbers_round_trip() {
        for number in 0..=5u8 {
            let rule = PluralRule::from_number(number).unwrap();
            assert_eq!(rule.number(), number);
        }
        assert!(PluralRule::from_number(6).is_none());
    }

    #[test]
    fn test_plural_rule_from_str() {
        assert_eq!("one".parse::<PluralRule>().unwrap(), PluralRule::One);
        assert_eq!("OTHER".parse::<PluralRule>().unwrap(), PluralRule::Other);
        assert!("sometimes".parse::<PluralRule>().is_err());
    }

    #[test]
    fn test_default_rule_is_other() {
        assert_eq!(PluralRule::default(), PluralRule::Other);
    }

    #[test]
    fn test_stringset_dedup_keeps_first() {
        let mut set = StringSet::new();
        assert!(set.add(GenericTranslation::new("Hello", "Hello")));
        assert!(!set.add(GenericTranslation::new("Hello", "Something else")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.strings()[0].translation, "Hello");
    }

    #[test]
    fn test_stringset_context_splits_identity() {
        let mut set = StringSet::new();
        let plain = GenericTranslation::new("File", "File");
        let mut in_menu = GenericTranslation::new("File", "File");
        in_menu.context = vec!["menu".to_string()];
        assert!(set.add(plain));
        assert!(set.add(in_menu));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_stringset_order_is_monotonic() {
        let mut set = StringSet::new();
        set.add(GenericTranslation::new("a", "a"));
        set.add(GenericTranslation::new("a", "dup"));
        set.add(GenericTranslation::new("b", "b"));
        set.add(GenericTranslation::new("c", "c"));
        let orders: Vec<u64> = set.iter().map(|t| t.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_template_tag_kinds() {
        let singular = GenericTranslation::new("Hello", "Hello");
        assert!(singular.template_tag().ends_with("_tr"));

        let mut plural = GenericTranslation::new("%d file", "%d files");
        plural.pluralized = true;
        plural.rule = PluralRule::Other;
        // Plural tags are positional: an English group tags its two slots
        // _pl_0 and _pl_1 no matter which rules they map to.
        let hash = plural.entity_hash();
        assert_eq!(tags::plural_tag(&hash, 1), format!("{hash}_pl_1"));
    }

    #[test]
    fn test_entity_collection_assigns_stable_ids() {
        let mut entities = SourceEntityCollection::new();
        let first = entities.insert_from(&GenericTranslation::new("Hello", "Hello"));
        let again = entities.insert_from(&GenericTranslation::new("Hello", "Hello"));
        let second = entities.insert_from(&GenericTranslation::new("Bye", "Bye"));
        assert_eq!(first, again);
        assert_ne!(first, second);
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_entity_collection_lookup_by_hash() {
        let mut entities = SourceEntityCollection::new();
        let translation = GenericTranslation::new("Hello", "Hello");
        let id = entities.insert_from(&translation);
        let found = entities.get_by_hash(&translation.entity_hash()).unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.string, "Hello");
    }

    #[test]
    fn test_translation_collection_keying() {
        let mut translations = TranslationCollection::new();
        translations.add(
            7,
            PluralRule::One,
            StoredTranslation {
                text: "1 fichier".to_string(),
                reviewed: false,
            },
        );
        translations.add(
            7,
            PluralRule::Other,
            StoredTranslation {
                text: "%d fichiers".to_string(),
                reviewed: true,
            },
        );
        assert_eq!(translations.get(7, PluralRule::One).unwrap().text, "1 fichier");
        assert!(translations.get(7, PluralRule::Two).is_none());
        assert_eq!(
            translations.rules_for(7),
            vec![PluralRule::One, PluralRule::Other]
        );
    }
}
