//! The compile state machine.
//!
//! A [`Compiler`] drives one template through the hook pipeline of its
//! format codec: `pre_compile` -> `examine_content` -> replacement build ->
//! plural resize (plural formats) -> `assemble` -> `post_compile`.

use std::collections::HashMap;

use crate::{
    compilation::{builders::TranslationsBuilder, decorators::Decorator},
    error::Error,
    handler::FormatCodec,
    language::Language,
    store::TranslationStore,
    tags,
    types::{PluralRule, Resource},
};

/// What every compile hook can see.
pub struct CompileContext<'a> {
    pub resource: &'a Resource,
    pub language: &'a Language,
}

/// One entity's replacement, for formats that assemble by appending
/// rather than by tag substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReplacement {
    /// The entity's source string.
    pub entity: String,
    /// The selected translation before decoration; empty when the entity
    /// has none.
    pub raw: String,
    /// The text after the decorator and the codec's translation visit.
    pub decorated: String,
}

/// The replacement set built for one compile run.
///
/// `get` answers by template tag; `entities` lists the singular-tagged
/// entities in source order.
#[derive(Debug, Default)]
pub struct Replacements {
    by_tag: HashMap<String, String>,
    entities: Vec<EntityReplacement>,
}

impl Replacements {
    pub fn new() -> Self {
        Replacements::default()
    }

    pub fn insert(&mut self, tag: String, text: String) {
        self.by_tag.insert(tag, text);
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    pub fn push_entity(&mut self, entity: EntityReplacement) {
        self.entities.push(entity);
    }

    pub fn entities(&self) -> &[EntityReplacement] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

/// Replaces every known placeholder tag in `content` in one pass.
///
/// Tags without a replacement stay literal. Matching is case-insensitive;
/// lookups use the lowercased tag.
pub fn substitute_tags(content: &str, replacements: &Replacements) -> String {
    tags::ANY_TAG_RE
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let tag = caps[0].to_ascii_lowercase();
            match replacements.get(&tag) {
                Some(text) => text.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Drives one template through a codec's compile pipeline.
pub struct Compiler<'a> {
    codec: &'a dyn FormatCodec,
    builder: TranslationsBuilder<'a>,
    decorator: Decorator<'a>,
    store: &'a dyn TranslationStore,
    ctx: CompileContext<'a>,
}

impl<'a> Compiler<'a> {
    pub fn new(
        codec: &'a dyn FormatCodec,
        builder: TranslationsBuilder<'a>,
        decorator: Decorator<'a>,
        store: &'a dyn TranslationStore,
        ctx: CompileContext<'a>,
    ) -> Self {
        Compiler {
            codec,
            builder,
            decorator,
            store,
            ctx,
        }
    }

    pub fn compile(&self, template: &str) -> Result<String, Error> {
        let content = self.codec.pre_compile(&self.ctx, template.to_string())?;
        let mut content = self.codec.examine_content(&self.ctx, content)?;
        let replacements = self.build_replacements();
        if self.codec.plural() {
            content = self
                .codec
                .update_plural_hashes(&self.ctx, &replacements, content)?;
        }
        let content = self.codec.assemble(&self.ctx, &replacements, content)?;
        let content = self.codec.post_compile(&self.ctx, content)?;
        Ok(content)
    }

    /// Computes a replacement for every source entity of the resource.
    ///
    /// Entities the builder selected nothing for go through the decorator
    /// with the empty string, so the decorator decides what untranslated
    /// slots become. Plural groups get one replacement per slot of the
    /// target language.
    fn build_replacements(&self) -> Replacements {
        let translations = self.builder.build();
        let mut replacements = Replacements::new();
        for entity in self.store.source_entities(self.ctx.resource) {
            if self.codec.plural() && entity.pluralized {
                for (slot, rule) in self.ctx.language.rules.iter().enumerate() {
                    let raw = translations.form(entity.id, *rule).unwrap_or_default();
                    let decorated = self
                        .codec
                        .visit_translation(self.decorator.apply(raw));
                    replacements.insert(tags::plural_tag(&entity.string_hash, slot as u8), decorated);
                }
            } else {
                let raw = translations
                    .form(entity.id, PluralRule::Other)
                    .unwrap_or_default();
                let decorated = self.codec.visit_translation(self.decorator.apply(raw));
                replacements.insert(tags::singular_tag(&entity.string_hash), decorated.clone());
                replacements.push_entity(EntityReplacement {
                    entity: entity.string.clone(),
                    raw: raw.to_string(),
                    decorated,
                });
            }
        }
        replacements
    }
}
