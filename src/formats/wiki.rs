//! Wiki page markup.
//!
//! The unit of translation is the paragraph: blank-line separated blocks,
//! where a `{{ ... }}` template invocation may span blank lines without
//! splitting the paragraph it sits in. The paragraph text is its own
//! entity, so a translated page parses into rows that simply do not match
//! any source entity and get dropped when stored.

use crate::{
    compilation::{EscapeFn, FactoryKind, no_escape},
    error::Error,
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    tags,
    types::GenericTranslation,
};

fn find_from(text: &str, pattern: &str, from: usize) -> Option<usize> {
    text[from..].find(pattern).map(|i| from + i)
}

/// Wiki markup codec.
pub struct WikiCodec;

impl FormatCodec for WikiCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Wiki
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        let linesep = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let splitter = linesep.repeat(2);
        let mut outcome = ParseOutcome::default();
        if request.is_source {
            outcome.template = text.clone();
        }

        let mut starts = 0;
        while starts < text.len() {
            let mut offset = find_from(&text, &splitter, starts);
            if let Some(brace) = find_from(&text, "{{", starts) {
                if offset.is_none_or(|o| brace < o) {
                    // A template invocation is opaque: the paragraph runs to
                    // the first blank line after its closing braces, or to
                    // the end of the page when they never close.
                    offset = find_from(&text, "}}", brace)
                        .and_then(|close| find_from(&text, &splitter, close));
                }
            }
            let paragraph = match offset {
                Some(end) => &text[starts..end],
                None => &text[starts..],
            };
            let paragraph = paragraph.trim();
            if !paragraph.is_empty() {
                outcome
                    .stringset
                    .add(GenericTranslation::new(paragraph, paragraph));
                if request.is_source {
                    let tag = tags::singular_tag(&tags::entity_hash(paragraph, &[]));
                    outcome.template = outcome.template.replace(paragraph, &tag);
                }
            }
            match offset {
                Some(end) => starts = end + splitter.len(),
                None => break,
            }
        }
        Ok(outcome)
    }

    fn escape_fn(&self) -> EscapeFn {
        no_escape
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::FillEmpty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    use crate::handler::{CompileOptions, compile, parse_source, parse_translation};
    use crate::language::{Language, LanguageCatalog, builtin_catalog};
    use crate::store::MemoryStore;
    use crate::types::Resource;

    const SOURCE: &str = indoc! {"
        Welcome to the project.

        {{infobox
        |status = active

        |license = MIT
        }} The infobox sits here.

        See the manual for details.
    "};

    fn en() -> Language {
        builtin_catalog().language_for("en").unwrap()
    }

    fn fr() -> Language {
        builtin_catalog().language_for("fr").unwrap()
    }

    #[test]
    fn test_paragraphs_split_on_blank_lines() {
        let resource = Resource::new("page", "en");
        let outcome = parse_source(&WikiCodec, &resource, &en(), SOURCE.as_bytes()).unwrap();
        let rows = outcome.stringset.strings();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].source_entity, "Welcome to the project.");
        // The blank line inside {{ }} did not split the paragraph.
        assert!(rows[1].source_entity.starts_with("{{infobox"));
        assert!(rows[1].source_entity.ends_with("}} The infobox sits here."));
        assert_eq!(rows[2].source_entity, "See the manual for details.");
    }

    #[test]
    fn test_template_tags_every_occurrence() {
        let content = "Repeated line.\n\nUnique line.\n\nRepeated line.\n";
        let resource = Resource::new("page", "en");
        let outcome = parse_source(&WikiCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 2);
        let tag = tags::singular_tag(&tags::entity_hash("Repeated line.", &[]));
        assert_eq!(outcome.template.matches(&tag).count(), 2);
        assert!(!outcome.template.contains("Repeated line."));
    }

    #[test]
    fn test_unclosed_braces_take_the_rest_of_the_page() {
        let content = "Intro.\n\n{{broken\n\nstill inside\n";
        let resource = Resource::new("page", "en");
        let outcome = parse_source(&WikiCodec, &resource, &en(), content.as_bytes()).unwrap();
        let rows = outcome.stringset.strings();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].source_entity, "{{broken\n\nstill inside");
    }

    #[test]
    fn test_crlf_pages_split_correctly() {
        let content = "First.\r\n\r\nSecond.\r\n\r\nThird.\r\n";
        let resource = Resource::new("page", "en");
        let outcome = parse_source(&WikiCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 3);
    }

    #[test]
    fn test_compile_fills_untranslated_paragraphs() {
        let content = "Hello paragraph.\n\nSecond paragraph.\n";
        let resource = Resource::new("page", "en");
        let source = parse_source(&WikiCodec, &resource, &en(), content.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source.stringset);

        // Stored directly: a translated page would not match any entity.
        let mut translated = crate::types::StringSet::new();
        translated.add(GenericTranslation::new(
            "Hello paragraph.",
            "Paragraphe de salutation.",
        ));
        store.ingest_translations(&resource, &fr(), &translated, false);

        let compiled = compile(
            &WikiCodec,
            &source.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(compiled.contains("Paragraphe de salutation."));
        assert!(compiled.contains("Second paragraph."));
    }

    #[test]
    fn test_translated_page_rows_do_not_match_and_drop() {
        let resource = Resource::new("page", "en");
        let source = parse_source(&WikiCodec, &resource, &en(), b"Hello paragraph.\n").unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source.stringset);

        let translation =
            parse_translation(&WikiCodec, &resource, &fr(), b"Paragraphe traduit.\n").unwrap();
        assert_eq!(translation.stringset.len(), 1);
        let stored = store.ingest_translations(&resource, &fr(), &translation.stringset, false);
        assert_eq!(stored, 0);
    }
}
