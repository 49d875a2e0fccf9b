//! XML DTD entity files.
//!
//! Entities are found with an XML-Name regex over the whole text;
//! declarations inside `<!-- -->` comments (multi-line included) are
//! skipped. This is the one format where an empty translation is a valid
//! translation, so empty values are stored rather than dropped.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    compilation::{EscapeFn, FactoryKind},
    error::Error,
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    tags,
    types::GenericTranslation,
};

lazy_static! {
    static ref ENTITY_RE: Regex = Regex::new(
        r#"<!ENTITY\s+(?P<name>[A-Za-z_:][A-Za-z0-9.\-_:]*)\s+(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')\s*>"#
    )
    .unwrap();
}

pub fn escape(text: &str) -> String {
    text.replace('"', "&quot;")
}

pub fn unescape(text: &str) -> String {
    text.replace("&quot;", "\"")
}

/// Byte ranges covered by comments; an unterminated comment runs to the
/// end of the text.
fn comment_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut pos = 0;
    while let Some(start) = content[pos..].find("<!--").map(|i| pos + i) {
        match content[start + 4..].find("-->") {
            Some(i) => {
                let end = start + 4 + i + 3;
                spans.push((start, end));
                pos = end;
            }
            None => {
                spans.push((start, content.len()));
                break;
            }
        }
    }
    spans
}

/// XML DTD entity codec.
pub struct DtdCodec;

impl FormatCodec for DtdCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Dtd
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        let spans = comment_spans(&text);
        let mut outcome = ParseOutcome::default();
        let mut last = 0;

        for caps in ENTITY_RE.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            if spans
                .iter()
                .any(|(start, end)| whole.start() >= *start && whole.start() < *end)
            {
                continue;
            }
            let name = caps["name"].to_string();
            let Some(value) = caps.name("dq").or_else(|| caps.name("sq")) else {
                continue;
            };
            // Empty values are kept: for DTD an empty string is a valid
            // translation, not a missing one.
            outcome
                .stringset
                .add(GenericTranslation::new(name.clone(), unescape(value.as_str())));
            if request.is_source {
                let tag = tags::singular_tag(&tags::entity_hash(&name, &[]));
                outcome.template.push_str(&text[last..value.start()]);
                outcome.template.push_str(&tag);
                last = value.end();
            }
        }
        if request.is_source {
            outcome.template.push_str(&text[last..]);
        }
        Ok(outcome)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape
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

    const SOURCE: &str = indoc! {r#"
        <!-- Main window -->
        <!ENTITY app.hello "Hello">
        <!ENTITY app.bye "Goodbye">
        <!ENTITY app.title 'Demo &quot;beta&quot;'>
    "#};

    fn en() -> Language {
        builtin_catalog().language_for("en").unwrap()
    }

    fn fr() -> Language {
        builtin_catalog().language_for("fr").unwrap()
    }

    #[test]
    fn test_parse_source_entities() {
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&DtdCodec, &resource, &en(), SOURCE.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 3);
        let rows = outcome.stringset.strings();
        assert_eq!(rows[0].source_entity, "app.hello");
        assert_eq!(rows[0].translation, "Hello");
        assert_eq!(rows[2].source_entity, "app.title");
        assert_eq!(rows[2].translation, "Demo \"beta\"");
    }

    #[test]
    fn test_template_keeps_comments_and_quoting() {
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&DtdCodec, &resource, &en(), SOURCE.as_bytes()).unwrap();
        let hello_tag = tags::singular_tag(&tags::entity_hash("app.hello", &[]));
        let title_tag = tags::singular_tag(&tags::entity_hash("app.title", &[]));
        assert!(outcome.template.contains("<!-- Main window -->"));
        assert!(
            outcome
                .template
                .contains(&format!("<!ENTITY app.hello \"{hello_tag}\">"))
        );
        assert!(
            outcome
                .template
                .contains(&format!("<!ENTITY app.title '{title_tag}'>"))
        );
    }

    #[test]
    fn test_commented_out_entities_are_skipped() {
        let content = indoc! {r#"
            <!ENTITY live "Live">
            <!--
            <!ENTITY dead "Dead">
            -->
        "#};
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&DtdCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 1);
        assert_eq!(outcome.stringset.strings()[0].source_entity, "live");
        assert!(outcome.template.contains("<!ENTITY dead \"Dead\">"));
    }

    #[test]
    fn test_empty_translation_is_stored() {
        let resource = Resource::new("app", "en");
        let outcome =
            parse_translation(&DtdCodec, &resource, &fr(), b"<!ENTITY app.bye \"\">").unwrap();
        assert_eq!(outcome.stringset.len(), 1);
        assert_eq!(outcome.stringset.strings()[0].translation, "");
    }

    #[test]
    fn test_escape_round_trip() {
        assert_eq!(escape("say \"hi\""), "say &quot;hi&quot;");
        assert_eq!(unescape("say &quot;hi&quot;"), "say \"hi\"");
    }

    #[test]
    fn test_compile_distinguishes_empty_from_missing() {
        let resource = Resource::new("app", "en");
        let source = parse_source(&DtdCodec, &resource, &en(), SOURCE.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source.stringset);

        // hello translated, bye explicitly empty, title untranslated.
        let translation = parse_translation(
            &DtdCodec,
            &resource,
            &fr(),
            b"<!ENTITY app.hello \"Bonjour\">\n<!ENTITY app.bye \"\">",
        )
        .unwrap();
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &DtdCodec,
            &source.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(compiled.contains("<!ENTITY app.hello \"Bonjour\">"));
        // Stored empty stays empty; the missing one falls back to source.
        assert!(compiled.contains("<!ENTITY app.bye \"\">"));
        assert!(compiled.contains("<!ENTITY app.title 'Demo &quot;beta&quot;'>"));
    }
}
