//! Joomla INI language files.
//!
//! Two dialects share the extension: the old style (`KEY=value`, quotes
//! written as `&quot;`) and the 1.6+ style (`KEY="value"`, embedded quotes
//! written as `"_QQ_"`). The dialect is detected from the first key-value
//! line of whatever content is at hand, so parsing and compilation each
//! detect it for themselves. Because escaping depends on the dialect, tag
//! substitution, quote escaping and the commenting-out of source-filled
//! lines all happen together in [`FormatCodec::assemble`].

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::{
    compilation::{CompileContext, EscapeFn, FactoryKind, Replacements, no_escape},
    error::{CompileError, Error},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    tags::{self, ANY_TAG_RE},
    types::GenericTranslation,
};

lazy_static! {
    static ref NEW_MARKED_RE: Regex =
        Regex::new(r#"(?P<actual>.*)_txss""#).expect("new-dialect marker regex");
    static ref OLD_MARKED_RE: Regex =
        Regex::new(r"(?P<actual>.*)_txss").expect("old-dialect marker regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Pre-1.6 files: bare values, `&quot;` for quotes, `#` comments.
    Old,
    /// 1.6+ files: double-quoted values, `"_QQ_"` for quotes, `;` comments.
    New,
}

/// Picks the dialect from the first key-value line; files with none are
/// treated as new-style.
pub fn detect_dialect(text: &str) -> Dialect {
    for line in text.lines() {
        if line.starts_with('#') || line.starts_with(';') || line.trim().is_empty() {
            continue;
        }
        let Some((_, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.starts_with('"') && value.ends_with('"') {
            return Dialect::New;
        }
        return Dialect::Old;
    }
    Dialect::New
}

fn strip_quotes(value: &str) -> &str {
    if value.starts_with('"') && value.ends_with('"') {
        if value.len() >= 2 {
            &value[1..value.len() - 1]
        } else {
            ""
        }
    } else {
        value
    }
}

pub fn unescape_old(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

pub fn unescape_new(value: &str) -> String {
    value
        .replace("\"_QQ_\"", "\"")
        .replace("&quot;", "\"")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

pub fn escape_old(text: &str) -> String {
    text.replace('"', "&quot;")
}

pub fn escape_new(text: &str) -> String {
    text.replace('"', "\"_QQ_\"")
}

/// Joomla INI codec.
pub struct JoomlaCodec;

impl FormatCodec for JoomlaCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Ini
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        let linesep = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let dialect = detect_dialect(&text);
        let mut outcome = ParseOutcome::default();
        let mut template_lines: Vec<String> = Vec::new();
        let mut comment = String::new();

        for line in text.split(linesep) {
            if line.starts_with('#') || line.starts_with(';') {
                if request.is_source {
                    comment.push_str(&line[1..]);
                    comment.push_str(linesep);
                    template_lines.push(line.to_string());
                }
                continue;
            }
            if line.trim().is_empty() {
                comment.clear();
                if request.is_source {
                    template_lines.push(line.to_string());
                }
                continue;
            }
            let Some(separator) = line.find('=') else {
                outcome.warnings.add(
                    line,
                    format!("could not parse line {line:?}: no key-value separator"),
                );
                if request.is_source {
                    template_lines.push(line.to_string());
                }
                continue;
            };
            let key = &line[..separator];
            let raw_value = &line[separator + 1..];
            let (translation, effectively_empty) = match dialect {
                Dialect::New => {
                    let inner = strip_quotes(raw_value.trim());
                    (unescape_new(inner), inner.trim().is_empty())
                }
                Dialect::Old => (unescape_old(raw_value), raw_value.trim().is_empty()),
            };
            if effectively_empty {
                if request.is_source {
                    template_lines.push(line.to_string());
                }
                continue;
            }
            let mut row = GenericTranslation::new(key, translation);
            if request.is_source && !comment.is_empty() {
                row.comment = Some(comment.strip_suffix(linesep).unwrap_or(&comment).to_string());
                comment.clear();
            }
            outcome.stringset.add(row);
            if request.is_source {
                let tag = tags::singular_tag(&tags::entity_hash(key, &[]));
                template_lines.push(match dialect {
                    Dialect::New => format!("{key}=\"{tag}\""),
                    Dialect::Old => format!("{key}={tag}"),
                });
            }
        }

        if request.is_source {
            outcome.template = template_lines.join(linesep);
        }
        Ok(outcome)
    }

    // The real escaping is dialect-dependent and happens in `assemble`.
    fn escape_fn(&self) -> EscapeFn {
        no_escape
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::MarkedSource
    }

    fn assemble(
        &self,
        _ctx: &CompileContext<'_>,
        replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        let dialect = detect_dialect(&content);
        let escape: fn(&str) -> String = match dialect {
            Dialect::New => escape_new,
            Dialect::Old => escape_old,
        };
        let substituted = ANY_TAG_RE.replace_all(&content, |caps: &Captures<'_>| {
            match replacements.get(&caps[0].to_ascii_lowercase()) {
                Some(text) => escape(text),
                None => caps[0].to_string(),
            }
        });
        let commented = match dialect {
            Dialect::New => NEW_MARKED_RE.replace_all(&substituted, "; ${actual}\""),
            Dialect::Old => OLD_MARKED_RE.replace_all(&substituted, "# ${actual}"),
        };
        Ok(commented.into_owned())
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

    const NEW_SOURCE: &str = indoc! {r#"
        ; Greetings
        GREETING="Hello"
        FAREWELL="Goodbye "_QQ_"mate"_QQ_""
        EMPTY=""
    "#};

    const OLD_SOURCE: &str = indoc! {r#"
        # Greetings
        GREETING=Hello
        TITLE=Say &quot;hi&quot;
    "#};

    fn en() -> Language {
        builtin_catalog().language_for("en").unwrap()
    }

    fn fr() -> Language {
        builtin_catalog().language_for("fr").unwrap()
    }

    #[test]
    fn test_detect_dialect() {
        assert_eq!(detect_dialect(NEW_SOURCE), Dialect::New);
        assert_eq!(detect_dialect(OLD_SOURCE), Dialect::Old);
        // Comments do not take part in detection, empty files default new.
        assert_eq!(detect_dialect("; a=b\n"), Dialect::New);
    }

    #[test]
    fn test_parse_new_dialect() {
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&JoomlaCodec, &resource, &en(), NEW_SOURCE.as_bytes()).unwrap();
        let rows = outcome.stringset.strings();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_entity, "GREETING");
        assert_eq!(rows[0].translation, "Hello");
        assert_eq!(rows[0].comment.as_deref(), Some(" Greetings"));
        assert_eq!(rows[1].translation, "Goodbye \"mate\"");
        // The empty value produced no entity and stayed verbatim.
        assert!(outcome.template.contains("EMPTY=\"\""));
        let tag = tags::singular_tag(&tags::entity_hash("GREETING", &[]));
        assert!(outcome.template.contains(&format!("GREETING=\"{tag}\"")));
    }

    #[test]
    fn test_parse_old_dialect() {
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&JoomlaCodec, &resource, &en(), OLD_SOURCE.as_bytes()).unwrap();
        let rows = outcome.stringset.strings();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].source_entity, "TITLE");
        assert_eq!(rows[1].translation, "Say \"hi\"");
        let tag = tags::singular_tag(&tags::entity_hash("TITLE", &[]));
        assert!(outcome.template.contains(&format!("TITLE={tag}")));
    }

    #[test]
    fn test_unsplittable_line_warns_and_survives() {
        let content = "GREETING=\"Hello\"\nnot a key value line\n";
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&JoomlaCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.template.contains("not a key value line"));
    }

    #[test]
    fn test_compile_new_dialect_comments_out_source_fill() {
        let resource = Resource::new("app", "en");
        let source = parse_source(&JoomlaCodec, &resource, &en(), NEW_SOURCE.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source.stringset);

        let translation = parse_translation(
            &JoomlaCodec,
            &resource,
            &fr(),
            b"GREETING=\"Bonjour \"_QQ_\"chef\"_QQ_\"\"\n",
        )
        .unwrap();
        assert_eq!(translation.stringset.strings()[0].translation, "Bonjour \"chef\"");
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &JoomlaCodec,
            &source.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        // Quotes go back out as "_QQ_".
        assert!(compiled.contains("GREETING=\"Bonjour \"_QQ_\"chef\"_QQ_\"\""));
        // The untranslated line is source-filled and commented out.
        assert!(compiled.contains("; FAREWELL=\"Goodbye \"_QQ_\"mate\"_QQ_\"\""));
        assert!(!compiled.contains("_txss"));
    }

    #[test]
    fn test_compile_old_dialect_uses_hash_comments() {
        let resource = Resource::new("app", "en");
        let source = parse_source(&JoomlaCodec, &resource, &en(), OLD_SOURCE.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &source.stringset);

        let translation =
            parse_translation(&JoomlaCodec, &resource, &fr(), b"GREETING=Bonjour\n").unwrap();
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &JoomlaCodec,
            &source.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(compiled.contains("GREETING=Bonjour"));
        assert!(compiled.contains("# TITLE=Say &quot;hi&quot;"));
    }
}
