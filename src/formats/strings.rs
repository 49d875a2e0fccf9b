//! Apple `.strings` localization files.
//!
//! The file is lexed in one pass with a single regex: an optional
//! `/* comment */`, then `"key" = "value";` with either a quoted key or a
//! bare property name. Anything else between entries is a lexical error
//! reported with its byte offset. Files arrive as UTF-16 (either order,
//! BOM-marked) or UTF-8; compiled output is written back as UTF-16 by the
//! file-writing layer.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    compilation::{CompileContext, EscapeFn, FactoryKind},
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_sniffed},
    tags,
    types::GenericTranslation,
};

lazy_static! {
    static ref ENTRY_RE: Regex = Regex::new(
        r#"(?s)(?:/\*(?P<comment>(?:[^*]|\*[^/])*\**)\*/)?\s*(?:"(?P<key>[^"\\]*(?:\\.[^"\\]*)*)"|(?P<property>\w+))\s*=\s*"(?P<value>[^"\\]*(?:\\.[^"\\]*)*)"\s*;"#
    )
    .expect("strings entry regex");
    static ref MARKED_RE: Regex = Regex::new(
        r#"(?s)(?P<prefix>(?:"(?P<key>[^"\\]*(?:\\.[^"\\]*)*)"|(?P<property>\w+))\s*=\s*"(?P<value>[^"\\]*(?:\\.[^"\\]*)*))_txss(?P<suffix>"\s*;)"#
    )
    .expect("strings marker regex");
}

pub fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Joins backslash-newline continuations, then resolves the escapes the
/// format uses.
pub fn unescape(text: &str) -> String {
    text.replace("\\\n", "")
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

/// Apple `.strings` codec.
pub struct StringsCodec;

impl FormatCodec for StringsCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Strings
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let decoded = decode_sniffed(self.method(), request.content)?;
        let text = decoded.text;
        let mut outcome = ParseOutcome::default();
        let mut gap_cursor = 0;
        let mut splice_cursor = 0;

        for caps in ENTRY_RE.captures_iter(&text) {
            let Some(whole) = caps.get(0) else { continue };
            let gap = &text[gap_cursor..whole.start()];
            if !gap.trim().is_empty() {
                let offset = gap_cursor + (gap.len() - gap.trim_start().len());
                return Err(ParseError::lexical(
                    self.method(),
                    offset,
                    "expected a comment or a key-value entry",
                )
                .into());
            }
            gap_cursor = whole.end();

            let key = match (caps.name("key"), caps.name("property")) {
                (Some(quoted), _) => unescape(quoted.as_str()),
                (None, Some(property)) => property.as_str().to_string(),
                (None, None) => continue,
            };
            let Some(value) = caps.name("value") else { continue };
            let translation = unescape(value.as_str());
            // An empty value means untranslated; the entry survives in the
            // template untouched but produces no string.
            if translation.trim().is_empty() {
                continue;
            }
            if request.is_source {
                let tag = tags::singular_tag(&tags::entity_hash(&key, &[]));
                outcome.template.push_str(&text[splice_cursor..value.start()]);
                outcome.template.push_str(&tag);
                splice_cursor = value.end();
            }
            let mut row = GenericTranslation::new(key, translation);
            if let Some(comment) = caps.name("comment") {
                row.comment = Some(comment.as_str().to_string());
            }
            outcome.stringset.add(row);
        }

        let tail = &text[gap_cursor..];
        if !tail.trim().is_empty() {
            let offset = gap_cursor + (tail.len() - tail.trim_start().len());
            return Err(ParseError::lexical(
                self.method(),
                offset,
                "trailing content after the last entry",
            )
            .into());
        }
        if request.is_source {
            outcome.template.push_str(&text[splice_cursor..]);
        }
        Ok(outcome)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::TranslatedMarkedSource
    }

    fn post_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(MARKED_RE
            .replace_all(&content, "/* ${prefix}${suffix} */")
            .into_owned())
    }
}
