//! The properties family: plain UTF-8, Java, Mozilla and Unicode dialects.
//!
//! All four share the logical-line lexer (backslash continuations, comment
//! lines, key/value separators decided by backslash parity) and differ in
//! encoding and escape rules. The key is the source entity, raw escapes and
//! all; the unescaped value is its text.

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    compilation::{CompileContext, EscapeFn, FactoryKind},
    error::{CompileError, Error},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    tags,
    types::GenericTranslation,
};

/// Key/value separators. A separator only counts when preceded by an even
/// number of backslashes.
const SEPARATORS: [char; 5] = [' ', '\t', '\x0c', '=', ':'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Plain,
    Java,
    Mozilla,
    Unicode,
}

impl Dialect {
    fn unescape(self, value: &str) -> String {
        match self {
            Dialect::Mozilla => unescape_mozilla(value),
            _ => unescape_plain(value),
        }
    }
}

/// Escapes a value for the plain, Java and Unicode dialects.
///
/// Literal two-character escapes fold into their control characters before
/// backslash doubling, then come back out as escapes; without the fold a
/// stored `\t` would double into `\\t`.
pub fn escape_plain(text: &str) -> String {
    let folded = text
        .replace("\\t", "\t")
        .replace("\\f", "\x0c")
        .replace("\\n", "\n")
        .replace("\\r", "\r");
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ':' => out.push_str("\\:"),
            '=' => out.push_str("\\="),
            '!' => out.push_str("\\!"),
            '#' => out.push_str("\\#"),
            '\t' => out.push_str("\\t"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    match out.starts_with(' ') {
        true => format!("\\{out}"),
        false => out,
    }
}

/// Resolves plain-dialect escapes in a single pass; unknown escapes keep
/// their backslash.
pub fn unescape_plain(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(':'),
            Some('#') => out.push('#'),
            Some('!') => out.push('!'),
            Some('=') => out.push('='),
            Some(' ') => out.push(' '),
            Some('t') => out.push('\t'),
            Some('f') => out.push('\x0c'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escapes a value for the Mozilla dialect: control characters become
/// escapes, and every backslash not introducing `u`, `U`, `n`, `r` or `t`
/// is doubled.
pub fn escape_mozilla(text: &str) -> String {
    let converted = text
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    let chars: Vec<char> = converted.chars().collect();
    let mut out = String::with_capacity(converted.len());
    for (i, c) in chars.iter().enumerate() {
        if *c == '\\' {
            match chars.get(i + 1) {
                Some('u') | Some('U') | Some('n') | Some('r') | Some('t') => out.push('\\'),
                _ => out.push_str("\\\\"),
            }
        } else {
            out.push(*c);
        }
    }
    out
}

/// Resolves Mozilla-dialect escapes: `\n`, `\r`, `\t` and `\\` only.
pub fn unescape_mozilla(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same
/// value, which is not what encoding_rs calls latin1 (that is
/// windows-1252, wrong for 0x80..0x9F).
fn decode_latin1(content: &[u8]) -> String {
    content.iter().map(|&b| b as char).collect()
}

/// Replaces `\uXXXX` sequences with their characters, combining surrogate
/// pairs. Lone surrogates become U+FFFD.
fn unfold_unicode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units: Vec<u16> = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if rest.len() >= 6 && rest.as_bytes()[0] == b'\\' && rest.as_bytes()[1] == b'u' {
            let hex = &rest[2..6];
            if hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                if let Ok(unit) = u16::from_str_radix(hex, 16) {
                    units.push(unit);
                    rest = &rest[6..];
                    continue;
                }
            }
        }
        flush_units(&mut units, &mut out);
        let Some(c) = rest.chars().next() else { break };
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    flush_units(&mut units, &mut out);
    out
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    if units.is_empty() {
        return;
    }
    out.extend(
        char::decode_utf16(units.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}

/// Re-encodes characters Java properties files cannot hold verbatim as
/// lowercase `\uXXXX` (code 127..=159 or above 255). Astral characters
/// produce one escape per UTF-16 unit.
fn fold_to_unicode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        let code = c as u32;
        if (127..=159).contains(&code) || code > 255 {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn is_comment_or_blank(line: &str) -> bool {
    let stripped = line.trim_start();
    stripped.is_empty() || stripped.starts_with('#') || stripped.starts_with('!')
}

fn ends_with_unescaped_backslash(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Byte index of the first unescaped separator.
fn split_index(line: &str) -> Option<usize> {
    let mut backslashes = 0usize;
    for (i, c) in line.char_indices() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        if SEPARATORS.contains(&c) && backslashes % 2 == 0 {
            return Some(i);
        }
        backslashes = 0;
    }
    None
}

fn parse_properties(
    method: I18nMethod,
    dialect: Dialect,
    request: &ParseRequest<'_>,
) -> Result<ParseOutcome, Error> {
    let text = match dialect {
        Dialect::Java => unfold_unicode_escapes(&decode_latin1(request.content)),
        _ => decode_utf8(method, request.content)?,
    };
    let mut outcome = ParseOutcome::default();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        if is_comment_or_blank(line) {
            if request.is_source {
                outcome.template.push_str(line);
                outcome.template.push('\n');
            }
            continue;
        }
        let mut logical = line.to_string();
        while ends_with_unescaped_backslash(&logical) {
            logical.pop();
            let Some(next) = lines.next() else { break };
            logical.push_str(next.trim_start());
        }

        let Some(split) = split_index(&logical) else {
            // A line with no separator has no value; it cannot carry a
            // translation.
            if request.is_source {
                outcome.template.push_str(&logical);
                outcome.template.push('\n');
            }
            continue;
        };
        let key = logical[..split].trim_start().to_string();
        let bytes = logical.as_bytes();
        let mut value_start = split;
        while value_start < logical.len() && SEPARATORS.contains(&(bytes[value_start] as char)) {
            value_start += 1;
        }
        let value = &logical[value_start..];

        if value.is_empty() {
            if request.is_source {
                outcome.template.push_str(&logical);
                outcome.template.push('\n');
            }
            continue;
        }

        let row = GenericTranslation::new(key.clone(), dialect.unescape(value));
        if request.is_source {
            let tag = tags::singular_tag(&tags::entity_hash(&key, &[]));
            outcome.template.push_str(&logical[..value_start]);
            outcome.template.push_str(&tag);
            outcome.template.push('\n');
        }
        outcome.stringset.add(row);
    }
    if outcome.template.ends_with('\n') {
        outcome.template.pop();
    }
    Ok(outcome)
}

lazy_static! {
    static ref SOURCE_MARKER_RE: Regex = Regex::new(r"(?P<actual>.*)_txss").unwrap();
}

/// Turns every source-filled line into a comment, dropping the marker.
fn comment_out_source_filled(content: String) -> String {
    SOURCE_MARKER_RE
        .replace_all(&content, "# ${actual}")
        .into_owned()
}

/// Plain UTF-8 properties.
pub struct PropertiesCodec;

impl FormatCodec for PropertiesCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Properties
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_properties(self.method(), Dialect::Plain, request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape_plain
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::MarkedSource
    }

    fn post_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(comment_out_source_filled(content))
    }
}

/// Java ISO-8859-1 properties with `\uXXXX` escapes.
pub struct JavaPropertiesCodec;

impl FormatCodec for JavaPropertiesCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::JavaProperties
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_properties(self.method(), Dialect::Java, request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape_plain
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::MarkedSource
    }

    fn visit_translation(&self, text: String) -> String {
        fold_to_unicode_escapes(&text)
    }

    fn post_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(comment_out_source_filled(content))
    }
}

/// Mozilla UTF-8 properties.
pub struct MozillaPropertiesCodec;

impl FormatCodec for MozillaPropertiesCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::MozillaProperties
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_properties(self.method(), Dialect::Mozilla, request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape_mozilla
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::FillEmpty
    }
}

/// Unicode properties: plain-dialect behavior under its own method name.
pub struct UnicodePropertiesCodec;

impl FormatCodec for UnicodePropertiesCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::UnicodeProperties
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_properties(self.method(), Dialect::Unicode, request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape_plain
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::MarkedSource
    }

    fn post_compile(
        &self,
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(comment_out_source_filled(content))
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

    fn en() -> Language {
        builtin_catalog().language_for("en").unwrap()
    }

    fn fr() -> Language {
        builtin_catalog().language_for("fr").unwrap()
    }

    #[test]
    fn test_escape_plain_specials() {
        assert_eq!(escape_plain("a:b=c"), r"a\:b\=c");
        assert_eq!(escape_plain("warn! #1"), r"warn\! \#1");
        assert_eq!(escape_plain(" leading"), r"\ leading");
        assert_eq!(escape_plain("tab\there"), r"tab\there");
    }

    #[test]
    fn test_escape_plain_folds_literal_escapes() {
        // A stored literal `\t` must not double into `\\t`.
        assert_eq!(escape_plain(r"a\tb"), r"a\tb");
        assert_eq!(escape_plain(r"a\sb"), r"a\\sb");
    }

    #[test]
    fn test_unescape_plain() {
        assert_eq!(unescape_plain(r"a\:b"), "a:b");
        assert_eq!(unescape_plain(r"a\\b"), r"a\b");
        assert_eq!(unescape_plain(r"\ x"), " x");
        assert_eq!(unescape_plain(r"a\tb"), "a\tb");
        assert_eq!(unescape_plain(r"keep\qme"), r"keep\qme");
    }

    #[test]
    fn test_escape_mozilla() {
        assert_eq!(escape_mozilla("line\nbreak"), r"line\nbreak");
        assert_eq!(escape_mozilla(r"keep é"), r"keep é");
        assert_eq!(escape_mozilla(r"path\to"), r"path\\to");
        assert_eq!(escape_mozilla(r"end\"), r"end\\");
    }

    #[test]
    fn test_unescape_mozilla() {
        assert_eq!(unescape_mozilla(r"a\nb"), "a\nb");
        assert_eq!(unescape_mozilla(r"a\\b"), r"a\b");
        assert_eq!(unescape_mozilla(r"a\:b"), r"a\:b");
    }

    #[test]
    fn test_unfold_unicode_escapes() {
        assert_eq!(unfold_unicode_escapes(r"caf\u00e9"), "caf\u{e9}");
        assert_eq!(unfold_unicode_escapes(r"\ud83d\ude00"), "\u{1f600}");
        assert_eq!(unfold_unicode_escapes(r"bad\uzzzz"), r"bad\uzzzz");
        assert_eq!(unfold_unicode_escapes(r"lone\ud83d!"), "lone\u{fffd}!");
    }

    #[test]
    fn test_fold_to_unicode_escapes() {
        assert_eq!(fold_to_unicode_escapes("caf\u{e9}"), "caf\u{e9}");
        assert_eq!(fold_to_unicode_escapes("\u{1f600}"), r"\ud83d\ude00");
        assert_eq!(fold_to_unicode_escapes("\u{80}"), r"\u0080");
        assert_eq!(fold_to_unicode_escapes("\u{2019}"), r"\u2019");
    }

    #[test]
    fn test_parse_source_splits_on_first_unescaped_separator() {
        let content = indoc! {r"
            # Settings
            greeting = Hello
            path\ key:value here
            colon\:in\:key = works
        "};
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 3);
        let rows = outcome.stringset.strings();
        assert_eq!(rows[0].source_entity, "greeting");
        assert_eq!(rows[0].translation, "Hello");
        assert_eq!(rows[1].source_entity, r"path\ key");
        assert_eq!(rows[1].translation, "value here");
        assert_eq!(rows[2].source_entity, r"colon\:in\:key");
    }

    #[test]
    fn test_parse_source_template() {
        let content = "# header\ngreeting = Hello\nempty =\nbare\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), content.as_bytes()).unwrap();
        let tag = tags::singular_tag(&tags::entity_hash("greeting", &[]));
        assert_eq!(
            outcome.template,
            format!("# header\ngreeting = {tag}\nempty =\nbare")
        );
    }

    #[test]
    fn test_continuation_lines_join() {
        let content = "key = one \\\n      two\nnext = x\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.strings()[0].translation, "one two");
        assert_eq!(outcome.stringset.len(), 2);
    }

    #[test]
    fn test_continuation_keeps_escaped_leading_space() {
        let content = "key = one\\\n\\ two\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.strings()[0].translation, "one two");
    }

    #[test]
    fn test_escaped_backslash_does_not_continue() {
        let content = "key = ends here\\\\\nnext = x\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), content.as_bytes()).unwrap();
        assert_eq!(outcome.stringset.len(), 2);
        assert_eq!(outcome.stringset.strings()[0].translation, r"ends here\");
    }

    #[test]
    fn test_java_decodes_latin1_and_unicode_escapes() {
        let content = b"greeting = caf\xe9 \\u2019ok\\u2019\n";
        let resource = Resource::new("app", "en");
        let outcome = parse_source(&JavaPropertiesCodec, &resource, &en(), content).unwrap();
        assert_eq!(
            outcome.stringset.strings()[0].translation,
            "caf\u{e9} \u{2019}ok\u{2019}"
        );
    }

    #[test]
    fn test_comment_out_source_filled() {
        let content = "done = Bonjour\npending = Hello_txss\n".to_string();
        assert_eq!(
            comment_out_source_filled(content),
            "done = Bonjour\n# pending = Hello\n"
        );
    }

    #[test]
    fn test_compile_marks_untranslated_lines_as_comments() {
        let source = "greeting = Hello\nfarewell = Goodbye\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&PropertiesCodec, &resource, &en(), source.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &outcome.stringset);

        let translation = parse_translation(
            &PropertiesCodec,
            &resource,
            &fr(),
            b"greeting = Bonjour\n",
        )
        .unwrap();
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &PropertiesCodec,
            &outcome.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(compiled, "greeting = Bonjour\n# farewell = Goodbye");
    }

    #[test]
    fn test_java_compile_escapes_wide_characters() {
        let source = "quote = right\n";
        let resource = Resource::new("app", "en");
        let outcome =
            parse_source(&JavaPropertiesCodec, &resource, &en(), source.as_bytes()).unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &outcome.stringset);

        let translation = parse_translation(
            &JavaPropertiesCodec,
            &resource,
            &fr(),
            b"quote = droite \\u2019\n",
        )
        .unwrap();
        assert_eq!(
            translation.stringset.strings()[0].translation,
            "droite \u{2019}"
        );
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &JavaPropertiesCodec,
            &outcome.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(compiled, r"quote = droite \u2019");
    }

    #[test]
    fn test_mozilla_fills_untranslated_from_source() {
        let source = "greeting = Hello\nfarewell = Goodbye\n";
        let resource = Resource::new("app", "en");
        let outcome = parse_source(
            &MozillaPropertiesCodec,
            &resource,
            &en(),
            source.as_bytes(),
        )
        .unwrap();
        let mut store = MemoryStore::new();
        store.ingest_source(&resource, &outcome.stringset);

        let translation = parse_translation(
            &MozillaPropertiesCodec,
            &resource,
            &fr(),
            b"greeting = Bonjour\n",
        )
        .unwrap();
        store.ingest_translations(&resource, &fr(), &translation.stringset, false);

        let compiled = compile(
            &MozillaPropertiesCodec,
            &outcome.template,
            &resource,
            &fr(),
            &store,
            &CompileOptions::default(),
        )
        .unwrap();
        // No marker, no comment: the source text fills the gap directly.
        assert_eq!(compiled, "greeting = Bonjour\nfarewell = Goodbye");
    }
}
