//! Gettext PO and POT.
//!
//! The parser is a line-oriented state machine over `msgctxt` / `msgid` /
//! `msgid_plural` / `msgstr` / `msgstr[N]` keywords with quoted-string
//! continuations. Templates are regenerated entry by entry: comments and ids
//! are kept, msgstr values become placeholder tags, and the header entry
//! passes through untouched. Obsolete (`#~`) entries are dropped.
//!
//! [`PotCodec`] parses identically and compiles empty skeletons.

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};

use crate::{
    compilation::{CompileContext, EscapeFn, FactoryKind, Replacements},
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    language::Language,
    tags,
    types::{GenericTranslation, PluralRule},
};

/// Escapes text for a double-quoted PO value.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolves PO escapes in a single pass, so `\\n` stays a literal
/// backslash-n rather than becoming a newline.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
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

#[derive(Default)]
struct EntryDraft {
    /// Comment lines except flags, raw and in order.
    comment_lines: Vec<String>,
    flags: Vec<String>,
    developer_comment: Vec<String>,
    occurrences: Vec<String>,
    msgctxt: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: Option<String>,
    plural_slots: Vec<(usize, String)>,
}

impl EntryDraft {
    fn fuzzy(&self) -> bool {
        self.flags.iter().any(|flag| flag == "fuzzy")
    }
}

/// Which string field continuation lines append to.
enum Field {
    Msgctxt,
    Msgid,
    MsgidPlural,
    Msgstr,
    MsgstrSlot(usize),
}

struct Parser<'a> {
    method: I18nMethod,
    request: &'a ParseRequest<'a>,
    outcome: ParseOutcome,
    header_seen: bool,
}

pub(crate) fn parse_po(
    method: I18nMethod,
    request: &ParseRequest<'_>,
) -> Result<ParseOutcome, Error> {
    let text = decode_utf8(method, request.content)?;
    let mut parser = Parser {
        method,
        request,
        outcome: ParseOutcome::default(),
        header_seen: false,
    };
    let mut draft = EntryDraft::default();
    let mut field: Option<Field> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if draft.msgid.is_some() {
                parser.finish_entry(std::mem::take(&mut draft))?;
            }
            field = None;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            if rest.starts_with('~') {
                continue;
            }
            if draft.msgid.is_some() {
                parser.finish_entry(std::mem::take(&mut draft))?;
                field = None;
            }
            if let Some(flags) = rest.strip_prefix(',') {
                draft.flags.extend(
                    flags
                        .split(',')
                        .map(|flag| flag.trim().to_string())
                        .filter(|flag| !flag.is_empty()),
                );
            } else {
                if let Some(comment) = rest.strip_prefix('.') {
                    draft.developer_comment.push(comment.trim().to_string());
                } else if let Some(refs) = rest.strip_prefix(':') {
                    draft.occurrences.push(refs.trim().to_string());
                }
                draft.comment_lines.push(trimmed.to_string());
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("msgctxt") {
            if draft.msgid.is_some() {
                parser.finish_entry(std::mem::take(&mut draft))?;
            }
            draft.msgctxt = Some(quoted(method, rest)?);
            field = Some(Field::Msgctxt);
        } else if let Some(rest) = trimmed.strip_prefix("msgid_plural") {
            draft.msgid_plural = Some(quoted(method, rest)?);
            field = Some(Field::MsgidPlural);
        } else if let Some(rest) = trimmed.strip_prefix("msgid") {
            if draft.msgid.is_some() {
                parser.finish_entry(std::mem::take(&mut draft))?;
            }
            draft.msgid = Some(quoted(method, rest)?);
            field = Some(Field::Msgid);
        } else if let Some(rest) = trimmed.strip_prefix("msgstr[") {
            let close = rest
                .find(']')
                .ok_or_else(|| ParseError::syntax(method, format!("bad msgstr index: {trimmed}")))?;
            let index: usize = rest[..close]
                .parse()
                .map_err(|_| ParseError::syntax(method, format!("bad msgstr index: {trimmed}")))?;
            let value = quoted(method, &rest[close + 1..])?;
            draft.plural_slots.push((index, value));
            field = Some(Field::MsgstrSlot(draft.plural_slots.len() - 1));
        } else if let Some(rest) = trimmed.strip_prefix("msgstr") {
            draft.msgstr = Some(quoted(method, rest)?);
            field = Some(Field::Msgstr);
        } else if trimmed.starts_with('"') {
            let value = quoted(method, trimmed)?;
            match field {
                Some(Field::Msgctxt) => append(&mut draft.msgctxt, &value),
                Some(Field::Msgid) => append(&mut draft.msgid, &value),
                Some(Field::MsgidPlural) => append(&mut draft.msgid_plural, &value),
                Some(Field::Msgstr) => append(&mut draft.msgstr, &value),
                Some(Field::MsgstrSlot(i)) => draft.plural_slots[i].1.push_str(&value),
                None => {
                    return Err(ParseError::syntax(
                        method,
                        "string continuation outside an entry",
                    )
                    .into());
                }
            }
        } else {
            return Err(
                ParseError::syntax(method, format!("unrecognized line: {trimmed}")).into(),
            );
        }
    }
    if draft.msgid.is_some() {
        parser.finish_entry(draft)?;
    }
    Ok(parser.outcome)
}

fn append(slot: &mut Option<String>, value: &str) {
    if let Some(text) = slot.as_mut() {
        text.push_str(value);
    }
}

/// Extracts and unescapes the `"..."` payload of a keyword line.
fn quoted(method: I18nMethod, rest: &str) -> Result<String, ParseError> {
    let rest = rest.trim();
    if rest.len() < 2 || !rest.starts_with('"') || !rest.ends_with('"') {
        return Err(ParseError::syntax(
            method,
            format!("expected a quoted string, found: {rest}"),
        ));
    }
    Ok(unescape(&rest[1..rest.len() - 1]))
}

impl Parser<'_> {
    fn finish_entry(&mut self, draft: EntryDraft) -> Result<(), Error> {
        let msgid = draft.msgid.clone().unwrap_or_default();

        if msgid.is_empty() && draft.msgid_plural.is_none() {
            if self.header_seen {
                return Err(
                    ParseError::syntax(self.method, "empty msgid outside the header").into(),
                );
            }
            self.header_seen = true;
            if self.request.is_source {
                self.write_header(&draft);
            }
            return Ok(());
        }
        if draft.msgid_plural.is_some() && draft.msgstr.is_some() {
            return Err(
                ParseError::syntax(self.method, "plural entry with a singular msgstr").into(),
            );
        }
        if draft.msgid_plural.is_none() && !draft.plural_slots.is_empty() {
            return Err(ParseError::syntax(self.method, "msgstr[N] without msgid_plural").into());
        }
        for (position, (index, _)) in draft.plural_slots.iter().enumerate() {
            if *index != position {
                return Err(ParseError::syntax(
                    self.method,
                    "plural forms must be numbered sequentially from 0",
                )
                .into());
            }
        }

        let context: Vec<String> = draft.msgctxt.clone().into_iter().collect();
        let comment = match draft.developer_comment.is_empty() {
            true => None,
            false => Some(draft.developer_comment.join("\n")),
        };
        let occurrences = match draft.occurrences.is_empty() {
            true => None,
            false => Some(draft.occurrences.join(" ")),
        };

        if self.request.is_source {
            self.finish_source_entry(draft, msgid, context, comment, occurrences)
        } else {
            self.finish_translation_entry(draft, msgid, context, comment, occurrences);
            Ok(())
        }
    }

    fn finish_source_entry(
        &mut self,
        draft: EntryDraft,
        msgid: String,
        context: Vec<String>,
        comment: Option<String>,
        occurrences: Option<String>,
    ) -> Result<(), Error> {
        let hash = tags::entity_hash(&msgid, &context);
        if let Some(msgid_plural) = draft.msgid_plural.clone() {
            if draft.plural_slots.len() != 2 {
                return Err(ParseError::SourcePluralSlots {
                    msgid,
                    slots: draft.plural_slots.len(),
                }
                .into());
            }
            // Empty source msgstr slots fall back to the ids themselves.
            let one = match draft.plural_slots[0].1.is_empty() {
                true => msgid.clone(),
                false => draft.plural_slots[0].1.clone(),
            };
            let other = match draft.plural_slots[1].1.is_empty() {
                true => msgid_plural,
                false => draft.plural_slots[1].1.clone(),
            };
            for (rule, text) in [(PluralRule::One, one), (PluralRule::Other, other)] {
                let mut row = GenericTranslation::new(msgid.clone(), text);
                row.context = context.clone();
                row.rule = rule;
                row.pluralized = true;
                row.comment = comment.clone();
                row.occurrences = occurrences.clone();
                self.outcome.stringset.add(row);
            }
        } else {
            let text = match draft.msgstr.clone().unwrap_or_default().is_empty() {
                true => msgid.clone(),
                false => draft.msgstr.clone().unwrap_or_default(),
            };
            let mut row = GenericTranslation::new(msgid, text);
            row.context = context;
            row.comment = comment;
            row.occurrences = occurrences;
            self.outcome.stringset.add(row);
        }
        self.write_entry(&draft, &hash);
        Ok(())
    }

    fn finish_translation_entry(
        &mut self,
        draft: EntryDraft,
        msgid: String,
        context: Vec<String>,
        comment: Option<String>,
        occurrences: Option<String>,
    ) {
        if draft.msgid_plural.is_some() {
            // A fuzzy plural group is dropped outright.
            if draft.fuzzy() {
                return;
            }
            let expected = self.request.language.rules.len();
            if draft.plural_slots.len() != expected {
                self.outcome.warnings.add(
                    format!("nplural:{msgid}"),
                    format!(
                        "plural entry `{msgid}` has {} forms, expected {expected} for {}",
                        draft.plural_slots.len(),
                        self.request.language.code
                    ),
                );
                return;
            }
            for (slot, (_, text)) in draft.plural_slots.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                let mut row = GenericTranslation::new(msgid.clone(), text.clone());
                row.context = context.clone();
                row.rule = self.request.language.rules[slot];
                row.pluralized = true;
                row.comment = comment.clone();
                row.occurrences = occurrences.clone();
                self.outcome.stringset.add(row);
            }
            return;
        }

        let text = draft.msgstr.clone().unwrap_or_default();
        if text.is_empty() {
            return;
        }
        let mut row = GenericTranslation::new(msgid, text);
        row.context = context;
        row.comment = comment;
        row.occurrences = occurrences;
        if draft.fuzzy() {
            row.fuzzy = true;
            self.outcome.suggestions.add(row);
        } else {
            self.outcome.stringset.add(row);
        }
    }

    /// Replays one source entry into the template with its msgstr slots
    /// replaced by placeholder tags. The fuzzy flag never survives into a
    /// template.
    fn write_entry(&mut self, draft: &EntryDraft, hash: &str) {
        let template = &mut self.outcome.template;
        for line in &draft.comment_lines {
            template.push_str(line);
            template.push('\n');
        }
        let flags: Vec<&str> = draft
            .flags
            .iter()
            .map(String::as_str)
            .filter(|flag| *flag != "fuzzy")
            .collect();
        if !flags.is_empty() {
            template.push_str(&format!("#, {}\n", flags.join(", ")));
        }
        if let Some(ctxt) = &draft.msgctxt {
            template.push_str(&format!("msgctxt \"{}\"\n", escape(ctxt)));
        }
        template.push_str(&format!(
            "msgid \"{}\"\n",
            escape(draft.msgid.as_deref().unwrap_or(""))
        ));
        if let Some(plural) = &draft.msgid_plural {
            template.push_str(&format!("msgid_plural \"{}\"\n", escape(plural)));
            for slot in 0..draft.plural_slots.len() {
                template.push_str(&format!(
                    "msgstr[{slot}] \"{}\"\n",
                    tags::plural_tag(hash, slot as u8)
                ));
            }
        } else {
            template.push_str(&format!("msgstr \"{}\"\n", tags::singular_tag(hash)));
        }
        template.push('\n');
    }

    fn write_header(&mut self, draft: &EntryDraft) {
        let template = &mut self.outcome.template;
        for line in &draft.comment_lines {
            template.push_str(line);
            template.push('\n');
        }
        template.push_str("msgid \"\"\n");
        template.push_str("msgstr \"\"\n");
        let value = draft.msgstr.clone().unwrap_or_default();
        for segment in value.split_inclusive('\n') {
            template.push_str(&format!("\"{}\"\n", escape(segment)));
        }
        template.push('\n');
    }
}

lazy_static! {
    static ref HEADER_MSGID_RE: Regex = Regex::new(r#"(?m)^msgid ""$"#).unwrap();
    static ref CONTENT_TYPE_RE: Regex = Regex::new(r#"(?m)^"Content-Type:.*"$"#).unwrap();
    static ref PLURAL_FORMS_RE: Regex = Regex::new(r#"(?m)^"Plural-Forms:.*"$"#).unwrap();
    static ref LANGUAGE_RE: Regex = Regex::new(r#"(?m)^"Language:.*"$"#).unwrap();
    static ref PLURAL_BLOCK_RE: Regex =
        Regex::new(r#"(?m)(?:^msgstr\[\d+\] "(?P<hash>[0-9a-f]{32})_pl_\d+"\n?)+"#)
            .unwrap();
}

/// Rewrites the header entry for the target language: charset pinned to
/// UTF-8, `Plural-Forms` and `Language` set from the catalog. A template
/// without a header entry is left alone.
fn rewrite_header(language: &Language, content: String) -> String {
    let header_end = content.find("\n\n").map(|i| i + 1).unwrap_or(content.len());
    if !HEADER_MSGID_RE.is_match(&content[..header_end]) {
        return content;
    }
    let rest = content[header_end..].to_string();
    let mut header = content[..header_end].to_string();

    let content_type = "\"Content-Type: text/plain; charset=UTF-8\\n\"";
    if CONTENT_TYPE_RE.is_match(&header) {
        header = CONTENT_TYPE_RE
            .replace(&header, NoExpand(content_type))
            .into_owned();
    } else {
        header.push_str(content_type);
        header.push('\n');
    }

    let plural_forms = format!("\"Plural-Forms: {}\\n\"", language.plural_forms_header());
    if PLURAL_FORMS_RE.is_match(&header) {
        header = PLURAL_FORMS_RE
            .replace(&header, NoExpand(&plural_forms))
            .into_owned();
    } else {
        header.push_str(&plural_forms);
        header.push('\n');
    }

    let language_line = format!("\"Language: {}\\n\"", language.code);
    if LANGUAGE_RE.is_match(&header) {
        header = LANGUAGE_RE
            .replace(&header, NoExpand(&language_line))
            .into_owned();
    } else {
        header.push_str(&language_line);
        header.push('\n');
    }

    header + &rest
}

/// Rewrites every `msgstr[N]` run to the target language's slot count.
fn resize_plural_blocks(language: &Language, content: String) -> String {
    PLURAL_BLOCK_RE
        .replace_all(&content, |caps: &regex::Captures<'_>| {
            let hash = &caps["hash"];
            let mut block = String::new();
            for slot in 0..language.rules.len() {
                block.push_str(&format!(
                    "msgstr[{slot}] \"{}\"\n",
                    tags::plural_tag(hash, slot as u8)
                ));
            }
            block
        })
        .into_owned()
}

/// Gettext PO codec.
pub struct PoCodec;

impl FormatCodec for PoCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Po
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_po(self.method(), request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape
    }

    fn plural(&self) -> bool {
        true
    }

    fn pre_compile(
        &self,
        ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(rewrite_header(ctx.language, content))
    }

    fn update_plural_hashes(
        &self,
        ctx: &CompileContext<'_>,
        _replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(resize_plural_blocks(ctx.language, content))
    }
}

/// Gettext POT codec: parses like PO, compiles empty skeletons.
pub struct PotCodec;

impl FormatCodec for PotCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Pot
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        parse_po(self.method(), request)
    }

    fn escape_fn(&self) -> EscapeFn {
        escape
    }

    fn factory_kind(&self) -> FactoryKind {
        FactoryKind::Empty
    }

    fn plural(&self) -> bool {
        true
    }

    fn pre_compile(
        &self,
        ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(rewrite_header(ctx.language, content))
    }

    fn update_plural_hashes(
        &self,
        ctx: &CompileContext<'_>,
        _replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        Ok(resize_plural_blocks(ctx.language, content))
    }
}
