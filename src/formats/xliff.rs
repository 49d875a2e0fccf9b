//! XLIFF 1.2.
//!
//! An `<xliff>` root wraps one or more `<file>` elements, each carrying
//! `original`, `source-language` and `datatype` attributes that become the
//! context of every trans-unit inside it. Gettext-style plurals arrive as
//! `<group restype="x-gettext-plurals">` whose trans-unit ids share a
//! prefix and count up `[0]`, `[1]`, ... one unit per plural form.
//!
//! Like the TS codec this one splices the original bytes, so headers,
//! context-groups and notes pass into the template untouched. Missing
//! `<target>` elements are created right after the `<source>`, reusing the
//! source's indentation.

use std::collections::HashSet;

use lazy_static::lazy_static;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::xmlutil::{self, ChildSpan, ElementBuffer};
use crate::{
    compilation::{CompileContext, EscapeFn, Replacements},
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    language::{Language, LanguageCatalog, builtin_catalog},
    tags,
    types::{GenericTranslation, PluralRule},
};

lazy_static! {
    /// Plural-group trans-unit ids: a shared prefix plus a `[n]` suffix.
    static ref PLURAL_UNIT_ID_RE: Regex =
        Regex::new(r"^(.+)\[(\d)\]$").expect("plural unit id regex");

    /// A target that ended up empty after substitution, with the
    /// whitespace run that indents it.
    static ref EMPTY_TARGET_RE: Regex =
        Regex::new(r"(?:\r?\n[ \t]*)?<target(?:\s[^>]*)?>\s*</target>").expect("empty target regex");

    /// Any target element at all; compiles back to the source language
    /// drop every one of them.
    static ref ANY_TARGET_RE: Regex =
        Regex::new(r"(?s)(?:\r?\n[ \t]*)?<target(?:\s[^>]*)?>.*?</target>").expect("any target regex");
}

/// Full XML escape, quotes and apostrophes included.
fn xliff_escape(text: &str) -> String {
    escape(text).into_owned()
}

/// One trans-unit of a plural group, with its source and target resolved.
struct GroupUnit {
    source: ChildSpan,
    source_text: String,
    target: Option<ChildSpan>,
    target_text: String,
}

struct Parser<'a> {
    method: I18nMethod,
    request: &'a ParseRequest<'a>,
    text: &'a str,
    outcome: ParseOutcome,
    template: String,
    flushed: usize,
    /// [original, source language code, datatype] of the enclosing file.
    context_base: Vec<String>,
    seen_ids: HashSet<String>,
}

impl<'a> Parser<'a> {
    fn flush_to(&mut self, pos: usize) {
        if self.request.is_source {
            self.template.push_str(&self.text[self.flushed..pos]);
        }
        self.flushed = pos;
    }

    fn emit(&mut self, rewritten: &str) {
        if self.request.is_source {
            self.template.push_str(rewritten);
        }
    }

    fn replay(&mut self, buffer: &ElementBuffer<'_>) {
        let (start, end) = buffer.range();
        let text = self.text;
        self.emit(&text[start..end]);
    }

    /// Validates a `<file>` element's language attributes and resets the
    /// per-file state.
    fn enter_file(&mut self, start: &BytesStart<'_>) -> Result<(), ParseError> {
        let original = xmlutil::attr_value(start, b"original").ok_or_else(|| {
            ParseError::syntax(self.method, "file element has no `original` attribute")
        })?;
        let datatype = xmlutil::attr_value(start, b"datatype").ok_or_else(|| {
            ParseError::syntax(self.method, "file element has no `datatype` attribute")
        })?;
        let source_code = xmlutil::attr_value(start, b"source-language").ok_or_else(|| {
            ParseError::syntax(self.method, "file element has no `source-language` attribute")
        })?;

        let catalog = builtin_catalog();
        let expected = match catalog.language_for(&self.request.resource.source_language) {
            Ok(language) => language.code,
            Err(_) => self.request.resource.source_language.clone(),
        };
        let file_language = match catalog.language_for(&source_code) {
            Ok(language) => language,
            Err(_) => {
                return Err(ParseError::SourceLanguageMismatch {
                    expected,
                    found: source_code,
                });
            }
        };
        if file_language.code != expected {
            return Err(ParseError::SourceLanguageMismatch {
                expected,
                found: file_language.code,
            });
        }
        if let Some(target_code) = xmlutil::attr_value(start, b"target-language") {
            if let Ok(target) = catalog.language_for(&target_code) {
                if target.code != self.request.language.code {
                    return Err(ParseError::TargetLanguageMismatch {
                        expected: self.request.language.code.clone(),
                        found: target.code,
                    });
                }
            }
        }

        self.context_base = vec![original, file_language.code, datatype];
        self.seen_ids.clear();
        Ok(())
    }

    /// Location pairs from `context-group purpose="location"` children,
    /// deduplicated in order and joined `file:line, file:line`.
    fn occurrences_in(
        &self,
        buffer: &ElementBuffer<'_>,
        children: &[ChildSpan],
    ) -> Result<Option<String>, ParseError> {
        let text = self.text;
        let mut pairs: Vec<String> = Vec::new();
        for group in children
            .iter()
            .filter(|child| child.name.as_slice() == b"context-group")
        {
            let purpose = xmlutil::element_start(buffer, group.start)
                .and_then(|start| xmlutil::attr_value(start, b"purpose"));
            if purpose.as_deref() != Some("location") {
                continue;
            }
            let mut sourcefile = None;
            let mut linenumber = None;
            for context in xmlutil::child_spans_at(buffer, group.start) {
                if context.name.as_slice() != b"context" {
                    continue;
                }
                let context_type = xmlutil::element_start(buffer, context.start)
                    .and_then(|start| xmlutil::attr_value(start, b"context-type"));
                let value = xmlutil::span_text(text, buffer, &context)?;
                match context_type.as_deref() {
                    Some("sourcefile") => sourcefile = Some(value),
                    Some("linenumber") => linenumber = Some(value),
                    _ => {}
                }
            }
            if let (Some(file), Some(line)) = (sourcefile, linenumber) {
                let pair = format!("{file}:{line}");
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        Ok(if pairs.is_empty() {
            None
        } else {
            Some(pairs.join(", "))
        })
    }

    /// Developer notes joined with newlines.
    fn comment_in(
        &self,
        buffer: &ElementBuffer<'_>,
        children: &[ChildSpan],
    ) -> Result<Option<String>, ParseError> {
        let text = self.text;
        let mut notes = Vec::new();
        for note in children
            .iter()
            .filter(|child| child.name.as_slice() == b"note")
        {
            let from = xmlutil::element_start(buffer, note.start)
                .and_then(|start| xmlutil::attr_value(start, b"from"));
            if from.as_deref() != Some("developer") {
                continue;
            }
            let value = xmlutil::span_text(text, buffer, note)?;
            if !value.is_empty() {
                notes.push(value);
            }
        }
        Ok(if notes.is_empty() {
            None
        } else {
            Some(notes.join("\n"))
        })
    }

    /// Edit inserting a fresh target after the source, indented like it.
    fn created_target(
        &self,
        buffer: &ElementBuffer<'_>,
        source: &ChildSpan,
        tag: String,
    ) -> (usize, usize, String) {
        let at = buffer.spans[source.end].1;
        let indent = match source
            .start
            .checked_sub(1)
            .and_then(|index| buffer.events.get(index).map(|event| (index, event)))
        {
            Some((index, Event::Text(_))) => {
                let (from, to) = buffer.spans[index];
                let slice = &self.text[from..to];
                if slice.trim().is_empty() { slice } else { "" }
            }
            _ => "",
        };
        (at, at, format!("{indent}<target>{tag}</target>"))
    }

    fn handle_unit(&mut self, buffer: &ElementBuffer<'_>) -> Result<(), ParseError> {
        let text = self.text;
        let (start, end) = buffer.range();
        self.flush_to(start);
        self.flushed = end;
        if self.context_base.is_empty() {
            self.replay(buffer);
            return Ok(());
        }

        let unit_start = match &buffer.events[0] {
            Event::Start(e) => e,
            _ => {
                self.replay(buffer);
                return Ok(());
            }
        };
        let unit_id = xmlutil::attr_value(unit_start, b"id").unwrap_or_default();
        if unit_id.is_empty() {
            self.replay(buffer);
            return Ok(());
        }
        let approved_no = xmlutil::attr_value(unit_start, b"approved").as_deref() == Some("no");
        if !self.seen_ids.insert(unit_id.clone()) {
            self.replay(buffer);
            return Ok(());
        }

        let children = xmlutil::child_spans(buffer);
        let source = match children
            .iter()
            .find(|child| child.name.as_slice() == b"source")
        {
            Some(span) => span,
            None => {
                return Err(ParseError::syntax(
                    self.method,
                    format!("trans-unit `{unit_id}` has no source element"),
                ));
            }
        };
        let source_text = xmlutil::span_text(text, buffer, source)?;
        if source_text.is_empty() {
            self.replay(buffer);
            return Ok(());
        }
        let target = children
            .iter()
            .find(|child| child.name.as_slice() == b"target");
        let translation_text = match target {
            Some(span) => xmlutil::span_text(text, buffer, span)?,
            None => String::new(),
        };

        let occurrences = self.occurrences_in(buffer, &children)?;
        let comment = self.comment_in(buffer, &children)?;
        let mut context = self.context_base.clone();
        context.push(unit_id);

        if self.request.is_source {
            let tag = tags::singular_tag(&tags::entity_hash(&source_text, &context));
            let edit = match target {
                Some(span) => match xmlutil::inner_range(buffer, span) {
                    Some((from, to)) => (from, to, tag),
                    None => {
                        let from = buffer.spans[span.start].0;
                        let to = buffer.spans[span.end].1;
                        (from, to, format!("<target>{tag}</target>"))
                    }
                },
                None => self.created_target(buffer, source, tag),
            };
            let rewritten = xmlutil::splice(text, (start, end), vec![edit]);
            self.emit(&rewritten);
            if !translation_text.is_empty() && translation_text.trim().is_empty() {
                return Ok(());
            }
            let translated = if translation_text.is_empty() {
                source_text.clone()
            } else {
                translation_text
            };
            let mut row = GenericTranslation::new(source_text, translated);
            row.context = context;
            row.occurrences = occurrences;
            row.comment = comment;
            self.outcome.stringset.add(row);
            return Ok(());
        }

        if translation_text.is_empty() {
            return Ok(());
        }
        let mut row = GenericTranslation::new(source_text, translation_text);
        row.context = context;
        row.occurrences = occurrences;
        if approved_no {
            row.fuzzy = true;
            self.outcome.suggestions.add(row);
        } else {
            row.comment = comment;
            self.outcome.stringset.add(row);
        }
        Ok(())
    }

    fn handle_group(&mut self, buffer: &ElementBuffer<'_>) -> Result<(), ParseError> {
        let text = self.text;
        let (start, end) = buffer.range();
        self.flush_to(start);
        self.flushed = end;
        if self.context_base.is_empty() {
            self.replay(buffer);
            return Ok(());
        }

        let children = xmlutil::child_spans(buffer);
        let units: Vec<&ChildSpan> = children
            .iter()
            .filter(|child| child.name.as_slice() == b"trans-unit")
            .collect();
        if units.is_empty() {
            self.replay(buffer);
            return Ok(());
        }

        let mut common_id = String::new();
        for (slot, unit) in units.iter().enumerate() {
            let unit_id = xmlutil::element_start(buffer, unit.start)
                .and_then(|unit_start| xmlutil::attr_value(unit_start, b"id"))
                .unwrap_or_default();
            let fits = match PLURAL_UNIT_ID_RE.captures(&unit_id) {
                Some(caps) => {
                    let prefix_ok = if slot == 0 {
                        common_id = caps[1].to_string();
                        true
                    } else {
                        caps[1] == common_id
                    };
                    prefix_ok && caps[2].parse::<usize>() == Ok(slot)
                }
                None => false,
            };
            if !fits {
                self.outcome.warnings.add(
                    format!("plural-id:{unit_id}"),
                    format!("trans-unit `{unit_id}` breaks its plural group numbering"),
                );
                self.replay(buffer);
                return Ok(());
            }
            if !self.seen_ids.insert(unit_id) {
                self.replay(buffer);
                return Ok(());
            }
        }

        let rules = self.request.language.rules.clone();
        if units.len() != rules.len() {
            if !self.request.is_source {
                self.outcome.warnings.add(
                    format!("nplural:{common_id}"),
                    format!(
                        "plural group `{common_id}` has {} trans-units, expected {} for {}",
                        units.len(),
                        rules.len(),
                        self.request.language.code
                    ),
                );
            }
            self.replay(buffer);
            return Ok(());
        }

        let mut parts = Vec::with_capacity(units.len());
        for unit in &units {
            let mut source = None;
            let mut target = None;
            for child in xmlutil::child_spans_at(buffer, unit.start) {
                match child.name.as_slice() {
                    b"source" if source.is_none() => source = Some(child),
                    b"target" if target.is_none() => target = Some(child),
                    _ => {}
                }
            }
            let source = match source {
                Some(span) => span,
                None => {
                    return Err(ParseError::syntax(
                        self.method,
                        format!("plural group `{common_id}` trans-unit has no source element"),
                    ));
                }
            };
            let source_text = xmlutil::span_text(text, buffer, &source)?;
            let target_text = match &target {
                Some(span) => xmlutil::span_text(text, buffer, span)?,
                None => String::new(),
            };
            parts.push(GroupUnit {
                source,
                source_text,
                target,
                target_text,
            });
        }

        // The group is named after its singular form.
        let one_slot = rules
            .iter()
            .position(|rule| *rule == PluralRule::One)
            .unwrap_or(0);
        let group_source = parts[one_slot].source_text.clone();
        if group_source.is_empty() {
            self.replay(buffer);
            return Ok(());
        }
        let mut context = self.context_base.clone();
        context.push(common_id);

        if self.request.is_source {
            let occurrences = self.occurrences_in(buffer, &children)?;
            let hash = tags::entity_hash(&group_source, &context);
            let mut edits = Vec::new();
            for (slot, part) in parts.iter().enumerate() {
                let tag = tags::plural_tag(&hash, slot as u8);
                let edit = match &part.target {
                    Some(span) => match xmlutil::inner_range(buffer, span) {
                        Some((from, to)) => (from, to, tag),
                        None => {
                            let from = buffer.spans[span.start].0;
                            let to = buffer.spans[span.end].1;
                            (from, to, format!("<target>{tag}</target>"))
                        }
                    },
                    None => self.created_target(buffer, &part.source, tag),
                };
                edits.push(edit);
                if !part.target_text.is_empty() && part.target_text.trim().is_empty() {
                    continue;
                }
                let translated = if part.target_text.is_empty() {
                    part.source_text.clone()
                } else {
                    part.target_text.clone()
                };
                let mut row = GenericTranslation::new(group_source.clone(), translated);
                row.context = context.clone();
                row.occurrences = occurrences.clone();
                row.rule = rules[slot];
                row.pluralized = true;
                self.outcome.stringset.add(row);
            }
            let rewritten = xmlutil::splice(text, (start, end), edits);
            self.emit(&rewritten);
            return Ok(());
        }

        for (slot, part) in parts.iter().enumerate() {
            if part.target_text.is_empty() {
                continue;
            }
            let mut row = GenericTranslation::new(group_source.clone(), part.target_text.clone());
            row.context = context.clone();
            row.rule = rules[slot];
            row.pluralized = true;
            self.outcome.stringset.add(row);
        }
        Ok(())
    }
}

fn parse_document(
    method: I18nMethod,
    request: &ParseRequest<'_>,
    text: &str,
) -> Result<ParseOutcome, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut parser = Parser {
        method,
        request,
        text,
        outcome: ParseOutcome::default(),
        template: String::new(),
        flushed: 0,
        context_base: Vec::new(),
        seen_ids: HashSet::new(),
    };
    let mut root_checked = false;

    loop {
        let event_start = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let event_end = reader.buffer_position() as usize;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                if !root_checked {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name != "xliff" {
                        return Err(ParseError::UnexpectedRoot {
                            expected: "xliff",
                            found: name,
                        });
                    }
                    if xmlutil::attr_value(&e, b"version").is_none() {
                        return Err(ParseError::MissingXliffVersion);
                    }
                    root_checked = true;
                    continue;
                }
                if e.name().as_ref() == b"file" {
                    parser.enter_file(&e)?;
                } else if e.name().as_ref() == b"group" {
                    if xmlutil::attr_value(&e, b"restype").as_deref() == Some("x-gettext-plurals") {
                        let buffer = xmlutil::collect_element(
                            &mut reader,
                            Event::Start(e),
                            (event_start, event_end),
                        )?;
                        parser.handle_group(&buffer)?;
                    }
                } else if e.name().as_ref() == b"trans-unit" {
                    let buffer = xmlutil::collect_element(
                        &mut reader,
                        Event::Start(e),
                        (event_start, event_end),
                    )?;
                    parser.handle_unit(&buffer)?;
                }
            }
            Event::Empty(e) => {
                if !root_checked {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name != "xliff" {
                        return Err(ParseError::UnexpectedRoot {
                            expected: "xliff",
                            found: name,
                        });
                    }
                    if xmlutil::attr_value(&e, b"version").is_none() {
                        return Err(ParseError::MissingXliffVersion);
                    }
                    root_checked = true;
                    continue;
                }
                if e.name().as_ref() == b"file" {
                    parser.enter_file(&e)?;
                }
            }
            _ => {}
        }
    }
    if !root_checked {
        return Err(ParseError::syntax(method, "missing xliff root element"));
    }
    parser.flush_to(text.len());
    let mut outcome = parser.outcome;
    if request.is_source {
        outcome.template = parser.template;
    }
    Ok(outcome)
}

/// Rebuilds one plural group's trans-units to the target language's
/// cardinality. Units whose rule exists in the source language are reused
/// and renumbered; rules the source lacks clone the source's `Other` unit.
/// Groups that do not look like untouched template output stay verbatim.
fn rewrite_group(
    content: &str,
    buffer: &ElementBuffer<'_>,
    ctx: &CompileContext<'_>,
    source_language: &Language,
) -> Result<String, CompileError> {
    let range = buffer.range();
    let verbatim = content[range.0..range.1].to_string();
    let source_rules = &source_language.rules;

    let children = xmlutil::child_spans(buffer);
    let units: Vec<&ChildSpan> = children
        .iter()
        .filter(|child| child.name.as_slice() == b"trans-unit")
        .collect();
    if units.len() != source_rules.len() {
        return Ok(verbatim);
    }

    let mut common_id = String::new();
    let mut group_hash = String::new();
    let mut unit_tags = Vec::with_capacity(units.len());
    for (slot, unit) in units.iter().enumerate() {
        let unit_id = xmlutil::element_start(buffer, unit.start)
            .and_then(|unit_start| xmlutil::attr_value(unit_start, b"id"))
            .unwrap_or_default();
        match PLURAL_UNIT_ID_RE.captures(&unit_id) {
            Some(caps) => {
                if slot == 0 {
                    common_id = caps[1].to_string();
                } else if caps[1] != common_id {
                    return Ok(verbatim);
                }
                if caps[2].parse::<usize>() != Ok(slot) {
                    return Ok(verbatim);
                }
            }
            None => return Ok(verbatim),
        }
        let target = xmlutil::child_spans_at(buffer, unit.start)
            .into_iter()
            .find(|child| child.name.as_slice() == b"target");
        let target = match target {
            Some(span) => span,
            None => return Ok(verbatim),
        };
        let target_text = xmlutil::span_text(content, buffer, &target)?;
        let tag = target_text.trim().to_string();
        let matched = match tags::PLURAL_TAG_RE.find(&tag) {
            Some(found) if found.start() == 0 && found.end() == tag.len() => {
                found.as_str().to_string()
            }
            _ => return Ok(verbatim),
        };
        let unit_hash = matched[..32].to_ascii_lowercase();
        if slot == 0 {
            group_hash = unit_hash;
        } else if unit_hash != group_hash {
            return Ok(verbatim);
        }
        unit_tags.push(matched);
    }

    let unit_slices: Vec<&str> = units
        .iter()
        .map(|unit| &content[buffer.spans[unit.start].0..buffer.spans[unit.end].1])
        .collect();
    let separator = if units.len() >= 2 {
        &content[buffer.spans[units[0].end].1..buffer.spans[units[1].start].0]
    } else {
        &content[buffer.spans[0].1..buffer.spans[units[0].start].0]
    };

    let other_slot = source_rules
        .iter()
        .position(|rule| *rule == PluralRule::Other)
        .unwrap_or(source_rules.len() - 1);
    let mut rebuilt = Vec::with_capacity(ctx.language.rules.len());
    for (slot, rule) in ctx.language.rules.iter().enumerate() {
        let source_slot = source_rules
            .iter()
            .position(|source_rule| source_rule == rule)
            .unwrap_or(other_slot);
        let renumbered = unit_slices[source_slot]
            .replace(
                &format!("id=\"{common_id}[{source_slot}]\""),
                &format!("id=\"{common_id}[{slot}]\""),
            )
            .replace(
                &format!("id='{common_id}[{source_slot}]'"),
                &format!("id='{common_id}[{slot}]'"),
            )
            .replace(&unit_tags[source_slot], &tags::plural_tag(&group_hash, slot as u8));
        rebuilt.push(renumbered);
    }

    let from = buffer.spans[units[0].start].0;
    let to = buffer.spans[units[units.len() - 1].end].1;
    Ok(xmlutil::splice(
        content,
        range,
        vec![(from, to, rebuilt.join(separator))],
    ))
}

pub struct XliffCodec;

impl FormatCodec for XliffCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Xliff
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        Ok(parse_document(self.method(), request, &text)?)
    }

    fn escape_fn(&self) -> EscapeFn {
        xliff_escape
    }

    fn plural(&self) -> bool {
        true
    }

    fn update_plural_hashes(
        &self,
        ctx: &CompileContext<'_>,
        _replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        let source_language = match builtin_catalog().language_for(&ctx.resource.source_language) {
            Ok(language) => language,
            Err(_) => return Ok(content),
        };
        if ctx.language.code == source_language.code {
            return Ok(content);
        }
        let mut reader = Reader::from_str(&content);
        let mut out = String::new();
        let mut flushed = 0usize;
        loop {
            let event_start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let event_end = reader.buffer_position() as usize;
            match event {
                Event::Eof => break,
                Event::Start(e)
                    if e.name().as_ref() == b"group"
                        && xmlutil::attr_value(&e, b"restype").as_deref()
                            == Some("x-gettext-plurals") =>
                {
                    let buffer = xmlutil::collect_element(
                        &mut reader,
                        Event::Start(e),
                        (event_start, event_end),
                    )?;
                    let (start, end) = buffer.range();
                    out.push_str(&content[flushed..start]);
                    out.push_str(&rewrite_group(&content, &buffer, ctx, &source_language)?);
                    flushed = end;
                }
                _ => {}
            }
        }
        out.push_str(&content[flushed..]);
        Ok(out)
    }

    fn post_compile(
        &self,
        ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        let compiling_source = match builtin_catalog().language_for(&ctx.resource.source_language) {
            Ok(language) => language.code == ctx.language.code,
            Err(_) => false,
        };
        let cleaned = if compiling_source {
            ANY_TARGET_RE.replace_all(&content, "")
        } else {
            EMPTY_TARGET_RE.replace_all(&content, "")
        };
        Ok(cleaned.into_owned())
    }
}
