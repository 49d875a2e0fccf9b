//! Qt Linguist TS.
//!
//! TS files are XML with a `<!DOCTYPE TS>` declaration: `<context>` blocks
//! hold `<message>` elements, each with one `<source>` and usually a
//! `<translation>`. A `numerus="yes"` message carries one `<numerusform>`
//! per plural form of the file's language. The parser buffers each message
//! and splices the surrounding bytes untouched, so locations, comments and
//! the original escaping survive in the template byte for byte.
//!
//! Untranslated messages compile to `<translation type="unfinished">`, the
//! way Qt Linguist saves them, and numerus messages are rebuilt with one
//! form per plural rule of the target language.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use super::xmlutil::{self, ChildSpan, ElementBuffer};
use crate::{
    compilation::{CompileContext, EscapeFn, Replacements},
    error::{CompileError, Error, ParseError},
    formats::I18nMethod,
    handler::{FormatCodec, ParseOutcome, ParseRequest, decode_utf8},
    tags,
    types::GenericTranslation,
};

/// Full XML escape, apostrophes included; Qt Linguist writes `&apos;`.
fn qt_escape(text: &str) -> String {
    escape(text).into_owned()
}

/// One message's children and attributes, resolved against its buffer.
struct Message<'b> {
    buffer: &'b ElementBuffer<'b>,
    source_text: String,
    translation: Option<&'b ChildSpan>,
    translation_type: Option<String>,
    variants: bool,
    numerus: bool,
    entity: String,
    context: Vec<String>,
    occurrences: Option<String>,
    comment: Option<String>,
}

struct Parser<'a> {
    method: I18nMethod,
    request: &'a ParseRequest<'a>,
    text: &'a str,
    outcome: ParseOutcome,
    template: String,
    flushed: usize,
    inside_context: bool,
    context_name: Option<String>,
}

impl<'a> Parser<'a> {
    /// Copies untouched input bytes into the template up to `pos`.
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

    fn handle_message(&mut self, buffer: &ElementBuffer<'_>) -> Result<(), ParseError> {
        let text = self.text;
        let (start, _end) = buffer.range();
        self.flush_to(start);
        self.flushed = buffer.range().1;

        let message_start = match &buffer.events[0] {
            Event::Start(e) => e,
            _ => return Ok(()),
        };
        let numerus = xmlutil::attr_value(message_start, b"numerus").as_deref() == Some("yes");
        let message_id = xmlutil::attr_value(message_start, b"id").filter(|id| !id.is_empty());

        let children = xmlutil::child_spans(buffer);
        let mut source = None;
        let mut source_count = 0;
        let mut translation = None;
        let mut locations = Vec::new();
        let mut comment_text = None;
        let mut extra_comment = None;
        for child in &children {
            match child.name.as_slice() {
                b"source" => {
                    source_count += 1;
                    source = Some(child);
                }
                b"translation" => {
                    if translation.is_none() {
                        translation = Some(child);
                    }
                }
                b"location" => {
                    if let Some(start) = xmlutil::element_start(buffer, child.start) {
                        let filename = xmlutil::attr_value(start, b"filename");
                        let line = xmlutil::attr_value(start, b"line");
                        if let (Some(filename), Some(line)) = (filename, line) {
                            if line.parse::<i64>().is_ok() {
                                locations.push(format!("{filename}:{line}"));
                            }
                        }
                    }
                }
                b"comment" => {
                    let value = xmlutil::span_text(text, buffer, child)?;
                    if !value.is_empty() {
                        comment_text = Some(value);
                    }
                }
                b"extracomment" => {
                    let value = xmlutil::span_text(text, buffer, child)?;
                    if !value.is_empty() {
                        extra_comment = Some(value);
                    }
                }
                _ => {}
            }
        }

        let source = match source {
            Some(span) => span,
            None => {
                return Err(ParseError::syntax(
                    self.method,
                    "message has no source element",
                ));
            }
        };
        if source_count > 1 {
            return Err(ParseError::syntax(
                self.method,
                "message has multiple source elements",
            ));
        }
        let source_text = xmlutil::span_text(text, buffer, source)?;

        let entity = match message_id {
            Some(id) => id,
            None => source_text.clone(),
        };
        if entity.is_empty() {
            self.replay(buffer);
            return Ok(());
        }

        let mut context = match &self.context_name {
            Some(name) if !name.is_empty() => vec![name.clone()],
            _ => Vec::new(),
        };
        if let Some(comment) = &comment_text {
            context.push(comment.clone());
        }

        let translation_start =
            translation.and_then(|span| xmlutil::element_start(buffer, span.start));
        let message = Message {
            buffer,
            source_text,
            translation,
            translation_type: translation_start
                .and_then(|start| xmlutil::attr_value(start, b"type")),
            variants: translation_start
                .and_then(|start| xmlutil::attr_value(start, b"variants"))
                .as_deref()
                == Some("yes"),
            numerus,
            entity,
            context,
            occurrences: if locations.is_empty() {
                None
            } else {
                Some(locations.join(";"))
            },
            comment: extra_comment,
        };
        if self.request.is_source {
            self.source_message(&message)
        } else {
            self.translation_message(&message)
        }
    }

    fn numerusforms(&self, message: &Message<'_>) -> Vec<ChildSpan> {
        match message.translation {
            Some(span) if !span.self_closing() => {
                xmlutil::child_spans_at(message.buffer, span.start)
                    .into_iter()
                    .filter(|child| child.name.as_slice() == b"numerusform")
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    fn forms_have_variants(&self, message: &Message<'_>, forms: &[ChildSpan]) -> bool {
        forms.iter().any(|form| {
            xmlutil::element_start(message.buffer, form.start)
                .and_then(|start| xmlutil::attr_value(start, b"variants"))
                .as_deref()
                == Some("yes")
        })
    }

    fn source_message(&mut self, message: &Message<'_>) -> Result<(), ParseError> {
        if message.variants {
            return Err(ParseError::VariantsInSource);
        }
        if message.translation_type.as_deref() == Some("obsolete") {
            self.replay(message.buffer);
            return Ok(());
        }

        let text = self.text;
        let buffer = message.buffer;
        let range = buffer.range();
        let hash = tags::entity_hash(&message.entity, &message.context);
        let end_tag_at = buffer.spans[buffer.spans.len() - 1].0;
        let mut edits = Vec::new();

        if message.numerus {
            let forms = self.numerusforms(message);
            if self.forms_have_variants(message, &forms) {
                self.replay(buffer);
                return Ok(());
            }
            let rules = &self.request.language.rules;
            if forms.is_empty() {
                for rule in rules.iter().copied() {
                    let mut row =
                        GenericTranslation::new(message.entity.clone(), message.source_text.clone());
                    row.context = message.context.clone();
                    row.occurrences = message.occurrences.clone();
                    row.comment = message.comment.clone();
                    row.rule = rule;
                    row.pluralized = true;
                    self.outcome.stringset.add(row);
                }
                let mut built = String::from("<translation>");
                for slot in 0..rules.len() {
                    built.push_str("<numerusform>");
                    built.push_str(&tags::plural_tag(&hash, slot as u8));
                    built.push_str("</numerusform>");
                }
                built.push_str("</translation>");
                match message.translation {
                    Some(span) => {
                        let from = buffer.spans[span.start].0;
                        let to = buffer.spans[span.end].1;
                        edits.push((from, to, built));
                    }
                    None => edits.push((end_tag_at, end_tag_at, built)),
                }
            } else {
                for (slot, form) in forms.iter().enumerate() {
                    if slot < rules.len() {
                        let form_text = xmlutil::span_text(text, buffer, form)?;
                        let translated = if form_text.is_empty() {
                            message.source_text.clone()
                        } else {
                            form_text
                        };
                        let mut row = GenericTranslation::new(message.entity.clone(), translated);
                        row.context = message.context.clone();
                        row.occurrences = message.occurrences.clone();
                        row.comment = message.comment.clone();
                        row.rule = rules[slot];
                        row.pluralized = true;
                        self.outcome.stringset.add(row);
                    }
                    let tag = tags::plural_tag(&hash, slot as u8);
                    match xmlutil::inner_range(buffer, form) {
                        Some((from, to)) => edits.push((from, to, tag)),
                        None => {
                            let from = buffer.spans[form.start].0;
                            let to = buffer.spans[form.end].1;
                            edits.push((from, to, format!("<numerusform>{tag}</numerusform>")));
                        }
                    }
                }
                self.strip_unfinished(message, &mut edits);
            }
        } else {
            let translation_text = match message.translation {
                Some(span) => xmlutil::span_text(text, buffer, span)?,
                None => String::new(),
            };
            let translated = if !translation_text.is_empty() {
                translation_text
            } else if !message.source_text.is_empty() {
                message.source_text.clone()
            } else {
                message.entity.clone()
            };
            let mut row = GenericTranslation::new(message.entity.clone(), translated);
            row.context = message.context.clone();
            row.occurrences = message.occurrences.clone();
            row.comment = message.comment.clone();
            self.outcome.stringset.add(row);

            let tag = tags::singular_tag(&hash);
            match message.translation {
                Some(span) => match xmlutil::inner_range(buffer, span) {
                    Some((from, to)) => {
                        edits.push((from, to, tag));
                        self.strip_unfinished(message, &mut edits);
                    }
                    None => {
                        let from = buffer.spans[span.start].0;
                        let to = buffer.spans[span.end].1;
                        edits.push((from, to, format!("<translation>{tag}</translation>")));
                    }
                },
                None => {
                    edits.push((end_tag_at, end_tag_at, format!("<translation>{tag}</translation>")));
                }
            }
        }

        let rewritten = xmlutil::splice(text, range, edits);
        self.emit(&rewritten);
        Ok(())
    }

    /// Queues an edit removing `type="unfinished"` from the translation
    /// start tag; the compiled file gets the marker back only where the
    /// target language is still missing text.
    fn strip_unfinished(&self, message: &Message<'_>, edits: &mut Vec<(usize, usize, String)>) {
        if message.translation_type.as_deref() != Some("unfinished") {
            return;
        }
        if let Some(span) = message.translation {
            if let Some(start) = xmlutil::element_start(message.buffer, span.start) {
                let (from, to) = message.buffer.spans[span.start];
                edits.push((from, to, xmlutil::rebuild_start_tag(start, &[b"type"], &[])));
            }
        }
    }

    fn translation_message(&mut self, message: &Message<'_>) -> Result<(), ParseError> {
        let translation = match message.translation {
            Some(span) => span,
            None => return Ok(()),
        };
        if message.variants {
            return Ok(());
        }
        let text = self.text;

        if message.numerus {
            if message.translation_type.is_some() {
                return Ok(());
            }
            let forms = self.numerusforms(message);
            if self.forms_have_variants(message, &forms) {
                return Ok(());
            }
            let rules = &self.request.language.rules;
            if forms.len() != rules.len() {
                self.outcome.warnings.add(
                    format!("nplural:{}", message.source_text),
                    format!(
                        "plural message `{}` has {} forms, expected {} for {}",
                        message.source_text,
                        forms.len(),
                        rules.len(),
                        self.request.language.code
                    ),
                );
                return Ok(());
            }
            let rules = rules.clone();
            for (slot, form) in forms.iter().enumerate() {
                let form_text = xmlutil::span_text(text, message.buffer, form)?;
                if form_text.is_empty() {
                    continue;
                }
                let mut row = GenericTranslation::new(message.entity.clone(), form_text);
                row.context = message.context.clone();
                row.occurrences = message.occurrences.clone();
                row.comment = message.comment.clone();
                row.rule = rules[slot];
                row.pluralized = true;
                self.outcome.stringset.add(row);
            }
            return Ok(());
        }

        let translation_text = xmlutil::span_text(text, message.buffer, translation)?;
        if translation_text.is_empty() {
            return Ok(());
        }
        let mut row = GenericTranslation::new(message.entity.clone(), translation_text);
        row.context = message.context.clone();
        row.occurrences = message.occurrences.clone();
        row.comment = message.comment.clone();
        match message.translation_type.as_deref() {
            None => {
                self.outcome.stringset.add(row);
            }
            Some("unfinished") => {
                row.fuzzy = true;
                self.outcome.suggestions.add(row);
            }
            Some(_) => {}
        }
        Ok(())
    }
}

fn doctype_name(raw: &str) -> &str {
    raw.trim_start()
        .trim_start_matches("<!DOCTYPE")
        .trim_end_matches('>')
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or("")
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
        inside_context: false,
        context_name: None,
    };
    let mut saw_doctype = false;
    let mut root_checked = false;

    loop {
        let event_start = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let event_end = reader.buffer_position() as usize;
        match event {
            Event::Eof => break,
            Event::DocType(_) => {
                let name = doctype_name(&text[event_start..event_end]);
                if name != "TS" {
                    return Err(ParseError::syntax(
                        method,
                        format!("doctype is `{name}`, expected `TS`"),
                    ));
                }
                saw_doctype = true;
            }
            Event::Start(e) => {
                if !root_checked {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name != "TS" {
                        return Err(ParseError::UnexpectedRoot {
                            expected: "TS",
                            found: name,
                        });
                    }
                    if !saw_doctype {
                        return Err(ParseError::syntax(method, "missing `<!DOCTYPE TS>`"));
                    }
                    root_checked = true;
                    continue;
                }
                if e.name().as_ref() == b"context" {
                    parser.inside_context = true;
                    parser.context_name = None;
                } else if e.name().as_ref() == b"name" && parser.inside_context {
                    let buffer = xmlutil::collect_element(
                        &mut reader,
                        Event::Start(e),
                        (event_start, event_end),
                    )?;
                    parser.context_name = Some(xmlutil::element_text(text, &buffer)?);
                } else if e.name().as_ref() == b"message" {
                    let buffer = xmlutil::collect_element(
                        &mut reader,
                        Event::Start(e),
                        (event_start, event_end),
                    )?;
                    parser.handle_message(&buffer)?;
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"message" => {
                    return Err(ParseError::syntax(method, "message has no source element"));
                }
                b"name" if parser.inside_context => {
                    parser.context_name = Some(String::new());
                }
                _ => {}
            },
            Event::End(e) => {
                if e.name().as_ref() == b"context" {
                    parser.inside_context = false;
                    parser.context_name = None;
                }
            }
            _ => {}
        }
    }
    if !root_checked {
        return Err(ParseError::syntax(method, "missing TS root element"));
    }
    parser.flush_to(text.len());
    let mut outcome = parser.outcome;
    if request.is_source {
        outcome.template = parser.template;
    }
    Ok(outcome)
}

/// Rewrites one template message for the target language: numerus messages
/// get one form tag per target rule, untranslated singulars become empty
/// `type="unfinished"` translations, anything unrecognized stays verbatim.
fn rewrite_message(
    content: &str,
    buffer: &ElementBuffer<'_>,
    ctx: &CompileContext<'_>,
    replacements: &Replacements,
) -> Result<String, CompileError> {
    let range = buffer.range();
    let verbatim = content[range.0..range.1].to_string();
    let message_start = match &buffer.events[0] {
        Event::Start(e) => e,
        _ => return Ok(verbatim),
    };
    let numerus = xmlutil::attr_value(message_start, b"numerus").as_deref() == Some("yes");
    let children = xmlutil::child_spans(buffer);
    let translation = match children
        .iter()
        .find(|child| child.name.as_slice() == b"translation")
    {
        Some(span) => span,
        None => return Ok(verbatim),
    };

    if numerus {
        if translation.self_closing() {
            return Ok(verbatim);
        }
        let forms: Vec<_> = xmlutil::child_spans_at(buffer, translation.start)
            .into_iter()
            .filter(|child| child.name.as_slice() == b"numerusform")
            .collect();
        let first = match forms.first() {
            Some(form) => form,
            None => return Ok(verbatim),
        };
        let first_text = xmlutil::span_text(content, buffer, first)?;
        let hash = match tags::PLURAL_TAG_RE.captures(first_text.trim()) {
            Some(caps) => caps[1].to_ascii_lowercase(),
            None => return Ok(verbatim),
        };
        let slots = ctx.language.rules.len();
        let unfinished = (0..slots).any(|slot| {
            replacements
                .get(&tags::plural_tag(&hash, slot as u8))
                .is_none_or(|translated| translated.is_empty())
        });
        let mut rebuilt = String::from(if unfinished {
            "<translation type=\"unfinished\">"
        } else {
            "<translation>"
        });
        for slot in 0..slots {
            rebuilt.push_str("<numerusform>");
            rebuilt.push_str(&tags::plural_tag(&hash, slot as u8));
            rebuilt.push_str("</numerusform>");
        }
        rebuilt.push_str("</translation>");
        let from = buffer.spans[translation.start].0;
        let to = buffer.spans[translation.end].1;
        return Ok(xmlutil::splice(content, range, vec![(from, to, rebuilt)]));
    }

    if translation.self_closing() {
        return Ok(verbatim);
    }
    let inner = xmlutil::span_text(content, buffer, translation)?;
    let tag = inner.trim();
    let is_tag = tags::SINGULAR_TAG_RE
        .find(tag)
        .is_some_and(|found| found.start() == 0 && found.end() == tag.len());
    if !is_tag {
        return Ok(verbatim);
    }
    match replacements.get(&tag.to_ascii_lowercase()) {
        Some(translated) if !translated.is_empty() => Ok(verbatim),
        _ => {
            let from = buffer.spans[translation.start].0;
            let to = buffer.spans[translation.end].1;
            Ok(xmlutil::splice(
                content,
                range,
                vec![(
                    from,
                    to,
                    "<translation type=\"unfinished\"></translation>".to_string(),
                )],
            ))
        }
    }
}

/// Re-escapes apostrophes in the text right before each `closing` tag.
///
/// The template keeps whatever escaping the uploaded file had; Qt Linguist
/// itself writes `&apos;` inside source and translation text, so compiled
/// files are normalized here. Only the span between the last `>` and the
/// closing tag is touched.
fn escape_apostrophes_before(content: &str, closing: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let (mut last, mut from) = (0, 0);
    while let Some(close) = content[from..].find(closing).map(|found| from + found) {
        let segment_start = content[..close].rfind('>').map_or(last, |gt| gt + 1);
        let start = segment_start.max(last);
        out.push_str(&content[last..start]);
        out.push_str(&content[start..close].replace('\'', "&apos;"));
        last = close;
        from = close + closing.len();
    }
    out.push_str(&content[last..]);
    out
}

pub struct QtCodec;

impl FormatCodec for QtCodec {
    fn method(&self) -> I18nMethod {
        I18nMethod::Qt
    }

    fn parse(&self, request: &ParseRequest<'_>) -> Result<ParseOutcome, Error> {
        let text = decode_utf8(self.method(), request.content)?;
        Ok(parse_document(self.method(), request, &text)?)
    }

    fn escape_fn(&self) -> EscapeFn {
        qt_escape
    }

    fn plural(&self) -> bool {
        true
    }

    fn update_plural_hashes(
        &self,
        ctx: &CompileContext<'_>,
        replacements: &Replacements,
        content: String,
    ) -> Result<String, CompileError> {
        let mut reader = Reader::from_str(&content);
        let mut out = String::new();
        let mut flushed = 0usize;
        let mut root_done = false;
        loop {
            let event_start = reader.buffer_position() as usize;
            let event = reader.read_event()?;
            let event_end = reader.buffer_position() as usize;
            match event {
                Event::Eof => break,
                Event::Start(e) if !root_done && e.name().as_ref() == b"TS" => {
                    out.push_str(&content[flushed..event_start]);
                    out.push_str(&xmlutil::rebuild_start_tag(
                        &e,
                        &[b"language"],
                        &[("language", &ctx.language.code)],
                    ));
                    flushed = event_end;
                    root_done = true;
                }
                Event::Start(e) if e.name().as_ref() == b"message" => {
                    let buffer = xmlutil::collect_element(
                        &mut reader,
                        Event::Start(e),
                        (event_start, event_end),
                    )?;
                    let (start, end) = buffer.range();
                    out.push_str(&content[flushed..start]);
                    out.push_str(&rewrite_message(&content, &buffer, ctx, replacements)?);
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
        _ctx: &CompileContext<'_>,
        content: String,
    ) -> Result<String, CompileError> {
        let content = escape_apostrophes_before(&content, "</source>");
        Ok(escape_apostrophes_before(&content, "</translation>"))
    }
}
