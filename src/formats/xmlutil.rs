//! Shared plumbing for the event-based XML codecs (Qt TS and XLIFF).
//!
//! Both codecs read with a borrowing [`Reader`] over the decoded input and
//! rebuild output by splicing byte ranges of that input, so markup they do
//! not touch survives byte for byte. Each element of interest is buffered
//! into an [`ElementBuffer`]: its events plus the byte range every event
//! was read from.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

/// A buffered element: the events from its start tag through its matching
/// end tag, each paired with its byte range in the input.
pub(super) struct ElementBuffer<'a> {
    pub events: Vec<Event<'a>>,
    pub spans: Vec<(usize, usize)>,
}

impl ElementBuffer<'_> {
    /// Byte range of the whole element in the input.
    pub fn range(&self) -> (usize, usize) {
        let start = self.spans.first().map_or(0, |span| span.0);
        let end = self.spans.last().map_or(start, |span| span.1);
        (start, end)
    }
}

/// Reads events through the end tag matching `open`, which must be the
/// `Start` event the caller just consumed at `open_span`.
pub(super) fn collect_element<'a>(
    reader: &mut Reader<&'a [u8]>,
    open: Event<'a>,
    open_span: (usize, usize),
) -> Result<ElementBuffer<'a>, quick_xml::Error> {
    let mut buffer = ElementBuffer {
        events: vec![open],
        spans: vec![open_span],
    };
    let mut depth = 1usize;
    loop {
        let start = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let end = reader.buffer_position() as usize;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => break,
            _ => {}
        }
        buffer.events.push(event);
        buffer.spans.push((start, end));
        if depth == 0 {
            break;
        }
    }
    Ok(buffer)
}

/// A direct child element inside a buffered element, by event index.
/// Self-closing children have `start == end`.
pub(super) struct ChildSpan {
    pub name: Vec<u8>,
    pub start: usize,
    pub end: usize,
}

impl ChildSpan {
    pub fn self_closing(&self) -> bool {
        self.start == self.end
    }
}

/// Direct children of the element starting at event index `root`.
pub(super) fn child_spans_at(buffer: &ElementBuffer<'_>, root: usize) -> Vec<ChildSpan> {
    let mut spans = Vec::new();
    if !matches!(buffer.events.get(root), Some(Event::Start(_))) {
        return spans;
    }
    let mut depth = 1usize;
    let mut open: Option<(Vec<u8>, usize)> = None;
    for (index, event) in buffer.events.iter().enumerate().skip(root + 1) {
        match event {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 {
                    open = Some((e.name().as_ref().to_vec(), index));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some((name, start)) = open.take() {
                        spans.push(ChildSpan {
                            name,
                            start,
                            end: index,
                        });
                    }
                }
                if depth == 1 {
                    break;
                }
                depth -= 1;
            }
            Event::Empty(e) if depth == 1 => {
                spans.push(ChildSpan {
                    name: e.name().as_ref().to_vec(),
                    start: index,
                    end: index,
                });
            }
            _ => {}
        }
    }
    spans
}

/// Direct children of the buffered element itself.
pub(super) fn child_spans(buffer: &ElementBuffer<'_>) -> Vec<ChildSpan> {
    child_spans_at(buffer, 0)
}

/// The start tag event at `index`, whether the element has content or not.
pub(super) fn element_start<'b, 'a>(
    buffer: &'b ElementBuffer<'a>,
    index: usize,
) -> Option<&'b BytesStart<'a>> {
    match buffer.events.get(index) {
        Some(Event::Start(e)) | Some(Event::Empty(e)) => Some(e),
        _ => None,
    }
}

/// Byte range of the content between a child's start and end tags.
/// `None` for self-closing children.
pub(super) fn inner_range(buffer: &ElementBuffer<'_>, span: &ChildSpan) -> Option<(usize, usize)> {
    if span.self_closing() {
        return None;
    }
    Some((buffer.spans[span.start].1, buffer.spans[span.end].0))
}

/// Concatenated unescaped character data inside a child span. Markup of
/// nested elements is dropped, their text is kept.
pub(super) fn span_text(
    text: &str,
    buffer: &ElementBuffer<'_>,
    span: &ChildSpan,
) -> Result<String, quick_xml::Error> {
    let mut out = String::new();
    if span.self_closing() {
        return Ok(out);
    }
    for index in span.start + 1..span.end {
        match &buffer.events[index] {
            Event::Text(t) => out.push_str(&t.unescape()?),
            Event::CData(_) => {
                let (from, to) = buffer.spans[index];
                let raw = &text[from..to];
                let inner = raw
                    .strip_prefix("<![CDATA[")
                    .and_then(|rest| rest.strip_suffix("]]>"))
                    .unwrap_or(raw);
                out.push_str(inner);
            }
            _ => {}
        }
    }
    Ok(out)
}

/// Text of a whole buffered element.
pub(super) fn element_text(
    text: &str,
    buffer: &ElementBuffer<'_>,
) -> Result<String, quick_xml::Error> {
    let span = ChildSpan {
        name: Vec::new(),
        start: 0,
        end: buffer.events.len().saturating_sub(1),
    };
    span_text(text, buffer, &span)
}

/// The unescaped value of an attribute on a start tag. Malformed
/// attributes are skipped, so a broken trailing attribute cannot hide an
/// earlier good one.
pub(super) fn attr_value(start: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .with_checks(false)
        .filter_map(|attr| attr.ok())
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// Rebuilds a start tag from a parsed one, dropping the attributes named
/// in `drop` and appending the `add` pairs at the end. Kept attributes
/// keep their raw escaped bytes.
pub(super) fn rebuild_start_tag(
    start: &BytesStart<'_>,
    drop: &[&[u8]],
    add: &[(&str, &str)],
) -> String {
    let mut tag = String::from("<");
    tag.push_str(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes().with_checks(false).filter_map(|a| a.ok()) {
        if drop.contains(&attr.key.as_ref()) {
            continue;
        }
        tag.push(' ');
        tag.push_str(&String::from_utf8_lossy(attr.key.as_ref()));
        tag.push_str("=\"");
        tag.push_str(&String::from_utf8_lossy(&attr.value));
        tag.push('"');
    }
    for (key, value) in add.iter().copied() {
        tag.push(' ');
        tag.push_str(key);
        tag.push_str("=\"");
        tag.push_str(&escape(value));
        tag.push('"');
    }
    tag.push('>');
    tag
}

/// Applies byte-range replacements to `text[range]`, keeping everything
/// between the edits untouched. Edit ranges must lie inside `range` and
/// must not overlap; an edit with an empty range is an insertion.
pub(super) fn splice(
    text: &str,
    range: (usize, usize),
    mut edits: Vec<(usize, usize, String)>,
) -> String {
    edits.sort_by_key(|edit| edit.0);
    let mut out = String::new();
    let mut cursor = range.0;
    for (from, to, replacement) in edits {
        out.push_str(&text[cursor..from]);
        out.push_str(&replacement);
        cursor = to;
    }
    out.push_str(&text[cursor..range.1]);
    out
}
