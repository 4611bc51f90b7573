// crates/l5x-rungs/src/assembler.rs

//! Splices generated fragments into skeleton documents.
//!
//! The skeleton is streamed once with `quick_xml::Reader` to find the byte
//! ranges of the insertion point and of every previously generated child.
//! The output is then built by copying the skeleton text around those
//! ranges, so everything that is not generated content is reproduced byte
//! for byte.

use crate::error::L5xError;
use crate::fragment::{self, Fragment, Layout};
use crate::log::{DocumentContext, l5x_debug, l5x_info, l5x_warn};
use crate::skeleton::{InsertionPoint, Sentinel, Skeleton};
use crate::types::{AssembledDocuments, LabelFragment, RungFragment};
use quick_xml::Reader;
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use std::ops::Range;

const UTF8_BOM: char = '\u{feff}';
const DEFAULT_INDENT_UNIT: &str = "  ";

/// Result of splicing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spliced {
    pub document: String,
    /// Fragments inserted.
    pub inserted: usize,
    /// Generated children removed from the skeleton.
    pub removed: usize,
    /// Hand-authored children kept at the insertion point.
    pub retained: usize,
}

/// Builds both output documents from the skeletons and the fragment pairs,
/// keeping record order.
pub fn assemble(
    main: &Skeleton,
    labels: &Skeleton,
    fragments: &[(RungFragment, LabelFragment)],
) -> Result<AssembledDocuments, L5xError> {
    let rungs: Vec<&RungFragment> = fragments.iter().map(|(rung, _)| rung).collect();
    let label_entries: Vec<&LabelFragment> = fragments.iter().map(|(_, label)| label).collect();

    let main_out = splice(main, &rungs)?;
    let labels_out = splice(labels, &label_entries)?;

    Ok(AssembledDocuments {
        main: main_out.document,
        labels: labels_out.document,
        generated: main_out.inserted,
        removed: main_out.removed,
    })
}

/// Removes previously generated children at the skeleton's insertion point
/// and appends `fragments` after the remaining content.
///
/// # Errors
/// `L5xError::TemplateStructure` if the insertion point does not exist,
/// `L5xError::XmlParsing` if the skeleton is not well-formed XML.
pub fn splice<F: Fragment>(skeleton: &Skeleton, fragments: &[F]) -> Result<Spliced, L5xError> {
    let ctx = DocumentContext {
        document: skeleton.name(),
    };
    let (bom, body) = match skeleton.source().strip_prefix(UTF8_BOM) {
        Some(rest) => (true, rest),
        None => (false, skeleton.source()),
    };
    let insertion = skeleton.insertion();

    let scan = scan(body, insertion)?;
    if scan.extra_matches > 0 {
        l5x_warn!(
            ctx,
            "{} further elements match '{}'; only the first receives content",
            scan.extra_matches,
            insertion.path
        );
    }
    let container = scan.container.ok_or_else(|| L5xError::TemplateStructure {
        document: skeleton.name().to_string(),
        path: insertion.path.to_string(),
    })?;
    l5x_debug!(
        ctx,
        "Insertion point at byte {}: {} retained, {} generated children",
        container.start,
        container.retained,
        container.removals.len()
    );

    let newline = if body.contains("\r\n") { "\r\n" } else { "\n" };
    let container_indent = line_indent(body, container.start).unwrap_or("");
    let (child_indent, unit) = match container.child_indent {
        Some(child) if child.len() > container_indent.len() && child.starts_with(container_indent) => {
            (child.to_string(), child[container_indent.len()..].to_string())
        }
        Some(child) => (child.to_string(), indent_unit(container_indent).to_string()),
        None => {
            let unit = indent_unit(container_indent);
            (format!("{}{}", container_indent, unit), unit.to_string())
        }
    };
    let layout = Layout {
        newline: newline.to_string(),
        indent: child_indent,
        unit,
    };

    let mut inserted = String::new();
    for (i, item) in fragments.iter().enumerate() {
        inserted.push_str(newline);
        inserted.push_str(&layout.indent);
        inserted.push_str(&fragment::render(
            item,
            container.retained + i,
            &layout,
            &insertion.sentinel,
        )?);
    }

    let mut edits: Vec<(Range<usize>, String)> = container
        .removals
        .iter()
        .map(|range| (range.clone(), String::new()))
        .collect();
    match container.end {
        ContainerEnd::Tag { start: end_start } => {
            let tail = &body[container.last_content_end..end_start];
            if !fragments.is_empty() && !tail.contains('\n') {
                inserted.push_str(newline);
                inserted.push_str(container_indent);
            }
            let at = container.last_content_end;
            edits.push((at..at, inserted));
        }
        ContainerEnd::SelfClosing { end } if !fragments.is_empty() => {
            // `<Name attrs/>` becomes `<Name attrs>...</Name>`.
            let raw = body[container.start + 1..end - 2].trim_end();
            let name = raw.split(|c: char| c.is_whitespace()).next().unwrap_or(raw);
            let expanded = format!(
                "<{}>{}{}{}</{}>",
                raw, inserted, newline, container_indent, name
            );
            edits.push((container.start..end, expanded));
        }
        ContainerEnd::SelfClosing { .. } => {}
    }
    edits.sort_by_key(|(range, _)| (range.start, range.end));

    let extra: usize = edits.iter().map(|(_, s)| s.len()).sum();
    let mut document = String::with_capacity(body.len() + extra + UTF8_BOM.len_utf8());
    if bom {
        document.push(UTF8_BOM);
    }
    let mut cursor = 0;
    for (range, replacement) in &edits {
        document.push_str(&body[cursor..range.start]);
        document.push_str(replacement);
        cursor = range.end;
    }
    document.push_str(&body[cursor..]);

    check_well_formed(&document)?;
    l5x_info!(
        ctx,
        "Inserted {} <{}> elements, removed {} generated",
        fragments.len(),
        insertion.child,
        container.removals.len()
    );

    Ok(Spliced {
        document,
        inserted: fragments.len(),
        removed: container.removals.len(),
        retained: container.retained,
    })
}

/// Parses `xml` to the end, failing on the first well-formedness error. The
/// document must have exactly one root element and no text outside it.
pub fn check_well_formed(xml: &str) -> Result<(), L5xError> {
    let mut reader = Reader::from_str(xml.strip_prefix(UTF8_BOM).unwrap_or(xml));
    let mut open: Vec<String> = Vec::new();
    let mut root: Option<String> = None;
    loop {
        let position = reader.buffer_position();
        let event = reader.read_event()?;
        if open.is_empty() {
            match &event {
                Event::Start(e) | Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some(first) = &root {
                        return Err(L5xError::XmlStructure {
                            position,
                            message: format!("second root element <{}> after <{}>", name, first),
                        });
                    }
                    root = Some(name);
                }
                Event::Text(e) if !e.iter().all(u8::is_ascii_whitespace) => {
                    return Err(L5xError::XmlStructure {
                        position,
                        message: "text outside the root element".into(),
                    });
                }
                Event::CData(_) | Event::GeneralRef(_) => {
                    return Err(L5xError::XmlStructure {
                        position,
                        message: "text outside the root element".into(),
                    });
                }
                _ => {}
            }
        }
        match event {
            Event::Start(e) => open.push(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if let Some(name) = open.pop() {
        return Err(L5xError::XmlParsing(quick_xml::Error::IllFormed(
            IllFormedError::MissingEndTag(name),
        )));
    }
    match root {
        Some(_) => Ok(()),
        None => Err(L5xError::XmlStructure {
            position: reader.buffer_position(),
            message: "no root element".into(),
        }),
    }
}

#[derive(Debug)]
enum ContainerEnd {
    /// Offset of the `</Name>` tag.
    Tag { start: usize },
    /// Offset just past `<Name/>`.
    SelfClosing { end: usize },
}

#[derive(Debug)]
struct Container<'a> {
    /// Offset of the container's `<`.
    start: usize,
    /// Open-element count once the container itself is open.
    depth: usize,
    /// Set until the container's end tag is seen.
    open: bool,
    end: ContainerEnd,
    /// End of the last non-whitespace content seen inside the container.
    last_content_end: usize,
    child_indent: Option<&'a str>,
    removals: Vec<Range<usize>>,
    retained: usize,
}

/// A candidate child that is still open.
#[derive(Debug)]
struct OpenChild {
    start: usize,
    generated: bool,
}

#[derive(Debug, Default)]
struct Scan<'a> {
    container: Option<Container<'a>>,
    extra_matches: usize,
}

fn scan<'a>(body: &'a str, insertion: &InsertionPoint) -> Result<Scan<'a>, L5xError> {
    let path = insertion.path.segments();
    let mut reader = Reader::from_str(body);
    // Whether each open element lies on the insertion path.
    let mut stack: Vec<bool> = Vec::new();
    let mut out = Scan::default();
    let mut child: Option<OpenChild> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;
        // `<` of the markup just read; attribute values cannot contain `<`.
        let tag_start = body[..after].rfind('<').unwrap_or(before);
        let self_closing = matches!(event, Event::Empty(_));
        let depth = stack.len();
        let have_container = out.container.is_some();
        let mut found = None;
        let open = out.container.as_mut().filter(|c| c.open);

        match (event, open) {
            (Event::Eof, _) => break,
            (Event::Start(e) | Event::Empty(e), None) => {
                let on_path = (depth == 0 || stack[depth - 1])
                    && depth < path.len()
                    && path[depth].matches(&e)?;
                if on_path && depth + 1 == path.len() {
                    if have_container {
                        out.extra_matches += 1;
                    } else {
                        found = Some(Container::new(tag_start, after, depth + 1, self_closing));
                    }
                }
                if !self_closing {
                    stack.push(on_path);
                }
            }
            (Event::Start(e), Some(container)) => {
                if depth == container.depth {
                    container.note_child_indent(body, tag_start);
                    if is_child(&e, insertion) {
                        child = Some(OpenChild {
                            start: container.last_content_end,
                            generated: attribute_marks(&e, &insertion.sentinel)?,
                        });
                    }
                }
                stack.push(false);
            }
            (Event::Empty(e), Some(container)) => {
                if depth == container.depth {
                    container.note_child_indent(body, tag_start);
                    if is_child(&e, insertion) {
                        let open = OpenChild {
                            start: container.last_content_end,
                            generated: attribute_marks(&e, &insertion.sentinel)?,
                        };
                        container.close_child(open, after);
                    } else {
                        container.last_content_end = after;
                    }
                }
            }
            (Event::End(_), Some(container)) => {
                stack.pop();
                if depth == container.depth {
                    container.end = ContainerEnd::Tag { start: tag_start };
                    container.open = false;
                } else if depth == container.depth + 1 {
                    match child.take() {
                        Some(open) => container.close_child(open, after),
                        None => container.last_content_end = after,
                    }
                }
            }
            (Event::End(_), None) => {
                stack.pop();
            }
            (Event::Comment(e), Some(container)) => {
                if depth == container.depth {
                    container.last_content_end = after;
                } else if depth == container.depth + 1 {
                    if let (Some(open), Sentinel::XmlComment(marker)) =
                        (child.as_mut(), &insertion.sentinel)
                    {
                        if String::from_utf8_lossy(&e).trim() == marker.trim() {
                            open.generated = true;
                        }
                    }
                }
            }
            (Event::Text(e), Some(container)) => {
                if depth == container.depth && !e.iter().all(u8::is_ascii_whitespace) {
                    container.last_content_end = text_end(body, before);
                }
            }
            (Event::CData(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_), Some(container)) => {
                if depth == container.depth {
                    container.last_content_end = after;
                }
            }
            (_, Some(container)) => {
                // Entity references within text
                if depth == container.depth {
                    container.last_content_end = text_end(body, before);
                }
            }
            (_, None) => {}
        }
        if found.is_some() {
            out.container = found;
        }
    }

    if !stack.is_empty() {
        return Err(L5xError::XmlParsing(quick_xml::Error::IllFormed(
            IllFormedError::MissingEndTag(insertion.path.to_string()),
        )));
    }
    Ok(out)
}

impl<'a> Container<'a> {
    fn new(start: usize, after: usize, depth: usize, self_closing: bool) -> Self {
        Self {
            start,
            depth,
            open: !self_closing,
            end: if self_closing {
                ContainerEnd::SelfClosing { end: after }
            } else {
                ContainerEnd::Tag { start: after }
            },
            last_content_end: after,
            child_indent: None,
            removals: Vec::new(),
            retained: 0,
        }
    }

    /// Remembers the indentation of the first child element that starts on
    /// its own line.
    fn note_child_indent(&mut self, body: &'a str, at: usize) {
        if self.child_indent.is_none() {
            self.child_indent = line_indent(body, at).filter(|_| {
                body[self.last_content_end..at].contains('\n')
            });
        }
    }

    fn close_child(&mut self, open: OpenChild, end: usize) {
        if open.generated {
            self.removals.push(open.start..end);
        } else {
            self.retained += 1;
        }
        self.last_content_end = end;
    }
}

fn is_child(element: &BytesStart<'_>, insertion: &InsertionPoint) -> bool {
    element.name().as_ref() == insertion.child.as_bytes()
}

/// Whether the start tag alone marks the child as generated.
fn attribute_marks(element: &BytesStart<'_>, sentinel: &Sentinel) -> Result<bool, L5xError> {
    match sentinel {
        Sentinel::Any => Ok(true),
        Sentinel::XmlComment(_) => Ok(false),
        Sentinel::Attribute { name, value } => match element.try_get_attribute(name.as_str())? {
            Some(attr) => Ok(attr.unescape_value()? == value.as_str()),
            None => Ok(false),
        },
    }
}

/// Tabs if the container is tab-indented, two spaces otherwise.
fn indent_unit(container_indent: &str) -> &'static str {
    if container_indent.starts_with('\t') {
        "\t"
    } else {
        DEFAULT_INDENT_UNIT
    }
}

/// End of the character data starting at `from`.
fn text_end(body: &str, from: usize) -> usize {
    body[from..].find('<').map_or(body.len(), |i| from + i)
}

/// The whitespace between the start of the line containing `at` and `at`,
/// or `None` if anything else precedes `at` on that line.
fn line_indent(body: &str, at: usize) -> Option<&str> {
    let line_start = body[..at].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &body[line_start..at];
    prefix
        .chars()
        .all(|c| c == ' ' || c == '\t' || c == '\r')
        .then(|| prefix.trim_end_matches('\r'))
}
