// crates/l5x-rungs/src/fragment.rs

//! Serializes generated rungs and labels into XML text with `quick-xml`.
//!
//! Free text (rung comments, rung logic, label text) is always written as
//! CDATA so it is never reparsed as markup. Attribute values go through
//! `quick-xml`'s attribute escaping.

use crate::error::L5xError;
use crate::skeleton::Sentinel;
use crate::types::{LabelFragment, RungFragment};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use std::io;

/// Whitespace conventions of the document a fragment is inserted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// `"\n"` or `"\r\n"`.
    pub newline: String,
    /// Indentation of the fragment's own start and end tags.
    pub indent: String,
    /// One level of nesting inside the fragment.
    pub unit: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            newline: "\n".into(),
            indent: String::new(),
            unit: "  ".into(),
        }
    }
}

/// Something the assembler can insert at an insertion point.
pub trait Fragment {
    /// Writes the fragment. `number` is its 0-based position among the
    /// children of the insertion point.
    fn write(&self, out: &mut FragmentWriter<'_>, number: usize) -> Result<(), L5xError>;
}

impl<T: Fragment + ?Sized> Fragment for &T {
    fn write(&self, out: &mut FragmentWriter<'_>, number: usize) -> Result<(), L5xError> {
        (**self).write(out, number)
    }
}

impl Fragment for RungFragment {
    fn write(&self, out: &mut FragmentWriter<'_>, number: usize) -> Result<(), L5xError> {
        let number = number.to_string();
        let mut start = BytesStart::new("Rung");
        start.push_attribute(("Use", "Target"));
        start.push_attribute(("Number", number.as_str()));
        start.push_attribute(("Type", "N"));
        out.start(start)?;
        if let Some(comment) = &self.comment {
            out.cdata_element("Comment", comment)?;
        }
        out.cdata_element("Text", &self.logic)?;
        out.end("Rung")
    }
}

impl Fragment for LabelFragment {
    fn write(&self, out: &mut FragmentWriter<'_>, _number: usize) -> Result<(), L5xError> {
        let mut start = BytesStart::new("Label");
        start.push_attribute(("Device", self.device_id.as_str()));
        start.push_attribute(("Tag", self.tag.as_str()));
        out.start(start)?;
        out.cdata_element("Text", &self.text)?;
        out.end("Label")
    }
}

/// Thin wrapper over `quick_xml::Writer` that knows the target layout and
/// stamps the sentinel on every top-level element it opens.
pub struct FragmentWriter<'a> {
    writer: Writer<Vec<u8>>,
    layout: &'a Layout,
    sentinel: &'a Sentinel,
    depth: usize,
}

impl<'a> FragmentWriter<'a> {
    pub fn new(layout: &'a Layout, sentinel: &'a Sentinel) -> Self {
        Self {
            writer: Writer::new(Vec::new()),
            layout,
            sentinel,
            depth: 0,
        }
    }

    /// Opens an element. The outermost element receives the sentinel.
    pub fn start(&mut self, mut start: BytesStart<'_>) -> Result<(), L5xError> {
        let top_level = self.depth == 0;
        if top_level {
            if let Sentinel::Attribute { name, value } = self.sentinel {
                start.push_attribute((name.as_str(), value.as_str()));
            }
        } else {
            self.line_break()?;
        }
        self.writer.write_event(Event::Start(start))?;
        self.depth += 1;

        if top_level {
            if let Sentinel::XmlComment(marker) = self.sentinel {
                self.line_break()?;
                let comment = format!(" {} ", marker.trim());
                self.writer
                    .write_event(Event::Comment(BytesText::from_escaped(comment)))?;
            }
        }
        Ok(())
    }

    /// Closes the innermost open element on its own line.
    pub fn end(&mut self, name: &str) -> Result<(), L5xError> {
        self.depth = self.depth.saturating_sub(1);
        self.line_break()?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    /// Writes `<name><![CDATA[text]]></name>`. Nothing but CDATA goes between
    /// the tags, so the element's text content is exactly `text`.
    pub fn cdata_element(&mut self, name: &str, text: &str) -> Result<(), L5xError> {
        self.start(BytesStart::new(name))?;
        for section in cdata_sections(text) {
            self.writer.write_event(Event::CData(BytesCData::new(section)))?;
        }
        self.depth = self.depth.saturating_sub(1);
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn line_break(&mut self) -> Result<(), L5xError> {
        let mut ws = String::with_capacity(
            self.layout.newline.len() + self.layout.indent.len() + self.layout.unit.len() * self.depth,
        );
        ws.push_str(&self.layout.newline);
        ws.push_str(&self.layout.indent);
        for _ in 0..self.depth {
            ws.push_str(&self.layout.unit);
        }
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(ws)))?;
        Ok(())
    }

    fn finish(self) -> Result<String, L5xError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| L5xError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// Renders one fragment to text. The first line carries no indentation; the
/// caller places it.
pub fn render<F: Fragment + ?Sized>(
    fragment: &F,
    number: usize,
    layout: &Layout,
    sentinel: &Sentinel,
) -> Result<String, L5xError> {
    let mut out = FragmentWriter::new(layout, sentinel);
    fragment.write(&mut out, number)?;
    out.finish()
}

/// Splits `text` so no section contains `]]>`. Adjacent CDATA sections
/// concatenate back to the original text.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        sections.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    sections.push(rest);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::GENERATED_MARKER;

    fn rung(comment: Option<&str>, logic: &str) -> RungFragment {
        RungFragment {
            device_id: "AI-101".into(),
            comment: comment.map(str::to_string),
            logic: logic.into(),
        }
    }

    #[test]
    fn test_rung_layout_matches_studio_export() {
        let layout = Layout::default();
        let sentinel = Sentinel::XmlComment(GENERATED_MARKER.into());
        let xml = render(&rung(Some("Tank A Temp"), "XIC(Temp_1);"), 3, &layout, &sentinel).unwrap();
        assert_eq!(
            xml,
            "<Rung Use=\"Target\" Number=\"3\" Type=\"N\">\n  \
             <!-- generated by l5x-rungs -->\n  \
             <Comment><![CDATA[Tank A Temp]]></Comment>\n  \
             <Text><![CDATA[XIC(Temp_1);]]></Text>\n\
             </Rung>"
        );
    }

    #[test]
    fn test_rung_without_comment_and_attribute_sentinel() {
        let layout = Layout {
            newline: "\r\n".into(),
            indent: "\t".into(),
            unit: "\t".into(),
        };
        let sentinel = Sentinel::Attribute {
            name: "Generated".into(),
            value: "true".into(),
        };
        let xml = render(&rung(None, "NOP();"), 0, &layout, &sentinel).unwrap();
        assert_eq!(
            xml,
            "<Rung Use=\"Target\" Number=\"0\" Type=\"N\" Generated=\"true\">\r\n\t\t\
             <Text><![CDATA[NOP();]]></Text>\r\n\t\
             </Rung>"
        );
    }

    #[test]
    fn test_label_attributes_are_escaped() {
        let label = LabelFragment {
            device_id: "PT-1".into(),
            tag: "Arr[1].\"Desc\"".into(),
            text: "A & B".into(),
        };
        let xml = render(&label, 7, &Layout::default(), &Sentinel::Any).unwrap();
        assert_eq!(
            xml,
            "<Label Device=\"PT-1\" Tag=\"Arr[1].&quot;Desc&quot;\">\n  \
             <Text><![CDATA[A & B]]></Text>\n\
             </Label>"
        );
    }

    #[test]
    fn test_cdata_terminator_is_split() {
        assert_eq!(cdata_sections("a]]>b"), ["a]]", ">b"]);
        assert_eq!(cdata_sections("]]>]]>"), ["]]", ">]]", ">"]);
        assert_eq!(cdata_sections("plain"), ["plain"]);

        let xml = render(&rung(Some("x]]>y"), "NOP();"), 0, &Layout::default(), &Sentinel::Any).unwrap();
        assert!(xml.contains("<![CDATA[x]]]]><![CDATA[>y]]>"));
    }
}
