// crates/l5x-rungs/src/template.rs

//! Placeholder templates used for rung comments, rung logic and labels.
//!
//! A template is literal text with `{field}` placeholders. A placeholder may
//! run its value through filters, `{field|upper}` or `{module|string_moves:Tag}`.
//! Filter arguments are templates themselves, so `{name|string_moves:ARR[{n}].Text}`
//! is valid. `{{` and `}}` produce literal braces.

use crate::types::FieldSource;
use std::collections::BTreeSet;
use std::fmt;

/// Capacity of the `DATA` array of a Logix `STRING`.
pub const LOGIX_STRING_CAPACITY: usize = 82;

/// A parsed template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Placeholder {
    field: String,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    Len,
    Upper,
    Lower,
    Trim,
    Commas,
    StringMoves(Template),
}

/// Why a template text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

/// Why a template could not be rendered for a given record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    MissingField(String),
    NotAscii { field: String },
    TooLong { field: String, len: usize },
}

impl RenderError {
    pub fn field(&self) -> &str {
        match self {
            RenderError::MissingField(field)
            | RenderError::NotAscii { field }
            | RenderError::TooLong { field, .. } => field,
        }
    }

    /// Reason text completing "field 'x' ...".
    pub fn reason(&self) -> String {
        match self {
            RenderError::MissingField(_) => "is missing or empty".into(),
            RenderError::NotAscii { .. } => {
                "contains non-ASCII characters and cannot be written to a STRING".into()
            }
            RenderError::TooLong { len, .. } => format!(
                "is {} characters long, a STRING holds at most {}",
                len, LOGIX_STRING_CAPACITY
            ),
        }
    }
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, SyntaxError> {
        let segments = parse_segments(source, 0)?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every field name referenced, including those inside filter arguments.
    pub fn fields(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        for segment in &self.segments {
            if let Segment::Field(p) = segment {
                out.insert(p.field.as_str());
                for filter in &p.filters {
                    if let Filter::StringMoves(dest) = filter {
                        dest.collect_fields(out);
                    }
                }
            }
        }
    }

    /// Substitutes every placeholder with the value from `source`.
    pub fn render<S: FieldSource + ?Sized>(&self, source: &S) -> Result<String, RenderError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(p) => {
                    let mut value = source
                        .field(&p.field)
                        .ok_or_else(|| RenderError::MissingField(p.field.clone()))?
                        .to_string();
                    for filter in &p.filters {
                        value = filter.apply(&p.field, value, source)?;
                    }
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

impl Filter {
    fn parse(spec: &str, offset: usize) -> Result<Self, SyntaxError> {
        let (name, arg) = match spec.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (spec.trim(), None),
        };
        let filter = match (name, arg) {
            ("len", None) => Filter::Len,
            ("upper", None) => Filter::Upper,
            ("lower", None) => Filter::Lower,
            ("trim", None) => Filter::Trim,
            ("commas", None) => Filter::Commas,
            ("string_moves", Some(dest)) => {
                let dest = dest.trim();
                if dest.is_empty() {
                    return Err(SyntaxError {
                        offset,
                        message: "filter 'string_moves' needs a destination tag".into(),
                    });
                }
                // Argument offsets are reported relative to the enclosing placeholder.
                Filter::StringMoves(Template {
                    source: dest.to_string(),
                    segments: parse_segments(dest, offset)?,
                })
            }
            ("string_moves", None) => {
                return Err(SyntaxError {
                    offset,
                    message: "filter 'string_moves' needs a destination tag".into(),
                });
            }
            (other, Some(_)) if is_known_filter(other) => {
                return Err(SyntaxError {
                    offset,
                    message: format!("filter '{}' takes no argument", other),
                });
            }
            (other, _) => {
                return Err(SyntaxError {
                    offset,
                    message: format!("unknown filter '{}'", other),
                });
            }
        };
        Ok(filter)
    }

    fn apply<S: FieldSource + ?Sized>(
        &self,
        field: &str,
        value: String,
        source: &S,
    ) -> Result<String, RenderError> {
        Ok(match self {
            Filter::Len => value.chars().count().to_string(),
            Filter::Upper => value.to_uppercase(),
            Filter::Lower => value.to_lowercase(),
            Filter::Trim => value.trim().to_string(),
            Filter::Commas => value.replace('.', ","),
            Filter::StringMoves(dest) => {
                let dest = dest.render(source)?;
                string_moves(field, &value, &dest)?
            }
        })
    }
}

fn is_known_filter(name: &str) -> bool {
    matches!(name, "len" | "upper" | "lower" | "trim" | "commas")
}

/// Expands `value` into the MOV sequence that writes it into the Logix
/// `STRING` tag `dest`: the length first, then one character code per element.
fn string_moves(field: &str, value: &str, dest: &str) -> Result<String, RenderError> {
    if !value.is_ascii() {
        return Err(RenderError::NotAscii {
            field: field.to_string(),
        });
    }
    if value.len() > LOGIX_STRING_CAPACITY {
        return Err(RenderError::TooLong {
            field: field.to_string(),
            len: value.len(),
        });
    }
    let mut moves = Vec::with_capacity(value.len() + 1);
    moves.push(format!("MOV({}, {}.LEN)", value.len(), dest));
    for (index, byte) in value.bytes().enumerate() {
        moves.push(format!("MOV({}, {}.DATA[{}])", byte, dest, index));
    }
    Ok(moves.join(", "))
}

fn parse_segments(source: &str, base: usize) -> Result<Vec<Segment>, SyntaxError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '}' => {
                return Err(SyntaxError {
                    offset: base + i,
                    message: "unmatched '}'".into(),
                });
            }
            '{' => {
                let close = find_closing_brace(source, i).ok_or_else(|| SyntaxError {
                    offset: base + i,
                    message: "unterminated placeholder".into(),
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let body = &source[i + 1..close];
                segments.push(Segment::Field(parse_placeholder(body, base + i)?));
                while chars.peek().is_some_and(|(j, _)| *j <= close) {
                    chars.next();
                }
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Finds the `}` matching the `{` at byte `open`, honouring nesting.
fn find_closing_brace(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in source[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_placeholder(body: &str, offset: usize) -> Result<Placeholder, SyntaxError> {
    let mut parts = split_top_level(body, '|').into_iter();
    let field = parts.next().unwrap_or_default().trim();
    if field.is_empty() {
        return Err(SyntaxError {
            offset,
            message: "empty field name".into(),
        });
    }
    if field.contains(['{', '}', ':']) {
        return Err(SyntaxError {
            offset,
            message: format!("invalid field name '{}'", field),
        });
    }
    let filters = parts
        .map(|spec| Filter::parse(spec, offset))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Placeholder {
        field: field.to_string(),
        filters,
    })
}

/// Splits on `sep` outside of nested braces.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, fields: &[(&str, &str)]) -> Result<String, RenderError> {
        Template::parse(template).unwrap().render(fields)
    }

    #[test]
    fn test_substitutes_fields() {
        let out = render(
            "Comment: {desc}; Rung: XIC({tag})",
            &[("tag", "Temp_1"), ("desc", "Tank A Temp")],
        )
        .unwrap();
        assert_eq!(out, "Comment: Tank A Temp; Rung: XIC(Temp_1)");
    }

    #[test]
    fn test_escaped_braces_are_literal() {
        let out = render("{{{tag}}}", &[("tag", "X")]).unwrap();
        assert_eq!(out, "{X}");
    }

    #[test]
    fn test_filters_chain_left_to_right() {
        let fields = [("ip", " 10.0.1.20 "), ("name", "Pump")];
        assert_eq!(render("{ip|trim|commas}", &fields).unwrap(), "10,0,1,20");
        assert_eq!(render("{name|upper}", &fields).unwrap(), "PUMP");
        assert_eq!(render("{name|lower}", &fields).unwrap(), "pump");
        assert_eq!(render("{name|len}", &fields).unwrap(), "4");
    }

    #[test]
    fn test_string_moves_writes_length_and_codes() {
        let out = render(
            "[{module|string_moves:ENET_STAT_1stSYS_ID[{sys_id}].Description} ];",
            &[("module", "SW1"), ("sys_id", "3")],
        )
        .unwrap();
        assert_eq!(
            out,
            "[MOV(3, ENET_STAT_1stSYS_ID[3].Description.LEN), \
             MOV(83, ENET_STAT_1stSYS_ID[3].Description.DATA[0]), \
             MOV(87, ENET_STAT_1stSYS_ID[3].Description.DATA[1]), \
             MOV(49, ENET_STAT_1stSYS_ID[3].Description.DATA[2]) ];"
        );
    }

    #[test]
    fn test_string_moves_rejects_non_ascii_and_overlong() {
        let err = render("{m|string_moves:T}", &[("m", "Pumpe Süd")]).unwrap_err();
        assert_eq!(err, RenderError::NotAscii { field: "m".into() });

        let long = "x".repeat(LOGIX_STRING_CAPACITY + 1);
        let err = render("{m|string_moves:T}", &[("m", long.as_str())]).unwrap_err();
        assert!(matches!(err, RenderError::TooLong { len: 83, .. }));
    }

    #[test]
    fn test_fields_include_filter_arguments() {
        let t = Template::parse("{a} {b|string_moves:X[{c}]} {a|len}").unwrap();
        let fields: Vec<_> = t.fields().into_iter().collect();
        assert_eq!(fields, ["a", "b", "c"]);
    }

    #[test]
    fn test_missing_field_is_reported() {
        let err = render("XIC({tag})", &[]).unwrap_err();
        assert_eq!(err, RenderError::MissingField("tag".into()));
        assert_eq!(err.reason(), "is missing or empty");
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Template::parse("XIC({tag)").is_err());
        assert!(Template::parse("XIC(tag})").is_err());
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{tag|bogus}").is_err());
        assert!(Template::parse("{tag|upper:x}").is_err());
        assert!(Template::parse("{tag|string_moves}").is_err());
        let err = Template::parse("abc{").unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_non_ascii_literals_survive() {
        let out = render("Température {v} °C", &[("v", "21")]).unwrap();
        assert_eq!(out, "Température 21 °C");
    }
}
