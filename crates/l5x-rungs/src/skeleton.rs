// crates/l5x-rungs/src/skeleton.rs

//! Skeleton documents and the insertion points generated content goes to.

use crate::error::L5xError;
use quick_xml::events::BytesStart;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

const BUILTIN_MAIN: &str = include_str!("../assets/skeleton.L5X");
const BUILTIN_LABELS: &str = include_str!("../assets/hmi_labels.xml");

/// Default element path of the routine receiving generated rungs.
pub const DEFAULT_RUNG_PATH: &str =
    "RSLogix5000Content/Controller/Programs/Program/Routines/Routine/RLLContent";

/// Default element path of the label list in the HMI label document.
pub const DEFAULT_LABEL_PATH: &str = "HMILabels/Labels";

/// Marker comment carried by every generated rung.
pub const GENERATED_MARKER: &str = "generated by l5x-rungs";

/// One step of an element path: a name and an optional `[Attr=value]` predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub predicate: Option<(String, String)>,
}

impl PathSegment {
    pub(crate) fn matches(&self, element: &BytesStart<'_>) -> Result<bool, L5xError> {
        if element.name().as_ref() != self.name.as_bytes() {
            return Ok(false);
        }
        let Some((attr, expected)) = &self.predicate else {
            return Ok(true);
        };
        match element.try_get_attribute(attr.as_str())? {
            Some(value) => Ok(value.unescape_value()? == expected.as_str()),
            None => Ok(false),
        }
    }
}

/// Absolute element path from the document root, e.g.
/// `RSLogix5000Content/Controller/Programs/Program[Name=MainProgram]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    segments: Vec<PathSegment>,
}

impl ElementPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for ElementPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = s
            .trim()
            .trim_matches('/')
            .split('/')
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

fn parse_segment(raw: &str) -> Result<PathSegment, String> {
    let raw = raw.trim();
    let (name, predicate) = match raw.split_once('[') {
        None => (raw, None),
        Some((name, rest)) => {
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated predicate in '{}'", raw))?;
            let (attr, value) = inner
                .split_once('=')
                .ok_or_else(|| format!("predicate in '{}' must look like [Attr=value]", raw))?;
            let attr = attr.trim().trim_start_matches('@');
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            if attr.is_empty() {
                return Err(format!("empty attribute name in '{}'", raw));
            }
            (name, Some((attr.to_string(), value.to_string())))
        }
    };
    let name = name.trim();
    if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == ']') {
        return Err(format!("invalid element name '{}'", name));
    }
    Ok(PathSegment {
        name: name.to_string(),
        predicate,
    })
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(&segment.name)?;
            if let Some((attr, value)) = &segment.predicate {
                write!(f, "[{}={}]", attr, value)?;
            }
        }
        Ok(())
    }
}

/// Distinguishes generated children from hand-authored ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sentinel {
    /// The child holds an XML comment whose trimmed text equals the marker.
    XmlComment(String),
    /// The child carries `name="value"`.
    Attribute { name: String, value: String },
    /// Every child with the configured name counts as generated.
    Any,
}

/// Where generated children go in a skeleton and how they are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub path: ElementPath,
    /// Element name of the generated children (`Rung`, `Label`).
    pub child: String,
    pub sentinel: Sentinel,
}

impl InsertionPoint {
    /// Rungs of the first ladder routine, marked with [`GENERATED_MARKER`].
    pub fn rungs() -> Self {
        Self {
            path: default_path(DEFAULT_RUNG_PATH),
            child: "Rung".into(),
            sentinel: Sentinel::XmlComment(GENERATED_MARKER.into()),
        }
    }

    /// Labels of the HMI label document, marked with `Generated="true"`.
    pub fn labels() -> Self {
        Self {
            path: default_path(DEFAULT_LABEL_PATH),
            child: "Label".into(),
            sentinel: Sentinel::Attribute {
                name: "Generated".into(),
                value: "true".into(),
            },
        }
    }

    pub fn with_path(mut self, path: ElementPath) -> Self {
        self.path = path;
        self
    }

    pub fn with_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }
}

fn default_path(path: &str) -> ElementPath {
    ElementPath {
        segments: path
            .split('/')
            .map(|name| PathSegment {
                name: name.to_string(),
                predicate: None,
            })
            .collect(),
    }
}

/// A skeleton document: boilerplate XML text plus its insertion point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    name: String,
    source: String,
    insertion: InsertionPoint,
}

impl Skeleton {
    pub fn new(name: impl Into<String>, source: impl Into<String>, insertion: InsertionPoint) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            insertion,
        }
    }

    /// Reads a skeleton from disk. The file name doubles as the document name
    /// in error messages.
    pub fn load(path: &Path, insertion: InsertionPoint) -> Result<Self, L5xError> {
        let source = fs::read_to_string(path).map_err(|e| L5xError::file(path, e))?;
        Ok(Self::new(path.display().to_string(), source, insertion))
    }

    /// The bundled L5X skeleton with a `MainRoutine` ready for rungs.
    pub fn builtin_main() -> Self {
        Self::new("built-in L5X", BUILTIN_MAIN, InsertionPoint::rungs())
    }

    /// The bundled, empty HMI label document.
    pub fn builtin_labels() -> Self {
        Self::new("built-in HMI labels", BUILTIN_LABELS, InsertionPoint::labels())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn insertion(&self) -> &InsertionPoint {
        &self.insertion
    }

    pub fn with_insertion(mut self, insertion: InsertionPoint) -> Self {
        self.insertion = insertion;
        self
    }
}
