// crates/l5x-rungs/src/error.rs

use quick_xml::errors::serialize::DeError;
use quick_xml::Error as XmlError;
use quick_xml::escape::EscapeError;
use quick_xml::events::attributes::AttrError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Identifies the spreadsheet row a record-level error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    /// Physical line in the input file (the header is line 1).
    pub row: u64,
    /// Device identifier of the row, empty when the row has none.
    pub device_id: String,
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.device_id.is_empty() {
            write!(f, "row {}", self.row)
        } else {
            write!(f, "row {} ({})", self.row, self.device_id)
        }
    }
}

/// Errors that can occur while reading devices, loading templates or
/// assembling the output documents.
#[derive(Debug)]
pub enum L5xError {
    /// The spreadsheet could not be read as delimited text with a header row.
    InputFormat { line: Option<u64>, message: String },

    /// A row is missing a required field or carries an invalid value.
    Validation {
        at: RowRef,
        field: String,
        reason: String,
    },

    /// A row references a device type with no registered template.
    UnknownDeviceType {
        at: Option<RowRef>,
        device_type: String,
    },

    /// A skeleton document has no element at the configured insertion path.
    TemplateStructure { document: String, path: String },

    /// A template text or the template asset itself is malformed.
    TemplateSyntax {
        device_type: String,
        message: String,
    },

    /// An error from the `quick-xml` deserializer while loading the template asset.
    TemplateParsing(DeError),

    /// An error from the underlying `quick-xml` reader.
    XmlParsing(XmlError),

    /// The document parses but is not a single-rooted XML document.
    XmlStructure { position: u64, message: String },

    /// Reading or writing a file failed.
    File { path: PathBuf, source: io::Error },

    /// An I/O error without a file attached (e.g. from the fragment writer).
    Io(io::Error),
}

impl L5xError {
    /// Attaches row context to errors that are raised before the row is known.
    pub(crate) fn at_row(self, at: &RowRef) -> Self {
        match self {
            L5xError::UnknownDeviceType {
                at: None,
                device_type,
            } => L5xError::UnknownDeviceType {
                at: Some(at.clone()),
                device_type,
            },
            other => other,
        }
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        L5xError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<DeError> for L5xError {
    fn from(e: DeError) -> Self {
        L5xError::TemplateParsing(e)
    }
}

impl From<XmlError> for L5xError {
    fn from(e: XmlError) -> Self {
        L5xError::XmlParsing(e)
    }
}

impl From<AttrError> for L5xError {
    fn from(e: AttrError) -> Self {
        L5xError::XmlParsing(e.into())
    }
}

impl From<EscapeError> for L5xError {
    fn from(e: EscapeError) -> Self {
        L5xError::XmlParsing(e.into())
    }
}

impl From<io::Error> for L5xError {
    fn from(e: io::Error) -> Self {
        L5xError::Io(e)
    }
}

/// CSV failures are always input format problems; keep the line when the
/// reader reports one.
impl From<csv::Error> for L5xError {
    fn from(e: csv::Error) -> Self {
        L5xError::InputFormat {
            line: e.position().map(|p| p.line()),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for L5xError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            L5xError::InputFormat {
                line: Some(line),
                message,
            } => write!(f, "Input format error on line {}: {}", line, message),
            L5xError::InputFormat {
                line: None,
                message,
            } => write!(f, "Input format error: {}", message),
            L5xError::Validation { at, field, reason } => {
                write!(f, "Validation error in {}: field '{}' {}", at, field, reason)
            }
            L5xError::UnknownDeviceType {
                at: Some(at),
                device_type,
            } => write!(
                f,
                "Unknown device type in {}: no template registered for '{}'",
                at, device_type
            ),
            L5xError::UnknownDeviceType {
                at: None,
                device_type,
            } => write!(f, "Unknown device type: no template registered for '{}'", device_type),
            L5xError::TemplateStructure { document, path } => write!(
                f,
                "Template structure error: {} skeleton has no insertion point at '{}'",
                document, path
            ),
            L5xError::TemplateSyntax {
                device_type,
                message,
            } => write!(f, "Template syntax error in '{}': {}", device_type, message),
            L5xError::TemplateParsing(e) => write!(f, "Template asset parsing error: {}", e),
            L5xError::XmlParsing(e) => write!(f, "XML parsing error: {}", e),
            L5xError::XmlStructure { position, message } => {
                write!(f, "XML structure error at byte {}: {}", position, message)
            }
            L5xError::File { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            L5xError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for L5xError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            L5xError::TemplateParsing(e) => Some(e),
            L5xError::XmlParsing(e) => Some(e),
            L5xError::File { source, .. } => Some(source),
            L5xError::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{L5xError, RowRef};

    fn row() -> RowRef {
        RowRef {
            row: 4,
            device_id: "AI-101".into(),
        }
    }

    #[test]
    fn test_from_de_error() {
        // A DeviceTemplate without its `type` attribute
        let xml_err = quick_xml::de::from_str::<crate::model::DeviceTemplates>(
            "<DeviceTemplates><DeviceTemplate/></DeviceTemplates>",
        )
        .unwrap_err();
        let err: L5xError = xml_err.into();
        assert!(matches!(err, L5xError::TemplateParsing(_)));
    }

    #[test]
    fn test_from_xml_error() {
        let xml_err = quick_xml::Error::Io(std::sync::Arc::new(std::io::Error::other("eof")));
        let err: L5xError = xml_err.into();
        assert!(matches!(err, L5xError::XmlParsing(_)));
    }

    #[test]
    fn test_from_csv_error_keeps_line() {
        let data = "id,type\nA,B,C\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let csv_err = rdr.records().next().unwrap().unwrap_err();
        let err: L5xError = csv_err.into();
        assert!(matches!(err, L5xError::InputFormat { line: Some(2), .. }));
    }

    #[test]
    fn test_at_row_fills_unknown_device_type() {
        let err = L5xError::UnknownDeviceType {
            at: None,
            device_type: "Foo".into(),
        }
        .at_row(&row());
        assert_eq!(
            err.to_string(),
            "Unknown device type in row 4 (AI-101): no template registered for 'Foo'"
        );
    }

    #[test]
    fn test_validation_display_names_row_and_field() {
        let err = L5xError::Validation {
            at: row(),
            field: "tag".into(),
            reason: "is missing or empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "Validation error in row 4 (AI-101): field 'tag' is missing or empty"
        );
    }
}
