// crates/l5x-rungs/src/reader.rs

use crate::error::{L5xError, RowRef};
use crate::types::DeviceRecord;
use log::{debug, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// How the device spreadsheet is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Field delimiter, `,` by default.
    pub delimiter: u8,
    /// Header of the device identifier column.
    pub id_column: String,
    /// Header of the device type column.
    pub type_column: String,
    /// Device type for rows without one (or inputs without a type column).
    pub default_type: Option<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            id_column: "id".into(),
            type_column: "type".into(),
            default_type: None,
        }
    }
}

/// Reads the device spreadsheet at `path`.
pub fn read_devices_from_path(
    path: &Path,
    options: &ReaderOptions,
) -> Result<Vec<DeviceRecord>, L5xError> {
    let file = File::open(path).map_err(|e| L5xError::file(path, e))?;
    let records = read_devices(file, options)?;
    info!("Read {} devices from {}", records.len(), path.display());
    Ok(records)
}

/// Parses delimited text with a header row into device records, keeping row
/// order.
///
/// # Errors
/// `L5xError::InputFormat` for structural problems (missing header or
/// columns, ragged rows, invalid UTF-8); `L5xError::Validation` for rows with
/// an empty id or type, or an id already used by an earlier row.
pub fn read_devices<R: Read>(
    input: R,
    options: &ReaderOptions,
) -> Result<Vec<DeviceRecord>, L5xError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(L5xError::InputFormat {
            line: Some(1),
            message: "input has no header row".into(),
        });
    }
    if let Some(dup) = first_duplicate(&headers) {
        return Err(L5xError::InputFormat {
            line: Some(1),
            message: format!("column '{}' appears more than once in the header", dup),
        });
    }

    let id_index = column_index(&headers, &options.id_column).ok_or_else(|| {
        L5xError::InputFormat {
            line: Some(1),
            message: format!("header has no '{}' column", options.id_column),
        }
    })?;
    let type_index = column_index(&headers, &options.type_column);
    if type_index.is_none() && options.default_type.is_none() {
        return Err(L5xError::InputFormat {
            line: Some(1),
            message: format!(
                "header has no '{}' column and no default device type is set",
                options.type_column
            ),
        });
    }

    let mut records = Vec::new();
    let mut seen: HashMap<String, u64> = HashMap::new();

    for (i, result) in rdr.records().enumerate() {
        let row = result?;
        // Data rows start on line 2 unless the reader knows better.
        let line = row.position().map_or(i as u64 + 2, |p| p.line());

        if row.iter().all(str::is_empty) {
            debug!("Skipping empty row on line {}", line);
            continue;
        }

        let id = row.get(id_index).unwrap_or_default().to_string();
        let at = RowRef {
            row: line,
            device_id: id.clone(),
        };
        if id.is_empty() {
            return Err(L5xError::Validation {
                at,
                field: options.id_column.clone(),
                reason: "is missing or empty".into(),
            });
        }
        if let Some(first) = seen.get(&id) {
            return Err(L5xError::Validation {
                at,
                field: options.id_column.clone(),
                reason: format!("duplicates the device on row {}", first),
            });
        }

        let device_type = type_index
            .and_then(|i| row.get(i))
            .filter(|t| !t.is_empty())
            .or(options.default_type.as_deref())
            .ok_or_else(|| L5xError::Validation {
                at: at.clone(),
                field: options.type_column.clone(),
                reason: "is missing or empty".into(),
            })?
            .to_string();

        let fields = headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();

        seen.insert(id.clone(), line);
        records.push(DeviceRecord::new(line, id, device_type, fields));
    }

    Ok(records)
}

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn first_duplicate(headers: &[String]) -> Option<&str> {
    let mut seen = HashMap::new();
    headers
        .iter()
        .filter(|h| !h.is_empty())
        .find(|h| seen.insert(h.as_str(), ()).is_some())
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &str) -> Result<Vec<DeviceRecord>, L5xError> {
        read_devices(data.as_bytes(), &ReaderOptions::default())
    }

    #[test]
    fn test_reads_rows_in_order() {
        let records = read(
            "id,type,tag,desc\n\
             AI-101,AnalogInput,Temp_1,Tank A Temp\n\
             AI-102, AnalogInput ,Temp_2,\"Tank B, outlet\"\n",
        )
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id(), "AI-101");
        assert_eq!(records[0].row(), 2);
        assert_eq!(records[0].field("desc"), Some("Tank A Temp"));
        assert_eq!(records[1].device_type(), "AnalogInput");
        assert_eq!(records[1].field("desc"), Some("Tank B, outlet"));
        assert_eq!(records[1].row(), 3);
        assert_eq!(records[1].fields()[0], ("id".to_string(), "AI-102".to_string()));
    }

    #[test]
    fn test_missing_id_column_is_input_format_error() {
        let err = read("name,type\nx,AnalogInput\n").unwrap_err();
        assert!(matches!(err, L5xError::InputFormat { line: Some(1), .. }));
    }

    #[test]
    fn test_missing_type_column_uses_default() {
        let err = read("id,tag\nA,T\n").unwrap_err();
        assert!(matches!(err, L5xError::InputFormat { .. }));

        let options = ReaderOptions {
            default_type: Some("DigitalInput".into()),
            ..Default::default()
        };
        let records = read_devices("id,tag\nA,T\n".as_bytes(), &options).unwrap();
        assert_eq!(records[0].device_type(), "DigitalInput");
    }

    #[test]
    fn test_empty_type_without_default_is_validation_error() {
        let err = read("id,type\nA,\n").unwrap_err();
        match err {
            L5xError::Validation { at, field, .. } => {
                assert_eq!(at.row, 2);
                assert_eq!(at.device_id, "A");
                assert_eq!(field, "type");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = read("id,type\nA,X\nB,X\nA,X\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error in row 4 (A): field 'id' duplicates the device on row 2"
        );
    }

    #[test]
    fn test_ragged_row_is_input_format_error() {
        let err = read("id,type\nA,X,extra\n").unwrap_err();
        assert!(matches!(err, L5xError::InputFormat { line: Some(2), .. }));
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let records = read("id,type\nA,X\n,\nB,X\n").unwrap();
        let ids: Vec<_> = records.iter().map(DeviceRecord::id).collect();
        assert_eq!(ids, ["A", "B"]);
        assert_eq!(records[1].row(), 4);
    }

    #[test]
    fn test_empty_input_has_no_header() {
        let err = read("").unwrap_err();
        assert!(matches!(err, L5xError::InputFormat { .. }));
    }

    #[test]
    fn test_duplicate_header_is_rejected() {
        let err = read("id,type,tag,tag\nA,X,1,2\n").unwrap_err();
        assert!(matches!(err, L5xError::InputFormat { line: Some(1), .. }));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let options = ReaderOptions {
            delimiter: b';',
            ..Default::default()
        };
        let records = read_devices("id;type;ip\nSW1;SwitchPort;10.0.0.1\n".as_bytes(), &options).unwrap();
        assert_eq!(records[0].field("ip"), Some("10.0.0.1"));
    }
}
