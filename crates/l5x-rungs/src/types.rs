// crates/l5x-rungs/src/types.rs

//! Public data structures passed between the pipeline stages.

use crate::error::RowRef;

// --- Input ---

/// One row of the device spreadsheet.
///
/// Created by the row reader and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    row: u64,
    id: String,
    device_type: String,
    /// Every cell of the row in header order, including the id and type columns.
    fields: Vec<(String, String)>,
}

impl DeviceRecord {
    pub fn new(
        row: u64,
        id: impl Into<String>,
        device_type: impl Into<String>,
        fields: Vec<(String, String)>,
    ) -> Self {
        Self {
            row,
            id: id.into(),
            device_type: device_type.into(),
            fields,
        }
    }

    /// Physical line of the row in the input file (the header is line 1).
    pub fn row(&self) -> u64 {
        self.row
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Looks up a cell by its header name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn row_ref(&self) -> RowRef {
        RowRef {
            row: self.row,
            device_id: self.id.clone(),
        }
    }
}

/// Source of placeholder values during template rendering.
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for DeviceRecord {
    fn field(&self, name: &str) -> Option<&str> {
        DeviceRecord::field(self, name)
    }
}

impl FieldSource for [(&str, &str)] {
    fn field(&self, name: &str) -> Option<&str> {
        self.iter().find(|(key, _)| *key == name).map(|(_, v)| *v)
    }
}

// --- Generated fragments ---

/// One generated ladder rung: a comment and the rung's neutral text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RungFragment {
    /// Device identifier of the record the rung was rendered from.
    pub device_id: String,
    /// Rung comment. `None` when the template has no comment.
    pub comment: Option<String>,
    /// Instruction text, e.g. `XIC(Temp_1)OTE(Temp_1_Alarm);`.
    pub logic: String,
}

/// One generated HMI label entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFragment {
    /// Device identifier of the record the label was rendered from.
    pub device_id: String,
    /// Controller tag the label describes.
    pub tag: String,
    /// Human readable text shown on the operator display.
    pub text: String,
}

/// The two finished documents produced by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocuments {
    /// The L5X configuration document.
    pub main: String,
    /// The HMI label document.
    pub labels: String,
    /// Number of rungs (and labels) inserted.
    pub generated: usize,
    /// Number of previously generated children removed from the main skeleton.
    pub removed: usize,
}
