// crates/l5x-rungs/src/generator.rs

//! Renders one rung and one HMI label per device record.

use crate::error::L5xError;
use crate::log::{RowContext, l5x_debug, l5x_trace, l5x_warn};
use crate::store::{DeviceTemplate, TemplateStore};
use crate::template::{RenderError, Template};
use crate::types::{DeviceRecord, LabelFragment, RungFragment};

/// Validates `record` against `template` and renders its fragments.
///
/// # Errors
/// `L5xError::Validation` if a required field is missing or empty, or if a
/// value cannot be rendered (e.g. too long for a `STRING`).
pub fn generate(
    record: &DeviceRecord,
    template: &DeviceTemplate,
) -> Result<(RungFragment, LabelFragment), L5xError> {
    let ctx = RowContext::of(record);

    for field in template.required_fields() {
        if record.field(field).is_none_or(str::is_empty) {
            return Err(L5xError::Validation {
                at: record.row_ref(),
                field: field.clone(),
                reason: "is missing or empty".into(),
            });
        }
    }

    let render = |text: &Template| -> Result<String, L5xError> {
        text.render(record).map_err(|e| validation(record, e))
    };

    let comment = template.comment().map(&render).transpose()?;
    let logic = render(template.logic())?;
    if !logic.trim_end().ends_with(';') {
        l5x_warn!(ctx, "Rung text '{}' does not end with ';'", logic);
    }
    l5x_trace!(ctx, "Rung text: {}", logic);

    let rung = RungFragment {
        device_id: record.id().to_string(),
        comment,
        logic,
    };
    let label = LabelFragment {
        device_id: record.id().to_string(),
        tag: render(template.label_tag())?,
        text: render(template.label_text())?,
    };
    l5x_debug!(ctx, "Generated rung and label '{}'", label.tag);

    Ok((rung, label))
}

/// Generates fragments for every record in input order, stopping at the first
/// failing row.
pub fn generate_all(
    records: &[DeviceRecord],
    store: &TemplateStore,
) -> Result<Vec<(RungFragment, LabelFragment)>, L5xError> {
    records
        .iter()
        .map(|record| {
            let template = store
                .lookup(record.device_type())
                .map_err(|e| e.at_row(&record.row_ref()))?;
            generate(record, template)
        })
        .collect()
}

fn validation(record: &DeviceRecord, e: RenderError) -> L5xError {
    L5xError::Validation {
        at: record.row_ref(),
        field: e.field().to_string(),
        reason: e.reason(),
    }
}
