// crates/l5x-rungs/src/model.rs

//! Internal `serde` data structures that map directly to the template asset.
//!
//! These structs are annotated with `serde` attributes to facilitate parsing
//! via `quick-xml` and are not intended for direct public use. The public,
//! compiled form lives in `store::DeviceTemplate`.

use serde::Deserialize;

/// The root element of a template asset.
///
/// Represents `<DeviceTemplates>`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename = "DeviceTemplates")]
pub struct DeviceTemplates {
    #[serde(rename = "DeviceTemplate", default)]
    pub templates: Vec<DeviceTemplateDef>,
}

/// One `<DeviceTemplate type="...">` entry.
#[derive(Debug, Deserialize)]
pub struct DeviceTemplateDef {
    #[serde(rename = "@type")]
    pub device_type: String,

    #[serde(rename = "@description", default)]
    pub description: Option<String>,

    /// Fields that must be present even when no placeholder references them.
    #[serde(rename = "RequiredField", default)]
    pub required: Vec<String>,

    #[serde(rename = "Comment", default)]
    pub comment: Option<String>,

    #[serde(rename = "Logic")]
    pub logic: String,

    #[serde(rename = "Label")]
    pub label: LabelDef,
}

/// Represents `<Label tag="...">Text</Label>`
#[derive(Debug, Deserialize)]
pub struct LabelDef {
    #[serde(rename = "@tag")]
    pub tag: String,

    #[serde(rename = "$value", default)]
    pub text: String,
}
