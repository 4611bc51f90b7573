// crates/l5x-rungs/src/store.rs

//! The template store: compiled device templates plus the two skeletons.

use crate::error::L5xError;
use crate::model;
use crate::skeleton::Skeleton;
use crate::template::Template;
use log::debug;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

const BUILTIN_TEMPLATES: &str = include_str!("../assets/templates.xml");

/// Rung and label templates for one device type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTemplate {
    device_type: String,
    description: Option<String>,
    required: BTreeSet<String>,
    comment: Option<Template>,
    logic: Template,
    label_tag: Template,
    label_text: Template,
}

impl DeviceTemplate {
    /// Builds a template from its texts. Every referenced placeholder becomes
    /// a required field.
    pub fn new(
        device_type: &str,
        comment: Option<&str>,
        logic: &str,
        label_tag: &str,
        label_text: &str,
    ) -> Result<Self, L5xError> {
        let parse = |text: &str, part: &str| {
            Template::parse(text).map_err(|e| L5xError::TemplateSyntax {
                device_type: device_type.to_string(),
                message: format!("{}: {}", part, e),
            })
        };

        let comment = comment.map(|c| parse(c, "Comment")).transpose()?;
        let logic = parse(logic, "Logic")?;
        let label_tag = parse(label_tag, "Label tag")?;
        let label_text = parse(label_text, "Label")?;

        let mut template = Self {
            device_type: device_type.to_string(),
            description: None,
            required: BTreeSet::new(),
            comment,
            logic,
            label_tag,
            label_text,
        };
        template.required = template
            .texts()
            .flat_map(|t| t.fields())
            .map(str::to_string)
            .collect();
        Ok(template)
    }

    /// Adds fields that must be present without being referenced.
    pub fn with_required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Declared required fields plus every placeholder of every text.
    pub fn required_fields(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn comment(&self) -> Option<&Template> {
        self.comment.as_ref()
    }

    pub fn logic(&self) -> &Template {
        &self.logic
    }

    pub fn label_tag(&self) -> &Template {
        &self.label_tag
    }

    pub fn label_text(&self) -> &Template {
        &self.label_text
    }

    fn texts(&self) -> impl Iterator<Item = &Template> {
        self.comment
            .iter()
            .chain([&self.logic, &self.label_tag, &self.label_text])
    }

    fn from_model(def: &model::DeviceTemplateDef) -> Result<Self, L5xError> {
        let device_type = def.device_type.trim();
        if device_type.is_empty() {
            return Err(L5xError::TemplateSyntax {
                device_type: String::new(),
                message: "DeviceTemplate without a type attribute".into(),
            });
        }
        let template = Self::new(
            device_type,
            def.comment.as_deref().map(str::trim),
            def.logic.trim(),
            def.label.tag.trim(),
            def.label.text.trim(),
        )?
        .with_required(def.required.iter().map(|f| f.trim()));
        Ok(match &def.description {
            Some(description) => template.with_description(description),
            None => template,
        })
    }
}

/// Device-type to template lookup table and the output skeletons.
///
/// Loaded once and passed explicitly to the pipeline; nothing here is
/// mutated during a run.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: BTreeMap<String, DeviceTemplate>,
    main: Skeleton,
    labels: Skeleton,
}

impl TemplateStore {
    /// An empty store using the built-in skeletons.
    pub fn new() -> Self {
        Self {
            templates: BTreeMap::new(),
            main: Skeleton::builtin_main(),
            labels: Skeleton::builtin_labels(),
        }
    }

    /// The bundled templates and skeletons.
    pub fn builtin() -> Result<Self, L5xError> {
        Self::from_xml_str(BUILTIN_TEMPLATES)
    }

    /// Parses a `<DeviceTemplates>` asset.
    pub fn from_xml_str(xml: &str) -> Result<Self, L5xError> {
        let asset: model::DeviceTemplates = quick_xml::de::from_str(xml)?;
        let mut store = Self::new();
        for def in &asset.templates {
            store.register(DeviceTemplate::from_model(def)?)?;
        }
        debug!("Loaded {} device templates", store.templates.len());
        Ok(store)
    }

    /// Reads a `<DeviceTemplates>` asset from disk.
    pub fn load(path: &Path) -> Result<Self, L5xError> {
        let xml = fs::read_to_string(path).map_err(|e| L5xError::file(path, e))?;
        Self::from_xml_str(&xml)
    }

    /// Adds a template. A device type can only be registered once.
    pub fn register(&mut self, template: DeviceTemplate) -> Result<(), L5xError> {
        match self.templates.entry(template.device_type.clone()) {
            Entry::Occupied(_) => Err(L5xError::TemplateSyntax {
                device_type: template.device_type,
                message: "device type is defined more than once".into(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(template);
                Ok(())
            }
        }
    }

    /// Looks up the template for `device_type`.
    ///
    /// # Errors
    /// Returns `L5xError::UnknownDeviceType` (without row context) when no
    /// template is registered.
    pub fn lookup(&self, device_type: &str) -> Result<&DeviceTemplate, L5xError> {
        self.templates
            .get(device_type)
            .ok_or_else(|| L5xError::UnknownDeviceType {
                at: None,
                device_type: device_type.to_string(),
            })
    }

    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn with_main_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.main = skeleton;
        self
    }

    pub fn with_label_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.labels = skeleton;
        self
    }

    pub fn main_skeleton(&self) -> &Skeleton {
        &self.main
    }

    pub fn label_skeleton(&self) -> &Skeleton {
        &self.labels
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_load() {
        let store = TemplateStore::builtin().unwrap();
        let types: Vec<_> = store.device_types().collect();
        assert_eq!(types, ["AnalogInput", "DigitalInput", "SwitchPort"]);

        let switch = store.lookup("SwitchPort").unwrap();
        let required: Vec<_> = switch.required_fields().iter().map(String::as_str).collect();
        assert_eq!(required, ["ip", "module", "port", "switch", "sys_id"]);
        assert!(switch.comment().unwrap().source().starts_with("*****"));
    }

    #[test]
    fn test_lookup_unknown_type() {
        let store = TemplateStore::builtin().unwrap();
        let err = store.lookup("Foo").unwrap_err();
        assert!(matches!(
            err,
            L5xError::UnknownDeviceType { at: None, ref device_type } if device_type == "Foo"
        ));
    }

    #[test]
    fn test_duplicate_device_type_is_rejected() {
        let xml = r#"<DeviceTemplates>
            <DeviceTemplate type="A"><Logic>NOP();</Logic><Label tag="{id}">x</Label></DeviceTemplate>
            <DeviceTemplate type="A"><Logic>NOP();</Logic><Label tag="{id}">y</Label></DeviceTemplate>
        </DeviceTemplates>"#;
        let err = TemplateStore::from_xml_str(xml).unwrap_err();
        assert!(matches!(err, L5xError::TemplateSyntax { .. }));
    }

    #[test]
    fn test_bad_placeholder_names_the_template() {
        let xml = r#"<DeviceTemplates>
            <DeviceTemplate type="Broken"><Logic>XIC({tag)</Logic><Label tag="{id}">x</Label></DeviceTemplate>
        </DeviceTemplates>"#;
        let err = TemplateStore::from_xml_str(xml).unwrap_err();
        match err {
            L5xError::TemplateSyntax {
                device_type,
                message,
            } => {
                assert_eq!(device_type, "Broken");
                assert!(message.starts_with("Logic:"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_template_without_logic_fails_to_parse() {
        let xml = r#"<DeviceTemplates><DeviceTemplate type="A"></DeviceTemplate></DeviceTemplates>"#;
        let err = TemplateStore::from_xml_str(xml).unwrap_err();
        assert!(matches!(err, L5xError::TemplateParsing(_)));
    }
}
