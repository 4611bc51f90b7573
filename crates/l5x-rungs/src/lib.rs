// src/lib.rs

#![doc = "Generates Logix ladder rungs and HMI labels from a device spreadsheet."]
#![doc = ""]
#![doc = "Each CSV row is rendered through the template of its device type into one"]
#![doc = "rung and one HMI label, which are spliced into an L5X skeleton and an HMI"]
#![doc = "label skeleton. Previously generated content is replaced; everything else in"]
#![doc = "the skeletons is kept byte for byte."]
#![doc = ""]
#![doc = "- `read_devices`: parsing the spreadsheet into `DeviceRecord`s."]
#![doc = "- `TemplateStore`: device templates and skeletons."]
#![doc = "- `generate_all`: rendering rungs and labels."]
#![doc = "- `assemble`: splicing them into the output documents."]
#![doc = "- `run`: the whole pipeline, writing both files."]

// --- Crate Modules ---

mod assembler;
mod error;
mod fragment;
mod generator;
mod log;
mod model;
mod pipeline;
mod reader;
mod skeleton;
mod store;
mod template;
mod types;

// --- Public API Re-exports ---

pub use assembler::{Spliced, assemble, check_well_formed, splice};
pub use error::{L5xError, RowRef};
pub use fragment::{Fragment, FragmentWriter, Layout};
pub use generator::{generate as generate_rung, generate_all};
pub use pipeline::{
    DEFAULT_LABELS_OUTPUT, DEFAULT_OUTPUT, GeneratorConfig, RunSummary, generate, run,
};
pub use reader::{ReaderOptions, read_devices, read_devices_from_path};
pub use skeleton::{
    DEFAULT_LABEL_PATH, DEFAULT_RUNG_PATH, ElementPath, GENERATED_MARKER, InsertionPoint,
    PathSegment, Sentinel, Skeleton,
};
pub use store::{DeviceTemplate, TemplateStore};
pub use template::{LOGIX_STRING_CAPACITY, RenderError, SyntaxError, Template};
pub use types::{AssembledDocuments, DeviceRecord, FieldSource, LabelFragment, RungFragment};
