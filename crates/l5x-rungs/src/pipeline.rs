// crates/l5x-rungs/src/pipeline.rs

//! End-to-end runs: read rows, render fragments, assemble and write both
//! documents.

use crate::assembler;
use crate::error::L5xError;
use crate::generator;
use crate::reader::{self, ReaderOptions};
use crate::skeleton::{ElementPath, Sentinel, Skeleton};
use crate::store::TemplateStore;
use crate::types::{AssembledDocuments, DeviceRecord};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const DEFAULT_OUTPUT: &str = "output.L5X";
pub const DEFAULT_LABELS_OUTPUT: &str = "HMI_Labels.xml";

/// Everything one run needs. Unset optional paths fall back to the built-in
/// assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub labels_output: PathBuf,
    /// Template asset replacing the built-in templates.
    pub templates: Option<PathBuf>,
    /// L5X skeleton replacing the built-in one.
    pub skeleton: Option<PathBuf>,
    /// HMI label skeleton replacing the built-in one.
    pub labels_skeleton: Option<PathBuf>,
    pub rung_path: Option<ElementPath>,
    pub labels_path: Option<ElementPath>,
    pub reader: ReaderOptions,
    /// Treat every existing rung and label at the insertion points as generated.
    pub replace_all: bool,
    /// Run every stage but write nothing.
    pub dry_run: bool,
}

impl GeneratorConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            labels_output: PathBuf::from(DEFAULT_LABELS_OUTPUT),
            templates: None,
            skeleton: None,
            labels_skeleton: None,
            rung_path: None,
            labels_path: None,
            reader: ReaderOptions::default(),
            replace_all: false,
            dry_run: false,
        }
    }

    /// Loads the template store and both skeletons this configuration names.
    pub fn load_store(&self) -> Result<TemplateStore, L5xError> {
        let store = match &self.templates {
            Some(path) => TemplateStore::load(path)?,
            None => TemplateStore::builtin()?,
        };

        let main = match &self.skeleton {
            Some(path) => Skeleton::load(path, store.main_skeleton().insertion().clone())?,
            None => store.main_skeleton().clone(),
        };
        let labels = match &self.labels_skeleton {
            Some(path) => Skeleton::load(path, store.label_skeleton().insertion().clone())?,
            None => store.label_skeleton().clone(),
        };

        let main = self.adjust(main, self.rung_path.as_ref());
        let labels = self.adjust(labels, self.labels_path.as_ref());
        Ok(store.with_main_skeleton(main).with_label_skeleton(labels))
    }

    fn adjust(&self, skeleton: Skeleton, path: Option<&ElementPath>) -> Skeleton {
        let mut insertion = skeleton.insertion().clone();
        if let Some(path) = path {
            insertion = insertion.with_path(path.clone());
        }
        if self.replace_all {
            insertion = insertion.with_sentinel(Sentinel::Any);
        }
        skeleton.with_insertion(insertion)
    }
}

/// What a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub devices: usize,
    pub rungs: usize,
    pub removed: usize,
    /// Files written, empty for a dry run.
    pub written: Vec<PathBuf>,
}

/// Renders `records` with `store` and splices the results into the store's
/// skeletons. Nothing is written.
pub fn generate(
    records: &[DeviceRecord],
    store: &TemplateStore,
) -> Result<AssembledDocuments, L5xError> {
    let fragments = generator::generate_all(records, store)?;
    assembler::assemble(store.main_skeleton(), store.label_skeleton(), &fragments)
}

/// Runs the whole pipeline. Output files are written only after both
/// documents were assembled and staged, so a failing run never leaves one
/// new output next to a stale or missing other.
pub fn run(config: &GeneratorConfig) -> Result<RunSummary, L5xError> {
    if config.output == config.labels_output {
        return Err(L5xError::file(
            &config.output,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "L5X output and label output must be different files",
            ),
        ));
    }

    let store = config.load_store()?;
    let records = reader::read_devices_from_path(&config.input, &config.reader)?;
    let documents = generate(&records, &store)?;

    let mut written = Vec::new();
    if config.dry_run {
        info!(
            "Dry run: {} rungs generated, nothing written",
            documents.generated
        );
    } else {
        write_all(&[
            (config.output.as_path(), documents.main.as_str()),
            (config.labels_output.as_path(), documents.labels.as_str()),
        ])?;
        written.push(config.output.clone());
        written.push(config.labels_output.clone());
    }

    Ok(RunSummary {
        devices: records.len(),
        rungs: documents.generated,
        removed: documents.removed,
        written,
    })
}

/// Stages every document in a temporary file beside its target, then renames
/// them into place. A failed rename removes the targets already replaced.
fn write_all(targets: &[(&Path, &str)]) -> Result<(), L5xError> {
    let mut staged = Vec::with_capacity(targets.len());
    for &(path, contents) in targets {
        staged.push((path, stage(path, contents)?));
    }

    let mut replaced: Vec<&Path> = Vec::new();
    for (path, file) in staged {
        if let Err(e) = file.persist(path) {
            for done in replaced {
                let _ = fs::remove_file(done);
            }
            return Err(L5xError::file(path, e.error));
        }
        replaced.push(path);
    }
    for path in replaced {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn stage(path: &Path, contents: &str) -> Result<NamedTempFile, L5xError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(|e| L5xError::file(path, e))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| L5xError::file(path, e))?;
    Ok(file)
}
