use clap::{ArgAction, Parser};
use l5x_rungs::{ElementPath, GeneratorConfig, ReaderOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "l5x-rungs")]
#[command(version, about = "Generates L5X ladder rungs and HMI labels from a device spreadsheet.")]
pub struct CommandLine {
    /// Device spreadsheet (CSV with a header row)
    pub input: PathBuf,

    /// L5X document to write
    #[arg(short, long, default_value = l5x_rungs::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// HMI label document to write
    #[arg(long, default_value = l5x_rungs::DEFAULT_LABELS_OUTPUT)]
    pub labels_output: PathBuf,

    /// Device template file replacing the built-in templates
    #[arg(long, value_name = "FILE")]
    pub templates: Option<PathBuf>,

    /// L5X skeleton replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub skeleton: Option<PathBuf>,

    /// HMI label skeleton replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub labels_skeleton: Option<PathBuf>,

    /// Element receiving the rungs, e.g. `.../Routine[Name=MainRoutine]/RLLContent`
    #[arg(long, value_name = "PATH")]
    pub routine_path: Option<ElementPath>,

    /// Element receiving the labels
    #[arg(long, value_name = "PATH")]
    pub labels_path: Option<ElementPath>,

    /// Field delimiter of the spreadsheet
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    pub delimiter: u8,

    /// Header of the device id column
    #[arg(long, default_value = "id")]
    pub id_column: String,

    /// Header of the device type column
    #[arg(long, default_value = "type")]
    pub type_column: String,

    /// Device type for rows that have none
    #[arg(long, value_name = "TYPE")]
    pub default_type: Option<String>,

    /// Replace every existing rung and label, not only generated ones
    #[arg(long)]
    pub replace_all: bool,

    /// Run every stage but write no files
    #[arg(long)]
    pub dry_run: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Default `env_logger` filter; `RUST_LOG` still wins.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    pub fn into_config(self) -> GeneratorConfig {
        GeneratorConfig {
            output: self.output,
            labels_output: self.labels_output,
            templates: self.templates,
            skeleton: self.skeleton,
            labels_skeleton: self.labels_skeleton,
            rung_path: self.routine_path,
            labels_path: self.labels_path,
            reader: ReaderOptions {
                delimiter: self.delimiter,
                id_column: self.id_column,
                type_column: self.type_column,
                default_type: self.default_type,
            },
            replace_all: self.replace_all,
            dry_run: self.dry_run,
            ..GeneratorConfig::new(self.input)
        }
    }
}

fn parse_delimiter(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ => match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("delimiter must be a single ASCII character, got '{}'", s)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = CommandLine::try_parse_from(["l5x-rungs", "devices.csv"]).unwrap();
        assert_eq!(cli.log_filter(), "info");
        let config = cli.into_config();
        assert_eq!(config.input, PathBuf::from("devices.csv"));
        assert_eq!(config.output, PathBuf::from("output.L5X"));
        assert_eq!(config.labels_output, PathBuf::from("HMI_Labels.xml"));
        assert_eq!(config.reader, ReaderOptions::default());
        assert!(!config.dry_run && !config.replace_all);
    }

    #[test]
    fn test_all_options() {
        let cli = CommandLine::try_parse_from([
            "l5x-rungs",
            "in.csv",
            "-o",
            "out.L5X",
            "--labels-output",
            "labels.xml",
            "--routine-path",
            "A/Routine[Name=Main]/RLLContent",
            "--delimiter",
            ";",
            "--default-type",
            "AnalogInput",
            "--replace-all",
            "--dry-run",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.log_filter(), "trace");
        let config = cli.into_config();
        assert_eq!(config.output, PathBuf::from("out.L5X"));
        assert_eq!(
            config.rung_path.unwrap().to_string(),
            "A/Routine[Name=Main]/RLLContent"
        );
        assert_eq!(config.reader.delimiter, b';');
        assert_eq!(config.reader.default_type.as_deref(), Some("AnalogInput"));
        assert!(config.replace_all && config.dry_run);
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        assert!(CommandLine::try_parse_from(["l5x-rungs", "in.csv", "--delimiter", ";;"]).is_err());
        assert!(CommandLine::try_parse_from(["l5x-rungs", "in.csv", "--routine-path", "A[x"]).is_err());
        assert!(CommandLine::try_parse_from(["l5x-rungs", "in.csv", "-v", "-q"]).is_err());
        assert!(CommandLine::try_parse_from(["l5x-rungs"]).is_err());
    }

    #[test]
    fn test_tab_delimiter() {
        assert_eq!(parse_delimiter("\\t"), Ok(b'\t'));
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("|"), Ok(b'|'));
    }
}
