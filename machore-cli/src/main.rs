mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use machore_core::{Analysis, AnalysisConfig, SectionSelector, DEFAULT_PATH_CAPACITY};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Simple Mach-O introspection CLI
#[derive(Parser, Debug)]
#[command(
    name = "machore",
    about = "Inspect Mach-O binaries (architectures, linked dylibs, and C strings)",
    version,
    author
)]
struct Cli {
    /// Path to binary file
    #[arg(required = true)]
    path: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Section to scan for strings, as SEGMENT,SECTION (repeatable)
    #[arg(long = "section", value_name = "SEGMENT,SECTION", global = true)]
    sections: Vec<SectionSelector>,

    /// Also scan every section flagged as holding C string literals
    #[arg(long, global = true)]
    cstring_literals: bool,

    /// Keep at most N strings per architecture
    #[arg(long, value_name = "N", global = true)]
    max_strings: Option<usize>,

    /// Room for a dylib path, terminator included; longer paths are truncated
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PATH_CAPACITY, global = true)]
    path_capacity: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// List architecture slices
    Archs,
    /// Show linked shared libraries per architecture
    Dylibs,
    /// Show strings from the selected sections
    Strings,
    /// Everything above
    Report,
}

impl Cli {
    fn config(&self) -> AnalysisConfig {
        let mut config = AnalysisConfig::default()
            .with_cstring_literals(self.cstring_literals)
            .with_path_capacity(self.path_capacity)
            .with_max_strings(self.max_strings);
        if !self.sections.is_empty() {
            config = config.with_string_sections(self.sections.clone());
        }
        config
    }
}

fn load(path: &Path) -> Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("cannot open file '{}'", path.display()))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .with_context(|| format!("failed to read file '{}'", path.display()))?;
    log::info!("read {} bytes from {}", buf.len(), path.display());
    Ok(buf)
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let buf = load(&cli.path)?;
    let path = cli.path.display().to_string();
    let analysis = Analysis::parse_with(&buf, &cli.config())
        .with_context(|| format!("'{path}' is not a usable Mach-O file"))?;

    if cli.json {
        let report = report::AnalysisReport::new(&path, &analysis);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match cli.command {
            Command::Archs => {
                report::print_summary(&path, &analysis);
                report::print_archs(&analysis);
            }
            Command::Dylibs => report::print_dylibs(&analysis),
            Command::Strings => report::print_strings(&analysis, None),
            Command::Report => report::print_report(&path, &analysis),
        }
    }
    report::print_failures(&analysis);

    if analysis.is_complete() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(2))
    }
}
