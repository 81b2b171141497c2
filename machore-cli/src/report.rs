use colored::Colorize;
use machore_core::{Analysis, ArchSlice, ContainerKind};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Strings shown per slice in table output before eliding the rest.
const TABLE_STRING_SAMPLE: usize = 10;

#[derive(Serialize)]
pub struct AnalysisReport {
    pub path: String,
    pub container: &'static str,
    pub multi_architecture: bool,
    pub slices: Vec<SliceReport>,
    pub failures: Vec<FailureReport>,
}

#[derive(Serialize)]
pub struct SliceReport {
    pub architecture: String,
    pub file_type: String,
    pub bits: u8,
    pub offset: usize,
    pub size: usize,
    pub load_commands: u32,
    pub dependencies: Vec<DependencyRow>,
    pub strings: Vec<StringRow>,
}

#[derive(Serialize)]
pub struct FailureReport {
    pub index: usize,
    pub entry_offset: usize,
    pub error: String,
}

#[derive(Serialize, Tabled, Clone)]
pub struct ArchRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Arch")]
    pub architecture: String,
    #[tabled(rename = "Type")]
    pub file_type: String,
    #[tabled(rename = "Bits")]
    pub bits: u8,
    #[tabled(rename = "Offset")]
    pub offset: String,
    #[tabled(rename = "Size")]
    pub size: usize,
    #[tabled(rename = "Load cmds")]
    pub load_commands: u32,
}

#[derive(Serialize, Tabled, Clone)]
pub struct DependencyRow {
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "Version")]
    pub version: String,
    #[tabled(rename = "Compat")]
    pub compatibility_version: String,
    #[tabled(rename = "Truncated")]
    pub truncated: bool,
}

#[derive(Serialize, Tabled, Clone)]
pub struct StringRow {
    #[tabled(rename = "Offset")]
    pub offset: String,
    #[tabled(rename = "Size")]
    pub size: usize,
    #[tabled(rename = "Section")]
    pub section: String,
    #[tabled(rename = "String")]
    pub content: String,
}

fn container_name(kind: ContainerKind) -> &'static str {
    match kind {
        ContainerKind::Thin => "thin",
        ContainerKind::Fat32 => "fat",
        ContainerKind::Fat64 => "fat64",
    }
}

fn bits(slice: &ArchSlice) -> u8 {
    if slice.is_64_bit { 64 } else { 32 }
}

fn dependency_rows(slice: &ArchSlice) -> Vec<DependencyRow> {
    slice
        .dependencies
        .iter()
        .map(|d| DependencyRow {
            kind: d.kind.to_string(),
            path: d.path.clone(),
            version: d.version.clone(),
            compatibility_version: d.compatibility_version.clone(),
            truncated: d.path_was_truncated,
        })
        .collect()
}

fn string_rows(slice: &ArchSlice) -> Vec<StringRow> {
    slice
        .strings
        .iter()
        .map(|s| StringRow {
            offset: format!("0x{:08x}", s.file_absolute_offset),
            size: s.byte_length,
            section: format!("{},{}", s.source_segment, s.source_section),
            content: s.content.escape_debug().to_string(),
        })
        .collect()
}

pub fn arch_rows(analysis: &Analysis) -> Vec<ArchRow> {
    analysis
        .slices
        .iter()
        .enumerate()
        .map(|(index, s)| ArchRow {
            index,
            architecture: s.architecture.to_string(),
            file_type: s.file_type.to_string(),
            bits: bits(s),
            offset: format!("0x{:x}", s.offset),
            size: s.size,
            load_commands: s.load_command_count,
        })
        .collect()
}

impl AnalysisReport {
    pub fn new(path: &str, analysis: &Analysis) -> Self {
        Self {
            path: path.to_string(),
            container: container_name(analysis.container),
            multi_architecture: analysis.is_multi_architecture,
            slices: analysis
                .slices
                .iter()
                .map(|s| SliceReport {
                    architecture: s.architecture.to_string(),
                    file_type: s.file_type.to_string(),
                    bits: bits(s),
                    offset: s.offset,
                    size: s.size,
                    load_commands: s.load_command_count,
                    dependencies: dependency_rows(s),
                    strings: string_rows(s),
                })
                .collect(),
            failures: analysis
                .failures
                .iter()
                .map(|f| FailureReport {
                    index: f.index,
                    entry_offset: f.entry_offset,
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

fn table<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

fn slice_heading(slice: &ArchSlice) -> String {
    format!(
        "{} {} at 0x{:x}",
        slice.architecture.to_string().bold().cyan(),
        slice.file_type.to_string().bold(),
        slice.offset
    )
}

pub fn print_summary(path: &str, analysis: &Analysis) {
    println!(
        "{} {} ({}, {} architecture{})",
        "File:".bold(),
        path,
        container_name(analysis.container),
        analysis.slices.len(),
        if analysis.slices.len() == 1 { "" } else { "s" }
    );
}

pub fn print_archs(analysis: &Analysis) {
    println!("{}", table(arch_rows(analysis)));
}

pub fn print_dylibs(analysis: &Analysis) {
    for slice in &analysis.slices {
        println!("{}", slice_heading(slice));
        if slice.dependencies.is_empty() {
            println!("No linked libraries.");
        } else {
            println!("{}", table(dependency_rows(slice)));
        }
    }
}

pub fn print_strings(analysis: &Analysis, limit: Option<usize>) {
    for slice in &analysis.slices {
        println!("{}", slice_heading(slice));
        let rows = string_rows(slice);
        if rows.is_empty() {
            println!("No strings found in the selected sections.");
            continue;
        }
        let total = rows.len();
        let shown: Vec<_> = rows.into_iter().take(limit.unwrap_or(total)).collect();
        let hidden = total - shown.len();
        println!("{}", table(shown));
        if hidden > 0 {
            println!("... {hidden} more (use --max-strings or --json to see them)");
        }
    }
}

pub fn print_report(path: &str, analysis: &Analysis) {
    print_summary(path, analysis);
    print_archs(analysis);
    print_dylibs(analysis);
    print_strings(analysis, Some(TABLE_STRING_SAMPLE));
}

pub fn print_failures(analysis: &Analysis) {
    for failure in &analysis.failures {
        eprintln!(
            "{} architecture {} (fat_arch at {:#x}) skipped: {}",
            "warning:".yellow().bold(),
            failure.index,
            failure.entry_offset,
            failure.error
        );
    }
}
