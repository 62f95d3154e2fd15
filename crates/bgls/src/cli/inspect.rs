//
// cli/inspect.rs
//
// `bgls inspect`: print a script's outline and, on request, its include
// closure and what the reference at a position resolves to
//

use std::fmt::Write;
use std::path::PathBuf;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::Position;

use crate::config::BuildGraphConfig;
use crate::cross_file::content_provider::{DiskReader, FileReader};
use crate::cross_file::dependency::resolve_dependencies;
use crate::cross_file::path_resolve::FileId;
use crate::definition::{classify_reference, resolve_reference};
use crate::outline::{build_outline, Symbol};
use crate::span::LineIndex;

/// Parsed arguments for the `inspect` subcommand.
#[derive(Debug, PartialEq, Eq)]
pub struct InspectArgs {
    pub script: PathBuf,
    pub deps: bool,
    /// One-based line and column
    pub at: Option<(u32, u32)>,
}

/// Parse `inspect` arguments from the remaining CLI args.
///
/// Expected usage: `bgls inspect <script> [--deps] [--at LINE:COL]`
pub fn parse_args(args: &mut impl Iterator<Item = String>) -> Result<InspectArgs, String> {
    let mut script: Option<PathBuf> = None;
    let mut deps = false;
    let mut at = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--deps" => deps = true,
            "--at" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--at requires LINE:COL".to_string())?;
                at = Some(parse_line_col(&value)?);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown flag: '{}'", other));
            }
            _ => {
                if script.is_some() {
                    return Err("Multiple scripts provided; expected exactly one".to_string());
                }
                script = Some(PathBuf::from(arg));
            }
        }
    }

    let script = script.ok_or_else(|| "Missing required <script> argument".to_string())?;
    Ok(InspectArgs { script, deps, at })
}

fn parse_line_col(value: &str) -> Result<(u32, u32), String> {
    let invalid = || format!("Invalid position '{}'; expected LINE:COL", value);
    let (line, col) = value.split_once(':').ok_or_else(invalid)?;
    let line: u32 = line.trim().parse().map_err(|_| invalid())?;
    let col: u32 = col.trim().parse().map_err(|_| invalid())?;
    if line == 0 || col == 0 {
        return Err(format!("Position '{}' is one-based", value));
    }
    Ok((line, col))
}

/// Run the inspection and return the report text.
pub async fn run_inspect(args: &InspectArgs, config: &BuildGraphConfig) -> anyhow::Result<String> {
    let absolute = if args.script.is_absolute() {
        args.script.clone()
    } else {
        std::env::current_dir()
            .context("Cannot determine the working directory")?
            .join(&args.script)
    };
    let file = FileId::new(&absolute)
        .with_context(|| format!("Invalid script path {}", absolute.display()))?;
    let text = DiskReader
        .read_text(&file)
        .await
        .with_context(|| format!("Cannot read script {}", file))?;

    let index = LineIndex::new(&text);
    let mut report = String::new();

    writeln!(report, "Outline of {}:", file)?;
    write_symbols(&mut report, &build_outline(&text), &index, 1)?;

    if args.deps {
        let cancel = CancellationToken::new();
        writeln!(report, "\nIncludes:")?;
        if let Some(set) =
            resolve_dependencies(&file, &DiskReader, &cancel, config.max_dependency_files).await
        {
            for (i, dep) in set.iter().enumerate().skip(1) {
                let marker = if DiskReader.exists(dep).await { "" } else { " (missing)" };
                writeln!(report, "  {:>3}. {}{}", i, dep, marker)?;
            }
        }
    }

    if let Some((line, col)) = args.at {
        let offset = index.offset_at(Position::new(line - 1, col - 1));
        writeln!(report, "\nAt {}:{}:", line, col)?;
        match classify_reference(&text, offset) {
            None => writeln!(report, "  no reference")?,
            Some(reference) => {
                writeln!(report, "  {:?} reference '{}'", reference.scope(), reference.name())?;
                let outcome = resolve_reference(
                    &file,
                    &text,
                    &reference,
                    &DiskReader,
                    &CancellationToken::new(),
                    config,
                )
                .await;
                if let Some(definition) = outcome.definition {
                    let start = definition.target_range.start;
                    writeln!(
                        report,
                        "  -> {}:{}:{}",
                        definition.target_file,
                        start.line + 1,
                        start.character + 1
                    )?;
                    writeln!(report, "     {}", definition.preview_line)?;
                } else {
                    writeln!(report, "  -> not found")?;
                }
                if let Some(warning) = outcome.warning {
                    writeln!(report, "  warning: {}", warning)?;
                }
            }
        }
    }

    Ok(report)
}

fn write_symbols(
    out: &mut String,
    symbols: &[Symbol],
    index: &LineIndex<'_>,
    depth: usize,
) -> std::fmt::Result {
    for symbol in symbols {
        let start = index.position_at(symbol.full_range.start);
        writeln!(
            out,
            "{:indent$}{:?} {} [{}:{}]",
            "",
            symbol.category,
            symbol.name,
            start.line + 1,
            start.character + 1,
            indent = depth * 2
        )?;
        write_symbols(out, &symbol.children, index, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(&mut args(&["Build.xml", "--deps", "--at", "3:14"])).unwrap();
        assert_eq!(
            parsed,
            InspectArgs {
                script: PathBuf::from("Build.xml"),
                deps: true,
                at: Some((3, 14)),
            }
        );
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&mut args(&[])).is_err());
        assert!(parse_args(&mut args(&["a.xml", "b.xml"])).is_err());
        assert!(parse_args(&mut args(&["a.xml", "--at"])).is_err());
        assert!(parse_args(&mut args(&["a.xml", "--at", "0:1"])).is_err());
        assert!(parse_args(&mut args(&["a.xml", "--at", "x"])).is_err());
        assert!(parse_args(&mut args(&["a.xml", "--verbose"])).is_err());
    }

    #[tokio::test]
    async fn test_run_inspect_reports_outline_deps_and_definition() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Common.xml"),
            "<BuildGraph>\n  <Macro Name=\"Sign\" Arguments=\"Files\"/>\n</BuildGraph>\n",
        )
        .unwrap();
        let main = dir.path().join("Main.xml");
        std::fs::write(
            &main,
            "<Include Script=\"Common.xml\"/>\n<Include Script=\"Gone.xml\"/>\n<Agent Name=\"A\">\n  <Expand Name=\"Sign\"/>\n</Agent>\n",
        )
        .unwrap();

        let report = run_inspect(
            &InspectArgs {
                script: main,
                deps: true,
                at: Some((4, 18)),
            },
            &BuildGraphConfig::default(),
        )
        .await
        .unwrap();

        assert!(report.contains("Agent A [3:1]"), "{}", report);
        assert!(report.contains("Include Common.xml [1:1]"), "{}", report);
        assert!(report.contains("Common.xml\n"), "{}", report);
        assert!(report.contains("Gone.xml (missing)"), "{}", report);
        assert!(report.contains("Transitive reference 'Sign'"), "{}", report);
        assert!(report.contains("Common.xml:2:3"), "{}", report);
        assert!(report.contains("<Macro Name=\"Sign\" Arguments=\"Files\"/>"), "{}", report);
    }
}
