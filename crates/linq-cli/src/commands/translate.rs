use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::OutputContext;
use crate::config::Config;
use crate::translate::{SymbolTable, translate};

#[derive(Args, Debug, Clone, Default)]
pub struct TranslateArgs {
    /// Source files to translate
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for translated files (stdout when unset)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Declare symbols in this shared module file instead of inline
    #[arg(long)]
    pub symbols: Option<PathBuf>,

    /// Module name for the symbol constants
    #[arg(long)]
    pub module: Option<String>,
}

/// What a translate run produced
#[derive(Debug, Default)]
pub struct TranslateReport {
    /// Files written to the output directory
    pub written: Vec<PathBuf>,
    /// Distinct symbols across all inputs
    pub symbols: SymbolTable,
}

/// `query.lq` becomes `query.rs`; other names are kept
fn output_path(dir: &Path, input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .ok_or_else(|| anyhow!("{} has no file name", input.display()))?;
    let target = dir.join(name);
    if target.extension().is_some_and(|ext| ext == "lq") {
        return Ok(target.with_extension("rs"));
    }
    Ok(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Translate every input, writing to `out` when there is no output directory
pub fn run(args: &TranslateArgs, cfg: &Config, out: &mut dyn Write) -> Result<TranslateReport> {
    let options = cfg.translate_options(args.module.as_deref());
    options.validate()?;
    let output_dir = args.output_dir.clone().or_else(|| cfg.output_dir.clone());

    let mut report = TranslateReport::default();
    if let Some(path) = &args.symbols {
        if path.exists() {
            let existing = fs::read_to_string(path)
                .with_context(|| format!("reading symbols file {}", path.display()))?;
            report.symbols = SymbolTable::parse_declarations(&existing)?;
        }
    }

    for input in &args.inputs {
        let source = fs::read_to_string(input)
            .with_context(|| format!("reading {}", input.display()))?;
        let translation = translate(&source, &options)
            .with_context(|| format!("translating {}", input.display()))?;
        report.symbols.merge(&translation.symbols)?;
        tracing::debug!(
            input = %input.display(),
            symbols = translation.symbols.len(),
            "translated source"
        );

        let rendered = match &args.symbols {
            Some(_) => translation.render_with_shared(),
            None => translation.render(&options),
        };
        match &output_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                let target = output_path(dir, input)?;
                if same_file(&target, input) {
                    bail!("refusing to overwrite input {}", input.display());
                }
                fs::write(&target, rendered)
                    .with_context(|| format!("writing {}", target.display()))?;
                report.written.push(target);
            }
            None => out.write_all(rendered.as_bytes())?,
        }
    }

    if let Some(path) = &args.symbols {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, report.symbols.render_module(&options.crate_path))
            .with_context(|| format!("writing symbols file {}", path.display()))?;
        tracing::debug!(path = %path.display(), symbols = report.symbols.len(), "updated symbols file");
    }

    Ok(report)
}

pub fn execute(args: TranslateArgs, cfg: &Config, output: &OutputContext) -> Result<()> {
    let stdout = std::io::stdout();
    let report = run(&args, cfg, &mut stdout.lock())?;
    if output.json {
        let written: Vec<String> = report
            .written
            .iter()
            .map(|path| path.display().to_string())
            .collect();
        eprintln!(
            "{}",
            serde_json::json!({ "written": written, "symbols": report.symbols.len() })
        );
    } else if output.verbose {
        for path in &report.written {
            eprintln!("wrote {}", path.display());
        }
        eprintln!("{} symbol(s)", report.symbols.len());
    }
    Ok(())
}
