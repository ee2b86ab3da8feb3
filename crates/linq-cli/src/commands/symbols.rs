use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::OutputContext;
use crate::config::Config;
use crate::translate::{SymbolTable, const_name, translate};

#[derive(Args, Debug, Clone, Default)]
pub struct SymbolsArgs {
    /// Source files to scan
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Collect the distinct symbols of every input and list them on `out`
pub fn run(
    args: &SymbolsArgs,
    cfg: &Config,
    output: &OutputContext,
    out: &mut dyn Write,
) -> Result<SymbolTable> {
    let options = cfg.translate_options(None);
    let mut table = SymbolTable::new();
    for input in &args.inputs {
        let source = fs::read_to_string(input)
            .with_context(|| format!("reading {}", input.display()))?;
        let translation = translate(&source, &options)
            .with_context(|| format!("scanning {}", input.display()))?;
        table.merge(&translation.symbols)?;
    }

    if output.json {
        let symbols: Vec<_> = table.symbols().collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&symbols)?)?;
    } else {
        for symbol in table.symbols() {
            if output.verbose {
                writeln!(out, "{}\t{}", const_name(symbol.as_str()), symbol)?;
            } else {
                writeln!(out, "{}", symbol)?;
            }
        }
    }
    Ok(table)
}

pub fn execute(args: SymbolsArgs, cfg: &Config, output: &OutputContext) -> Result<()> {
    let stdout = std::io::stdout();
    run(&args, cfg, output, &mut stdout.lock())?;
    Ok(())
}
