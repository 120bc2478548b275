//! # kast
//!
//! Parses a test script, validates every module in it and prints a summary of
//! what was found. Diagnostics go to stderr; the exit status is non-zero if
//! there were any.

use anyhow::{bail, Context, Result};
use clap::Parser;
use kast::ast::Module;
use kast::config::ParseLimits;
use kast::wast::{parse_file_with_limits, File, TestDirective};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kast")]
#[command(about = "Parse and validate WebAssembly S-expression test scripts")]
#[command(version)]
struct Cli {
    /// Script to parse
    file: PathBuf,

    /// JSON file with parser limits
    #[arg(long)]
    limits: Option<PathBuf>,

    /// Maximum expression nesting depth, overriding the limits file
    #[arg(long)]
    max_depth: Option<usize>,

    /// Print the AST of every function body
    #[arg(long)]
    dump: bool,

    /// Use verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let mut limits = match &cli.limits {
        Some(path) => {
            ParseLimits::load(path).with_context(|| format!("failed to load limits from {}", path.display()))?
        }
        None => ParseLimits::default(),
    };
    if let Some(max_depth) = cli.max_depth {
        if max_depth == 0 {
            bail!("--max-depth must be at least 1");
        }
        limits.max_depth = max_depth;
    }

    let source =
        std::fs::read_to_string(&cli.file).with_context(|| format!("failed to read {}", cli.file.display()))?;
    let file = parse_file_with_limits(&source, &limits);

    for (index, module) in file.modules.iter().enumerate() {
        print_module(&file, index, module, cli.dump);
    }

    for error in &file.errors {
        eprintln!("{}:{}: {}: {}", cli.file.display(), error.locus, error.kind, error.message);
    }
    if !file.is_valid() {
        bail!("{} error(s) in {}", file.errors.len(), cli.file.display());
    }
    Ok(())
}

fn print_module(file: &File, index: usize, module: &Module, dump: bool) {
    println!(
        "module {}: {} functions, {} imports, {} tables, {} segments, memory {}..{} bytes",
        index,
        module.functions.len(),
        module.function_imports.len(),
        module.function_tables.len(),
        module.data_segments.len(),
        module.initial_memory_bytes,
        module.max_memory_bytes
    );

    for (i, function) in module.functions.iter().enumerate() {
        let name = function.name.as_deref().map(|n| format!(" ${}", n)).unwrap_or_default();
        println!("  func {}{} {}", i, name, function.ty);
        if dump {
            if let Some(body) = &function.body {
                println!("{:#?}", body);
            }
        }
    }
    for (i, import) in module.function_imports.iter().enumerate() {
        println!("  import {} \"{}\".\"{}\" {}", i, import.module, import.name, import.ty);
    }
    for (i, table) in module.function_tables.iter().enumerate() {
        println!("  table {} {}: {:?}", i, table.ty, table.functions);
    }
    for (i, segment) in module.data_segments.iter().enumerate() {
        println!("  segment {} @ {:#x}: {}", i, segment.base_address, hex::encode(&segment.data));
    }

    let mut exports: Vec<_> = module.exports.iter().collect();
    exports.sort();
    for (name, function) in exports {
        println!("  export \"{}\" -> func {}", name, function);
    }

    let tests = file.module_tests.get(index).map(Vec::as_slice).unwrap_or_default();
    if !tests.is_empty() {
        let count = |f: fn(&TestDirective) -> bool| tests.iter().filter(|t| f(t)).count();
        println!(
            "  {} test directives ({} invoke, {} assert, {} assert_return_nan)",
            tests.len(),
            count(|t| matches!(t, TestDirective::Invoke(_))),
            count(|t| matches!(t, TestDirective::Assert { .. })),
            count(|t| matches!(t, TestDirective::AssertNaN { .. })),
        );
    }
}
