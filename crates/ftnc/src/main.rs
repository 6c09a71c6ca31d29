//! Fortran compiler driver.
//!
//! The driver wires the CLI surface to `ftn-core`: it reads the input,
//! selects the source form from the extension (`.f`/`.F` fixed form),
//! runs the front-end, and emits diagnostics, the printed AST, or the
//! lowered IR text. Object emission and linking belong to an external
//! system compiler; `-S`, `-c`, `-L` and `-l` are accepted so build
//! systems can pass them, and stop at IR emission.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ftn_core::ir::print::print_module;
use ftn_core::{CompileError, CompileOptions, Compiler, SourceForm};

#[derive(Parser)]
#[command(name = "ftnc")]
#[command(version, about = "Fortran compiler", long_about = None)]
struct Cli {
    /// Input source path; '-' reads standard input.
    input: String,

    /// Append a directory to the include search list.
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Do not discard comments.
    #[arg(short = 'C')]
    retain_comments: bool,

    /// Run the verifying diagnostic consumer: each `! expected-error
    /// {{msg}}` comment asserts a diagnostic at that line.
    #[arg(long)]
    verify: bool,

    /// Stop after semantic analysis; emit no code.
    #[arg(long = "fsyntax-only")]
    syntax_only: bool,

    /// Print the analyzed AST as source.
    #[arg(long = "ast-print")]
    ast_print: bool,

    /// Dump the analyzed AST as JSON.
    #[arg(long = "ast-dump")]
    ast_dump: bool,

    /// Emit IR text.
    #[arg(long = "emit-llvm")]
    emit_llvm: bool,

    /// Emit assembly (stops at IR text without a target back-end).
    #[arg(short = 'S')]
    emit_asm: bool,

    /// Compile only, do not link.
    #[arg(short = 'c')]
    compile_only: bool,

    /// Emit debug info (recorded; no back-end consumes it here).
    #[arg(short = 'g')]
    debug_info: bool,

    /// Output path.
    #[arg(short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// Library search directory, passed to the external linker.
    #[arg(short = 'L', value_name = "DIR")]
    lib_dirs: Vec<PathBuf>,

    /// Library name, passed to the external linker.
    #[arg(short = 'l', value_name = "LIB")]
    libs: Vec<String>,

    /// Do not resolve the driver path.
    #[arg(long = "no-canonical-prefixes")]
    no_canonical_prefixes: bool,
}

/// LLVM-style single-dash long options (`-verify`, `-emit-llvm`, ...)
/// normalized to the double-dash form clap expects.
fn normalize_args() -> Vec<String> {
    const LONG_FLAGS: &[&str] = &[
        "-verify",
        "-fsyntax-only",
        "-ast-print",
        "-ast-dump",
        "-emit-llvm",
        "-no-canonical-prefixes",
    ];
    std::env::args()
        .map(|arg| {
            if LONG_FLAGS.contains(&arg.as_str()) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args());
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("ftnc: error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (display_path, text, form) = read_input(&cli.input)?;

    let options = CompileOptions {
        form,
        return_comments: cli.retain_comments,
        // AST output needs analysis only, never lowering.
        syntax_only: cli.syntax_only || cli.ast_print || cli.ast_dump,
        verify: cli.verify,
        include_dirs: cli.include.clone(),
    };
    let mut compiler = Compiler::new(options);
    let source = compiler.add_source(&display_path, text);

    let module = match compiler.compile_source(source) {
        Ok(module) => module,
        Err(CompileError::Verify(failures)) => {
            eprintln!("{}", failures);
            return Ok(ExitCode::FAILURE);
        }
        Err(CompileError::Failed(_)) => {
            eprintln!("{}", compiler.render_diagnostics());
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    // Warnings still render on success.
    if !compiler.context().diagnostics.is_empty() {
        eprintln!("{}", compiler.render_diagnostics());
    }

    if cli.verify {
        return Ok(ExitCode::SUCCESS);
    }

    if cli.ast_print {
        print!("{}", compiler.print_ast());
        return Ok(ExitCode::SUCCESS);
    }
    if cli.ast_dump {
        let dump = serde_json::to_string_pretty(&compiler.dump_ast())
            .context("failed to serialize the AST")?;
        println!("{}", dump);
        return Ok(ExitCode::SUCCESS);
    }
    if cli.syntax_only {
        return Ok(ExitCode::SUCCESS);
    }

    let Some(module) = module else {
        return Ok(ExitCode::SUCCESS);
    };
    let ir_text = print_module(&module);

    let output = match (&cli.output, cli.emit_asm, cli.compile_only) {
        (Some(path), _, _) => Some(path.clone()),
        (None, true, _) => Some(replace_extension(&display_path, "s")),
        (None, _, true) => Some(replace_extension(&display_path, "o")),
        _ => None,
    };

    match output {
        Some(path) => std::fs::write(&path, ir_text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", ir_text),
    }
    Ok(ExitCode::SUCCESS)
}

fn read_input(input: &str) -> Result<(PathBuf, String, Option<SourceForm>)> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read standard input")?;
        return Ok((PathBuf::from("<stdin>"), text, Some(SourceForm::Free)));
    }
    let path = PathBuf::from(input);
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", input))?;
    // The extension decides the form; `add_source` re-derives it, so no
    // override is needed here.
    Ok((path, text, None))
}

fn replace_extension(path: &Path, ext: &str) -> PathBuf {
    let mut out = path.to_path_buf();
    out.set_extension(ext);
    out
}
