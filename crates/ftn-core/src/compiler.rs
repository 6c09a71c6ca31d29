//! Main compiler driver.
//!
//! This module provides the high-level API for compiling a Fortran
//! source buffer through the pipeline: lex/parse + semantic analysis
//! (one pass, the parser drives Sema) and IR lowering. IR lowering is
//! suppressed entirely when any error diagnostic was emitted.

use std::path::PathBuf;

use crate::ast::print::print_translation_unit;
use crate::context::{AstContext, AstDump};
use crate::diagnostic::verify;
use crate::ir;
use crate::parse::Parser;
use crate::source::{SourceForm, SourceId};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation error.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Error diagnostics were emitted; render them from the context.
    #[error("compilation failed with {0} error(s)")]
    Failed(usize),
    /// `-verify` expectations did not match the emitted diagnostics.
    #[error("verification failed:\n{0}")]
    Verify(String),
}

/// Compilation options.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Source form override; `None` selects by file extension.
    pub form: Option<SourceForm>,
    /// Keep comment tokens in the token stream (`-C`).
    pub return_comments: bool,
    /// Stop after semantic analysis (`-fsyntax-only`).
    pub syntax_only: bool,
    /// Match diagnostics against `! expected-*` annotations (`-verify`).
    pub verify: bool,
    /// Include search directories (`-I`); include resolution itself is
    /// the driver's concern.
    pub include_dirs: Vec<PathBuf>,
}

/// Compiler instance: one translation unit per instance.
pub struct Compiler {
    ctx: AstContext,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            ctx: AstContext::new(),
            options,
        }
    }

    pub fn context(&self) -> &AstContext {
        &self.ctx
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Register a source buffer under a display path.
    pub fn add_source(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> SourceId {
        let path = path.into();
        let form = self
            .options
            .form
            .unwrap_or_else(|| SourceForm::from_path(&path));
        self.ctx.source_map.add_file_with_form(path, text, form)
    }

    /// Run the front-end over a registered source: parse + analyze,
    /// check `-verify` expectations, and (when the unit is clean and
    /// code is wanted) lower to IR.
    pub fn compile_source(&mut self, source: SourceId) -> CompileResult<Option<ir::Module>> {
        let mut parser = Parser::new(&mut self.ctx, source, self.options.return_comments);
        parser.parse_program_units();

        if self.options.verify {
            let failures = verify::check(source, &self.ctx.diagnostics, &self.ctx.source_map);
            if failures.is_empty() {
                return Ok(None);
            }
            return Err(CompileError::Verify(failures.join("\n")));
        }

        if self.ctx.diagnostics.has_errors() {
            return Err(CompileError::Failed(self.ctx.diagnostics.error_count()));
        }
        if self.options.syntax_only {
            return Ok(None);
        }
        Ok(Some(ir::lower_translation_unit(&self.ctx)))
    }

    pub fn has_errors(&self) -> bool {
        self.ctx.diagnostics.has_errors()
    }

    /// Render accumulated diagnostics in `path:line:col:` form.
    pub fn render_diagnostics(&self) -> String {
        self.ctx.diagnostics.render(&self.ctx.source_map)
    }

    /// Render the analyzed AST back to source (`-ast-print`).
    pub fn print_ast(&self) -> String {
        print_translation_unit(&self.ctx)
    }

    /// Structural AST dump (`-ast-dump`).
    pub fn dump_ast(&self) -> AstDump<'_> {
        self.ctx.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_compile_produces_ir() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let source = compiler.add_source("t.f90", "PROGRAM P\nX = 1.0\nEND\n");
        let module = compiler.compile_source(source).unwrap();
        assert!(module.is_some());
        assert_eq!(module.unwrap().functions.len(), 1);
    }

    #[test]
    fn test_syntax_only_skips_lowering() {
        let mut compiler = Compiler::new(CompileOptions {
            syntax_only: true,
            ..CompileOptions::default()
        });
        let source = compiler.add_source("t.f90", "PROGRAM P\nEND\n");
        assert!(compiler.compile_source(source).unwrap().is_none());
    }

    #[test]
    fn test_errors_suppress_lowering() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let source = compiler.add_source("t.f90", "PROGRAM P\nREAL X\nCHARACTER C\nX = C\nEND\n");
        let result = compiler.compile_source(source);
        assert!(matches!(result, Err(CompileError::Failed(1))));
        assert!(compiler.render_diagnostics().contains("t.f90:4:"));
    }

    #[test]
    fn test_fixed_form_selected_by_extension() {
        let mut compiler = Compiler::new(CompileOptions::default());
        let source = compiler.add_source(
            "t.f",
            "      PROGRAM P\n      X = 1.0\n      END\n",
        );
        assert!(compiler.compile_source(source).unwrap().is_some());
    }

    #[test]
    fn test_verify_mode() {
        let mut compiler = Compiler::new(CompileOptions {
            verify: true,
            ..CompileOptions::default()
        });
        let source = compiler.add_source(
            "t.f90",
            "PROGRAM P\nREAL X\nCHARACTER C\nX = C ! expected-error {{incompatible types in assignment}}\nEND\n",
        );
        assert!(compiler.compile_source(source).is_ok());
    }

    #[test]
    fn test_verify_mode_reports_mismatch() {
        let mut compiler = Compiler::new(CompileOptions {
            verify: true,
            ..CompileOptions::default()
        });
        let source = compiler.add_source(
            "t.f90",
            "PROGRAM P\nX = 1.0 ! expected-error {{this never happens}}\nEND\n",
        );
        assert!(matches!(
            compiler.compile_source(source),
            Err(CompileError::Verify(_))
        ));
    }
}
