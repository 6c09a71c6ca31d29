//! Fortran front-end
//!
//! This crate implements a Fortran (fixed- and free-form, F77/F90
//! feature subset) front-end with:
//! - Interned identifiers and canonical interned types
//! - A statement-oriented lexer and a recursive-descent parser driving
//!   semantic actions
//! - Scope-aware semantic analysis: implicit typing, statement-label
//!   resolution, structured-construct checking
//! - Deterministic lowering to a three-address IR, including whole-array
//!   elemental operations and the external call ABI
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           AstContext                            │
//! │  ┌──────────┐ ┌──────────┐ ┌─────────────┐ ┌───────────┐       │
//! │  │ Interner │ │  Types   │ │ Decl/Expr/  │ │ SourceMap │       │
//! │  │ (names)  │ │ (Ty→Kind)│ │ Stmt arenas │ │ + Diags   │       │
//! │  └──────────┘ └──────────┘ └─────────────┘ └───────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//!        ↑              ↑              ↑
//!        │              │              │
//!   ┌────┴────┐    ┌────┴────┐    ┌────┴────┐
//!   │   Lex   │ →  │  Parse  │ ⇄  │  Sema   │ →  IR lowering → print
//!   │ (tokens)│    │ (driver)│    │ (Act*)  │
//!   └─────────┘    └─────────┘    └─────────┘
//! ```
//!
//! The parser owns the token stream and calls a `Sema` action for every
//! statement production; Sema owns declaration contexts, label scopes
//! and typing, and is the only component that builds AST nodes.

// Core modules
pub mod arena;
pub mod ast;
pub mod compiler;
pub mod context;
pub mod diagnostic;
pub mod eval;
pub mod ids;
pub mod interner;
pub mod keywords;
pub mod source;
pub mod types;

// Front-end passes
pub mod lex;
pub mod parse;
pub mod sema;

// Lowering
pub mod ir;

// Re-exports
pub use arena::{Arena, ArenaId};
pub use compiler::{CompileError, CompileOptions, CompileResult, Compiler};
pub use context::AstContext;
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use ids::{BlockId, DeclId, ExprId, FuncId, LocalId, StmtId, ValueId};
pub use interner::{Interner, Name};
pub use source::{Source, SourceForm, SourceId, SourceMap, Span};
pub use types::{QualType, Qualifiers, Ty, TypeInterner, TypeKind};
