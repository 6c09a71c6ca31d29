//! The abstract syntax tree.
//!
//! All nodes live in arenas owned by [`crate::context::AstContext`] and
//! reference each other through typed ids. Nodes are immutable once
//! built, with three sanctioned back-patches: the `else` link of an open
//! IF construct, the resolved target of a forward statement-label
//! reference, and the `invalid` bit on declarations.

pub mod decl;
pub mod expr;
pub mod print;
pub mod stmt;

pub use decl::{Decl, DeclContext, DeclKind, VarKind};
pub use expr::{BinaryOp, ConversionKind, Expr, ExprKind, UnaryOp};
pub use stmt::{ConstructPart, LabelRef, LetterSpec, Stmt, StmtKind};
