//! Declaration nodes.

use crate::ids::{DeclId, ExprId, StmtId};
use crate::interner::Name;
use crate::keywords::Builtin;
use crate::source::Span;
use crate::types::QualType;
use serde::Serialize;
use std::collections::HashMap;

/// A declaration.
#[derive(Debug, Clone, Serialize)]
pub struct Decl {
    pub kind: DeclKind,
    /// The declared name; anonymous for the translation unit and for an
    /// unnamed PROGRAM.
    pub name: Option<Name>,
    /// The lexical context owning this declaration; `None` only for the
    /// translation unit.
    pub owner: Option<DeclId>,
    pub span: Span,
    /// Set when the declaration was built from erroneous input; later
    /// passes skip invalid declarations.
    pub invalid: bool,
    /// Set when the declaration was synthesized by implicit typing.
    pub implicit: bool,
}

impl Decl {
    pub fn new(kind: DeclKind, name: Option<Name>, span: Span) -> Self {
        Self {
            kind,
            name,
            owner: None,
            span,
            invalid: false,
            implicit: false,
        }
    }

    /// The contained context, for context-capable declarations.
    pub fn context(&self) -> Option<&DeclContext> {
        match &self.kind {
            DeclKind::TranslationUnit(c)
            | DeclKind::MainProgram { context: c, .. }
            | DeclKind::Function { context: c, .. }
            | DeclKind::Subroutine { context: c, .. }
            | DeclKind::Module(c)
            | DeclKind::Submodule(c)
            | DeclKind::Record(c) => Some(c),
            _ => None,
        }
    }

    pub fn context_mut(&mut self) -> Option<&mut DeclContext> {
        match &mut self.kind {
            DeclKind::TranslationUnit(c)
            | DeclKind::MainProgram { context: c, .. }
            | DeclKind::Function { context: c, .. }
            | DeclKind::Subroutine { context: c, .. }
            | DeclKind::Module(c)
            | DeclKind::Submodule(c)
            | DeclKind::Record(c) => Some(c),
            _ => None,
        }
    }

    /// The declared type, for value declarations.
    pub fn ty(&self) -> Option<QualType> {
        match &self.kind {
            DeclKind::Var { ty, .. }
            | DeclKind::Field { ty }
            | DeclKind::EnumConstant { ty, .. } => Some(*ty),
            DeclKind::Function { result, .. } => Some(*result),
            _ => None,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Var {
                var_kind: VarKind::Parameter,
                ..
            }
        )
    }

    pub fn is_argument(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Var {
                var_kind: VarKind::Argument,
                ..
            }
        )
    }
}

/// What kind of entity a `Var` declaration is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarKind {
    Local,
    Argument,
    /// A PARAMETER named constant.
    Parameter,
}

/// The declaration variants.
#[derive(Debug, Clone, Serialize)]
pub enum DeclKind {
    TranslationUnit(DeclContext),
    MainProgram {
        context: DeclContext,
        /// The executable part, a Block statement, attached at END.
        body: Option<StmtId>,
    },
    Function {
        context: DeclContext,
        result: QualType,
        args: Vec<DeclId>,
        body: Option<StmtId>,
        /// A statement function `F(X) = expr`; its body is the single
        /// expression and every call site inlines it.
        body_expr: Option<ExprId>,
    },
    Subroutine {
        context: DeclContext,
        args: Vec<DeclId>,
        body: Option<StmtId>,
    },
    Module(DeclContext),
    Submodule(DeclContext),
    Record(DeclContext),
    Field {
        ty: QualType,
    },
    Var {
        ty: QualType,
        var_kind: VarKind,
        init: Option<ExprId>,
    },
    EnumConstant {
        ty: QualType,
        value: Option<ExprId>,
    },
    IntrinsicFunction {
        builtin: Builtin,
    },
    FileScopeAsm {
        text: String,
    },
}

impl DeclKind {
    pub fn is_statement_function(&self) -> bool {
        matches!(
            self,
            DeclKind::Function {
                body_expr: Some(_),
                ..
            }
        )
    }
}

/// The container side of a context-capable declaration.
///
/// Children are kept in insertion order (code emission depends on it);
/// the name lookup map is built lazily on first query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeclContext {
    children: Vec<DeclId>,
    #[serde(skip)]
    lookup: Option<HashMap<Name, DeclId>>,
}

impl DeclContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child, keeping the lazy lookup map coherent if it has
    /// already been built.
    pub fn add(&mut self, child: DeclId, name: Option<Name>) {
        self.children.push(child);
        if let (Some(map), Some(name)) = (self.lookup.as_mut(), name) {
            map.insert(name, child);
        }
    }

    pub fn children(&self) -> &[DeclId] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the lookup map has been materialized yet.
    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }

    /// Query the lookup map; `None` if it was never built.
    pub fn cached_lookup(&self, name: Name) -> Option<Option<DeclId>> {
        self.lookup.as_ref().map(|map| map.get(&name).copied())
    }

    /// Install the lazily built lookup map.
    pub fn set_lookup(&mut self, map: HashMap<Name, DeclId>) {
        self.lookup = Some(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::DeclId;

    #[test]
    fn test_context_preserves_insertion_order() {
        let mut ctx = DeclContext::new();
        ctx.add(DeclId::new(3), None);
        ctx.add(DeclId::new(1), None);
        ctx.add(DeclId::new(2), None);
        assert_eq!(
            ctx.children(),
            &[DeclId::new(3), DeclId::new(1), DeclId::new(2)]
        );
    }

    #[test]
    fn test_context_lookup_stays_coherent() {
        let mut ctx = DeclContext::new();
        ctx.set_lookup(HashMap::new());

        let name = Name(7);
        ctx.add(DeclId::new(0), Some(name));
        assert_eq!(ctx.cached_lookup(name), Some(Some(DeclId::new(0))));
        assert_eq!(ctx.cached_lookup(Name(8)), Some(None));
    }
}
