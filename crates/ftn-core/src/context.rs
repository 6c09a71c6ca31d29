//! Central AST context.
//!
//! [`AstContext`] is the single owner of all per-translation-unit state:
//! the identifier interner, the type interner, the AST arenas, the source
//! map and the diagnostics sink. There is no process-wide state; every
//! front-end operation takes the context by reference. Entities live as
//! long as the context and cross-reference each other by id.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::ast::{Decl, DeclContext, DeclKind, Expr, ExprKind, Stmt, StmtKind};
use crate::diagnostic::Diagnostics;
use crate::ids::{DeclId, ExprId, StmtId};
use crate::interner::{Interner, Name};
use crate::source::{SourceMap, Span};
use crate::types::{QualType, TypeInterner};

/// Stores all state for one compilation.
pub struct AstContext {
    /// String interner.
    pub interner: Interner,
    /// Type interner.
    pub types: TypeInterner,
    /// All declarations.
    pub decls: Arena<DeclId, Decl>,
    /// All expressions.
    pub exprs: Arena<ExprId, Expr>,
    /// All statements.
    pub stmts: Arena<StmtId, Stmt>,
    /// Source file management.
    pub source_map: SourceMap,
    /// Accumulated diagnostics.
    pub diagnostics: Diagnostics,
    translation_unit: DeclId,
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AstContext {
    /// Create a new context containing only the translation unit decl.
    pub fn new() -> Self {
        let mut decls = Arena::new();
        let translation_unit = decls.alloc(Decl::new(
            DeclKind::TranslationUnit(DeclContext::new()),
            None,
            Span::default(),
        ));
        Self {
            interner: Interner::new(),
            types: TypeInterner::new(),
            decls,
            exprs: Arena::new(),
            stmts: Arena::new(),
            source_map: SourceMap::new(),
            diagnostics: Diagnostics::new(),
            translation_unit,
        }
    }

    /// The root declaration context.
    pub fn translation_unit(&self) -> DeclId {
        self.translation_unit
    }

    // ========================================================================
    // String interning
    // ========================================================================

    /// Intern a string verbatim.
    pub fn intern(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Intern an identifier spelling; the interner folds it to the
    /// canonical case-insensitive form.
    pub fn intern_ident(&self, s: &str) -> Name {
        self.interner.intern_ident(s)
    }

    /// Get the canonical spelling of an interned name.
    pub fn str(&self, name: Name) -> String {
        self.interner.str(name)
    }

    // ========================================================================
    // Arena access
    // ========================================================================

    pub fn alloc_expr(&mut self, kind: ExprKind, ty: QualType, span: Span) -> ExprId {
        self.exprs.alloc(Expr::new(kind, ty, span))
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id]
    }

    pub fn expr_ty(&self, id: ExprId) -> QualType {
        self.exprs[id].ty
    }

    pub fn expr_span(&self, id: ExprId) -> Span {
        self.exprs[id].span
    }

    pub fn alloc_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.alloc(stmt)
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id]
    }

    pub fn alloc_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.alloc(decl)
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id]
    }

    pub fn decl_name(&self, id: DeclId) -> Option<Name> {
        self.decls[id].name
    }

    // ========================================================================
    // Declaration contexts
    // ========================================================================

    /// Add `child` to the context declaration `parent`, recording the
    /// ownership link.
    pub fn add_to_context(&mut self, parent: DeclId, child: DeclId) {
        let name = self.decls[child].name;
        self.decls[child].owner = Some(parent);
        let context = self.decls[parent]
            .context_mut()
            .expect("adding a child to a non-context declaration");
        context.add(child, name);
    }

    /// Look up `name` among the children of `parent`, building the lazy
    /// lookup map on first use.
    pub fn lookup_in_context(&mut self, parent: DeclId, name: Name) -> Option<DeclId> {
        let context = self.decls[parent]
            .context()
            .expect("lookup in a non-context declaration");
        if let Some(cached) = context.cached_lookup(name) {
            return cached;
        }

        let mut map = HashMap::new();
        for &child in context.children() {
            if let Some(child_name) = self.decls[child].name {
                map.insert(child_name, child);
            }
        }
        let result = map.get(&name).copied();
        self.decls[parent]
            .context_mut()
            .expect("lookup in a non-context declaration")
            .set_lookup(map);
        result
    }

    /// Whether `ancestor` lexically contains `decl` (or is it).
    pub fn context_encloses(&self, ancestor: DeclId, decl: DeclId) -> bool {
        let mut cur = Some(decl);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.decls[id].owner;
        }
        false
    }

    // ========================================================================
    // Type helpers
    // ========================================================================

    /// Pretty-print a qualified type for diagnostics.
    pub fn type_string(&self, qt: QualType) -> String {
        self.types.to_string(qt.ty)
    }

    /// The statement label value of a label expression.
    ///
    /// Label expressions are integer constants by construction.
    pub fn label_value(&self, label: ExprId) -> i64 {
        match self.exprs[label].kind {
            ExprKind::IntegerConstant(v) => v,
            _ => unreachable!("invalid stmt label expression"),
        }
    }

    /// Render a Block statement's body ids, or the single statement.
    pub fn block_body(&self, id: StmtId) -> Vec<StmtId> {
        match &self.stmts[id].kind {
            StmtKind::Block { body } => body.clone(),
            _ => vec![id],
        }
    }

    /// A serializable structural view of the arenas, for `-ast-dump`.
    pub fn dump(&self) -> AstDump<'_> {
        AstDump {
            decls: self.decls.as_slice(),
            exprs: self.exprs.as_slice(),
            stmts: self.stmts.as_slice(),
        }
    }
}

/// Serializable dump of the analyzed AST.
#[derive(serde::Serialize)]
pub struct AstDump<'a> {
    pub decls: &'a [Decl],
    pub exprs: &'a [Expr],
    pub stmts: &'a [Stmt],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VarKind;

    #[test]
    fn test_context_lookup() {
        let mut ctx = AstContext::new();
        let tu = ctx.translation_unit();

        let name = ctx.intern_ident("velocity");
        let decl = ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty: QualType::new(crate::types::Ty::REAL),
                var_kind: VarKind::Local,
                init: None,
            },
            Some(name),
            Span::default(),
        ));
        ctx.add_to_context(tu, decl);

        assert_eq!(ctx.lookup_in_context(tu, name), Some(decl));
        assert_eq!(ctx.decl(decl).owner, Some(tu));

        let other = ctx.intern_ident("pressure");
        assert_eq!(ctx.lookup_in_context(tu, other), None);
    }

    #[test]
    fn test_intern_ident_folds_case() {
        let ctx = AstContext::new();
        assert_eq!(ctx.intern_ident("Velocity"), ctx.intern_ident("VELOCITY"));
        assert_eq!(ctx.str(ctx.intern_ident("x")), "X");
    }

    #[test]
    fn test_context_encloses() {
        let mut ctx = AstContext::new();
        let tu = ctx.translation_unit();
        let prog = ctx.alloc_decl(Decl::new(
            DeclKind::MainProgram {
                context: DeclContext::new(),
                body: None,
            },
            None,
            Span::default(),
        ));
        ctx.add_to_context(tu, prog);

        assert!(ctx.context_encloses(tu, prog));
        assert!(ctx.context_encloses(prog, prog));
        assert!(!ctx.context_encloses(prog, tu));
    }
}
