//! Semantic analysis.
//!
//! [`Sema`] is the action interface the parser drives: every statement
//! production calls a matching `act_on_*` method, and the parser itself
//! never constructs AST nodes. Sema owns the declaration-context stack,
//! the statement-label scope and the implicit-typing scope of the unit
//! being analyzed.
//!
//! Failure is communicated by `Option`/`None` returns plus diagnostics
//! in the sink; nothing here panics on user errors.

pub mod expr;
pub mod scope;
pub mod stmt;

use crate::ast::{Decl, DeclContext, DeclKind, ExprKind, LetterSpec, StmtKind, VarKind};
use crate::context::AstContext;
use crate::diagnostic::Diagnostic;
use crate::ids::{DeclId, ExprId, StmtId};
use crate::interner::Name;
use crate::source::Span;
use crate::types::{DimSpec, ExtAttr, Intent, QualType, Qualifiers, Ty, TypeSpec};

use scope::{ImplicitRule, ImplicitTypingScope, StmtLabelScope};

/// The collected specifiers of a type declaration statement.
#[derive(Debug, Clone, Default)]
pub struct DeclSpec {
    pub type_spec: Option<TypeSpec>,
    pub kind_selector: Option<ExprId>,
    pub len_selector: Option<ExprId>,
    /// Allocatable/Parameter/Volatile bits ([`Qualifiers`] flag values).
    pub apv: u32,
    pub ext_attr: Option<ExtAttr>,
    pub intent: Option<Intent>,
    /// Dimensions from a DIMENSION attribute.
    pub dims: Vec<DimSpec>,
}

impl DeclSpec {
    pub fn has_attributes(&self) -> bool {
        self.apv != 0
            || self.ext_attr.is_some()
            || self.intent.is_some()
            || !self.dims.is_empty()
            || self.kind_selector.is_some()
            || self.len_selector.is_some()
    }
}

/// Semantic actions and per-unit analysis state.
pub struct Sema<'a> {
    pub ctx: &'a mut AstContext,
    /// The declaration context being populated.
    cur_context: DeclId,
    /// O(1) spelling -> current declaration map (the front-end token
    /// payload). Entries are never removed; lookups validate that the
    /// recorded declaration is visible from the current context.
    payload: std::collections::HashMap<Name, DeclId>,
    /// Statement labels of the current executable unit.
    pub(crate) stmt_labels: StmtLabelScope,
    /// Implicit-typing rules of the current unit.
    pub(crate) implicit: ImplicitTypingScope,
    /// Open block-IF constructs.
    pub(crate) if_stack: Vec<StmtId>,
    /// Labeled DO statements awaiting terminator validation.
    pub(crate) do_list: Vec<StmtId>,
    /// Depth of open DO ... END DO constructs.
    pub(crate) do_construct_depth: usize,
}

impl<'a> Sema<'a> {
    pub fn new(ctx: &'a mut AstContext) -> Self {
        let tu = ctx.translation_unit();
        Self {
            ctx,
            cur_context: tu,
            payload: std::collections::HashMap::new(),
            stmt_labels: StmtLabelScope::new(),
            implicit: ImplicitTypingScope::new(),
            if_stack: Vec::new(),
            do_list: Vec::new(),
            do_construct_depth: 0,
        }
    }

    pub fn current_context(&self) -> DeclId {
        self.cur_context
    }

    // ========================================================================
    // Declaration contexts
    // ========================================================================

    /// Enter a child context. The context must be lexically contained in
    /// the current one.
    pub fn push_decl_context(&mut self, decl: DeclId) {
        assert_eq!(
            self.ctx.decl(decl).owner,
            Some(self.cur_context),
            "the next DeclContext should be lexically contained in the current one"
        );
        self.cur_context = decl;
    }

    /// Leave the current context.
    pub fn pop_decl_context(&mut self) {
        let parent = self
            .ctx
            .decl(self.cur_context)
            .owner
            .expect("DeclContext imbalance: popped the translation unit");
        self.cur_context = parent;
    }

    /// Look up a name through the payload map, ignoring declarations
    /// from unrelated contexts.
    pub fn lookup(&self, name: Name) -> Option<DeclId> {
        let decl = *self.payload.get(&name)?;
        let owner = self.ctx.decl(decl).owner?;
        if self.ctx.context_encloses(owner, self.cur_context) {
            Some(decl)
        } else {
            None
        }
    }

    fn record_payload(&mut self, name: Name, decl: DeclId) {
        self.payload.insert(name, decl);
    }

    // ========================================================================
    // Program units
    // ========================================================================

    fn push_executable_unit(&mut self) {
        debug_assert!(self.stmt_labels.is_empty());
        debug_assert!(self.if_stack.is_empty());
        debug_assert!(self.do_list.is_empty());
        self.implicit = ImplicitTypingScope::new();
    }

    pub fn act_on_main_program(&mut self, name: Option<Name>, loc: Span) -> DeclId {
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::MainProgram {
                context: DeclContext::new(),
                body: None,
            },
            name,
            loc,
        ));
        self.ctx.add_to_context(self.ctx.translation_unit(), decl);
        self.push_decl_context(decl);
        self.push_executable_unit();
        decl
    }

    pub fn act_on_end_main_program(
        &mut self,
        end_name: Option<Name>,
        end_name_loc: Span,
        loc: Span,
        body: Vec<StmtId>,
    ) {
        let unit = self.cur_context;
        let prog_name = self.ctx.decl(unit).name;
        if let (Some(prog), Some(end)) = (prog_name, end_name) {
            if prog != end {
                let expected = self.ctx.str(prog);
                self.ctx.diagnostics.error(
                    end_name_loc,
                    format!("expected label '{}' for END PROGRAM statement", expected),
                );
            }
        }

        self.finalize_unit_body(unit, body);
        self.pop_decl_context();
        self.pop_executable_unit(loc);
    }

    pub fn act_on_subroutine(&mut self, name: Option<Name>, loc: Span) -> DeclId {
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Subroutine {
                context: DeclContext::new(),
                args: Vec::new(),
                body: None,
            },
            name,
            loc,
        ));
        self.ctx.add_to_context(self.ctx.translation_unit(), decl);
        if let Some(name) = name {
            self.record_payload(name, decl);
        }
        self.push_decl_context(decl);
        self.push_executable_unit();
        decl
    }

    pub fn act_on_function(&mut self, ds: Option<&DeclSpec>, name: Option<Name>, loc: Span) -> DeclId {
        let result = match ds {
            Some(ds) => self.act_on_type_name(ds),
            None => QualType::new(Ty::ERROR),
        };
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Function {
                context: DeclContext::new(),
                result,
                args: Vec::new(),
                body: None,
                body_expr: None,
            },
            name,
            loc,
        ));
        self.ctx.add_to_context(self.ctx.translation_unit(), decl);
        if let Some(name) = name {
            self.record_payload(name, decl);
        }
        self.push_decl_context(decl);
        self.push_executable_unit();
        decl
    }

    /// Declare one dummy argument of the enclosing subprogram. Its type
    /// stays unresolved until an explicit declaration retypes it or a
    /// reference forces implicit typing.
    pub fn act_on_dummy_argument(&mut self, name: Name, loc: Span) -> DeclId {
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty: QualType::new(Ty::ERROR),
                var_kind: VarKind::Argument,
                init: None,
            },
            Some(name),
            loc,
        ));
        self.ctx.decl_mut(decl).implicit = true;
        self.ctx.add_to_context(self.cur_context, decl);
        self.record_payload(name, decl);
        match &mut self.ctx.decl_mut(self.cur_context).kind {
            DeclKind::Function { args, .. } | DeclKind::Subroutine { args, .. } => args.push(decl),
            _ => {}
        }
        decl
    }

    pub fn act_on_end_subprogram(
        &mut self,
        end_name: Option<Name>,
        end_name_loc: Span,
        loc: Span,
        body: Vec<StmtId>,
    ) {
        let unit = self.cur_context;
        let unit_name = self.ctx.decl(unit).name;
        if let (Some(expected), Some(end)) = (unit_name, end_name) {
            if expected != end {
                let expected = self.ctx.str(expected);
                self.ctx.diagnostics.error(
                    end_name_loc,
                    format!("expected label '{}' for END statement", expected),
                );
            }
        }

        // Arguments never retyped nor referenced get their implicit type
        // now, so the call ABI sees a resolved signature.
        let args: Vec<DeclId> = match &self.ctx.decl(unit).kind {
            DeclKind::Function { args, .. } | DeclKind::Subroutine { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        for arg in args {
            if self.ctx.decl(arg).ty().map(|t| t.ty) == Some(Ty::ERROR) {
                self.resolve_implicit_type(arg);
            }
        }
        let needs_result = matches!(
            &self.ctx.decl(unit).kind,
            DeclKind::Function { result, .. } if result.ty == Ty::ERROR
        );
        if needs_result {
            if let Some(name) = unit_name {
                let ty = self.implicit_type_for(name, loc);
                if let DeclKind::Function { result, .. } = &mut self.ctx.decl_mut(unit).kind {
                    *result = ty;
                }
            }
        }

        self.finalize_unit_body(unit, body);
        self.pop_decl_context();
        self.pop_executable_unit(loc);
    }

    fn finalize_unit_body(&mut self, unit: DeclId, body: Vec<StmtId>) {
        let span = self.ctx.decl(unit).span;
        let block = self.act_on_block(body, span);
        match &mut self.ctx.decl_mut(unit).kind {
            DeclKind::MainProgram { body, .. }
            | DeclKind::Function { body, .. }
            | DeclKind::Subroutine { body, .. } => *body = Some(block),
            _ => {}
        }
    }

    pub fn act_on_block(&mut self, body: Vec<StmtId>, span: Span) -> StmtId {
        self.ctx
            .alloc_stmt(crate::ast::Stmt::new(StmtKind::Block { body }, None, span))
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Reduce a DeclSpec to a QualType.
    pub fn act_on_type_name(&mut self, ds: &DeclSpec) -> QualType {
        let spec = ds.type_spec.unwrap_or(TypeSpec::Real);
        let ty = self
            .ctx
            .types
            .intern_builtin(spec, ds.kind_selector, ds.len_selector);

        let mut quals = Qualifiers::new();
        if !ds.has_attributes() {
            return QualType::new(ty);
        }
        quals.add_apv(ds.apv);
        if let Some(attr) = ds.ext_attr {
            quals.set_ext_attr(attr);
        }
        if let Some(intent) = ds.intent {
            quals.set_intent(intent);
        }

        let qt = QualType::with_quals(ty, quals);
        if ds.dims.is_empty() {
            qt
        } else {
            self.act_on_array_spec(qt, ds.dims.clone())
        }
    }

    /// Wrap an element type into an array type.
    pub fn act_on_array_spec(&mut self, elem: QualType, dims: Vec<DimSpec>) -> QualType {
        let array = self.ctx.types.intern_array(elem.ty, dims);
        QualType::with_quals(array, elem.quals)
    }

    /// Validate the dimension declarators of an entity: `*` only in the
    /// last dimension (and only on dummy arguments), explicit bounds
    /// integer, and constant for anything that is not a dummy argument.
    fn check_array_spec(&mut self, dims: &[DimSpec], is_argument: bool, loc: Span) -> bool {
        let mut valid = true;
        for (index, dim) in dims.iter().enumerate() {
            match dim {
                DimSpec::AssumedSize => {
                    if index + 1 != dims.len() {
                        self.ctx.diagnostics.error(
                            loc,
                            "dimension declarator '*' must be used only in the last dimension",
                        );
                        valid = false;
                    }
                }
                DimSpec::Explicit { lower, upper } => {
                    for bound in lower.iter().chain(std::iter::once(upper)) {
                        valid &= self.check_bound_expr(*bound, is_argument);
                    }
                }
            }
        }
        valid
    }

    fn check_bound_expr(&mut self, bound: ExprId, is_argument: bool) -> bool {
        let span = self.ctx.expr_span(bound);
        let ty = self.ctx.expr_ty(bound).ty;
        if self.ctx.types.is_error(ty) {
            return false;
        }
        if !self.ctx.types.is_integer(ty) {
            self.ctx
                .diagnostics
                .error(span, "expected an integer constant expression");
            return false;
        }
        // Dummy arguments may have adjustable bounds; everything else
        // must fold.
        if !is_argument && !crate::eval::is_constant_expr(self.ctx, bound) {
            self.ctx
                .diagnostics
                .error(span, "expected an integer constant expression");
            return false;
        }
        true
    }

    // ========================================================================
    // Entity declarations
    // ========================================================================

    /// Declare one entity of a type declaration statement. `entity_dims`
    /// and `entity_len` override the DeclSpec for `name(dims)*len` forms.
    pub fn act_on_entity_decl(
        &mut self,
        ds: &DeclSpec,
        entity_dims: Vec<DimSpec>,
        entity_len: Option<ExprId>,
        name: Name,
        loc: Span,
        init: Option<ExprId>,
    ) -> Option<DeclId> {
        let mut ds = ds.clone();
        if !entity_dims.is_empty() {
            ds.dims = entity_dims;
        }
        if entity_len.is_some() {
            ds.len_selector = entity_len;
        }

        if let Some(prev) = self.lookup(name) {
            if self.ctx.decl(prev).owner == Some(self.cur_context) {
                // An explicit declaration may retype a not-yet-typed
                // dummy argument; anything else is a redeclaration.
                let retypable = self.ctx.decl(prev).implicit && self.ctx.decl(prev).is_argument();
                if retypable {
                    let qt = self.act_on_type_name(&ds);
                    self.check_array_spec(&ds.dims, true, loc);
                    if let DeclKind::Var { ty, .. } = &mut self.ctx.decl_mut(prev).kind {
                        *ty = qt;
                    }
                    self.ctx.decl_mut(prev).implicit = false;
                    return Some(prev);
                }
                let prev_loc = self.ctx.decl(prev).span;
                let spelling = self.ctx.str(name);
                self.ctx.diagnostics.push(
                    Diagnostic::error(format!("variable '{}' already declared", spelling))
                        .with_span(loc)
                        .with_note("previous declaration", Some(prev_loc)),
                );
                return None;
            }
        }

        let qt = self.act_on_type_name(&ds);
        let valid = self.check_array_spec(&ds.dims, false, loc);
        if let Some(len) = ds.len_selector {
            self.check_bound_expr(len, false);
        }
        if let Some(kind) = ds.kind_selector {
            self.check_bound_expr(kind, false);
        }

        let var_kind = if qt.quals.has_parameter() {
            VarKind::Parameter
        } else {
            VarKind::Local
        };
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty: qt,
                var_kind,
                init,
            },
            Some(name),
            loc,
        ));
        if !valid {
            self.ctx.decl_mut(decl).invalid = true;
        }
        self.ctx.add_to_context(self.cur_context, decl);
        self.record_payload(name, decl);
        Some(decl)
    }

    /// Resolve the implicit type for a name in the current scope,
    /// diagnosing IMPLICIT NONE violations.
    fn implicit_type_for(&mut self, name: Name, loc: Span) -> QualType {
        let spelling = self.ctx.str(name);
        let letter = spelling.chars().next().unwrap_or('A');
        match self.implicit.resolve(letter) {
            ImplicitRule::None => {
                self.ctx.diagnostics.error(
                    loc,
                    format!("no implicit type for variable '{}'", spelling),
                );
                QualType::new(Ty::ERROR)
            }
            ImplicitRule::Type(ty) => ty,
            ImplicitRule::Default => {
                if ('I'..='N').contains(&letter.to_ascii_uppercase()) {
                    QualType::new(Ty::INTEGER)
                } else {
                    QualType::new(Ty::REAL)
                }
            }
        }
    }

    /// Give an unresolved declaration its implicit type.
    fn resolve_implicit_type(&mut self, decl: DeclId) {
        let name = match self.ctx.decl(decl).name {
            Some(name) => name,
            None => return,
        };
        let loc = self.ctx.decl(decl).span;
        let ty = self.implicit_type_for(name, loc);
        match &mut self.ctx.decl_mut(decl).kind {
            DeclKind::Var { ty: slot, .. } => *slot = ty,
            DeclKind::Function { result, .. } => *result = ty,
            _ => {}
        }
    }

    /// Synthesize a declaration for a bare reference to an undeclared
    /// identifier, per the implicit typing rules.
    pub fn act_on_implicit_entity_decl(&mut self, name: Name, loc: Span) -> Option<DeclId> {
        let ty = self.implicit_type_for(name, loc);
        if ty.ty == Ty::ERROR {
            return None;
        }
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty,
                var_kind: VarKind::Local,
                init: None,
            },
            Some(name),
            loc,
        ));
        self.ctx.decl_mut(decl).implicit = true;
        self.ctx.add_to_context(self.cur_context, decl);
        self.record_payload(name, decl);
        Some(decl)
    }

    // ========================================================================
    // Specification statements
    // ========================================================================

    /// One `name = constant-expr` pair of a PARAMETER statement.
    pub fn act_on_parameter_pair(
        &mut self,
        name: Name,
        loc: Span,
        value: ExprId,
    ) -> Option<(DeclId, ExprId)> {
        if let Some(prev) = self.lookup(name) {
            if self.ctx.decl(prev).owner == Some(self.cur_context) {
                let prev_loc = self.ctx.decl(prev).span;
                let spelling = self.ctx.str(name);
                self.ctx.diagnostics.push(
                    Diagnostic::error(format!("variable '{}' already defined", spelling))
                        .with_span(loc)
                        .with_note("previous definition", Some(prev_loc)),
                );
                return None;
            }
        }

        if !crate::eval::is_constant_expr(self.ctx, value) {
            let span = self.ctx.expr_span(value);
            self.ctx
                .diagnostics
                .error(span, "expected a constant expression");
            return None;
        }

        let mut ty = self.ctx.expr_ty(value);
        ty.quals.add_apv(Qualifiers::PARAMETER);
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Var {
                ty,
                var_kind: VarKind::Parameter,
                init: Some(value),
            },
            Some(name),
            loc,
        ));
        self.ctx.add_to_context(self.cur_context, decl);
        self.record_payload(name, decl);
        Some((decl, value))
    }

    /// Apply the rules of an IMPLICIT statement.
    pub fn act_on_implicit_rules(
        &mut self,
        ty: QualType,
        letters: &[LetterSpec],
        loc: Span,
    ) {
        for spec in letters {
            if !self.implicit.apply(spec.low, spec.high, ty) {
                self.ctx.diagnostics.error(
                    loc,
                    format!(
                        "redefinition of implicit rule for letter '{}'",
                        spec.low.to_ascii_uppercase()
                    ),
                );
            }
        }
    }

    /// Apply IMPLICIT NONE.
    pub fn act_on_implicit_none(&mut self, loc: Span) {
        if !self.implicit.apply_none() {
            self.ctx.diagnostics.error(
                loc,
                "IMPLICIT NONE cannot follow IMPLICIT statements with rules",
            );
        }
    }

    /// EXTERNAL name-list: each name becomes an external function whose
    /// result type is settled by implicit typing (or a later reference).
    pub fn act_on_external_names(&mut self, names: &[(Name, Span)]) {
        for &(name, loc) in names {
            if self.lookup(name).is_some() {
                continue;
            }
            let decl = self.ctx.alloc_decl(Decl::new(
                DeclKind::Function {
                    context: DeclContext::new(),
                    result: QualType::new(Ty::ERROR),
                    args: Vec::new(),
                    body: None,
                    body_expr: None,
                },
                Some(name),
                loc,
            ));
            self.ctx.decl_mut(decl).implicit = true;
            self.ctx.add_to_context(self.cur_context, decl);
            self.record_payload(name, decl);
        }
    }

    /// INTRINSIC name-list.
    pub fn act_on_intrinsic_names(&mut self, names: &[(Name, Span)], builtins: &[Option<crate::keywords::Builtin>]) {
        for (&(name, loc), builtin) in names.iter().zip(builtins) {
            match builtin {
                Some(builtin) => {
                    let decl = self.ctx.alloc_decl(Decl::new(
                        DeclKind::IntrinsicFunction { builtin: *builtin },
                        Some(name),
                        loc,
                    ));
                    self.ctx.add_to_context(self.cur_context, decl);
                    self.record_payload(name, decl);
                }
                None => {
                    let spelling = self.ctx.str(name);
                    self.ctx.diagnostics.error(
                        loc,
                        format!("unknown intrinsic function '{}'", spelling),
                    );
                }
            }
        }
    }

    /// DIMENSION name(dims): applies an array shape to an existing or
    /// implicitly created entity.
    pub fn act_on_dimension(&mut self, name: Name, dims: Vec<DimSpec>, loc: Span) -> Option<DeclId> {
        let decl = match self.lookup(name) {
            Some(decl) => decl,
            None => self.act_on_implicit_entity_decl(name, loc)?,
        };
        let (elem, is_argument) = match &self.ctx.decl(decl).kind {
            DeclKind::Var { ty, var_kind, .. } => (*ty, *var_kind == VarKind::Argument),
            _ => {
                let spelling = self.ctx.str(name);
                self.ctx
                    .diagnostics
                    .error(loc, format!("'{}' cannot have a dimension", spelling));
                return None;
            }
        };
        if self.ctx.types.is_array(elem.ty) {
            let spelling = self.ctx.str(name);
            self.ctx.diagnostics.error(
                loc,
                format!("variable '{}' already has a dimension", spelling),
            );
            return None;
        }
        self.check_array_spec(&dims, is_argument, loc);
        let qt = self.act_on_array_spec(elem, dims);
        if let DeclKind::Var { ty, .. } = &mut self.ctx.decl_mut(decl).kind {
            *ty = qt;
        }
        Some(decl)
    }

    /// ASYNCHRONOUS name-list.
    pub fn act_on_asynchronous_names(&mut self, names: &[(Name, Span)]) {
        for &(name, loc) in names {
            let decl = match self.lookup(name) {
                Some(decl) => Some(decl),
                None => self.act_on_implicit_entity_decl(name, loc),
            };
            if let Some(decl) = decl {
                if let DeclKind::Var { ty, .. } = &mut self.ctx.decl_mut(decl).kind {
                    ty.quals.set_ext_attr(ExtAttr::Asynchronous);
                }
            }
        }
    }

    // ========================================================================
    // Statement functions
    // ========================================================================

    /// Open a statement function definition `name(args) = expr`: creates
    /// the function declaration and enters its context so the formals
    /// are in scope for the body expression.
    pub fn act_on_statement_function_start(&mut self, name: Name, loc: Span) -> DeclId {
        let result = self.implicit_type_for(name, loc);
        let decl = self.ctx.alloc_decl(Decl::new(
            DeclKind::Function {
                context: DeclContext::new(),
                result,
                args: Vec::new(),
                body: None,
                body_expr: None,
            },
            Some(name),
            loc,
        ));
        self.ctx.add_to_context(self.cur_context, decl);
        self.record_payload(name, decl);
        self.push_decl_context(decl);
        decl
    }

    /// Close a statement function definition, converting the body to the
    /// result type the way assignment would.
    pub fn act_on_statement_function_body(&mut self, decl: DeclId, body: Option<ExprId>) {
        self.pop_decl_context();
        let Some(body) = body else {
            self.ctx.decl_mut(decl).invalid = true;
            return;
        };
        let result = match &self.ctx.decl(decl).kind {
            DeclKind::Function { result, .. } => *result,
            _ => return,
        };
        if self.ctx.types.is_error(result.ty) {
            // The result type error was already diagnosed.
            self.ctx.decl_mut(decl).invalid = true;
            return;
        }
        let loc = self.ctx.expr_span(body);
        let body_ty = self.ctx.expr_ty(body);
        match self.convert_for_assignment(result, body) {
            Some(converted) => {
                if let DeclKind::Function { body_expr, .. } = &mut self.ctx.decl_mut(decl).kind {
                    *body_expr = Some(converted);
                }
            }
            None => {
                self.report_incompatible_assignment(loc, result, body_ty);
                self.ctx.decl_mut(decl).invalid = true;
            }
        }
    }

    // ========================================================================
    // Statement labels
    // ========================================================================

    /// Build the label expression for a statement label token.
    pub fn act_on_statement_label(&mut self, value: i64, span: Span) -> ExprId {
        self.ctx.alloc_expr(
            ExprKind::IntegerConstant(value),
            QualType::new(Ty::INTEGER),
            span,
        )
    }

    /// Attach a statement label to a statement, rejecting duplicates.
    pub fn declare_statement_label(&mut self, label: ExprId, stmt: StmtId) {
        let value = self.ctx.label_value(label);
        if self.stmt_labels.resolve(value).is_some() {
            let span = self.ctx.expr_span(label);
            self.ctx.diagnostics.error(
                span,
                format!("redefinition of statement label '{}'", value),
            );
        } else {
            self.stmt_labels.declare(value, stmt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AstContext;

    #[test]
    fn test_context_push_pop() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        let tu = sema.ctx.translation_unit();
        assert_eq!(sema.current_context(), tu);

        let prog = sema.act_on_main_program(None, Span::default());
        assert_eq!(sema.current_context(), prog);

        sema.pop_decl_context();
        assert_eq!(sema.current_context(), tu);
    }

    #[test]
    fn test_entity_redeclaration_diagnosed() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        sema.act_on_main_program(None, Span::default());

        let name = sema.ctx.intern_ident("X");
        let ds = DeclSpec {
            type_spec: Some(TypeSpec::Real),
            ..DeclSpec::default()
        };
        assert!(sema
            .act_on_entity_decl(&ds, Vec::new(), None, name, Span::default(), None)
            .is_some());
        assert!(sema
            .act_on_entity_decl(&ds, Vec::new(), None, name, Span::default(), None)
            .is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_implicit_default_rule() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        sema.act_on_main_program(None, Span::default());

        for (spelling, expected) in [("I", Ty::INTEGER), ("N", Ty::INTEGER), ("H", Ty::REAL), ("O", Ty::REAL)] {
            let name = sema.ctx.intern_ident(spelling);
            let decl = sema
                .act_on_implicit_entity_decl(name, Span::default())
                .unwrap();
            assert_eq!(sema.ctx.decl(decl).ty().unwrap().ty, expected, "{}", spelling);
            assert!(sema.ctx.decl(decl).implicit);
        }
    }

    #[test]
    fn test_implicit_none_rejects_reference() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        sema.act_on_main_program(None, Span::default());
        sema.act_on_implicit_none(Span::default());

        let name = sema.ctx.intern_ident("X");
        assert!(sema
            .act_on_implicit_entity_decl(name, Span::default())
            .is_none());
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_assumed_size_must_be_last() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        sema.act_on_main_program(None, Span::default());

        let upper = sema.ctx.alloc_expr(
            ExprKind::IntegerConstant(4),
            QualType::new(Ty::INTEGER),
            Span::default(),
        );
        let dims = vec![
            DimSpec::AssumedSize,
            DimSpec::Explicit { lower: None, upper },
        ];
        assert!(!sema.check_array_spec(&dims, true, Span::default()));
        assert!(sema.ctx.diagnostics.has_errors());
    }

    #[test]
    fn test_label_redefinition() {
        let mut ctx = AstContext::new();
        let mut sema = Sema::new(&mut ctx);
        sema.act_on_main_program(None, Span::default());

        let label_a = sema.act_on_statement_label(100, Span::default());
        let label_b = sema.act_on_statement_label(100, Span::default());
        let stmt = sema.act_on_block(Vec::new(), Span::default());

        sema.declare_statement_label(label_a, stmt);
        assert!(!sema.ctx.diagnostics.has_errors());
        sema.declare_statement_label(label_b, stmt);
        assert!(sema.ctx.diagnostics.has_errors());
        // The original mapping is untouched.
        assert_eq!(sema.stmt_labels.resolve(100), Some(stmt));
    }
}
