//! AST printing.
//!
//! Renders an analyzed translation unit back to free-form source. The
//! output re-parses to an equivalent AST: synthesized nodes (implicit
//! casts, conversions, implicitly declared variables) are omitted so
//! re-analysis recreates them, and every binary expression is
//! parenthesized so precedence survives verbatim.

use crate::ast::{ConstructPart, DeclKind, ExprKind, StmtKind, UnaryOp};
use crate::context::AstContext;
use crate::ids::{DeclId, ExprId, StmtId};
use crate::types::{DimSpec, ExtAttr, Intent, QualType, TypeKind, TypeSpec};

/// Print every program unit of the translation unit.
pub fn print_translation_unit(ctx: &AstContext) -> String {
    let mut out = String::new();
    let tu = ctx.translation_unit();
    let children: Vec<DeclId> = ctx
        .decl(tu)
        .context()
        .map(|c| c.children().to_vec())
        .unwrap_or_default();
    for unit in children {
        match &ctx.decl(unit).kind {
            DeclKind::MainProgram { .. }
            | DeclKind::Function { body: Some(_), .. }
            | DeclKind::Subroutine { body: Some(_), .. } => {
                out.push_str(&print_unit(ctx, unit));
            }
            _ => {}
        }
    }
    out
}

/// Print one program unit.
pub fn print_unit(ctx: &AstContext, unit: DeclId) -> String {
    let mut printer = Printer { ctx, out: String::new() };
    printer.unit(unit);
    printer.out
}

struct Printer<'a> {
    ctx: &'a AstContext,
    out: String,
}

impl<'a> Printer<'a> {
    fn unit(&mut self, unit: DeclId) {
        let decl = self.ctx.decl(unit);
        let name = decl.name.map(|n| self.ctx.str(n));
        let (header, body, end_keyword) = match &decl.kind {
            DeclKind::MainProgram { body, .. } => {
                let header = match &name {
                    Some(name) => format!("PROGRAM {}", name),
                    None => String::new(),
                };
                (header, *body, "END PROGRAM")
            }
            DeclKind::Function {
                result,
                args,
                body,
                ..
            } => {
                let args = self.arg_list(args);
                let header = format!(
                    "{} FUNCTION {}({})",
                    self.type_prefix(*result),
                    name.clone().unwrap_or_default(),
                    args
                );
                (header, *body, "END FUNCTION")
            }
            DeclKind::Subroutine { args, body, .. } => {
                let args = self.arg_list(args);
                let header = format!(
                    "SUBROUTINE {}({})",
                    name.clone().unwrap_or_default(),
                    args
                );
                (header, *body, "END SUBROUTINE")
            }
            _ => return,
        };

        if !header.is_empty() {
            self.out.push_str(&header);
            self.out.push('\n');
        }

        let body_stmts = body.map(|b| self.ctx.block_body(b)).unwrap_or_default();

        // Specification region: IMPLICIT and USE/IMPORT statements in
        // source order, then the declarations, then statement functions.
        for &stmt in &body_stmts {
            if matches!(
                self.ctx.stmt(stmt).kind,
                StmtKind::Use { .. } | StmtKind::Import { .. } | StmtKind::Implicit { .. }
            ) {
                self.stmt(stmt);
            }
        }
        self.declarations(unit);

        for &stmt in &body_stmts {
            if matches!(
                self.ctx.stmt(stmt).kind,
                StmtKind::External { .. } | StmtKind::Intrinsic { .. }
            ) {
                self.stmt(stmt);
            }
        }

        // Executable region.
        let mut end_name: Option<String> = None;
        for &stmt in &body_stmts {
            match &self.ctx.stmt(stmt).kind {
                StmtKind::Use { .. }
                | StmtKind::Import { .. }
                | StmtKind::Implicit { .. }
                | StmtKind::External { .. }
                | StmtKind::Intrinsic { .. }
                | StmtKind::Parameter { .. }
                | StmtKind::Dimension { .. }
                | StmtKind::Asynchronous { .. }
                | StmtKind::Program { .. } => {}
                StmtKind::EndProgram { name } => {
                    end_name = name.map(|n| self.ctx.str(n));
                }
                StmtKind::Block { body } if body.is_empty() => {}
                _ => self.stmt(stmt),
            }
        }

        match (&end_name, &name) {
            (Some(end), _) => {
                self.out.push_str(&format!("{} {}\n", end_keyword, end));
            }
            (None, Some(name)) => {
                self.out.push_str(&format!("{} {}\n", end_keyword, name));
            }
            _ => self.out.push_str("END\n"),
        }
    }

    fn arg_list(&self, args: &[DeclId]) -> String {
        args.iter()
            .filter_map(|&arg| self.ctx.decl_name(arg))
            .map(|n| self.ctx.str(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn declarations(&mut self, unit: DeclId) {
        let children: Vec<DeclId> = self
            .ctx
            .decl(unit)
            .context()
            .map(|c| c.children().to_vec())
            .unwrap_or_default();
        for child in children {
            let decl = self.ctx.decl(child);
            if decl.invalid || decl.implicit {
                continue;
            }
            match &decl.kind {
                DeclKind::Var { ty, init, .. } => {
                    let name = decl.name.map(|n| self.ctx.str(n)).unwrap_or_default();
                    let mut line = self.type_decl_prefix(*ty);
                    line.push_str(" :: ");
                    line.push_str(&name);
                    if let Some(dims) = self.ctx.types.array_dims(ty.ty) {
                        line.push_str(&self.dims(dims));
                    }
                    if let Some(init) = init {
                        line.push_str(" = ");
                        line.push_str(&self.expr(*init));
                    }
                    self.out.push_str("  ");
                    self.out.push_str(&line);
                    self.out.push('\n');
                }
                DeclKind::Function {
                    body_expr: Some(body),
                    args,
                    ..
                } => {
                    let name = decl.name.map(|n| self.ctx.str(n)).unwrap_or_default();
                    let args = self.arg_list(args);
                    let body = self.expr_unwrapped(*body);
                    self.out
                        .push_str(&format!("  {}({}) = {}\n", name, args, body));
                }
                _ => {}
            }
        }
    }

    fn type_prefix(&self, ty: QualType) -> String {
        match self.ctx.types.kind(self.ctx.types.self_or_element(ty.ty)) {
            TypeKind::Builtin { spec, .. } => spec.as_str().to_string(),
            _ => "REAL".to_string(),
        }
    }

    fn type_decl_prefix(&self, ty: QualType) -> String {
        let elem = self.ctx.types.self_or_element(ty.ty);
        let mut line = match self.ctx.types.kind(elem) {
            TypeKind::Builtin { spec, len, kind } => {
                let mut s = spec.as_str().to_string();
                if *spec == TypeSpec::Character {
                    if let Some(len) = len {
                        s.push_str(&format!("(LEN={})", self.expr(*len)));
                    }
                } else if let Some(kind) = kind {
                    s.push_str(&format!("(KIND={})", self.expr(*kind)));
                }
                s
            }
            _ => "REAL".to_string(),
        };
        if ty.quals.has_parameter() {
            line.push_str(", PARAMETER");
        }
        if ty.quals.has_allocatable() {
            line.push_str(", ALLOCATABLE");
        }
        if ty.quals.has_volatile() {
            line.push_str(", VOLATILE");
        }
        match ty.quals.ext_attr() {
            ExtAttr::None => {}
            ExtAttr::Asynchronous => line.push_str(", ASYNCHRONOUS"),
            ExtAttr::Contiguous => line.push_str(", CONTIGUOUS"),
            ExtAttr::Optional => line.push_str(", OPTIONAL"),
            ExtAttr::Pointer => line.push_str(", POINTER"),
            ExtAttr::Save => line.push_str(", SAVE"),
            ExtAttr::Target => line.push_str(", TARGET"),
            ExtAttr::Value => line.push_str(", VALUE"),
        }
        match ty.quals.intent() {
            Intent::None => {}
            Intent::In => line.push_str(", INTENT(IN)"),
            Intent::Out => line.push_str(", INTENT(OUT)"),
            Intent::InOut => line.push_str(", INTENT(INOUT)"),
        }
        line
    }

    fn dims(&self, dims: &[DimSpec]) -> String {
        let rendered: Vec<String> = dims
            .iter()
            .map(|dim| match dim {
                DimSpec::AssumedSize => "*".to_string(),
                DimSpec::Explicit { lower: None, upper } => self.expr(*upper),
                DimSpec::Explicit {
                    lower: Some(lower),
                    upper,
                } => format!("{}:{}", self.expr(*lower), self.expr(*upper)),
            })
            .collect();
        format!("({})", rendered.join(", "))
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn label_prefix(&self, stmt: StmtId) -> String {
        match self.ctx.stmt(stmt).label {
            Some(label) => format!("{} ", self.ctx.label_value(label)),
            None => String::new(),
        }
    }

    fn stmt(&mut self, stmt: StmtId) {
        let rendered = self.stmt_string(stmt);
        if rendered.is_empty() {
            return;
        }
        self.out.push_str("  ");
        self.out.push_str(&self.label_prefix(stmt));
        self.out.push_str(&rendered);
        self.out.push('\n');
    }

    fn stmt_string(&self, stmt: StmtId) -> String {
        match &self.ctx.stmt(stmt).kind {
            StmtKind::Program { .. } | StmtKind::EndProgram { .. } => String::new(),
            StmtKind::Use { module } => format!("USE {}", self.ctx.str(*module)),
            StmtKind::Import { names } => {
                format!("IMPORT :: {}", self.name_list(names))
            }
            StmtKind::Implicit { rules: None } => "IMPLICIT NONE".to_string(),
            StmtKind::Implicit { rules: Some(rules) } => {
                let rendered: Vec<String> = rules
                    .iter()
                    .map(|(ty, letters)| {
                        let letters: Vec<String> = letters
                            .iter()
                            .map(|spec| match spec.high {
                                Some(high) => format!("{}-{}", spec.low, high),
                                None => spec.low.to_string(),
                            })
                            .collect();
                        format!("{} ({})", self.type_prefix(*ty), letters.join(", "))
                    })
                    .collect();
                format!("IMPLICIT {}", rendered.join(", "))
            }
            StmtKind::Parameter { .. }
            | StmtKind::Dimension { .. }
            | StmtKind::Asynchronous { .. } => String::new(),
            StmtKind::External { names } => {
                format!("EXTERNAL {}", self.name_list(names))
            }
            StmtKind::Intrinsic { names } => {
                format!("INTRINSIC {}", self.name_list(names))
            }
            StmtKind::Assignment { lhs, rhs } => {
                format!("{} = {}", self.expr(*lhs), self.expr_unwrapped(*rhs))
            }
            StmtKind::Assign { address, var } => format!(
                "ASSIGN {} TO {}",
                self.ctx.label_value(address.label),
                self.expr(*var)
            ),
            StmtKind::Goto { destination } => {
                format!("GO TO {}", self.ctx.label_value(destination.label))
            }
            StmtKind::AssignedGoto { var, allowed } => {
                let labels: Vec<String> = allowed
                    .iter()
                    .map(|r| self.ctx.label_value(r.label).to_string())
                    .collect();
                format!("GO TO {} ({})", self.expr(*var), labels.join(", "))
            }
            StmtKind::If {
                condition,
                then_stmt: Some(body),
                ..
            } => format!(
                "IF ({}) {}",
                self.expr_unwrapped(*condition),
                self.stmt_string(*body)
            ),
            StmtKind::If {
                condition,
                then_stmt: None,
                else_if,
                ..
            } => {
                let keyword = if *else_if { "ELSE IF" } else { "IF" };
                format!("{} ({}) THEN", keyword, self.expr_unwrapped(*condition))
            }
            StmtKind::Else => "ELSE".to_string(),
            StmtKind::EndIf => "END IF".to_string(),
            StmtKind::Do {
                var,
                init,
                last,
                step,
                terminator,
            } => {
                let mut line = "DO ".to_string();
                if let Some(reference) = terminator {
                    line.push_str(&format!("{} ", self.ctx.label_value(reference.label)));
                }
                line.push_str(&format!(
                    "{} = {}, {}",
                    self.expr(*var),
                    self.expr_unwrapped(*init),
                    self.expr_unwrapped(*last)
                ));
                if let Some(step) = step {
                    line.push_str(&format!(", {}", self.expr_unwrapped(*step)));
                }
                line
            }
            StmtKind::ConstructPart(ConstructPart::EndDo) => "END DO".to_string(),
            StmtKind::ConstructPart(ConstructPart::ElseWhere) => "ELSE WHERE".to_string(),
            StmtKind::ConstructPart(ConstructPart::EndWhere) => "END WHERE".to_string(),
            StmtKind::Continue => "CONTINUE".to_string(),
            StmtKind::Stop { code: None } => "STOP".to_string(),
            StmtKind::Stop { code: Some(code) } => format!("STOP {}", self.expr(*code)),
            StmtKind::Return => "RETURN".to_string(),
            StmtKind::Call { subroutine, args } => {
                let name = self
                    .ctx
                    .decl_name(*subroutine)
                    .map(|n| self.ctx.str(n))
                    .unwrap_or_default();
                if args.is_empty() {
                    format!("CALL {}", name)
                } else {
                    format!("CALL {}({})", name, self.expr_list(args))
                }
            }
            StmtKind::Print { items } => {
                if items.is_empty() {
                    "PRINT *".to_string()
                } else {
                    format!("PRINT *, {}", self.expr_list(items))
                }
            }
            StmtKind::Where {
                mask,
                then_block,
                else_block,
            } => {
                let then_stmts = self.ctx.block_body(*then_block);
                if else_block.is_none() && then_stmts.len() == 1 {
                    return format!(
                        "WHERE ({}) {}",
                        self.expr_unwrapped(*mask),
                        self.stmt_string(then_stmts[0])
                    );
                }
                let mut line = format!("WHERE ({})", self.expr_unwrapped(*mask));
                for stmt in &then_stmts {
                    line.push_str(&format!("\n  {}", self.stmt_string(*stmt)));
                }
                if let Some(else_block) = else_block {
                    line.push_str("\n  ELSE WHERE");
                    for stmt in self.ctx.block_body(*else_block) {
                        line.push_str(&format!("\n  {}", self.stmt_string(stmt)));
                    }
                }
                line.push_str("\n  END WHERE");
                line
            }
            StmtKind::Block { body } => {
                let mut rendered = Vec::new();
                for &stmt in body {
                    let s = self.stmt_string(stmt);
                    if !s.is_empty() {
                        rendered.push(s);
                    }
                }
                rendered.join("\n  ")
            }
        }
    }

    fn name_list(&self, names: &[crate::interner::Name]) -> String {
        names
            .iter()
            .map(|&n| self.ctx.str(n))
            .collect::<Vec<_>>()
            .join(", ")
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr_list(&self, exprs: &[ExprId]) -> String {
        exprs
            .iter()
            .map(|&e| self.expr_unwrapped(e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Print with synthesized wrapper nodes stripped.
    fn expr_unwrapped(&self, expr: ExprId) -> String {
        match &self.ctx.expr(expr).kind {
            ExprKind::ImplicitCast { expr } | ExprKind::Conversion { expr, .. } => {
                self.expr_unwrapped(*expr)
            }
            _ => self.expr(expr),
        }
    }

    fn expr(&self, expr: ExprId) -> String {
        let node = self.ctx.expr(expr);
        match &node.kind {
            ExprKind::IntegerConstant(value) => value.to_string(),
            ExprKind::RealConstant(value) => {
                let double = self.ctx.types.is_double_precision(node.ty.ty);
                format_real(*value, double)
            }
            ExprKind::CharacterConstant(value) => {
                format!("'{}'", value.replace('\'', "''"))
            }
            ExprKind::LogicalConstant(true) => ".TRUE.".to_string(),
            ExprKind::LogicalConstant(false) => ".FALSE.".to_string(),
            ExprKind::Var(decl) => self
                .ctx
                .decl_name(*decl)
                .map(|n| self.ctx.str(n))
                .unwrap_or_default(),
            ExprKind::Unary { op, expr } => {
                let operand = self.expr_unwrapped(*expr);
                match op {
                    UnaryOp::Not => format!("(.NOT. {})", operand),
                    _ => format!("({}{})", op.as_str(), operand),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => format!(
                "({} {} {})",
                self.expr_unwrapped(*lhs),
                op.as_str(),
                self.expr_unwrapped(*rhs)
            ),
            ExprKind::ImplicitCast { expr } | ExprKind::Conversion { expr, .. } => {
                self.expr_unwrapped(*expr)
            }
            ExprKind::ArrayElement { target, subscripts } => {
                format!("{}({})", self.expr(*target), self.expr_list(subscripts))
            }
            ExprKind::ArrayConstructor { items } => {
                format!("(/{}/)", self.expr_list(items))
            }
            ExprKind::Substring { base, lower, upper } => {
                let lower = lower.map(|e| self.expr_unwrapped(e)).unwrap_or_default();
                let upper = upper.map(|e| self.expr_unwrapped(e)).unwrap_or_default();
                format!("{}({}:{})", self.expr(*base), lower, upper)
            }
            ExprKind::IntrinsicCall { builtin, args } => {
                format!("{}({})", builtin.name(), self.expr_list(args))
            }
            ExprKind::Call { function, args } => {
                let name = self
                    .ctx
                    .decl_name(*function)
                    .map(|n| self.ctx.str(n))
                    .unwrap_or_default();
                format!("{}({})", name, self.expr_list(args))
            }
        }
    }
}

/// Format a real constant so it re-parses with the same value and type:
/// always with a decimal point, with a `D` exponent for DOUBLE
/// PRECISION.
fn format_real(value: f64, double: bool) -> String {
    let mut body = format!("{:?}", value);
    let exponent = if let Some(pos) = body.find(['e', 'E']) {
        let exp = body.split_off(pos)[1..].to_string();
        Some(exp)
    } else {
        None
    };
    if !body.contains('.') {
        body.push_str(".0");
    }
    match (double, exponent) {
        (true, Some(exp)) => format!("{}D{}", body, exp),
        (true, None) => format!("{}D0", body),
        (false, Some(exp)) => format!("{}E{}", body, exp),
        (false, None) => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Parser;
    use crate::source::SourceForm;

    fn analyzed(text: &str) -> AstContext {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Free);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
        ctx
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(1.5, false), "1.5");
        assert_eq!(format_real(1.5, true), "1.5D0");
        assert_eq!(format_real(1e20, false), "1.0E20");
    }

    #[test]
    fn test_print_simple_program() {
        let ctx = analyzed("PROGRAM P\nREAL X\nX = 1.5\nEND\n");
        let printed = print_translation_unit(&ctx);
        assert!(printed.contains("PROGRAM P"));
        assert!(printed.contains("REAL :: X"));
        assert!(printed.contains("X = 1.5"));
        assert!(printed.contains("END PROGRAM P"));
    }

    #[test]
    fn test_round_trip_is_stable() {
        // parse -> print -> parse -> print must reach a fixed point.
        let source = "PROGRAM P\nINTEGER K\nREAL A(10)\nK = 3\nA(K) = 1.5 + 2.0 * 3.0\n\
                      DO 10 I = 1, 5\nA(I) = A(I) + 1.0\n10 CONTINUE\nEND\n";
        let first = print_translation_unit(&analyzed(source));
        let second = print_translation_unit(&analyzed(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_control_flow() {
        let source = "PROGRAM P\nIF (X .GT. 0.0) THEN\nY = 1.0\nELSE IF (X .LT. 0.0) THEN\n\
                      Y = 2.0\nELSE\nY = 3.0\nEND IF\nGOTO 20\n20 CONTINUE\nEND\n";
        let first = print_translation_unit(&analyzed(source));
        let second = print_translation_unit(&analyzed(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_implicit_and_parameters() {
        let source = "PROGRAM P\nIMPLICIT LOGICAL (Q)\nPARAMETER (N = 4)\nINTEGER A(N)\n\
                      Q = .TRUE.\nA(1) = N\nEND\n";
        let first = print_translation_unit(&analyzed(source));
        let second = print_translation_unit(&analyzed(&first));
        assert_eq!(first, second);
    }
}
