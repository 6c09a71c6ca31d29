//! Lowering from the analyzed AST to the three-address IR.
//!
//! Lowering runs only when semantic analysis emitted no errors, so the
//! AST is fully typed here; an inconsistency is an internal invariant
//! violation and panics rather than producing a diagnostic.

use std::collections::HashMap;

use super::{ir_type, BinOp, Block, Function, Instr, IrType, Module, Terminator, UnOp};
use crate::ast::{BinaryOp, ConstructPart, ConversionKind, DeclKind, ExprKind, StmtKind, UnaryOp};
use crate::context::AstContext;
use crate::ids::{BlockId, DeclId, ExprId, StmtId, ValueId};
use crate::keywords::Builtin;
use crate::types::{Ty, TypeSpec};

/// A lowered expression value: scalars are single IR values, complex
/// values are (re, im) pairs and character values are (pointer, length)
/// pairs.
#[derive(Debug, Clone, Copy)]
pub(super) enum RValue {
    Scalar(ValueId),
    Complex { re: ValueId, im: ValueId },
    Char { ptr: ValueId, len: ValueId },
}

impl RValue {
    pub fn scalar(self) -> ValueId {
        match self {
            RValue::Scalar(value) => value,
            _ => panic!("expected a scalar value"),
        }
    }

    pub fn char_pair(self) -> (ValueId, ValueId) {
        match self {
            RValue::Char { ptr, len } => (ptr, len),
            _ => panic!("expected a character value"),
        }
    }
}

/// A storable location.
#[derive(Debug, Clone, Copy)]
pub(super) struct LValue {
    pub ptr: ValueId,
    /// Character length of the location, when it holds CHARACTER data.
    pub char_len: Option<ValueId>,
}

/// Structured-statement state while walking a flat statement list.
enum Frame {
    If {
        else_block: Option<BlockId>,
        end_block: BlockId,
    },
    Do {
        terminator: Option<StmtId>,
        header: BlockId,
        exit: BlockId,
        var_ptr: ValueId,
        var_ty: IrType,
        step: ValueId,
    },
}

/// Lower every program unit with a body.
pub fn lower_translation_unit(ctx: &AstContext) -> Module {
    let mut module = Module::default();
    let tu = ctx.translation_unit();
    let children: Vec<DeclId> = ctx
        .decl(tu)
        .context()
        .map(|c| c.children().to_vec())
        .unwrap_or_default();

    for decl_id in children {
        let decl = ctx.decl(decl_id);
        if decl.invalid {
            continue;
        }
        let (name, body) = match &decl.kind {
            DeclKind::MainProgram { body: Some(body), .. } => {
                let name = decl
                    .name
                    .map(|n| ctx.str(n))
                    .unwrap_or_else(|| "MAIN".to_string());
                (name, *body)
            }
            DeclKind::Function {
                body: Some(body),
                body_expr: None,
                ..
            }
            | DeclKind::Subroutine {
                body: Some(body), ..
            } => {
                let name = decl.name.map(|n| ctx.str(n)).unwrap_or_default();
                (name, *body)
            }
            _ => continue,
        };
        let func = FunctionLowering::new(ctx, &mut module, decl_id, name).lower(body);
        module.functions.alloc(func);
    }
    module
}

pub(super) struct FunctionLowering<'a> {
    pub ctx: &'a AstContext,
    pub module: &'a mut Module,
    pub func: Function,
    pub cur: BlockId,
    unit: DeclId,
    var_ptrs: HashMap<DeclId, ValueId>,
    char_lens: HashMap<DeclId, ValueId>,
    label_blocks: HashMap<StmtId, BlockId>,
    /// Statement-function inlining scopes, innermost last. Each maps a
    /// formal to the actual argument expression at the call site.
    pub(super) inline_frames: Vec<HashMap<DeclId, ExprId>>,
    result_slot: Option<ValueId>,
}

impl<'a> FunctionLowering<'a> {
    fn new(ctx: &'a AstContext, module: &'a mut Module, unit: DeclId, name: String) -> Self {
        let is_function = matches!(ctx.decl(unit).kind, DeclKind::Function { .. });
        let args: Vec<DeclId> = match &ctx.decl(unit).kind {
            DeclKind::Function { args, .. } | DeclKind::Subroutine { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        let result_ty = match &ctx.decl(unit).kind {
            DeclKind::Function { result, .. } => Some(*result),
            _ => None,
        };

        // Incoming parameters: one pointer per dummy argument, plus a
        // 32-bit length appended for each CHARACTER dummy, plus the
        // caller-provided buffer for a character-valued function.
        let mut params = Vec::new();
        let mut char_args = Vec::new();
        for &arg in &args {
            let arg_name = ctx
                .decl(arg)
                .name
                .map(|n| ctx.str(n))
                .unwrap_or_default();
            params.push((arg_name, IrType::Ptr));
            let arg_ty = ctx.decl(arg).ty().map(|t| t.ty).unwrap_or(Ty::ERROR);
            if ctx.types.is_character(ctx.types.self_or_element(arg_ty)) {
                char_args.push(arg);
            }
        }

        let char_result = result_ty
            .map(|t| ctx.types.is_character(t.ty))
            .unwrap_or(false);
        if char_result {
            params.push(("result".to_string(), IrType::Ptr));
            params.push(("result_len".to_string(), IrType::I32));
        }
        for &arg in &char_args {
            let arg_name = ctx
                .decl(arg)
                .name
                .map(|n| ctx.str(n))
                .unwrap_or_default();
            params.push((format!("{}_len", arg_name), IrType::I32));
        }

        let ret = match result_ty {
            Some(result) if !char_result => ir_type(&ctx.types, result.ty),
            _ => IrType::Void,
        };

        let func = Function::new(name, params, ret);
        let entry = func.entry;
        let mut lowering = Self {
            ctx,
            module,
            func,
            cur: entry,
            unit,
            var_ptrs: HashMap::new(),
            char_lens: HashMap::new(),
            label_blocks: HashMap::new(),
            inline_frames: Vec::new(),
            result_slot: None,
        };

        // Bind parameter values.
        for (index, &arg) in args.iter().enumerate() {
            let value = lowering.emit(Instr::Param { index });
            lowering.var_ptrs.insert(arg, value);
        }
        let mut extra = args.len();
        if char_result {
            let ptr = lowering.emit(Instr::Param { index: extra });
            let len = lowering.emit(Instr::Param { index: extra + 1 });
            lowering.result_slot = Some(ptr);
            lowering.char_lens.insert(unit, len);
            extra += 2;
        }
        for &arg in &char_args {
            let len = lowering.emit(Instr::Param { index: extra });
            lowering.char_lens.insert(arg, len);
            extra += 1;
        }

        if is_function && !char_result {
            let name = lowering.func.name.clone();
            let ty = lowering.func.ret;
            let slot = lowering.emit(Instr::Alloca { name, ty });
            lowering.result_slot = Some(slot);
        }

        lowering
    }

    fn lower(mut self, body: StmtId) -> Function {
        let stmts = self.ctx.block_body(body);
        self.predeclare_labels(&stmts);
        let mut frames = Vec::new();
        for &stmt in &stmts {
            if let Some(&block) = self.label_blocks.get(&stmt) {
                self.branch_to(block);
            }
            self.lower_stmt(stmt, &mut frames);
            self.close_terminated_dos(stmt, &mut frames);
        }
        self.emit_return();
        self.func
    }

    fn predeclare_labels(&mut self, stmts: &[StmtId]) {
        for &stmt in stmts {
            if self.ctx.stmt(stmt).label.is_some() {
                let block = self.new_block();
                self.label_blocks.insert(stmt, block);
            }
        }
    }

    // ========================================================================
    // Block plumbing
    // ========================================================================

    pub(super) fn emit(&mut self, instr: Instr) -> ValueId {
        let value = self.func.values.alloc(instr);
        self.func.blocks[self.cur].instrs.push(value);
        value
    }

    /// Allocas (and their size operands) land in the entry block so
    /// loops do not grow the stack.
    fn emit_in_entry(&mut self, instr: Instr) -> ValueId {
        let value = self.func.values.alloc(instr);
        let entry = self.func.entry;
        self.func.blocks[entry].instrs.push(value);
        value
    }

    pub(super) fn new_block(&mut self) -> BlockId {
        self.func.blocks.alloc(Block::default())
    }

    pub(super) fn set_term(&mut self, term: Terminator) {
        let block = &mut self.func.blocks[self.cur];
        if block.term.is_none() {
            block.term = Some(term);
        }
    }

    pub(super) fn start_block(&mut self, block: BlockId) {
        self.cur = block;
    }

    pub(super) fn branch_to(&mut self, block: BlockId) {
        self.set_term(Terminator::Br(block));
        self.start_block(block);
    }

    pub(super) fn const_int(&mut self, value: i64) -> ValueId {
        self.emit(Instr::ConstInt(value))
    }

    fn emit_return(&mut self) {
        let term = match self.result_slot {
            Some(slot) if self.func.ret != IrType::Void => {
                let ty = self.func.ret;
                let value = self.emit(Instr::Load { ptr: slot, ty });
                Terminator::Ret(Some(value))
            }
            _ => Terminator::Ret(None),
        };
        self.set_term(term);
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// The storage pointer for a declaration, allocating on first use.
    pub(super) fn var_ptr(&mut self, decl: DeclId) -> ValueId {
        if let Some(&ptr) = self.var_ptrs.get(&decl) {
            return ptr;
        }
        // A reference to the function's own name is its result slot.
        if decl == self.unit {
            if let Some(slot) = self.result_slot {
                return slot;
            }
        }

        let ty = self
            .ctx
            .decl(decl)
            .ty()
            .map(|t| t.ty)
            .unwrap_or(Ty::ERROR);
        let name = self
            .ctx
            .decl(decl)
            .name
            .map(|n| self.ctx.str(n))
            .unwrap_or_default();

        let ptr = if let Some(dims) = self.ctx.types.array_dims(ty).map(|d| d.to_vec()) {
            let count = self.const_array_size(&dims);
            let elem = ir_type(&self.ctx.types, ty);
            let count_value = self.emit_in_entry(Instr::ConstInt(count));
            self.emit_in_entry(Instr::AllocaArray {
                elem,
                count: count_value,
            })
        } else if self.ctx.types.is_character(ty) {
            // Character lengths may be computed expressions, so the
            // storage stays in the current block.
            let len = self.char_len_of_decl(decl);
            self.emit(Instr::AllocaArray {
                elem: IrType::I8,
                count: len,
            })
        } else {
            let ty = ir_type(&self.ctx.types, ty);
            self.emit_in_entry(Instr::Alloca { name, ty })
        };
        self.var_ptrs.insert(decl, ptr);
        ptr
    }

    fn const_array_size(&self, dims: &[crate::types::DimSpec]) -> i64 {
        let mut total = 1i64;
        for dim in dims {
            match dim {
                crate::types::DimSpec::Explicit { lower, upper } => {
                    let (lb, ub) = crate::eval::eval_bounds(self.ctx, *lower, *upper)
                        .unwrap_or((1, 1));
                    total = total.saturating_mul((ub - lb + 1).max(0));
                }
                crate::types::DimSpec::AssumedSize => {}
            }
        }
        total
    }

    /// The character length of a declared entity.
    pub(super) fn char_len_of_decl(&mut self, decl: DeclId) -> ValueId {
        if let Some(&len) = self.char_lens.get(&decl) {
            return len;
        }
        let ty = self
            .ctx
            .decl(decl)
            .ty()
            .map(|t| t.ty)
            .unwrap_or(Ty::CHARACTER);
        let len = self.char_len_of_type(ty);
        self.char_lens.insert(decl, len);
        len
    }

    /// The LEN of a character type: the LEN selector if present (folded
    /// when constant), 1 otherwise.
    pub(super) fn char_len_of_type(&mut self, ty: Ty) -> ValueId {
        let elem = self.ctx.types.self_or_element(ty);
        let len_expr = match self.ctx.types.kind(elem) {
            crate::types::TypeKind::Builtin { len, .. } => *len,
            _ => None,
        };
        match len_expr {
            Some(expr) => match crate::eval::eval_int(self.ctx, expr) {
                Some(value) => self.const_int(value),
                None => self.emit_expr(expr).scalar(),
            },
            None => self.const_int(1),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn lower_stmt(&mut self, id: StmtId, frames: &mut Vec<Frame>) {
        let kind = self.ctx.stmt(id).kind.clone();
        match kind {
            StmtKind::Program { .. }
            | StmtKind::EndProgram { .. }
            | StmtKind::Use { .. }
            | StmtKind::Import { .. }
            | StmtKind::Implicit { .. }
            | StmtKind::Parameter { .. }
            | StmtKind::Asynchronous { .. }
            | StmtKind::Dimension { .. }
            | StmtKind::External { .. }
            | StmtKind::Intrinsic { .. }
            | StmtKind::Continue
            | StmtKind::ConstructPart(ConstructPart::ElseWhere)
            | StmtKind::ConstructPart(ConstructPart::EndWhere) => {}

            StmtKind::Block { body } => {
                for stmt in body {
                    self.lower_stmt(stmt, frames);
                }
            }

            StmtKind::Assignment { lhs, rhs } => self.lower_assignment(lhs, rhs),

            StmtKind::Goto { destination } => {
                if let Some(target) = destination.target {
                    let block = self.label_blocks[&target];
                    self.set_term(Terminator::Br(block));
                    let next = self.new_block();
                    self.start_block(next);
                }
            }

            StmtKind::Assign { address, var } => {
                let value = self.ctx.label_value(address.label);
                let value = self.const_int(value);
                let ptr = self.lvalue(var).ptr;
                self.emit(Instr::Store { ptr, value });
            }

            StmtKind::AssignedGoto { var, allowed } => {
                let value = self.emit_expr(var).scalar();
                for reference in &allowed {
                    let Some(target) = reference.target else { continue };
                    let label = self.ctx.label_value(reference.label);
                    let label = self.const_int(label);
                    let cond = self.emit(Instr::Binary {
                        op: BinOp::Eq,
                        ty: IrType::I32,
                        lhs: value,
                        rhs: label,
                    });
                    let next = self.new_block();
                    self.set_term(Terminator::CondBr {
                        cond,
                        then_block: self.label_blocks[&target],
                        else_block: next,
                    });
                    self.start_block(next);
                }
            }

            StmtKind::If {
                condition,
                then_stmt: Some(body),
                ..
            } => {
                let cond = self.emit_expr(condition).scalar();
                let then_block = self.new_block();
                let end_block = self.new_block();
                self.set_term(Terminator::CondBr {
                    cond,
                    then_block,
                    else_block: end_block,
                });
                self.start_block(then_block);
                self.lower_stmt(body, frames);
                self.set_term(Terminator::Br(end_block));
                self.start_block(end_block);
            }

            StmtKind::If {
                condition,
                then_stmt: None,
                else_if,
                ..
            } => {
                if else_if {
                    // Close the previous arm and open the next test in
                    // the pending else path.
                    let (pending_else, end_block) = match frames.last_mut() {
                        Some(Frame::If {
                            else_block,
                            end_block,
                        }) => (else_block.take(), *end_block),
                        _ => return,
                    };
                    self.set_term(Terminator::Br(end_block));
                    if let Some(block) = pending_else {
                        self.start_block(block);
                    }
                    let cond = self.emit_expr(condition).scalar();
                    let then_block = self.new_block();
                    let else_block = self.new_block();
                    self.set_term(Terminator::CondBr {
                        cond,
                        then_block,
                        else_block,
                    });
                    self.start_block(then_block);
                    if let Some(Frame::If {
                        else_block: pending,
                        ..
                    }) = frames.last_mut()
                    {
                        *pending = Some(else_block);
                    }
                } else {
                    let cond = self.emit_expr(condition).scalar();
                    let then_block = self.new_block();
                    let else_block = self.new_block();
                    let end_block = self.new_block();
                    self.set_term(Terminator::CondBr {
                        cond,
                        then_block,
                        else_block,
                    });
                    self.start_block(then_block);
                    frames.push(Frame::If {
                        else_block: Some(else_block),
                        end_block,
                    });
                }
            }

            StmtKind::Else => {
                let (pending_else, end_block) = match frames.last_mut() {
                    Some(Frame::If {
                        else_block,
                        end_block,
                    }) => (else_block.take(), *end_block),
                    _ => return,
                };
                self.set_term(Terminator::Br(end_block));
                if let Some(block) = pending_else {
                    self.start_block(block);
                }
            }

            StmtKind::EndIf => {
                let frame = match frames.pop() {
                    Some(frame @ Frame::If { .. }) => frame,
                    Some(other) => {
                        frames.push(other);
                        return;
                    }
                    None => return,
                };
                if let Frame::If {
                    else_block,
                    end_block,
                } = frame
                {
                    self.set_term(Terminator::Br(end_block));
                    if let Some(block) = else_block {
                        self.start_block(block);
                        self.set_term(Terminator::Br(end_block));
                    }
                    self.start_block(end_block);
                }
            }

            StmtKind::Do {
                var,
                init,
                last,
                step,
                terminator,
            } => {
                let var_ir = ir_type(&self.ctx.types, self.ctx.expr_ty(var).ty);
                let var_ptr = self.lvalue(var).ptr;
                let init_value = self.emit_expr(init).scalar();
                self.emit(Instr::Store {
                    ptr: var_ptr,
                    value: init_value,
                });
                let last_value = self.emit_expr(last).scalar();
                let step_value = match step {
                    Some(step) => self.emit_expr(step).scalar(),
                    None => match var_ir {
                        IrType::I32 => self.const_int(1),
                        _ => self.emit(Instr::ConstReal {
                            value: 1.0,
                            double: var_ir == IrType::F64,
                        }),
                    },
                };

                let header = self.new_block();
                let body = self.new_block();
                let exit = self.new_block();
                self.branch_to(header);
                let current = self.emit(Instr::Load {
                    ptr: var_ptr,
                    ty: var_ir,
                });
                let op = if self.step_is_negative(step_value) {
                    BinOp::Ge
                } else {
                    BinOp::Le
                };
                let cond = self.emit(Instr::Binary {
                    op,
                    ty: var_ir,
                    lhs: current,
                    rhs: last_value,
                });
                self.set_term(Terminator::CondBr {
                    cond,
                    then_block: body,
                    else_block: exit,
                });
                self.start_block(body);
                frames.push(Frame::Do {
                    terminator: terminator.and_then(|r| r.target),
                    header,
                    exit,
                    var_ptr,
                    var_ty: var_ir,
                    step: step_value,
                });
            }

            StmtKind::ConstructPart(ConstructPart::EndDo) => {
                if matches!(
                    frames.last(),
                    Some(Frame::Do {
                        terminator: None,
                        ..
                    })
                ) {
                    if let Some(frame) = frames.pop() {
                        self.close_do_frame(frame);
                    }
                }
            }

            StmtKind::Stop { code } => {
                let args = match code {
                    Some(code) => match self.emit_expr(code) {
                        RValue::Char { ptr, len } => vec![ptr, len],
                        other => vec![other.scalar()],
                    },
                    None => Vec::new(),
                };
                self.emit(Instr::RuntimeCall {
                    callee: "stop".to_string(),
                    args,
                    ty: IrType::Void,
                });
            }

            StmtKind::Return => {
                self.emit_return();
                let next = self.new_block();
                self.start_block(next);
            }

            StmtKind::Call { subroutine, args } => {
                super::call::emit_subroutine_call(self, subroutine, &args);
            }

            StmtKind::Print { items } => self.lower_print(&items),

            StmtKind::Where { .. } => super::array::emit_where(self, id),
        }
    }

    fn step_is_negative(&self, step: ValueId) -> bool {
        matches!(
            self.func.values[step],
            Instr::ConstInt(value) if value < 0
        ) || matches!(
            self.func.values[step],
            Instr::ConstReal { value, .. } if value < 0.0
        )
    }

    fn close_terminated_dos(&mut self, stmt: StmtId, frames: &mut Vec<Frame>) {
        while matches!(
            frames.last(),
            Some(Frame::Do {
                terminator: Some(term),
                ..
            }) if *term == stmt
        ) {
            let frame = frames.pop().unwrap();
            self.close_do_frame(frame);
        }
    }

    /// Emit the loop backedge: increment the control variable and branch
    /// back to the header test.
    fn close_do_frame(&mut self, frame: Frame) {
        let Frame::Do {
            header,
            exit,
            var_ptr,
            var_ty,
            step,
            ..
        } = frame
        else {
            return;
        };
        let current = self.emit(Instr::Load {
            ptr: var_ptr,
            ty: var_ty,
        });
        let next = self.emit(Instr::Binary {
            op: BinOp::Add,
            ty: var_ty,
            lhs: current,
            rhs: step,
        });
        self.emit(Instr::Store {
            ptr: var_ptr,
            value: next,
        });
        self.set_term(Terminator::Br(header));
        self.start_block(exit);
    }

    fn lower_assignment(&mut self, lhs: ExprId, rhs: ExprId) {
        let lhs_ty = self.ctx.expr_ty(lhs).ty;
        if self.ctx.types.is_array(lhs_ty) {
            super::array::emit_array_assignment(self, lhs, rhs);
            return;
        }
        if self.ctx.types.is_character(lhs_ty) {
            let (src_ptr, src_len) = self.emit_expr(rhs).char_pair();
            let dst = self.lvalue(lhs);
            let dst_len = dst.char_len.expect("character lvalue without a length");
            self.emit(Instr::RuntimeCall {
                callee: "assignment_char1".to_string(),
                args: vec![dst.ptr, dst_len, src_ptr, src_len],
                ty: IrType::Void,
            });
            return;
        }

        let value = self.emit_expr(rhs);
        let ptr = self.lvalue(lhs).ptr;
        let value = match value {
            RValue::Complex { re, im } => self.emit(Instr::MakeComplex { re, im }),
            other => other.scalar(),
        };
        self.emit(Instr::Store { ptr, value });
    }

    fn lower_print(&mut self, items: &[ExprId]) {
        for &item in items {
            let ty = self.ctx.expr_ty(item).ty;
            let elem = self.ctx.types.self_or_element(ty);
            match self.ctx.types.spec(elem) {
                Some(TypeSpec::Character) => {
                    let (ptr, len) = self.emit_expr(item).char_pair();
                    self.emit(Instr::RuntimeCall {
                        callee: "print_char1".to_string(),
                        args: vec![ptr, len],
                        ty: IrType::Void,
                    });
                }
                Some(TypeSpec::Complex) => {
                    let value = self.emit_expr(item);
                    let RValue::Complex { re, im } = value else {
                        panic!("expected a complex value");
                    };
                    self.emit(Instr::RuntimeCall {
                        callee: "print_complex".to_string(),
                        args: vec![re, im],
                        ty: IrType::Void,
                    });
                }
                Some(spec) => {
                    let value = self.emit_expr(item).scalar();
                    let callee = match spec {
                        TypeSpec::Integer => "print_int32",
                        TypeSpec::Real => "print_float",
                        TypeSpec::DoublePrecision => "print_double",
                        TypeSpec::Logical => "print_logical",
                        _ => unreachable!(),
                    };
                    self.emit(Instr::RuntimeCall {
                        callee: callee.to_string(),
                        args: vec![value],
                        ty: IrType::Void,
                    });
                }
                None => {}
            }
        }
        self.emit(Instr::RuntimeCall {
            callee: "print_newline".to_string(),
            args: Vec::new(),
            ty: IrType::Void,
        });
    }

    // ========================================================================
    // L-values
    // ========================================================================

    pub(super) fn lvalue(&mut self, expr: ExprId) -> LValue {
        let kind = self.ctx.expr(expr).kind.clone();
        let ty = self.ctx.expr_ty(expr).ty;
        match kind {
            ExprKind::Var(decl) => {
                let ptr = self.var_ptr(decl);
                let char_len = if self.ctx.types.is_character(self.ctx.types.self_or_element(ty)) {
                    if decl == self.unit {
                        self.char_lens.get(&decl).copied()
                    } else {
                        Some(self.char_len_of_decl(decl))
                    }
                } else {
                    None
                };
                LValue { ptr, char_len }
            }
            ExprKind::ArrayElement { target, subscripts } => {
                let ptr = super::array::emit_array_element_ptr(self, target, &subscripts);
                let char_len = if self.ctx.types.is_character(ty) {
                    Some(self.char_len_of_type(self.ctx.expr_ty(target).ty))
                } else {
                    None
                };
                LValue { ptr, char_len }
            }
            ExprKind::Substring { base, lower, upper } => {
                let (ptr, len) = self.substring_pair(base, lower, upper);
                LValue {
                    ptr,
                    char_len: Some(len),
                }
            }
            _ => panic!("expression is not an lvalue"),
        }
    }

    fn substring_pair(
        &mut self,
        base: ExprId,
        lower: Option<ExprId>,
        upper: Option<ExprId>,
    ) -> (ValueId, ValueId) {
        let (base_ptr, base_len) = self.emit_expr(base).char_pair();
        let one = self.const_int(1);
        let lower_value = match lower {
            Some(lower) => self.emit_expr(lower).scalar(),
            None => one,
        };
        let upper_value = match upper {
            Some(upper) => self.emit_expr(upper).scalar(),
            None => base_len,
        };
        let offset = self.emit(Instr::Binary {
            op: BinOp::Sub,
            ty: IrType::I32,
            lhs: lower_value,
            rhs: one,
        });
        let ptr = self.emit(Instr::ElementPtr {
            base: base_ptr,
            offset,
            ty: IrType::I8,
        });
        let span = self.emit(Instr::Binary {
            op: BinOp::Sub,
            ty: IrType::I32,
            lhs: upper_value,
            rhs: lower_value,
        });
        let len = self.emit(Instr::Binary {
            op: BinOp::Add,
            ty: IrType::I32,
            lhs: span,
            rhs: one,
        });
        (ptr, len)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub(super) fn emit_expr(&mut self, expr: ExprId) -> RValue {
        let ty = self.ctx.expr_ty(expr).ty;
        let kind = self.ctx.expr(expr).kind.clone();
        match kind {
            ExprKind::IntegerConstant(value) => RValue::Scalar(self.const_int(value)),
            ExprKind::RealConstant(value) => RValue::Scalar(self.emit(Instr::ConstReal {
                value,
                double: self.ctx.types.is_double_precision(ty),
            })),
            ExprKind::LogicalConstant(value) => {
                RValue::Scalar(self.emit(Instr::ConstBool(value)))
            }
            ExprKind::CharacterConstant(value) => {
                let len = self.const_int(value.len() as i64);
                let ptr = self.emit(Instr::ConstStr(value));
                RValue::Char { ptr, len }
            }
            ExprKind::Var(decl) => self.emit_var(decl, ty),
            ExprKind::Unary { op, expr } => self.emit_unary(op, expr),
            ExprKind::Binary { op, lhs, rhs } => self.emit_binary(op, lhs, rhs),
            ExprKind::ImplicitCast { expr } => {
                let value = self.emit_expr(expr);
                self.convert_value(value, self.ctx.expr_ty(expr).ty, ty)
            }
            ExprKind::Conversion { expr, .. } => {
                let value = self.emit_expr(expr);
                self.convert_value(value, self.ctx.expr_ty(expr).ty, ty)
            }
            ExprKind::ArrayElement { target, subscripts } => {
                let ptr = super::array::emit_array_element_ptr(self, target, &subscripts);
                self.load_typed(ptr, ty)
            }
            ExprKind::Substring { base, lower, upper } => {
                let (ptr, len) = self.substring_pair(base, lower, upper);
                RValue::Char { ptr, len }
            }
            ExprKind::IntrinsicCall { builtin, args } => self.emit_intrinsic(builtin, &args, ty),
            ExprKind::ArrayConstructor { .. } => {
                let ptr = super::array::emit_array_constructor(self, expr);
                RValue::Scalar(ptr)
            }
            ExprKind::Call { function, args } => {
                super::call::emit_function_call(self, function, &args)
            }
        }
    }

    /// Load a value of front-end type `ty` from `ptr`.
    pub(super) fn load_typed(&mut self, ptr: ValueId, ty: Ty) -> RValue {
        let elem = self.ctx.types.self_or_element(ty);
        if self.ctx.types.is_character(elem) {
            let len = self.char_len_of_type(elem);
            return RValue::Char { ptr, len };
        }
        if self.ctx.types.is_complex(elem) {
            let value = self.emit(Instr::Load {
                ptr,
                ty: IrType::Complex,
            });
            let re = self.emit(Instr::ComplexPart { value, imag: false });
            let im = self.emit(Instr::ComplexPart { value, imag: true });
            return RValue::Complex { re, im };
        }
        let ir = ir_type(&self.ctx.types, elem);
        RValue::Scalar(self.emit(Instr::Load { ptr, ty: ir }))
    }

    fn emit_var(&mut self, decl: DeclId, ty: Ty) -> RValue {
        // A statement-function formal stands for the actual argument
        // expression at the innermost call site.
        if let Some((frame_index, substitute)) = self.lookup_inline_arg(decl) {
            // The actual was written in the caller's frame: emit it with
            // the inner frames removed, then restore them.
            let saved = self.inline_frames.split_off(frame_index);
            let value = self.emit_expr(substitute);
            self.inline_frames.extend(saved);
            return value;
        }

        if let DeclKind::Var {
            var_kind: crate::ast::VarKind::Parameter,
            init: Some(init),
            ..
        } = &self.ctx.decl(decl).kind
        {
            let init = *init;
            return self.emit_expr(init);
        }

        if self.ctx.types.is_array(ty) {
            return RValue::Scalar(self.var_ptr(decl));
        }
        let ptr = self.var_ptr(decl);
        if self.ctx.types.is_character(ty) {
            let len = self.char_len_of_decl(decl);
            return RValue::Char { ptr, len };
        }
        self.load_typed(ptr, ty)
    }

    fn lookup_inline_arg(&self, decl: DeclId) -> Option<(usize, ExprId)> {
        for (index, frame) in self.inline_frames.iter().enumerate().rev() {
            if let Some(&expr) = frame.get(&decl) {
                return Some((index, expr));
            }
        }
        None
    }

    fn emit_unary(&mut self, op: UnaryOp, expr: ExprId) -> RValue {
        let operand_ty = self.ctx.expr_ty(expr).ty;
        let value = self.emit_expr(expr);
        self.emit_unary_op(op, operand_ty, value)
    }

    pub(super) fn emit_unary_op(&mut self, op: UnaryOp, operand_ty: Ty, value: RValue) -> RValue {
        match op {
            UnaryOp::Plus => value,
            UnaryOp::Minus => match value {
                RValue::Complex { re, im } => {
                    let re = self.emit(Instr::Unary {
                        op: UnOp::Neg,
                        ty: IrType::F32,
                        operand: re,
                    });
                    let im = self.emit(Instr::Unary {
                        op: UnOp::Neg,
                        ty: IrType::F32,
                        operand: im,
                    });
                    RValue::Complex { re, im }
                }
                other => {
                    let elem = self.ctx.types.self_or_element(operand_ty);
                    let ty = ir_type(&self.ctx.types, elem);
                    RValue::Scalar(self.emit(Instr::Unary {
                        op: UnOp::Neg,
                        ty,
                        operand: other.scalar(),
                    }))
                }
            },
            UnaryOp::Not => RValue::Scalar({
                let operand = value.scalar();
                self.emit(Instr::Unary {
                    op: UnOp::Not,
                    ty: IrType::I1,
                    operand,
                })
            }),
        }
    }

    pub(super) fn emit_binary_op(
        &mut self,
        op: BinaryOp,
        operand_ty: Ty,
        lhs: RValue,
        rhs: RValue,
    ) -> RValue {
        let elem = self.ctx.types.self_or_element(operand_ty);

        if self.ctx.types.is_character(elem) {
            return self.emit_character_binary(op, lhs, rhs);
        }
        if self.ctx.types.is_complex(elem) {
            return self.emit_complex_binary(op, lhs, rhs);
        }

        let ir = ir_type(&self.ctx.types, elem);
        let lhs = lhs.scalar();
        let rhs = rhs.scalar();
        let mapped = match op {
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::Div,
            BinaryOp::Pow => {
                let callee = match ir {
                    IrType::I32 => "pow_i32",
                    IrType::F64 => "pow_f64",
                    _ => "pow_f32",
                };
                return RValue::Scalar(self.emit(Instr::RuntimeCall {
                    callee: callee.to_string(),
                    args: vec![lhs, rhs],
                    ty: ir,
                }));
            }
            BinaryOp::Eq => BinOp::Eq,
            BinaryOp::Ne => BinOp::Ne,
            BinaryOp::Lt => BinOp::Lt,
            BinaryOp::Le => BinOp::Le,
            BinaryOp::Gt => BinOp::Gt,
            BinaryOp::Ge => BinOp::Ge,
            BinaryOp::And => BinOp::And,
            BinaryOp::Or => BinOp::Or,
            BinaryOp::Eqv => BinOp::Eq,
            BinaryOp::Neqv => BinOp::Xor,
            BinaryOp::Concat => unreachable!("concat operands are character"),
        };
        RValue::Scalar(self.emit(Instr::Binary {
            op: mapped,
            ty: ir,
            lhs,
            rhs,
        }))
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> RValue {
        let operand_ty = self.ctx.expr_ty(lhs).ty;
        let lhs_value = self.emit_expr(lhs);
        let rhs_value = self.emit_expr(rhs);
        self.emit_binary_op(op, operand_ty, lhs_value, rhs_value)
    }

    fn emit_character_binary(&mut self, op: BinaryOp, lhs: RValue, rhs: RValue) -> RValue {
        let (lhs_ptr, lhs_len) = lhs.char_pair();
        let (rhs_ptr, rhs_len) = rhs.char_pair();

        if op == BinaryOp::Concat {
            let len = self.emit(Instr::Binary {
                op: BinOp::Add,
                ty: IrType::I32,
                lhs: lhs_len,
                rhs: rhs_len,
            });
            let ptr = self.emit(Instr::AllocaArray {
                elem: IrType::I8,
                count: len,
            });
            self.emit(Instr::RuntimeCall {
                callee: "concat_char1".to_string(),
                args: vec![ptr, len, lhs_ptr, lhs_len, rhs_ptr, rhs_len],
                ty: IrType::Void,
            });
            return RValue::Char { ptr, len };
        }

        // Relational comparison through the runtime: the result sign
        // orders the operands.
        let cmp = self.emit(Instr::RuntimeCall {
            callee: "compare_char1".to_string(),
            args: vec![lhs_ptr, lhs_len, rhs_ptr, rhs_len],
            ty: IrType::I32,
        });
        let zero = self.const_int(0);
        let mapped = match op {
            BinaryOp::Eq => BinOp::Eq,
            BinaryOp::Ne => BinOp::Ne,
            BinaryOp::Lt => BinOp::Lt,
            BinaryOp::Le => BinOp::Le,
            BinaryOp::Gt => BinOp::Gt,
            BinaryOp::Ge => BinOp::Ge,
            _ => panic!("invalid character operator"),
        };
        RValue::Scalar(self.emit(Instr::Binary {
            op: mapped,
            ty: IrType::I32,
            lhs: cmp,
            rhs: zero,
        }))
    }

    fn emit_complex_binary(&mut self, op: BinaryOp, lhs: RValue, rhs: RValue) -> RValue {
        let RValue::Complex { re: a, im: b } = lhs else {
            panic!("expected a complex value");
        };
        let RValue::Complex { re: c, im: d } = rhs else {
            panic!("expected a complex value");
        };
        let f = IrType::F32;
        let bin = |this: &mut Self, op, lhs, rhs| {
            this.emit(Instr::Binary { op, ty: f, lhs, rhs })
        };

        match op {
            BinaryOp::Add => {
                let re = bin(self, BinOp::Add, a, c);
                let im = bin(self, BinOp::Add, b, d);
                RValue::Complex { re, im }
            }
            BinaryOp::Sub => {
                let re = bin(self, BinOp::Sub, a, c);
                let im = bin(self, BinOp::Sub, b, d);
                RValue::Complex { re, im }
            }
            BinaryOp::Mul => {
                // (a + bi)(c + di) = (ac - bd) + (ad + bc)i
                let ac = bin(self, BinOp::Mul, a, c);
                let bd = bin(self, BinOp::Mul, b, d);
                let ad = bin(self, BinOp::Mul, a, d);
                let bc = bin(self, BinOp::Mul, b, c);
                let re = bin(self, BinOp::Sub, ac, bd);
                let im = bin(self, BinOp::Add, ad, bc);
                RValue::Complex { re, im }
            }
            BinaryOp::Div => {
                // (a + bi)/(c + di) multiplied through by the conjugate.
                let cc = bin(self, BinOp::Mul, c, c);
                let dd = bin(self, BinOp::Mul, d, d);
                let denom = bin(self, BinOp::Add, cc, dd);
                let ac = bin(self, BinOp::Mul, a, c);
                let bd = bin(self, BinOp::Mul, b, d);
                let bc = bin(self, BinOp::Mul, b, c);
                let ad = bin(self, BinOp::Mul, a, d);
                let re_num = bin(self, BinOp::Add, ac, bd);
                let im_num = bin(self, BinOp::Sub, bc, ad);
                let re = bin(self, BinOp::Div, re_num, denom);
                let im = bin(self, BinOp::Div, im_num, denom);
                RValue::Complex { re, im }
            }
            BinaryOp::Pow => {
                let result = self.emit(Instr::RuntimeCall {
                    callee: "pow_c32".to_string(),
                    args: vec![a, b, c, d],
                    ty: IrType::Complex,
                });
                let re = self.emit(Instr::ComplexPart {
                    value: result,
                    imag: false,
                });
                let im = self.emit(Instr::ComplexPart {
                    value: result,
                    imag: true,
                });
                RValue::Complex { re, im }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let re_cmp = bin(self, BinOp::Eq, a, c);
                let im_cmp = bin(self, BinOp::Eq, b, d);
                let both = self.emit(Instr::Binary {
                    op: BinOp::And,
                    ty: IrType::I1,
                    lhs: re_cmp,
                    rhs: im_cmp,
                });
                if op == BinaryOp::Eq {
                    RValue::Scalar(both)
                } else {
                    RValue::Scalar(self.emit(Instr::Unary {
                        op: UnOp::Not,
                        ty: IrType::I1,
                        operand: both,
                    }))
                }
            }
            _ => panic!("invalid complex operator"),
        }
    }

    /// Convert a value between intrinsic types.
    pub(super) fn convert_value(&mut self, value: RValue, from: Ty, to: Ty) -> RValue {
        let from_elem = self.ctx.types.self_or_element(from);
        let to_elem = self.ctx.types.self_or_element(to);
        if from_elem == to_elem {
            return value;
        }

        let source = match value {
            RValue::Complex { re, .. } => re,
            other => other.scalar(),
        };

        if self.ctx.types.is_complex(to_elem) {
            let re = self.emit(Instr::Convert {
                kind: ConversionKind::Real,
                to: IrType::F32,
                operand: source,
            });
            let im = match value {
                RValue::Complex { im, .. } => im,
                _ => self.emit(Instr::ConstReal {
                    value: 0.0,
                    double: false,
                }),
            };
            return RValue::Complex { re, im };
        }

        let (kind, to_ir) = if self.ctx.types.is_integer(to_elem) {
            (ConversionKind::Int, IrType::I32)
        } else if self.ctx.types.is_real(to_elem) {
            (ConversionKind::Real, IrType::F32)
        } else if self.ctx.types.is_double_precision(to_elem) {
            (ConversionKind::Dble, IrType::F64)
        } else {
            return value;
        };
        RValue::Scalar(self.emit(Instr::Convert {
            kind,
            to: to_ir,
            operand: source,
        }))
    }

    fn emit_intrinsic(&mut self, builtin: Builtin, args: &[ExprId], result_ty: Ty) -> RValue {
        let values: Vec<RValue> = args.iter().map(|&arg| self.emit_expr(arg)).collect();
        let arg_tys: Vec<Ty> = args.iter().map(|&arg| self.ctx.expr_ty(arg).ty).collect();
        self.emit_intrinsic_values(builtin, &values, &arg_tys, result_ty)
    }

    /// The value-level intrinsic emitter, shared between the scalar path
    /// and the elementwise array path.
    pub(super) fn emit_intrinsic_values(
        &mut self,
        builtin: Builtin,
        values: &[RValue],
        arg_tys: &[Ty],
        result_ty: Ty,
    ) -> RValue {
        match builtin {
            Builtin::Int | Builtin::Real | Builtin::Dble => {
                self.convert_value(values[0], arg_tys[0], result_ty)
            }
            Builtin::Cmplx => {
                let re = self.convert_value(values[0], arg_tys[0], Ty::REAL).scalar();
                let im = match values.get(1) {
                    Some(&im_value) => {
                        self.convert_value(im_value, arg_tys[1], Ty::REAL).scalar()
                    }
                    None => self.emit(Instr::ConstReal {
                        value: 0.0,
                        double: false,
                    }),
                };
                RValue::Complex { re, im }
            }
            Builtin::Aimag => {
                let RValue::Complex { im, .. } = values[0] else {
                    panic!("expected a complex value");
                };
                RValue::Scalar(im)
            }
            Builtin::Conjg => {
                let RValue::Complex { re, im } = values[0] else {
                    panic!("expected a complex value");
                };
                let im = self.emit(Instr::Unary {
                    op: UnOp::Neg,
                    ty: IrType::F32,
                    operand: im,
                });
                RValue::Complex { re, im }
            }
            Builtin::Len => {
                let (_, len) = values[0].char_pair();
                RValue::Scalar(len)
            }
            Builtin::Ichar => {
                let (ptr, _) = values[0].char_pair();
                let byte = self.emit(Instr::Load {
                    ptr,
                    ty: IrType::I8,
                });
                RValue::Scalar(self.emit(Instr::Convert {
                    kind: ConversionKind::Int,
                    to: IrType::I32,
                    operand: byte,
                }))
            }
            Builtin::Char => {
                let code = values[0].scalar();
                let ptr = self.emit(Instr::RuntimeCall {
                    callee: "char_i32".to_string(),
                    args: vec![code],
                    ty: IrType::Ptr,
                });
                let len = self.const_int(1);
                RValue::Char { ptr, len }
            }
            Builtin::Abs => {
                if let RValue::Complex { re, im } = values[0] {
                    return RValue::Scalar(self.emit(Instr::RuntimeCall {
                        callee: "cabs_f32".to_string(),
                        args: vec![re, im],
                        ty: IrType::F32,
                    }));
                }
                let elem = self.ctx.types.self_or_element(arg_tys[0]);
                let ir = ir_type(&self.ctx.types, elem);
                let callee = match ir {
                    IrType::I32 => "abs_i32",
                    IrType::F64 => "fabs_f64",
                    _ => "fabs_f32",
                };
                RValue::Scalar(self.emit(Instr::RuntimeCall {
                    callee: callee.to_string(),
                    args: vec![values[0].scalar()],
                    ty: ir,
                }))
            }
            Builtin::Mod => {
                let elem = self.ctx.types.self_or_element(result_ty);
                let ir = ir_type(&self.ctx.types, elem);
                let callee = match ir {
                    IrType::I32 => "mod_i32",
                    IrType::F64 => "fmod_f64",
                    _ => "fmod_f32",
                };
                let converted = self.convert_scalars(values, arg_tys, result_ty);
                RValue::Scalar(self.emit(Instr::RuntimeCall {
                    callee: callee.to_string(),
                    args: converted,
                    ty: ir,
                }))
            }
            Builtin::Min | Builtin::Max => {
                let elem = self.ctx.types.self_or_element(result_ty);
                let ir = ir_type(&self.ctx.types, elem);
                let base = if builtin == Builtin::Min { "min" } else { "max" };
                let suffix = match ir {
                    IrType::I32 => "i32",
                    IrType::F64 => "f64",
                    _ => "f32",
                };
                let converted = self.convert_scalars(values, arg_tys, result_ty);
                let mut acc = converted[0];
                for &next in &converted[1..] {
                    acc = self.emit(Instr::RuntimeCall {
                        callee: format!("{}_{}", base, suffix),
                        args: vec![acc, next],
                        ty: ir,
                    });
                }
                RValue::Scalar(acc)
            }
            Builtin::Nint => {
                let elem = self.ctx.types.self_or_element(arg_tys[0]);
                let callee = if self.ctx.types.is_double_precision(elem) {
                    "nint_f64"
                } else {
                    "nint_f32"
                };
                let value = values[0].scalar();
                RValue::Scalar(self.emit(Instr::RuntimeCall {
                    callee: callee.to_string(),
                    args: vec![value],
                    ty: IrType::I32,
                }))
            }
            Builtin::Sqrt
            | Builtin::Sin
            | Builtin::Cos
            | Builtin::Tan
            | Builtin::Exp
            | Builtin::Log
            | Builtin::Log10 => {
                let name = builtin.name().to_ascii_lowercase();
                if let RValue::Complex { re, im } = values[0] {
                    let result = self.emit(Instr::RuntimeCall {
                        callee: format!("c{}_f32", name),
                        args: vec![re, im],
                        ty: IrType::Complex,
                    });
                    let re = self.emit(Instr::ComplexPart {
                        value: result,
                        imag: false,
                    });
                    let im = self.emit(Instr::ComplexPart {
                        value: result,
                        imag: true,
                    });
                    return RValue::Complex { re, im };
                }
                let elem = self.ctx.types.self_or_element(arg_tys[0]);
                let ir = ir_type(&self.ctx.types, elem);
                let suffix = if ir == IrType::F64 { "f64" } else { "f32" };
                RValue::Scalar(self.emit(Instr::RuntimeCall {
                    callee: format!("{}_{}", name, suffix),
                    args: vec![values[0].scalar()],
                    ty: ir,
                }))
            }
        }
    }

    fn convert_scalars(&mut self, values: &[RValue], arg_tys: &[Ty], target: Ty) -> Vec<ValueId> {
        values
            .iter()
            .zip(arg_tys)
            .map(|(&value, &ty)| self.convert_value(value, ty, target).scalar())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Parser;
    use crate::source::SourceForm;

    fn lower(text: &str) -> Module {
        let mut ctx = AstContext::new();
        let source = ctx.source_map.add_inline(text, SourceForm::Free);
        let mut parser = Parser::new(&mut ctx, source, false);
        parser.parse_program_units();
        assert!(!ctx.diagnostics.has_errors(), "{}", ctx.diagnostics);
        lower_translation_unit(&ctx)
    }

    fn count_instrs(module: &Module, pred: impl Fn(&Instr) -> bool) -> usize {
        module
            .functions
            .iter()
            .flat_map(|f| f.values.iter())
            .filter(|i| pred(i))
            .count()
    }

    #[test]
    fn test_scalar_assignment_lowers_to_store() {
        let module = lower("PROGRAM P\nX = 1.5\nEND\n");
        assert_eq!(module.functions.len(), 1);
        assert_eq!(module.functions.iter().next().unwrap().name, "P");
        assert!(count_instrs(&module, |i| matches!(i, Instr::Store { .. })) >= 1);
    }

    #[test]
    fn test_goto_branches_to_label_block() {
        let module = lower("PROGRAM P\nGOTO 10\nX = 1.0\n10 CONTINUE\nEND\n");
        let func = module.functions.iter().next().unwrap();
        // Entry, label block, and the unreachable continuation.
        assert!(func.blocks.len() >= 3);
        let branches = func
            .blocks
            .iter()
            .filter(|b| matches!(b.term, Some(Terminator::Br(_))))
            .count();
        assert!(branches >= 1);
    }

    #[test]
    fn test_do_loop_emits_backedge() {
        let module = lower("PROGRAM P\nDO 10 I = 1, 5\nX = X + 1.0\n10 CONTINUE\nEND\n");
        let func = module.functions.iter().next().unwrap();
        let cond_branches = func
            .blocks
            .iter()
            .filter(|b| matches!(b.term, Some(Terminator::CondBr { .. })))
            .count();
        assert_eq!(cond_branches, 1);
    }

    #[test]
    fn test_character_assignment_uses_runtime() {
        let module = lower("PROGRAM P\nCHARACTER(LEN=8) :: C\nC = 'HI'\nEND\n");
        assert_eq!(
            count_instrs(&module, |i| matches!(
                i,
                Instr::RuntimeCall { callee, .. } if callee == "assignment_char1"
            )),
            1
        );
    }

    #[test]
    fn test_statement_function_is_inlined() {
        let module = lower("PROGRAM P\nF(X) = X * 2.0\nY = F(3.0)\nEND\n");
        // No call instruction: the body was expanded at the use site.
        assert_eq!(count_instrs(&module, |i| matches!(i, Instr::Call { .. })), 0);
        assert!(count_instrs(&module, |i| matches!(
            i,
            Instr::Binary { op: BinOp::Mul, .. }
        )) >= 1);
    }

    #[test]
    fn test_print_lowering() {
        let module = lower("PROGRAM P\nPRINT *, 42, 'HI'\nEND\n");
        assert!(count_instrs(&module, |i| matches!(
            i,
            Instr::RuntimeCall { callee, .. } if callee == "print_int32"
        )) == 1);
        assert!(count_instrs(&module, |i| matches!(
            i,
            Instr::RuntimeCall { callee, .. } if callee == "print_char1"
        )) == 1);
        assert!(count_instrs(&module, |i| matches!(
            i,
            Instr::RuntimeCall { callee, .. } if callee == "print_newline"
        )) == 1);
    }

    #[test]
    fn test_conversion_emitted_for_mixed_assignment() {
        let module = lower("PROGRAM P\nINTEGER K\nK = 2.5\nEND\n");
        assert_eq!(
            count_instrs(&module, |i| matches!(
                i,
                Instr::Convert {
                    kind: ConversionKind::Int,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn test_if_construct_blocks() {
        let module = lower(
            "PROGRAM P\nIF (X .GT. 0.0) THEN\nY = 1.0\nELSE\nY = 2.0\nEND IF\nEND\n",
        );
        let func = module.functions.iter().next().unwrap();
        let cond_branches = func
            .blocks
            .iter()
            .filter(|b| matches!(b.term, Some(Terminator::CondBr { .. })))
            .count();
        assert_eq!(cond_branches, 1);
        // then, else, end and entry at minimum.
        assert!(func.blocks.len() >= 4);
    }
}
