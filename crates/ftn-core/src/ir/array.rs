//! Array operation lowering.
//!
//! Whole-array expressions lower to counter loop nests. The shared
//! recipe for `A = f(B, C, ...)`:
//!
//! 1. gather one *section list* per array operand (an entry per
//!    dimension, `(offset, size, stride)` ranges or single elements),
//! 2. hoist scalar sub-expressions into temporaries keyed by expression
//!    identity, so each is evaluated exactly once,
//! 3. emit one counter loop per range dimension, iterated back to front
//!    (column-major memory order), each counting `[0, size)`,
//! 4. inside the body, load each array operand through its linear
//!    element offset, apply the operator tree elementwise, and store.
//!
//! WHERE statements reuse the same frame with the element body wrapped
//! in a conditional on the elementwise mask value.

use std::collections::HashMap;

use super::lower::{FunctionLowering, RValue};
use super::{ir_type, BinOp, Constant, GlobalArray, Instr, IrType, Terminator};
use crate::ast::{DeclKind, ExprKind, StmtKind, VarKind};
use crate::ids::{BlockId, ExprId, StmtId, ValueId};
use crate::types::{DimSpec, Ty};

/// A dimensional slice: `offset + counter * stride` over `size`
/// elements. Whole dimensions leave offset and stride implicit (0, 1).
#[derive(Debug, Clone, Copy)]
pub struct RangeSection {
    pub offset: Option<ValueId>,
    pub size: ValueId,
    pub stride: Option<ValueId>,
}

/// One dimension of an array operand: a range to iterate or a single
/// element position.
#[derive(Debug, Clone, Copy)]
pub enum Section {
    Range(RangeSection),
    Element(ValueId),
}

impl Section {
    /// The full extent of the underlying dimension, used by the linear
    /// offset computation.
    fn dimension_size(&self, lowering: &mut FunctionLowering<'_>) -> ValueId {
        match self {
            Section::Range(range) => range.size,
            Section::Element(_) => lowering.const_int(1),
        }
    }
}

/// An array operand: its base pointer plus a window into the shared
/// section list.
#[derive(Debug, Clone, Copy)]
struct StoredArrayValue {
    sections_offset: usize,
    rank: usize,
    ptr: ValueId,
}

/// Shared state of one whole-array operation: operand sections and
/// hoisted scalars, both keyed by source-expression identity.
#[derive(Default)]
pub(super) struct ArrayOperation {
    arrays: HashMap<ExprId, StoredArrayValue>,
    sections: Vec<Section>,
    scalars: HashMap<ExprId, RValue>,
}

impl ArrayOperation {
    fn new() -> Self {
        Self::default()
    }

    /// Walk an operand tree, gathering sections for array-valued leaves
    /// and hoisting scalar sub-expressions. Returns the last array
    /// expression visited (whose sections can drive the loop nest).
    fn emit_all(&mut self, lowering: &mut FunctionLowering<'_>, expr: ExprId) -> Option<ExprId> {
        let ty = lowering.ctx.expr_ty(expr).ty;
        if !lowering.ctx.types.is_array(ty) {
            self.emit_scalar(lowering, expr);
            return None;
        }
        match lowering.ctx.expr(expr).kind.clone() {
            ExprKind::Var(_) | ExprKind::ArrayConstructor { .. } => {
                self.emit_array_sections(lowering, expr);
                Some(expr)
            }
            ExprKind::Unary { expr: sub, .. }
            | ExprKind::ImplicitCast { expr: sub }
            | ExprKind::Conversion { expr: sub, .. } => self.emit_all(lowering, sub),
            ExprKind::Binary { lhs, rhs, .. } => {
                let left = self.emit_all(lowering, lhs);
                let right = self.emit_all(lowering, rhs);
                right.or(left)
            }
            ExprKind::IntrinsicCall { args, .. } => {
                let mut last = None;
                for arg in args {
                    last = self.emit_all(lowering, arg).or(last);
                }
                last
            }
            _ => panic!("invalid array operand"),
        }
    }

    fn emit_scalar(&mut self, lowering: &mut FunctionLowering<'_>, expr: ExprId) {
        if self.scalars.contains_key(&expr) {
            return;
        }
        let value = lowering.emit_expr(expr);
        self.scalars.insert(expr, value);
    }

    fn emit_array_sections(&mut self, lowering: &mut FunctionLowering<'_>, expr: ExprId) {
        if self.arrays.contains_key(&expr) {
            return;
        }
        let (ptr, sizes) = emit_array_value(lowering, expr);
        let stored = StoredArrayValue {
            sections_offset: self.sections.len(),
            rank: sizes.len(),
            ptr,
        };
        for size in sizes {
            self.sections.push(Section::Range(RangeSection {
                offset: None,
                size,
                stride: None,
            }));
        }
        self.arrays.insert(expr, stored);
    }

    fn array_value(&self, expr: ExprId) -> StoredArrayValue {
        self.arrays[&expr]
    }

    fn sections_of(&self, stored: StoredArrayValue) -> &[Section] {
        &self.sections[stored.sections_offset..stored.sections_offset + stored.rank]
    }

    fn scalar_value(&self, expr: ExprId) -> RValue {
        self.scalars[&expr]
    }
}

/// Evaluate an array-valued leaf to (base pointer, per-dimension size).
fn emit_array_value(
    lowering: &mut FunctionLowering<'_>,
    expr: ExprId,
) -> (ValueId, Vec<ValueId>) {
    let ty = lowering.ctx.expr_ty(expr).ty;
    match lowering.ctx.expr(expr).kind.clone() {
        ExprKind::Var(decl) => {
            if let DeclKind::Var {
                var_kind: VarKind::Parameter,
                init: Some(init),
                ..
            } = lowering.ctx.decl(decl).kind
            {
                return emit_array_value(lowering, init);
            }
            let ptr = lowering.var_ptr(decl);
            let sizes = emit_dimension_sizes(lowering, ty);
            (ptr, sizes)
        }
        ExprKind::ArrayConstructor { .. } => {
            let ptr = emit_array_constructor(lowering, expr);
            let sizes = emit_dimension_sizes(lowering, ty);
            (ptr, sizes)
        }
        _ => panic!("invalid array value expression"),
    }
}

/// Per-dimension sizes of an array type: `ub - lb + 1`, folded when the
/// bounds are constant.
fn emit_dimension_sizes(lowering: &mut FunctionLowering<'_>, ty: Ty) -> Vec<ValueId> {
    let dims = lowering
        .ctx
        .types
        .array_dims(ty)
        .map(|d| d.to_vec())
        .unwrap_or_default();
    dims.iter()
        .map(|dim| match dim {
            DimSpec::Explicit { lower, upper } => {
                match crate::eval::eval_bounds(lowering.ctx, *lower, *upper) {
                    Some((lb, ub)) => lowering.const_int((ub - lb + 1).max(0)),
                    None => {
                        let ub = lowering.emit_expr(*upper).scalar();
                        let lb = match lower {
                            Some(lower) => lowering.emit_expr(*lower).scalar(),
                            None => lowering.const_int(1),
                        };
                        let diff = lowering.emit(Instr::Binary {
                            op: BinOp::Sub,
                            ty: IrType::I32,
                            lhs: ub,
                            rhs: lb,
                        });
                        let one = lowering.const_int(1);
                        lowering.emit(Instr::Binary {
                            op: BinOp::Add,
                            ty: IrType::I32,
                            lhs: diff,
                            rhs: one,
                        })
                    }
                }
            }
            // Assumed-size extents are unknown; they cannot drive a
            // whole-array iteration.
            DimSpec::AssumedSize => lowering.const_int(0),
        })
        .collect()
}

/// The loop nest over one driving section list.
pub(super) struct ArrayLoop {
    sections: Vec<Section>,
    counters: Vec<Option<ValueId>>,
    elements: Vec<Option<ValueId>>,
    loops: Vec<Option<(BlockId, BlockId)>>,
}

impl ArrayLoop {
    fn new(sections: Vec<Section>) -> Self {
        let len = sections.len();
        Self {
            sections,
            counters: vec![None; len],
            elements: vec![None; len],
            loops: vec![None; len],
        }
    }

    /// Open one counter loop per range dimension, from the last
    /// dimension to the first (column-major order). Counters run over
    /// `[0, size)` with increment 1.
    fn begin(&mut self, lowering: &mut FunctionLowering<'_>) {
        for index in (0..self.sections.len()).rev() {
            let Section::Range(range) = self.sections[index] else {
                continue;
            };
            let counter = lowering.emit(Instr::Alloca {
                name: format!("loop.counter.{}", index),
                ty: IrType::I32,
            });
            let zero = lowering.const_int(0);
            lowering.emit(Instr::Store {
                ptr: counter,
                value: zero,
            });
            let cond_block = lowering.new_block();
            let body_block = lowering.new_block();
            let end_block = lowering.new_block();
            lowering.branch_to(cond_block);
            let current = lowering.emit(Instr::Load {
                ptr: counter,
                ty: IrType::I32,
            });
            let in_range = lowering.emit(Instr::Binary {
                op: BinOp::Lt,
                ty: IrType::I32,
                lhs: current,
                rhs: range.size,
            });
            lowering.set_term(Terminator::CondBr {
                cond: in_range,
                then_block: body_block,
                else_block: end_block,
            });
            lowering.start_block(body_block);
            let element = lowering.emit(Instr::Load {
                ptr: counter,
                ty: IrType::I32,
            });

            self.counters[index] = Some(counter);
            self.elements[index] = Some(element);
            self.loops[index] = Some((cond_block, end_block));
        }
    }

    /// Close the loops, first dimension outward: increment each counter
    /// and branch back to its test.
    fn end(&mut self, lowering: &mut FunctionLowering<'_>) {
        for index in 0..self.sections.len() {
            let Some((cond_block, end_block)) = self.loops[index] else {
                continue;
            };
            let counter = self.counters[index].expect("loop without a counter");
            let current = lowering.emit(Instr::Load {
                ptr: counter,
                ty: IrType::I32,
            });
            let one = lowering.const_int(1);
            let next = lowering.emit(Instr::Binary {
                op: BinOp::Add,
                ty: IrType::I32,
                lhs: current,
                rhs: one,
            });
            lowering.emit(Instr::Store {
                ptr: counter,
                value: next,
            });
            lowering.set_term(Terminator::Br(cond_block));
            lowering.start_block(end_block);
        }
    }

    /// The index within one dimension: `offset + counter * stride`,
    /// with offset and stride defaulting to 0 and 1.
    fn section_index(
        &self,
        lowering: &mut FunctionLowering<'_>,
        section: Section,
        dimension: usize,
    ) -> ValueId {
        match section {
            Section::Element(index) => index,
            Section::Range(range) => {
                let counter = self.elements[dimension].expect("missing loop element");
                let strided = match range.stride {
                    Some(stride) => lowering.emit(Instr::Binary {
                        op: BinOp::Mul,
                        ty: IrType::I32,
                        lhs: counter,
                        rhs: stride,
                    }),
                    None => counter,
                };
                match range.offset {
                    Some(offset) => lowering.emit(Instr::Binary {
                        op: BinOp::Add,
                        ty: IrType::I32,
                        lhs: offset,
                        rhs: strided,
                    }),
                    None => strided,
                }
            }
        }
    }

    /// The linear element offset over a section list:
    /// `off_0 = idx_0; off_i = off_{i-1} + idx_i * prod(size_0..i)`.
    fn element_offset(
        &self,
        lowering: &mut FunctionLowering<'_>,
        sections: &[Section],
    ) -> ValueId {
        let mut offset = self.section_index(lowering, sections[0], 0);
        if sections.len() > 1 {
            let mut size_product = sections[0].dimension_size(lowering);
            for (index, &section) in sections.iter().enumerate().skip(1) {
                let dim_index = self.section_index(lowering, section, index);
                let scaled = lowering.emit(Instr::Binary {
                    op: BinOp::Mul,
                    ty: IrType::I32,
                    lhs: dim_index,
                    rhs: size_product,
                });
                offset = lowering.emit(Instr::Binary {
                    op: BinOp::Add,
                    ty: IrType::I32,
                    lhs: offset,
                    rhs: scaled,
                });
                if index + 1 < sections.len() {
                    let dim_size = section.dimension_size(lowering);
                    size_product = lowering.emit(Instr::Binary {
                        op: BinOp::Mul,
                        ty: IrType::I32,
                        lhs: size_product,
                        rhs: dim_size,
                    });
                }
            }
        }
        offset
    }

    /// The address of the current element of an operand.
    fn element_ptr(
        &self,
        lowering: &mut FunctionLowering<'_>,
        operation: &ArrayOperation,
        expr: ExprId,
    ) -> ValueId {
        let stored = operation.array_value(expr);
        let sections = operation.sections_of(stored).to_vec();
        let mut offset = self.element_offset(lowering, &sections);

        let ty = lowering.ctx.expr_ty(expr).ty;
        let elem = lowering.ctx.types.self_or_element(ty);
        if lowering.ctx.types.is_character(elem) {
            // Character elements are LEN units wide.
            let len = lowering.char_len_of_type(elem);
            offset = lowering.emit(Instr::Binary {
                op: BinOp::Mul,
                ty: IrType::I32,
                lhs: offset,
                rhs: len,
            });
            return lowering.emit(Instr::ElementPtr {
                base: stored.ptr,
                offset,
                ty: IrType::I8,
            });
        }
        let elem_ir = ir_type(&lowering.ctx.types, elem);
        lowering.emit(Instr::ElementPtr {
            base: stored.ptr,
            offset,
            ty: elem_ir,
        })
    }
}

/// The elementwise body emitter: arrays load their current element,
/// scalars come from the hoisted temporaries, operators apply pointwise.
fn emit_elemental(
    lowering: &mut FunctionLowering<'_>,
    operation: &ArrayOperation,
    looper: &ArrayLoop,
    expr: ExprId,
) -> RValue {
    let ty = lowering.ctx.expr_ty(expr).ty;
    if !lowering.ctx.types.is_array(ty) {
        return operation.scalar_value(expr);
    }
    match lowering.ctx.expr(expr).kind.clone() {
        ExprKind::Var(_) | ExprKind::ArrayConstructor { .. } => {
            let ptr = looper.element_ptr(lowering, operation, expr);
            let elem = lowering.ctx.types.self_or_element(ty);
            lowering.load_typed(ptr, elem)
        }
        ExprKind::ImplicitCast { expr: sub } | ExprKind::Conversion { expr: sub, .. } => {
            let value = emit_elemental(lowering, operation, looper, sub);
            let from = lowering.ctx.expr_ty(sub).ty;
            lowering.convert_value(value, from, ty)
        }
        ExprKind::Unary { op, expr: sub } => {
            let value = emit_elemental(lowering, operation, looper, sub);
            let operand_ty = lowering.ctx.expr_ty(sub).ty;
            lowering.emit_unary_op(op, operand_ty, value)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let lhs_value = emit_elemental(lowering, operation, looper, lhs);
            let rhs_value = emit_elemental(lowering, operation, looper, rhs);
            let operand_ty = lowering.ctx.expr_ty(lhs).ty;
            lowering.emit_binary_op(op, operand_ty, lhs_value, rhs_value)
        }
        ExprKind::IntrinsicCall { builtin, args } => {
            let values: Vec<RValue> = args
                .iter()
                .map(|&arg| emit_elemental(lowering, operation, looper, arg))
                .collect();
            let arg_tys: Vec<Ty> = args
                .iter()
                .map(|&arg| {
                    let ty = lowering.ctx.expr_ty(arg).ty;
                    lowering.ctx.types.self_or_element(ty)
                })
                .collect();
            let result_elem = lowering.ctx.types.self_or_element(ty);
            lowering.emit_intrinsic_values(builtin, &values, &arg_tys, result_elem)
        }
        _ => panic!("invalid elemental expression"),
    }
}

/// Store one element of an elemental assignment.
fn store_element(
    lowering: &mut FunctionLowering<'_>,
    operation: &ArrayOperation,
    looper: &ArrayLoop,
    lhs: ExprId,
    value: RValue,
) {
    let ptr = looper.element_ptr(lowering, operation, lhs);
    let lhs_ty = lowering.ctx.expr_ty(lhs).ty;
    let elem = lowering.ctx.types.self_or_element(lhs_ty);
    if lowering.ctx.types.is_character(elem) {
        let (src_ptr, src_len) = value.char_pair();
        let dst_len = lowering.char_len_of_type(elem);
        lowering.emit(Instr::RuntimeCall {
            callee: "assignment_char1".to_string(),
            args: vec![ptr, dst_len, src_ptr, src_len],
            ty: IrType::Void,
        });
        return;
    }
    let value = match value {
        RValue::Complex { re, im } => lowering.emit(Instr::MakeComplex { re, im }),
        other => other.scalar(),
    };
    lowering.emit(Instr::Store { ptr, value });
}

/// Whole-array assignment `A = rhs`.
pub(super) fn emit_array_assignment(
    lowering: &mut FunctionLowering<'_>,
    lhs: ExprId,
    rhs: ExprId,
) {
    let mut operation = ArrayOperation::new();
    let lhs_array = operation
        .emit_all(lowering, lhs)
        .expect("array assignment without an array target");
    operation.emit_all(lowering, rhs);

    let stored = operation.array_value(lhs_array);
    let sections = operation.sections_of(stored).to_vec();
    let mut looper = ArrayLoop::new(sections);
    looper.begin(lowering);
    let value = emit_elemental(lowering, &operation, &looper, rhs);
    store_element(lowering, &operation, &looper, lhs, value);
    looper.end(lowering);
}

/// Masked array assignment. The mask's sections drive the loop nest and
/// the mask is re-evaluated for every element; the then- and else-bodies
/// run in basic blocks merged at a common join.
pub(super) fn emit_where(lowering: &mut FunctionLowering<'_>, stmt: StmtId) {
    let StmtKind::Where {
        mask,
        then_block,
        else_block,
    } = lowering.ctx.stmt(stmt).kind.clone()
    else {
        panic!("invalid where statement");
    };

    let then_assignments = where_assignments(lowering, then_block);
    let else_assignments = else_block
        .map(|block| where_assignments(lowering, block))
        .unwrap_or_default();

    let mut operation = ArrayOperation::new();
    let mask_array = operation
        .emit_all(lowering, mask)
        .expect("where mask without an array operand");
    for &(lhs, rhs) in then_assignments.iter().chain(&else_assignments) {
        operation.emit_all(lowering, lhs);
        operation.emit_all(lowering, rhs);
    }

    let stored = operation.array_value(mask_array);
    let sections = operation.sections_of(stored).to_vec();
    let mut looper = ArrayLoop::new(sections);
    looper.begin(lowering);

    let cond = emit_elemental(lowering, &operation, &looper, mask).scalar();
    let then_bb = lowering.new_block();
    let end_bb = lowering.new_block();
    let else_bb = if else_assignments.is_empty() {
        end_bb
    } else {
        lowering.new_block()
    };
    lowering.set_term(Terminator::CondBr {
        cond,
        then_block: then_bb,
        else_block: else_bb,
    });

    lowering.start_block(then_bb);
    for &(lhs, rhs) in &then_assignments {
        let value = emit_elemental(lowering, &operation, &looper, rhs);
        store_element(lowering, &operation, &looper, lhs, value);
    }
    lowering.set_term(Terminator::Br(end_bb));

    if !else_assignments.is_empty() {
        lowering.start_block(else_bb);
        for &(lhs, rhs) in &else_assignments {
            let value = emit_elemental(lowering, &operation, &looper, rhs);
            store_element(lowering, &operation, &looper, lhs, value);
        }
        lowering.set_term(Terminator::Br(end_bb));
    }

    lowering.start_block(end_bb);
    looper.end(lowering);
}

/// Collect the (lhs, rhs) pairs of a WHERE body block.
fn where_assignments(
    lowering: &FunctionLowering<'_>,
    block: StmtId,
) -> Vec<(ExprId, ExprId)> {
    lowering
        .ctx
        .block_body(block)
        .iter()
        .filter_map(|&stmt| match lowering.ctx.stmt(stmt).kind {
            StmtKind::Assignment { lhs, rhs } => Some((lhs, rhs)),
            _ => None,
        })
        .collect()
}

/// The address of `target(subscripts...)`, subtracting each dimension's
/// lower bound and scaling by the preceding extents.
pub(super) fn emit_array_element_ptr(
    lowering: &mut FunctionLowering<'_>,
    target: ExprId,
    subscripts: &[ExprId],
) -> ValueId {
    let (base, _) = emit_array_value(lowering, target);
    let target_ty = lowering.ctx.expr_ty(target).ty;
    let dims = lowering
        .ctx
        .types
        .array_dims(target_ty)
        .map(|d| d.to_vec())
        .unwrap_or_default();

    let sizes = emit_dimension_sizes(lowering, target_ty);
    let mut offset = emit_dim_subscript(lowering, subscripts[0], dims.first());
    if subscripts.len() > 1 {
        let mut size_product = sizes[0];
        for index in 1..subscripts.len() {
            let sub = emit_dim_subscript(lowering, subscripts[index], dims.get(index));
            let scaled = lowering.emit(Instr::Binary {
                op: BinOp::Mul,
                ty: IrType::I32,
                lhs: sub,
                rhs: size_product,
            });
            offset = lowering.emit(Instr::Binary {
                op: BinOp::Add,
                ty: IrType::I32,
                lhs: offset,
                rhs: scaled,
            });
            if index + 1 < subscripts.len() {
                size_product = lowering.emit(Instr::Binary {
                    op: BinOp::Mul,
                    ty: IrType::I32,
                    lhs: size_product,
                    rhs: sizes[index],
                });
            }
        }
    }

    let elem = lowering.ctx.types.self_or_element(target_ty);
    if lowering.ctx.types.is_character(elem) {
        let len = lowering.char_len_of_type(elem);
        offset = lowering.emit(Instr::Binary {
            op: BinOp::Mul,
            ty: IrType::I32,
            lhs: offset,
            rhs: len,
        });
        return lowering.emit(Instr::ElementPtr {
            base,
            offset,
            ty: IrType::I8,
        });
    }
    let elem_ir = ir_type(&lowering.ctx.types, elem);
    lowering.emit(Instr::ElementPtr {
        base,
        offset,
        ty: elem_ir,
    })
}

/// `subscript - lower_bound` for one dimension.
fn emit_dim_subscript(
    lowering: &mut FunctionLowering<'_>,
    subscript: ExprId,
    dim: Option<&DimSpec>,
) -> ValueId {
    let value = lowering.emit_expr(subscript).scalar();
    let lower = match dim {
        Some(DimSpec::Explicit {
            lower: Some(lower), ..
        }) => match crate::eval::eval_int(lowering.ctx, *lower) {
            Some(constant) => lowering.const_int(constant),
            None => lowering.emit_expr(*lower).scalar(),
        },
        _ => lowering.const_int(1),
    };
    lowering.emit(Instr::Binary {
        op: BinOp::Sub,
        ty: IrType::I32,
        lhs: value,
        rhs: lower,
    })
}

/// An array constructor: a constant global aggregate when every item
/// folds, otherwise a stack temporary filled element by element.
pub(super) fn emit_array_constructor(
    lowering: &mut FunctionLowering<'_>,
    expr: ExprId,
) -> ValueId {
    let ExprKind::ArrayConstructor { items } = lowering.ctx.expr(expr).kind.clone() else {
        panic!("invalid array constructor expression");
    };
    let ty = lowering.ctx.expr_ty(expr).ty;
    let elem = lowering.ctx.types.self_or_element(ty);
    let elem_ir = ir_type(&lowering.ctx.types, elem);

    if let Some(constants) = items
        .iter()
        .map(|&item| constant_value(lowering, item))
        .collect::<Option<Vec<Constant>>>()
    {
        let name = format!("array.constructor.{}", lowering.module.globals.len());
        lowering.module.globals.push(GlobalArray {
            name: name.clone(),
            elem: elem_ir,
            items: constants,
        });
        return lowering.emit(Instr::GlobalAddr { name });
    }

    let count = lowering.const_int(items.len() as i64);
    let ptr = lowering.emit(Instr::AllocaArray {
        elem: elem_ir,
        count,
    });
    for (index, &item) in items.iter().enumerate() {
        let value = lowering.emit_expr(item);
        let value = match value {
            RValue::Complex { re, im } => lowering.emit(Instr::MakeComplex { re, im }),
            other => other.scalar(),
        };
        let offset = lowering.const_int(index as i64);
        let slot = lowering.emit(Instr::ElementPtr {
            base: ptr,
            offset,
            ty: elem_ir,
        });
        lowering.emit(Instr::Store { ptr: slot, value });
    }
    ptr
}

/// The base pointer of an array designator.
pub(super) fn emit_array_base_ptr(lowering: &mut FunctionLowering<'_>, expr: ExprId) -> ValueId {
    emit_array_value(lowering, expr).0
}

/// Materialize an array-valued expression into a contiguous stack
/// temporary; used when an elemental expression is passed as an actual
/// argument.
pub(super) fn emit_array_temp(lowering: &mut FunctionLowering<'_>, expr: ExprId) -> ValueId {
    let mut operation = ArrayOperation::new();
    let driver = operation
        .emit_all(lowering, expr)
        .expect("array temporary without an array operand");
    let stored = operation.array_value(driver);
    let sections = operation.sections_of(stored).to_vec();

    let mut count: Option<ValueId> = None;
    for section in &sections {
        if let Section::Range(range) = section {
            count = Some(match count {
                None => range.size,
                Some(total) => lowering.emit(Instr::Binary {
                    op: BinOp::Mul,
                    ty: IrType::I32,
                    lhs: total,
                    rhs: range.size,
                }),
            });
        }
    }
    let count = count.unwrap_or_else(|| lowering.const_int(0));

    let ty = lowering.ctx.expr_ty(expr).ty;
    let elem = lowering.ctx.types.self_or_element(ty);
    let elem_ir = ir_type(&lowering.ctx.types, elem);
    let temp = lowering.emit(Instr::AllocaArray {
        elem: elem_ir,
        count,
    });

    let mut looper = ArrayLoop::new(sections.clone());
    looper.begin(lowering);
    let value = emit_elemental(lowering, &operation, &looper, expr);
    let offset = looper.element_offset(lowering, &sections);
    if lowering.ctx.types.is_character(elem) {
        let len = lowering.char_len_of_type(elem);
        let scaled = lowering.emit(Instr::Binary {
            op: BinOp::Mul,
            ty: IrType::I32,
            lhs: offset,
            rhs: len,
        });
        let slot = lowering.emit(Instr::ElementPtr {
            base: temp,
            offset: scaled,
            ty: IrType::I8,
        });
        let (src_ptr, src_len) = value.char_pair();
        lowering.emit(Instr::RuntimeCall {
            callee: "assignment_char1".to_string(),
            args: vec![slot, len, src_ptr, src_len],
            ty: IrType::Void,
        });
    } else {
        let slot = lowering.emit(Instr::ElementPtr {
            base: temp,
            offset,
            ty: elem_ir,
        });
        let value = match value {
            RValue::Complex { re, im } => lowering.emit(Instr::MakeComplex { re, im }),
            other => other.scalar(),
        };
        lowering.emit(Instr::Store { ptr: slot, value });
    }
    looper.end(lowering);
    temp
}

fn constant_value(lowering: &FunctionLowering<'_>, expr: ExprId) -> Option<Constant> {
    match &lowering.ctx.expr(expr).kind {
        ExprKind::IntegerConstant(value) => Some(Constant::Int(*value)),
        ExprKind::RealConstant(value) => Some(Constant::Real(*value)),
        ExprKind::LogicalConstant(value) => Some(Constant::Bool(*value)),
        ExprKind::CharacterConstant(value) => Some(Constant::Str(value.clone())),
        _ => crate::eval::eval_int(lowering.ctx, expr).map(Constant::Int),
    }
}

#[cfg(test)]
mod tests {
    use super::super::lower_translation_unit;
    use super::super::{Instr, Module, Terminator};
    use crate::context::AstContext;
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

    fn count_loops(module: &Module) -> usize {
        module
            .functions
            .iter()
            .flat_map(|f| f.blocks.iter())
            .filter(|b| matches!(b.term, Some(Terminator::CondBr { .. })))
            .count()
    }

    #[test]
    fn test_rank1_assignment_emits_one_loop() {
        let module = lower("PROGRAM P\nREAL A(10), B(10)\nA = B\nEND\n");
        assert_eq!(count_loops(&module), 1);
    }

    #[test]
    fn test_rank2_assignment_emits_two_loops() {
        let module = lower("PROGRAM P\nREAL A(4,5), B(4,5)\nA = B + 1.0\nEND\n");
        assert_eq!(count_loops(&module), 2);
    }

    #[test]
    fn test_scalar_operand_hoisted_once() {
        // The scalar X appears once in the operand tree; it must be
        // evaluated outside the loop exactly once.
        let module = lower("PROGRAM P\nREAL A(10), B(10), X\nA = B * X\nEND\n");
        let func = module.functions.iter().next().unwrap();
        let x_loads: Vec<_> = func
            .blocks
            .iter_enumerated()
            .flat_map(|(id, b)| b.instrs.iter().map(move |v| (id, *v)))
            .filter(|&(_, v)| {
                // Loads of the scalar slot named X.
                match func.values[v] {
                    Instr::Load { ptr, .. } => {
                        matches!(&func.values[ptr], Instr::Alloca { name, .. } if name == "X")
                    }
                    _ => false,
                }
            })
            .collect();
        assert_eq!(x_loads.len(), 1);
        // And the load sits in the entry block, before any loop.
        assert_eq!(x_loads[0].0, func.entry);
    }

    #[test]
    fn test_where_emits_mask_conditional_per_element() {
        let module = lower(
            "PROGRAM P\nREAL A(8), B(8)\nLOGICAL M(8)\nWHERE (M)\nA = B\nELSE WHERE\nA = 0.0\nEND WHERE\nEND\n",
        );
        // One loop plus the per-element mask branch.
        assert_eq!(count_loops(&module), 2);
    }

    #[test]
    fn test_constant_constructor_becomes_global() {
        let module = lower("PROGRAM P\nREAL A(3)\nA = (/1.0, 2.0, 3.0/)\nEND\n");
        assert_eq!(module.globals.len(), 1);
        assert_eq!(module.globals[0].items.len(), 3);
    }

    #[test]
    fn test_non_constant_constructor_uses_temp() {
        let module = lower("PROGRAM P\nREAL A(2), X\nA = (/X, 2.0/)\nEND\n");
        assert!(module.globals.is_empty());
        let has_temp = module
            .functions
            .iter()
            .flat_map(|f| f.values.iter())
            .any(|i| matches!(i, Instr::AllocaArray { .. }));
        assert!(has_temp);
    }

    #[test]
    fn test_array_element_offset_subtracts_lower_bound() {
        let module = lower("PROGRAM P\nREAL A(0:9)\nA(3) = 1.0\nEND\n");
        let func = module.functions.iter().next().unwrap();
        let has_elementptr = func
            .values
            .iter()
            .any(|i| matches!(i, Instr::ElementPtr { .. }));
        assert!(has_elementptr);
    }
}
