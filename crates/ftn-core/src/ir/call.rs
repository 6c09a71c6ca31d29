//! Call lowering and the external calling convention.
//!
//! Every formal parameter is classified into an [`AbiArg`] variant and
//! every result into an [`AbiRet`] variant; argument materialization
//! follows the classification. The default external convention passes
//! scalars by reference, arrays as element pointers, and characters as
//! an inline pointer with the length appended to a trailing
//! additional-argument list as a 32-bit integer. Character-valued
//! functions return through a caller-provided buffer.
//!
//! Statement functions never become calls: each call site inlines the
//! body expression under a scope mapping formals to actual argument
//! expressions.

use super::lower::{FunctionLowering, RValue};
use super::{ir_type, Instr, IrType};
use crate::ast::{DeclKind, ExprKind, VarKind};
use crate::ids::{DeclId, ExprId, ValueId};
use crate::types::{QualType, TypeInterner};

/// How an argument is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiArg {
    /// Passed directly: scalars by value, arrays as element pointers.
    Value,
    /// Passed as a pointer to the value.
    Reference,
    /// Erased to an untyped pointer plus a byte-width argument.
    ReferenceAsVoidExtraSize,
    /// Aggregates split in place: complex to (re, im), character to
    /// (pointer, length).
    Expand,
    /// Character pointer inline; the length goes to the tail
    /// additional-argument list as a 32-bit integer.
    ExpandCharacterPutLengthToAdditionalArgsAsInt,
    /// Complex passed by value as a two-lane vector.
    ComplexValueAsVector,
}

/// How a result is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiRet {
    Nothing,
    Value,
    /// The caller provides the result buffer as a trailing argument.
    CharacterValueAsArg,
}

/// Classify one actual argument under the external convention.
pub fn classify_arg(types: &TypeInterner, ty: QualType) -> AbiArg {
    if types.is_array(ty.ty) {
        AbiArg::Value
    } else if types.is_character(ty.ty) {
        AbiArg::ExpandCharacterPutLengthToAdditionalArgsAsInt
    } else {
        AbiArg::Reference
    }
}

/// Classify a result under the external convention.
pub fn classify_ret(types: &TypeInterner, result: Option<QualType>) -> AbiRet {
    match result {
        None => AbiRet::Nothing,
        Some(ty) if types.is_character(ty.ty) => AbiRet::CharacterValueAsArg,
        Some(_) => AbiRet::Value,
    }
}

/// A function reference in expression position.
pub(super) fn emit_function_call(
    lowering: &mut FunctionLowering<'_>,
    function: DeclId,
    args: &[ExprId],
) -> RValue {
    let decl = lowering.ctx.decl(function);
    let DeclKind::Function {
        result,
        args: formals,
        body_expr,
        ..
    } = decl.kind.clone()
    else {
        panic!("call of a non-function declaration");
    };

    if let Some(body) = body_expr {
        // Statement function: push an inlining scope and expand the
        // body at the call site.
        let frame = formals.iter().copied().zip(args.iter().copied()).collect();
        lowering.inline_frames.push(frame);
        let value = lowering.emit_expr(body);
        lowering.inline_frames.pop();
        return value;
    }

    let name = decl
        .name
        .map(|n| lowering.ctx.str(n))
        .unwrap_or_default();
    emit_external_call(lowering, name, Some(result), args)
}

/// A CALL statement.
pub(super) fn emit_subroutine_call(
    lowering: &mut FunctionLowering<'_>,
    subroutine: DeclId,
    args: &[ExprId],
) {
    let name = lowering
        .ctx
        .decl(subroutine)
        .name
        .map(|n| lowering.ctx.str(n))
        .unwrap_or_default();
    emit_external_call(lowering, name, None, args);
}

/// Materialize arguments per their ABI classification and emit the
/// call.
fn emit_external_call(
    lowering: &mut FunctionLowering<'_>,
    callee: String,
    result: Option<QualType>,
    args: &[ExprId],
) -> RValue {
    let mut values: Vec<ValueId> = Vec::new();
    let mut additional: Vec<ValueId> = Vec::new();

    for &arg in args {
        let arg_ty = lowering.ctx.expr_ty(arg);
        match classify_arg(&lowering.ctx.types, arg_ty) {
            AbiArg::Value => {
                if lowering.ctx.types.is_array(arg_ty.ty) {
                    values.push(emit_array_argument_ptr(lowering, arg));
                } else {
                    values.push(lowering.emit_expr(arg).scalar());
                }
            }
            AbiArg::Reference => {
                values.push(emit_call_arg_ptr(lowering, arg));
            }
            AbiArg::ReferenceAsVoidExtraSize => {
                let ptr = emit_call_arg_ptr(lowering, arg);
                let elem = lowering.ctx.types.self_or_element(arg_ty.ty);
                let width = ir_type(&lowering.ctx.types, elem).byte_width();
                let width = lowering.const_int(width as i64);
                values.push(ptr);
                values.push(width);
            }
            AbiArg::Expand => match lowering.emit_expr(arg) {
                RValue::Complex { re, im } => {
                    values.push(re);
                    values.push(im);
                }
                RValue::Char { ptr, len } => {
                    values.push(ptr);
                    values.push(len);
                }
                RValue::Scalar(_) => panic!("invalid expand abi"),
            },
            AbiArg::ExpandCharacterPutLengthToAdditionalArgsAsInt => {
                let (ptr, len) = lowering.emit_expr(arg).char_pair();
                values.push(ptr);
                additional.push(len);
            }
            AbiArg::ComplexValueAsVector => {
                let RValue::Complex { re, im } = lowering.emit_expr(arg) else {
                    panic!("invalid complex vector abi");
                };
                let packed = lowering.emit(Instr::MakeComplex { re, im });
                values.push(packed);
            }
        }
    }

    match classify_ret(&lowering.ctx.types, result) {
        AbiRet::Nothing => {
            values.extend(additional);
            lowering.emit(Instr::Call {
                callee,
                args: values,
                ty: IrType::Void,
            });
            RValue::Scalar(lowering.const_int(0))
        }
        AbiRet::CharacterValueAsArg => {
            let result_ty = result.expect("character return without a type");
            let len = lowering.char_len_of_type(result_ty.ty);
            let buffer = lowering.emit(Instr::AllocaArray {
                elem: IrType::I8,
                count: len,
            });
            values.push(buffer);
            values.push(len);
            values.extend(additional);
            lowering.emit(Instr::Call {
                callee,
                args: values,
                ty: IrType::Void,
            });
            RValue::Char { ptr: buffer, len }
        }
        AbiRet::Value => {
            let result_ty = result.expect("value return without a type");
            let ir = ir_type(&lowering.ctx.types, result_ty.ty);
            values.extend(additional);
            let value = lowering.emit(Instr::Call {
                callee,
                args: values,
                ty: ir,
            });
            if ir == IrType::Complex {
                let re = lowering.emit(Instr::ComplexPart {
                    value,
                    imag: false,
                });
                let im = lowering.emit(Instr::ComplexPart { value, imag: true });
                RValue::Complex { re, im }
            } else {
                RValue::Scalar(value)
            }
        }
    }
}

/// The address of an actual argument passed by reference: a variable's
/// own storage, an array element's address, or a temporary holding the
/// evaluated value.
fn emit_call_arg_ptr(lowering: &mut FunctionLowering<'_>, expr: ExprId) -> ValueId {
    match lowering.ctx.expr(expr).kind.clone() {
        ExprKind::Var(decl) => {
            let is_parameter = matches!(
                lowering.ctx.decl(decl).kind,
                DeclKind::Var {
                    var_kind: VarKind::Parameter,
                    ..
                }
            );
            if !is_parameter {
                return lowering.var_ptr(decl);
            }
        }
        ExprKind::ArrayElement { target, subscripts } => {
            return super::array::emit_array_element_ptr(lowering, target, &subscripts);
        }
        _ => {}
    }

    let ty = lowering.ctx.expr_ty(expr).ty;
    let value = lowering.emit_expr(expr);
    let value = match value {
        RValue::Complex { re, im } => lowering.emit(Instr::MakeComplex { re, im }),
        other => other.scalar(),
    };
    let temp = lowering.emit(Instr::Alloca {
        name: "arg.temp".to_string(),
        ty: ir_type(&lowering.ctx.types, ty),
    });
    lowering.emit(Instr::Store { ptr: temp, value });
    temp
}

/// The pointer value for an array actual argument. Simple designators
/// pass their base pointer; an array-valued expression is materialized
/// into a contiguous temporary first. Non-contiguous actuals are
/// passed as their base pointer without packing.
fn emit_array_argument_ptr(lowering: &mut FunctionLowering<'_>, expr: ExprId) -> ValueId {
    match lowering.ctx.expr(expr).kind {
        ExprKind::Var(_) | ExprKind::ArrayConstructor { .. } => {
            super::array::emit_array_base_ptr(lowering, expr)
        }
        _ => super::array::emit_array_temp(lowering, expr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Ty, TypeInterner};

    #[test]
    fn test_abi_classification() {
        let mut types = TypeInterner::new();

        assert_eq!(
            classify_arg(&types, QualType::new(Ty::REAL)),
            AbiArg::Reference
        );
        assert_eq!(
            classify_arg(&types, QualType::new(Ty::COMPLEX)),
            AbiArg::Reference
        );
        assert_eq!(
            classify_arg(&types, QualType::new(Ty::CHARACTER)),
            AbiArg::ExpandCharacterPutLengthToAdditionalArgsAsInt
        );

        let array = types.intern_array(Ty::REAL, vec![crate::types::DimSpec::AssumedSize]);
        assert_eq!(classify_arg(&types, QualType::new(array)), AbiArg::Value);
    }

    #[test]
    fn test_ret_classification() {
        let types = TypeInterner::new();
        assert_eq!(classify_ret(&types, None), AbiRet::Nothing);
        assert_eq!(
            classify_ret(&types, Some(QualType::new(Ty::INTEGER))),
            AbiRet::Value
        );
        assert_eq!(
            classify_ret(&types, Some(QualType::new(Ty::CHARACTER))),
            AbiRet::CharacterValueAsArg
        );
    }
}
